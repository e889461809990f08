//! Runtime configuration

use url::Url;

pub const DEFAULT_DB_PATH: &str = "calisthenics30.db";

/// Hosted backend (auth + REST) endpoint
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    base: Url,
    anon_key: String,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: impl Into<String>) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(url)?;
        // Without the trailing slash `join` would replace the last path segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base, anon_key: anon_key.into() })
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Absolute URL for a path relative to the project root, e.g. `auth/v1/signup`
    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: String,
    /// `None` runs the client in local-only mode
    pub supabase: Option<SupabaseConfig>,
    pub credentials: Option<Credentials>,
}

impl AppConfig {
    pub fn new(
        db_path: String,
        supabase_url: Option<String>,
        supabase_key: Option<String>,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<Self, url::ParseError> {
        let supabase = match (supabase_url, supabase_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => Some(SupabaseConfig::new(&url, key)?),
            _ => None,
        };
        let credentials = match (email, password) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };
        Ok(Self { db_path, supabase, credentials })
    }

    pub fn is_local_only(&self) -> bool {
        self.supabase.is_none()
    }
}
