//! Identity provider client - email/password accounts on the hosted backend
//!
//! The current session is published on a watch channel; the remote store and
//! the UI read it from there instead of asking the provider directly.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::config::SupabaseConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider refused the request; `message` is shown to the user as-is
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    #[error("not signed in")]
    NoSession,
}

/// Sessions closer than this to expiry are refreshed before use
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user_id: String,
    pub email: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Valid now and not inside the refresh margin
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.is_valid_at(now + Duration::seconds(REFRESH_MARGIN_SECS))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: Option<String>,
}

pub struct SupabaseAuth {
    config: SupabaseConfig,
    client: reqwest::Client,
    session: watch::Sender<Option<AuthSession>>,
    refresh_lock: Mutex<()>,
}

impl SupabaseAuth {
    pub fn new(config: SupabaseConfig) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            config,
            client: reqwest::Client::new(),
            session,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Receiver that sees every sign-in and sign-out
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.session.subscribe()
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.session.borrow().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session
            .borrow()
            .as_ref()
            .is_some_and(|s| s.is_valid_at(Utc::now()))
    }

    /// Create an account. Does not sign in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let url = self.config.endpoint("auth/v1/signup")?;
        let response = self
            .client
            .post(url)
            .header("apikey", self.config.anon_key())
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }

        info!("Account created for {}", email);
        Ok(())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let mut url = self.config.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .client
            .post(url)
            .header("apikey", self.config.anon_key())
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            let err = rejected(response).await;
            warn!("Sign-in failed for {}: {}", email, err);
            return Err(err);
        }

        let token: TokenResponse = response.json().await?;
        let session = self.publish(token);
        info!("Signed in as {}", session.user_id);
        Ok(session)
    }

    /// Current session, renewed with its refresh token first if it is
    /// expired or about to expire. Concurrent callers share one renewal.
    pub async fn refresh(&self) -> Result<AuthSession, AuthError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.current().ok_or(AuthError::NoSession)?;
        if current.is_fresh_at(Utc::now()) {
            return Ok(current);
        }
        let refresh_token = current.refresh_token.clone().ok_or(AuthError::NoSession)?;

        let mut url = self.config.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");

        let response = self
            .client
            .post(url)
            .header("apikey", self.config.anon_key())
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            // The refresh token is spent or revoked; the session is over
            let err = rejected(response).await;
            warn!("Session refresh for {} rejected: {}", current.user_id, err);
            self.session.send_replace(None);
            return Err(err);
        }

        let token: TokenResponse = response.json().await?;
        let session = self.publish(token);
        debug!("Session refreshed for {}", session.user_id);
        Ok(session)
    }

    fn publish(&self, token: TokenResponse) -> AuthSession {
        let session = AuthSession {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user_id: token.user.id,
            email: token.user.email,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        };
        self.session.send_replace(Some(session.clone()));
        session
    }

    #[cfg(test)]
    pub(crate) fn publish_for_test(&self, session: AuthSession) {
        self.session.send_replace(Some(session));
    }

    /// Drop the local session, then revoke it remotely. The local session is
    /// gone even when revocation fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.session.send_replace(None) else {
            return Ok(());
        };
        info!("Signed out {}", session.user_id);

        let url = self.config.endpoint("auth/v1/logout")?;
        let response = self
            .client
            .post(url)
            .header("apikey", self.config.anon_key())
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejected(response).await);
        }
        Ok(())
    }
}

async fn rejected(response: reqwest::Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AuthError::Rejected { status, message: error_message(&body) }
}

/// Pull the human-readable message out of a provider error body
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| v[*key].as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn auth_for(server: &mockito::Server) -> SupabaseAuth {
        SupabaseAuth::new(SupabaseConfig::new(&server.url(), "anon").unwrap())
    }

    const TOKEN_BODY: &str = r#"{
        "access_token": "jwt-token",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "refresh",
        "user": { "id": "user-1", "email": "me@example.com" }
    }"#;

    #[test]
    fn test_error_message_variants() {
        assert_eq!(error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#), "Invalid login credentials");
        assert_eq!(error_message(r#"{"code":422,"msg":"User already registered"}"#), "User already registered");
        assert_eq!(error_message(r#"{"message":"Email not confirmed"}"#), "Email not confirmed");
        assert_eq!(error_message("gateway timeout "), "gateway timeout");
    }

    #[test]
    fn test_session_validity() {
        let session = AuthSession {
            access_token: "t".into(),
            refresh_token: None,
            user_id: "u".into(),
            email: None,
            expires_at: Utc::now() + Duration::seconds(60),
        };
        assert!(session.is_valid_at(Utc::now()));
        assert!(!session.is_valid_at(Utc::now() + Duration::seconds(120)));
    }

    #[tokio::test]
    async fn test_sign_in_publishes_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .match_header("apikey", "anon")
            .match_body(Matcher::PartialJson(json!({ "email": "me@example.com" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let auth = auth_for(&server);
        let mut rx = auth.subscribe();
        assert!(!auth.is_signed_in());

        let session = auth.sign_in("me@example.com", "secret").await.unwrap();
        mock.assert_async().await;

        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.access_token, "jwt-token");
        assert!(auth.is_signed_in());
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().user_id, "user-1");
    }

    #[tokio::test]
    async fn test_sign_in_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)
            .create_async()
            .await;

        let auth = auth_for(&server);
        let err = auth.sign_in("me@example.com", "wrong").await.unwrap_err();
        match err {
            AuthError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_does_not_sign_in() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/signup")
            .match_header("apikey", "anon")
            .with_status(200)
            .with_body(r#"{"id":"user-2","email":"new@example.com"}"#)
            .create_async()
            .await;

        let auth = auth_for(&server);
        auth.sign_up("new@example.com", "secret").await.unwrap();
        mock.assert_async().await;
        assert!(!auth.is_signed_in());
    }

    #[tokio::test]
    async fn test_sign_up_already_registered() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/signup")
            .with_status(422)
            .with_body(r#"{"code":422,"msg":"User already registered"}"#)
            .create_async()
            .await;

        let auth = auth_for(&server);
        let err = auth.sign_up("me@example.com", "secret").await.unwrap_err();
        assert_eq!(err.to_string(), "User already registered");
    }

    #[tokio::test]
    async fn test_sign_out_clears_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(TOKEN_BODY)
            .create_async()
            .await;
        let logout = server
            .mock("POST", "/auth/v1/logout")
            .match_header("authorization", "Bearer jwt-token")
            .with_status(204)
            .create_async()
            .await;

        let auth = auth_for(&server);
        auth.sign_in("me@example.com", "secret").await.unwrap();
        auth.sign_out().await.unwrap();
        logout.assert_async().await;
        assert!(auth.current().is_none());
    }

    fn expiring_session(refresh_token: Option<&str>) -> AuthSession {
        AuthSession {
            access_token: "old-token".into(),
            refresh_token: refresh_token.map(str::to_string),
            user_id: "user-1".into(),
            email: None,
            expires_at: Utc::now() + Duration::seconds(10),
        }
    }

    #[tokio::test]
    async fn test_refresh_renews_expiring_session() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .match_header("apikey", "anon")
            .match_body(Matcher::Json(json!({ "refresh_token": "refresh-1" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        let auth = auth_for(&server);
        auth.publish_for_test(expiring_session(Some("refresh-1")));
        let mut rx = auth.subscribe();

        let session = auth.refresh().await.unwrap();
        assert_eq!(session.access_token, "jwt-token");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh"));
        assert!(session.is_fresh_at(Utc::now()));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().unwrap().access_token, "jwt-token");

        // Fresh now, so a second call does not hit the server
        auth.refresh().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_skips_fresh_session() {
        let server = mockito::Server::new_async().await;
        let auth = auth_for(&server);
        let mut session = expiring_session(Some("refresh-1"));
        session.expires_at = Utc::now() + Duration::hours(1);
        auth.publish_for_test(session.clone());
        assert_eq!(auth.refresh().await.unwrap(), session);
    }

    #[tokio::test]
    async fn test_refresh_rejected_ends_session() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant","error_description":"Invalid Refresh Token: Already Used"}"#)
            .create_async()
            .await;

        let auth = auth_for(&server);
        auth.publish_for_test(expiring_session(Some("refresh-1")));
        let err = auth.refresh().await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid Refresh Token: Already Used");
        assert!(auth.current().is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_session() {
        let server = mockito::Server::new_async().await;
        let auth = auth_for(&server);
        assert!(matches!(auth.refresh().await, Err(AuthError::NoSession)));

        auth.publish_for_test(expiring_session(None));
        assert!(matches!(auth.refresh().await, Err(AuthError::NoSession)));
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let server = mockito::Server::new_async().await;
        let auth = auth_for(&server);
        auth.sign_out().await.unwrap();
    }
}
