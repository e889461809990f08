//! REST client for the account-scoped `completions` table

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{AppendOutcome, ProgressStore, StoreError};
use crate::auth::{AuthSession, SupabaseAuth};
use crate::config::SupabaseConfig;
use crate::db::CompletionRecord;

const TABLE_PATH: &str = "rest/v1/completions";

#[derive(Debug, Serialize)]
struct NewRow<'a> {
    user_id: &'a str,
    day_number: u8,
    duration_seconds: u64,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Row {
    day_number: u8,
    duration_seconds: u64,
    completed_at: DateTime<Utc>,
}

pub struct RemoteStore {
    config: SupabaseConfig,
    client: reqwest::Client,
    auth: Arc<SupabaseAuth>,
}

impl RemoteStore {
    pub fn new(config: SupabaseConfig, auth: Arc<SupabaseAuth>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            auth,
        }
    }

    /// Session to send with a request, refreshed first when close to expiry
    async fn current_session(&self) -> Result<AuthSession, StoreError> {
        let session = self.auth.current().ok_or(StoreError::NotAuthenticated)?;
        if session.is_fresh_at(Utc::now()) {
            return Ok(session);
        }
        match self.auth.refresh().await {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!("Could not refresh session: {}", e);
                Err(StoreError::NotAuthenticated)
            }
        }
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Remote { status: status.as_u16(), body })
}

#[async_trait]
impl ProgressStore for RemoteStore {
    async fn load(&self) -> Result<Vec<CompletionRecord>, StoreError> {
        let session = self.current_session().await?;
        let mut url = self.config.endpoint(TABLE_PATH)?;
        url.query_pairs_mut()
            .append_pair("select", "day_number,duration_seconds,completed_at")
            .append_pair("order", "completed_at.asc");

        let response = self
            .client
            .get(url)
            .header("apikey", self.config.anon_key())
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let rows: Vec<Row> = check(response).await?.json().await?;
        debug!("Loaded {} remote completions", rows.len());

        Ok(rows
            .into_iter()
            .map(|r| CompletionRecord::new(r.day_number, r.duration_seconds, r.completed_at))
            .collect())
    }

    async fn append(&self, record: &CompletionRecord) -> Result<AppendOutcome, StoreError> {
        let session = self.current_session().await?;
        let url = self.config.endpoint(TABLE_PATH)?;
        let row = NewRow {
            user_id: &session.user_id,
            day_number: record.day_number,
            duration_seconds: record.duration_secs,
            completed_at: record.completed_at,
        };

        let response = self
            .client
            .post(url)
            .header("apikey", self.config.anon_key())
            .header("Prefer", "return=minimal")
            .bearer_auth(&session.access_token)
            .json(&[row])
            .send()
            .await?;
        check(response).await?;
        Ok(AppendOutcome::Synced)
    }

    fn account_id(&self) -> Option<String> {
        self.auth.current().map(|s| s.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use mockito::Matcher;
    use serde_json::json;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "jwt-token".into(),
            refresh_token: None,
            user_id: "user-1".into(),
            email: None,
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    fn store_for(server: &mockito::Server, session: Option<AuthSession>) -> RemoteStore {
        let config = SupabaseConfig::new(&server.url(), "anon").unwrap();
        let auth = Arc::new(SupabaseAuth::new(config.clone()));
        if let Some(session) = session {
            auth.publish_for_test(session);
        }
        RemoteStore::new(config, auth)
    }

    #[tokio::test]
    async fn test_append_posts_row() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/completions")
            .match_header("apikey", "anon")
            .match_header("authorization", "Bearer jwt-token")
            .match_body(Matcher::Json(json!([{
                "user_id": "user-1",
                "day_number": 3,
                "duration_seconds": 1260,
                "completed_at": "2025-03-01T08:30:00Z"
            }])))
            .with_status(201)
            .create_async()
            .await;

        let store = store_for(&server, Some(session()));
        let completed_at = Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap();
        let outcome = store.append(&CompletionRecord::new(3, 1260, completed_at)).await.unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, AppendOutcome::Synced);
    }

    #[tokio::test]
    async fn test_append_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/rest/v1/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let store = store_for(&server, Some(session()));
        let err = store.append(&CompletionRecord::new(1, 10, Utc::now())).await.unwrap_err();
        match err {
            StoreError::Remote { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_requires_session() {
        let server = mockito::Server::new_async().await;
        let store = store_for(&server, None);
        assert!(matches!(store.load().await, Err(StoreError::NotAuthenticated)));
        assert!(matches!(
            store.append(&CompletionRecord::new(1, 10, Utc::now())).await,
            Err(StoreError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_without_refresh_token_is_rejected() {
        let server = mockito::Server::new_async().await;
        let mut expired = session();
        expired.expires_at = Utc::now() - Duration::minutes(1);
        let store = store_for(&server, Some(expired));
        assert!(matches!(store.load().await, Err(StoreError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_expired_session_is_refreshed_before_append() {
        let mut server = mockito::Server::new_async().await;
        let refresh = server
            .mock("POST", "/auth/v1/token")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()))
            .match_body(Matcher::Json(json!({ "refresh_token": "refresh-1" })))
            .with_status(200)
            .with_body(
                r#"{"access_token":"new-token","refresh_token":"refresh-2","expires_in":3600,
                    "user":{"id":"user-1","email":null}}"#,
            )
            .create_async()
            .await;
        let insert = server
            .mock("POST", "/rest/v1/completions")
            .match_header("authorization", "Bearer new-token")
            .with_status(201)
            .create_async()
            .await;

        let mut expired = session();
        expired.access_token = "stale-token".into();
        expired.refresh_token = Some("refresh-1".into());
        expired.expires_at = Utc::now() - Duration::minutes(5);
        let store = store_for(&server, Some(expired));

        let outcome = store.append(&CompletionRecord::new(2, 600, Utc::now())).await.unwrap();
        refresh.assert_async().await;
        insert.assert_async().await;
        assert_eq!(outcome, AppendOutcome::Synced);
        assert_eq!(store.account_id().as_deref(), Some("user-1"));
    }

    #[tokio::test]
    async fn test_load_parses_rows() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/completions")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "day_number,duration_seconds,completed_at".into()),
                Matcher::UrlEncoded("order".into(), "completed_at.asc".into()),
            ]))
            .match_header("authorization", "Bearer jwt-token")
            .with_status(200)
            .with_body(
                r#"[
                    {"day_number": 1, "duration_seconds": 900, "completed_at": "2025-03-01T08:30:00.123456+00:00"},
                    {"day_number": 4, "duration_seconds": 0, "completed_at": "2025-03-04T19:00:00+00:00"}
                ]"#,
            )
            .create_async()
            .await;

        let store = store_for(&server, Some(session()));
        let records = store.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].day_number, 1);
        assert_eq!(records[0].completed_at, Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap());
        assert_eq!(records[1].duration_secs, 0);
    }
}
