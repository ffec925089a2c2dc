//! Gmail OAuth access tokens from an authorized-user token file.
//!
//! The file is the one written by Google's installed-app consent flow:
//! `token`, `refresh_token`, `client_id`, `client_secret`, `token_uri`,
//! `expiry`. A cached access token is reused until shortly before expiry,
//! then refreshed and written back. First-time consent is not handled here.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::SourceError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Refresh this long before the recorded expiry.
const EXPIRY_SKEW_SECS: i64 = 60;

/// On-disk authorized-user credentials. Unknown fields are preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenFile {
    /// The cached access token, if it is still valid at `now`.
    fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref()?;
        let expiry = DateTime::parse_from_rfc3339(self.expiry.as_deref()?).ok()?;
        if now + Duration::seconds(EXPIRY_SKEW_SECS) < expiry.with_timezone(&Utc) {
            Some(token)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Hands out access tokens, refreshing through the token endpoint as needed.
pub struct TokenManager {
    path: PathBuf,
    client: reqwest::Client,
    cached: Mutex<Option<TokenFile>>,
}

impl TokenManager {
    pub fn new(path: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            path: path.into(),
            client,
            cached: Mutex::new(None),
        }
    }

    /// Return a valid access token.
    pub async fn access_token(&self) -> Result<String, SourceError> {
        let mut guard = self.cached.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        let Some(file) = guard.as_mut() else {
            return Err(SourceError::Auth("token file not loaded".into()));
        };

        let now = Utc::now();
        if let Some(token) = file.valid_token(now) {
            debug!("Reusing cached Gmail access token");
            return Ok(token.to_string());
        }

        let refreshed = self.refresh(file).await?;
        let expires_in = refreshed.expires_in.unwrap_or(3600);
        file.token = Some(refreshed.access_token.clone());
        file.expiry = Some((now + Duration::seconds(expires_in)).to_rfc3339());
        self.save(file).await?;
        info!(expires_in, "Gmail access token refreshed");

        Ok(refreshed.access_token)
    }

    async fn load(&self) -> Result<TokenFile, SourceError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::Auth(format!(
                "cannot read token file {}: {e} (run the Gmail consent flow first)",
                self.path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            SourceError::Auth(format!("invalid token file {}: {e}", self.path.display()))
        })
    }

    async fn save(&self, file: &TokenFile) -> Result<(), SourceError> {
        let json = serde_json::to_string_pretty(file)
            .map_err(|e| SourceError::Auth(format!("cannot serialize token file: {e}")))?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    async fn refresh(&self, file: &TokenFile) -> Result<RefreshResponse, SourceError> {
        let token_uri = file.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let resp = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", file.refresh_token.as_str()),
                ("client_id", file.client_id.as_str()),
                ("client_secret", file.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SourceError::Auth(format!("token refresh request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!(
                "token refresh rejected ({status}): {body}"
            )));
        }

        resp.json::<RefreshResponse>()
            .await
            .map_err(|e| SourceError::Auth(format!("invalid token refresh response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_json(token_uri: &str, token: Option<&str>, expiry: Option<DateTime<Utc>>) -> String {
        let mut value = serde_json::json!({
            "refresh_token": "refresh-1",
            "client_id": "client-1",
            "client_secret": "secret-1",
            "token_uri": token_uri,
            "scopes": ["https://www.googleapis.com/auth/gmail.readonly"],
        });
        if let Some(token) = token {
            value["token"] = token.into();
        }
        if let Some(expiry) = expiry {
            value["expiry"] = expiry.to_rfc3339().into();
        }
        value.to_string()
    }

    #[tokio::test]
    async fn reuses_unexpired_token_without_network() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        let expiry = Utc::now() + Duration::hours(1);
        std::fs::write(
            &path,
            token_json("http://127.0.0.1:1/token", Some("cached"), Some(expiry)),
        )
        .unwrap();

        let manager = TokenManager::new(&path, reqwest::Client::new());
        assert_eq!(manager.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn refreshes_expired_token_and_writes_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        let expired = Utc::now() - Duration::minutes(5);
        std::fs::write(
            &path,
            token_json(&format!("{}/token", server.uri()), Some("stale"), Some(expired)),
        )
        .unwrap();

        let manager = TokenManager::new(&path, reqwest::Client::new());
        assert_eq!(manager.access_token().await.unwrap(), "fresh");
        // Second call is served from cache.
        assert_eq!(manager.access_token().await.unwrap(), "fresh");

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["token"], "fresh");
        assert_eq!(saved["refresh_token"], "refresh-1");
        assert!(saved["scopes"].is_array());
    }

    #[tokio::test]
    async fn rejected_refresh_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("token.json");
        std::fs::write(&path, token_json(&format!("{}/token", server.uri()), None, None)).unwrap();

        let manager = TokenManager::new(&path, reqwest::Client::new());
        let err = manager.access_token().await.unwrap_err();
        assert!(matches!(err, SourceError::Auth(ref m) if m.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn missing_token_file_is_auth_error() {
        let manager = TokenManager::new("/nonexistent/token.json", reqwest::Client::new());
        assert!(matches!(
            manager.access_token().await,
            Err(SourceError::Auth(_))
        ));
    }
}
