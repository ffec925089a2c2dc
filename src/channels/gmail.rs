//! Gmail REST mailbox client — `users.messages.list` / `get` with OAuth.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::channels::gmail_auth::TokenManager;
use crate::channels::gmail_types::{ListResponse, Profile, RawMessage};
use crate::config::GmailConfig;
use crate::error::SourceError;
use crate::pipeline::source::{MailboxClient, MailboxQuery};

/// Per-request timeout for Gmail calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Gmail mailbox client for the authorized user (`me`).
pub struct GmailClient {
    base_url: String,
    client: reqwest::Client,
    auth: TokenManager,
}

impl GmailClient {
    pub fn new(config: &GmailConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            auth: TokenManager::new(&config.token_path, client.clone()),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/gmail/v1/users/me/{path}", self.base_url)
    }

    /// Account address and message total, used as a connectivity check.
    pub async fn profile(&self) -> Result<Profile, SourceError> {
        self.get_json(&self.url("profile"), &[]).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let token = self.auth.access_token().await?;
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| SourceError::Request(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!("Gmail rejected credentials ({status}): {body}")));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| SourceError::Payload(e.to_string()))
    }
}

#[async_trait]
impl MailboxClient for GmailClient {
    fn name(&self) -> &str {
        "gmail"
    }

    async fn search(&self, query: &MailboxQuery) -> Result<Vec<String>, SourceError> {
        let q = query.to_search();
        let list: ListResponse = self
            .get_json(
                &self.url("messages"),
                &[("q", q.clone()), ("maxResults", query.max_results.to_string())],
            )
            .await?;

        debug!(
            q = %q,
            found = list.messages.len(),
            estimate = list.result_size_estimate,
            "Gmail search complete"
        );
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn fetch(&self, id: &str) -> Result<RawMessage, SourceError> {
        self.get_json(
            &self.url(&format!("messages/{id}")),
            &[("format", "full".to_string())],
        )
        .await
    }
}
