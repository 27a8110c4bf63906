use crate::error::{ZohoError, ZohoResult};
use crate::types::*;
use mailgate_auth::secrets::keys;
use mailgate_auth::{SecretStore, TokenManager};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const ZOHO_API_BASE: &str = "https://mail.zoho.com/api/accounts";

/// Where the mailbox API lives and how long a call may take
#[derive(Debug, Clone)]
pub struct ZohoConfig {
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for ZohoConfig {
    fn default() -> Self {
        Self {
            api_base: ZOHO_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Authenticated client for one Zoho Mail account
pub struct ZohoMailClient {
    client: reqwest::Client,
    api_base: String,
    tokens: Arc<TokenManager>,
    secrets: Arc<SecretStore>,
}

impl ZohoMailClient {
    pub fn new(
        config: ZohoConfig,
        tokens: Arc<TokenManager>,
        secrets: Arc<SecretStore>,
    ) -> ZohoResult<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            tokens,
            secrets,
        })
    }

    /// Base URL for the configured account
    async fn account_url(&self) -> ZohoResult<String> {
        let secrets = self.secrets.get_secrets().await?;
        let account_id = secrets.require(keys::ZOHO_ACCOUNT_ID)?;
        Ok(format!("{}/{}", self.api_base, account_id))
    }

    /// URL of a single message; the id is escaped as one path segment
    async fn message_url(&self, message_id: &str) -> ZohoResult<reqwest::Url> {
        let base = self.account_url().await?;
        let mut url = reqwest::Url::parse(&base)
            .map_err(|e| ZohoError::ParseError(format!("Invalid API base {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ZohoError::ParseError(format!("API base {} cannot hold a path", base)))?
            .push("messages")
            .push(message_id);
        Ok(url)
    }

    /// List unread messages, newest first as the API returns them
    pub async fn list_unread(&self, limit: u32) -> ZohoResult<Vec<ZohoMessage>> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/messages/search", self.account_url().await?);
        debug!("Zoho: listing unread messages limit={}", limit);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[
                ("searchKey", "isUnread".to_string()),
                ("searchValue", "true".to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?;

        let mut messages: Vec<ZohoMessage> = read_data(response).await?;
        messages.truncate(limit as usize);

        info!("Zoho: found {} unread messages", messages.len());
        Ok(messages)
    }

    /// Fetch the full body of a message
    pub async fn message_detail(&self, message_id: &str) -> ZohoResult<ZohoMessageContent> {
        let token = self.tokens.access_token().await?;
        let url = self.message_url(message_id).await?;
        debug!("Zoho: fetching content for {}", message_id);

        let response = self.client.get(url).bearer_auth(&token).send().await?;

        read_data(response).await
    }

    /// List messages in the Drafts folder
    pub async fn list_drafts(&self, limit: u32, offset: u32) -> ZohoResult<Vec<ZohoMessage>> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/folders/Drafts/messages", self.account_url().await?);
        debug!("Zoho: listing drafts limit={} offset={}", limit, offset);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        let mut drafts: Vec<ZohoMessage> = read_data(response).await?;
        drafts.truncate(limit as usize);

        debug!("Zoho: got {} drafts", drafts.len());
        Ok(drafts)
    }

    /// Mark a message as read. Marking an already-read message is a no-op upstream.
    pub async fn mark_read(&self, message_id: &str) -> ZohoResult<()> {
        let token = self.tokens.access_token().await?;
        let url = self.message_url(message_id).await?;
        debug!("Zoho: marking {} as read", message_id);

        let response = self
            .client
            .put(url)
            .bearer_auth(&token)
            .json(&serde_json::json!({ "isUnread": false }))
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}

async fn ensure_success(response: reqwest::Response) -> ZohoResult<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(ZohoError::ApiError { status, body });
    }
    Ok(response)
}

async fn read_data<T: DeserializeOwned>(response: reqwest::Response) -> ZohoResult<T> {
    let envelope: ZohoResponse<T> = ensure_success(response)
        .await?
        .json()
        .await
        .map_err(|e| ZohoError::ParseError(e.to_string()))?;
    Ok(envelope.data)
}
