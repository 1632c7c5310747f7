use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("network error: {0}")]
    Network(String),
    #[error("LINE API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Outbound side of the LINE Messaging API. A trait so the webhook
/// pipeline can be exercised with a counting test double.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Reply bound to a single-use reply token. The token expires after
    /// one use or a short TTL, so failures are never retried.
    async fn reply(
        &self,
        access_token: &str,
        reply_token: &str,
        text: &str,
    ) -> Result<(), ReplyError>;

    /// Push a message outside the reply window (welcome flow).
    async fn push(&self, access_token: &str, to: &str, text: &str) -> Result<(), ReplyError>;
}

pub struct LineClient {
    client: Client,
    api_base: String,
}

impl LineClient {
    pub fn new(api_base: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.unwrap_or_else(|| "https://api.line.me".to_string()),
        }
    }

    async fn post_message(
        &self,
        access_token: &str,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<(), ReplyError> {
        let url = format!("{}{}", self.api_base.trim_end_matches('/'), path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ReplyError::Network(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(ReplyError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn reply(
        &self,
        access_token: &str,
        reply_token: &str,
        text: &str,
    ) -> Result<(), ReplyError> {
        let payload = json!({
            "replyToken": reply_token,
            "messages": [{ "type": "text", "text": text }]
        });
        self.post_message(access_token, "/v2/bot/message/reply", payload)
            .await?;
        info!("LINE reply sent");
        Ok(())
    }

    async fn push(&self, access_token: &str, to: &str, text: &str) -> Result<(), ReplyError> {
        let payload = json!({
            "to": to,
            "messages": [{ "type": "text", "text": text }]
        });
        self.post_message(access_token, "/v2/bot/message/push", payload)
            .await?;
        info!(to = %to, "LINE push message sent");
        Ok(())
    }
}
