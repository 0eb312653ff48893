//! Push transport.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use uuid::Uuid;

use crate::config::PushConfig;
use crate::message::Message;
use crate::{Error, Result};

/// Retry-idempotency header carried by every push call.
const RETRY_KEY_HEADER: &str = "X-Line-Retry-Key";

/// What a push attempt resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    Delivered,
    /// The endpoint recognized the idempotency key from an earlier
    /// attempt. Logged, never retried within the call.
    Conflict,
}

/// Outbound push collaborator.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Push an ordered message batch to one delivery address.
    async fn push(
        &self,
        token: &str,
        to: &str,
        messages: &[Message],
        retry_key: Uuid,
    ) -> Result<PushResult>;
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: &'a [Message],
}

/// HTTP push client for the messaging API.
pub struct PushClient {
    url: String,
    client: reqwest::Client,
}

impl PushClient {
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            url: config.url.clone(),
            client,
        })
    }
}

#[async_trait]
impl PushTransport for PushClient {
    async fn push(
        &self,
        token: &str,
        to: &str,
        messages: &[Message],
        retry_key: Uuid,
    ) -> Result<PushResult> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .header(RETRY_KEY_HEADER, retry_key.to_string())
            .json(&PushRequest { to, messages })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(PushResult::Delivered)
        } else if status == StatusCode::CONFLICT {
            Ok(PushResult::Conflict)
        } else {
            Err(Error::PushRejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}
