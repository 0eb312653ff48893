//! Feed polling.
//!
//! The feed is polled as a sliding window with pagination controls fixed
//! by configuration, not resumed from a cursor. The returned batch
//! preserves feed order; nothing beyond that order is guaranteed.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::FeedConfig;
use crate::domain::{FeedRecord, QuakeEvent};
use crate::{Error, Result};

/// External seismic-event feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one window of events. Zero events is no work, not an error;
    /// a transport failure is a hard failure for this tick.
    async fn fetch(&self, code: u32, limit: u32, offset: u32) -> Result<Vec<QuakeEvent>>;
}

/// HTTP feed client.
pub struct FeedClient {
    base_url: String,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Feed)?;
        Ok(Self {
            base_url: config.base_url.clone(),
            client,
        })
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, code: u32, limit: u32, offset: u32) -> Result<Vec<QuakeEvent>> {
        debug!(code, limit, offset, "fetching quake history");

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("codes", code), ("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(Error::Feed)?
            .error_for_status()
            .map_err(Error::Feed)?;

        // An absent body on success is defined as zero events.
        let body = response.text().await.map_err(Error::Feed)?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<FeedRecord> = serde_json::from_str(&body)?;
        let mut events = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id.clone();
            match QuakeEvent::from_record(record) {
                Some(event) => events.push(event),
                None => warn!(event = %id, "dropping feed record with unparseable time"),
            }
        }
        Ok(events)
    }
}
