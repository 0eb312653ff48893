//! Subscriber lookup and region resolution.
//!
//! Subscriber records are owned by an external store and read-only
//! here. Identifiers are opaque (encrypted at rest); nothing in this
//! module ever needs to decrypt one.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::domain::{AffectedPoint, QuakeEvent};
use crate::Result;

/// One region subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Opaque subscriber identifier (encrypted at rest).
    pub subscriber_id: String,
    /// Region the subscriber registered for.
    pub region: String,
    /// Minimum intensity this subscriber wants to hear about.
    pub severity_threshold: i32,
}

/// Read-only subscriber store.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Subscribers whose region is in the given set.
    async fn subscribers_in_regions(&self, regions: &[String]) -> Result<Vec<Recipient>>;
}

/// Maps an event's affected regions to interested subscribers.
pub struct RecipientResolver<S: SubscriberStore> {
    store: Arc<S>,
    severity_floor: i32,
}

impl<S: SubscriberStore> RecipientResolver<S> {
    pub fn new(store: Arc<S>, severity_floor: i32) -> Self {
        Self {
            store,
            severity_floor,
        }
    }

    /// Distinct regions with at least one point at or above the
    /// feed-wide severity floor, in first-occurrence feed order.
    pub fn affected_regions(&self, event: &QuakeEvent) -> Vec<String> {
        let mut regions: Vec<String> = Vec::new();
        for point in &event.points {
            if point.severity >= self.severity_floor && !regions.contains(&point.region) {
                regions.push(point.region.clone());
            }
        }
        regions
    }

    /// Subscribers registered to any affected region. An empty result is
    /// a normal terminal state for the event, not a failure.
    pub async fn resolve(&self, event: &QuakeEvent) -> Result<Vec<Recipient>> {
        let regions = self.affected_regions(event);
        if regions.is_empty() {
            return Ok(Vec::new());
        }
        self.store.subscribers_in_regions(&regions).await
    }
}

/// Points a specific recipient should see: the event's points at or
/// above that recipient's own threshold. This second filter is
/// recipient-specific and independent of the feed-wide floor.
pub fn points_for_recipient(event: &QuakeEvent, recipient: &Recipient) -> Vec<AffectedPoint> {
    event
        .points
        .iter()
        .filter(|p| p.severity >= recipient.severity_threshold)
        .cloned()
        .collect()
}

/// In-memory subscriber store, seeded from a JSON array of recipients.
///
/// Stands in for the external subscriber store in tests and
/// single-process deployments.
#[derive(Default)]
pub struct MemorySubscriberStore {
    recipients: RwLock<Vec<Recipient>>,
}

impl MemorySubscriberStore {
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self {
            recipients: RwLock::new(recipients),
        }
    }

    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let recipients: Vec<Recipient> = serde_json::from_str(&raw)?;
        Ok(Self::new(recipients))
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn subscribers_in_regions(&self, regions: &[String]) -> Result<Vec<Recipient>> {
        Ok(self
            .recipients
            .read()
            .iter()
            .filter(|r| regions.contains(&r.region))
            .cloned()
            .collect())
    }
}
