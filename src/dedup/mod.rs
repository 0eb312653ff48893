//! Event eligibility gate with dedup markers.
//!
//! An event passes the gate when it is fresh, at or above the severity
//! floor, and not already marked. The marker is written the instant an
//! event is accepted, before any notification work: a crash after
//! marking drops a notification silently rather than risking duplicate
//! delivery on the next poll (at-most-once, never at-least-once).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::GateConfig;
use crate::domain::QuakeEvent;
use crate::Result;

/// Dedup marker store. Presence-check and insert are the only two
/// operations; the marker expires server-side after `ttl`.
#[async_trait]
pub trait MarkerStore: Send + Sync {
    /// Whether an unexpired marker exists for the event id.
    async fn contains(&self, event_id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Record a marker for the event id with the given retention window.
    async fn insert(&self, event_id: &str, now: DateTime<Utc>, ttl: Duration) -> Result<()>;
}

/// Why an event was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Older than the validity window.
    Stale,
    /// No determined severity, or below the configured floor.
    BelowFloor,
    /// An unexpired marker already exists.
    AlreadySeen,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Stale => "stale",
            Self::BelowFloor => "below severity floor",
            Self::AlreadySeen => "already processed",
        };
        f.write_str(reason)
    }
}

/// Outcome of one gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected(RejectReason),
}

impl Decision {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Decides whether an event is worth processing, writing the dedup
/// marker as a side effect of acceptance.
pub struct DedupGate<M: MarkerStore> {
    store: Arc<M>,
    config: GateConfig,
}

impl<M: MarkerStore> DedupGate<M> {
    pub fn new(store: Arc<M>, config: GateConfig) -> Self {
        Self { store, config }
    }

    /// Evaluate freshness, severity floor, and novelty, in that order,
    /// short-circuiting on the first failing check. On acceptance the
    /// marker is written before this returns.
    pub async fn accepts(&self, event: &QuakeEvent, now: DateTime<Utc>) -> Result<Decision> {
        let age = now - event.occurred_at;
        if age >= window(self.config.validity_window) {
            debug!(event = %event.id, age_secs = age.num_seconds(), "event too old to be actionable");
            return Ok(Decision::Rejected(RejectReason::Stale));
        }

        match event.max_severity {
            Some(severity) if severity >= self.config.severity_floor => {}
            _ => {
                debug!(event = %event.id, severity = ?event.max_severity, "event below severity floor");
                return Ok(Decision::Rejected(RejectReason::BelowFloor));
            }
        }

        if self.store.contains(&event.id, now).await? {
            debug!(event = %event.id, "event already processed");
            return Ok(Decision::Rejected(RejectReason::AlreadySeen));
        }

        self.store
            .insert(&event.id, now, self.config.validity_window)
            .await?;
        Ok(Decision::Accepted)
    }
}

fn window(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// In-memory marker store with per-entry expiry.
///
/// The production deployment keys markers in an external key-value
/// store; this implementation backs tests and single-process setups.
#[derive(Default)]
pub struct MemoryMarkerStore {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerStore for MemoryMarkerStore {
    async fn contains(&self, event_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut entries = self.entries.lock();
        if let Some(expires_at) = entries.get(event_id) {
            if *expires_at > now {
                return Ok(true);
            }
        }
        entries.remove(event_id);
        Ok(false)
    }

    async fn insert(&self, event_id: &str, now: DateTime<Utc>, ttl: Duration) -> Result<()> {
        let expires_at = now
            .checked_add_signed(window(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries.lock().insert(event_id.to_string(), expires_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TsunamiFlag;
    use chrono::TimeZone;

    fn event(id: &str, severity: Option<i32>, occurred_at: DateTime<Utc>) -> QuakeEvent {
        QuakeEvent {
            id: id.to_string(),
            occurred_at,
            max_severity: severity,
            hypocenter: None,
            tsunami: TsunamiFlag::Unknown,
            points: Vec::new(),
        }
    }

    fn gate() -> (DedupGate<MemoryMarkerStore>, Arc<MemoryMarkerStore>) {
        let store = Arc::new(MemoryMarkerStore::new());
        let config = GateConfig {
            validity_window: Duration::from_secs(600),
            severity_floor: 40,
        };
        (DedupGate::new(Arc::clone(&store), config), store)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn below_floor_is_rejected_without_marker() {
        let (gate, store) = gate();
        let event = event("e1", Some(30), now());

        let decision = gate.accepts(&event, now()).await.unwrap();
        assert_eq!(decision, Decision::Rejected(RejectReason::BelowFloor));
        assert!(!store.contains("e1", now()).await.unwrap());
    }

    #[tokio::test]
    async fn undefined_severity_is_rejected() {
        let (gate, store) = gate();
        let event = event("e1", None, now());

        let decision = gate.accepts(&event, now()).await.unwrap();
        assert_eq!(decision, Decision::Rejected(RejectReason::BelowFloor));
        assert!(!store.contains("e1", now()).await.unwrap());
    }

    #[tokio::test]
    async fn stale_event_is_rejected_regardless_of_severity() {
        let (gate, store) = gate();
        let occurred = now() - TimeDelta::seconds(601);
        let event = event("e1", Some(70), occurred);

        let decision = gate.accepts(&event, now()).await.unwrap();
        assert_eq!(decision, Decision::Rejected(RejectReason::Stale));
        assert!(!store.contains("e1", now()).await.unwrap());
    }

    #[tokio::test]
    async fn accepted_event_is_marked_and_not_accepted_twice() {
        let (gate, store) = gate();
        let event = event("e1", Some(55), now());

        assert_eq!(gate.accepts(&event, now()).await.unwrap(), Decision::Accepted);
        assert!(store.contains("e1", now()).await.unwrap());

        let second = gate.accepts(&event, now() + TimeDelta::seconds(5)).await.unwrap();
        assert_eq!(second, Decision::Rejected(RejectReason::AlreadySeen));
    }

    #[tokio::test]
    async fn marker_expires_with_the_validity_window() {
        let (gate, store) = gate();
        let event = event("e1", Some(55), now());
        assert!(gate.accepts(&event, now()).await.unwrap().is_accepted());

        // Past the retention window the marker is gone; the same event
        // would be rejected by freshness anyway.
        let later = now() + TimeDelta::seconds(601);
        assert!(!store.contains("e1", later).await.unwrap());
        assert_eq!(
            gate.accepts(&event, later).await.unwrap(),
            Decision::Rejected(RejectReason::Stale)
        );
    }
}
