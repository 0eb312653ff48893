//! End-to-end pipeline scenarios over in-memory collaborators.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use quake_quick_alert::config::{CredentialConfig, DispatchConfig, GateConfig};
use quake_quick_alert::credentials::{
    AssertionSigner, CredentialError, CredentialManager, IssuedToken, MemoryCredentialStore,
    TokenEndpoint,
};
use quake_quick_alert::dedup::{DedupGate, MarkerStore, MemoryMarkerStore};
use quake_quick_alert::dispatch::{
    Dispatcher, PassthroughAddressResolver, PushResult, PushTransport,
};
use quake_quick_alert::domain::{AffectedPoint, QuakeEvent, TsunamiFlag};
use quake_quick_alert::feed::FeedSource;
use quake_quick_alert::message::Message;
use quake_quick_alert::pipeline::{PipelineConfig, QuakePipeline, RunReport};
use quake_quick_alert::subscribers::{MemorySubscriberStore, Recipient, RecipientResolver};
use quake_quick_alert::{Error, Result};

const TEST_KEY_PEM: &str = include_str!("../src/credentials/testdata/test_rsa_key.pem");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn quake(id: &str, max_severity: i32, points: Vec<(&str, &str, i32)>) -> QuakeEvent {
    QuakeEvent {
        id: id.to_string(),
        occurred_at: now(),
        max_severity: (max_severity > 0).then_some(max_severity),
        hypocenter: None,
        tsunami: TsunamiFlag::None,
        points: points
            .into_iter()
            .map(|(region, locality, severity)| AffectedPoint {
                region: region.to_string(),
                locality: locality.to_string(),
                severity,
            })
            .collect(),
    }
}

/// Feed stub returning the same batch on every poll, or an error.
struct StaticFeed {
    batch: Result<Vec<QuakeEvent>>,
}

impl StaticFeed {
    fn events(events: Vec<QuakeEvent>) -> Self {
        Self { batch: Ok(events) }
    }

    fn failing() -> Self {
        Self {
            batch: Err(Error::Other("connection reset".to_string())),
        }
    }
}

#[async_trait]
impl FeedSource for StaticFeed {
    async fn fetch(&self, _code: u32, _limit: u32, _offset: u32) -> Result<Vec<QuakeEvent>> {
        match &self.batch {
            Ok(events) => Ok(events.clone()),
            Err(_) => Err(Error::Other("connection reset".to_string())),
        }
    }
}

struct FakeTokenEndpoint {
    issue_calls: AtomicUsize,
}

impl FakeTokenEndpoint {
    fn new() -> Self {
        Self {
            issue_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenEndpoint for FakeTokenEndpoint {
    async fn issue(&self, _assertion: &str) -> std::result::Result<IssuedToken, CredentialError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        Ok(IssuedToken {
            access_token: "token-a".to_string(),
            key_id: Some("kid-1".to_string()),
        })
    }

    async fn verify(&self, _token: &str) -> std::result::Result<bool, CredentialError> {
        Ok(true)
    }
}

#[derive(Default)]
struct RecordingTransport {
    pushes: Mutex<Vec<(String, Vec<Message>)>>,
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn push(
        &self,
        _token: &str,
        to: &str,
        messages: &[Message],
        _retry_key: Uuid,
    ) -> Result<PushResult> {
        self.pushes.lock().push((to.to_string(), messages.to_vec()));
        Ok(PushResult::Delivered)
    }
}

struct Harness {
    pipeline: QuakePipeline<
        StaticFeed,
        MemoryMarkerStore,
        MemorySubscriberStore,
        FakeTokenEndpoint,
        MemoryCredentialStore,
        PassthroughAddressResolver,
        RecordingTransport,
    >,
    marker_store: Arc<MemoryMarkerStore>,
    transport: Arc<RecordingTransport>,
}

fn harness(feed: StaticFeed, subscribers: Vec<Recipient>) -> Harness {
    let gate_config = GateConfig {
        validity_window: Duration::from_secs(600),
        severity_floor: 40,
    };

    let marker_store = Arc::new(MemoryMarkerStore::new());
    let gate = DedupGate::new(Arc::clone(&marker_store), gate_config.clone());

    let resolver = RecipientResolver::new(
        Arc::new(MemorySubscriberStore::new(subscribers)),
        gate_config.severity_floor,
    );

    let credential_config = CredentialConfig {
        issuer: "iss-1".to_string(),
        subject: "sub-1".to_string(),
        key_id: "kid-1".to_string(),
        ..CredentialConfig::default()
    };
    let signer = AssertionSigner::new(&credential_config, TEST_KEY_PEM.as_bytes()).unwrap();
    let credentials = Arc::new(CredentialManager::new(
        vec![signer],
        Arc::new(FakeTokenEndpoint::new()),
        Arc::new(MemoryCredentialStore::new()),
        Duration::from_secs(3600),
    ));

    let transport = Arc::new(RecordingTransport::default());
    let dispatcher = Dispatcher::new(
        credentials,
        Arc::new(PassthroughAddressResolver),
        Arc::clone(&transport),
        DispatchConfig {
            issuer: "iss-1".to_string(),
            max_concurrency: 4,
        },
    );

    Harness {
        pipeline: QuakePipeline::new(
            feed,
            gate,
            resolver,
            dispatcher,
            PipelineConfig {
                feed_code: 551,
                feed_limit: 2,
                feed_offset: 0,
            },
        ),
        marker_store,
        transport,
    }
}

fn tokyo_subscriber() -> Recipient {
    Recipient {
        subscriber_id: "user-tokyo".to_string(),
        region: "Tokyo".to_string(),
        severity_threshold: 40,
    }
}

#[tokio::test]
async fn severe_event_dispatches_once_then_dedupes() {
    let event = quake("evt-1", 55, vec![("Tokyo", "Shinjuku", 55)]);
    let h = harness(StaticFeed::events(vec![event]), vec![tokyo_subscriber()]);

    let first = h.pipeline.run(now()).await.unwrap();
    assert_eq!(first.fetched, 1);
    assert_eq!(first.accepted, 1);
    assert_eq!(first.dispatched, 1);
    assert_eq!(first.delivery_failures, 0);

    {
        let pushes = h.transport.pushes.lock();
        assert_eq!(pushes.len(), 1);
        let (to, messages) = &pushes[0];
        assert_eq!(to, "user-tokyo");
        // Summary first, then a non-empty region detail.
        assert_eq!(messages.len(), 2);
        assert!(messages[0].text.starts_with("Earthquake information"));
        assert!(messages[1].text.contains("Tokyo Shinjuku 6-weak"));
    }

    // The identical event on the next poll is deduplicated.
    let second = h.pipeline.run(now() + chrono::TimeDelta::seconds(5)).await.unwrap();
    assert_eq!(second.skipped, 1);
    assert_eq!(second.dispatched, 0);
    assert_eq!(h.transport.pushes.lock().len(), 1);
}

#[tokio::test]
async fn below_floor_event_writes_no_marker_and_dispatches_nothing() {
    let event = quake("evt-low", 30, vec![("Tokyo", "Shinjuku", 30)]);
    let h = harness(StaticFeed::events(vec![event]), vec![tokyo_subscriber()]);

    let report = h.pipeline.run(now()).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.dispatched, 0);
    assert!(h.transport.pushes.lock().is_empty());
    assert!(!h.marker_store.contains("evt-low", now()).await.unwrap());
}

#[tokio::test]
async fn feed_failure_surfaces_one_error_with_no_side_effects() {
    let h = harness(StaticFeed::failing(), vec![tokyo_subscriber()]);

    let result = h.pipeline.run(now()).await;
    assert!(result.is_err());
    assert!(h.transport.pushes.lock().is_empty());
    assert!(!h.marker_store.contains("evt-1", now()).await.unwrap());
}

#[tokio::test]
async fn accepted_event_with_no_subscribers_is_a_normal_terminal_state() {
    let event = quake("evt-2", 55, vec![("Aomori", "Hachinohe", 55)]);
    let h = harness(StaticFeed::events(vec![event]), vec![tokyo_subscriber()]);

    let report = h.pipeline.run(now()).await.unwrap();
    assert_eq!(
        report,
        RunReport {
            fetched: 1,
            accepted: 1,
            ..RunReport::default()
        }
    );
    // The marker was still written: at-most-once favors a silent drop.
    assert!(h.marker_store.contains("evt-2", now()).await.unwrap());
}

#[tokio::test]
async fn per_recipient_detail_respects_individual_thresholds() {
    let event = quake(
        "evt-3",
        55,
        vec![("Tokyo", "Shinjuku", 55), ("Tokyo", "Setagaya", 40)],
    );
    let picky = Recipient {
        subscriber_id: "user-picky".to_string(),
        region: "Tokyo".to_string(),
        severity_threshold: 50,
    };
    let h = harness(
        StaticFeed::events(vec![event]),
        vec![tokyo_subscriber(), picky],
    );

    let report = h.pipeline.run(now()).await.unwrap();
    assert_eq!(report.dispatched, 2);

    let pushes = h.transport.pushes.lock();
    let detail_for = |who: &str| {
        pushes
            .iter()
            .find(|(to, _)| to == who)
            .map(|(_, messages)| messages[1].text.clone())
            .unwrap()
    };
    assert!(detail_for("user-tokyo").contains("Setagaya"));
    assert!(!detail_for("user-picky").contains("Setagaya"));
    assert!(detail_for("user-picky").contains("Shinjuku"));
}
