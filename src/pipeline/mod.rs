//! One poll-to-push pipeline run.
//!
//! Feed → dedup gate → recipient resolution → composition → dispatch.
//! A feed failure aborts the run (there is nothing to process); a
//! failure while processing one event is logged and counted, and the
//! remaining events continue.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::credentials::{CredentialStore, TokenEndpoint};
use crate::dedup::{Decision, DedupGate, MarkerStore, RejectReason};
use crate::dispatch::{AddressResolver, Delivery, Dispatcher, PushTransport};
use crate::domain::QuakeEvent;
use crate::feed::FeedSource;
use crate::message::{compose_detail, compose_summary};
use crate::subscribers::{points_for_recipient, RecipientResolver, SubscriberStore};
use crate::Result;

/// Fixed feed window the pipeline polls with.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub feed_code: u32,
    pub feed_limit: u32,
    pub feed_offset: u32,
}

/// Counts for one run, for the per-run summary log and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Events returned by the feed.
    pub fetched: usize,
    /// Events rejected by the gate (stale, below floor, already seen).
    pub skipped: usize,
    /// Events that passed the gate.
    pub accepted: usize,
    /// Successful per-recipient deliveries (conflicts included).
    pub dispatched: usize,
    /// Per-recipient delivery failures.
    pub delivery_failures: usize,
    /// Events abandoned because a collaborator failed mid-processing.
    pub event_failures: usize,
}

enum EventOutcome {
    Skipped(RejectReason),
    /// Accepted, but no qualifying region or no subscriber. A normal
    /// terminal state.
    NoAudience,
    Dispatched {
        delivered: usize,
        failed: usize,
    },
}

pub struct QuakePipeline<F, M, S, E, CS, A, P>
where
    F: FeedSource,
    M: MarkerStore,
    S: SubscriberStore,
    E: TokenEndpoint,
    CS: CredentialStore,
    A: AddressResolver,
    P: PushTransport,
{
    feed: F,
    gate: DedupGate<M>,
    resolver: RecipientResolver<S>,
    dispatcher: Dispatcher<E, CS, A, P>,
    config: PipelineConfig,
}

impl<F, M, S, E, CS, A, P> QuakePipeline<F, M, S, E, CS, A, P>
where
    F: FeedSource,
    M: MarkerStore,
    S: SubscriberStore,
    E: TokenEndpoint,
    CS: CredentialStore,
    A: AddressResolver,
    P: PushTransport,
{
    pub fn new(
        feed: F,
        gate: DedupGate<M>,
        resolver: RecipientResolver<S>,
        dispatcher: Dispatcher<E, CS, A, P>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            feed,
            gate,
            resolver,
            dispatcher,
            config,
        }
    }

    /// Execute one run. Errors only when the feed call itself fails;
    /// everything downstream is isolated per event or per recipient and
    /// reflected in the report.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let events = self
            .feed
            .fetch(
                self.config.feed_code,
                self.config.feed_limit,
                self.config.feed_offset,
            )
            .await?;

        let mut report = RunReport {
            fetched: events.len(),
            ..RunReport::default()
        };
        if events.is_empty() {
            debug!("feed returned no events");
            return Ok(report);
        }

        // Feed order is the only ordering guarantee; process in it.
        for event in &events {
            match self.process_event(event, now).await {
                Ok(EventOutcome::Skipped(reason)) => {
                    debug!(event = %event.id, %reason, "event skipped");
                    report.skipped += 1;
                }
                Ok(EventOutcome::NoAudience) => report.accepted += 1,
                Ok(EventOutcome::Dispatched { delivered, failed }) => {
                    report.accepted += 1;
                    report.dispatched += delivered;
                    report.delivery_failures += failed;
                }
                Err(err) => {
                    error!(event = %event.id, error = %err, "abandoning event after collaborator failure");
                    report.event_failures += 1;
                }
            }
        }

        info!(
            fetched = report.fetched,
            accepted = report.accepted,
            skipped = report.skipped,
            dispatched = report.dispatched,
            delivery_failures = report.delivery_failures,
            event_failures = report.event_failures,
            "poll run complete"
        );
        Ok(report)
    }

    async fn process_event(&self, event: &QuakeEvent, now: DateTime<Utc>) -> Result<EventOutcome> {
        match self.gate.accepts(event, now).await? {
            Decision::Rejected(reason) => return Ok(EventOutcome::Skipped(reason)),
            Decision::Accepted => {}
        }
        // The marker is written from here on: any failure below drops
        // the notification rather than risking a duplicate next poll.

        let regions = self.resolver.affected_regions(event);
        if regions.is_empty() {
            debug!(event = %event.id, "no affected region at or above the severity floor");
            return Ok(EventOutcome::NoAudience);
        }

        let recipients = self.resolver.resolve(event).await?;
        if recipients.is_empty() {
            debug!(event = %event.id, ?regions, "no subscribers registered for affected regions");
            return Ok(EventOutcome::NoAudience);
        }

        let summary = compose_summary(event);
        let deliveries: Vec<Delivery> = recipients
            .into_iter()
            .map(|recipient| {
                let points = points_for_recipient(event, &recipient);
                Delivery {
                    detail: compose_detail(&points),
                    summary: summary.clone(),
                    recipient,
                }
            })
            .collect();

        let outcomes = self.dispatcher.notify(deliveries).await;
        let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
        let failed = outcomes.len() - delivered;
        info!(event = %event.id, delivered, failed, "event fan-out finished");
        Ok(EventOutcome::Dispatched { delivered, failed })
    }
}

/// Object-safe handle the scheduler drives runs through.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn run(&self, now: DateTime<Utc>) -> Result<RunReport>;
}

#[async_trait]
impl<F, M, S, E, CS, A, P> PipelineRunner for QuakePipeline<F, M, S, E, CS, A, P>
where
    F: FeedSource,
    M: MarkerStore,
    S: SubscriberStore,
    E: TokenEndpoint,
    CS: CredentialStore,
    A: AddressResolver,
    P: PushTransport,
{
    async fn run(&self, now: DateTime<Utc>) -> Result<RunReport> {
        QuakePipeline::run(self, now).await
    }
}
