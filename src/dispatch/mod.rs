//! Per-recipient fan-out.
//!
//! Each recipient is delivered to independently: credential fetch,
//! address resolution, and the push call are isolated per recipient, so
//! one failure never aborts the rest of the set. Fan-out runs on a
//! bounded number of concurrent workers.

mod push;

pub use push::{PushClient, PushResult, PushTransport};

use std::sync::Arc;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::credentials::{CredentialManager, CredentialStore, TokenEndpoint};
use crate::message::Message;
use crate::subscribers::Recipient;
use crate::Result;

/// Resolves an opaque subscriber identifier to a real delivery address.
///
/// The decryption primitive lives entirely behind this seam; nothing
/// else in the pipeline touches it.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, subscriber_id: &str) -> Result<String>;
}

/// Identity resolver for deployments where the stored identifier is
/// already the delivery address.
pub struct PassthroughAddressResolver;

#[async_trait]
impl AddressResolver for PassthroughAddressResolver {
    async fn resolve(&self, subscriber_id: &str) -> Result<String> {
        if subscriber_id.is_empty() {
            return Err(crate::Error::AddressResolution(subscriber_id.to_string()));
        }
        Ok(subscriber_id.to_string())
    }
}

/// One composed notification for one recipient.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: Recipient,
    pub summary: Message,
    pub detail: Message,
}

/// Per-recipient outcome, collected for the caller to aggregate.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub subscriber_id: String,
    pub outcome: Result<PushResult>,
}

impl DispatchOutcome {
    #[inline]
    pub fn is_delivered(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Fans composed messages out to resolved recipients.
pub struct Dispatcher<E, CS, A, P>
where
    E: TokenEndpoint,
    CS: CredentialStore,
    A: AddressResolver,
    P: PushTransport,
{
    credentials: Arc<CredentialManager<E, CS>>,
    addresses: Arc<A>,
    transport: Arc<P>,
    config: DispatchConfig,
}

impl<E, CS, A, P> Dispatcher<E, CS, A, P>
where
    E: TokenEndpoint,
    CS: CredentialStore,
    A: AddressResolver,
    P: PushTransport,
{
    pub fn new(
        credentials: Arc<CredentialManager<E, CS>>,
        addresses: Arc<A>,
        transport: Arc<P>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            credentials,
            addresses,
            transport,
            config,
        }
    }

    /// Deliver to every recipient, bounded-concurrently, collecting one
    /// outcome per recipient.
    pub async fn notify(&self, deliveries: Vec<Delivery>) -> Vec<DispatchOutcome> {
        stream::iter(deliveries)
            .map(|delivery| self.deliver(delivery))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    async fn deliver(&self, delivery: Delivery) -> DispatchOutcome {
        let subscriber_id = delivery.recipient.subscriber_id.clone();
        let outcome = self.try_deliver(delivery).await;
        if let Err(err) = &outcome {
            warn!(subscriber = %subscriber_id, error = %err, "notification delivery failed");
        }
        DispatchOutcome {
            subscriber_id,
            outcome,
        }
    }

    async fn try_deliver(&self, delivery: Delivery) -> Result<PushResult> {
        let credential = self.credentials.get_valid(&self.config.issuer).await?;
        let address = self
            .addresses
            .resolve(&delivery.recipient.subscriber_id)
            .await?;

        // Fresh idempotency key per push attempt.
        let retry_key = Uuid::new_v4();
        let messages = [delivery.summary, delivery.detail];
        let result = self
            .transport
            .push(&credential.token, &address, &messages, retry_key)
            .await?;

        match result {
            PushResult::Delivered => {
                debug!(subscriber = %delivery.recipient.subscriber_id, "notification delivered")
            }
            PushResult::Conflict => warn!(
                subscriber = %delivery.recipient.subscriber_id,
                %retry_key,
                "push reported a recognized conflict, an earlier attempt already landed"
            ),
        }
        Ok(result)
    }
}
