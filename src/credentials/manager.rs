//! Verify-then-refresh credential manager.
//!
//! Per-issuer state machine: Unknown (no usable cached credential) goes
//! through the issuance path once; Cached is verified live on every
//! request and falls back to issuance at most once when invalid. The
//! manager never returns a credential on the strength of a previous
//! call's validation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::api::TokenEndpoint;
use super::assertion::AssertionSigner;
use super::error::CredentialError;
use super::store::CredentialStore;
use super::types::Credential;

pub struct CredentialManager<E: TokenEndpoint, S: CredentialStore> {
    signers: HashMap<String, AssertionSigner>,
    endpoint: Arc<E>,
    store: Arc<S>,
    token_ttl: Duration,
    /// Serializes the issuance path per issuer. Concurrent use of an
    /// already-valid cached credential stays lock-free.
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<E: TokenEndpoint, S: CredentialStore> CredentialManager<E, S> {
    /// Create a manager holding one signer per issuer.
    pub fn new(
        signers: Vec<AssertionSigner>,
        endpoint: Arc<E>,
        store: Arc<S>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            signers: signers
                .into_iter()
                .map(|s| (s.issuer().to_string(), s))
                .collect(),
            endpoint,
            store,
            token_ttl,
            refresh_locks: DashMap::new(),
        }
    }

    /// Produce a credential verified valid within this call, refreshing
    /// at most once when the cached one is invalid or absent.
    pub async fn get_valid(&self, issuer: &str) -> Result<Credential, CredentialError> {
        let cached = self.load(issuer).await;

        if let Some(credential) = &cached {
            if self.endpoint.verify(&credential.token).await? {
                debug!(issuer, "cached credential verified valid");
                return Ok(Credential {
                    validated_at: Utc::now(),
                    ..credential.clone()
                });
            }
            info!(issuer, "cached credential no longer valid, refreshing");
        }

        self.refresh(issuer, cached.map(|c| c.token)).await
    }

    /// Best-effort read of the cached credential. A store failure means
    /// the cache holds garbage; that is an Unknown state, not an error.
    async fn load(&self, issuer: &str) -> Option<Credential> {
        match self.store.get(issuer).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!(issuer, error = %err, "cached credential unreadable, treating as absent");
                None
            }
        }
    }

    /// The issuance path, serialized per issuer. `previous` is the token
    /// this request already saw fail verification, so a refresh that a
    /// racing caller completed while we waited on the lock is reused
    /// instead of issuing twice.
    async fn refresh(
        &self,
        issuer: &str,
        previous: Option<String>,
    ) -> Result<Credential, CredentialError> {
        let lock = self
            .refresh_locks
            .entry(issuer.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(current) = self.load(issuer).await {
            if previous.as_deref() != Some(current.token.as_str())
                && self.endpoint.verify(&current.token).await?
            {
                debug!(issuer, "reusing credential refreshed by a concurrent caller");
                return Ok(Credential {
                    validated_at: Utc::now(),
                    ..current
                });
            }
        }

        let signer = self
            .signers
            .get(issuer)
            .ok_or_else(|| CredentialError::UnknownIssuer(issuer.to_string()))?;

        let assertion = signer.sign(Utc::now())?;
        let issued = self.endpoint.issue(&assertion).await?;
        let credential = Credential {
            issuer: issuer.to_string(),
            token: issued.access_token,
            key_id: issued.key_id,
            validated_at: Utc::now(),
        };
        self.store.put(&credential, self.token_ttl).await?;
        info!(issuer, "issued and cached a fresh credential");
        Ok(credential)
    }
}
