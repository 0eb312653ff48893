//! Credential persistence abstraction.
//!
//! Issued credentials are persisted keyed by issuer with a server-side
//! TTL set independently of in-process verification, as a safety net if
//! verification is ever skipped or misconfigured.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use super::error::CredentialError;
use super::types::Credential;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the cached credential for an issuer, if one is live.
    async fn get(&self, issuer: &str) -> Result<Option<Credential>, CredentialError>;

    /// Replace the credential for its issuer, expiring after `ttl`.
    async fn put(&self, credential: &Credential, ttl: Duration) -> Result<(), CredentialError>;
}

/// In-memory credential store with per-entry expiry.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, (Credential, DateTime<Utc>)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, issuer: &str) -> Result<Option<Credential>, CredentialError> {
        let mut entries = self.entries.lock();
        if let Some((credential, expires_at)) = entries.get(issuer) {
            if *expires_at > Utc::now() {
                return Ok(Some(credential.clone()));
            }
        }
        entries.remove(issuer);
        Ok(None)
    }

    async fn put(&self, credential: &Credential, ttl: Duration) -> Result<(), CredentialError> {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries
            .lock()
            .insert(credential.issuer.clone(), (credential.clone(), expires_at));
        Ok(())
    }
}
