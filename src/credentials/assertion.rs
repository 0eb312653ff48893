//! Client assertion signing.
//!
//! The issuance exchange takes a private-key-signed claim set (issuer,
//! subject, audience, expiry) in JWT-bearer form. The `token_exp` claim
//! asks the endpoint for the issued token's own lifetime.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use crate::config::CredentialConfig;

use super::error::CredentialError;

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    exp: i64,
    token_exp: u64,
}

/// Signs short-lived RS256 assertions for one issuer.
pub struct AssertionSigner {
    issuer: String,
    subject: String,
    audience: String,
    assertion_ttl_secs: i64,
    requested_token_ttl_secs: u64,
    header: Header,
    key: EncodingKey,
}

impl AssertionSigner {
    /// Build a signer from channel configuration and a PEM private key.
    pub fn new(config: &CredentialConfig, private_key_pem: &[u8]) -> Result<Self, CredentialError> {
        let key = EncodingKey::from_rsa_pem(private_key_pem)?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(config.key_id.clone());
        header.typ = Some("JWT".to_string());

        Ok(Self {
            issuer: config.issuer.clone(),
            subject: config.subject.clone(),
            audience: config.audience.clone(),
            assertion_ttl_secs: config.assertion_ttl.as_secs() as i64,
            requested_token_ttl_secs: config.requested_token_ttl.as_secs(),
            header,
            key,
        })
    }

    /// Issuer this signer produces assertions for.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Sign an assertion expiring `assertion_ttl` after `now`.
    pub fn sign(&self, now: DateTime<Utc>) -> Result<String, CredentialError> {
        let claims = AssertionClaims {
            iss: &self.issuer,
            sub: &self.subject,
            aud: &self.audience,
            exp: now.timestamp() + self.assertion_ttl_secs,
            token_exp: self.requested_token_ttl_secs,
        };
        Ok(jsonwebtoken::encode(&self.header, &claims, &self.key)?)
    }
}
