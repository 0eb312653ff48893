//! Credential error types.

use thiserror::Error;

/// Errors that can occur during credential operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Assertion signing failed (bad key or claims).
    #[error("Failed to sign assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// Network error talking to the token endpoints.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The issuance endpoint rejected the exchange.
    #[error("Token issuance rejected with status {status}: {body}")]
    IssuanceRejected { status: u16, body: String },

    /// The verification endpoint failed (not an invalid-token answer).
    #[error("Token verification call failed with status {0}")]
    VerificationFailed(u16),

    /// No signer configured for the requested issuer.
    #[error("Unknown issuer: {0}")]
    UnknownIssuer(String),

    /// JSON parse error in an endpoint response.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
