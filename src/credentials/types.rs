//! Credential data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A live bearer credential for one issuer.
///
/// Exactly one is held per issuer at a time; a refresh replaces it
/// wholesale, never patches it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub issuer: String,
    pub token: String,
    /// Key id reported by the issuance endpoint, if any.
    pub key_id: Option<String>,
    /// When this credential was last verified or issued.
    pub validated_at: DateTime<Utc>,
}

/// Issuance endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    #[serde(default)]
    pub key_id: Option<String>,
}
