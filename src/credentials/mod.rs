//! Messaging-credential lifecycle.
//!
//! The outbound messaging API requires a short-lived bearer token. The
//! manager owns its lifecycle: sign an assertion, exchange it for a
//! token, cache it in an external store with a server-side TTL, and
//! verify it live before every use, refreshing transparently when the
//! cached token is invalid or the cache holds garbage.
//!
//! # Architecture
//!
//! - [`AssertionSigner`]: signs the RS256 client assertion per issuer
//! - [`TokenEndpoint`]: issuance/verification HTTP collaborator
//! - [`CredentialStore`]: external persistence keyed by issuer
//! - [`CredentialManager`]: verify-then-refresh state machine

mod api;
mod assertion;
mod error;
mod manager;
mod store;
mod types;

pub use api::{TokenApiClient, TokenEndpoint};
pub use assertion::AssertionSigner;
pub use error::CredentialError;
pub use manager::CredentialManager;
pub use store::{CredentialStore, MemoryCredentialStore};
pub use types::{Credential, IssuedToken};
