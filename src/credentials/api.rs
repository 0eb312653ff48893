//! Token issuance and verification endpoints.

use async_trait::async_trait;
use tracing::debug;

use crate::config::CredentialConfig;

use super::error::CredentialError;
use super::types::IssuedToken;

const GRANT_TYPE: &str = "client_credentials";
const ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Credential issuance/verification collaborator.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange a signed assertion for a bearer token.
    async fn issue(&self, assertion: &str) -> Result<IssuedToken, CredentialError>;

    /// Check a token against the verification endpoint.
    ///
    /// `Ok(true)` for any non-error response, `Ok(false)` when the
    /// endpoint reports the token invalid, `Err` when the call itself
    /// failed and nothing can be concluded.
    async fn verify(&self, token: &str) -> Result<bool, CredentialError>;
}

/// HTTP client for the messaging API's OAuth endpoints.
pub struct TokenApiClient {
    token_url: String,
    verify_url: String,
    client: reqwest::Client,
}

impl TokenApiClient {
    pub fn new(config: &CredentialConfig) -> Result<Self, CredentialError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            token_url: config.token_url.clone(),
            verify_url: config.verify_url.clone(),
            client,
        })
    }
}

#[async_trait]
impl TokenEndpoint for TokenApiClient {
    async fn issue(&self, assertion: &str) -> Result<IssuedToken, CredentialError> {
        debug!("requesting channel access token");

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", GRANT_TYPE),
                ("client_assertion_type", ASSERTION_TYPE),
                ("client_assertion", assertion),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::IssuanceRejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }

    async fn verify(&self, token: &str) -> Result<bool, CredentialError> {
        debug!("verifying channel access token");

        let response = self
            .client
            .get(&self.verify_url)
            .query(&[("access_token", token)])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.is_client_error() {
            Ok(false)
        } else {
            Err(CredentialError::VerificationFailed(status.as_u16()))
        }
    }
}
