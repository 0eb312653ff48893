//! Environment-backed configuration.
//!
//! Every tunable is an environment variable with a default; the only
//! required values are the messaging-channel identity used to sign the
//! credential assertion. The event validity window and the severity
//! floor are deliberately deployment configuration, not constants.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Feed endpoint and the fixed pagination window it is polled with.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub code: u32,
    pub limit: u32,
    pub offset: u32,
    pub timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.p2pquake.net/v2/history".to_string(),
            code: 551,
            limit: 2,
            offset: 0,
            timeout: Duration::from_secs(5),
        }
    }
}

/// Event eligibility thresholds for the dedup gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How old an event may be and still be actionable. Also the
    /// retention window of dedup markers.
    pub validity_window: Duration,
    /// Minimum ordinal intensity worth notifying about.
    pub severity_floor: i32,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            validity_window: Duration::from_secs(600),
            severity_floor: 40,
        }
    }
}

/// Messaging-channel credential settings.
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Channel issuer the assertion is signed for.
    pub issuer: String,
    /// Subject claim of the assertion.
    pub subject: String,
    /// Key id placed in the assertion header.
    pub key_id: String,
    /// Audience claim (the messaging API base URL).
    pub audience: String,
    /// RSA private key (PEM) used to sign the assertion.
    pub private_key_path: PathBuf,
    pub token_url: String,
    pub verify_url: String,
    /// Server-side TTL applied when persisting an issued credential.
    pub token_ttl: Duration,
    /// Lifetime of the signed assertion itself.
    pub assertion_ttl: Duration,
    /// Lifetime requested for the issued token (`token_exp` claim).
    pub requested_token_ttl: Duration,
    pub timeout: Duration,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            subject: String::new(),
            key_id: String::new(),
            audience: "https://api.line.me/".to_string(),
            private_key_path: PathBuf::from("key/private.key"),
            token_url: "https://api.line.me/oauth2/v2.1/token".to_string(),
            verify_url: "https://api.line.me/oauth2/v2.1/verify".to_string(),
            token_ttl: Duration::from_secs(60 * 60 * 24 * 3),
            assertion_ttl: Duration::from_secs(60 * 30),
            requested_token_ttl: Duration::from_secs(60 * 60 * 24 * 30),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Outbound push endpoint settings.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: String,
    pub timeout: Duration,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: "https://api.line.me/v2/bot/message/push".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Polling cadence.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Fan-out settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Issuer of the credential used for outbound pushes.
    pub issuer: String,
    /// Bounded worker count for concurrent per-recipient delivery.
    pub max_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            max_concurrency: 8,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub gate: GateConfig,
    pub credentials: CredentialConfig,
    pub push: PushConfig,
    pub scheduler: SchedulerConfig,
    pub dispatch: DispatchConfig,
    /// Optional JSON file the in-memory subscriber store is seeded from.
    pub subscribers_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let issuer = required("LINE_CHANNEL_ISS")?;
        let credentials = CredentialConfig {
            issuer: issuer.clone(),
            subject: required("LINE_CHANNEL_SUB")?,
            key_id: required("LINE_CHANNEL_KID")?,
            audience: var_or("LINE_API_AUDIENCE", &defaults.credentials.audience),
            private_key_path: PathBuf::from(var_or(
                "LINE_PRIVATE_KEY_PATH",
                "key/private.key",
            )),
            token_url: var_or("LINE_TOKEN_URL", &defaults.credentials.token_url),
            verify_url: var_or("LINE_VERIFY_URL", &defaults.credentials.verify_url),
            token_ttl: secs_or("TOKEN_TTL_SECS", defaults.credentials.token_ttl)?,
            assertion_ttl: secs_or("ASSERTION_TTL_SECS", defaults.credentials.assertion_ttl)?,
            requested_token_ttl: secs_or(
                "REQUESTED_TOKEN_TTL_SECS",
                defaults.credentials.requested_token_ttl,
            )?,
            timeout: secs_or("TOKEN_TIMEOUT_SECS", defaults.credentials.timeout)?,
        };

        Ok(Self {
            feed: FeedConfig {
                base_url: var_or("QUAKE_FEED_URL", &defaults.feed.base_url),
                code: parse_or("QUAKE_FEED_CODE", defaults.feed.code)?,
                limit: parse_or("QUAKE_FEED_LIMIT", defaults.feed.limit)?,
                offset: parse_or("QUAKE_FEED_OFFSET", defaults.feed.offset)?,
                timeout: secs_or("QUAKE_FEED_TIMEOUT_SECS", defaults.feed.timeout)?,
            },
            gate: GateConfig {
                validity_window: secs_or(
                    "QUAKE_VALIDITY_WINDOW_SECS",
                    defaults.gate.validity_window,
                )?,
                severity_floor: parse_or("QUAKE_SEVERITY_FLOOR", defaults.gate.severity_floor)?,
            },
            push: PushConfig {
                url: var_or("LINE_PUSH_URL", &defaults.push.url),
                timeout: secs_or("PUSH_TIMEOUT_SECS", defaults.push.timeout)?,
            },
            scheduler: SchedulerConfig {
                poll_interval: secs_or("POLL_INTERVAL_SECS", defaults.scheduler.poll_interval)?,
            },
            dispatch: DispatchConfig {
                issuer,
                max_concurrency: parse_or(
                    "DISPATCH_CONCURRENCY",
                    defaults.dispatch.max_concurrency,
                )?,
            },
            subscribers_file: std::env::var("SUBSCRIBERS_FILE").ok().map(PathBuf::from),
            credentials,
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::config(format!("missing required environment variable {name}")))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e| Error::config(format!("invalid value for {name}: {e}"))),
        _ => Ok(default),
    }
}

fn secs_or(name: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_secs(parse_or(name, default.as_secs())?))
}
