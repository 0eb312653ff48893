//! quake-quick-alert library crate.
//!
//! Event-ingestion/dedup/fan-out pipeline for seismic alerts, plus the
//! credential lifecycle manager the outbound messaging API requires.

pub mod config;
pub mod credentials;
pub mod dedup;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod feed;
pub mod message;
pub mod pipeline;
pub mod scheduler;
pub mod subscribers;

pub use error::{Error, Result};
