//! Domain model for seismic events.
//!
//! [`QuakeEvent`] is the decoded, immutable form of one feed response element.
//! Only the event id outlives processing (as a dedup marker).

mod quake;
mod severity;

pub use quake::{AffectedPoint, FeedRecord, Hypocenter, QuakeEvent, TsunamiFlag};
pub use severity::severity_label;
