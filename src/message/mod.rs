//! Notification payload composition.
//!
//! Pure functions of their inputs: the same event always produces the
//! same two messages. The summary describes the occurrence; the detail
//! enumerates the points a specific recipient cares about.

use chrono_tz::Asia::Tokyo;
use serde::{Deserialize, Serialize};

use crate::domain::{severity_label, AffectedPoint, QuakeEvent};

const UNKNOWN: &str = "unknown";
const DETAIL_HEADER: &str = "Affected areas";

/// One outbound message in the push payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Compose the event summary message.
pub fn compose_summary(event: &QuakeEvent) -> Message {
    let occurred = event
        .occurred_at
        .with_timezone(&Tokyo)
        .format("%Y/%m/%d %H:%M:%S");
    let hypo = event.hypocenter.as_ref();

    let name = hypo
        .and_then(|h| h.name.as_deref())
        .unwrap_or(UNKNOWN)
        .to_string();
    let magnitude = hypo
        .and_then(|h| h.magnitude)
        .map(|m| format!("M{m:.1}"))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let depth = hypo
        .and_then(|h| h.depth_km)
        .map(|d| format!("{d:.0} km"))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let latitude = hypo
        .and_then(|h| h.latitude)
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let longitude = hypo
        .and_then(|h| h.longitude)
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let intensity = event
        .max_severity
        .map(severity_label)
        .unwrap_or(UNKNOWN);

    let text = format!(
        "Earthquake information\n\
         Occurred: {occurred} JST\n\
         Epicenter: {name}\n\
         Magnitude: {magnitude}\n\
         Depth: {depth}\n\
         Latitude: {latitude}\n\
         Longitude: {longitude}\n\
         Max intensity: {intensity}\n\
         Tsunami: {tsunami}",
        tsunami = event.tsunami.label(),
    );
    Message::text(text)
}

/// Compose the region-detail message for an already-filtered point list.
///
/// An empty list produces a valid headers-only message; that is a
/// defined boundary case, not an error.
pub fn compose_detail(points: &[AffectedPoint]) -> Message {
    let mut text = String::from(DETAIL_HEADER);
    for point in points {
        text.push('\n');
        text.push_str(&format!(
            "{} {} {}",
            point.region,
            point.locality,
            severity_label(point.severity)
        ));
    }
    Message::text(text)
}
