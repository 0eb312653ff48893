//! Seismic event model and feed wire format.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Asia::Tokyo;
use serde::{Deserialize, Serialize};

/// Feed timestamps are JST wall-clock strings in this format.
const FEED_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Domestic tsunami assessment attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum TsunamiFlag {
    None,
    Checking,
    NonEffective,
    Watch,
    Warning,
    #[default]
    Unknown,
}

impl<'de> Deserialize<'de> for TsunamiFlag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // The feed occasionally grows new values; map them to Unknown
        // instead of failing the whole batch.
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "None" => Self::None,
            "Checking" => Self::Checking,
            "NonEffective" => Self::NonEffective,
            "Watch" => Self::Watch,
            "Warning" => Self::Warning,
            _ => Self::Unknown,
        })
    }
}

impl TsunamiFlag {
    /// Human-readable status for the summary message.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none expected",
            Self::Checking => "under assessment",
            Self::NonEffective => "no damage expected",
            Self::Watch => "tsunami watch",
            Self::Warning => "tsunami warning",
            Self::Unknown => "unknown",
        }
    }
}

/// Hypocenter details. Every field is optional; the feed uses sentinel
/// values (-1, -200, empty name) for anything it has not determined yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypocenter {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth_km: Option<f64>,
    pub magnitude: Option<f64>,
}

/// One observation point affected by an event, in feed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedPoint {
    /// Top-level region (prefecture) the point belongs to.
    pub region: String,
    /// Locality within the region.
    pub locality: String,
    /// Ordinal intensity observed at this point.
    pub severity: i32,
}

/// Immutable record of one seismic occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct QuakeEvent {
    /// Globally unique per feed.
    pub id: String,
    pub occurred_at: DateTime<Utc>,
    /// Maximum observed intensity, if the feed has determined one.
    pub max_severity: Option<i32>,
    pub hypocenter: Option<Hypocenter>,
    pub tsunami: TsunamiFlag,
    /// Affected points in feed order.
    pub points: Vec<AffectedPoint>,
}

impl QuakeEvent {
    /// Decode a wire record into an event.
    ///
    /// Returns `None` when the occurrence time is unparseable; one bad
    /// row must not fail the whole batch, the caller drops it with a
    /// warning.
    pub fn from_record(record: FeedRecord) -> Option<Self> {
        let occurred_at = parse_feed_time(&record.earthquake.time)?;
        Some(Self {
            id: record.id,
            occurred_at,
            max_severity: record.earthquake.max_scale.filter(|s| *s > 0),
            hypocenter: record.earthquake.hypocenter.map(HypocenterRecord::normalize),
            tsunami: record.earthquake.domestic_tsunami.unwrap_or_default(),
            points: record
                .points
                .into_iter()
                .map(|p| AffectedPoint {
                    region: p.pref,
                    locality: p.addr,
                    severity: p.scale,
                })
                .collect(),
        })
    }
}

/// Parse a JST wall-clock string from the feed into UTC.
pub fn parse_feed_time(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, FEED_TIME_FORMAT).ok()?;
    // JST has no DST, a wall-clock time maps to exactly one instant.
    Tokyo
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

// ---------- wire format ----------

/// One element of the feed's history response.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedRecord {
    pub id: String,
    pub earthquake: EarthquakeRecord,
    #[serde(default)]
    pub points: Vec<PointRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EarthquakeRecord {
    pub time: String,
    #[serde(rename = "maxScale")]
    pub max_scale: Option<i32>,
    #[serde(rename = "domesticTsunami")]
    pub domestic_tsunami: Option<TsunamiFlag>,
    pub hypocenter: Option<HypocenterRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HypocenterRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub magnitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PointRecord {
    pub pref: String,
    #[serde(default)]
    pub addr: String,
    pub scale: i32,
}

impl HypocenterRecord {
    /// Map the feed's "not determined" sentinels to `None`.
    fn normalize(self) -> Hypocenter {
        Hypocenter {
            name: self.name.filter(|n| !n.is_empty()),
            latitude: self.latitude.filter(|v| *v >= -90.0),
            longitude: self.longitude.filter(|v| *v >= -180.0),
            depth_km: self.depth.filter(|v| *v >= 0.0),
            magnitude: self.magnitude.filter(|v| *v >= 0.0),
        }
    }
}
