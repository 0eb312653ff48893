//! Seismic intensity scale labels.
//!
//! The feed encodes intensity as an ordinal integer with fixed label
//! boundaries (10 = "1" up to 70 = "7", with split weak/strong levels
//! at 5 and 6). Code 46 is an estimated lower-5.

/// Convert an ordinal intensity code to its human-readable label.
///
/// Unrecognized codes (including the feed's negative "not observed"
/// sentinel) map to `"unknown"`.
pub fn severity_label(scale: i32) -> &'static str {
    match scale {
        10 => "1",
        20 => "2",
        30 => "3",
        40 => "4",
        45 => "5-weak",
        46 => "5-weak (est.)",
        50 => "5-strong",
        55 => "6-weak",
        60 => "6-strong",
        70 => "7",
        _ => "unknown",
    }
}
