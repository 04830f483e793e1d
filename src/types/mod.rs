//! Core data model for the vessel tracking pipeline.
//!
//! The types here are the externally-visible shape of the system: confirmed
//! vessel records, track history points, connection state, and stream
//! statistics. Wire-format types for the inbound feed live in [`feed`].

pub mod feed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// AIS sentinel meaning "true heading not available". Must never surface as
/// a literal heading.
pub const HEADING_UNAVAILABLE: u16 = 511;

/// Normalize a reported true heading, mapping the sentinel to absent.
pub fn normalize_heading(heading: Option<u16>) -> Option<u16> {
    heading.filter(|&h| h != HEADING_UNAVAILABLE)
}

// ============================================================================
// Voyage metadata
// ============================================================================

/// Estimated time of arrival as reported in static/voyage messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eta {
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

/// Reported vessel dimensions in metres, relative to the GPS antenna.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub bow: u16,
    pub stern: u16,
    pub port: u16,
    pub starboard: u16,
}

// ============================================================================
// Vessel records
// ============================================================================

/// A classified, externally-visible vessel.
///
/// Invariant: a `VesselRecord` exists in the published snapshot only if its
/// `ship_type` is in the strategic allow-list
/// (see [`classifier::is_strategic`](crate::pipeline::classifier::is_strategic)).
#[derive(Debug, Clone, Serialize)]
pub struct VesselRecord {
    /// Stable numeric-string identifier, unique within the feed.
    pub id: String,
    pub name: Option<String>,
    pub callsign: Option<String>,

    // Kinematic state
    pub lat: f64,
    pub lon: f64,
    /// Course over ground in degrees.
    pub course: Option<f64>,
    /// Speed over ground in knots.
    pub speed: Option<f64>,
    /// True heading in degrees; the 511 sentinel is never stored.
    pub heading: Option<u16>,

    // Classification
    pub ship_type: u16,
    pub ship_type_label: &'static str,

    // Voyage metadata
    pub destination: Option<String>,
    pub eta: Option<Eta>,
    pub draught: Option<f64>,
    pub dimensions: Option<Dimensions>,

    pub last_update: DateTime<Utc>,
}

/// A point in a vessel's bounded position history.
#[derive(Debug, Clone, Serialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub timestamp: DateTime<Utc>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
}

// ============================================================================
// Connection state
// ============================================================================

/// Transport lifecycle state. Single source of truth for user-visible
/// connectivity; `Error` and `NoCredential` imply displayed data is
/// simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
    NoCredential,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
            Self::NoCredential => write!(f, "no_credential"),
        }
    }
}

// ============================================================================
// Stream statistics
// ============================================================================

/// Observability counters for the ingestion stream. Published with every
/// snapshot; never consulted by pipeline logic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamStats {
    /// Messages accepted by the rate limiter and applied.
    pub messages_processed: u64,
    /// Messages shed by the burst rate limiter (not errors).
    pub messages_dropped: u64,
    /// Malformed frames skipped.
    pub decode_errors: u64,
    /// Mutations included in the most recent flush.
    pub last_batch_size: usize,
    /// Wall-clock time of the most recent flush.
    pub last_flush: Option<DateTime<Utc>>,
    /// Vessels currently held in the staging area.
    pub staged_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_sentinel_is_absent() {
        assert_eq!(normalize_heading(Some(HEADING_UNAVAILABLE)), None);
        assert_eq!(normalize_heading(Some(90)), Some(90));
        assert_eq!(normalize_heading(None), None);
    }

    #[test]
    fn connection_state_display() {
        assert_eq!(ConnectionState::NoCredential.to_string(), "no_credential");
        assert_eq!(ConnectionState::Connected.to_string(), "connected");
    }
}
