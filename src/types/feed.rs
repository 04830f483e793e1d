//! Wire model for the decoded AIS feed.
//!
//! Frames arrive as JSON text: a message envelope carrying identity and
//! position plus exactly one tagged payload (position report or
//! static/voyage report), or an error envelope signalling an upstream
//! failure. Binary AIS decoding happens upstream; this module only maps
//! pre-decoded JSON into typed messages.

use serde::Deserialize;

use super::{Dimensions, Eta};
use crate::error::FeedError;

/// Kinematic payload of a position report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    #[serde(default)]
    pub course_over_ground: Option<f64>,
    #[serde(default)]
    pub speed_over_ground: Option<f64>,
    /// Raw heading as reported; 511 means "not available".
    #[serde(default)]
    pub true_heading: Option<u16>,
}

/// Classification and voyage payload of a static/voyage report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticReport {
    #[serde(default)]
    pub ship_type_code: Option<u16>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub callsign: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub eta: Option<Eta>,
    #[serde(default)]
    pub draught: Option<f64>,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
}

/// Exactly one payload accompanies each message envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeedPayload {
    PositionReport(PositionReport),
    StaticReport(StaticReport),
}

/// A decoded feed message: envelope identity/position plus tagged payload.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedMessage {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    #[serde(flatten)]
    pub payload: FeedPayload,
}

/// A well-formed frame carrying an upstream error body instead of a message.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    /// Upstream error marker; shape varies, presence is what matters.
    pub error: serde_json::Value,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorEnvelope {
    /// Human-readable description for logging.
    pub fn describe(&self) -> String {
        match &self.message {
            Some(m) => m.clone(),
            None => self.error.to_string(),
        }
    }
}

/// Result of decoding one text frame.
#[derive(Debug, Clone)]
pub enum DecodedFrame {
    Message(FeedMessage),
    /// Treated identically to a transport failure by the connection manager.
    Error(ErrorEnvelope),
}

/// Decode a raw text frame into a message or an upstream error envelope.
///
/// A frame whose top-level object carries an `error` key is an error
/// envelope even if the rest of the object would parse as a message.
pub fn decode_frame(text: &str) -> Result<DecodedFrame, FeedError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("error").is_some() {
        let envelope: ErrorEnvelope = serde_json::from_value(value)?;
        return Ok(DecodedFrame::Error(envelope));
    }
    let message: FeedMessage = serde_json::from_value(value)?;
    Ok(DecodedFrame::Message(message))
}
