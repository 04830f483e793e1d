//! Pipeline constants and default tuning values.
//!
//! Anything an operator may reasonably tune lives in
//! [`TrackerConfig`](crate::config::TrackerConfig); fixed protocol behaviour
//! lives here.

/// Default AIS stream endpoint.
pub const DEFAULT_ENDPOINT: &str = "wss://stream.aisstream.io/v0/stream";

/// Default publish interval between snapshot flushes.
pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 5_000;

/// Publish interval clamp bounds.
pub const MIN_UPDATE_INTERVAL_MS: u64 = 1_000;
pub const MAX_UPDATE_INTERVAL_MS: u64 = 60_000;

/// Messages arriving closer together than this are dropped (burst shedding).
pub const MIN_MESSAGE_GAP_MS: u64 = 100;

/// Staged vessels not reclassified within this window are swept.
pub const STAGED_TTL_SECS: u64 = 120;

/// Confirmed-set cap (least-recently-updated eviction beyond this).
pub const DEFAULT_MAX_CONFIRMED: usize = 500;

/// Staging-area cap (oldest-first eviction beyond this).
pub const DEFAULT_MAX_STAGED: usize = 1_000;

/// Per-vessel track history cap (FIFO drop of oldest).
pub const DEFAULT_MAX_TRACK_POINTS: usize = 50;

/// Minimum seconds between recorded track points for one vessel.
pub const TRACK_MIN_INTERVAL_SECS: u64 = 30;

/// Minimum per-axis movement (degrees) for a new track point.
pub const TRACK_MIN_DELTA_DEG: f64 = 0.001;

/// Base reconnect delay; doubles on each attempt.
pub const DEFAULT_RETRY_BASE_MS: u64 = 3_000;

/// Reconnect attempts before permanent fallback.
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Fallback fleet refresh cadence.
pub const FALLBACK_TICK_SECS: u64 = 10;

/// Window for completing the subscription handshake after the socket opens.
pub const HANDSHAKE_WINDOW_SECS: u64 = 5;

/// Credentials shorter than this are treated as malformed: an abnormal close
/// with such a credential is classified as an auth rejection, not retried.
pub const CREDENTIAL_PLAUSIBLE_LEN: usize = 16;
