//! Feed error taxonomy.
//!
//! Each variant maps to one resolution path: configuration errors fail the
//! operation that surfaced them, transport errors feed the bounded retry
//! schedule, protocol errors switch to simulated data immediately, and
//! decode errors are counted and skipped. No variant is ever allowed to
//! take the pipeline down.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    /// Invalid or unreadable configuration. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection-level failure: unreachable endpoint, dropped socket,
    /// handshake timeout. Subject to the bounded retry schedule.
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered with an error instead of data. Terminal for
    /// the connection; the pipeline falls back to simulated data.
    #[error("upstream protocol error: {0}")]
    Protocol(String),

    /// A single malformed frame. Logged, counted, and skipped; never
    /// affects the connection.
    #[error("frame decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
