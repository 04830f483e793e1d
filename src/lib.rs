//! seawatch: live maritime vessel tracking
//!
//! Ingests a pre-decoded AIS feed over WebSocket, classifies vessels
//! against a strategic ship-type allow-list, and publishes batched
//! position snapshots with per-vessel track histories.
//!
//! ## Architecture
//!
//! - **Connection**: WebSocket subscribe/read task with failure
//!   classification and bounded reconnect
//! - **Pipeline**: single-writer supervisor owning staging, confirmation,
//!   track recording, and the publish cadence
//! - **Fallback**: deterministic simulated fleet for degraded operation
//! - **View**: atomically swapped snapshots for consumers

pub mod config;
pub mod connection;
pub mod error;
pub mod fallback;
pub mod geo;
pub mod pipeline;
pub mod types;

// Re-export configuration
pub use config::TrackerConfig;

// Re-export the pipeline surface
pub use pipeline::{Command, PublishedView, VesselPipeline};

// Re-export the connection surface
pub use connection::transport::{FeedConnector, FeedStream, FrameEvent, SubscriptionRequest};
pub use connection::ConnectionManager;

// Re-export commonly used types
pub use error::FeedError;
pub use fallback::{FallbackGenerator, FallbackReason, SimulatedVessel};
pub use types::{ConnectionState, StreamStats, TrackPoint, VesselRecord};
