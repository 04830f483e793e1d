//! Externally-visible pipeline state.
//!
//! Consumers (map renderers, analysis panels, exporters) read this view;
//! they never touch pipeline internals. Snapshots are swapped atomically
//! (`arc-swap`), so a reader always sees a fully-formed publish — never a
//! mix of two flush cycles. Connection state rides a `watch` channel so
//! interested consumers can await transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::types::{ConnectionState, StreamStats, TrackPoint, VesselRecord};

pub struct PublishedView {
    vessels: ArcSwap<HashMap<String, VesselRecord>>,
    tracks: ArcSwap<HashMap<String, Vec<TrackPoint>>>,
    stats: ArcSwap<StreamStats>,
    connection: watch::Sender<ConnectionState>,
    simulated: AtomicBool,
}

impl PublishedView {
    pub(crate) fn new() -> Arc<Self> {
        let (connection, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            vessels: ArcSwap::from_pointee(HashMap::new()),
            tracks: ArcSwap::from_pointee(HashMap::new()),
            stats: ArcSwap::from_pointee(StreamStats::default()),
            connection,
            simulated: AtomicBool::new(false),
        })
    }

    /// Latest confirmed-vessel snapshot.
    pub fn vessels(&self) -> Arc<HashMap<String, VesselRecord>> {
        self.vessels.load_full()
    }

    /// Latest per-vessel track histories.
    pub fn tracks(&self) -> Arc<HashMap<String, Vec<TrackPoint>>> {
        self.tracks.load_full()
    }

    /// Stream counters as of the latest publish.
    pub fn stats(&self) -> StreamStats {
        (*self.stats.load_full()).clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    /// Subscribe to connection-state transitions.
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    /// True when displayed data comes from the fallback generator.
    pub fn is_simulated(&self) -> bool {
        self.simulated.load(Ordering::Relaxed)
    }

    pub(crate) fn publish(
        &self,
        vessels: Arc<HashMap<String, VesselRecord>>,
        tracks: Arc<HashMap<String, Vec<TrackPoint>>>,
        stats: StreamStats,
    ) {
        self.vessels.store(vessels);
        self.tracks.store(tracks);
        self.stats.store(Arc::new(stats));
    }

    pub(crate) fn set_connection_state(&self, state: ConnectionState) {
        self.connection.send_replace(state);
    }

    pub(crate) fn set_simulated(&self, simulated: bool) {
        self.simulated.store(simulated, Ordering::Relaxed);
    }
}
