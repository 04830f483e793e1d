//! Bounded per-vessel position history.
//!
//! Admission is a joint temporal+spatial de-duplication gate: a point is
//! recorded only if it is the vessel's first, or at least
//! [`TRACK_MIN_INTERVAL_SECS`](crate::config::defaults::TRACK_MIN_INTERVAL_SECS)
//! have elapsed AND the position moved by at least
//! [`TRACK_MIN_DELTA_DEG`](crate::config::defaults::TRACK_MIN_DELTA_DEG)
//! on either axis. Histories are capped with FIFO drop of the oldest point.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::config::defaults::{TRACK_MIN_DELTA_DEG, TRACK_MIN_INTERVAL_SECS};
use crate::types::TrackPoint;

/// Last-admitted point, kept on the monotonic clock for gate checks.
#[derive(Debug, Clone, Copy)]
struct Gate {
    at: Instant,
    lat: f64,
    lon: f64,
}

/// Records bounded position history for confirmed vessels.
#[derive(Debug)]
pub struct TrackRecorder {
    histories: HashMap<String, VecDeque<TrackPoint>>,
    gates: HashMap<String, Gate>,
    max_points: usize,
}

impl TrackRecorder {
    pub fn new(max_points: usize) -> Self {
        Self {
            histories: HashMap::new(),
            gates: HashMap::new(),
            max_points,
        }
    }

    /// Record a position if the admission gate passes.
    ///
    /// Returns true if a point was stored.
    pub fn record(
        &mut self,
        id: &str,
        lat: f64,
        lon: f64,
        speed: Option<f64>,
        course: Option<f64>,
        now: Instant,
    ) -> bool {
        if let Some(gate) = self.gates.get(id) {
            let elapsed = now.saturating_duration_since(gate.at);
            let moved = (lat - gate.lat).abs() >= TRACK_MIN_DELTA_DEG
                || (lon - gate.lon).abs() >= TRACK_MIN_DELTA_DEG;
            if elapsed < Duration::from_secs(TRACK_MIN_INTERVAL_SECS) || !moved {
                return false;
            }
        }

        let history = self.histories.entry(id.to_string()).or_default();
        if history.len() >= self.max_points {
            history.pop_front();
        }
        history.push_back(TrackPoint {
            lat,
            lon,
            timestamp: Utc::now(),
            speed,
            course,
        });
        self.gates.insert(id.to_string(), Gate { at: now, lat, lon });
        true
    }

    /// Drop a vessel's history (cap eviction of the owning record).
    pub fn remove(&mut self, id: &str) {
        self.histories.remove(id);
        self.gates.remove(id);
    }

    /// Drop all history (explicit reset).
    pub fn clear(&mut self) {
        self.histories.clear();
        self.gates.clear();
    }

    /// Copy of all histories in the published shape.
    pub fn published(&self) -> HashMap<String, Vec<TrackPoint>> {
        self.histories
            .iter()
            .map(|(id, points)| (id.clone(), points.iter().cloned().collect()))
            .collect()
    }

    #[cfg(test)]
    fn len(&self, id: &str) -> usize {
        self.histories.get(id).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> TrackRecorder {
        TrackRecorder::new(50)
    }

    #[test]
    fn first_point_always_admitted() {
        let mut tracks = recorder();
        let now = Instant::now();
        assert!(tracks.record("1", 10.0, 20.0, Some(12.0), Some(90.0), now));
        assert_eq!(tracks.len("1"), 1);
    }

    #[test]
    fn near_duplicate_within_window_collapses() {
        let mut tracks = recorder();
        let now = Instant::now();
        assert!(tracks.record("1", 10.0, 20.0, None, None, now));
        // 10s later, moved 0.0005° — fails both halves of the gate.
        let admitted = tracks.record(
            "1",
            10.0005,
            20.0005,
            None,
            None,
            now + Duration::from_secs(10),
        );
        assert!(!admitted);
        assert_eq!(tracks.len("1"), 1);
    }

    #[test]
    fn elapsed_time_alone_is_not_enough() {
        let mut tracks = recorder();
        let now = Instant::now();
        tracks.record("1", 10.0, 20.0, None, None, now);
        let admitted = tracks.record("1", 10.0, 20.0, None, None, now + Duration::from_secs(60));
        assert!(!admitted, "stationary vessel should not accrue points");
    }

    #[test]
    fn movement_alone_is_not_enough() {
        let mut tracks = recorder();
        let now = Instant::now();
        tracks.record("1", 10.0, 20.0, None, None, now);
        let admitted = tracks.record("1", 10.5, 20.0, None, None, now + Duration::from_secs(5));
        assert!(!admitted, "burst updates should be time-gated");
    }

    #[test]
    fn moved_and_aged_point_is_admitted() {
        let mut tracks = recorder();
        let now = Instant::now();
        tracks.record("1", 10.0, 20.0, None, None, now);
        let admitted = tracks.record("1", 10.01, 20.0, None, None, now + Duration::from_secs(31));
        assert!(admitted);
        assert_eq!(tracks.len("1"), 2);
    }

    #[test]
    fn history_caps_at_max_dropping_oldest() {
        let mut tracks = TrackRecorder::new(50);
        let mut now = Instant::now();
        for i in 0..51 {
            let lat = 10.0 + f64::from(i) * 0.01;
            assert!(tracks.record("1", lat, 20.0, None, None, now));
            now += Duration::from_secs(31);
        }
        assert_eq!(tracks.len("1"), 50);
        let published = tracks.published();
        let history = published.get("1").expect("history exists");
        // The first point (lat 10.0) was dropped.
        assert!((history[0].lat - 10.01).abs() < 1e-9);
        assert!((history[49].lat - 10.50).abs() < 1e-9);
    }

    #[test]
    fn remove_clears_gate_too() {
        let mut tracks = recorder();
        let now = Instant::now();
        tracks.record("1", 10.0, 20.0, None, None, now);
        tracks.remove("1");
        // Re-admitted immediately: no stale gate survives eviction.
        assert!(tracks.record("1", 10.0, 20.0, None, None, now));
    }
}
