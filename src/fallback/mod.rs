//! Deterministic simulated fleet for degraded operation.
//!
//! Whenever the live feed is unavailable — missing credential, upstream
//! proxy failure, retry exhaustion — the pipeline publishes this fleet
//! instead, so consumers never see an empty or special-cased "no data"
//! state. Vessels are anchored at real-world chokepoints and drift along
//! their stored course at their stored speed; each tick recomputes position
//! from total elapsed time, so drift is reproducible and accumulates no
//! error. No randomness anywhere.

use std::collections::HashMap;

use chrono::Utc;
use tokio::time::Instant;

use crate::geo;
use crate::pipeline::classifier::ship_type_label;
use crate::pipeline::tracks::TrackRecorder;
use crate::types::{TrackPoint, VesselRecord};

/// Why the fallback generator was activated. Logged once on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No credential configured — expected deployment mode.
    NoCredential,
    /// Credential present but no feed endpoint derivable.
    NoEndpoint,
    /// Likely credential rejection on handshake.
    AuthRejected,
    /// Upstream proxy failure signature on the transport.
    UpstreamProxy,
    /// Well-formed frame carried an upstream error body.
    ProtocolError,
    /// Bounded reconnect attempts exhausted.
    RetriesExhausted,
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCredential => write!(f, "no credential configured"),
            Self::NoEndpoint => write!(f, "no feed endpoint derivable"),
            Self::AuthRejected => write!(f, "credential rejected"),
            Self::UpstreamProxy => write!(f, "upstream proxy failure"),
            Self::ProtocolError => write!(f, "upstream protocol error"),
            Self::RetriesExhausted => write!(f, "reconnect attempts exhausted"),
        }
    }
}

/// Strategic chokepoints the simulated fleet is anchored to.
const CHOKEPOINTS: &[(&str, f64, f64)] = &[
    ("HORMUZ", 26.57, 56.25),
    ("MALACCA", 1.43, 102.89),
    ("SUEZ", 30.45, 32.35),
    ("GIBRALTAR", 35.95, -5.60),
    ("PANAMA", 9.35, -79.92),
    ("BAB EL-MANDEB", 12.58, 43.33),
    ("BOSPHORUS", 41.12, 29.08),
    ("TAIWAN STRAIT", 24.20, 119.30),
    ("DOVER STRAIT", 50.90, 1.40),
    ("GOOD HOPE", -34.80, 18.50),
];

/// One anchored simulated vessel. Fields are public so tests can build
/// custom fleets with known courses.
#[derive(Debug, Clone)]
pub struct SimulatedVessel {
    pub id: String,
    pub name: String,
    pub ship_type: u16,
    pub anchor_lat: f64,
    pub anchor_lon: f64,
    /// Degrees; drift direction.
    pub course: f64,
    /// Knots; drift magnitude.
    pub speed: f64,
}

pub struct FallbackGenerator {
    fleet: Vec<SimulatedVessel>,
    started: Instant,
    tracks: TrackRecorder,
}

impl FallbackGenerator {
    /// Standard fleet: a tanker and a military vessel per chokepoint, with
    /// courses and speeds derived from the vessel index so runs are
    /// reproducible.
    pub fn new(max_track_points: usize) -> Self {
        let mut fleet = Vec::with_capacity(CHOKEPOINTS.len() * 2);
        for (i, &(name, lat, lon)) in CHOKEPOINTS.iter().enumerate() {
            let idx = i as u32;
            fleet.push(SimulatedVessel {
                id: format!("9{:08}", idx * 2 + 1),
                name: format!("SIM TANKER {name}"),
                ship_type: 80,
                anchor_lat: lat,
                anchor_lon: lon,
                course: f64::from((idx * 73) % 360),
                speed: 8.0 + f64::from(idx % 5) * 2.0,
            });
            fleet.push(SimulatedVessel {
                id: format!("9{:08}", idx * 2 + 2),
                name: format!("SIM PATROL {name}"),
                ship_type: 35,
                anchor_lat: lat + 0.05,
                anchor_lon: lon - 0.05,
                course: f64::from((idx * 73 + 180) % 360),
                speed: 14.0 + f64::from(idx % 3) * 3.0,
            });
        }
        Self::with_fleet(fleet, max_track_points)
    }

    /// Build from an explicit fleet (used by tests).
    pub fn with_fleet(fleet: Vec<SimulatedVessel>, max_track_points: usize) -> Self {
        Self {
            fleet,
            started: Instant::now(),
            tracks: TrackRecorder::new(max_track_points),
        }
    }

    /// Produce the fleet drifted to `now`, in the live published shape.
    pub fn tick(
        &mut self,
        now: Instant,
    ) -> (
        HashMap<String, VesselRecord>,
        HashMap<String, Vec<TrackPoint>>,
    ) {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let mut vessels = HashMap::with_capacity(self.fleet.len());
        for v in &self.fleet {
            let (lat, lon) =
                geo::project_position(v.anchor_lat, v.anchor_lon, v.course, v.speed, elapsed);
            self.tracks
                .record(&v.id, lat, lon, Some(v.speed), Some(v.course), now);
            vessels.insert(
                v.id.clone(),
                VesselRecord {
                    id: v.id.clone(),
                    name: Some(v.name.clone()),
                    callsign: None,
                    lat,
                    lon,
                    course: Some(v.course),
                    speed: Some(v.speed),
                    heading: None,
                    ship_type: v.ship_type,
                    ship_type_label: ship_type_label(v.ship_type),
                    destination: None,
                    eta: None,
                    draught: None,
                    dimensions: None,
                    last_update: Utc::now(),
                },
            );
        }
        (vessels, self.tracks.published())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::{DEFAULT_MAX_TRACK_POINTS, FALLBACK_TICK_SECS};
    use std::time::Duration;

    fn eastbound() -> SimulatedVessel {
        SimulatedVessel {
            id: "900000001".to_string(),
            name: "SIM EASTBOUND".to_string(),
            ship_type: 80,
            anchor_lat: 0.0,
            anchor_lon: 50.0,
            course: 90.0,
            speed: 12.0,
        }
    }

    #[test]
    fn fleet_shape_matches_live_snapshot() {
        let mut gen = FallbackGenerator::new(DEFAULT_MAX_TRACK_POINTS);
        let (vessels, _) = gen.tick(Instant::now());
        assert!(!vessels.is_empty());
        for record in vessels.values() {
            assert!(
                crate::pipeline::classifier::is_strategic(record.ship_type),
                "simulated vessel {} has non-strategic type {}",
                record.id,
                record.ship_type
            );
            assert!(record.lat.abs() <= 90.0 && record.lon.abs() <= 180.0);
        }
    }

    #[test]
    fn eastbound_vessel_drifts_east_by_stated_speed() {
        let start = Instant::now();
        let mut gen = FallbackGenerator::with_fleet(vec![eastbound()], DEFAULT_MAX_TRACK_POINTS);
        let (before, _) = gen.tick(start);
        let (after, _) = gen.tick(start + Duration::from_secs(FALLBACK_TICK_SECS));

        let a = before.get("900000001").expect("vessel");
        let b = after.get("900000001").expect("vessel");
        assert!(b.lon > a.lon, "did not move east");
        assert!((b.lat - a.lat).abs() < 1e-6, "latitude drifted");

        // 12 kn for 10 s ≈ 61.7 m; check the drift magnitude is consistent.
        let km = crate::geo::haversine_km(a.lat, a.lon, b.lat, b.lon);
        let expected = 12.0 * crate::geo::KM_PER_NM * (FALLBACK_TICK_SECS as f64 / 3_600.0);
        assert!(
            (km - expected).abs() < expected * 0.05,
            "drifted {km} km, expected ≈{expected} km"
        );
    }

    #[test]
    fn drift_is_deterministic_for_equal_elapsed_time() {
        let start = Instant::now();
        let at = start + Duration::from_secs(40);
        let mut g1 = FallbackGenerator::with_fleet(vec![eastbound()], DEFAULT_MAX_TRACK_POINTS);
        let mut g2 = FallbackGenerator::with_fleet(vec![eastbound()], DEFAULT_MAX_TRACK_POINTS);
        g1.started = start;
        g2.started = start;
        let (a, _) = g1.tick(at);
        let (b, _) = g2.tick(at);
        let va = a.get("900000001").expect("vessel");
        let vb = b.get("900000001").expect("vessel");
        assert!((va.lat - vb.lat).abs() < 1e-12);
        assert!((va.lon - vb.lon).abs() < 1e-12);
    }
}
