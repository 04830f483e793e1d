//! Single-writer tracking core: staging map, pending buffer, confirmed set.
//!
//! The tracker implements the two-stage staging→confirmation workflow. A
//! vessel may send arbitrarily many position reports and stay invisible; it
//! becomes externally visible only when a static/voyage report reveals a
//! strategic ship type. Mutations land in a pending buffer seeded from the
//! last published snapshot, so in-flight readers never observe a partial
//! update; the supervisor flushes the buffer at the publish cadence.
//!
//! All methods take `&mut self` — the owning supervisor task is the single
//! writer, which is what makes the buffer swap safe without locks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::classifier::{is_strategic, ship_type_label};
use super::tracks::TrackRecorder;
use crate::config::defaults::{MIN_MESSAGE_GAP_MS, STAGED_TTL_SECS};
use crate::config::TrackerConfig;
use crate::types::feed::{FeedMessage, FeedPayload, PositionReport, StaticReport};
use crate::types::{normalize_heading, StreamStats, TrackPoint, VesselRecord};

/// A kinematically-known vessel awaiting classification. Never published.
#[derive(Debug, Clone)]
struct StagedVessel {
    name: Option<String>,
    lat: f64,
    lon: f64,
    course: Option<f64>,
    speed: Option<f64>,
    heading: Option<u16>,
    last_seen: Instant,
}

/// Everything one flush publishes, produced atomically from the tracker.
pub struct FlushOutcome {
    pub vessels: Arc<HashMap<String, VesselRecord>>,
    pub tracks: Arc<HashMap<String, Vec<TrackPoint>>>,
    pub stats: StreamStats,
}

pub struct VesselTracker {
    staged: HashMap<String, StagedVessel>,
    /// Copy-on-first-touch buffer; `Some` means mutations await a flush.
    pending: Option<HashMap<String, VesselRecord>>,
    /// Last published snapshot; shared with readers via the view.
    published: Arc<HashMap<String, VesselRecord>>,
    tracks: TrackRecorder,
    stats: StreamStats,
    /// Monotonic touch counter backing least-recently-updated eviction.
    touch_seq: u64,
    touched: HashMap<String, u64>,
    batch_mutations: usize,
    last_processed: Option<Instant>,
    max_confirmed: usize,
    max_staged: usize,
}

impl VesselTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            staged: HashMap::new(),
            pending: None,
            published: Arc::new(HashMap::new()),
            tracks: TrackRecorder::new(config.max_track_points),
            stats: StreamStats::default(),
            touch_seq: 0,
            touched: HashMap::new(),
            batch_mutations: 0,
            last_processed: None,
            max_confirmed: config.max_confirmed,
            max_staged: config.max_staged,
        }
    }

    /// Apply one feed message. Returns true if the pending buffer was
    /// mutated (i.e. a flush should be scheduled).
    ///
    /// `record_tracks` is false while the pipeline is paused.
    pub fn handle_message(&mut self, msg: FeedMessage, now: Instant, record_tracks: bool) -> bool {
        // Burst shedding: drop messages arriving too close to the previously
        // *processed* one. Dropped messages do not advance the gate.
        if let Some(last) = self.last_processed {
            if now.saturating_duration_since(last) < Duration::from_millis(MIN_MESSAGE_GAP_MS) {
                self.stats.messages_dropped += 1;
                return false;
            }
        }
        self.last_processed = Some(now);
        self.stats.messages_processed += 1;

        if self.is_confirmed(&msg.id) {
            self.merge_confirmed(msg, now, record_tracks);
            return true;
        }

        match msg.payload.clone() {
            FeedPayload::StaticReport(report) => self.classify(msg, report, now, record_tracks),
            FeedPayload::PositionReport(report) => {
                self.stage_position(&msg, &report, now);
                false
            }
        }
    }

    /// Swap the pending buffer out as the new published snapshot.
    pub fn flush(&mut self) -> FlushOutcome {
        if let Some(buffer) = self.pending.take() {
            self.published = Arc::new(buffer);
        }
        self.stats.last_batch_size = self.batch_mutations;
        self.batch_mutations = 0;
        self.stats.last_flush = Some(Utc::now());
        self.stats.staged_count = self.staged.len();
        FlushOutcome {
            vessels: Arc::clone(&self.published),
            tracks: Arc::new(self.tracks.published()),
            stats: self.stats.clone(),
        }
    }

    /// Whether mutations are buffered and awaiting a flush.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn note_decode_error(&mut self) {
        self.stats.decode_errors += 1;
    }

    /// Current counters, with the staged gauge refreshed.
    pub fn stats(&mut self) -> StreamStats {
        self.stats.staged_count = self.staged.len();
        self.stats.clone()
    }

    /// Explicit reset: clears staged, confirmed, tracks, and counters.
    pub fn reset(&mut self) {
        self.staged.clear();
        self.pending = None;
        self.published = Arc::new(HashMap::new());
        self.tracks.clear();
        self.touched.clear();
        self.touch_seq = 0;
        self.batch_mutations = 0;
        self.last_processed = None;
        self.stats = StreamStats::default();
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn is_confirmed(&self, id: &str) -> bool {
        match &self.pending {
            Some(buffer) => buffer.contains_key(id),
            None => self.published.contains_key(id),
        }
    }

    /// Seed the pending buffer from the last snapshot on first touch.
    fn pending_mut(&mut self) -> &mut HashMap<String, VesselRecord> {
        self.pending
            .get_or_insert_with(|| self.published.as_ref().clone())
    }

    fn touch(&mut self, id: &str) {
        self.touch_seq += 1;
        self.touched.insert(id.to_string(), self.touch_seq);
    }

    /// Fast-path merge for an already-confirmed vessel. No reclassification:
    /// confirmed status is only ever lost to cap eviction or reset.
    fn merge_confirmed(&mut self, msg: FeedMessage, now: Instant, record_tracks: bool) {
        let FeedMessage {
            id,
            name,
            lat,
            lon,
            payload,
        } = msg;

        let buffer = self.pending_mut();
        let Some(record) = buffer.get_mut(&id) else {
            return;
        };

        record.lat = lat;
        record.lon = lon;
        if let Some(name) = name {
            record.name = Some(name);
        }

        let mut kinematic = false;
        match payload {
            FeedPayload::PositionReport(p) => {
                // Position fields overwrite outright.
                record.course = p.course_over_ground;
                record.speed = p.speed_over_ground;
                record.heading = normalize_heading(p.true_heading);
                kinematic = true;
            }
            FeedPayload::StaticReport(s) => {
                // Static fields overwrite only if present.
                if let Some(name) = s.name {
                    record.name = Some(name);
                }
                if let Some(callsign) = s.callsign {
                    record.callsign = Some(callsign);
                }
                if let Some(destination) = s.destination {
                    record.destination = Some(destination);
                }
                if let Some(eta) = s.eta {
                    record.eta = Some(eta);
                }
                if let Some(draught) = s.draught {
                    record.draught = Some(draught);
                }
                if let Some(dimensions) = s.dimensions {
                    record.dimensions = Some(dimensions);
                }
            }
        }
        record.last_update = Utc::now();
        let (speed, course) = (record.speed, record.course);

        self.batch_mutations += 1;
        self.touch(&id);
        if kinematic && record_tracks {
            self.tracks.record(&id, lat, lon, speed, course, now);
        }
    }

    /// Decide strategic relevance from a static report for an unconfirmed id.
    fn classify(
        &mut self,
        msg: FeedMessage,
        report: StaticReport,
        now: Instant,
        record_tracks: bool,
    ) -> bool {
        let Some(code) = report.ship_type_code else {
            // No type revealed — treat as a staging metadata update.
            self.stage_position(&msg, &PositionReport::default(), now);
            return false;
        };

        if !is_strategic(code) {
            // Rejection forgets the id: staged kinematics are dropped, but a
            // later strategic report may still confirm it.
            if self.staged.remove(&msg.id).is_some() {
                trace!(id = %msg.id, code, "Staged vessel rejected by classification");
            }
            return false;
        }

        let staged = self.staged.remove(&msg.id);
        let record = VesselRecord {
            id: msg.id.clone(),
            name: report
                .name
                .or(msg.name)
                .or_else(|| staged.as_ref().and_then(|s| s.name.clone())),
            callsign: report.callsign,
            lat: msg.lat,
            lon: msg.lon,
            course: staged.as_ref().and_then(|s| s.course),
            speed: staged.as_ref().and_then(|s| s.speed),
            heading: staged.as_ref().and_then(|s| s.heading),
            ship_type: code,
            ship_type_label: ship_type_label(code),
            destination: report.destination,
            eta: report.eta,
            draught: report.draught,
            dimensions: report.dimensions,
            last_update: Utc::now(),
        };
        debug!(id = %record.id, code, label = record.ship_type_label, "Vessel confirmed");

        let (lat, lon, speed, course) = (record.lat, record.lon, record.speed, record.course);
        self.pending_mut().insert(msg.id.clone(), record);
        self.touch(&msg.id);
        self.batch_mutations += 1;
        if record_tracks {
            self.tracks.record(&msg.id, lat, lon, speed, course, now);
        }
        self.enforce_confirmed_cap();
        true
    }

    /// Merge a position report into the staging area; never published.
    fn stage_position(&mut self, msg: &FeedMessage, report: &PositionReport, now: Instant) {
        let entry = self
            .staged
            .entry(msg.id.clone())
            .or_insert_with(|| StagedVessel {
                name: None,
                lat: msg.lat,
                lon: msg.lon,
                course: None,
                speed: None,
                heading: None,
                last_seen: now,
            });
        entry.lat = msg.lat;
        entry.lon = msg.lon;
        if let Some(name) = &msg.name {
            entry.name = Some(name.clone());
        }
        if report.course_over_ground.is_some() {
            entry.course = report.course_over_ground;
        }
        if report.speed_over_ground.is_some() {
            entry.speed = report.speed_over_ground;
        }
        if let Some(heading) = normalize_heading(report.true_heading) {
            entry.heading = Some(heading);
        }
        entry.last_seen = now;

        self.sweep_staged(now);
        self.enforce_staged_cap();
    }

    /// Opportunistic sweep of staged entries that aged out unclassified.
    fn sweep_staged(&mut self, now: Instant) {
        let ttl = Duration::from_secs(STAGED_TTL_SECS);
        let before = self.staged.len();
        self.staged
            .retain(|_, v| now.saturating_duration_since(v.last_seen) < ttl);
        let swept = before - self.staged.len();
        if swept > 0 {
            trace!(swept, "Aged out staged vessels");
        }
    }

    fn enforce_staged_cap(&mut self) {
        while self.staged.len() > self.max_staged {
            let oldest = self
                .staged
                .iter()
                .min_by_key(|(_, v)| v.last_seen)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.staged.remove(&id);
                }
                None => break,
            }
        }
    }

    /// Evict least-recently-updated confirmed vessels beyond the cap.
    fn enforce_confirmed_cap(&mut self) {
        loop {
            let over = match &self.pending {
                Some(buffer) => buffer.len() > self.max_confirmed,
                None => false,
            };
            if !over {
                break;
            }
            let victim = match &self.pending {
                Some(buffer) => {
                    let touched = &self.touched;
                    buffer
                        .keys()
                        .min_by_key(|id| touched.get(*id).copied().unwrap_or(0))
                        .cloned()
                }
                None => None,
            };
            let Some(id) = victim else { break };
            self.pending_mut().remove(&id);
            self.touched.remove(&id);
            self.tracks.remove(&id);
            debug!(id = %id, "Evicted least-recently-updated vessel (cap)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::feed::{FeedPayload, PositionReport, StaticReport};
    use crate::types::HEADING_UNAVAILABLE;

    fn config_with_cap(max_confirmed: usize) -> TrackerConfig {
        TrackerConfig {
            max_confirmed,
            ..TrackerConfig::default()
        }
    }

    fn tracker() -> VesselTracker {
        VesselTracker::new(&TrackerConfig::default())
    }

    fn position(id: &str, lat: f64, lon: f64) -> FeedMessage {
        FeedMessage {
            id: id.to_string(),
            name: None,
            lat,
            lon,
            payload: FeedPayload::PositionReport(PositionReport {
                course_over_ground: Some(90.0),
                speed_over_ground: Some(12.0),
                true_heading: Some(90),
            }),
        }
    }

    fn static_report(id: &str, code: u16) -> FeedMessage {
        FeedMessage {
            id: id.to_string(),
            name: Some("TEST VESSEL".to_string()),
            lat: 1.0,
            lon: 2.0,
            payload: FeedPayload::StaticReport(StaticReport {
                ship_type_code: Some(code),
                ..StaticReport::default()
            }),
        }
    }

    /// Fabricate strictly-increasing instants so the rate limiter passes.
    struct Clock {
        now: Instant,
    }
    impl Clock {
        fn new() -> Self {
            Self {
                now: Instant::now(),
            }
        }
        fn next(&mut self) -> Instant {
            self.now += Duration::from_millis(MIN_MESSAGE_GAP_MS + 1);
            self.now
        }
    }

    #[test]
    fn position_only_vessel_never_published() {
        let mut t = tracker();
        let mut clock = Clock::new();
        for i in 0..100 {
            let mutated = t.handle_message(
                position("999999999", 1.0 + f64::from(i) * 0.01, 2.0),
                clock.next(),
                true,
            );
            assert!(!mutated, "position report must not touch pending");
        }
        let flushed = t.flush();
        assert!(flushed.vessels.is_empty());
        assert_eq!(flushed.stats.staged_count, 1);
    }

    #[test]
    fn strategic_static_promotes_with_staged_kinematics() {
        let mut t = tracker();
        let mut clock = Clock::new();
        t.handle_message(position("211000001", 55.0, 12.0), clock.next(), true);
        let mutated = t.handle_message(static_report("211000001", 35), clock.next(), true);
        assert!(mutated);

        let flushed = t.flush();
        let record = flushed.vessels.get("211000001").expect("confirmed");
        assert_eq!(record.ship_type, 35);
        assert_eq!(record.ship_type_label, "Military operations");
        assert_eq!(record.course, Some(90.0));
        assert_eq!(record.speed, Some(12.0));
        assert_eq!(record.heading, Some(90));
        // Envelope position of the classifying message wins.
        assert!((record.lat - 1.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_static_yields_single_record() {
        let mut t = tracker();
        let mut clock = Clock::new();
        t.handle_message(static_report("111111111", 80), clock.next(), true);
        t.handle_message(static_report("111111111", 80), clock.next(), true);
        let flushed = t.flush();
        assert_eq!(flushed.vessels.len(), 1);
    }

    #[test]
    fn non_strategic_static_drops_and_clears_staged() {
        let mut t = tracker();
        let mut clock = Clock::new();
        t.handle_message(position("444444444", 1.0, 2.0), clock.next(), true);
        let mutated = t.handle_message(static_report("444444444", 70), clock.next(), true);
        assert!(!mutated);
        let flushed = t.flush();
        assert!(flushed.vessels.is_empty());
        assert_eq!(flushed.stats.staged_count, 0, "staged entry must be deleted");
    }

    #[test]
    fn confirmed_vessel_survives_inconsistent_later_static() {
        let mut t = tracker();
        let mut clock = Clock::new();
        t.handle_message(static_report("555000000", 80), clock.next(), true);
        // Later static with a non-strategic code: fast-path merge, never a
        // reclassification.
        t.handle_message(static_report("555000000", 70), clock.next(), true);
        let flushed = t.flush();
        let record = flushed.vessels.get("555000000").expect("still confirmed");
        assert_eq!(record.ship_type, 80);
    }

    #[test]
    fn heading_sentinel_absent_in_staged_and_confirmed() {
        let mut t = tracker();
        let mut clock = Clock::new();
        let mut msg = position("333000000", 1.0, 2.0);
        if let FeedPayload::PositionReport(ref mut p) = msg.payload {
            p.true_heading = Some(HEADING_UNAVAILABLE);
        }
        t.handle_message(msg, clock.next(), true);
        t.handle_message(static_report("333000000", 51), clock.next(), true);

        // Confirmed fast-path with the sentinel again.
        let mut update = position("333000000", 1.1, 2.1);
        if let FeedPayload::PositionReport(ref mut p) = update.payload {
            p.true_heading = Some(HEADING_UNAVAILABLE);
        }
        t.handle_message(update, clock.next(), true);

        let flushed = t.flush();
        let record = flushed.vessels.get("333000000").expect("confirmed");
        assert_eq!(record.heading, None);
    }

    #[test]
    fn cap_evicts_least_recently_updated_first() {
        let mut t = VesselTracker::new(&config_with_cap(3));
        let mut clock = Clock::new();
        t.handle_message(static_report("100000001", 80), clock.next(), true);
        t.handle_message(static_report("100000002", 80), clock.next(), true);
        t.handle_message(static_report("100000003", 80), clock.next(), true);
        // Refresh the oldest entry's priority.
        t.handle_message(position("100000001", 3.0, 4.0), clock.next(), true);
        // Fourth vessel exceeds the cap: "2" is now least recently updated.
        t.handle_message(static_report("100000004", 80), clock.next(), true);

        let flushed = t.flush();
        assert_eq!(flushed.vessels.len(), 3);
        assert!(flushed.vessels.contains_key("100000001"));
        assert!(!flushed.vessels.contains_key("100000002"));
        assert!(flushed.vessels.contains_key("100000004"));
    }

    #[test]
    fn staged_cap_evicts_oldest_entry_first() {
        let mut t = VesselTracker::new(&TrackerConfig {
            max_staged: 2,
            ..TrackerConfig::default()
        });
        let mut clock = Clock::new();
        t.handle_message(position("900000001", 1.0, 2.0), clock.next(), true);
        t.handle_message(position("900000002", 3.0, 4.0), clock.next(), true);
        // Third staged vessel overflows the cap; the oldest goes.
        t.handle_message(position("900000003", 5.0, 6.0), clock.next(), true);
        assert_eq!(t.stats().staged_count, 2);

        // Survivors still contribute kinematics on promotion; the evicted
        // vessel confirms bare.
        t.handle_message(static_report("900000002", 80), clock.next(), true);
        t.handle_message(static_report("900000001", 80), clock.next(), true);
        let flushed = t.flush();
        assert_eq!(
            flushed.vessels.get("900000002").expect("confirmed").course,
            Some(90.0)
        );
        assert_eq!(
            flushed.vessels.get("900000001").expect("confirmed").course,
            None
        );
    }

    #[test]
    fn rejected_vessel_can_confirm_on_a_later_strategic_report() {
        let mut t = tracker();
        let mut clock = Clock::new();
        // Rejection forgets the id entirely; it is not a permanent ban.
        t.handle_message(static_report("909000001", 70), clock.next(), true);
        t.handle_message(static_report("909000001", 80), clock.next(), true);
        let flushed = t.flush();
        let record = flushed.vessels.get("909000001").expect("confirmed");
        assert_eq!(record.ship_type, 80);
    }

    #[test]
    fn rate_limiter_drops_bursts_without_advancing_gate() {
        let mut t = tracker();
        let now = Instant::now();
        t.handle_message(static_report("700000001", 80), now, true);
        // 50ms later: dropped.
        t.handle_message(
            static_report("700000002", 80),
            now + Duration::from_millis(50),
            true,
        );
        // 150ms after the first processed message: accepted (gate did not
        // advance on the drop).
        t.handle_message(
            static_report("700000003", 80),
            now + Duration::from_millis(150),
            true,
        );
        let stats = t.stats();
        assert_eq!(stats.messages_processed, 2);
        assert_eq!(stats.messages_dropped, 1);
    }

    #[test]
    fn staged_entries_age_out_after_ttl() {
        let mut t = tracker();
        let start = Instant::now();
        t.handle_message(position("800000001", 1.0, 2.0), start, true);
        // A later report for another vessel triggers the sweep.
        t.handle_message(
            position("800000002", 3.0, 4.0),
            start + Duration::from_secs(STAGED_TTL_SECS + 1),
            true,
        );
        assert_eq!(t.stats().staged_count, 1);
        // The swept vessel can still be confirmed later from its static
        // report alone.
        t.handle_message(
            static_report("800000001", 80),
            start + Duration::from_secs(STAGED_TTL_SECS + 2),
            true,
        );
        let flushed = t.flush();
        assert!(flushed.vessels.contains_key("800000001"));
    }

    #[test]
    fn published_snapshot_untouched_until_flush() {
        let mut t = tracker();
        let mut clock = Clock::new();
        t.handle_message(static_report("600000001", 80), clock.next(), true);
        let first = t.flush();
        assert_eq!(first.vessels.len(), 1);

        // Mutate after the flush; the earlier snapshot must not change.
        t.handle_message(static_report("600000002", 80), clock.next(), true);
        assert!(t.has_pending());
        assert_eq!(first.vessels.len(), 1, "reader snapshot mutated in place");

        let second = t.flush();
        assert_eq!(second.vessels.len(), 2);
        assert_eq!(second.stats.last_batch_size, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut t = tracker();
        let mut clock = Clock::new();
        t.handle_message(position("1", 1.0, 2.0), clock.next(), true);
        t.handle_message(static_report("2", 80), clock.next(), true);
        t.reset();
        let flushed = t.flush();
        assert!(flushed.vessels.is_empty());
        assert_eq!(flushed.stats.messages_processed, 0);
        assert_eq!(flushed.stats.staged_count, 0);
    }
}
