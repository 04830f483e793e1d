//! Pipeline supervisor: single-writer ownership of all tracking state.
//!
//! One tokio task owns the tracker (staging map, pending buffer, confirmed
//! set, track recorder) and every timer that mutates it. Everything else —
//! the connection read task, callers of the [`VesselPipeline`] handle —
//! posts commands into the supervisor's inbox. This serializes all mutation
//! (run-to-completion per command) without shared-memory locking; readers
//! get state via atomically swapped snapshots on [`PublishedView`].

pub mod classifier;
pub mod tracker;
pub mod tracks;
pub mod view;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::defaults::FALLBACK_TICK_SECS;
use crate::config::{clamp_interval_ms, TrackerConfig};
use crate::fallback::{FallbackGenerator, FallbackReason};
use crate::types::feed::FeedMessage;
use tracker::VesselTracker;
pub use view::PublishedView;

/// Inbox capacity; bursts beyond the rate limiter's appetite queue here.
const INBOX_CAPACITY: usize = 1_024;

// ============================================================================
// Commands
// ============================================================================

/// Everything that can mutate pipeline state arrives as a command.
#[derive(Debug)]
pub enum Command {
    /// A decoded feed message from the connection read task.
    Message(FeedMessage),
    /// A malformed frame was skipped upstream; counted, nothing else.
    DecodeError,
    /// Suspend flushing and track recording; buffered mutations are kept.
    Pause,
    /// Let the next scheduled flush proceed.
    Resume,
    /// Change the publish interval (ms, clamped).
    SetUpdateInterval(u64),
    /// Clear staged, confirmed, tracks, and counters.
    Reset,
    /// Start publishing the simulated fleet.
    ActivateFallback(FallbackReason),
    /// Stop publishing the simulated fleet (reconnected or disconnected).
    DeactivateFallback,
}

// ============================================================================
// Handle
// ============================================================================

/// Owning handle for a running pipeline. Dropping without calling
/// [`shutdown`](Self::shutdown) cancels the supervisor task.
pub struct VesselPipeline {
    commands: mpsc::Sender<Command>,
    view: Arc<PublishedView>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl VesselPipeline {
    /// Spawn the supervisor task and return its handle.
    pub fn spawn(config: &TrackerConfig) -> Self {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let view = PublishedView::new();
        let cancel = CancellationToken::new();

        let supervisor = Supervisor {
            tracker: VesselTracker::new(config),
            view: Arc::clone(&view),
            inbox: rx,
            update_interval: config.update_interval(),
            max_track_points: config.max_track_points,
            paused: false,
            flush_deadline: None,
            fallback: None,
            fallback_deadline: None,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(supervisor.run());

        Self {
            commands: tx,
            view,
            cancel,
            task: Some(task),
        }
    }

    /// Command inbox sender, shared with the connection manager.
    pub fn commands(&self) -> mpsc::Sender<Command> {
        self.commands.clone()
    }

    /// Read-only published state.
    pub fn view(&self) -> Arc<PublishedView> {
        Arc::clone(&self.view)
    }

    pub async fn pause(&self) {
        let _ = self.commands.send(Command::Pause).await;
    }

    pub async fn resume(&self) {
        let _ = self.commands.send(Command::Resume).await;
    }

    pub async fn set_update_interval(&self, interval_ms: u64) {
        let _ = self
            .commands
            .send(Command::SetUpdateInterval(interval_ms))
            .await;
    }

    pub async fn reset(&self) {
        let _ = self.commands.send(Command::Reset).await;
    }

    /// Cancel the supervisor and wait for it to drain.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for VesselPipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Supervisor
// ============================================================================

struct Supervisor {
    tracker: VesselTracker,
    view: Arc<PublishedView>,
    inbox: mpsc::Receiver<Command>,
    update_interval: Duration,
    max_track_points: usize,
    paused: bool,
    /// Set on the first pending-buffer mutation after a flush.
    flush_deadline: Option<Instant>,
    /// `Some` while the simulated fleet is being published.
    fallback: Option<FallbackGenerator>,
    fallback_deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(mut self) {
        info!(
            interval_ms = self.update_interval.as_millis() as u64,
            "Pipeline supervisor started"
        );

        loop {
            // Disabled branches still need a value; it is never awaited
            // because of the branch preconditions.
            let idle = Instant::now() + Duration::from_secs(3_600);
            let flush_at = self.flush_deadline.unwrap_or(idle);
            let fallback_at = self.fallback_deadline.unwrap_or(idle);

            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("Pipeline supervisor shutting down");
                    break;
                }
                cmd = self.inbox.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            debug!("Command inbox closed — supervisor exiting");
                            break;
                        }
                    }
                }
                () = tokio::time::sleep_until(flush_at), if self.flush_deadline.is_some() => {
                    self.on_flush_timer();
                }
                () = tokio::time::sleep_until(fallback_at), if self.fallback_deadline.is_some() => {
                    self.on_fallback_tick();
                }
            }
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Message(msg) => {
                let mutated =
                    self.tracker
                        .handle_message(msg, Instant::now(), !self.paused);
                if mutated && self.flush_deadline.is_none() {
                    self.flush_deadline = Some(Instant::now() + self.update_interval);
                }
            }
            Command::DecodeError => self.tracker.note_decode_error(),
            Command::Pause => {
                if !self.paused {
                    self.paused = true;
                    info!("Pipeline paused — buffering mutations, tracks suspended");
                }
            }
            Command::Resume => {
                if self.paused {
                    self.paused = false;
                    info!("Pipeline resumed");
                    if self.tracker.has_pending() && self.flush_deadline.is_none() {
                        self.flush_deadline = Some(Instant::now() + self.update_interval);
                    }
                }
            }
            Command::SetUpdateInterval(requested_ms) => {
                let clamped = clamp_interval_ms(requested_ms);
                if clamped != requested_ms {
                    warn!(requested_ms, clamped, "Update interval clamped");
                }
                self.update_interval = Duration::from_millis(clamped);
            }
            Command::Reset => {
                self.tracker.reset();
                self.flush_deadline = None;
                let outcome = self.tracker.flush();
                self.view
                    .publish(outcome.vessels, outcome.tracks, outcome.stats);
                info!("Pipeline state reset");
            }
            Command::ActivateFallback(reason) => self.activate_fallback(reason),
            Command::DeactivateFallback => {
                if self.fallback.take().is_some() {
                    self.fallback_deadline = None;
                    self.view.set_simulated(false);
                    info!("Fallback generator deactivated");
                }
            }
        }
    }

    /// Flush timer fired: publish unless paused. When paused the buffered
    /// mutations are retained; `Resume` schedules the next flush.
    fn on_flush_timer(&mut self) {
        self.flush_deadline = None;
        if self.paused {
            debug!("Flush window elapsed while paused — holding buffer");
            return;
        }
        let outcome = self.tracker.flush();
        debug!(
            vessels = outcome.vessels.len(),
            batch = outcome.stats.last_batch_size,
            staged = outcome.stats.staged_count,
            "Snapshot published"
        );
        self.view
            .publish(outcome.vessels, outcome.tracks, outcome.stats);
    }

    fn activate_fallback(&mut self, reason: FallbackReason) {
        if self.fallback.is_some() {
            return;
        }
        warn!(%reason, "Activating fallback generator — published data is simulated");
        self.view.set_simulated(true);
        self.fallback = Some(FallbackGenerator::new(self.max_track_points));
        // Publish immediately so consumers never observe an empty state.
        self.on_fallback_tick();
    }

    fn on_fallback_tick(&mut self) {
        let Some(generator) = self.fallback.as_mut() else {
            self.fallback_deadline = None;
            return;
        };
        let now = Instant::now();
        if !self.paused {
            let (vessels, tracks) = generator.tick(now);
            self.view
                .publish(Arc::new(vessels), Arc::new(tracks), self.tracker.stats());
        }
        self.fallback_deadline = Some(now + Duration::from_secs(FALLBACK_TICK_SECS));
    }
}
