//! Feed connection lifecycle.
//!
//! Owns the read task: connect, subscribe, decode frames into pipeline
//! commands, and classify failures. Every terminal failure path activates
//! the fallback generator so the pipeline keeps publishing; the connection
//! state on [`PublishedView`] tells consumers which mode they are in.
//!
//! Failure taxonomy:
//! - missing credential / no endpoint: resolved before connecting, no retry
//! - implausibly short credential on abnormal close: treated as rejection
//! - upstream proxy signature in the close reason: immediate fallback
//! - error envelope in-band: immediate fallback
//! - anything else: bounded exponential backoff, then permanent fallback

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::defaults::{CREDENTIAL_PLAUSIBLE_LEN, MAX_RETRY_ATTEMPTS};
use crate::config::TrackerConfig;
use crate::fallback::FallbackReason;
use crate::pipeline::{Command, PublishedView};
use crate::types::feed::{decode_frame, DecodedFrame};
use crate::types::ConnectionState;
use transport::{FeedConnector, FeedStream, FrameEvent, SubscriptionRequest, WsConnector};

/// Manages the single upstream feed connection.
pub struct ConnectionManager {
    connector: Option<Arc<dyn FeedConnector>>,
    credential: Option<String>,
    retry_base: Duration,
    view: Arc<PublishedView>,
    commands: mpsc::Sender<Command>,
    conn_cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Production constructor: WebSocket connector from the configured
    /// endpoint.
    pub fn from_config(
        config: &TrackerConfig,
        view: Arc<PublishedView>,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        let connector = config
            .endpoint
            .as_deref()
            .map(|e| Arc::new(WsConnector::new(e)) as Arc<dyn FeedConnector>);
        Self::new(
            connector,
            config.credential.clone(),
            config.retry_base(),
            view,
            commands,
        )
    }

    /// Constructor over an arbitrary connector; tests inject scripted ones.
    pub fn new(
        connector: Option<Arc<dyn FeedConnector>>,
        credential: Option<String>,
        retry_base: Duration,
        view: Arc<PublishedView>,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            connector,
            credential,
            retry_base,
            view,
            commands,
            conn_cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Start the read task. A no-op while a connection attempt is already
    /// in flight or established; a task waiting out a backoff is replaced.
    /// Without a credential or endpoint no connection is attempted and the
    /// fallback activates immediately.
    pub async fn connect(&mut self) {
        match self.view.connection_state() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!("connect() ignored: connection already active");
                return;
            }
            _ => {}
        }

        // A previous read task may still be inside a backoff wait (state
        // Disconnected). Replace it; two retry loops must never run at once.
        self.conn_cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }

        let Some(credential) = self.credential.clone() else {
            info!("No feed credential configured — publishing simulated data");
            self.view.set_connection_state(ConnectionState::NoCredential);
            let _ = self
                .commands
                .send(Command::ActivateFallback(FallbackReason::NoCredential))
                .await;
            return;
        };
        let Some(connector) = self.connector.clone() else {
            warn!("Credential present but no feed endpoint configured — publishing simulated data");
            self.view.set_connection_state(ConnectionState::Error);
            let _ = self
                .commands
                .send(Command::ActivateFallback(FallbackReason::NoEndpoint))
                .await;
            return;
        };

        self.conn_cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            connector,
            credential,
            self.retry_base,
            Arc::clone(&self.view),
            self.commands.clone(),
            self.conn_cancel.clone(),
        ));
        self.task = Some(task);
    }

    /// Stop the read task and any fallback publishing. Idempotent.
    pub async fn disconnect(&mut self) {
        self.conn_cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        let _ = self.commands.send(Command::DeactivateFallback).await;
        self.view.set_connection_state(ConnectionState::Disconnected);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.conn_cancel.cancel();
    }
}

// ============================================================================
// Read task
// ============================================================================

enum ReadOutcome {
    /// Cancelled or pipeline gone; exit without touching state.
    Halted,
    /// Orderly close from the peer; no retry.
    CleanClose,
    /// Upstream error envelope received in-band.
    ProtocolFailure(String),
    /// Transport failure or abnormal close, with reason text if any.
    Abnormal(Option<String>),
}

async fn run_connection(
    connector: Arc<dyn FeedConnector>,
    credential: String,
    retry_base: Duration,
    view: Arc<PublishedView>,
    commands: mpsc::Sender<Command>,
    cancel: CancellationToken,
) {
    let subscription = SubscriptionRequest::global(&credential);
    let mut attempt: u32 = 0;

    loop {
        view.set_connection_state(ConnectionState::Connecting);

        let opened = tokio::select! {
            () = cancel.cancelled() => return,
            r = connector.open(&subscription) => r,
        };

        let outcome = match opened {
            Ok(mut stream) => {
                view.set_connection_state(ConnectionState::Connected);
                attempt = 0;
                // A reconnect after fallback activation supersedes the
                // simulated fleet.
                let _ = commands.send(Command::DeactivateFallback).await;
                read_frames(stream.as_mut(), &commands, &cancel).await
            }
            Err(e) => {
                warn!(error = %e, "Feed connection attempt failed");
                ReadOutcome::Abnormal(Some(e.to_string()))
            }
        };

        match outcome {
            ReadOutcome::Halted => return,
            ReadOutcome::CleanClose => {
                info!("Feed closed cleanly — not retrying");
                view.set_connection_state(ConnectionState::Disconnected);
                return;
            }
            ReadOutcome::ProtocolFailure(detail) => {
                warn!(%detail, "Upstream protocol error — switching to simulated data");
                view.set_connection_state(ConnectionState::Error);
                let _ = commands
                    .send(Command::ActivateFallback(FallbackReason::ProtocolError))
                    .await;
                return;
            }
            ReadOutcome::Abnormal(reason) => {
                // A credential too short to be real points at rejection,
                // not a transient fault; retrying would loop on the same
                // handshake failure.
                if credential.len() < CREDENTIAL_PLAUSIBLE_LEN {
                    warn!("Abnormal close with implausible credential — treating as rejection");
                    view.set_connection_state(ConnectionState::NoCredential);
                    let _ = commands
                        .send(Command::ActivateFallback(FallbackReason::AuthRejected))
                        .await;
                    return;
                }
                if reason.as_deref().is_some_and(has_proxy_signature) {
                    warn!(
                        reason = reason.as_deref().unwrap_or(""),
                        "Upstream proxy failure — switching to simulated data"
                    );
                    view.set_connection_state(ConnectionState::Error);
                    let _ = commands
                        .send(Command::ActivateFallback(FallbackReason::UpstreamProxy))
                        .await;
                    return;
                }

                attempt += 1;
                if attempt > MAX_RETRY_ATTEMPTS {
                    warn!(
                        attempts = MAX_RETRY_ATTEMPTS,
                        "Reconnect attempts exhausted — switching to simulated data"
                    );
                    view.set_connection_state(ConnectionState::Error);
                    let _ = commands
                        .send(Command::ActivateFallback(FallbackReason::RetriesExhausted))
                        .await;
                    return;
                }

                let delay = retry_base * 2u32.pow(attempt - 1);
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    reason = reason.as_deref().unwrap_or("none"),
                    "Feed connection lost — reconnecting"
                );
                view.set_connection_state(ConnectionState::Disconnected);
                tokio::select! {
                    () = cancel.cancelled() => return,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Pump frames into the pipeline until the stream ends or fails.
async fn read_frames(
    stream: &mut dyn FeedStream,
    commands: &mpsc::Sender<Command>,
    cancel: &CancellationToken,
) -> ReadOutcome {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => return ReadOutcome::Halted,
            ev = stream.next_frame() => ev,
        };
        match event {
            Ok(FrameEvent::Frame(text)) => match decode_frame(&text) {
                Ok(DecodedFrame::Message(msg)) => {
                    if commands.send(Command::Message(msg)).await.is_err() {
                        return ReadOutcome::Halted;
                    }
                }
                Ok(DecodedFrame::Error(envelope)) => {
                    return ReadOutcome::ProtocolFailure(envelope.describe());
                }
                Err(e) => {
                    debug!(error = %e, "Skipping malformed frame");
                    if commands.send(Command::DecodeError).await.is_err() {
                        return ReadOutcome::Halted;
                    }
                }
            },
            Ok(FrameEvent::Closed { clean: true, .. }) => return ReadOutcome::CleanClose,
            Ok(FrameEvent::Closed { clean: false, reason }) => {
                return ReadOutcome::Abnormal(reason)
            }
            Err(e) => return ReadOutcome::Abnormal(Some(e.to_string())),
        }
    }
}

/// Close reasons that implicate an intermediary rather than the feed itself.
fn has_proxy_signature(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    reason.contains("502") || lower.contains("bad gateway") || lower.contains("upstream")
}
