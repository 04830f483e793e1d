//! Transport abstraction for the AIS feed.
//!
//! The connection state machine is written against [`FeedConnector`] /
//! [`FeedStream`] so tests can drive it with scripted streams; production
//! uses the WebSocket implementation at the bottom of this module.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::config::defaults::HANDSHAKE_WINDOW_SECS;
use crate::error::FeedError;

/// Subscription handshake sent within the handshake window after open.
///
/// Carries the credential, the message types of interest, and the global
/// bounding box. The upstream has no server-side ship-type filter, so type
/// filtering stays client-side in the classification pipeline.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    api_key: String,
    bounding_boxes: Vec<[[f64; 2]; 2]>,
    filter_message_types: Vec<String>,
}

impl SubscriptionRequest {
    /// Whole-world subscription for the given credential.
    pub fn global(credential: &str) -> Self {
        Self {
            api_key: credential.to_string(),
            bounding_boxes: vec![[[-90.0, -180.0], [90.0, 180.0]]],
            filter_message_types: vec![
                "PositionReport".to_string(),
                "ShipStaticData".to_string(),
            ],
        }
    }
}

/// Events produced by a feed stream.
#[derive(Debug)]
pub enum FrameEvent {
    /// A text frame to decode.
    Frame(String),
    /// The peer closed the stream. `clean` distinguishes an orderly close
    /// (no retry) from an abnormal one (classified by the state machine).
    Closed { clean: bool, reason: Option<String> },
}

/// An open, subscribed feed stream.
#[async_trait]
pub trait FeedStream: Send {
    /// Read the next frame. `Err` is a transport-level failure.
    async fn next_frame(&mut self) -> Result<FrameEvent, FeedError>;
}

/// Opens feed streams. One `open` call performs the transport connect and
/// the subscription handshake.
#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    async fn open(
        &self,
        subscription: &SubscriptionRequest,
    ) -> Result<Box<dyn FeedStream>, FeedError>;
}

// ============================================================================
// WebSocket implementation
// ============================================================================

type WsInner = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Production connector: WebSocket with TLS, subscription sent as one JSON
/// text frame immediately after the socket opens.
pub struct WsConnector {
    endpoint: String,
}

impl WsConnector {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl FeedConnector for WsConnector {
    async fn open(
        &self,
        subscription: &SubscriptionRequest,
    ) -> Result<Box<dyn FeedStream>, FeedError> {
        debug!(endpoint = %self.endpoint, "Opening feed connection");
        let (mut ws, _) = timeout(
            Duration::from_secs(HANDSHAKE_WINDOW_SECS),
            connect_async(self.endpoint.as_str()),
        )
        .await
        .map_err(|_| FeedError::Transport("connect timed out".to_string()))?
        .map_err(|e| FeedError::Transport(e.to_string()))?;

        let frame = serde_json::to_string(subscription)
            .map_err(|e| FeedError::Configuration(format!("subscription encode: {e}")))?;
        timeout(
            Duration::from_secs(HANDSHAKE_WINDOW_SECS),
            ws.send(Message::Text(frame)),
        )
        .await
        .map_err(|_| FeedError::Transport("subscription send timed out".to_string()))?
        .map_err(|e| FeedError::Transport(e.to_string()))?;

        info!(endpoint = %self.endpoint, "Feed subscribed");
        Ok(Box::new(WsFeedStream { inner: ws }))
    }
}

struct WsFeedStream {
    inner: WsInner,
}

#[async_trait]
impl FeedStream for WsFeedStream {
    async fn next_frame(&mut self) -> Result<FrameEvent, FeedError> {
        loop {
            match self.inner.next().await {
                None => {
                    return Ok(FrameEvent::Closed {
                        clean: false,
                        reason: None,
                    })
                }
                Some(Ok(Message::Text(text))) => return Ok(FrameEvent::Frame(text)),
                Some(Ok(Message::Close(frame))) => {
                    let (clean, reason) = match frame {
                        Some(f) => (
                            f.code == CloseCode::Normal,
                            (!f.reason.is_empty()).then(|| f.reason.to_string()),
                        ),
                        None => (true, None),
                    };
                    return Ok(FrameEvent::Closed { clean, reason });
                }
                // Ping/pong are answered by the protocol layer; binary
                // frames are not part of this feed.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(FeedError::Transport(e.to_string())),
            }
        }
    }
}
