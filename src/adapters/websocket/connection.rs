//! One upgraded socket: its outbound buffer, read loop and write loop.
//!
//! ```text
//!   peer ──frames──▶ start_reading ──envelope──▶ InboundDispatcher
//!                                                    │
//!   any task ──enqueue──▶ [bounded buffer] ──▶ start_writing ──frames──▶ peer
//! ```
//!
//! The reader has no cancellation of its own. It stops when the peer goes
//! away or when someone closes the transport (`close_transport`), which is
//! what unregistration and hub shutdown do.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::WebSocketConfig;
use crate::domain::foundation::{ConnectionId, PublicUser};

use super::error::ConnectionError;
use super::messages::{ErrorCode, ErrorPayload, Frame, InboundEnvelope, MessageType, OutboundEnvelope};

/// Floor for [`ConnectionSettings::transport_frame_limit`].
const MIN_TRANSPORT_FRAME_BYTES: usize = 1024 * 1024;

/// Limits and deadlines applied to every connection.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub max_frame_bytes: usize,
    pub outbound_capacity: usize,
    pub write_timeout: Duration,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub pong_wait: Duration,
    pub handler_timeout: Duration,
}

impl ConnectionSettings {
    /// Size limit handed to the WebSocket transport on upgrade.
    ///
    /// Kept well above `max_frame_bytes` so an oversized frame still reaches
    /// the reader and is closed with a "message too big" status. Only frames
    /// past this ceiling are cut off by the transport itself.
    pub fn transport_frame_limit(&self) -> usize {
        self.max_frame_bytes
            .saturating_mul(2)
            .max(MIN_TRANSPORT_FRAME_BYTES)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&WebSocketConfig::default())
    }
}

impl From<&WebSocketConfig> for ConnectionSettings {
    fn from(config: &WebSocketConfig) -> Self {
        Self {
            max_frame_bytes: config.max_frame_bytes,
            outbound_capacity: config.outbound_buffer,
            write_timeout: config.write_timeout(),
            ping_interval: config.ping_interval(),
            ping_timeout: config.ping_timeout(),
            pong_wait: config.pong_wait(),
            handler_timeout: config.handler_timeout(),
        }
    }
}

/// Receives every envelope a connection decodes.
#[async_trait]
pub trait InboundDispatcher: Send + Sync {
    async fn dispatch(&self, connection: &Arc<Connection>, envelope: InboundEnvelope);
}

/// How a read loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// Peer sent a normal or going-away close frame.
    PeerClosed,
    /// Stream finished without a close frame.
    StreamEnded,
    /// The transport was closed on our side.
    TransportClosed,
}

/// A live client connection.
///
/// Shared as `Arc<Connection>` between the hub, its own reader and writer,
/// and whichever handler is replying to it.
pub struct Connection {
    id: ConnectionId,
    user: PublicUser,
    /// `None` once closed by unregistration or hub shutdown.
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
    transport: CancellationToken,
    close_code: OnceLock<u16>,
    /// When the peer last sent anything, pongs included.
    last_seen: Mutex<Instant>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user.id)
            .field("outbound_closed", &self.is_outbound_closed())
            .field("transport_closed", &self.is_transport_closed())
            .finish()
    }
}

impl Connection {
    /// Create a connection for `user` and the receiving end of its buffer.
    pub fn new(user: PublicUser, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let connection = Arc::new(Self {
            id: ConnectionId::new(),
            user,
            outbound: Mutex::new(Some(tx)),
            transport: CancellationToken::new(),
            close_code: OnceLock::new(),
            last_seen: Mutex::new(Instant::now()),
        });
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user(&self) -> &PublicUser {
        &self.user
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `false` when the frame was dropped: the buffer is full or
    /// already closed. Callers are never blocked by a slow peer.
    pub fn enqueue(&self, frame: Frame) -> bool {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = outbound.as_ref() else {
            tracing::debug!(connection_id = %self.id, "dropping frame for closed connection");
            return false;
        };

        match sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    connection_id = %self.id,
                    user_id = %self.user.id,
                    "outbound buffer full, dropping frame"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %self.id, "writer gone, dropping frame");
                false
            }
        }
    }

    /// Encode and queue a reply correlated with `request_id`.
    pub fn reply<P: Serialize>(&self, kind: MessageType, payload: P, request_id: &str) -> bool {
        match OutboundEnvelope::reply(kind, payload, request_id).encode() {
            Ok(frame) => self.enqueue(frame),
            Err(error) => {
                tracing::error!(connection_id = %self.id, %error, "failed to encode reply");
                self.reply_error(ErrorCode::InternalServerError, request_id)
            }
        }
    }

    /// Queue an `error` reply.
    pub fn reply_error(&self, code: ErrorCode, request_id: &str) -> bool {
        let envelope =
            OutboundEnvelope::reply(MessageType::Error, ErrorPayload::from(code), request_id);
        match envelope.encode() {
            Ok(frame) => self.enqueue(frame),
            Err(error) => {
                tracing::error!(connection_id = %self.id, %error, "failed to encode error reply");
                false
            }
        }
    }

    /// Close the outbound buffer. Returns `true` only for the call that
    /// actually closed it.
    ///
    /// Frames already queued are still written before the writer closes
    /// the socket.
    pub fn close_outbound(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    pub fn is_outbound_closed(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Close the socket underneath both loops with the given status.
    ///
    /// The first status recorded wins.
    pub fn close_transport(&self, code: u16) {
        let _ = self.close_code.set(code);
        self.transport.cancel();
    }

    pub fn is_transport_closed(&self) -> bool {
        self.transport.is_cancelled()
    }

    fn mark_seen(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the peer last sent a frame.
    pub fn idle_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    fn recorded_close_code(&self) -> u16 {
        self.close_code.get().copied().unwrap_or(close_code::NORMAL)
    }

    // ============================================
    // Read path
    // ============================================

    /// Read frames until the peer goes away, the transport is closed, or a
    /// frame is oversized or malformed.
    ///
    /// Every decoded envelope is handed to `dispatcher` under
    /// `settings.handler_timeout`; reading resumes once it returns or times
    /// out.
    pub async fn start_reading<S>(
        self: &Arc<Self>,
        mut stream: S,
        dispatcher: &dyn InboundDispatcher,
        settings: &ConnectionSettings,
    ) -> Result<ReadEnd, ConnectionError>
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    {
        let result = self.read_loop(&mut stream, dispatcher, settings).await;
        match &result {
            Ok(end) => {
                tracing::info!(connection_id = %self.id, ?end, "reader finished");
            }
            Err(error) if error.is_disconnect() => {
                tracing::info!(connection_id = %self.id, %error, "peer disconnected");
            }
            Err(error) => {
                tracing::error!(connection_id = %self.id, %error, "reader failed");
                self.close_transport(error.close_code());
            }
        }
        result
    }

    async fn read_loop<S>(
        self: &Arc<Self>,
        stream: &mut S,
        dispatcher: &dyn InboundDispatcher,
        settings: &ConnectionSettings,
    ) -> Result<ReadEnd, ConnectionError>
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
    {
        loop {
            let message = tokio::select! {
                _ = self.transport.cancelled() => return Ok(ReadEnd::TransportClosed),
                next = stream.next() => match next {
                    Some(message) => message?,
                    None => return Ok(ReadEnd::StreamEnded),
                },
            };
            self.mark_seen();

            let bytes: &[u8] = match &message {
                Message::Text(text) => text.as_bytes(),
                Message::Binary(data) => data.as_slice(),
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(frame) => {
                    return match frame.as_ref().map(|frame| frame.code) {
                        None | Some(close_code::NORMAL) | Some(close_code::AWAY) => {
                            Ok(ReadEnd::PeerClosed)
                        }
                        Some(code) => Err(ConnectionError::AbnormalClose(code)),
                    };
                }
            };

            if bytes.len() > settings.max_frame_bytes {
                return Err(ConnectionError::FrameTooLarge {
                    size: bytes.len(),
                    limit: settings.max_frame_bytes,
                });
            }

            let envelope: InboundEnvelope = serde_json::from_slice(bytes)?;
            self.dispatch_with_deadline(envelope, dispatcher, settings.handler_timeout)
                .await;
        }
    }

    async fn dispatch_with_deadline(
        self: &Arc<Self>,
        envelope: InboundEnvelope,
        dispatcher: &dyn InboundDispatcher,
        deadline: Duration,
    ) {
        let action = envelope.action.clone();
        let request_id = envelope.request_id.clone();

        if tokio::time::timeout(deadline, dispatcher.dispatch(self, envelope))
            .await
            .is_err()
        {
            tracing::warn!(
                connection_id = %self.id,
                %action,
                %request_id,
                "handler timed out"
            );
            self.reply_error(ErrorCode::InternalServerError, &request_id);
        }
    }

    // ============================================
    // Write path
    // ============================================

    /// Drain the outbound buffer to the socket and keep it alive with pings.
    ///
    /// A peer silent for longer than `settings.pong_wait` is treated as gone.
    ///
    /// Returns after an orderly close once `shutdown` fires, the transport
    /// is closed, or the outbound buffer is closed and drained. A failed or
    /// timed-out write closes the transport so the reader stops too.
    pub async fn start_writing<K>(
        &self,
        mut sink: K,
        outbound: mpsc::Receiver<Frame>,
        shutdown: CancellationToken,
        settings: &ConnectionSettings,
    ) where
        K: Sink<Message, Error = axum::Error> + Unpin + Send,
    {
        match self.write_loop(&mut sink, outbound, &shutdown, settings).await {
            Ok(code) => {
                self.close_transport(code);
                let code = self.recorded_close_code();
                let frame = Message::Close(Some(CloseFrame {
                    code,
                    reason: Cow::Borrowed(""),
                }));
                // The peer may already be gone; there is nobody left to tell.
                if let Err(error) =
                    send_with_deadline(&mut sink, frame, settings.write_timeout, ConnectionError::WriteTimeout)
                        .await
                {
                    tracing::debug!(connection_id = %self.id, %error, "close frame not delivered");
                }
                let _ = sink.close().await;
                tracing::info!(connection_id = %self.id, code, "writer finished");
            }
            Err(error) => {
                if error.is_disconnect() {
                    tracing::info!(connection_id = %self.id, %error, "peer disconnected");
                } else {
                    tracing::error!(connection_id = %self.id, %error, "writer failed");
                }
                self.close_transport(close_code::ERROR);
            }
        }
    }

    async fn write_loop<K>(
        &self,
        sink: &mut K,
        mut outbound: mpsc::Receiver<Frame>,
        shutdown: &CancellationToken,
        settings: &ConnectionSettings,
    ) -> Result<u16, ConnectionError>
    where
        K: Sink<Message, Error = axum::Error> + Unpin + Send,
    {
        let mut keepalive =
            tokio::time::interval_at(Instant::now() + settings.ping_interval, settings.ping_interval);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(close_code::AWAY),
                _ = self.transport.cancelled() => return Ok(self.recorded_close_code()),
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        let message = Message::Text(frame.to_string());
                        send_with_deadline(sink, message, settings.write_timeout, ConnectionError::WriteTimeout)
                            .await?;
                    }
                    None => return Ok(self.recorded_close_code()),
                },
                _ = keepalive.tick() => {
                    let idle = self.idle_for();
                    if idle > settings.pong_wait {
                        return Err(ConnectionError::PongTimeout(idle));
                    }
                    send_with_deadline(sink, Message::Ping(Vec::new()), settings.ping_timeout, ConnectionError::PingTimeout)
                        .await?;
                }
            }
        }
    }
}

async fn send_with_deadline<K>(
    sink: &mut K,
    message: Message,
    deadline: Duration,
    on_timeout: ConnectionError,
) -> Result<(), ConnectionError>
where
    K: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    match tokio::time::timeout(deadline, sink.send(message)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(on_timeout),
    }
}
