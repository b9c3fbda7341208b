//! Connection channel driver
//!
//! Runs one signaling connection: a sequential read loop feeding the
//! [`SignalingHandler`], a heartbeat task, and a writer task that owns the
//! socket sink. Works over any `Stream`/`Sink` of [`Frame`]s.

use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{far_future, ClientSession, Outbound, Outbox, SessionEvent};
use super::error::{Result, SignalingError};
use super::handler::SignalingHandler;
use crate::config::SignalingConfig;
use crate::webrtc::SignalingMessage;

/// Transport-neutral WebSocket frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

/// Drives signaling connections
pub struct ConnectionDriver {
    handler: Arc<SignalingHandler>,
    config: SignalingConfig,
}

impl ConnectionDriver {
    pub fn new(handler: Arc<SignalingHandler>, config: SignalingConfig) -> Self {
        Self { handler, config }
    }

    pub fn handler(&self) -> &Arc<SignalingHandler> {
        &self.handler
    }

    /// Serve one connection until it closes, fails or goes idle
    ///
    /// The session's media is torn down before this returns, whatever the
    /// outcome. `Ok` means the client closed the channel.
    pub async fn run<S, E, K>(&self, address: &str, mut stream: S, sink: K) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Frame, E>> + Unpin + Send,
        E: Display + Send,
        K: Sink<Frame> + Send + 'static,
        K::Error: Display,
    {
        let (outbox, outbound_rx) = Outbox::channel();
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut session = ClientSession::new(address, outbox.clone(), events_tx);
        let cancel = CancellationToken::new();

        info!("Session {} opened from {}", session.id(), address);

        let writer = tokio::spawn(write_loop(sink, outbound_rx, cancel.clone()));
        let heartbeat = tokio::spawn(heartbeat_loop(
            outbox,
            self.config.heartbeat_interval(),
            cancel.clone(),
        ));

        let result = self
            .read_loop(&mut session, &mut stream, &mut events_rx, &cancel)
            .await;

        self.handler.close(&mut session).await;
        cancel.cancel();
        let _ = heartbeat.await;
        let _ = writer.await;

        match &result {
            Ok(()) => info!("Session {} closed", session.id()),
            Err(e) => warn!("Session {} terminated: {}", session.id(), e),
        }
        result
    }

    async fn read_loop<S, E>(
        &self,
        session: &mut ClientSession,
        stream: &mut S,
        events: &mut mpsc::UnboundedReceiver<SessionEvent>,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        S: Stream<Item = std::result::Result<Frame, E>> + Unpin,
        E: Display,
    {
        let idle_timeout = self.config.idle_timeout();

        loop {
            let deadline = session.idle_deadline(idle_timeout);

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(SignalingError::Channel("outbound write failed".to_string()));
                }

                _ = tokio::time::sleep_until(deadline) => {
                    return Err(SignalingError::IdleTimeout(idle_timeout));
                }

                Some(event) = events.recv() => {
                    self.handler.handle_event(session, event).await;
                }

                frame = stream.next() => {
                    let frame = match frame {
                        Some(Ok(frame)) => frame,
                        Some(Err(e)) => return Err(SignalingError::Channel(e.to_string())),
                        None => return Ok(()),
                    };
                    session.touch();

                    match frame {
                        Frame::Text(text) => {
                            let msg: SignalingMessage = serde_json::from_str(&text)?;
                            self.handler.handle_message(session, msg).await?;
                        }
                        Frame::Binary(data) => {
                            debug!("Session {} ignoring {} byte binary frame", session.id(), data.len());
                        }
                        Frame::Ping(_) | Frame::Pong(_) => {}
                        Frame::Close => return Ok(()),
                    }
                }
            }
        }
    }
}

/// Owns the sink; serializes replies, forwarded candidates and pings
///
/// On cancellation, whatever is still queued is flushed before the close frame.
async fn write_loop<K>(
    sink: K,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
) where
    K: Sink<Frame>,
    K::Error: Display,
{
    tokio::pin!(sink);

    loop {
        let outbound = tokio::select! {
            biased;
            outbound = rx.recv() => match outbound {
                Some(outbound) => outbound,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };

        let Some(frame) = to_frame(outbound) else {
            continue;
        };
        if let Err(e) = sink.send(frame).await {
            warn!("WebSocket write failed: {}", e);
            cancel.cancel();
            return;
        }
    }

    while let Ok(outbound) = rx.try_recv() {
        if let Outbound::Signal(_) = outbound {
            if let Some(frame) = to_frame(outbound) {
                if sink.send(frame).await.is_err() {
                    return;
                }
            }
        }
    }
    let _ = sink.send(Frame::Close).await;
    let _ = sink.close().await;
}

fn to_frame(outbound: Outbound) -> Option<Frame> {
    match outbound {
        Outbound::Ping => Some(Frame::Ping(Vec::new())),
        Outbound::Signal(msg) => match serde_json::to_string(&msg) {
            Ok(text) => Some(Frame::Text(text)),
            Err(e) => {
                warn!("Failed to encode {} message: {}", msg.kind(), e);
                None
            }
        },
    }
}

async fn heartbeat_loop(outbox: Outbox, period: Duration, cancel: CancellationToken) {
    let start = Instant::now().checked_add(period).unwrap_or_else(far_future);
    let mut ticker = interval_at(start, period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if !outbox.ping() {
                    break;
                }
            }
        }
    }
}
