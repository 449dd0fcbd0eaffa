/// SSE stream sessions
///
/// A session moves `Connecting -> Open -> Closed` exactly once. Closing
/// cancels the heartbeat task and unregisters the connection; it runs when
/// the body stream is dropped (client disconnect), when the stream drains
/// after the connection was replaced or removed, or on server shutdown.
use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::messages::{encode_frame, LiveEvent};
use super::registry::{Connection, ConnectionId, ConnectionRegistry, FrameSender};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Open,
    Closed,
}

struct StreamSession {
    registry: Arc<ConnectionRegistry>,
    user_id: String,
    connection_id: ConnectionId,
    shutdown: CancellationToken,
    heartbeat: Option<JoinHandle<()>>,
    state: StreamState,
    opened: Instant,
}

impl StreamSession {
    fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }

        self.shutdown.cancel();
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        let removed = self
            .registry
            .unregister_connection(&self.user_id, self.connection_id);
        self.state = StreamState::Closed;

        tracing::info!(
            feed = %self.registry.feed(),
            user_id = %self.user_id,
            connection_id = %self.connection_id,
            unregistered = removed,
            open_secs = self.opened.elapsed().as_secs(),
            "Stream closed"
        );
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Body of an open SSE response
///
/// Yields `data: <JSON>\n\n` frames in the order they were queued.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Bytes>,
    session: StreamSession,
}

impl EventStream {
    pub fn connection_id(&self) -> ConnectionId {
        self.session.connection_id
    }

    pub fn user_id(&self) -> &str {
        &self.session.user_id
    }

    pub fn state(&self) -> StreamState {
        self.session.state
    }

    /// End the stream from the server side.
    pub fn close(&mut self) {
        self.session.close();
    }
}

impl Stream for EventStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.session.state == StreamState::Closed {
            return Poll::Ready(None);
        }

        match this.receiver.poll_recv(cx) {
            Poll::Ready(Some(frame)) => Poll::Ready(Some(Ok(frame))),
            Poll::Ready(None) => {
                this.session.close();
                Poll::Ready(None)
            }
            Poll::Pending if this.session.shutdown.is_cancelled() => {
                this.session.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Open a stream for `user_id` on `registry`'s feed.
///
/// The `connected` frame is queued before the connection becomes visible to
/// publishers, so it is always the first frame the client reads.
pub fn open_stream(
    registry: Arc<ConnectionRegistry>,
    user_id: impl Into<String>,
    heartbeat_interval: Duration,
) -> AppResult<EventStream> {
    let user_id = user_id.into();
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = Connection::new(tx.clone());
    let connection_id = connection.id();
    let shutdown = connection.shutdown_token();

    tracing::debug!(
        feed = %registry.feed(),
        user_id = %user_id,
        connection_id = %connection_id,
        state = ?StreamState::Connecting,
        "Opening stream"
    );

    let connected = encode_frame(&LiveEvent::connected(connection_id.to_string()))?;
    tx.send(connected).map_err(|_| AppError::Internal)?;

    registry.register(&user_id, connection);

    let heartbeat = tokio::spawn(run_heartbeat(tx, shutdown.clone(), heartbeat_interval));

    tracing::info!(
        feed = %registry.feed(),
        user_id = %user_id,
        connection_id = %connection_id,
        "Stream open"
    );

    Ok(EventStream {
        receiver: rx,
        session: StreamSession {
            registry,
            user_id,
            connection_id,
            shutdown,
            heartbeat: Some(heartbeat),
            state: StreamState::Open,
            opened: Instant::now(),
        },
    })
}

/// Emit a heartbeat frame every `period` until `shutdown` fires or the
/// stream's receiver is gone.
pub async fn run_heartbeat(sender: FrameSender, shutdown: CancellationToken, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let frame = match encode_frame(&LiveEvent::heartbeat()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode heartbeat");
                        break;
                    }
                };
                if sender.send(frame).is_err() {
                    break;
                }
            }
        }
    }
}
