/// Connection Registry
///
/// Tracks which users currently hold an open stream on one feed.
/// At most one connection per user: registering a second connection
/// closes the first one before it is replaced.
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use prometheus::IntGauge;
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::Feed;
use crate::metrics;

/// Sending half of a stream's frame queue
pub type FrameSender = mpsc::UnboundedSender<Bytes>;

/// Unique identifier for one stream connection
///
/// Lets a closing stream remove exactly its own entry and never the
/// connection that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle to one open server-to-client channel
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: FrameSender,
    shutdown: CancellationToken,
    opened_at: DateTime<Utc>,
}

/// The channel's receiving side is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelClosed;

impl Connection {
    pub fn new(sender: FrameSender) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
            shutdown: CancellationToken::new(),
            opened_at: Utc::now(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Token fired when this connection must stop
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn send(&self, frame: Bytes) -> Result<(), ChannelClosed> {
        if self.shutdown.is_cancelled() {
            return Err(ChannelClosed);
        }
        self.sender.send(frame).map_err(|_| ChannelClosed)
    }

    /// Ask the owning stream to end.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.sender.is_closed()
    }
}

/// Registry of open streams for one feed
///
/// Entries live in a sharded map so every operation is atomic per user id
/// and callable from synchronous drop paths. The open-connections gauge
/// moves by the delta of each insert or removal, never by a sampled length.
pub struct ConnectionRegistry {
    feed: Feed,
    connections: DashMap<String, Connection>,
    open_gauge: IntGauge,
}

impl ConnectionRegistry {
    pub fn new(feed: Feed) -> Self {
        Self::with_gauge(feed, metrics::open_connections_gauge(feed))
    }

    pub fn with_gauge(feed: Feed, open_gauge: IntGauge) -> Self {
        Self {
            feed,
            connections: DashMap::new(),
            open_gauge,
        }
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    /// Store `connection` for `user_id`.
    ///
    /// Returns the superseded connection, already closed, if there was one.
    pub fn register(&self, user_id: &str, connection: Connection) -> Option<Connection> {
        let connection_id = connection.id();
        let replaced = self.connections.insert(user_id.to_string(), connection);

        if let Some(old) = &replaced {
            old.close();
            tracing::debug!(
                feed = %self.feed,
                user_id,
                old_connection_id = %old.id(),
                new_connection_id = %connection_id,
                "Replaced existing connection"
            );
        } else {
            self.open_gauge.inc();
            tracing::debug!(
                feed = %self.feed,
                user_id,
                connection_id = %connection_id,
                "Registered connection"
            );
        }

        replaced
    }

    /// Remove whatever connection `user_id` holds. No-op when absent.
    pub fn unregister(&self, user_id: &str) -> Option<Connection> {
        let removed = self.connections.remove(user_id).map(|(_, conn)| conn);
        if let Some(conn) = &removed {
            conn.close();
            self.open_gauge.dec();
            tracing::debug!(
                feed = %self.feed,
                user_id,
                connection_id = %conn.id(),
                "Unregistered connection"
            );
        }
        removed
    }

    /// Remove the entry for `user_id` only if it still holds `connection_id`.
    pub fn unregister_connection(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, conn| conn.id() == connection_id);

        match removed {
            Some((_, conn)) => {
                conn.close();
                self.open_gauge.dec();
                tracing::debug!(
                    feed = %self.feed,
                    user_id,
                    connection_id = %connection_id,
                    "Unregistered connection"
                );
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, user_id: &str) -> Option<Connection> {
        self.connections.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn connected_user_ids(&self) -> Vec<String> {
        self.connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Close and drop every connection (server shutdown).
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.connections.retain(|_, conn| {
            conn.close();
            self.open_gauge.dec();
            closed += 1;
            false
        });
        if closed > 0 {
            tracing::info!(feed = %self.feed, closed, "Closed all connections");
        }
        closed
    }
}
