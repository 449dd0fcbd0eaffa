/// Event Publisher
///
/// Best-effort, at-most-once delivery of events to connected users.
/// Users without an open stream are skipped; nothing is queued for them.
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

use super::messages::encode_frame;
use super::registry::ConnectionRegistry;
use super::Feed;
use crate::error::AppResult;
use crate::metrics;

/// Outcome of delivering one frame to one user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Frame queued on the user's open stream
    Delivered,
    /// User has no open stream; frame dropped
    NotConnected,
    /// Stream was already closed; entry removed from the registry
    Stale,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Delivery::Delivered => "delivered",
            Delivery::NotConnected => "not_connected",
            Delivery::Stale => "stale",
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered)
    }
}

#[derive(Clone)]
pub struct EventPublisher {
    registry: Arc<ConnectionRegistry>,
}

impl EventPublisher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn feed(&self) -> Feed {
        self.registry.feed()
    }

    /// Push `payload` to `user_id`'s open stream, if any.
    ///
    /// Only a payload that cannot be serialized is an error; delivery
    /// problems are reported through [`Delivery`].
    pub fn publish_to_user<T: Serialize + ?Sized>(
        &self,
        user_id: &str,
        payload: &T,
    ) -> AppResult<Delivery> {
        let frame = encode_frame(payload)?;
        Ok(self.deliver(user_id, frame))
    }

    /// Push `payload` to each user independently.
    ///
    /// Returns the number of streams the frame was written to.
    pub fn publish_to_users<I, S, T>(&self, user_ids: I, payload: &T) -> AppResult<usize>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        T: Serialize + ?Sized,
    {
        let frame = encode_frame(payload)?;
        let mut recipients = 0usize;
        let mut delivered = 0usize;

        for user_id in user_ids {
            recipients += 1;
            if self.deliver(user_id.as_ref(), frame.clone()).is_delivered() {
                delivered += 1;
            }
        }

        tracing::debug!(
            feed = %self.feed(),
            recipients,
            delivered,
            "Fan-out complete"
        );

        Ok(delivered)
    }

    fn deliver(&self, user_id: &str, frame: Bytes) -> Delivery {
        let delivery = match self.registry.lookup(user_id) {
            None => Delivery::NotConnected,
            Some(conn) => match conn.send(frame) {
                Ok(()) => Delivery::Delivered,
                Err(_) => {
                    self.registry.unregister_connection(user_id, conn.id());
                    tracing::debug!(
                        feed = %self.feed(),
                        user_id,
                        connection_id = %conn.id(),
                        "Removed stale connection"
                    );
                    Delivery::Stale
                }
            },
        };

        metrics::record_delivery(self.feed(), delivery);
        delivery
    }
}
