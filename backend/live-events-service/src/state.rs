use std::sync::Arc;
use std::time::Duration;

use crate::config::StreamConfig;
use crate::events::{ConnectionRegistry, EventPublisher, Feed};

/// Shared handler state: one publisher (and registry) per feed
#[derive(Clone)]
pub struct AppState {
    notifications: EventPublisher,
    messages: EventPublisher,
    heartbeat_interval: Duration,
}

impl AppState {
    pub fn new(stream: &StreamConfig) -> Self {
        Self {
            notifications: EventPublisher::new(Arc::new(ConnectionRegistry::new(
                Feed::Notifications,
            ))),
            messages: EventPublisher::new(Arc::new(ConnectionRegistry::new(Feed::Messages))),
            heartbeat_interval: stream.heartbeat_interval,
        }
    }

    pub fn publisher(&self, feed: Feed) -> &EventPublisher {
        match feed {
            Feed::Notifications => &self.notifications,
            Feed::Messages => &self.messages,
        }
    }

    pub fn registry(&self, feed: Feed) -> &Arc<ConnectionRegistry> {
        self.publisher(feed).registry()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Close every open stream on every feed.
    pub fn shutdown(&self) -> usize {
        Feed::ALL
            .iter()
            .map(|feed| self.registry(*feed).close_all())
            .sum()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&StreamConfig::default())
    }
}
