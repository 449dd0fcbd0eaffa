/// Live event fan-out
///
/// 1. ConnectionRegistry: one open stream per user, per feed
/// 2. EventPublisher: best-effort delivery to connected users
/// 3. EventStream: the SSE body, with heartbeat and cleanup on close
pub mod feed;
pub mod messages;
pub mod publisher;
pub mod registry;
pub mod stream;

pub use feed::Feed;
pub use messages::{encode_frame, LiveEvent};
pub use publisher::{Delivery, EventPublisher};
pub use registry::{Connection, ConnectionId, ConnectionRegistry, FrameSender};
pub use stream::{open_stream, EventStream, StreamState};
