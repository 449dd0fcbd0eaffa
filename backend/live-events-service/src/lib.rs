pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use events::{ConnectionRegistry, Delivery, EventPublisher, Feed, LiveEvent};
pub use state::AppState;
