/// HTTP handlers for the live events service
pub mod publish;
pub mod status;
pub mod stream;

use actix_middleware::{JwtAuthMiddleware, SessionKeys};
use actix_web::web;
use std::sync::Arc;

/// Register all service routes.
///
/// Stream routes require a session; internal routes are served to the
/// backend's private network.
pub fn register_routes(cfg: &mut web::ServiceConfig, session_keys: Arc<SessionKeys>) {
    cfg.service(
        web::scope("/api/notifications")
            .wrap(JwtAuthMiddleware::new(session_keys.clone()))
            .route("/stream", web::get().to(stream::notifications_stream)),
    )
    .service(
        web::scope("/api/messages")
            .wrap(JwtAuthMiddleware::new(session_keys))
            .route("/stream", web::get().to(stream::messages_stream)),
    )
    .service(
        web::scope("/api/v1/events")
            .route("/stats", web::get().to(status::stats))
            .route(
                "/{feed}/users/{user_id}",
                web::post().to(publish::publish_to_user),
            )
            .route("/{feed}/fanout", web::post().to(publish::publish_fanout))
            .route(
                "/{feed}/status/{user_id}",
                web::get().to(status::connection_status),
            ),
    );
}
