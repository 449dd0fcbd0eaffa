/// SSE stream endpoints
///
/// GET /api/notifications/stream
/// GET /api/messages/stream
///
/// Both sit behind the session middleware; an unauthenticated caller is
/// rejected before anything is registered.
///
/// `Connection` is owned by the HTTP/1.1 encoder, which drops user-set
/// values. The response stays keep-alive because 1.1 connections are
/// persistent unless closed.
use actix_middleware::UserId;
use actix_web::{http::header, web, HttpResponse};

use crate::error::AppResult;
use crate::events::{open_stream, Feed};
use crate::state::AppState;

pub async fn notifications_stream(
    user: UserId,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    event_stream_response(Feed::Notifications, user, &state)
}

pub async fn messages_stream(
    user: UserId,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    event_stream_response(Feed::Messages, user, &state)
}

fn event_stream_response(feed: Feed, user: UserId, state: &AppState) -> AppResult<HttpResponse> {
    let stream = open_stream(
        state.registry(feed).clone(),
        user.0,
        state.heartbeat_interval(),
    )?;

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(stream))
}
