/// Connection status endpoints
use actix_web::{web, HttpResponse};
use serde_json::json;

use super::publish::parse_feed;
use crate::error::AppResult;
use crate::events::Feed;
use crate::state::AppState;

/// GET /api/v1/events/{feed}/status/{user_id}
pub async fn connection_status(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let (feed, user_id) = path.into_inner();
    let feed = parse_feed(&feed)?;
    let connection = state.registry(feed).lookup(&user_id);

    Ok(HttpResponse::Ok().json(json!({
        "feed": feed,
        "user_id": user_id,
        "connected": connection.is_some(),
        "connected_since": connection.map(|c| c.opened_at()),
    })))
}

/// GET /api/v1/events/stats
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    let mut body = serde_json::Map::new();
    for feed in Feed::ALL {
        body.insert(
            feed.as_str().to_string(),
            json!({ "connections": state.registry(feed).len() }),
        );
    }
    HttpResponse::Ok().json(body)
}
