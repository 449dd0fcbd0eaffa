/// Internal publish endpoints used by the rest of the backend
///
/// POST /api/v1/events/{feed}/users/{user_id}
/// POST /api/v1/events/{feed}/fanout
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::events::Feed;
use crate::state::AppState;

/// Request to deliver one event to several users
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FanoutRequest {
    pub user_ids: Vec<String>,
    pub event: Value,
}

pub(crate) fn parse_feed(raw: &str) -> AppResult<Feed> {
    raw.parse::<Feed>().map_err(|_| AppError::NotFound)
}

/// Events must be JSON objects carrying a non-empty string `type`.
pub fn validate_event(event: &Value) -> AppResult<()> {
    let object = event
        .as_object()
        .ok_or_else(|| AppError::BadRequest("event must be a JSON object".into()))?;

    match object.get("type").and_then(Value::as_str) {
        Some(kind) if !kind.trim().is_empty() => Ok(()),
        _ => Err(AppError::BadRequest(
            "event must have a string `type` field".into(),
        )),
    }
}

pub async fn publish_to_user(
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> AppResult<HttpResponse> {
    let (feed, user_id) = path.into_inner();
    let feed = parse_feed(&feed)?;
    let event = body.into_inner();
    validate_event(&event)?;

    let delivery = state.publisher(feed).publish_to_user(&user_id, &event)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "feed": feed,
        "user_id": user_id,
        "delivered": delivery.is_delivered(),
        "outcome": delivery.as_str(),
    })))
}

pub async fn publish_fanout(
    path: web::Path<String>,
    state: web::Data<AppState>,
    body: web::Json<FanoutRequest>,
) -> AppResult<HttpResponse> {
    let feed = parse_feed(&path.into_inner())?;
    let request = body.into_inner();
    validate_event(&request.event)?;

    let delivered = state
        .publisher(feed)
        .publish_to_users(&request.user_ids, &request.event)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "feed": feed,
        "recipients": request.user_ids.len(),
        "delivered": delivered,
    })))
}
