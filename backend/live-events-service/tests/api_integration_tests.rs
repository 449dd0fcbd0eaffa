/// Integration tests for live-events-service HTTP API
///
/// This test module covers:
/// - Session enforcement on stream endpoints
/// - SSE response headers and framing
/// - Publishing through the internal API to open streams
/// - Registry cleanup when the client goes away
use actix_middleware::SessionKeys;
use actix_web::body::MessageBody;
use actix_web::{test, web, App};
use bytes::Bytes;
use jsonwebtoken::{encode, EncodingKey, Header};
use live_events_service::{handlers::register_routes, AppState, Feed};
use serde::Serialize;
use serde_json::{json, Value};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const SESSION_SECRET: &str = "test-session-secret-min-32-chars!!";

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: i64,
}

fn session_token(user_id: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64;
    encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            exp: now + 3600,
        },
        &EncodingKey::from_secret(SESSION_SECRET.as_bytes()),
    )
    .expect("Failed to encode JWT")
}

async fn next_chunk<B: MessageBody>(body: &mut Pin<Box<B>>) -> Option<Bytes> {
    match futures::future::poll_fn(|cx| body.as_mut().poll_next(cx)).await {
        Some(Ok(chunk)) => Some(chunk),
        _ => None,
    }
}

fn frame_json(chunk: &Bytes) -> Value {
    let text = std::str::from_utf8(chunk).unwrap();
    assert!(text.starts_with("data: "), "unexpected frame: {text}");
    assert!(text.ends_with("\n\n"), "unexpected frame: {text}");
    serde_json::from_str(text.trim_start_matches("data: ").trim_end()).unwrap()
}

macro_rules! app {
    ($state:expr) => {{
        let keys = Arc::new(SessionKeys::from_secret(SESSION_SECRET));
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(move |cfg| register_routes(cfg, keys)),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_stream_requires_session() {
    let state = AppState::default();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/notifications/stream")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 401);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 401);
    assert!(body["error"].is_string());
    assert!(state.registry(Feed::Notifications).is_empty());
}

#[actix_web::test]
async fn test_stream_rejects_bad_token() {
    let state = AppState::default();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/messages/stream")
        .insert_header(("Authorization", "Bearer not.a.token"))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 401);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 401);
    assert!(state.registry(Feed::Messages).is_empty());
}

#[actix_web::test]
async fn test_like_reaches_open_stream_and_disconnect_cleans_up() {
    let state = AppState::default();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/notifications/stream")
        .insert_header(("Authorization", format!("Bearer {}", session_token("alice"))))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-cache");
    assert_eq!(resp.headers().get("x-accel-buffering").unwrap(), "no");
    assert!(resp.response().head().keep_alive());
    assert!(state.registry(Feed::Notifications).is_connected("alice"));

    let mut body = Box::pin(resp.into_body());
    let connected = frame_json(&next_chunk(&mut body).await.unwrap());
    assert_eq!(connected["type"], "connected");

    let publish = test::TestRequest::post()
        .uri("/api/v1/events/notifications/users/alice")
        .set_json(json!({"type": "like", "postId": "p1"}))
        .to_request();
    let published: Value = test::call_and_read_body_json(&app, publish).await;
    assert_eq!(published["delivered"], true);
    assert_eq!(published["outcome"], "delivered");

    let like = frame_json(&next_chunk(&mut body).await.unwrap());
    assert_eq!(like, json!({"type": "like", "postId": "p1"}));

    // Client goes away
    drop(body);
    assert!(!state.registry(Feed::Notifications).is_connected("alice"));

    let publish = test::TestRequest::post()
        .uri("/api/v1/events/notifications/users/alice")
        .set_json(json!({"type": "like", "postId": "p2"}))
        .to_request();
    let published: Value = test::call_and_read_body_json(&app, publish).await;
    assert_eq!(published["delivered"], false);
    assert_eq!(published["outcome"], "not_connected");
}

#[actix_web::test]
async fn test_feeds_are_independent() {
    let state = AppState::default();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/messages/stream?token={}",
            session_token("bob")
        ))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    assert!(state.registry(Feed::Messages).is_connected("bob"));
    assert!(!state.registry(Feed::Notifications).is_connected("bob"));

    let mut body = Box::pin(resp.into_body());
    next_chunk(&mut body).await.unwrap();

    let publish = test::TestRequest::post()
        .uri("/api/v1/events/messages/users/bob")
        .set_json(json!({
            "type": "new_message",
            "messageId": "m1",
            "conversationId": "c1",
            "senderId": "alice",
            "content": "hey"
        }))
        .to_request();
    let published: Value = test::call_and_read_body_json(&app, publish).await;
    assert_eq!(published["delivered"], true);

    let frame = frame_json(&next_chunk(&mut body).await.unwrap());
    assert_eq!(frame["type"], "new_message");
    assert_eq!(frame["content"], "hey");
}

#[actix_web::test]
async fn test_fanout_skips_unconnected_users() {
    let state = AppState::default();
    let app = app!(state);

    let mut bodies = vec![];
    for user in ["u1", "u2"] {
        let req = test::TestRequest::get()
            .uri("/api/notifications/stream")
            .insert_header(("Authorization", format!("Bearer {}", session_token(user))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let mut body = Box::pin(resp.into_body());
        next_chunk(&mut body).await.unwrap();
        bodies.push(body);
    }

    let req = test::TestRequest::post()
        .uri("/api/v1/events/notifications/fanout")
        .set_json(json!({
            "user_ids": ["u1", "u2", "u3", "u4"],
            "event": {"type": "repost", "postId": "p7"}
        }))
        .to_request();
    let result: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(result["recipients"], 4);
    assert_eq!(result["delivered"], 2);

    for body in bodies.iter_mut() {
        let frame = frame_json(&next_chunk(body).await.unwrap());
        assert_eq!(frame["type"], "repost");
    }
}

#[actix_web::test]
async fn test_publish_validation() {
    let state = AppState::default();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/events/posts/users/alice")
        .set_json(json!({"type": "like"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let req = test::TestRequest::post()
        .uri("/api/v1/events/notifications/users/alice")
        .set_json(json!({"postId": "p1"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
}

#[actix_web::test]
async fn test_status_and_stats() {
    let state = AppState::default();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/notifications/stream")
        .insert_header(("Authorization", format!("Bearer {}", session_token("carol"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let _body = Box::pin(resp.into_body());

    let req = test::TestRequest::get()
        .uri("/api/v1/events/notifications/status/carol")
        .to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["connected"], true);
    assert!(status["connected_since"].is_string());

    let req = test::TestRequest::get()
        .uri("/api/v1/events/messages/status/carol")
        .to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["connected"], false);

    let req = test::TestRequest::get()
        .uri("/api/v1/events/stats")
        .to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["notifications"]["connections"], 1);
    assert_eq!(stats["messages"]["connections"], 0);
}

#[actix_web::test]
async fn test_shutdown_ends_open_streams() {
    let state = AppState::default();
    let app = app!(state);

    let req = test::TestRequest::get()
        .uri("/api/notifications/stream")
        .insert_header(("Authorization", format!("Bearer {}", session_token("dave"))))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let mut body = Box::pin(resp.into_body());
    next_chunk(&mut body).await.unwrap();

    assert_eq!(state.shutdown(), 1);
    assert!(next_chunk(&mut body).await.is_none());
    assert!(state.registry(Feed::Notifications).is_empty());
}
