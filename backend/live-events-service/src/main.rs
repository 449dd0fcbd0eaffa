use actix_middleware::SessionKeys;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use live_events_service::{
    handlers::register_routes, logging, metrics, AppError, AppState, Config,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;
    tracing::info!(
        env = %config.app.env,
        heartbeat_secs = config.stream.heartbeat_interval.as_secs(),
        "Starting live events service"
    );

    let state = AppState::new(&config.stream);
    let session_keys = Arc::new(SessionKeys::from_secret(&config.session.jwt_secret));
    let addr = config.bind_addr();

    tracing::info!("Starting HTTP server on {}", addr);

    let app_state = state.clone();
    let server = HttpServer::new(move || {
        let session_keys = session_keys.clone();
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .route("/", web::get().to(|| async { "Live Events Service v1.0" }))
            .configure(move |cfg| register_routes(cfg, session_keys))
    })
    .disable_signals()
    .bind(&addr)
    .map_err(|e| AppError::StartServer(format!("failed to bind {addr}: {e}")))?
    .run();

    // Open streams never finish on their own, so close them before stopping
    // the server or graceful shutdown would wait out its timeout.
    let handle = server.handle();
    let shutdown_state = state.clone();
    actix_rt::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        let closed = shutdown_state.shutdown();
        tracing::info!(closed, "Shutdown signal received, closed open streams");
        handle.stop(true).await;
    });

    server.await.context("HTTP server error")?;
    tracing::info!("Live events service stopped");
    Ok(())
}
