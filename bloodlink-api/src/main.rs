use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::CorsLayer;

use bloodlink_api::config::AppConfig;
use bloodlink_api::{router, AppState};
use bloodlink_shared::clients::db::create_pool;
use bloodlink_shared::clients::email::EmailClient;
use bloodlink_shared::clients::redis::RedisClient;
use bloodlink_shared::clients::session::SessionStore;
use bloodlink_shared::middleware::{http_trace_layer, init_metrics, init_tracing, metrics_middleware};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("bloodlink-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.db_pool_size)?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let sessions = SessionStore::new(redis, config.session_idle_timeout_secs, config.cookie_secure);
    let email = EmailClient::new(
        &config.email_api_url,
        &config.email_api_key,
        &config.from_email,
        &config.from_name,
    );
    if !email.is_enabled() {
        tracing::warn!("no email API key configured, account emails will be skipped");
    }

    let metrics = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "prometheus recorder not installed");
            None
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>()?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let state = AppState {
        db,
        config: Arc::new(config),
        sessions,
        email,
        metrics,
    };

    let app = router(state)
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(cors)
        .layer(http_trace_layer());

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "bloodlink-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
