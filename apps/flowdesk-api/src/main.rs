use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowdesk_api::config::Config;
use flowdesk_api::db::memory::MemoryStore;
use flowdesk_api::db::postgres::PgStore;
use flowdesk_api::AppState;
use flowdesk_common::SnowflakeGenerator;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;
    let snowflake = Arc::new(SnowflakeGenerator::new(0));

    let state = match config.database_url.clone() {
        Some(url) => {
            let pool = flowdesk_api::db::pool::connect(&url).expect("invalid database configuration");
            AppState::new(config, Arc::new(PgStore::new(pool, snowflake)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store, data is lost on restart");
            AppState::new(config, Arc::new(MemoryStore::new(snowflake)))
        }
    };

    state
        .bootstrap()
        .await
        .expect("failed to create the public conversation");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(flowdesk_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "flowdesk-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
