//! trust_server — standalone REST server for the trust/content-safety core.
//!
//! Reads config from env vars:
//!   DATABASE_URL            — Postgres connection string (required)
//!   TRUST_JWT_SECRET        — JWT HMAC secret (required)
//!   TRUST_BIND_ADDR         — listen address (default: 0.0.0.0:4200)
//!   TRUST_TAXONOMY_DIR      — taxonomy/blueprint directory (default: ./taxonomy)
//!   TRUST_DB_MAX_CONNECTIONS — pool size (default: 10)

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use trust_core::config::CoreConfig;
use trust_server::middleware::jwt::JwtConfig;
use trust_server::router::build_router;
use trust_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,trust_server=debug".into()),
        )
        .init();

    let config = CoreConfig::from_env();
    let jwt_secret = std::env::var("TRUST_JWT_SECRET").expect("TRUST_JWT_SECRET must be set");
    let bind_addr = std::env::var("TRUST_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:4200".into());

    let pool = PgPoolOptions::new()
        .max_connections(config.max_pool_connections)
        .min_connections(config.min_pool_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    tracing::info!("Connected to database");

    let state = Arc::new(AppState::new(pool, &config.taxonomy_dir).expect("failed to load taxonomy at startup"));
    tracing::info!(taxonomy_dir = %config.taxonomy_dir.display(), "Loaded taxonomy");

    let jwt_config = JwtConfig::from_secret(jwt_secret.as_bytes());

    let app = build_router(state, jwt_config)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {bind_addr}: {e}"));
    tracing::info!("trust_server listening on {bind_addr}");

    axum::serve(listener, app).await.expect("server error");
}
