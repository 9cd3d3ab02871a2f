//! Router construction for the trust server.

use std::sync::Arc;

use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::handlers;
use crate::middleware::jwt::{jwt_auth, JwtConfig};
use crate::state::AppState;

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, jwt_config: JwtConfig) -> Router {
    let protected = Router::new()
        .route("/content", post(handlers::content::create).get(handlers::content::list))
        .route(
            "/content/:id",
            get(handlers::content::get)
                .put(handlers::content::update)
                .delete(handlers::content::delete),
        )
        .route("/rubric/score", post(handlers::rubric::score))
        .route("/policy/enforce", post(handlers::policy::enforce))
        .route("/retrieve", post(handlers::retrieve::retrieve))
        .route("/retrieve/:source_id/:hash", get(handlers::retrieve::by_hash))
        .route("/sources", get(handlers::sources::list).post(handlers::sources::create))
        .layer(axum_mw::from_fn(jwt_auth))
        .layer(Extension(jwt_config));

    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/gates", get(handlers::health::gates));

    public.merge(protected).layer(Extension(state))
}
