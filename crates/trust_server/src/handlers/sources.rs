//! Knowledge source registry endpoints.

use std::sync::Arc;

use axum::{Extension, Json};

use trust_core::ports::KnowledgeSourceRegistry;
use trust_core::types::KnowledgeSourceRecord;

use crate::error::AppError;
use crate::state::AppState;

pub async fn list(Extension(state): Extension<Arc<AppState>>) -> Result<Json<Vec<KnowledgeSourceRecord>>, AppError> {
    let sources = state.source_registry.list_active_sources().await?;
    Ok(Json(sources))
}

pub async fn create(
    Extension(state): Extension<Arc<AppState>>,
    Json(source): Json<KnowledgeSourceRecord>,
) -> Result<Json<KnowledgeSourceRecord>, AppError> {
    let created = state.source_registry.create_source(source).await?;
    Ok(Json(created))
}
