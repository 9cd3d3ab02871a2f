//! Deterministic pinned retrieval endpoints.

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;

use trust_core::types::ChunkWithHash;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RetrieveRequest {
    pub source_id: String,
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    pub seed: u64,
}

fn default_top_k() -> usize {
    10
}

pub async fn retrieve(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<RetrieveRequest>,
) -> Result<Json<Vec<ChunkWithHash>>, AppError> {
    let chunks = state
        .retriever
        .retrieve_chunks(&req.source_id, &req.query, req.top_k, req.seed)
        .await?;
    Ok(Json(chunks))
}

pub async fn by_hash(
    Extension(state): Extension<Arc<AppState>>,
    Path((source_id, hash)): Path<(String, String)>,
) -> Result<Json<ChunkWithHash>, AppError> {
    let chunk = state.retriever.retrieve_by_hash(&source_id, &hash).await?;
    Ok(Json(chunk))
}
