//! Row-guarded CRUD over `ContentAsset`, the one concrete `Repository`
//! instantiation this server exposes.

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use trust_core::cursor::{CursorPosition, PageRequest};
use trust_core::repository::Repository;
use trust_core::SecurityContext;

use crate::content::ContentAsset;
use crate::error::AppError;
use crate::state::AppState;

fn repository(state: &AppState, context: SecurityContext) -> Repository<ContentAsset> {
    Repository::new(state.content_store.clone(), context)
}

#[derive(Debug, Deserialize)]
pub struct CreateContentRequest {
    pub kind: String,
    pub genre: String,
    pub body: String,
}

pub async fn create(
    Extension(state): Extension<Arc<AppState>>,
    Extension(context): Extension<SecurityContext>,
    Json(req): Json<CreateContentRequest>,
) -> Result<Json<ContentAsset>, AppError> {
    let asset = ContentAsset {
        id: Uuid::new_v4(),
        user_id: None,
        kind: req.kind,
        genre: req.genre,
        body: req.body,
        status: "pending".to_string(),
        created_at: chrono::Utc::now(),
    };
    let created = repository(&state, context).create(asset).await?;
    Ok(Json(created))
}

pub async fn get(
    Extension(state): Extension<Arc<AppState>>,
    Extension(context): Extension<SecurityContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContentAsset>, AppError> {
    let found = repository(&state, context)
        .get_by_id(id)
        .await?
        .ok_or_else(|| trust_core::TrustError::NotFound(format!("content asset {id}")))?;
    Ok(Json(found))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

pub async fn list(
    Extension(state): Extension<Arc<AppState>>,
    Extension(context): Extension<SecurityContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let page = match query.cursor {
        Some(raw) => PageRequest::after(CursorPosition::decode(&raw)?, "created_at", limit)?,
        None => PageRequest::first_page("created_at", limit),
    };
    let result = repository(&state, context).list_paginated(page).await?;
    Ok(Json(json!({
        "items": result.items,
        "next_cursor": result.next_cursor,
    })))
}

pub async fn update(
    Extension(state): Extension<Arc<AppState>>,
    Extension(context): Extension<SecurityContext>,
    Path(id): Path<Uuid>,
    Json(mut asset): Json<ContentAsset>,
) -> Result<Json<ContentAsset>, AppError> {
    asset.id = id;
    let updated = repository(&state, context).update(id, asset).await?;
    Ok(Json(updated))
}

pub async fn delete(
    Extension(state): Extension<Arc<AppState>>,
    Extension(context): Extension<SecurityContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    repository(&state, context).delete(id).await?;
    Ok(Json(json!({"deleted": id})))
}
