//! Health check endpoints.
//!
//! - `GET /health` — basic liveness
//! - `GET /health/gates` — quality gate status (§ rubric pass rate,
//!   reproducibility, policy severity, latency P95)

use std::sync::Arc;

use axum::{Extension, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn gates(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    let now = Utc::now();
    let statuses = state.gate_metrics.get_gate_status(now);
    let (overall, summary) = state.gate_metrics.get_metrics_summary(now);
    Json(json!({
        "overall": overall,
        "summary": summary,
        "gates": statuses,
    }))
}
