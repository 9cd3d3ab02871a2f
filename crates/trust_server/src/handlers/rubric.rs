//! Rubric scoring endpoint: scores a genre artifact against its blueprint
//! and any active weight/threshold overrides, returning the full breakdown.

use std::sync::Arc;

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use trust_core::policy::profanity_filter::ProfanityMode;
use trust_core::rubric::{Artifact, RubricScorer, ScoreReport};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub artifact: Artifact,
    #[serde(default = "default_version")]
    pub blueprint_version: String,
    #[serde(default = "default_profanity_mode")]
    pub profanity_mode: ProfanityMode,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_profanity_mode() -> ProfanityMode {
    ProfanityMode::ModerateAllowed
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub report: ScoreReport,
    pub suggestions: Vec<String>,
}

pub async fn score(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    let blueprint = state.blueprints.get(&req.artifact.genre, &req.blueprint_version);
    let taxonomy = state.taxonomy.current();

    let scorer = RubricScorer::new((*blueprint).clone(), (*taxonomy.rubric_overrides).clone());
    let report = scorer.score_artifacts(&req.artifact, &taxonomy.profanity, req.profanity_mode);
    let suggestions = scorer.suggest_improvements(&report);

    state
        .gate_metrics
        .record_rubric_result(&req.artifact.genre, matches!(report.decision, trust_core::rubric::ThresholdDecision::Pass), chrono::Utc::now());

    Ok(Json(ScoreResponse { report, suggestions }))
}
