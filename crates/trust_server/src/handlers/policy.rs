//! Cross-field release-policy enforcement endpoint.

use std::sync::Arc;

use axum::{Extension, Json};
use serde::Deserialize;

use trust_core::policy::artist_normalizer::ArtistNormalizer;
use trust_core::policy::policy_enforcer::{EnforcementResult, PolicyEnforcer, PolicyMode, ReleaseContent};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnforceRequest {
    pub content: ReleaseContent,
    pub public_release: bool,
    pub mode: PolicyMode,
}

pub async fn enforce(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<EnforceRequest>,
) -> Result<Json<EnforcementResult>, AppError> {
    let taxonomy = state.taxonomy.current();
    let artist: Arc<ArtistNormalizer> = taxonomy.artist.clone();

    let enforcer = PolicyEnforcer::new(artist);
    let result = enforcer.enforce_release_policy(&req.content, req.public_release, req.mode);

    Ok(Json(result))
}
