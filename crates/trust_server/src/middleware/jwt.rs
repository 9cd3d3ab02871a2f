//! JWT middleware for the trust server.
//!
//! Extracts `Authorization: Bearer <token>`, validates the JWT signature,
//! and builds a [`SecurityContext`] from its claims rather than trusting any
//! header the caller sets directly — injected into request extensions for
//! every downstream handler.

use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use trust_core::SecurityContext;

#[derive(Clone)]
pub struct JwtConfig {
    pub decoding_key: DecodingKey,
    pub validation: Validation,
}

impl JwtConfig {
    /// Create from a symmetric secret (HS256).
    pub fn from_secret(secret: &[u8]) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = false; // relax for dev — tighten before production
        validation.required_spec_claims.clear();
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

/// The claim shape this server expects: a subject (user id), optional
/// tenant id, optional scope, and a permission list — the JWT-carried
/// equivalent of `SecurityContext`'s fields.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<Uuid>,
    tenant_id: Option<Uuid>,
    scope: Option<String>,
    #[serde(default)]
    permissions: Vec<String>,
}

fn unauthorized(msg: impl Into<String>) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg.into() }))).into_response()
}

/// Axum middleware that validates the bearer JWT and injects a
/// [`SecurityContext`] into request extensions. Returns 401 if the token is
/// missing, malformed, or fails signature validation.
pub async fn jwt_auth(mut req: Request, next: Next) -> Result<Response, Response> {
    let jwt_config = req
        .extensions()
        .get::<JwtConfig>()
        .cloned()
        .ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "JWT config not initialized"})),
            )
                .into_response()
        })?;

    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing Authorization header"))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("invalid Authorization header format — expected 'Bearer <token>'"))?;

    let token_data = decode::<Claims>(token, &jwt_config.decoding_key, &jwt_config.validation).map_err(|e| {
        tracing::warn!("JWT validation failed: {e}");
        unauthorized(format!("invalid token: {e}"))
    })?;

    let claims = token_data.claims;
    let permissions: HashSet<String> = claims.permissions.into_iter().collect();
    let context = SecurityContext::new(claims.sub, claims.tenant_id, claims.scope, permissions, HashMap::new());

    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}
