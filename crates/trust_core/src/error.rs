//! Unified error taxonomy for the trust/content-safety core.
//!
//! Every failure surfaced by this crate is a variant of [`TrustError`]. The
//! three classes named in the design docs — policy/authorization,
//! validation, infrastructure — are not separate types; they are grouped
//! here so the API boundary (an HTTP layer, a CLI, a test harness) can map
//! each variant to a stable machine code with [`TrustError::code`] and an
//! HTTP status with [`TrustError::http_status`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrustError {
    /// Security context required for this operation was not supplied at all.
    #[error("security context missing: {0}")]
    SecurityContextMissing(String),

    /// Security context was supplied but is invalid for the requested pattern
    /// (e.g. a user-owned filter requested with no user id present).
    #[error("security context invalid: {0}")]
    SecurityContextInvalid(String),

    /// The Row Guard could not apply a filter or assignment against the
    /// entity's declared schema (e.g. scope-based entity exposes neither
    /// owner column).
    #[error("security filter failed: {0}")]
    SecurityFilterFailed(String),

    /// The entity kind has no table-pattern classification and no prefix
    /// heuristic matched it. There is no permissive default.
    #[error("unsupported table: {0}")]
    UnsupportedTable(String),

    #[error("entity not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A policy guard (profanity / PII / living-artist) rejected content in
    /// strict mode.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// A determinism guarantee (same seed -> same chunks, or hash round
    /// trip) was broken. Reserved for retriever/test harness use.
    #[error("determinism violation: {0}")]
    DeterminismViolation(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl TrustError {
    /// Machine-readable code, stable across versions — see §6 of the design.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SecurityContextMissing(_) => "SECURITY_CONTEXT_MISSING",
            Self::SecurityContextInvalid(_) => "SECURITY_CONTEXT_INVALID",
            Self::SecurityFilterFailed(_) => "SECURITY_FILTER_FAILED",
            Self::UnsupportedTable(_) => "UNSUPPORTED_TABLE",
            Self::NotFound(_) => "ENTITY_NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::PolicyViolation(_) => "POLICY_VIOLATION",
            Self::DeterminismViolation(_) => "DETERMINISM_VIOLATION",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::SecurityContextMissing(_) => 401,
            Self::SecurityContextInvalid(_) => 403,
            Self::SecurityFilterFailed(_) => 403,
            Self::UnsupportedTable(_) => 500,
            Self::NotFound(_) => 404,
            Self::Database(_) => 500,
            Self::BadRequest(_) => 400,
            Self::PolicyViolation(_) => 422,
            Self::DeterminismViolation(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrustError>;
