//! Shared domain value types. Pure data, no storage or policy logic — mirrors
//! the semantic-OS core's `types.rs` ("no sqlx, no DB dependencies").

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An upstream knowledge source the deterministic retriever is permitted to
/// query, grounded on `source_service.py`'s `Source` model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeSourceRecord {
    pub source_id: String,
    pub kind: String,
    pub mcp_server_id: String,
    pub active: bool,
    pub weight: f64,
    pub scopes: Vec<String>,
    pub allow_list: Vec<String>,
    pub deny_list: Vec<String>,
    pub config: serde_json::Value,
}

/// One registered MCP server and the scopes it grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPServerInfo {
    pub server_id: String,
    pub name: String,
    pub scopes: Vec<String>,
}

/// A single retrieved chunk, hashed for replayable citation. `content_hash`
/// is `SHA-256(source_id || text || timestamp)`, see
/// [`crate::hashing::content_hash`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkWithHash {
    pub source_id: String,
    pub text: String,
    pub score: f64,
    pub metadata: serde_json::Value,
    pub timestamp: Option<DateTime<Utc>>,
    pub content_hash: String,
}

/// A content-hashed reference to a retrieved chunk, attached to generated
/// output so provenance can be replayed and audited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: String,
    pub chunk_text: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub weight: f64,
    pub content_hash: String,
}

impl Citation {
    /// Build a citation from a retrieved chunk, carrying its weight forward.
    pub fn from_chunk(chunk: &ChunkWithHash, weight: f64) -> Self {
        Self {
            source_id: chunk.source_id.clone(),
            chunk_text: chunk.text.clone(),
            timestamp: chunk.timestamp,
            weight: weight.clamp(0.0, 1.0),
            content_hash: chunk.content_hash.clone(),
        }
    }
}

/// A flagged span of content, produced by any of the policy guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub guard: String,
    pub severity: Severity,
    pub position: usize,
    pub offending: String,
    pub context: String,
    pub redaction: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Mild,
    Moderate,
    Strong,
    Extreme,
}

/// Approval tier for a warn-mode living-artist reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalLevel {
    User,
    Admin,
    System,
}

/// An audit record of one policy-enforcement decision, retained for review
/// regardless of the enforcement mode in effect at the time. Restored from
/// the original's `get_audit_log` accessor (§3a of the expanded spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAudit {
    pub content_id: Uuid,
    pub reason: String,
    pub approving_user_id: Uuid,
    pub approval_level: ApprovalLevel,
    pub timestamp: DateTime<Utc>,
}

/// Rolling-window gate state, see [`crate::gate_metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Pass,
    Fail,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStatus {
    pub name: String,
    pub status: GateState,
    pub current_value: f64,
    pub target_value: f64,
    pub message: String,
    pub last_updated: DateTime<Utc>,
}

/// Arbitrary per-kind extra attributes a taxonomy or blueprint document may
/// carry that this crate does not interpret directly but must round-trip.
pub type Extra = HashMap<String, serde_json::Value>;
