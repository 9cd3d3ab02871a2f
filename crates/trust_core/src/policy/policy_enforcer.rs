//! Cross-field release-policy enforcement: runs the living-artist normalizer
//! over every text field of a generated artifact and decides whether it may
//! ship. Non-public releases are automatically compliant; profanity and PII
//! guards are not part of this check — they run independently through the
//! Rubric Scorer and `PiiDetector::report`.
//!
//! Grounded on `policy_guards.py`'s `PolicyEnforcer`.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::policy::artist_normalizer::ArtistNormalizer;
use crate::types::{ApprovalLevel, PolicyAudit};

/// The fixed set of text fields a release artifact is checked across, in
/// the original's declared order.
const TEXT_FIELDS: &[&str] = &["style", "lyrics", "producer_notes", "description", "prompt"];

/// A text field's content. Lyrics may arrive pre-split into sections; the
/// enforcer concatenates them with a single space before scanning, exactly
/// as the original flattens a list of section dicts into one string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentField {
    Text(String),
    Sections(Vec<String>),
}

impl ContentField {
    fn flatten(&self) -> String {
        match self {
            ContentField::Text(s) => s.clone(),
            ContentField::Sections(parts) => parts.join(" "),
        }
    }
}

/// The fields of a release artifact subject to policy enforcement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReleaseContent {
    pub style: Option<ContentField>,
    pub lyrics: Option<ContentField>,
    pub producer_notes: Option<ContentField>,
    pub description: Option<ContentField>,
    pub prompt: Option<ContentField>,
}

impl ReleaseContent {
    fn field(&self, name: &str) -> Option<&ContentField> {
        match name {
            "style" => self.style.as_ref(),
            "lyrics" => self.lyrics.as_ref(),
            "producer_notes" => self.producer_notes.as_ref(),
            "description" => self.description.as_ref(),
            "prompt" => self.prompt.as_ref(),
            _ => None,
        }
    }
}

/// Enforcement mode for a release. `Strict` rejects outright on any
/// violation; `Warn` allows the content through but requires approval and
/// records it; `Permissive` allows through unconditionally, still logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Strict,
    Warn,
    Permissive,
}

/// The outcome of [`PolicyEnforcer::enforce_release_policy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementResult {
    pub approved: bool,
    pub requires_approval: bool,
    pub violations: Vec<String>,
}

pub struct PolicyEnforcer {
    artist_normalizer: Arc<ArtistNormalizer>,
    audit_log: Mutex<Vec<PolicyAudit>>,
}

impl PolicyEnforcer {
    pub fn new(artist_normalizer: Arc<ArtistNormalizer>) -> Self {
        Self {
            artist_normalizer,
            audit_log: Mutex::new(Vec::new()),
        }
    }

    /// Scan every declared text field of `content` for living-artist
    /// references and decide whether it may ship under `mode`. Non-public
    /// releases are automatically compliant and never touch profanity, PII,
    /// or artist checks — those guards run independently through the Rubric
    /// Scorer and `PiiDetector::report`, not as part of release-policy
    /// enforcement.
    pub fn enforce_release_policy(
        &self,
        content: &ReleaseContent,
        public_release: bool,
        mode: PolicyMode,
    ) -> EnforcementResult {
        if !public_release {
            return EnforcementResult {
                approved: true,
                requires_approval: false,
                violations: Vec::new(),
            };
        }

        let mut violations = Vec::new();

        for field_name in TEXT_FIELDS {
            let Some(field) = content.field(field_name) else {
                continue;
            };
            let text = field.flatten();
            if text.is_empty() {
                continue;
            }

            let (compliant, artist_violations) = self.artist_normalizer.check_public_release_compliance(&text, false);
            if !compliant {
                violations.extend(artist_violations.into_iter().map(|v| format!("{field_name}: {v}")));
            }
        }

        match mode {
            PolicyMode::Strict => EnforcementResult {
                approved: violations.is_empty(),
                requires_approval: false,
                violations,
            },
            PolicyMode::Warn => EnforcementResult {
                approved: true,
                requires_approval: !violations.is_empty(),
                violations,
            },
            PolicyMode::Permissive => EnforcementResult {
                approved: true,
                requires_approval: false,
                violations,
            },
        }
    }

    /// Record a manual override of a policy decision — e.g. an admin
    /// approving content that `Warn` mode flagged.
    pub fn audit_policy_override(
        &self,
        content_id: Uuid,
        reason: String,
        approving_user_id: Uuid,
        approval_level: ApprovalLevel,
    ) -> PolicyAudit {
        let record = PolicyAudit {
            content_id,
            reason,
            approving_user_id,
            approval_level,
            timestamp: Utc::now(),
        };
        self.audit_log.lock().expect("audit log mutex poisoned").push(record.clone());
        record
    }

    /// Every recorded override, oldest first.
    pub fn get_audit_log(&self) -> Vec<PolicyAudit> {
        self.audit_log.lock().expect("audit log mutex poisoned").clone()
    }
}
