//! Table pattern classification for row-level security filtering.
//!
//! Every entity kind persisted by this system is classified exactly once by
//! [`determine_table_pattern`]. Unknown kinds are a fatal configuration
//! error — there is deliberately no permissive fallback, matching the
//! Python original's `TABLE_PATTERNS` registry.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::TrustError;

/// Ownership pattern for a persisted entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TablePattern {
    UserOwned,
    TenantOwned,
    ScopeBased,
    SystemManaged,
}

impl TablePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserOwned => "user_owned",
            Self::TenantOwned => "tenant_owned",
            Self::ScopeBased => "scope_based",
            Self::SystemManaged => "system",
        }
    }
}

fn static_patterns() -> &'static HashMap<&'static str, TablePattern> {
    static PATTERNS: OnceLock<HashMap<&'static str, TablePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let mut m = HashMap::new();
        m.insert("user_preferences", TablePattern::UserOwned);

        m.insert("model_providers", TablePattern::TenantOwned);
        m.insert("model_families", TablePattern::TenantOwned);
        m.insert("models", TablePattern::TenantOwned);
        m.insert("enhanced_models", TablePattern::TenantOwned);
        m.insert("model_versions", TablePattern::TenantOwned);
        m.insert("model_capabilities", TablePattern::TenantOwned);
        m.insert("model_aliases", TablePattern::TenantOwned);
        m.insert("model_pricing", TablePattern::TenantOwned);
        m.insert("model_endpoints", TablePattern::TenantOwned);
        m.insert("model_rate_limits", TablePattern::TenantOwned);
        m.insert("model_metadata", TablePattern::TenantOwned);
        m.insert("model_relationships", TablePattern::TenantOwned);
        m.insert("model_catalog", TablePattern::TenantOwned);

        m.insert("workspaces", TablePattern::ScopeBased);
        m.insert("analytics_events", TablePattern::ScopeBased);

        m.insert("users", TablePattern::SystemManaged);
        m.insert("lookup_values", TablePattern::SystemManaged);
        m.insert("tags", TablePattern::SystemManaged);
        m
    })
}

/// Classify an entity kind's table name into a [`TablePattern`].
///
/// Exact-name match first, then prefix/suffix heuristics. Anything that
/// matches none of these fails with [`TrustError::UnsupportedTable`] —
/// exposing an unclassified table is never the safe default.
pub fn determine_table_pattern(table_name: &str) -> Result<TablePattern, TrustError> {
    if let Some(pattern) = static_patterns().get(table_name) {
        return Ok(*pattern);
    }

    if let Some(pattern) = registered_patterns_override(table_name) {
        return Ok(pattern);
    }

    if table_name.starts_with("model_") {
        return Ok(TablePattern::TenantOwned);
    }
    if table_name.starts_with("user_") {
        return Ok(TablePattern::UserOwned);
    }
    if table_name.ends_with("_analytics") || table_name.starts_with("analytics_") {
        return Ok(TablePattern::ScopeBased);
    }

    Err(TrustError::UnsupportedTable(format!(
        "no security pattern defined for table '{table_name}'; \
         add an explicit mapping or extend the prefix heuristics"
    )))
}

/// Seam for callers (e.g. the postgres adapter, or tests) who register
/// additional AMCS domain tables (songs, personas, sources, …) beyond the
/// built-in set without editing this module.
fn registered_patterns_override(_table_name: &str) -> Option<TablePattern> {
    None
}

/// The column name used for ownership filtering under a given pattern, where
/// that is a single fixed column (tenant-owned only — user-owned has two
/// possible column names and scope-based has none fixed).
pub fn tenant_ownership_column() -> &'static str {
    "tenant_id"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_wins() {
        assert_eq!(
            determine_table_pattern("model_catalog").unwrap(),
            TablePattern::TenantOwned
        );
        assert_eq!(
            determine_table_pattern("users").unwrap(),
            TablePattern::SystemManaged
        );
    }

    #[test]
    fn prefix_heuristics_apply_when_no_exact_match() {
        assert_eq!(
            determine_table_pattern("model_whatever_new").unwrap(),
            TablePattern::TenantOwned
        );
        assert_eq!(
            determine_table_pattern("user_widgets").unwrap(),
            TablePattern::UserOwned
        );
        assert_eq!(
            determine_table_pattern("song_analytics").unwrap(),
            TablePattern::ScopeBased
        );
        assert_eq!(
            determine_table_pattern("analytics_songs").unwrap(),
            TablePattern::ScopeBased
        );
    }

    #[test]
    fn unclassified_table_fails_fast() {
        let err = determine_table_pattern("totally_unknown_table").unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_TABLE");
    }
}
