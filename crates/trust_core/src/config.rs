//! Layered runtime configuration: taxonomy directory, database connection,
//! pool sizing — loaded from environment variables with sane defaults, the
//! same convention the teacher's binaries use for their own `Config::from_env`.

use std::path::PathBuf;

/// Core configuration, independent of any particular storage adapter or
/// transport. `trust_postgres`/`trust_server` extend this with their own
/// adapter-specific settings.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Directory containing `profanity.yaml`, `pii_patterns.yaml`,
    /// `artist_registry.yaml`, `rubric_overrides.yaml`, and blueprint files.
    pub taxonomy_dir: PathBuf,
    pub database_url: String,
    pub max_pool_connections: u32,
    pub min_pool_connections: u32,
}

impl CoreConfig {
    /// Reads `TRUST_TAXONOMY_DIR`, `DATABASE_URL`, `TRUST_DB_MAX_CONNECTIONS`,
    /// `TRUST_DB_MIN_CONNECTIONS`, falling back to defaults matching a local
    /// development setup.
    pub fn from_env() -> Self {
        Self {
            taxonomy_dir: std::env::var("TRUST_TAXONOMY_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./taxonomy")),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/trust_core".to_string()),
            max_pool_connections: parse_env_or("TRUST_DB_MAX_CONNECTIONS", 10),
            min_pool_connections: parse_env_or("TRUST_DB_MIN_CONNECTIONS", 1),
        }
    }
}

fn parse_env_or(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_absent() {
        std::env::remove_var("TRUST_TAXONOMY_DIR");
        std::env::remove_var("TRUST_DB_MAX_CONNECTIONS");
        let config = CoreConfig::from_env();
        assert_eq!(config.taxonomy_dir, PathBuf::from("./taxonomy"));
        assert_eq!(config.max_pool_connections, 10);
    }
}
