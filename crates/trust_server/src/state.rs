//! Shared application state, built once in `main` and cloned (cheaply, via
//! `Arc`) into every handler — mirrors the teacher's `CoreService`/`PgPool`
//! `Extension` wiring in `sem_os_server::router`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;

use trust_core::gate_metrics::QualityGateMetrics;
use trust_core::ports::{ChunkHashIndex, EntityStore, KnowledgeServerRegistry, KnowledgeSource, KnowledgeSourceRegistry};
use trust_core::retriever::{Candidate, DeterministicRetriever};
use trust_core::taxonomy::{load_blueprint, Blueprint};
use trust_core::Result;
use trust_postgres::{PgChunkHashStore, PgEntityStore, PgKnowledgeServerStore, PgKnowledgeSourceStore};

use crate::content::ContentAsset;

/// Placeholder upstream: the real deployment injects an MCP client adapter
/// here. Returning no candidates keeps the retrieval pipeline (scope
/// validation, allow/deny filtering, deterministic ordering, caching)
/// exercisable end-to-end without a live external dependency.
struct NullKnowledgeSource;

#[async_trait]
impl KnowledgeSource for NullKnowledgeSource {
    async fn fetch_candidates(
        &self,
        _source_id: &str,
        _query: &str,
        _top_k: usize,
        _seed: u64,
        _scopes: &[String],
        _config: &serde_json::Value,
    ) -> Result<Vec<Candidate>> {
        Ok(Vec::new())
    }
}

/// Blueprints are looked up by genre; missing ones fall back to the
/// standard pop defaults inside `parse_blueprint`, so an empty directory is
/// a valid (if minimal) deployment.
pub struct BlueprintCache {
    dir: std::path::PathBuf,
    loaded: DashMap<String, Arc<Blueprint>>,
}

impl BlueprintCache {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            loaded: DashMap::new(),
        }
    }

    /// Returns the cached blueprint for `genre`, loading
    /// `<dir>/<genre>.md` on first use. A missing file is not an error —
    /// `load_blueprint` already treats an unreadable path as "use defaults"
    /// at the call site below.
    pub fn get(&self, genre: &str, version: &str) -> Arc<Blueprint> {
        if let Some(existing) = self.loaded.get(genre) {
            return Arc::clone(&existing);
        }
        let path = self.dir.join(format!("{genre}.md"));
        let blueprint = load_blueprint(genre, version, &path)
            .unwrap_or_else(|_| trust_core::taxonomy::parse_blueprint(genre, version, ""));
        let blueprint = Arc::new(blueprint);
        self.loaded.insert(genre.to_string(), Arc::clone(&blueprint));
        blueprint
    }
}

pub struct AppState {
    pub pool: PgPool,
    pub content_store: Arc<dyn EntityStore<ContentAsset>>,
    pub source_registry: Arc<PgKnowledgeSourceStore>,
    pub server_registry: Arc<PgKnowledgeServerStore>,
    pub retriever: Arc<DeterministicRetriever>,
    pub taxonomy: Arc<trust_core::taxonomy::TaxonomyStore>,
    pub blueprints: Arc<BlueprintCache>,
    pub gate_metrics: Arc<QualityGateMetrics>,
}

impl AppState {
    pub fn new(pool: PgPool, taxonomy_dir: impl AsRef<Path>) -> Result<Self> {
        let taxonomy = Arc::new(trust_core::taxonomy::TaxonomyStore::load(&taxonomy_dir)?);
        let source_registry = Arc::new(PgKnowledgeSourceStore::new(pool.clone()));
        let server_registry = Arc::new(PgKnowledgeServerStore::new(pool.clone()));
        let chunk_hashes = Arc::new(PgChunkHashStore::new(pool.clone()));

        let source_registry_port: Arc<dyn KnowledgeSourceRegistry> = source_registry.clone();
        let server_registry_port: Arc<dyn KnowledgeServerRegistry> = server_registry.clone();
        let chunk_hash_port: Arc<dyn ChunkHashIndex> = chunk_hashes;
        let retriever = Arc::new(DeterministicRetriever::new(
            source_registry_port,
            server_registry_port,
            Arc::new(NullKnowledgeSource),
            Some(chunk_hash_port),
        ));

        let content_store: Arc<dyn EntityStore<ContentAsset>> = Arc::new(PgEntityStore::new(pool.clone()));

        Ok(Self {
            content_store,
            source_registry,
            server_registry,
            retriever,
            taxonomy,
            blueprints: Arc::new(BlueprintCache::new(taxonomy_dir.as_ref().join("blueprints"))),
            gate_metrics: Arc::new(QualityGateMetrics::new()),
            pool,
        })
    }
}
