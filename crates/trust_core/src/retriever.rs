//! Deterministic Pinned Retriever: fetches external knowledge through a
//! vetted, scope-checked source, then reduces it to a byte-identical,
//! replayable ordering so the same `(source_id, query, seed)` always
//! produces the same chunks and hashes.
//!
//! Grounded on `source_service.py`'s `retrieve_chunks` / `retrieve_by_hash`.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustError};
use crate::hashing::content_hash;
use crate::ports::{ChunkHashIndex, KnowledgeServerRegistry, KnowledgeSource, KnowledgeSourceRegistry};
use crate::types::ChunkWithHash;

/// A raw candidate returned by an upstream [`KnowledgeSource`], before the
/// retriever's allow/deny filtering and deterministic ordering are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub text: String,
    pub score: f64,
    pub metadata: serde_json::Value,
    pub timestamp: Option<chrono::DateTime<Utc>>,
}

pub struct DeterministicRetriever {
    source_registry: Arc<dyn KnowledgeSourceRegistry>,
    server_registry: Arc<dyn KnowledgeServerRegistry>,
    upstream: Arc<dyn KnowledgeSource>,
    cache: DashMap<(String, String), ChunkWithHash>,
    hash_index: Option<Arc<dyn ChunkHashIndex>>,
}

impl DeterministicRetriever {
    pub fn new(
        source_registry: Arc<dyn KnowledgeSourceRegistry>,
        server_registry: Arc<dyn KnowledgeServerRegistry>,
        upstream: Arc<dyn KnowledgeSource>,
        hash_index: Option<Arc<dyn ChunkHashIndex>>,
    ) -> Self {
        Self {
            source_registry,
            server_registry,
            upstream,
            cache: DashMap::new(),
            hash_index,
        }
    }

    /// Retrieve up to `top_k` chunks for `query` from `source_id`, in a
    /// fully reproducible order: same score descending, then lexicographic
    /// `(source_id, text)` ties, truncated last.
    pub async fn retrieve_chunks(
        &self,
        source_id: &str,
        query: &str,
        top_k: usize,
        seed: u64,
    ) -> Result<Vec<ChunkWithHash>> {
        let source = self
            .source_registry
            .get_source(source_id)
            .await?
            .ok_or_else(|| TrustError::NotFound(format!("knowledge source '{source_id}'")))?;

        if !source.active {
            return Err(TrustError::BadRequest(format!(
                "knowledge source '{source_id}' is not active"
            )));
        }

        self.server_registry
            .validate_scopes(&source.mcp_server_id, &source.scopes)
            .await?;

        let candidates = self
            .upstream
            .fetch_candidates(source_id, query, top_k, seed, &source.scopes, &source.config)
            .await?;

        let filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !matches_any(&source.deny_list, &c.text))
            .filter(|c| source.allow_list.is_empty() || matches_any(&source.allow_list, &c.text))
            .collect();

        let mut chunks: Vec<ChunkWithHash> = filtered
            .into_iter()
            .map(|c| {
                let hash = content_hash(source_id, &c.text, c.timestamp);
                ChunkWithHash {
                    source_id: source_id.to_string(),
                    text: c.text,
                    score: c.score,
                    metadata: c.metadata,
                    timestamp: c.timestamp,
                    content_hash: hash,
                }
            })
            .collect();

        // Deterministic ordering: score descending, tie-broken
        // lexicographically by (source_id, text) so replay never depends on
        // the upstream's own (possibly unstable) return order.
        chunks.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_id.cmp(&b.source_id))
                .then_with(|| a.text.cmp(&b.text))
        });
        chunks.truncate(top_k);

        for chunk in &chunks {
            self.cache
                .insert((source_id.to_string(), chunk.content_hash.clone()), chunk.clone());
            if let Some(index) = &self.hash_index {
                index.put(chunk.clone()).await?;
            }
        }

        Ok(chunks)
    }

    /// Replay a previously retrieved chunk by its content hash alone, for
    /// byte-identical citation resolution.
    pub async fn retrieve_by_hash(&self, source_id: &str, hash: &str) -> Result<ChunkWithHash> {
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TrustError::BadRequest(format!("'{hash}' is not a 64-character hex hash")));
        }

        if let Some(chunk) = self.cache.get(&(source_id.to_string(), hash.to_string())) {
            return Ok(chunk.clone());
        }

        if let Some(index) = &self.hash_index {
            if let Some(chunk) = index.get_by_hash(source_id, hash).await? {
                self.cache
                    .insert((source_id.to_string(), hash.to_string()), chunk.clone());
                return Ok(chunk);
            }
        }

        Err(TrustError::NotFound(format!(
            "no cached chunk for source '{source_id}' hash '{hash}'"
        )))
    }
}

fn matches_any(patterns: &[String], text: &str) -> bool {
    let lower = text.to_lowercase();
    patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
}

/// Scale a set of source weights down so they sum to at most 1.0, leaving
/// them untouched when they already do.
pub fn normalize_source_weights(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    if sum > 1.0 && sum > 0.0 {
        weights.iter().map(|w| w / sum).collect()
    } else {
        weights.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::types::{KnowledgeSourceRecord, MCPServerInfo};

    struct FixedSourceRegistry(KnowledgeSourceRecord);
    #[async_trait]
    impl KnowledgeSourceRegistry for FixedSourceRegistry {
        async fn get_source(&self, source_id: &str) -> Result<Option<KnowledgeSourceRecord>> {
            if source_id == self.0.source_id {
                Ok(Some(self.0.clone()))
            } else {
                Ok(None)
            }
        }
        async fn list_active_sources(&self) -> Result<Vec<KnowledgeSourceRecord>> {
            Ok(vec![self.0.clone()])
        }
        async fn create_source(&self, source: KnowledgeSourceRecord) -> Result<KnowledgeSourceRecord> {
            Ok(source)
        }
    }

    struct OpenServerRegistry;
    #[async_trait]
    impl KnowledgeServerRegistry for OpenServerRegistry {
        async fn discover_servers(&self) -> Result<Vec<MCPServerInfo>> {
            Ok(vec![])
        }
        async fn get_server(&self, server_id: &str) -> Result<Option<MCPServerInfo>> {
            Ok(Some(MCPServerInfo {
                server_id: server_id.to_string(),
                name: "test".to_string(),
                scopes: vec!["read".to_string()],
            }))
        }
    }

    struct FixedUpstream(Vec<Candidate>);
    #[async_trait]
    impl KnowledgeSource for FixedUpstream {
        async fn fetch_candidates(
            &self,
            _source_id: &str,
            _query: &str,
            _top_k: usize,
            _seed: u64,
            _scopes: &[String],
            _config: &serde_json::Value,
        ) -> Result<Vec<Candidate>> {
            Ok(self.0.clone())
        }
    }

    fn source() -> KnowledgeSourceRecord {
        KnowledgeSourceRecord {
            source_id: "wiki".to_string(),
            kind: "mcp".to_string(),
            mcp_server_id: "srv-1".to_string(),
            active: true,
            weight: 1.0,
            scopes: vec!["read".to_string()],
            allow_list: vec![],
            deny_list: vec!["banned".to_string()],
            config: serde_json::json!({}),
        }
    }

    fn candidate(text: &str, score: f64) -> Candidate {
        Candidate {
            text: text.to_string(),
            score,
            metadata: serde_json::json!({}),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn retrieval_is_deterministically_ordered_and_cached() {
        let retriever = DeterministicRetriever::new(
            Arc::new(FixedSourceRegistry(source())),
            Arc::new(OpenServerRegistry),
            Arc::new(FixedUpstream(vec![
                candidate("beta", 0.5),
                candidate("alpha", 0.5),
                candidate("gamma", 0.9),
            ])),
            None,
        );
        let chunks = retriever.retrieve_chunks("wiki", "q", 3, 42).await.unwrap();
        assert_eq!(chunks[0].text, "gamma");
        assert_eq!(chunks[1].text, "alpha");
        assert_eq!(chunks[2].text, "beta");

        let replayed = retriever.retrieve_by_hash("wiki", &chunks[0].content_hash).await.unwrap();
        assert_eq!(replayed.text, "gamma");
    }

    #[tokio::test]
    async fn deny_list_filters_candidates() {
        let retriever = DeterministicRetriever::new(
            Arc::new(FixedSourceRegistry(source())),
            Arc::new(OpenServerRegistry),
            Arc::new(FixedUpstream(vec![candidate("this is banned content", 0.9), candidate("fine", 0.5)])),
            None,
        );
        let chunks = retriever.retrieve_chunks("wiki", "q", 10, 1).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "fine");
    }

    #[tokio::test]
    async fn inactive_source_is_rejected() {
        let mut inactive = source();
        inactive.active = false;
        let retriever = DeterministicRetriever::new(
            Arc::new(FixedSourceRegistry(inactive)),
            Arc::new(OpenServerRegistry),
            Arc::new(FixedUpstream(vec![])),
            None,
        );
        let err = retriever.retrieve_chunks("wiki", "q", 10, 1).await.unwrap_err();
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn weights_are_normalized_only_when_over_budget() {
        assert_eq!(normalize_source_weights(&[0.3, 0.3]), vec![0.3, 0.3]);
        let scaled = normalize_source_weights(&[0.6, 0.6]);
        assert!((scaled[0] - 0.5).abs() < 1e-9);
    }
}
