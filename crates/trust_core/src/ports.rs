//! Port traits — the seams a storage adapter (`trust_postgres`, or a fake in
//! tests) must implement. `trust_core` depends only on these traits, never on
//! a concrete store, the same discipline the semantic-OS core applies to its
//! `SnapshotStore`/`ObjectStore`/`ChangesetStore` family.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{ChunkWithHash, KnowledgeSourceRecord, MCPServerInfo};

/// Generic row-guarded CRUD for one entity kind, paginated by cursor.
///
/// Every method receives an already-resolved [`crate::row_guard::RowFilter`]
/// or [`crate::row_guard::OwnerAssignment`] rather than a raw
/// [`crate::security_context::SecurityContext`] — the guard decision is made
/// once by the caller and threaded through, so a store adapter can never
/// accidentally skip it.
#[async_trait]
pub trait EntityStore<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn create(&self, assignment: crate::row_guard::OwnerAssignment, entity: T) -> Result<T>;

    async fn get_by_id(&self, filter: crate::row_guard::RowFilter, id: Uuid) -> Result<Option<T>>;

    async fn list(
        &self,
        filter: crate::row_guard::RowFilter,
        page: crate::cursor::PageRequest,
    ) -> Result<crate::cursor::Page<T>>;

    async fn update(&self, filter: crate::row_guard::RowFilter, id: Uuid, entity: T) -> Result<T>;

    async fn delete(&self, filter: crate::row_guard::RowFilter, id: Uuid) -> Result<()>;
}

/// Registry of upstream knowledge sources available to the deterministic
/// retriever. Grounded on `source_service.py`'s `create_source` /
/// `get_source` / `list_active_sources` trio.
#[async_trait]
pub trait KnowledgeSourceRegistry: Send + Sync {
    async fn get_source(&self, source_id: &str) -> Result<Option<KnowledgeSourceRecord>>;

    async fn list_active_sources(&self) -> Result<Vec<KnowledgeSourceRecord>>;

    async fn create_source(&self, source: KnowledgeSourceRecord) -> Result<KnowledgeSourceRecord>;
}

/// Registry of MCP servers the retriever is allowed to query, and the scopes
/// each one grants. Grounded on `source_service.py`'s
/// `discover_mcp_servers` / `validate_mcp_scopes`.
#[async_trait]
pub trait KnowledgeServerRegistry: Send + Sync {
    /// Discover (or return the cached view of) all known MCP servers.
    async fn discover_servers(&self) -> Result<Vec<MCPServerInfo>>;

    async fn get_server(&self, server_id: &str) -> Result<Option<MCPServerInfo>>;

    /// Returns `Ok(())` if every scope in `scopes` is granted by the named
    /// server, otherwise a descriptive [`crate::error::TrustError::BadRequest`]
    /// — an unknown scope is a malformed request, not a policy rejection.
    async fn validate_scopes(&self, server_id: &str, scopes: &[String]) -> Result<()> {
        let server = self
            .get_server(server_id)
            .await?
            .ok_or_else(|| crate::error::TrustError::NotFound(format!("mcp server '{server_id}'")))?;
        for scope in scopes {
            if !server.scopes.iter().any(|s| s == scope) {
                return Err(crate::error::TrustError::BadRequest(format!(
                    "mcp server '{server_id}' does not grant scope '{scope}'"
                )));
            }
        }
        Ok(())
    }
}

/// The upstream fetch contract for one knowledge source, implemented by an
/// MCP client adapter. Grounded on `source_service.py`'s `fetch_chunks`.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Fetch raw candidate chunks for `query` from `source_id`. `seed` is
    /// threaded through so a source that itself samples can reproduce its
    /// own ordering; sources that don't sample may ignore it.
    async fn fetch_candidates(
        &self,
        source_id: &str,
        query: &str,
        top_k: usize,
        seed: u64,
        scopes: &[String],
        config: &serde_json::Value,
    ) -> Result<Vec<crate::retriever::Candidate>>;
}

/// Durable fallback for hash-addressed chunk lookup, consulted when a chunk
/// has aged out of the in-process cache. Grounded on `source_service.py`'s
/// persisted `chunk_cache` table.
#[async_trait]
pub trait ChunkHashIndex: Send + Sync {
    async fn get_by_hash(&self, source_id: &str, hash: &str) -> Result<Option<ChunkWithHash>>;

    async fn put(&self, chunk: ChunkWithHash) -> Result<()>;
}
