//! trust_postgres — PostgreSQL implementations of `trust_core`'s port traits.
//!
//! Mirrors the semantic-OS core's adapter crate: one struct per port, each a
//! thin newtype over a [`sqlx::PgPool`], SQL written as runtime-checked query
//! strings (`query_as`/`query`, never the `query!` macro, since this crate
//! never runs against a live database at build time).

pub mod json_entity;
pub mod store;

pub use json_entity::JsonEntity;
pub use store::{PgChunkHashStore, PgEntityStore, PgKnowledgeServerStore, PgKnowledgeSourceStore};

use sqlx::PgPool;

/// Convenience bundle that constructs every stateless Postgres adapter from
/// one shared pool, the way the teacher's `PgStores` does.
pub struct PgStores {
    pub knowledge_sources: PgKnowledgeSourceStore,
    pub knowledge_servers: PgKnowledgeServerStore,
    pub chunk_hashes: PgChunkHashStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            knowledge_sources: PgKnowledgeSourceStore::new(pool.clone()),
            knowledge_servers: PgKnowledgeServerStore::new(pool.clone()),
            chunk_hashes: PgChunkHashStore::new(pool),
        }
    }
}
