//! Trust and content-safety core for a deterministic music-generation
//! service: row-level access control, content policy guards, a genre rubric
//! scorer, deterministic pinned retrieval, and quality-gate aggregation.
//!
//! No sqlx, no HTTP, no LLM invocation — those are external collaborators
//! wired in by `trust_postgres` and `trust_server`. This crate is the pure
//! domain: port traits plus the algorithms that decide what is safe, fair,
//! and reproducible.

pub mod config;
pub mod cursor;
pub mod error;
pub mod gate_metrics;
pub mod hashing;
pub mod policy;
pub mod ports;
pub mod repository;
pub mod retriever;
pub mod row_guard;
pub mod rubric;
pub mod security_context;
pub mod table_pattern;
pub mod taxonomy;
pub mod types;

pub use error::{Result, TrustError};
pub use security_context::SecurityContext;
