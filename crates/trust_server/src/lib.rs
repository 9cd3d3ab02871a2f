//! trust_server — standalone REST surface over the trust core.
//!
//! Provides JWT-authenticated REST endpoints backed by `trust_core`'s
//! guards, scorer, retriever and gate metrics. Routes:
//!   GET  /health                       — liveness check (no auth)
//!   GET  /health/gates                 — quality gate status (no auth)
//!   POST /content                      — create a content asset (auth required)
//!   GET  /content/:id                  — fetch a content asset (auth required)
//!   GET  /content                      — cursor-paginated listing (auth required)
//!   PUT  /content/:id                  — update a content asset (auth required)
//!   DELETE /content/:id                — delete a content asset (auth required)
//!   POST /rubric/score                 — score an artifact against a genre blueprint (auth required)
//!   POST /policy/enforce               — cross-field release policy check (auth required)
//!   POST /retrieve                     — deterministic pinned retrieval (auth required)
//!   GET  /retrieve/:source_id/:hash    — replay a chunk by content hash (auth required)
//!   GET  /sources                      — list active knowledge sources (auth required)
//!   POST /sources                      — register/update a knowledge source (auth required)

pub mod content;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
