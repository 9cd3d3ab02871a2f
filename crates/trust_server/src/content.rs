//! `ContentAsset` — the one concrete entity this server instantiates the
//! generic Repository/Row Guard/`PgEntityStore` seams against.
//!
//! `trust_core` deliberately defines no concrete domain entities (see
//! `trust_postgres::json_entity`); a generated lyric, persona or style
//! artifact pending rubric/policy review is the natural one for a REST
//! surface to expose here, grounded on the original's `lyrics_repo.py` /
//! `song_repo.py` (each a thin `BaseRepository` instantiation over its own
//! table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trust_core::row_guard::OwnedEntity;
use trust_postgres::JsonEntity;

/// A single piece of generated content (lyrics, style brief, producer
/// notes, ...) pending or past rubric/policy review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentAsset {
    pub id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub genre: String,
    pub body: String,
    #[serde(default)]
    pub status: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl OwnedEntity for ContentAsset {
    fn table_name() -> &'static str {
        // Matches the "user_" prefix heuristic in table_pattern — no
        // explicit registry entry required.
        "user_content_assets"
    }

    fn user_owner_column() -> Option<&'static str> {
        Some("user_id")
    }
}

impl JsonEntity for ContentAsset {
    fn entity_id(&self) -> Uuid {
        self.id
    }

    fn with_owner_assigned(mut self, column: &'static str, value: Uuid) -> Self {
        if column == "user_id" {
            self.user_id = Some(value);
        }
        self
    }
}
