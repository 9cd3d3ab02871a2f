//! The extra seam [`PgEntityStore`] needs beyond [`trust_core::row_guard::OwnedEntity`]:
//! a way to read an entity's id and to fold a Row Guard's owner assignment
//! back into the entity before it is persisted.
//!
//! `trust_core` never defines concrete domain entities (songs, lyrics,
//! personas) — those belong to whatever service embeds this crate. A single
//! generic adapter therefore has to interpolate the table name into its SQL
//! at runtime rather than hold it as a literal, unlike the teacher's
//! one-struct-per-table convention; see DESIGN.md.

use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use trust_core::row_guard::OwnedEntity;

pub trait JsonEntity: OwnedEntity + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn entity_id(&self) -> Uuid;

    /// Returns a copy of `self` with the owner column set to `value`. Called
    /// after a [`trust_core::row_guard::OwnerAssignment::Assign`] is
    /// resolved, before the row is inserted.
    fn with_owner_assigned(self, column: &'static str, value: Uuid) -> Self;
}
