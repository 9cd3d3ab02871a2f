//! Generic Repository layer: CRUD + cursor pagination over one entity kind,
//! always mediated by the [`UnifiedRowGuard`] for that kind.
//!
//! Grounded on `repositories/base.py`'s `BaseRepository` — specifically its
//! `_transaction_context` span (duration tracking, 3ms slow-operation
//! warning) and its `with_security_context`/`get_unified_guard` wiring,
//! reshaped per the "generic parameter, not a class hierarchy" design note.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::cursor::{Page, PageRequest};
use crate::error::Result;
use crate::ports::EntityStore;
use crate::row_guard::{FetchedOwnership, OwnedEntity, UnifiedRowGuard};
use crate::security_context::SecurityContext;

/// Transaction operations that exceed this are logged as slow, mirroring the
/// original's `elapsed > 3.0ms` warning.
const SLOW_OPERATION_THRESHOLD_MS: f64 = 3.0;

/// A Repository scoped to one entity kind `E` and one [`SecurityContext`].
/// Every operation resolves a Row Guard decision before touching the store,
/// and wraps the call in a span recording duration.
pub struct Repository<E>
where
    E: OwnedEntity + Send + Sync + 'static,
{
    store: Arc<dyn EntityStore<E>>,
    guard: UnifiedRowGuard<E>,
    _kind: PhantomData<fn() -> E>,
}

impl<E> Repository<E>
where
    E: OwnedEntity + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn EntityStore<E>>, context: SecurityContext) -> Self {
        Self {
            store,
            guard: UnifiedRowGuard::new(context),
            _kind: PhantomData,
        }
    }

    pub fn guard(&self) -> &UnifiedRowGuard<E> {
        &self.guard
    }

    async fn traced<F, Fut, T>(&self, operation: &str, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let span = tracing::info_span!("repository.transaction", entity = E::table_name(), operation);
        let _entered = span.enter();
        let started = Instant::now();
        let result = body().await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if elapsed_ms > SLOW_OPERATION_THRESHOLD_MS {
            tracing::warn!(entity = E::table_name(), operation, elapsed_ms, "slow repository operation");
        } else {
            tracing::debug!(entity = E::table_name(), operation, elapsed_ms, "repository operation completed");
        }
        if result.is_err() {
            tracing::debug!(entity = E::table_name(), operation, "rolling back after error");
        }
        result
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<E>> {
        self.traced("get_by_id", || async {
            let filter = self.guard.filter_query()?;
            self.store.get_by_id(filter, id).await
        })
        .await
    }

    pub async fn list_paginated(&self, page: PageRequest) -> Result<Page<E>> {
        self.traced("list_paginated", || async {
            let filter = self.guard.filter_query()?;
            self.store.list(filter, page).await
        })
        .await
    }

    pub async fn create(&self, entity: E) -> Result<E> {
        self.traced("create", || async {
            let assignment = self.guard.assign_owner()?;
            self.store.create(assignment, entity).await
        })
        .await
    }

    pub async fn update(&self, id: Uuid, entity: E) -> Result<E> {
        self.traced("update", || async {
            let filter = self.guard.filter_query()?;
            self.store.update(filter, id, entity).await
        })
        .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.traced("delete", || async {
            let filter = self.guard.filter_query()?;
            self.store.delete(filter, id).await
        })
        .await
    }

    /// Verify a row reached through a foreign key (not this repository's
    /// own `filter_query`) is actually owned by the current context.
    pub fn require_owner(&self, owned: FetchedOwnership) -> Result<()> {
        self.guard.require_owner(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::PageRequest;
    use crate::row_guard::{OwnerAssignment, RowFilter};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Widget {
        id: Uuid,
        tenant_id: Uuid,
    }

    impl Clone for Widget {
        fn clone(&self) -> Self {
            Widget { id: self.id, tenant_id: self.tenant_id }
        }
    }

    impl OwnedEntity for Widget {
        fn table_name() -> &'static str {
            "model_catalog"
        }
    }

    struct InMemoryStore {
        rows: Mutex<Vec<Widget>>,
    }

    #[async_trait]
    impl EntityStore<Widget> for InMemoryStore {
        async fn create(&self, assignment: OwnerAssignment, mut entity: Widget) -> Result<Widget> {
            if let OwnerAssignment::Assign { value, .. } = assignment {
                entity.tenant_id = value;
            }
            self.rows.lock().unwrap().push(entity.clone());
            Ok(entity)
        }

        async fn get_by_id(&self, filter: RowFilter, id: Uuid) -> Result<Option<Widget>> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .find(|w| w.id == id && matches_filter(&filter, w))
                .map(|w| w.clone()))
        }

        async fn list(&self, filter: RowFilter, _page: PageRequest) -> Result<Page<Widget>> {
            let rows = self.rows.lock().unwrap();
            let items: Vec<Widget> = rows.iter().filter(|w| matches_filter(&filter, w)).cloned().collect();
            Ok(Page { items, next_cursor: None })
        }

        async fn update(&self, _filter: RowFilter, _id: Uuid, entity: Widget) -> Result<Widget> {
            Ok(entity)
        }

        async fn delete(&self, _filter: RowFilter, id: Uuid) -> Result<()> {
            self.rows.lock().unwrap().retain(|w| w.id != id);
            Ok(())
        }
    }

    fn matches_filter(filter: &RowFilter, widget: &Widget) -> bool {
        match filter {
            RowFilter::Unrestricted => true,
            RowFilter::Equals { value, .. } => widget.tenant_id == *value,
        }
    }

    #[tokio::test]
    async fn create_assigns_tenant_then_get_by_id_round_trips() {
        let store = Arc::new(InMemoryStore { rows: Mutex::new(Vec::new()) });
        let tenant = Uuid::new_v4();
        let repo = Repository::new(store, SecurityContext::tenant(tenant));

        let id = Uuid::new_v4();
        let created = repo.create(Widget { id, tenant_id: Uuid::nil() }).await.unwrap();
        assert_eq!(created.tenant_id, tenant);

        let fetched = repo.get_by_id(id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn other_tenant_cannot_see_row() {
        let store = Arc::new(InMemoryStore { rows: Mutex::new(Vec::new()) });
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let repo_a = Repository::new(store.clone(), SecurityContext::tenant(tenant_a));
        let repo_b = Repository::new(store, SecurityContext::tenant(tenant_b));

        let id = Uuid::new_v4();
        repo_a.create(Widget { id, tenant_id: Uuid::nil() }).await.unwrap();

        assert!(repo_b.get_by_id(id).await.unwrap().is_none());
    }
}
