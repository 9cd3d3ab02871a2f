use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use trust_core::cursor::{Page, PageRequest};
use trust_core::error::{Result, TrustError};
use trust_core::ports::{ChunkHashIndex, EntityStore, KnowledgeServerRegistry, KnowledgeSourceRegistry};
use trust_core::row_guard::{OwnerAssignment, RowFilter};
use trust_core::types::{ChunkWithHash, KnowledgeSourceRecord, MCPServerInfo};

use crate::json_entity::JsonEntity;

fn db_err(e: sqlx::Error) -> TrustError {
    TrustError::Database(e.to_string())
}

// ── PgKnowledgeSourceStore ─────────────────────────────────────

pub struct PgKnowledgeSourceStore {
    pool: PgPool,
}

type SourceRow = (String, String, String, bool, f64, Vec<String>, Vec<String>, Vec<String>, serde_json::Value);

fn row_to_source(row: SourceRow) -> KnowledgeSourceRecord {
    KnowledgeSourceRecord {
        source_id: row.0,
        kind: row.1,
        mcp_server_id: row.2,
        active: row.3,
        weight: row.4,
        scopes: row.5,
        allow_list: row.6,
        deny_list: row.7,
        config: row.8,
    }
}

impl PgKnowledgeSourceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeSourceRegistry for PgKnowledgeSourceStore {
    async fn get_source(&self, source_id: &str) -> Result<Option<KnowledgeSourceRecord>> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT source_id, kind, mcp_server_id, active, weight, scopes, allow_list, deny_list, config
            FROM knowledge_sources
            WHERE source_id = $1
            "#,
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(row_to_source))
    }

    async fn list_active_sources(&self) -> Result<Vec<KnowledgeSourceRecord>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT source_id, kind, mcp_server_id, active, weight, scopes, allow_list, deny_list, config
            FROM knowledge_sources
            WHERE active
            ORDER BY source_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(row_to_source).collect())
    }

    async fn create_source(&self, source: KnowledgeSourceRecord) -> Result<KnowledgeSourceRecord> {
        let row = sqlx::query_as::<_, SourceRow>(
            r#"
            INSERT INTO knowledge_sources
                (source_id, kind, mcp_server_id, active, weight, scopes, allow_list, deny_list, config)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (source_id) DO UPDATE SET
                kind = EXCLUDED.kind,
                mcp_server_id = EXCLUDED.mcp_server_id,
                active = EXCLUDED.active,
                weight = EXCLUDED.weight,
                scopes = EXCLUDED.scopes,
                allow_list = EXCLUDED.allow_list,
                deny_list = EXCLUDED.deny_list,
                config = EXCLUDED.config
            RETURNING source_id, kind, mcp_server_id, active, weight, scopes, allow_list, deny_list, config
            "#,
        )
        .bind(&source.source_id)
        .bind(&source.kind)
        .bind(&source.mcp_server_id)
        .bind(source.active)
        .bind(source.weight)
        .bind(&source.scopes)
        .bind(&source.allow_list)
        .bind(&source.deny_list)
        .bind(&source.config)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row_to_source(row))
    }
}

// ── PgKnowledgeServerStore ─────────────────────────────────────

pub struct PgKnowledgeServerStore {
    pool: PgPool,
}

type ServerRow = (String, String, Vec<String>);

fn row_to_server(row: ServerRow) -> MCPServerInfo {
    MCPServerInfo {
        server_id: row.0,
        name: row.1,
        scopes: row.2,
    }
}

impl PgKnowledgeServerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeServerRegistry for PgKnowledgeServerStore {
    async fn discover_servers(&self) -> Result<Vec<MCPServerInfo>> {
        let rows = sqlx::query_as::<_, ServerRow>(
            "SELECT server_id, name, scopes FROM mcp_servers ORDER BY server_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(row_to_server).collect())
    }

    async fn get_server(&self, server_id: &str) -> Result<Option<MCPServerInfo>> {
        let row = sqlx::query_as::<_, ServerRow>(
            "SELECT server_id, name, scopes FROM mcp_servers WHERE server_id = $1",
        )
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(row_to_server))
    }
}

// ── PgChunkHashStore ───────────────────────────────────────────

/// Durable fallback behind the retriever's in-process `DashMap` cache. Grounded
/// on `source_service.py`'s persisted `chunk_cache` table, see
/// [`trust_core::retriever`].
pub struct PgChunkHashStore {
    pool: PgPool,
}

type ChunkRow = (String, String, f64, serde_json::Value, Option<DateTime<Utc>>, String);

fn row_to_chunk(row: ChunkRow) -> ChunkWithHash {
    ChunkWithHash {
        source_id: row.0,
        text: row.1,
        score: row.2,
        metadata: row.3,
        timestamp: row.4,
        content_hash: row.5,
    }
}

impl PgChunkHashStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkHashIndex for PgChunkHashStore {
    async fn get_by_hash(&self, source_id: &str, hash: &str) -> Result<Option<ChunkWithHash>> {
        let row = sqlx::query_as::<_, ChunkRow>(
            r#"
            SELECT source_id, text, score, metadata, timestamp, content_hash
            FROM chunk_cache
            WHERE source_id = $1 AND content_hash = $2
            "#,
        )
        .bind(source_id)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(row_to_chunk))
    }

    async fn put(&self, chunk: ChunkWithHash) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chunk_cache (source_id, content_hash, text, score, metadata, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source_id, content_hash) DO UPDATE SET
                text = EXCLUDED.text,
                score = EXCLUDED.score,
                metadata = EXCLUDED.metadata,
                timestamp = EXCLUDED.timestamp
            "#,
        )
        .bind(&chunk.source_id)
        .bind(&chunk.content_hash)
        .bind(&chunk.text)
        .bind(chunk.score)
        .bind(&chunk.metadata)
        .bind(chunk.timestamp)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

// ── PgEntityStore<T> ───────────────────────────────────────────

/// Generic Repository-layer backend: one physical table per entity kind,
/// `id` as primary key, the rest of the entity round-tripped through a
/// `data JSONB` column so this one adapter serves every [`JsonEntity`]
/// without a migration per domain type.
///
/// `owner_column`/`owner_value` are denormalized out of `data` into their own
/// columns so a Row Guard filter can be pushed down as a `WHERE` clause
/// instead of a JSONB containment scan.
pub struct PgEntityStore<T: JsonEntity> {
    pool: PgPool,
    _kind: std::marker::PhantomData<fn() -> T>,
}

impl<T: JsonEntity> PgEntityStore<T> {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, _kind: std::marker::PhantomData }
    }

    fn table(&self) -> &'static str {
        T::table_name()
    }

    fn decode(&self, data: serde_json::Value) -> Result<T> {
        serde_json::from_value(data)
            .map_err(|e| TrustError::Internal(anyhow!("corrupt row in {}: {e}", self.table())))
    }
}

#[async_trait]
impl<T: JsonEntity> EntityStore<T> for PgEntityStore<T> {
    async fn create(&self, assignment: OwnerAssignment, entity: T) -> Result<T> {
        let (entity, owner_column, owner_value) = match assignment {
            OwnerAssignment::Assign { column, value } => (entity.with_owner_assigned(column, value), Some(column), Some(value)),
            OwnerAssignment::None => (entity, None, None),
        };
        let id = entity.entity_id();
        let data = serde_json::to_value(&entity)
            .map_err(|e| TrustError::Internal(anyhow!("failed to serialize {}: {e}", self.table())))?;

        let sql = format!(
            r#"
            INSERT INTO {table} (id, owner_column, owner_value, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, now(), now())
            RETURNING data
            "#,
            table = self.table()
        );
        let (data,): (serde_json::Value,) = sqlx::query_as(&sql)
            .bind(id)
            .bind(owner_column)
            .bind(owner_value)
            .bind(&data)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        self.decode(data)
    }

    async fn get_by_id(&self, filter: RowFilter, id: Uuid) -> Result<Option<T>> {
        let row: Option<(serde_json::Value,)> = match filter {
            RowFilter::Unrestricted => {
                let sql = format!("SELECT data FROM {} WHERE id = $1", self.table());
                sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await.map_err(db_err)?
            }
            RowFilter::Equals { column, value } => {
                let sql = format!(
                    "SELECT data FROM {} WHERE id = $1 AND owner_column = $2 AND owner_value = $3",
                    self.table()
                );
                sqlx::query_as(&sql)
                    .bind(id)
                    .bind(column)
                    .bind(value)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?
            }
        };
        row.map(|(data,)| self.decode(data)).transpose()
    }

    async fn list(&self, filter: RowFilter, page: PageRequest) -> Result<Page<T>> {
        if page.order_by != "created_at" {
            return Err(TrustError::BadRequest(format!(
                "{} only supports ordering by created_at",
                self.table()
            )));
        }
        let limit = page.fetch_limit() as i64;
        let after = page
            .cursor
            .as_ref()
            .map(|c| serde_json::from_value::<DateTime<Utc>>(c.value.clone()))
            .transpose()
            .map_err(|e| TrustError::BadRequest(format!("invalid cursor value: {e}")))?;

        let rows: Vec<(serde_json::Value, DateTime<Utc>, Uuid)> = match filter {
            RowFilter::Unrestricted => {
                let sql = format!(
                    "SELECT data, created_at, id FROM {} WHERE ($1::timestamptz IS NULL OR created_at > $1) ORDER BY created_at, id LIMIT $2",
                    self.table()
                );
                sqlx::query_as(&sql).bind(after).bind(limit).fetch_all(&self.pool).await.map_err(db_err)?
            }
            RowFilter::Equals { column, value } => {
                let sql = format!(
                    "SELECT data, created_at, id FROM {} WHERE owner_column = $1 AND owner_value = $2 AND ($3::timestamptz IS NULL OR created_at > $3) ORDER BY created_at, id LIMIT $4",
                    self.table()
                );
                sqlx::query_as(&sql)
                    .bind(column)
                    .bind(value)
                    .bind(after)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_err)?
            }
        };

        let decoded: Vec<(T, DateTime<Utc>, Uuid)> = rows
            .into_iter()
            .map(|(data, created_at, id)| self.decode(data).map(|e| (e, created_at, id)))
            .collect::<Result<_>>()?;

        let order_by = page.order_by.clone();
        Page::from_overfetched(decoded, page.limit, &order_by, |(_, created_at, id)| {
            (serde_json::to_value(created_at).expect("DateTime<Utc> always serializes"), *id)
        })
        .map(|p| Page { items: p.items.into_iter().map(|(e, _, _)| e).collect(), next_cursor: p.next_cursor })
    }

    async fn update(&self, filter: RowFilter, id: Uuid, entity: T) -> Result<T> {
        let data = serde_json::to_value(&entity)
            .map_err(|e| TrustError::Internal(anyhow!("failed to serialize {}: {e}", self.table())))?;
        let row: Option<(serde_json::Value,)> = match filter {
            RowFilter::Unrestricted => {
                let sql = format!("UPDATE {} SET data = $2, updated_at = now() WHERE id = $1 RETURNING data", self.table());
                sqlx::query_as(&sql).bind(id).bind(&data).fetch_optional(&self.pool).await.map_err(db_err)?
            }
            RowFilter::Equals { column, value } => {
                let sql = format!(
                    "UPDATE {} SET data = $2, updated_at = now() WHERE id = $1 AND owner_column = $3 AND owner_value = $4 RETURNING data",
                    self.table()
                );
                sqlx::query_as(&sql)
                    .bind(id)
                    .bind(&data)
                    .bind(column)
                    .bind(value)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(db_err)?
            }
        };
        let (data,) = row.ok_or_else(|| TrustError::NotFound(format!("{} {id}", self.table())))?;
        self.decode(data)
    }

    async fn delete(&self, filter: RowFilter, id: Uuid) -> Result<()> {
        let affected = match filter {
            RowFilter::Unrestricted => {
                let sql = format!("DELETE FROM {} WHERE id = $1", self.table());
                sqlx::query(&sql).bind(id).execute(&self.pool).await.map_err(db_err)?.rows_affected()
            }
            RowFilter::Equals { column, value } => {
                let sql = format!(
                    "DELETE FROM {} WHERE id = $1 AND owner_column = $2 AND owner_value = $3",
                    self.table()
                );
                sqlx::query(&sql)
                    .bind(id)
                    .bind(column)
                    .bind(value)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err)?
                    .rows_affected()
            }
        };
        if affected == 0 {
            return Err(TrustError::NotFound(format!("{} {id}", self.table())));
        }
        Ok(())
    }
}
