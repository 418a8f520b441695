//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the PostgreSQL implementation of the
//! storage ports from the `procurement_core` crate: documents, blobs, counters,
//! reset codes and the compensation log all live in one database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use procurement_core::domain::{BlobRef, Compensation, ResetCodeStatus, ResetRequest, UploadedFile};
use procurement_core::ports::{
    BlobStore, Collection, CompensationLog, CounterStore, Document, DocumentList, DocumentStore,
    Fields, Filter, PortError, PortResult, Query, ResetCodeStore,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn port_error(e: sqlx::Error) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            PortError::AlreadyExists(db.message().to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    id: String,
    fields: Json<Fields>,
}
impl DocumentRecord {
    fn to_domain(self) -> Document {
        Document {
            id: self.id,
            fields: self.fields.0,
        }
    }
}

#[derive(FromRow)]
struct ResetRecord {
    id: Uuid,
    user_email: String,
    code: String,
    issued_at: DateTime<Utc>,
    status: String,
}
impl ResetRecord {
    fn to_domain(self) -> PortResult<ResetRequest> {
        let status = ResetCodeStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("Unknown reset code status '{}'", self.status))
        })?;
        Ok(ResetRequest {
            id: self.id,
            user_email: self.user_email,
            code: self.code,
            issued_at: self.issued_at,
            status,
        })
    }
}

#[derive(FromRow)]
struct CompensationRecord {
    id: Uuid,
    bucket_id: String,
    blob_id: String,
    attempts: i32,
    last_error: String,
    recorded_at: DateTime<Utc>,
}
impl CompensationRecord {
    fn to_domain(self) -> Compensation {
        Compensation {
            id: self.id,
            bucket_id: self.bucket_id,
            blob_id: self.blob_id,
            attempts: u32::try_from(self.attempts).unwrap_or_default(),
            last_error: self.last_error,
            recorded_at: self.recorded_at,
        }
    }
}

//=========================================================================================
// Query Building
//=========================================================================================

/// Appends the `WHERE` predicate for a collection and its filters.
fn push_where(qb: &mut QueryBuilder<'_, Postgres>, collection: Collection, filters: &[Filter]) {
    qb.push("collection = ").push_bind(collection.as_str());
    for filter in filters {
        let (field, op, value) = match filter {
            Filter::Equal(field, value) => (field, " = ", value),
            Filter::LessThan(field, value) => (field, " < ", value),
            Filter::GreaterThan(field, value) => (field, " > ", value),
            Filter::In(_, values) if values.is_empty() => {
                qb.push(" AND FALSE");
                continue;
            }
            Filter::In(field, values) => {
                qb.push(" AND fields -> ").push_bind(field.clone()).push(" IN (");
                let mut list = qb.separated(", ");
                for value in values {
                    list.push_bind(Json(value.clone()));
                }
                list.push_unseparated(")");
                continue;
            }
        };
        qb.push(" AND fields -> ")
            .push_bind(field.clone())
            .push(op)
            .push_bind(Json(value.clone()));
    }
}

/// Appends ordering and the offset window. Ties fall back to insertion order.
fn push_window(qb: &mut QueryBuilder<'_, Postgres>, query: &Query) {
    if let Some(order) = &query.order_by {
        qb.push(" ORDER BY fields -> ")
            .push_bind(order.field.clone())
            .push(if order.descending { " DESC" } else { " ASC" })
            .push(",");
    } else {
        qb.push(" ORDER BY");
    }
    qb.push(" created_at, id");
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ").push_bind(i64::from(limit));
    }
    qb.push(" OFFSET ").push_bind(i64::from(query.offset));
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn create_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> PortResult<Document> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "INSERT INTO documents (collection, id, fields) VALUES ($1, $2, $3) RETURNING id, fields",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(fields))
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.to_domain())
    }

    async fn get_document(&self, collection: Collection, id: &str) -> PortResult<Document> {
        sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, fields FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(DocumentRecord::to_domain)
        .ok_or_else(|| PortError::NotFound(format!("{} {} not found", collection.as_str(), id)))
    }

    async fn list_documents(&self, collection: Collection, query: &Query) -> PortResult<DocumentList> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM documents WHERE ");
        push_where(&mut count, collection, &query.filters);
        let total: i64 = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(port_error)?;

        let items = if query.limit == Some(0) {
            Vec::new()
        } else {
            let mut select = QueryBuilder::<Postgres>::new("SELECT id, fields FROM documents WHERE ");
            push_where(&mut select, collection, &query.filters);
            push_window(&mut select, query);
            select
                .build_query_as::<DocumentRecord>()
                .fetch_all(&self.pool)
                .await
                .map_err(port_error)?
                .into_iter()
                .map(DocumentRecord::to_domain)
                .collect()
        };

        Ok(DocumentList {
            items,
            total: u64::try_from(total).unwrap_or_default(),
        })
    }

    async fn update_document(
        &self,
        collection: Collection,
        id: &str,
        fields: Fields,
    ) -> PortResult<Document> {
        sqlx::query_as::<_, DocumentRecord>(
            "UPDATE documents SET fields = fields || $3 WHERE collection = $1 AND id = $2 RETURNING id, fields",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(fields))
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(DocumentRecord::to_domain)
        .ok_or_else(|| PortError::NotFound(format!("{} {} not found", collection.as_str(), id)))
    }
}

//=========================================================================================
// `BlobStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl BlobStore for DbAdapter {
    async fn upload_blob(&self, bucket: &str, id: &str, file: &UploadedFile) -> PortResult<BlobRef> {
        sqlx::query(
            "INSERT INTO blobs (bucket_id, id, file_name, mime_type, content) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(bucket)
        .bind(id)
        .bind(&file.file_name)
        .bind(&file.mime_type)
        .bind(&file.bytes)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;

        debug!(bucket = %bucket, id = %id, size = file.bytes.len(), "Stored blob");
        Ok(BlobRef {
            id: id.to_string(),
            bucket_id: bucket.to_string(),
            file_name: file.file_name.clone(),
            mime_type: file.mime_type.clone(),
        })
    }

    async fn download_blob(&self, bucket: &str, id: &str) -> PortResult<Vec<u8>> {
        sqlx::query_scalar::<_, Vec<u8>>("SELECT content FROM blobs WHERE bucket_id = $1 AND id = $2")
            .bind(bucket)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(port_error)?
            .ok_or_else(|| PortError::NotFound(format!("Blob {}/{} not found", bucket, id)))
    }

    async fn delete_blob(&self, bucket: &str, id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM blobs WHERE bucket_id = $1 AND id = $2")
            .bind(bucket)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Blob {}/{} not found", bucket, id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `CounterStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CounterStore for DbAdapter {
    async fn increment(&self, key: &str) -> PortResult<u64> {
        let value: i64 = sqlx::query_scalar(
            "INSERT INTO counters (key, value) VALUES ($1, 1) \
             ON CONFLICT (key) DO UPDATE SET value = counters.value + 1 \
             RETURNING value",
        )
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;

        u64::try_from(value)
            .map_err(|_| PortError::Unexpected(format!("Counter {} is negative: {}", key, value)))
    }
}

//=========================================================================================
// `ResetCodeStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ResetCodeStore for DbAdapter {
    async fn insert(&self, request: &ResetRequest) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO password_reset_requests (id, user_email, code, issued_at, status) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(request.id)
        .bind(&request.user_email)
        .bind(&request.code)
        .bind(request.issued_at)
        .bind(request.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn find_latest(&self, email: &str, code: &str) -> PortResult<Option<ResetRequest>> {
        sqlx::query_as::<_, ResetRecord>(
            "SELECT id, user_email, code, issued_at, status FROM password_reset_requests \
             WHERE user_email = $1 AND code = $2 ORDER BY issued_at DESC LIMIT 1",
        )
        .bind(email)
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?
        .map(ResetRecord::to_domain)
        .transpose()
    }

    async fn set_status(&self, id: Uuid, status: ResetCodeStatus) -> PortResult<()> {
        let result = sqlx::query("UPDATE password_reset_requests SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Reset request {} not found", id)));
        }
        Ok(())
    }
}

//=========================================================================================
// `CompensationLog` Trait Implementation
//=========================================================================================

#[async_trait]
impl CompensationLog for DbAdapter {
    async fn record(&self, compensation: &Compensation) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO compensations (id, bucket_id, blob_id, attempts, last_error, recorded_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(compensation.id)
        .bind(&compensation.bucket_id)
        .bind(&compensation.blob_id)
        .bind(i32::try_from(compensation.attempts).unwrap_or(i32::MAX))
        .bind(&compensation.last_error)
        .bind(compensation.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(())
    }

    async fn pending(&self, max_attempts: u32) -> PortResult<Vec<Compensation>> {
        let records = sqlx::query_as::<_, CompensationRecord>(
            "SELECT id, bucket_id, blob_id, attempts, last_error, recorded_at FROM compensations \
             WHERE resolved_at IS NULL AND attempts < $1 ORDER BY recorded_at ASC",
        )
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;

        Ok(records.into_iter().map(CompensationRecord::to_domain).collect())
    }

    async fn record_attempt(&self, id: Uuid, error: &str) -> PortResult<()> {
        sqlx::query("UPDATE compensations SET attempts = attempts + 1, last_error = $1 WHERE id = $2")
            .bind(error)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn mark_resolved(&self, id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE compensations SET resolved_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_render_as_jsonb_predicates() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM documents WHERE ");
        push_where(
            &mut qb,
            Collection::Posts,
            &[
                Filter::equal("status", "active"),
                Filter::greater_than("submissionDeadline", "2024-05-10T10:00:00.000Z"),
                Filter::one_of("status", ["active", "closed"]),
            ],
        );

        assert_eq!(
            qb.sql(),
            "SELECT id FROM documents WHERE collection = $1 \
             AND fields -> $2 = $3 \
             AND fields -> $4 > $5 \
             AND fields -> $6 IN ($7, $8)"
        );
    }

    #[test]
    fn empty_in_filters_match_nothing() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM documents WHERE ");
        push_where(&mut qb, Collection::Applications, &[Filter::In("status".into(), vec![])]);

        assert_eq!(qb.sql(), "SELECT id FROM documents WHERE collection = $1 AND FALSE");
    }

    #[test]
    fn windows_order_by_field_then_insertion() {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM documents");
        push_window(&mut qb, &Query::new().order_by_desc("createdAt").limit(8).offset(16));
        assert_eq!(
            qb.sql(),
            "SELECT id FROM documents ORDER BY fields -> $1 DESC, created_at, id LIMIT $2 OFFSET $3"
        );

        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM documents");
        push_window(&mut qb, &Query::new());
        assert_eq!(qb.sql(), "SELECT id FROM documents ORDER BY created_at, id OFFSET $1");
    }

    #[test]
    fn sqlx_errors_map_to_port_errors() {
        assert!(matches!(port_error(sqlx::Error::RowNotFound), PortError::NotFound(_)));
        assert!(matches!(
            port_error(sqlx::Error::PoolTimedOut),
            PortError::Unexpected(_)
        ));
    }
}
