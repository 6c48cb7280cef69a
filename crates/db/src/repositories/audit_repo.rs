//! Repository for the append-only `audit_logs` table.

use chrono::{SubsecRound, Utc};
use gatehouse_core::audit::{canonical_entry, compute_integrity_hash};
use gatehouse_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::audit::{AuditLog, AuditQuery, CreateAuditLog};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

/// Column list for SELECTs; expects `audit_logs a LEFT JOIN users u`.
const COLUMNS: &str = "\
    a.id, a.user_id, u.username, a.action, a.resource, a.details, \
    a.ip_address, a.integrity_hash, a.created_at";

/// Column list for RETURNING clauses on insert (no join available).
const RETURNING_COLUMNS: &str = "\
    id, user_id, NULL::TEXT AS username, action, resource, details, \
    ip_address, integrity_hash, created_at";

/// Advisory lock key serializing writers of the hash chain.
const CHAIN_LOCK_KEY: i64 = 0x6761_7465_6175_6474;

// ---------------------------------------------------------------------------
// AuditLogRepo
// ---------------------------------------------------------------------------

/// Provides append and query operations for audit logs.
pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Append one entry to the hash chain.
    ///
    /// Writers are serialized with a transaction-scoped advisory lock so each
    /// entry chains to the true predecessor. The timestamp is taken here,
    /// truncated to the microsecond precision PostgreSQL stores.
    pub async fn append(pool: &PgPool, entry: &CreateAuditLog) -> Result<AuditLog, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(CHAIN_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let prev_hash: Option<String> = sqlx::query_scalar(
            "SELECT integrity_hash FROM audit_logs ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let created_at: Timestamp = Utc::now().trunc_subsecs(6);
        let entry_data = canonical_entry(
            entry.user_id,
            &entry.action,
            &entry.resource,
            &entry.details,
            entry.ip_address.as_deref(),
            created_at,
        );
        let integrity_hash = compute_integrity_hash(prev_hash.as_deref(), &entry_data);

        let query = format!(
            "INSERT INTO audit_logs \
                (user_id, action, resource, details, ip_address, integrity_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {RETURNING_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AuditLog>(&query)
            .bind(entry.user_id)
            .bind(&entry.action)
            .bind(&entry.resource)
            .bind(&entry.details)
            .bind(&entry.ip_address)
            .bind(&integrity_hash)
            .bind(created_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    /// Query audit logs with filtering and pagination, newest first.
    pub async fn query(
        pool: &PgPool,
        params: &AuditQuery,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditLog>, sqlx::Error> {
        let (where_clause, bind_values, bind_idx) = build_audit_filter(params);

        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs a LEFT JOIN users u ON u.id = a.user_id \
             {where_clause} \
             ORDER BY a.created_at DESC, a.id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let q = bind_audit_values(sqlx::query_as::<_, AuditLog>(&query), &bind_values);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count audit logs matching the given filter (for pagination metadata).
    pub async fn count(pool: &PgPool, params: &AuditQuery) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_audit_filter(params);

        let query = format!("SELECT COUNT(*)::BIGINT AS count FROM audit_logs a {where_clause}");

        let mut q = sqlx::query_scalar::<_, i64>(&query);
        for val in &bind_values {
            q = match val {
                BindValue::BigInt(v) => q.bind(*v),
                BindValue::Text(v) => q.bind(v.as_str()),
                BindValue::Timestamp(v) => q.bind(*v),
            };
        }
        q.fetch_one(pool).await
    }

    /// Every entry in id order, for hash chain verification.
    pub async fn fetch_chain(pool: &PgPool) -> Result<Vec<AuditLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs a LEFT JOIN users u ON u.id = a.user_id \
             ORDER BY a.id ASC"
        );
        sqlx::query_as::<_, AuditLog>(&query).fetch_all(pool).await
    }
}

// ---------------------------------------------------------------------------
// Dynamic filter helpers
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built audit log queries.
enum BindValue {
    BigInt(i64),
    Text(String),
    Timestamp(Timestamp),
}

/// Build a WHERE clause and bind values from `AuditQuery` filter parameters.
///
/// Returns `(where_clause, bind_values, next_bind_index)`.
fn build_audit_filter(params: &AuditQuery) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(from) = params.from {
        conditions.push(format!("a.created_at >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = params.to {
        conditions.push(format!("a.created_at <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    if let Some(user_id) = params.user_id {
        conditions.push(format!("a.user_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(user_id));
    }

    if let Some(ref action) = params.action {
        conditions.push(format!("a.action = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(action.clone()));
    }

    if let Some(ref resource) = params.resource {
        conditions.push(format!("a.resource = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(resource.clone()));
    }

    if let Some(ref ip_address) = params.ip_address {
        conditions.push(format!("a.ip_address = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(ip_address.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bind_values, bind_idx)
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_audit_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::BigInt(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}
