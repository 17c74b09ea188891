//! # Offline Sale Journal
//!
//! Sales committed while the backend was unreachable, waiting to be
//! replayed.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  checkout (offline) ──► record_with_drawdown() ──► status = pending     │
//! │                                                       │                 │
//! │                     sync pass ────────────────────────┤                 │
//! │                                                       │                 │
//! │        backend accepts ──► mark_synced()  ──► status = synced           │
//! │        backend rejects ──► mark_rejected()──► status = rejected         │
//! │                                               (manual review, never     │
//! │                                                replayed again)          │
//! │        network error   ──► mark_failed()  ──► still pending,            │
//! │                                               attempts += 1             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are replayed in the order they were recorded, each with the
//! client reference it was journaled under, so a replay the backend has
//! already seen is dropped as a duplicate on its side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::inventory::adjust_stock;
use rxdesk_core::{Money, SaleRequest};

/// Replay state of a journaled sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineSaleStatus {
    Pending,
    Synced,
    Rejected,
}

impl OfflineSaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfflineSaleStatus::Pending => "pending",
            OfflineSaleStatus::Synced => "synced",
            OfflineSaleStatus::Rejected => "rejected",
        }
    }

    fn parse(value: &str) -> DbResult<Self> {
        match value {
            "pending" => Ok(OfflineSaleStatus::Pending),
            "synced" => Ok(OfflineSaleStatus::Synced),
            "rejected" => Ok(OfflineSaleStatus::Rejected),
            other => Err(DbError::CorruptPayload(format!(
                "unknown offline sale status '{}'",
                other
            ))),
        }
    }
}

/// A journaled offline sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSale {
    pub id: String,
    pub client_reference: String,
    pub branch_id: String,
    /// Local `OFF-` receipt id printed for the customer.
    pub receipt_id: String,
    pub request: SaleRequest,
    pub total: Money,
    pub status: OfflineSaleStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    /// Receipt id the backend assigned on replay.
    pub backend_receipt_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

/// Result of [`OfflineSaleRepository::record_with_drawdown`].
#[derive(Debug, Clone, PartialEq)]
pub struct JournaledSale {
    pub sale: OfflineSale,
    /// New cached stock per product drawn down. Products missing from the
    /// cache are left out.
    pub stock_levels: Vec<(String, i64)>,
    /// The reference was already journaled; nothing was written.
    pub duplicate: bool,
}

#[derive(Debug, FromRow)]
struct OfflineSaleRow {
    id: String,
    client_reference: String,
    branch_id: String,
    receipt_id: String,
    payload: String,
    total: i64,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    backend_receipt_id: Option<String>,
    created_at: DateTime<Utc>,
    attempted_at: Option<DateTime<Utc>>,
    synced_at: Option<DateTime<Utc>>,
}

impl TryFrom<OfflineSaleRow> for OfflineSale {
    type Error = DbError;

    fn try_from(row: OfflineSaleRow) -> DbResult<Self> {
        Ok(OfflineSale {
            request: serde_json::from_str(&row.payload)?,
            status: OfflineSaleStatus::parse(&row.status)?,
            id: row.id,
            client_reference: row.client_reference,
            branch_id: row.branch_id,
            receipt_id: row.receipt_id,
            total: Money::from_minor(row.total),
            attempts: row.attempts,
            last_error: row.last_error,
            backend_receipt_id: row.backend_receipt_id,
            created_at: row.created_at,
            attempted_at: row.attempted_at,
            synced_at: row.synced_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, client_reference, branch_id, receipt_id, payload, total, status,
        attempts, last_error, backend_receipt_id, created_at, attempted_at, synced_at
    FROM offline_sales
"#;

/// Repository for the offline sale journal.
#[derive(Debug, Clone)]
pub struct OfflineSaleRepository {
    pool: SqlitePool,
}

impl OfflineSaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OfflineSaleRepository { pool }
    }

    /// Journals a sale committed offline.
    ///
    /// Recording the same client reference twice returns the existing entry.
    pub async fn record(&self, request: &SaleRequest, receipt_id: &str) -> DbResult<OfflineSale> {
        let mut tx = self.pool.begin().await?;

        if let Some(existing) = find_in(&mut *tx, &request.client_reference).await? {
            debug!(
                client_reference = %request.client_reference,
                "Offline sale already journaled"
            );
            return Ok(existing);
        }

        let sale = insert_in(&mut *tx, request, receipt_id).await?;
        tx.commit().await?;
        Ok(sale)
    }

    /// Journals a sale committed offline and draws each line's quantity off
    /// the cached branch stock, in one transaction. Either both land or
    /// neither does.
    ///
    /// A client reference already in the journal writes nothing and returns
    /// the existing entry.
    pub async fn record_with_drawdown(
        &self,
        request: &SaleRequest,
        receipt_id: &str,
    ) -> DbResult<JournaledSale> {
        let mut tx = self.pool.begin().await?;

        if let Some(existing) = find_in(&mut *tx, &request.client_reference).await? {
            debug!(
                client_reference = %request.client_reference,
                "Offline sale already journaled"
            );
            return Ok(JournaledSale {
                sale: existing,
                stock_levels: Vec::new(),
                duplicate: true,
            });
        }

        let sale = insert_in(&mut *tx, request, receipt_id).await?;

        let mut stock_levels = Vec::with_capacity(request.items.len());
        for item in &request.items {
            let level =
                adjust_stock(&mut *tx, &request.branch_id, &item.product_id, -item.qty).await?;
            if let Some(level) = level {
                stock_levels.push((item.product_id.clone(), level));
            }
        }

        tx.commit().await?;

        Ok(JournaledSale {
            sale,
            stock_levels,
            duplicate: false,
        })
    }

    pub async fn find_by_reference(&self, client_reference: &str) -> DbResult<Option<OfflineSale>> {
        let mut conn = self.pool.acquire().await?;
        find_in(&mut *conn, client_reference).await
    }

    /// Pending entries, oldest first.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<OfflineSale>> {
        self.by_status(OfflineSaleStatus::Pending, limit).await
    }

    /// Entries the backend refused, oldest first.
    pub async fn rejected(&self, limit: u32) -> DbResult<Vec<OfflineSale>> {
        self.by_status(OfflineSaleStatus::Rejected, limit).await
    }

    pub async fn mark_synced(&self, id: &str, backend_receipt_id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE offline_sales SET
                status = 'synced',
                backend_receipt_id = ?2,
                attempts = attempts + 1,
                last_error = NULL,
                attempted_at = ?3,
                synced_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(backend_receipt_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Offline sale", id));
        }
        Ok(())
    }

    /// The backend refused the sale; it stays in the journal for review.
    pub async fn mark_rejected(&self, id: &str, reason: &str) -> DbResult<()> {
        warn!(id = %id, reason = %reason, "Offline sale rejected by backend");

        let result = sqlx::query(
            r#"
            UPDATE offline_sales SET
                status = 'rejected',
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Offline sale", id));
        }
        Ok(())
    }

    /// Records a failed attempt; the entry stays pending.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE offline_sales SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM offline_sales WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    async fn by_status(&self, status: OfflineSaleStatus, limit: u32) -> DbResult<Vec<OfflineSale>> {
        let rows = sqlx::query_as::<_, OfflineSaleRow>(&format!(
            "{} WHERE status = ?1 ORDER BY seq ASC LIMIT ?2",
            SELECT_COLUMNS
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OfflineSale::try_from).collect()
    }
}

async fn find_in(
    conn: &mut SqliteConnection,
    client_reference: &str,
) -> DbResult<Option<OfflineSale>> {
    let row = sqlx::query_as::<_, OfflineSaleRow>(&format!(
        "{} WHERE client_reference = ?1",
        SELECT_COLUMNS
    ))
    .bind(client_reference)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(OfflineSale::try_from).transpose()
}

async fn insert_in(
    conn: &mut SqliteConnection,
    request: &SaleRequest,
    receipt_id: &str,
) -> DbResult<OfflineSale> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let payload = serde_json::to_string(request)?;

    sqlx::query(
        r#"
        INSERT INTO offline_sales (
            id, client_reference, branch_id, receipt_id, payload, total,
            status, attempts, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 0, ?7)
        "#,
    )
    .bind(&id)
    .bind(&request.client_reference)
    .bind(&request.branch_id)
    .bind(receipt_id)
    .bind(&payload)
    .bind(request.total.minor())
    .bind(now)
    .execute(&mut *conn)
    .await?;

    info!(
        receipt_id = %receipt_id,
        total = request.total.minor(),
        "Offline sale journaled"
    );

    Ok(OfflineSale {
        id,
        client_reference: request.client_reference.clone(),
        branch_id: request.branch_id.clone(),
        receipt_id: receipt_id.to_string(),
        request: request.clone(),
        total: request.total,
        status: OfflineSaleStatus::Pending,
        attempts: 0,
        last_error: None,
        backend_receipt_id: None,
        created_at: now,
        attempted_at: None,
        synced_at: None,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
