//! # Inventory Cache Repository
//!
//! The last branch inventory the till saw online, kept so checkout can
//! continue when the backend is unreachable.
//!
//! ```text
//! online refresh ──► replace_branch(branch, items)   (whole branch, one tx)
//! offline read   ──► load_branch(branch)
//! offline sale   ──► update_local_stock(branch, product, -qty)
//!                    stock never drops below zero
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use rxdesk_core::{InventorySnapshotItem, Money};

/// Repository for the branch inventory cache.
#[derive(Debug, Clone)]
pub struct InventoryCacheRepository {
    pool: SqlitePool,
}

#[derive(Debug, FromRow)]
struct CachedItemRow {
    product_id: String,
    name: String,
    branch_stock: i64,
    selling_price: Option<i64>,
    unit_price: i64,
    expiry_date: Option<NaiveDate>,
    reorder_level: i64,
    batch_number: Option<String>,
    barcode: Option<String>,
}

impl From<CachedItemRow> for InventorySnapshotItem {
    fn from(row: CachedItemRow) -> Self {
        InventorySnapshotItem {
            product_id: row.product_id,
            name: row.name,
            branch_stock: row.branch_stock,
            selling_price: row.selling_price.map(Money::from_minor),
            unit_price: Money::from_minor(row.unit_price),
            expiry_date: row.expiry_date,
            reorder_level: row.reorder_level,
            batch_number: row.batch_number,
            barcode: row.barcode,
        }
    }
}

impl InventoryCacheRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryCacheRepository { pool }
    }

    /// Replaces everything cached for `branch_id` with `items`.
    pub async fn replace_branch(
        &self,
        branch_id: &str,
        items: &[InventorySnapshotItem],
        refreshed_at: DateTime<Utc>,
    ) -> DbResult<()> {
        debug!(branch_id = %branch_id, count = items.len(), "Replacing inventory cache");

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM inventory_cache WHERE branch_id = ?1")
            .bind(branch_id)
            .execute(&mut *tx)
            .await?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO inventory_cache (
                    branch_id, product_id, name, branch_stock, selling_price,
                    unit_price, expiry_date, reorder_level, batch_number, barcode,
                    refreshed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(branch_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.branch_stock.max(0))
            .bind(item.selling_price.map(|p| p.minor()))
            .bind(item.unit_price.minor())
            .bind(item.expiry_date)
            .bind(item.reorder_level)
            .bind(&item.batch_number)
            .bind(&item.barcode)
            .bind(refreshed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Every cached row for the branch, including zero-stock rows.
    pub async fn load_branch(&self, branch_id: &str) -> DbResult<Vec<InventorySnapshotItem>> {
        let rows = sqlx::query_as::<_, CachedItemRow>(
            r#"
            SELECT
                product_id, name, branch_stock, selling_price, unit_price,
                expiry_date, reorder_level, batch_number, barcode
            FROM inventory_cache
            WHERE branch_id = ?1
            ORDER BY name COLLATE NOCASE ASC
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(InventorySnapshotItem::from).collect())
    }

    /// When the branch cache was last replaced, if ever.
    pub async fn last_refreshed(&self, branch_id: &str) -> DbResult<Option<DateTime<Utc>>> {
        let refreshed = sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT refreshed_at FROM inventory_cache WHERE branch_id = ?1 LIMIT 1",
        )
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(refreshed)
    }

    /// Adds `delta` to a cached stock level, clamping at zero.
    ///
    /// Returns the new stock, or `None` if the product is not cached.
    pub async fn update_local_stock(
        &self,
        branch_id: &str,
        product_id: &str,
        delta: i64,
    ) -> DbResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        adjust_stock(&mut *conn, branch_id, product_id, delta).await
    }

    pub async fn count(&self, branch_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM inventory_cache WHERE branch_id = ?1")
                .bind(branch_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

/// Stock adjustment shared with the offline journal, which runs it inside
/// its own transaction.
pub(crate) async fn adjust_stock(
    conn: &mut SqliteConnection,
    branch_id: &str,
    product_id: &str,
    delta: i64,
) -> DbResult<Option<i64>> {
    let stock = sqlx::query_scalar::<_, i64>(
        r#"
        UPDATE inventory_cache
        SET branch_stock = MAX(0, branch_stock + ?3)
        WHERE branch_id = ?1 AND product_id = ?2
        RETURNING branch_stock
        "#,
    )
    .bind(branch_id)
    .bind(product_id)
    .bind(delta)
    .fetch_optional(&mut *conn)
    .await?;

    debug!(
        branch_id = %branch_id,
        product_id = %product_id,
        delta,
        stock = ?stock,
        "Local stock adjusted"
    );

    Ok(stock)
}

// =============================================================================
// Unit Tests
// =============================================================================
