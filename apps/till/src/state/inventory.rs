//! # Inventory Snapshot Provider
//!
//! Supplies branch inventory to the cart and the checkout gates, tagged
//! with where it came from.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  refresh()                                                              │
//! │     │                                                                   │
//! │     ├── backend.fetch_branch_inventory ──Ok──► replace SQLite cache     │
//! │     │                                          snapshot { offline: no } │
//! │     │                                                                   │
//! │     └── transient failure ───────────────────► read SQLite cache        │
//! │                                                snapshot { offline: yes }│
//! │                                                                         │
//! │  journal_offline_sale(request) ──► journal row + cache drawdown (one tx)│
//! │  then the in-memory snapshot, so this till does not oversell before sync│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use rxdesk_backend::PharmacyBackend;
use rxdesk_core::{InventorySnapshot, InventorySnapshotItem, SaleRequest};
use rxdesk_db::{Database, OfflineSale};

use crate::error::ApiResult;

pub struct InventoryProvider {
    branch_id: String,
    backend: Arc<dyn PharmacyBackend>,
    db: Database,
    offline: AtomicBool,
    current: RwLock<Option<InventorySnapshot>>,
}

impl std::fmt::Debug for InventoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryProvider")
            .field("branch_id", &self.branch_id)
            .field("offline", &self.is_offline())
            .finish_non_exhaustive()
    }
}

impl InventoryProvider {
    pub fn new(branch_id: impl Into<String>, backend: Arc<dyn PharmacyBackend>, db: Database) -> Self {
        InventoryProvider {
            branch_id: branch_id.into(),
            backend,
            db,
            offline: AtomicBool::new(false),
            current: RwLock::new(None),
        }
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    pub fn backend(&self) -> &dyn PharmacyBackend {
        self.backend.as_ref()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// True after the last backend call failed to get through.
    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }

    /// Records the outcome of a backend call.
    pub fn set_offline(&self, offline: bool) {
        let was = self.offline.swap(offline, Ordering::AcqRel);
        if was != offline {
            if offline {
                warn!(branch_id = %self.branch_id, "Backend unreachable, switching to offline mode");
            } else {
                info!(branch_id = %self.branch_id, "Backend reachable again");
            }
        }
    }

    /// Fresh read for the checkout gates: the backend when reachable, the
    /// local cache otherwise.
    pub async fn refresh(&self) -> ApiResult<InventorySnapshot> {
        let snapshot = match self.backend.fetch_branch_inventory(&self.branch_id).await {
            Ok(items) => {
                let now = Utc::now();
                self.db
                    .inventory()
                    .replace_branch(&self.branch_id, &items, now)
                    .await?;
                self.set_offline(false);
                info!(branch_id = %self.branch_id, count = items.len(), "Inventory snapshot refreshed");
                InventorySnapshot::new(self.branch_id.clone(), items, false, now)
            }
            Err(e) if e.is_transient() => {
                self.set_offline(true);
                self.cached_snapshot().await?
            }
            Err(e) => return Err(e.into()),
        };

        *self.current.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// The last snapshot taken, refreshing if there is none yet.
    pub async fn current(&self) -> ApiResult<InventorySnapshot> {
        if let Some(snapshot) = self.current.read().await.as_ref() {
            return Ok(snapshot.clone());
        }
        self.refresh().await
    }

    /// Looks a product up by barcode or id in the current snapshot.
    pub async fn find(&self, code: &str) -> ApiResult<Option<InventorySnapshotItem>> {
        Ok(self.current().await?.find(code.trim()).cloned())
    }

    /// Sellable items (stock on hand) whose name, id or barcode matches
    /// `query`, for product listings.
    pub async fn search(&self, query: &str, limit: usize) -> ApiResult<Vec<InventorySnapshotItem>> {
        let raw = query.trim();
        let query = raw.to_lowercase();
        let snapshot = self.current().await?;

        Ok(snapshot
            .sellable()
            .filter(|item| {
                query.is_empty()
                    || item.name.to_lowercase().contains(&query)
                    || item.product_id.eq_ignore_ascii_case(raw)
                    || item
                        .barcode
                        .as_deref()
                        .is_some_and(|barcode| barcode.eq_ignore_ascii_case(raw))
            })
            .take(limit)
            .cloned()
            .collect())
    }

    /// Adjusts cached stock by `delta` (never below zero). Returns the new
    /// level, or `None` if the product is not cached.
    pub async fn update_local_stock(&self, product_id: &str, delta: i64) -> ApiResult<Option<i64>> {
        let level = self
            .db
            .inventory()
            .update_local_stock(&self.branch_id, product_id, delta)
            .await?;

        if let Some(snapshot) = self.current.write().await.as_mut() {
            if let Some(item) = snapshot.items.iter_mut().find(|i| i.product_id == product_id) {
                item.branch_stock = level.unwrap_or((item.branch_stock + delta).max(0));
            }
        }

        debug!(product_id = %product_id, delta, level = ?level, "Local stock updated");
        Ok(level)
    }

    /// Journals an offline sale and draws its lines off the cached stock,
    /// atomically. The in-memory snapshot follows the cache.
    pub async fn journal_offline_sale(
        &self,
        request: &SaleRequest,
        receipt_id: &str,
    ) -> ApiResult<OfflineSale> {
        let journaled = self
            .db
            .offline_sales()
            .record_with_drawdown(request, receipt_id)
            .await?;

        if !journaled.stock_levels.is_empty() {
            if let Some(snapshot) = self.current.write().await.as_mut() {
                for (product_id, level) in &journaled.stock_levels {
                    if let Some(item) = snapshot.items.iter_mut().find(|i| &i.product_id == product_id) {
                        item.branch_stock = *level;
                    }
                }
            }
        }

        Ok(journaled.sale)
    }

    async fn cached_snapshot(&self) -> ApiResult<InventorySnapshot> {
        let inventory = self.db.inventory();
        let items = inventory.load_branch(&self.branch_id).await?;
        let taken_at = inventory
            .last_refreshed(&self.branch_id)
            .await?
            .unwrap_or_else(Utc::now);

        if items.is_empty() {
            warn!(branch_id = %self.branch_id, "Offline with an empty inventory cache");
        }
        Ok(InventorySnapshot::new(self.branch_id.clone(), items, true, taken_at))
    }
}
