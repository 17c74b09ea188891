//! # Product Lookup Commands

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use rxdesk_core::{InventorySnapshotItem, Money};

use crate::error::ApiResult;
use crate::state::InventoryProvider;

const DEFAULT_SEARCH_LIMIT: usize = 50;

/// One row of the product picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub product_id: String,
    pub name: String,
    pub barcode: Option<String>,
    pub price: Money,
    pub stock: i64,
    pub low_stock: bool,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: Option<String>,
}

impl From<&InventorySnapshotItem> for ProductListing {
    fn from(item: &InventorySnapshotItem) -> Self {
        ProductListing {
            product_id: item.product_id.clone(),
            name: item.name.clone(),
            barcode: item.barcode.clone(),
            price: item.effective_price(),
            stock: item.branch_stock,
            low_stock: item.is_low_stock(),
            expiry_date: item.expiry_date,
            batch_number: item.batch_number.clone(),
        }
    }
}

/// In-stock products matching `query`. An empty query lists everything.
pub async fn search_products(
    inventory: &InventoryProvider,
    query: &str,
    limit: Option<usize>,
) -> ApiResult<Vec<ProductListing>> {
    debug!(query = %query, "search_products command");

    let items = inventory
        .search(query, limit.unwrap_or(DEFAULT_SEARCH_LIMIT))
        .await?;
    Ok(items.iter().map(ProductListing::from).collect())
}

/// Re-reads branch inventory from the backend (or the cache when offline).
pub async fn refresh_inventory(inventory: &InventoryProvider) -> ApiResult<usize> {
    let snapshot = inventory.refresh().await?;
    Ok(snapshot.sellable().count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rxdesk_backend::InMemoryBackend;
    use rxdesk_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_listing_flags_low_stock_and_uses_selling_price() {
        let backend = InMemoryBackend::new();
        backend
            .set_inventory(
                "b1",
                vec![InventorySnapshotItem {
                    product_id: "p1".to_string(),
                    name: "Cetirizine 10mg".to_string(),
                    branch_stock: 4,
                    selling_price: Some(Money::from_minor(800)),
                    unit_price: Money::from_minor(650),
                    expiry_date: None,
                    reorder_level: 5,
                    batch_number: Some("B-77".to_string()),
                    barcode: None,
                }],
            )
            .await;
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let inventory = InventoryProvider::new("b1", Arc::new(backend), db);

        let listings = search_products(&inventory, "ceti", None).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].price, Money::from_minor(800));
        assert!(listings[0].low_stock);
    }
}
