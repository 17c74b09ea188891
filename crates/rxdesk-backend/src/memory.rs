//! In-memory backend for tests and local demos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use rxdesk_core::{
    InventorySnapshotItem, Money, PendingTransaction, PendingTransactionRequest, SaleReceipt,
    SaleRequest,
};

use crate::client::PharmacyBackend;
use crate::error::{BackendError, BackendResult};

#[derive(Debug, Default)]
struct InMemoryState {
    inventory: HashMap<String, Vec<InventorySnapshotItem>>,
    sales: Vec<(SaleRequest, SaleReceipt)>,
    receipts_by_reference: HashMap<String, String>,
    pending: Vec<(PendingTransactionRequest, PendingTransaction)>,
    rejections: HashMap<String, String>,
    reject_next: Option<String>,
    offline: bool,
    lose_next_response: bool,
    commit_calls: usize,
    next_receipt: u32,
}

/// Backend that keeps everything in memory and behaves like the real one:
/// stock is checked and decremented on commit, and a repeated client
/// reference returns the original receipt.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_inventory(&self, branch_id: &str, items: Vec<InventorySnapshotItem>) {
        self.state
            .write()
            .await
            .inventory
            .insert(branch_id.to_string(), items);
    }

    /// Changes one product's price, as a manager would from the back office.
    pub async fn set_selling_price(&self, branch_id: &str, product_id: &str, price: Money) {
        let mut state = self.state.write().await;
        if let Some(item) = state
            .inventory
            .get_mut(branch_id)
            .and_then(|items| items.iter_mut().find(|i| i.product_id == product_id))
        {
            item.selling_price = Some(price);
        }
    }

    /// Every call fails with a network error while set.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    /// The next commit is applied but its answer is lost in transit.
    pub async fn lose_next_response(&self) {
        self.state.write().await.lose_next_response = true;
    }

    /// Commits carrying this client reference are refused with `message`.
    pub async fn reject_reference(&self, client_reference: &str, message: &str) {
        self.state
            .write()
            .await
            .rejections
            .insert(client_reference.to_string(), message.to_string());
    }

    /// The next new commit is refused with `message`, whatever its reference.
    pub async fn reject_next_commit(&self, message: &str) {
        self.state.write().await.reject_next = Some(message.to_string());
    }

    pub async fn stock_of(&self, branch_id: &str, product_id: &str) -> Option<i64> {
        self.state
            .read()
            .await
            .inventory
            .get(branch_id)
            .and_then(|items| items.iter().find(|i| i.product_id == product_id))
            .map(|i| i.branch_stock)
    }

    /// Accepted sales, in commit order.
    pub async fn sales(&self) -> Vec<SaleRequest> {
        self.state
            .read()
            .await
            .sales
            .iter()
            .map(|(request, _)| request.clone())
            .collect()
    }

    /// Number of commit attempts that reached the backend.
    pub async fn commit_calls(&self) -> usize {
        self.state.read().await.commit_calls
    }

    pub async fn pending_transactions(&self) -> Vec<PendingTransaction> {
        self.state
            .read()
            .await
            .pending
            .iter()
            .map(|(_, pending)| pending.clone())
            .collect()
    }
}

fn unreachable() -> BackendError {
    BackendError::Network("connection refused".to_string())
}

#[async_trait]
impl PharmacyBackend for InMemoryBackend {
    async fn fetch_branch_inventory(
        &self,
        branch_id: &str,
    ) -> BackendResult<Vec<InventorySnapshotItem>> {
        let state = self.state.read().await;
        if state.offline {
            return Err(unreachable());
        }
        Ok(state.inventory.get(branch_id).cloned().unwrap_or_default())
    }

    async fn commit_sale(&self, request: &SaleRequest) -> BackendResult<SaleReceipt> {
        let mut state = self.state.write().await;
        if state.offline {
            return Err(unreachable());
        }
        state.commit_calls += 1;

        if let Some(receipt_id) = state.receipts_by_reference.get(&request.client_reference) {
            return Ok(SaleReceipt {
                receipt_id: receipt_id.clone(),
            });
        }

        if let Some(message) = state.rejections.get(&request.client_reference) {
            return Err(BackendError::rejected(400, message.clone()));
        }
        if let Some(message) = state.reject_next.take() {
            return Err(BackendError::rejected(422, message));
        }

        let items = state.inventory.entry(request.branch_id.clone()).or_default();

        if !request.force_offline {
            for line in &request.items {
                let available = items
                    .iter()
                    .find(|i| i.product_id == line.product_id)
                    .map(|i| (i.name.as_str(), i.branch_stock));
                match available {
                    Some((_, stock)) if stock >= line.qty => {}
                    Some((name, _)) => {
                        return Err(BackendError::rejected(
                            409,
                            format!("Insufficient stock for {}", name),
                        ))
                    }
                    None => {
                        return Err(BackendError::rejected(
                            409,
                            format!("Product {} is not stocked at this branch", line.product_id),
                        ))
                    }
                }
            }
        }

        for line in &request.items {
            if let Some(item) = items.iter_mut().find(|i| i.product_id == line.product_id) {
                item.branch_stock = (item.branch_stock - line.qty).max(0);
            }
        }

        state.next_receipt += 1;
        let receipt = SaleReceipt {
            receipt_id: format!("RCPT-{:04}", state.next_receipt),
        };
        state
            .receipts_by_reference
            .insert(request.client_reference.clone(), receipt.receipt_id.clone());
        state.sales.push((request.clone(), receipt.clone()));

        if state.lose_next_response {
            state.lose_next_response = false;
            return Err(BackendError::Network("connection reset".to_string()));
        }

        Ok(receipt)
    }

    async fn create_pending_transaction(
        &self,
        request: &PendingTransactionRequest,
    ) -> BackendResult<PendingTransaction> {
        let mut state = self.state.write().await;
        if state.offline {
            return Err(unreachable());
        }

        let short_code = format!("INV-{:04}", state.pending.len() + 1);
        let pending = PendingTransaction {
            barcode: format!("PT{}", short_code.replace('-', "")),
            short_code,
        };
        state.pending.push((request.clone(), pending.clone()));
        Ok(pending)
    }
}
