//! # Offline Sale Sync
//!
//! Replays the offline journal once the backend is reachable again.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pending entries, oldest first                                          │
//! │     │                                                                   │
//! │     ├── accepted ───────► mark_synced (backend receipt id kept)         │
//! │     ├── rejected ───────► mark_rejected (left for manual review)        │
//! │     └── network error ──► mark_failed, stop the pass, stay offline      │
//! │                                                                         │
//! │  pass completed ──► refresh the inventory snapshot                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tracing::{debug, info, warn};

use rxdesk_db::OfflineSale;

use crate::error::ApiResult;
use crate::state::InventoryProvider;

const REPLAY_BATCH: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub synced: usize,
    pub rejected: usize,
    /// Entries still waiting after this pass.
    pub remaining: i64,
    /// The pass stopped on a network error.
    pub interrupted: bool,
    /// The inventory snapshot was refreshed after the pass.
    pub refreshed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub offline: bool,
    pub pending: i64,
    pub rejected: usize,
}

pub async fn sync_offline_sales(inventory: &InventoryProvider) -> ApiResult<SyncReport> {
    let journal = inventory.database().offline_sales();
    let mut report = SyncReport::default();

    'replay: loop {
        let batch = journal.pending(REPLAY_BATCH).await?;
        if batch.is_empty() {
            break;
        }
        debug!(count = batch.len(), "Replaying offline sales");

        for entry in batch {
            match inventory.backend().commit_sale(&entry.request).await {
                Ok(receipt) => {
                    journal.mark_synced(&entry.id, &receipt.receipt_id).await?;
                    report.synced += 1;
                }
                Err(e) if e.is_transient() => {
                    journal.mark_failed(&entry.id, &e.to_string()).await?;
                    inventory.set_offline(true);
                    report.interrupted = true;
                    break 'replay;
                }
                Err(e) => {
                    debug!(
                        receipt_id = %entry.receipt_id,
                        client_reference = %entry.client_reference,
                        "Offline sale rejected on replay"
                    );
                    journal.mark_rejected(&entry.id, &e.to_string()).await?;
                    report.rejected += 1;
                }
            }
        }
    }

    if !report.interrupted {
        inventory.set_offline(false);
        // A failed refresh leaves the sync itself complete.
        match inventory.refresh().await {
            Ok(snapshot) => report.refreshed = !snapshot.offline,
            Err(e) => warn!(error = %e, "Inventory refresh after sync failed"),
        }
    }

    report.remaining = journal.count_pending().await?;

    info!(
        synced = report.synced,
        rejected = report.rejected,
        remaining = report.remaining,
        interrupted = report.interrupted,
        "Offline sync pass finished"
    );
    Ok(report)
}

pub async fn sync_status(inventory: &InventoryProvider) -> ApiResult<SyncStatus> {
    let journal = inventory.database().offline_sales();
    Ok(SyncStatus {
        offline: inventory.is_offline(),
        pending: journal.count_pending().await?,
        rejected: journal.rejected(u32::MAX).await?.len(),
    })
}

/// Journaled sales the backend refused, oldest first.
pub async fn list_rejected_sales(inventory: &InventoryProvider, limit: u32) -> ApiResult<Vec<OfflineSale>> {
    Ok(inventory.database().offline_sales().rejected(limit).await?)
}
