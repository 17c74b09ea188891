//! # Backend Client
//!
//! [`PharmacyBackend`] is the seam between the till and the hosted
//! backend. [`SupabaseClient`] speaks to the real thing over HTTPS;
//! [`crate::memory::InMemoryBackend`] stands in for it in tests.
//!
//! ```text
//! ┌──────────────┐   POST rest/v1/rpc/get_branch_inventory         ┌──────────┐
//! │              │ ──────────────────────────────────────────────► │          │
//! │ SupabaseClient│   POST rest/v1/rpc/commit_sale                  │ Backend  │
//! │              │ ──────────────────────────────────────────────► │ (RPC)    │
//! │              │   POST rest/v1/rpc/create_pending_transaction   │          │
//! └──────────────┘ ──────────────────────────────────────────────► └──────────┘
//!        headers: apikey, Authorization: Bearer <token or apikey>
//! ```

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use rxdesk_core::{
    InventorySnapshotItem, PendingTransaction, PendingTransactionRequest, SaleReceipt, SaleRequest,
};

use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::wire;

const RPC_INVENTORY: &str = "get_branch_inventory";
const RPC_COMMIT_SALE: &str = "commit_sale";
const RPC_PENDING: &str = "create_pending_transaction";

/// Operations the till needs from the hosted backend.
#[async_trait]
pub trait PharmacyBackend: Send + Sync {
    /// Every product row for the branch, including zero-stock rows.
    async fn fetch_branch_inventory(&self, branch_id: &str)
        -> BackendResult<Vec<InventorySnapshotItem>>;

    /// Commits a sale. The backend decrements stock atomically and drops a
    /// repeated `client_reference`, answering with the original receipt.
    async fn commit_sale(&self, request: &SaleRequest) -> BackendResult<SaleReceipt>;

    /// Registers an unpaid invoice to be settled later.
    async fn create_pending_transaction(
        &self,
        request: &PendingTransactionRequest,
    ) -> BackendResult<PendingTransaction>;
}

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    api_key: String,
    access_token: Option<String>,
    read_timeout: Duration,
    decimals: u8,
}

impl fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url)
            .field("signed_in", &self.access_token.is_some())
            .finish_non_exhaustive()
    }
}

impl SupabaseClient {
    /// `decimals` is the currency's minor-unit count, used on both
    /// directions of the money conversion.
    pub fn new(config: &BackendConfig, decimals: u8) -> BackendResult<Self> {
        config.validate()?;

        let http = Client::builder()
            .user_agent(concat!("rxdesk-till/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(SupabaseClient {
            http,
            base_url: config.base_url()?,
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            read_timeout: config.read_timeout(),
            decimals,
        })
    }

    fn rpc(&self, name: &str) -> BackendResult<RequestBuilder> {
        let endpoint = self.base_url.join(&format!("rest/v1/rpc/{}", name))?;
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);

        Ok(self
            .http
            .post(endpoint)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json"))
    }

    async fn call(&self, name: &str, request: RequestBuilder, body: &Value) -> BackendResult<Value> {
        debug!(rpc = name, "Backend request");

        let response = request.json(body).send().await.map_err(|e| {
            warn!(rpc = name, error = %e, "Backend unreachable");
            BackendError::from(e)
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(rpc = name, status = status.as_u16(), body = %text, "Backend refused request");
            return Err(BackendError::rejected(
                status.as_u16(),
                wire::rejection_message(status.as_u16(), &text),
            ));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl PharmacyBackend for SupabaseClient {
    async fn fetch_branch_inventory(
        &self,
        branch_id: &str,
    ) -> BackendResult<Vec<InventorySnapshotItem>> {
        let request = self.rpc(RPC_INVENTORY)?.timeout(self.read_timeout);
        let payload = self
            .call(RPC_INVENTORY, request, &wire::inventory_body(branch_id))
            .await?;

        let items = wire::parse_inventory(&payload, self.decimals)?;
        debug!(branch_id = %branch_id, count = items.len(), "Fetched branch inventory");
        Ok(items)
    }

    async fn commit_sale(&self, request: &SaleRequest) -> BackendResult<SaleReceipt> {
        // No overall timeout: an abandoned commit leaves the outcome unknown.
        let builder = self.rpc(RPC_COMMIT_SALE)?;
        let body = wire::sale_request_body(request, self.decimals)?;
        let payload = self.call(RPC_COMMIT_SALE, builder, &body).await?;

        let receipt = wire::parse_sale_receipt(&payload)?;
        info!(
            receipt_id = %receipt.receipt_id,
            client_reference = %request.client_reference,
            force_offline = request.force_offline,
            "Sale committed"
        );
        Ok(receipt)
    }

    async fn create_pending_transaction(
        &self,
        request: &PendingTransactionRequest,
    ) -> BackendResult<PendingTransaction> {
        let builder = self.rpc(RPC_PENDING)?.timeout(self.read_timeout);
        let body = wire::pending_request_body(request, self.decimals);
        let payload = self.call(RPC_PENDING, builder, &body).await?;

        let pending = wire::parse_pending_transaction(&payload)?;
        info!(short_code = %pending.short_code, "Pending transaction created");
        Ok(pending)
    }
}
