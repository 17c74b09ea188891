//! # rxdesk-db: Local Storage for the RxDesk Till
//!
//! The till keeps two things on disk: the last inventory it saw for its
//! branch, and the sales it had to commit without the backend.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  InventoryProvider (till)          sync_offline_sales (till)            │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     rxdesk-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   Database (pool.rs)  ──►  InventoryCacheRepository             │   │
//! │  │                       ──►  OfflineSaleRepository                │   │
//! │  │   migrations/001_offline_store.sql                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  till.db (SQLite, WAL)                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rxdesk_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//! let cached = db.inventory().load_branch("branch-1").await?;
//! let backlog = db.offline_sales().count_pending().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::inventory::InventoryCacheRepository;
pub use repository::offline_sales::{
    JournaledSale, OfflineSale, OfflineSaleRepository, OfflineSaleStatus,
};
