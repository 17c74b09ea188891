//! # Repository Module
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Till command                                                           │
//! │       │  db.inventory().load_branch("branch-1")                         │
//! │       ▼                                                                 │
//! │  Repository  ── SQL lives here and nowhere else                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`inventory::InventoryCacheRepository`] - Branch inventory cache
//! - [`offline_sales::OfflineSaleRepository`] - Offline sale journal

pub mod inventory;
pub mod offline_sales;
