//! # rxdesk-backend: Hosted Backend Boundary
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Till (InventoryProvider, checkout, invoice, offline sync)              │
//! │       │  Arc<dyn PharmacyBackend>                                       │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  rxdesk-backend (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   client.rs   PharmacyBackend trait, SupabaseClient (reqwest)   │   │
//! │  │   wire.rs     untyped JSON ⇄ rxdesk-core types                 │   │
//! │  │   memory.rs   InMemoryBackend                                   │   │
//! │  │   config.rs   [backend] section                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │  HTTPS                                                          │
//! │       ▼                                                                 │
//! │  Postgres + RPC functions                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod wire;

pub use client::{PharmacyBackend, SupabaseClient};
pub use config::BackendConfig;
pub use error::{BackendError, BackendResult};
pub use memory::InMemoryBackend;
