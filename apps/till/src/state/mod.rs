//! # State Module
//!
//! Separate state types instead of one big `AppState`: each command takes
//! only what it touches.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌──────────────┐  ┌───────────────┐  ┌──────────────────┐  ┌────────┐ │
//! │  │  CartState   │  │ CheckoutState │  │ InventoryProvider│  │ Till   │ │
//! │  │              │  │               │  │                  │  │ Config │ │
//! │  │  Mutex<Cart> │  │ in-flight flag│  │ backend + SQLite │  │        │ │
//! │  │  Mutex<Held> │  │ unresolved    │  │ offline flag     │  │ (read  │ │
//! │  │              │  │ attempt       │  │ last snapshot    │  │  only) │ │
//! │  └──────────────┘  └───────────────┘  └──────────────────┘  └────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;
mod config;
mod inventory;

pub use cart::{CartState, CheckoutGuard, CheckoutState};
pub use config::{
    BranchSettings, ConfigError, ConfigResult, CurrencySettings, DatabaseSettings, ReceiptSettings,
    SessionSettings, TillConfig,
};
pub use inventory::InventoryProvider;

/// Everything one till needs, owned in one place.
#[derive(Debug)]
pub struct Till {
    pub config: TillConfig,
    pub cart: CartState,
    pub checkout: CheckoutState,
    pub inventory: InventoryProvider,
}

impl Till {
    pub fn new(config: TillConfig, inventory: InventoryProvider) -> Self {
        Till {
            config,
            cart: CartState::new(),
            checkout: CheckoutState::new(),
            inventory,
        }
    }
}
