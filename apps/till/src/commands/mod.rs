//! # Till Commands
//!
//! Every action the cashier can take, as plain async functions over the
//! state they need. The shell calls them; so do the integration tests.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (exports)
//! ├── product.rs   ◄─── Product search, inventory refresh
//! ├── cart.rs      ◄─── Cart manipulation
//! ├── held.rs      ◄─── Hold / resume / delete parked carts
//! ├── checkout.rs  ◄─── Gated sale commit (online or offline)
//! ├── invoice.rs   ◄─── Unpaid invoice slips
//! └── sync.rs      ◄─── Offline journal replay and status
//! ```
//!
//! ## State Injection
//! Each command declares only the state it needs:
//! ```rust,ignore
//! // Only needs the cart
//! async fn get_cart(cart: &CartState)
//!
//! // Needs the cart and a snapshot to look products up in
//! async fn add_to_cart(cart: &CartState, inventory: &InventoryProvider, ...)
//!
//! // Needs everything
//! async fn checkout(cart, checkout, inventory, config, request)
//! ```

pub mod cart;
pub mod checkout;
pub mod held;
pub mod invoice;
pub mod product;
pub mod sync;
