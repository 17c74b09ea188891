//! # Held-Transaction Store
//!
//! Parks an in-progress cart (customer stepped away, fetching a
//! prescription, ...) and brings it back later without losing lines.
//!
//! ```text
//! hold(cart, "Mama Asha") ──► held list += 1, cart emptied
//! resume(id)              ──► held list -= 1, lines returned to the cart
//! delete(id)              ──► held list -= 1, lines discarded
//! ```
//!
//! Holding never touches inventory or the backend. A held cart can go
//! stale: stock and prices are checked again when the resumed cart is
//! checked out, not when it is held.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult};
use crate::types::HeldTransaction;
use crate::validation::validate_customer_name;

/// Append/remove-only list of held transactions.
#[derive(Debug, Clone, Default)]
pub struct HeldTransactions {
    held: Vec<HeldTransaction>,
}

impl HeldTransactions {
    pub fn new() -> Self {
        HeldTransactions::default()
    }

    /// Moves the cart's lines into a new held transaction and clears the cart.
    pub fn hold(
        &mut self,
        cart: &mut Cart,
        customer_name: &str,
        held_at: DateTime<Utc>,
    ) -> CoreResult<HeldTransaction> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }
        validate_customer_name(customer_name)?;

        let held = HeldTransaction {
            id: Uuid::new_v4().to_string(),
            items: cart.lines().to_vec(),
            customer_name: customer_name.trim().to_string(),
            total: cart.total(),
            held_at,
        };

        self.held.push(held.clone());
        cart.clear();
        Ok(held)
    }

    /// Removes a held transaction and returns it so its lines can be put
    /// back into the cart.
    pub fn resume(&mut self, id: &str) -> CoreResult<HeldTransaction> {
        let index = self.position(id)?;
        Ok(self.held.remove(index))
    }

    /// Resumes straight into `cart`, replacing whatever it held.
    pub fn resume_into(&mut self, id: &str, cart: &mut Cart) -> CoreResult<HeldTransaction> {
        let held = self.resume(id)?;
        cart.restore(held.items.clone());
        Ok(held)
    }

    /// Discards a held transaction without resuming it.
    pub fn delete(&mut self, id: &str) -> CoreResult<()> {
        let index = self.position(id)?;
        self.held.remove(index);
        Ok(())
    }

    /// Held transactions, newest first.
    pub fn list(&self) -> Vec<&HeldTransaction> {
        self.held.iter().rev().collect()
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    fn position(&self, id: &str) -> CoreResult<usize> {
        self.held
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| CoreError::HeldTransactionNotFound(id.to_string()))
    }
}
