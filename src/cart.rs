use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Snapshot of the product fields a cart entry needs. Price is captured at
/// admission time and becomes the line-item price at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartProduct {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartEntry {
    pub product_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be greater than 0")]
    InvalidQuantity,
    #[error("requested quantity is not available in stock")]
    InsufficientStock,
}

/// In-memory cart for one browsing session. Never persisted; a restart or
/// a new session starts empty.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    entries: Vec<CartEntry>,
}

impl Cart {
    /// Admit `quantity` more units of `product`, merging into an existing
    /// entry. The caller supplies the live stock count; if the resulting
    /// quantity would exceed it the cart is left unchanged.
    pub fn add(
        &mut self,
        product: &CartProduct,
        quantity: i32,
        live_stock: i32,
    ) -> Result<i32, CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity);
        }
        let existing = self
            .entries
            .iter()
            .find(|e| e.product_id == product.id)
            .map(|e| e.quantity)
            .unwrap_or(0);
        let requested = existing + quantity;
        if requested > live_stock {
            return Err(CartError::InsufficientStock);
        }

        if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id == product.id) {
            entry.quantity = requested;
        } else {
            self.entries.push(CartEntry {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                quantity,
            });
        }
        Ok(requested)
    }

    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.product_id != product_id);
        self.entries.len() != before
    }

    /// Zero or negative quantity behaves as `remove`. Stock is not
    /// re-checked here; it is re-validated at checkout.
    pub fn set_quantity(&mut self, product_id: Uuid, quantity: i32) {
        if quantity <= 0 {
            self.remove(product_id);
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| e.product_id == product_id) {
            entry.quantity = quantity;
        }
    }

    pub fn total(&self) -> i64 {
        self.entries
            .iter()
            .map(|e| e.price * e.quantity as i64)
            .sum()
    }

    /// Sum of quantities, not entry count; drives the cart badge.
    pub fn item_count(&self) -> i32 {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Session-keyed cart map shared across request handlers. Lock scope is a
/// single closure call; nothing async happens while it is held.
#[derive(Clone, Default)]
pub struct CartStore {
    inner: Arc<Mutex<HashMap<Uuid, Cart>>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cart<R>(&self, session: Uuid, f: impl FnOnce(&mut Cart) -> R) -> R {
        let mut carts = self.inner.lock().expect("cart store poisoned");
        let cart = carts.entry(session).or_default();
        f(cart)
    }

    pub fn snapshot(&self, session: Uuid) -> Cart {
        let carts = self.inner.lock().expect("cart store poisoned");
        carts.get(&session).cloned().unwrap_or_default()
    }

    pub fn clear(&self, session: Uuid) {
        let mut carts = self.inner.lock().expect("cart store poisoned");
        carts.remove(&session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64) -> CartProduct {
        CartProduct {
            id: Uuid::new_v4(),
            name: "Pai Mu Tan".to_string(),
            price,
        }
    }

    #[test]
    fn add_rejects_quantities_above_live_stock() {
        let mut cart = Cart::default();
        let tea = product(2500);
        assert_eq!(
            cart.add(&tea, 3, 2),
            Err(CartError::InsufficientStock)
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn add_merges_and_caps_against_live_stock() {
        let mut cart = Cart::default();
        let tea = product(2500);
        assert_eq!(cart.add(&tea, 2, 5), Ok(2));
        assert_eq!(cart.add(&tea, 2, 5), Ok(4));
        // 4 in cart + 2 requested > 5 in stock
        assert_eq!(cart.add(&tea, 2, 5), Err(CartError::InsufficientStock));
        assert_eq!(cart.entries().len(), 1);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn add_rejects_non_positive_quantity() {
        let mut cart = Cart::default();
        let tea = product(1000);
        assert_eq!(cart.add(&tea, 0, 10), Err(CartError::InvalidQuantity));
        assert_eq!(cart.add(&tea, -1, 10), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn total_is_price_times_quantity_over_entries() {
        let mut cart = Cart::default();
        let a = product(2500);
        let b = product(1000);
        cart.add(&a, 2, 10).unwrap();
        cart.add(&b, 1, 10).unwrap();
        assert_eq!(cart.total(), 6000);
        assert_eq!(cart.item_count(), 3);

        cart.set_quantity(a.id, 1);
        assert_eq!(cart.total(), 3500);
        cart.remove(b.id);
        assert_eq!(cart.total(), 2500);
    }

    #[test]
    fn set_quantity_zero_or_negative_removes_the_entry() {
        let mut cart = Cart::default();
        let a = product(2500);
        cart.add(&a, 2, 10).unwrap();

        cart.set_quantity(a.id, 0);
        assert!(cart.is_empty());

        cart.add(&a, 2, 10).unwrap();
        cart.set_quantity(a.id, -3);
        assert!(cart.is_empty());
    }

    #[test]
    fn store_keeps_sessions_private() {
        let store = CartStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let tea = product(1500);

        store.with_cart(first, |cart| cart.add(&tea, 1, 5).unwrap());
        assert_eq!(store.snapshot(first).item_count(), 1);
        assert_eq!(store.snapshot(second).item_count(), 0);

        store.clear(first);
        assert!(store.snapshot(first).is_empty());
    }
}
