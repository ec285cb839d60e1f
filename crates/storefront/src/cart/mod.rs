//! Per-session shopping cart.
//!
//! The cart is the only mutable core state. It holds at most one entry per
//! product, every entry has a quantity of at least one, and totals are derived
//! on every read. Each state change is broadcast as a [`CartEvent`] so
//! whatever renders the cart can refresh.

mod registry;

pub use registry::{CartRegistry, SharedCart, lock_cart};

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;
use zenith_core::{Price, Product, ProductId};

/// Events buffered per subscriber before slow receivers start lagging.
const EVENT_CAPACITY: usize = 32;

/// A product in the cart with its quantity.
#[derive(Debug, Clone)]
pub struct CartItem {
    product: Arc<Product>,
    quantity: u32,
}

impl CartItem {
    /// The catalog product this entry refers to.
    #[must_use]
    pub fn product(&self) -> &Arc<Product> {
        &self.product
    }

    /// Always at least one.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// `price * quantity`, unrounded. Saturates at `Decimal::MAX`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product
            .price
            .checked_mul(Decimal::from(self.quantity))
            .unwrap_or(Decimal::MAX)
    }
}

/// What changed in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartChange {
    /// A product was added, either as a new entry or onto an existing one.
    ItemAdded {
        product_id: ProductId,
        /// Quantity of the entry after the add.
        quantity: u32,
    },
    QuantityUpdated {
        product_id: ProductId,
        quantity: u32,
    },
    ItemRemoved {
        product_id: ProductId,
    },
    Cleared,
}

/// Emitted after every state change, carrying the new totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartEvent {
    #[serde(flatten)]
    pub change: CartChange,
    pub total_items: u64,
    pub total_price: Decimal,
}

/// A single shopper's cart.
#[derive(Debug)]
pub struct Cart {
    items: Vec<CartItem>,
    events: broadcast::Sender<CartEvent>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            items: Vec::new(),
            events,
        }
    }

    /// Add `quantity` of `product`, accumulating onto an existing entry.
    ///
    /// The store does not cap quantities at the product's stock. Adding zero
    /// is a no-op. Returns whether the cart changed.
    pub fn add_to_cart(&mut self, product: Arc<Product>, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }

        let product_id = product.id.clone();
        let new_quantity = if let Some(item) = self.entry_mut(product_id.as_str()) {
            item.quantity = item.quantity.saturating_add(quantity);
            item.quantity
        } else {
            self.items.push(CartItem { product, quantity });
            quantity
        };

        self.emit(CartChange::ItemAdded {
            product_id,
            quantity: new_quantity,
        });
        true
    }

    /// Remove the entry for `product_id`. No-op if absent.
    pub fn remove_from_cart(&mut self, product_id: &str) -> bool {
        let Some(index) = self.position(product_id) else {
            return false;
        };

        let item = self.items.remove(index);
        self.emit(CartChange::ItemRemoved {
            product_id: item.product.id.clone(),
        });
        true
    }

    /// Set the quantity for `product_id` to an absolute value.
    ///
    /// Zero or below removes the entry. No-op if the product is not in the cart.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> bool {
        if quantity <= 0 {
            return self.remove_from_cart(product_id);
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        let Some(item) = self.entry_mut(product_id) else {
            return false;
        };
        if item.quantity == quantity {
            return false;
        }

        item.quantity = quantity;
        let product_id = item.product.id.clone();
        self.emit(CartChange::QuantityUpdated {
            product_id,
            quantity,
        });
        true
    }

    /// Remove every entry. Always emits [`CartChange::Cleared`].
    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.emit(CartChange::Cleared);
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// The entry for `product_id`, if present.
    #[must_use]
    pub fn get(&self, product_id: &str) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.product.id.as_str() == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities over all entries.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of `price * quantity` over all entries, unrounded. Saturates at
    /// `Decimal::MAX`.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items
            .iter()
            .map(CartItem::line_total)
            .try_fold(Decimal::ZERO, Decimal::checked_add)
            .unwrap_or(Decimal::MAX)
    }

    /// The total formatted for display.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        Price::usd(self.total_price())
    }

    /// Ids of the products in the cart, in insertion order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items
            .iter()
            .map(|item| item.product.id.clone())
            .collect()
    }

    /// Receive an event after each change to this cart.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.events.subscribe()
    }

    fn position(&self, product_id: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.product.id.as_str() == product_id)
    }

    fn entry_mut(&mut self, product_id: &str) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product.id.as_str() == product_id)
    }

    fn emit(&self, change: CartChange) {
        let event = CartEvent {
            change,
            total_items: self.total_items(),
            total_price: self.total_price(),
        };
        tracing::debug!(?event, "Cart changed");
        // No subscribers is the common case outside an open event stream.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::catalog::tests::product;

    fn p(id: &str, price_cents: i64) -> Arc<Product> {
        Arc::new(product(id, "A", &[], price_cents))
    }

    #[test]
    fn test_add_accumulates_into_one_entry() {
        let p1 = p("p1", 1000);
        let mut cart = Cart::new();
        assert!(cart.add_to_cart(Arc::clone(&p1), 2));
        assert!(cart.add_to_cart(Arc::clone(&p1), 1));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.get("p1").unwrap().quantity(), 3);
        assert_eq!(cart.total_items(), 3);
        assert_eq!(cart.total_price(), Decimal::new(3000, 2));
        assert_eq!(cart.subtotal().display(), "$30.00");
    }

    #[test]
    fn test_add_zero_is_noop() {
        let mut cart = Cart::new();
        assert!(!cart.add_to_cart(p("p1", 100), 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_does_not_enforce_stock() {
        let mut cart = Cart::new();
        cart.add_to_cart(p("p1", 100), 50);
        assert_eq!(cart.get("p1").unwrap().quantity(), 50);
    }

    #[test]
    fn test_cart_shares_catalog_record() {
        let p1 = p("p1", 100);
        let mut cart = Cart::new();
        cart.add_to_cart(Arc::clone(&p1), 1);
        assert!(Arc::ptr_eq(cart.get("p1").unwrap().product(), &p1));
    }

    #[test]
    fn test_update_to_zero_or_negative_removes() {
        for quantity in [0, -5] {
            let mut cart = Cart::new();
            cart.add_to_cart(p("p1", 1000), 3);
            assert!(cart.update_quantity("p1", quantity));
            assert!(cart.is_empty());
            assert_eq!(cart.total_items(), 0);
        }
    }

    #[test]
    fn test_update_sets_absolute_quantity() {
        let mut cart = Cart::new();
        cart.add_to_cart(p("p1", 250), 3);
        assert!(cart.update_quantity("p1", 7));
        assert_eq!(cart.get("p1").unwrap().quantity(), 7);
        assert_eq!(cart.total_price(), Decimal::new(1750, 2));
    }

    #[test]
    fn test_update_unknown_product_is_noop() {
        let mut cart = Cart::new();
        cart.add_to_cart(p("p1", 100), 1);
        assert!(!cart.update_quantity("p2", 4));
        assert!(cart.get("p2").is_none());
    }

    #[test]
    fn test_remove_absent_leaves_cart_unchanged() {
        let mut cart = Cart::new();
        cart.add_to_cart(p("p1", 100), 2);
        let before = cart.product_ids();
        assert!(!cart.remove_from_cart("p9"));
        assert_eq!(cart.product_ids(), before);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_clear_empties_cart() {
        let mut cart = Cart::new();
        cart.add_to_cart(p("p1", 100), 2);
        cart.add_to_cart(p("p2", 200), 1);
        cart.clear_cart();
        assert!(cart.is_empty());
        assert_eq!(cart.total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_total_price_is_not_rounded() {
        let mut cart = Cart::new();
        cart.add_to_cart(p("p1", 3333), 1);
        let mut third = product("p2", "A", &[], 0);
        third.price = Decimal::new(1, 3);
        cart.add_to_cart(Arc::new(third), 1);
        assert_eq!(cart.total_price(), Decimal::new(33331, 3));
        assert_eq!(cart.subtotal().display(), "$33.33");
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let mut huge = product("p1", "A", &[], 0);
        huge.price = Decimal::from_i128_with_scale(10_i128.pow(25), 0);
        let mut cart = Cart::new();
        let mut events = cart.subscribe();

        cart.add_to_cart(Arc::new(huge), 1);
        assert!(cart.update_quantity("p1", 1_000_000));
        cart.add_to_cart(p("p2", 100), 1);

        assert_eq!(cart.get("p1").unwrap().line_total(), Decimal::MAX);
        assert_eq!(cart.total_price(), Decimal::MAX);
        assert_eq!(cart.total_items(), 1_000_001);
        assert!(events.try_recv().is_ok());

        assert!(cart.update_quantity("p1", 1));
        assert_eq!(
            cart.total_price(),
            Decimal::from_i128_with_scale(10_i128.pow(25), 0) + Decimal::ONE
        );
    }

    #[tokio::test]
    async fn test_subscribers_receive_changes_with_totals() {
        let mut cart = Cart::new();
        let mut events = cart.subscribe();

        cart.add_to_cart(p("p1", 1000), 2);
        cart.remove_from_cart("missing");
        cart.update_quantity("p1", 5);
        cart.clear_cart();

        let added = events.recv().await.unwrap();
        assert_eq!(
            added.change,
            CartChange::ItemAdded {
                product_id: ProductId::new("p1"),
                quantity: 2
            }
        );
        assert_eq!(added.total_items, 2);

        let updated = events.recv().await.unwrap();
        assert_eq!(updated.total_price, Decimal::new(5000, 2));

        let cleared = events.recv().await.unwrap();
        assert_eq!(cleared.change, CartChange::Cleared);
        assert_eq!(cleared.total_items, 0);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_event_serializes_flat() {
        let event = CartEvent {
            change: CartChange::ItemRemoved {
                product_id: ProductId::new("p1"),
            },
            total_items: 0,
            total_price: Decimal::ZERO,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_removed");
        assert_eq!(json["product_id"], "p1");
        assert_eq!(json["total_items"], 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(usize, u32),
        Remove(usize),
        Update(usize, i64),
        Clear,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0_usize..4, 0_u32..6).prop_map(|(i, q)| Op::Add(i, q)),
            2 => (0_usize..4).prop_map(Op::Remove),
            3 => (0_usize..4, -3_i64..8).prop_map(|(i, q)| Op::Update(i, q)),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn proptest_invariants_hold_after_every_step(ops in proptest::collection::vec(arb_op(), 0..40)) {
            let products = [p("p0", 199), p("p1", 1000), p("p2", 5), p("p3", 0)];
            let mut cart = Cart::new();

            for op in ops {
                match op {
                    Op::Add(i, q) => { cart.add_to_cart(Arc::clone(&products[i]), q); }
                    Op::Remove(i) => { cart.remove_from_cart(products[i].id.as_str()); }
                    Op::Update(i, q) => { cart.update_quantity(products[i].id.as_str(), q); }
                    Op::Clear => cart.clear_cart(),
                }

                let expected: Decimal = cart
                    .items()
                    .iter()
                    .map(|item| item.product().price * Decimal::from(item.quantity()))
                    .sum();
                prop_assert_eq!(cart.total_price(), expected);

                let ids = cart.product_ids();
                let mut unique = ids.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), ids.len());
                prop_assert!(cart.items().iter().all(|item| item.quantity() >= 1));
            }
        }

        #[test]
        fn proptest_repeated_adds_sum(quantities in proptest::collection::vec(1_u32..10, 1..20)) {
            let p1 = p("p1", 1000);
            let mut cart = Cart::new();
            for q in &quantities {
                cart.add_to_cart(Arc::clone(&p1), *q);
            }
            prop_assert_eq!(cart.items().len(), 1);
            prop_assert_eq!(cart.get("p1").map(CartItem::quantity), Some(quantities.iter().sum::<u32>()));
        }
    }
}
