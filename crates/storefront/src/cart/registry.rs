//! Session-scoped cart ownership.
//!
//! Carts live in a `moka` cache keyed by [`CartId`] with a time-to-idle equal
//! to the session lifetime, so a cart is dropped once its session has been
//! inactive long enough to expire.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use zenith_core::CartId;

use super::Cart;

/// A cart shared between the handlers of one session.
pub type SharedCart = Arc<Mutex<Cart>>;

/// Upper bound on concurrently live carts.
const MAX_CARTS: u64 = 100_000;

/// Lock a cart for one operation.
///
/// Cart operations cannot leave a cart half-updated, so a poisoned lock is
/// recovered rather than propagated.
pub fn lock_cart(cart: &SharedCart) -> MutexGuard<'_, Cart> {
    cart.lock().unwrap_or_else(PoisonError::into_inner)
}

/// All live carts, one per session.
#[derive(Clone)]
pub struct CartRegistry {
    carts: Cache<CartId, SharedCart>,
}

impl CartRegistry {
    /// Create a registry whose carts expire after `idle` without access.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        let carts = Cache::builder()
            .max_capacity(MAX_CARTS)
            .time_to_idle(idle)
            .build();
        Self { carts }
    }

    /// The cart for `id`, if it is still live.
    pub async fn get(&self, id: CartId) -> Option<SharedCart> {
        self.carts.get(&id).await
    }

    /// The cart for `id`, or a fresh empty cart under a new id when `id` is
    /// `None` or has expired.
    pub async fn get_or_create(&self, id: Option<CartId>) -> (CartId, SharedCart) {
        if let Some(id) = id {
            if let Some(cart) = self.carts.get(&id).await {
                return (id, cart);
            }
        }

        let id = CartId::generate();
        let cart = Arc::new(Mutex::new(Cart::new()));
        self.carts.insert(id, Arc::clone(&cart)).await;
        tracing::debug!(cart_id = %id, "Cart created");
        (id, cart)
    }
}
