//! Cart route handlers.
//!
//! The session stores only the cart id; the cart lives in the registry.
//! Mutations that change the cart answer with an `HX-Trigger: cart-updated`
//! header so every cart widget on the page refreshes, and the change is also
//! pushed to `/cart/events` subscribers.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Json,
    extract::{Query, State},
    response::{
        AppendHeaders, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tower_sessions::Session;
use tracing::instrument;
use zenith_core::{CartId, Price, ProductId};

use crate::cart::{Cart, CartItem, SharedCart, lock_cart};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::session::keys;
use crate::recommendations::CART_RECOMMENDATION_COUNT;
use crate::routes::products::{CountQuery, ProductList, product_views, to_json};
use crate::state::AppState;

/// HTMX response header naming client-side events to fire.
pub const HX_TRIGGER: &str = "HX-Trigger";
/// Event fired when the cart changed.
pub const CART_UPDATED_EVENT: &str = "cart-updated";

/// Cart line display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub image: String,
    pub unit_price: Decimal,
    pub display_price: String,
    pub quantity: u32,
    pub stock: u32,
    pub line_total: Decimal,
    pub display_line_total: String,
}

impl From<&CartItem> for CartItemView {
    fn from(item: &CartItem) -> Self {
        let product = item.product();
        let line_total = item.line_total();
        Self {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image: product.image.clone(),
            unit_price: product.price,
            display_price: product.unit_price().display(),
            quantity: item.quantity(),
            stock: product.stock,
            line_total,
            display_line_total: Price::usd(line_total).display(),
        }
    }
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub total_items: u64,
    pub total_price: Decimal,
    pub display_total: String,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from(&Cart::new())
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().iter().map(CartItemView::from).collect(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
            display_total: cart.subtotal().display(),
        }
    }
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Get the cart ID from the session.
async fn get_cart_id(session: &Session) -> Option<CartId> {
    session.get::<CartId>(keys::CART_ID).await.ok().flatten()
}

/// The session's cart, if it has one that is still live.
pub(crate) async fn existing_cart(state: &AppState, session: &Session) -> Option<SharedCart> {
    let cart_id = get_cart_id(session).await?;
    state.carts().get(cart_id).await
}

/// The session's cart, created on first use.
async fn session_cart(state: &AppState, session: &Session) -> Result<SharedCart> {
    let stored = get_cart_id(session).await;
    let (cart_id, cart) = state.carts().get_or_create(stored).await;

    if stored != Some(cart_id) {
        session
            .insert(keys::CART_ID, cart_id)
            .await
            .map_err(|e| AppError::Internal(format!("failed to save cart id to session: {e}")))?;
    }
    Ok(cart)
}

/// Snapshot a shared cart.
fn view_of(cart: &SharedCart) -> CartView {
    CartView::from(&*lock_cart(cart))
}

/// Cart JSON, with the HTMX trigger when the cart changed.
fn cart_response(view: CartView, changed: bool) -> Response {
    if changed {
        (
            AppendHeaders([(HX_TRIGGER, CART_UPDATED_EVENT)]),
            Json(view),
        )
            .into_response()
    } else {
        Json(view).into_response()
    }
}

// =============================================================================
// Request Bodies
// =============================================================================

/// Add to cart request. The quantity is clamped to `1..=stock`.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<i64>,
}

/// Update quantity request. Zero or negative removes the item.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Remove from cart request.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Cart count badge.
#[derive(Debug, Serialize)]
pub struct CartCount {
    pub count: u64,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display cart contents and totals.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Json<CartView> {
    let view = match existing_cart(&state, &session).await {
        Some(cart) => view_of(&cart),
        None => CartView::empty(),
    };
    Json(view)
}

/// Add item to cart.
///
/// The requested quantity defaults to one and is clamped to the product's
/// stock. Creates the session's cart on first use.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<AddToCartForm>,
) -> Result<Response> {
    let product = state
        .catalog()
        .get_product_by_id(form.product_id.as_str())
        .ok_or_else(|| AppError::NotFound(format!("product {}", form.product_id)))?;

    if !product.in_stock() {
        return Err(AppError::BadRequest(format!(
            "{} is out of stock",
            product.name
        )));
    }
    let quantity = clamp_quantity(form.quantity, product.stock);

    let cart = session_cart(&state, &session).await?;
    let (changed, view) = {
        let mut cart = lock_cart(&cart);
        let changed = cart.add_to_cart(product, quantity);
        (changed, CartView::from(&*cart))
    };

    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", form.product_id.as_str())]),
    );
    Ok(cart_response(view, changed))
}

/// A requested add quantity, defaulting to one and clamped to `1..=stock`.
fn clamp_quantity(requested: Option<i64>, stock: u32) -> u32 {
    let clamped = requested.unwrap_or(1).clamp(1, i64::from(stock.max(1)));
    u32::try_from(clamped).unwrap_or(1)
}

/// Set an item's quantity.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<UpdateCartForm>,
) -> Response {
    let Some(cart) = existing_cart(&state, &session).await else {
        return cart_response(CartView::empty(), false);
    };

    let (changed, view) = {
        let mut cart = lock_cart(&cart);
        let changed = cart.update_quantity(form.product_id.as_str(), form.quantity);
        (changed, CartView::from(&*cart))
    };
    cart_response(view, changed)
}

/// Remove an item from the cart.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<RemoveFromCartForm>,
) -> Response {
    let Some(cart) = existing_cart(&state, &session).await else {
        return cart_response(CartView::empty(), false);
    };

    let (changed, view) = {
        let mut cart = lock_cart(&cart);
        let changed = cart.remove_from_cart(form.product_id.as_str());
        (changed, CartView::from(&*cart))
    };

    if changed {
        add_breadcrumb(
            "cart",
            "Removed from cart",
            Some(&[("product_id", form.product_id.as_str())]),
        );
    }
    cart_response(view, changed)
}

/// Get cart item count.
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Json<CartCount> {
    let count = match existing_cart(&state, &session).await {
        Some(cart) => lock_cart(&cart).total_items(),
        None => 0,
    };
    Json(CartCount { count })
}

/// "Based on your cart" recommendations.
#[instrument(skip(state, session))]
pub async fn recommendations(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<CountQuery>,
) -> Result<Json<serde_json::Value>> {
    let product_ids = match existing_cart(&state, &session).await {
        Some(cart) => lock_cart(&cart).product_ids(),
        None => Vec::new(),
    };

    let products = state
        .recommendations()
        .recommend(&product_ids, query.resolve(CART_RECOMMENDATION_COUNT))
        .await;

    to_json(&ProductList {
        products: product_views(&products),
    })
}

/// Stream cart events to the client as server-sent events.
///
/// Each event is named `cart` and carries the change plus the new totals.
/// A subscriber that falls behind skips the events it missed.
#[instrument(skip(state, session))]
pub async fn events(
    State(state): State<AppState>,
    session: Session,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let cart = session_cart(&state, &session).await?;
    let mut receiver = lock_cart(&cart).subscribe();

    let stream = stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().event("cart").json_data(&event) {
                    Ok(sse_event) => yield Ok::<_, Infallible>(sse_event),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode cart event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Cart event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::tests::product;

    #[test]
    fn test_cart_view_totals_and_display() {
        let mut cart = Cart::new();
        cart.add_to_cart(Arc::new(product("p1", "A", &[], 1000)), 2);
        cart.add_to_cart(Arc::new(product("p2", "A", &[], 550)), 1);

        let view = CartView::from(&cart);
        assert_eq!(view.total_items, 3);
        assert_eq!(view.total_price, Decimal::new(2550, 2));
        assert_eq!(view.display_total, "$25.50");
        assert_eq!(view.items[0].display_line_total, "$20.00");
        assert_eq!(view.items[1].quantity, 1);
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::empty();
        assert!(view.items.is_empty());
        assert_eq!(view.display_total, "$0.00");
    }

    #[test]
    fn test_add_quantity_is_clamped() {
        assert_eq!(clamp_quantity(None, 5), 1);
        assert_eq!(clamp_quantity(Some(3), 5), 3);
        assert_eq!(clamp_quantity(Some(0), 5), 1);
        assert_eq!(clamp_quantity(Some(-2), 5), 1);
        assert_eq!(clamp_quantity(Some(i64::MAX), 5), 5);
    }

    #[test]
    fn test_cart_response_sets_trigger_only_on_change() {
        let changed = cart_response(CartView::empty(), true);
        assert_eq!(
            changed.headers().get(HX_TRIGGER).unwrap(),
            CART_UPDATED_EVENT
        );

        let unchanged = cart_response(CartView::empty(), false);
        assert!(unchanged.headers().get(HX_TRIGGER).is_none());
    }
}
