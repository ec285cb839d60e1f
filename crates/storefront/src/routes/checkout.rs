//! Checkout route handler.

use axum::{
    Json,
    extract::State,
    response::{AppendHeaders, IntoResponse, Response},
};
use tower_sessions::Session;
use tracing::instrument;

use crate::cart::lock_cart;
use crate::checkout::{CheckoutError, CheckoutForm, place_order};
use crate::error::{Result, add_breadcrumb};
use crate::routes::cart::{CART_UPDATED_EVENT, HX_TRIGGER, existing_cart};
use crate::state::AppState;

/// Place an order for the session's cart.
///
/// Answers `400` with per-field messages when the form is invalid, and `400`
/// when the cart is empty. On success the cart is emptied.
#[instrument(skip(state, session, form))]
pub async fn submit(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<CheckoutForm>,
) -> Result<Response> {
    let Some(cart) = existing_cart(&state, &session).await else {
        return Err(CheckoutError::EmptyCart.into());
    };

    let confirmation = {
        let mut cart = lock_cart(&cart);
        place_order(&mut cart, &form)?
    };

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_id", confirmation.order_id.to_string().as_str())]),
    );

    Ok((
        AppendHeaders([(HX_TRIGGER, CART_UPDATED_EVENT)]),
        Json(confirmation),
    )
        .into_response())
}
