//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                           - Liveness check
//!
//! # Products
//! GET  /products                         - Filtered listing (?q, categories, tags, min_price, max_price)
//! GET  /products/featured                - Home page carousel
//! GET  /products/facets                  - Categories and tags
//! GET  /products/{id}                    - Product detail
//! GET  /products/{id}/recommendations    - "You Might Also Like"
//!
//! # Cart
//! GET  /cart                             - Cart contents
//! POST /cart/add                         - Add to cart (triggers cart-updated)
//! POST /cart/update                      - Set quantity (triggers cart-updated)
//! POST /cart/remove                      - Remove item (triggers cart-updated)
//! GET  /cart/count                       - Cart count badge
//! GET  /cart/recommendations             - "Based on your cart"
//! GET  /cart/events                      - Server-sent cart events
//!
//! # Checkout
//! POST /checkout                         - Place order
//! ```

pub mod cart;
pub mod checkout;
pub mod products;

use axum::{
    Router,
    body::Body,
    http::Request,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{create_session_layer, request_id_middleware};
use crate::state::AppState;

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/featured", get(products::featured))
        .route("/facets", get(products::facets))
        .route("/{id}", get(products::show))
        .route("/{id}/recommendations", get(products::recommendations))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .route("/recommendations", get(cart::recommendations))
        .route("/events", get(cart::events))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/products", product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::submit))
}

/// Build the application with sessions, request ids and request tracing.
///
/// Sentry layers are added by the binary on top of this.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    routes()
        .layer(session_layer)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running.
async fn health() -> &'static str {
    "ok"
}
