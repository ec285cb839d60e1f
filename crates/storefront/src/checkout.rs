//! Checkout form validation and order placement.
//!
//! No payment is taken. A valid form against a non-empty cart captures the
//! cart's totals into an [`OrderConfirmation`] and empties the cart.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zenith_core::OrderId;

use crate::cart::Cart;

/// Shipping is always free.
pub const SHIPPING_LABEL: &str = "Free";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Invalid regex"));

/// `MM/YY` or `MMYY`.
static CARD_EXPIRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0[1-9]|1[0-2])/?([0-9]{2})$").expect("Invalid regex"));

/// Submitted checkout form. Missing fields deserialize as empty.
///
/// Implements `Debug` manually to redact card details.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckoutForm {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub zip: String,
    pub card_name: String,
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvc: String,
}

impl fmt::Debug for CheckoutForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutForm")
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("city", &self.city)
            .field("zip", &self.zip)
            .field("card_number", &"[REDACTED]")
            .field("card_expiry", &"[REDACTED]")
            .field("card_cvc", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// A rejected form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("invalid checkout form ({} field errors)", .0.len())]
    InvalidForm(Vec<FieldError>),
}

impl CheckoutForm {
    /// Check every field, collecting all failures.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::InvalidForm`] listing each rejected field.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &'static str, message: &'static str| {
            if !ok {
                errors.push(FieldError { field, message });
            }
        };

        check(EMAIL_RE.is_match(self.email.trim()), "email", "Invalid email address.");
        check(!self.first_name.trim().is_empty(), "first_name", "First name is required.");
        check(!self.last_name.trim().is_empty(), "last_name", "Last name is required.");
        check(!self.address.trim().is_empty(), "address", "Address is required.");
        check(!self.city.trim().is_empty(), "city", "City is required.");
        check(char_len(&self.zip) == 5, "zip", "ZIP code must be 5 digits.");
        check(!self.card_name.trim().is_empty(), "card_name", "Name on card is required.");
        check(
            char_len(&self.card_number) == 16,
            "card_number",
            "Card number must be 16 digits.",
        );
        check(
            CARD_EXPIRY_RE.is_match(&self.card_expiry),
            "card_expiry",
            "Invalid expiry date (MM/YY).",
        );
        check(char_len(&self.card_cvc) == 3, "card_cvc", "CVC must be 3 digits.");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CheckoutError::InvalidForm(errors))
        }
    }
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Receipt for a placed order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub item_count: u64,
    pub subtotal: Decimal,
    pub shipping: &'static str,
    pub total: Decimal,
    pub placed_at: DateTime<Utc>,
}

/// Validate `form`, then capture and clear `cart`.
///
/// The cart is untouched unless the order is placed.
///
/// # Errors
///
/// Returns [`CheckoutError::EmptyCart`] for an empty cart and
/// [`CheckoutError::InvalidForm`] for a rejected form.
pub fn place_order(cart: &mut Cart, form: &CheckoutForm) -> Result<OrderConfirmation, CheckoutError> {
    if cart.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    form.validate()?;

    let subtotal = cart.total_price();
    let confirmation = OrderConfirmation {
        order_id: OrderId::generate(),
        item_count: cart.total_items(),
        subtotal,
        shipping: SHIPPING_LABEL,
        total: subtotal,
        placed_at: Utc::now(),
    };
    cart.clear_cart();

    tracing::info!(
        order_id = %confirmation.order_id,
        items = confirmation.item_count,
        total = %confirmation.total,
        "Order placed"
    );
    Ok(confirmation)
}
