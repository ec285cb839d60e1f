//! The catalog product record.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Highest accepted unit price. Keeps `price * u32::MAX` summed over many
/// cart lines well inside `Decimal`'s range.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Errors found when checking a product record.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    /// The product ID is empty.
    #[error("product id cannot be empty")]
    EmptyId,
    /// The price is below zero.
    #[error("product {id} has a negative price ({price})")]
    NegativePrice {
        /// Offending product.
        id: ProductId,
        /// The rejected price.
        price: Decimal,
    },
    /// The price is above [`MAX_PRICE`].
    #[error("product {id} has a price above the {max} ceiling ({price})")]
    PriceTooHigh {
        /// Offending product.
        id: ProductId,
        /// The rejected price.
        price: Decimal,
        /// The ceiling.
        max: Decimal,
    },
    /// The category is empty.
    #[error("product {0} has no category")]
    EmptyCategory(ProductId),
}

/// A purchasable catalog product.
///
/// Products are immutable once loaded; carts and filter results share the
/// catalog's record rather than copying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    #[serde(alias = "longDescription")]
    pub long_description: String,
    /// Unit price in the store currency.
    pub price: Decimal,
    /// Opaque image reference, resolved to a URL by the presentation layer.
    pub image: String,
    pub category: String,
    /// Display order is preserved; matching ignores order.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Upper bound on purchasable quantity.
    pub stock: u32,
}

impl Product {
    /// Check the record-level invariants.
    ///
    /// # Errors
    ///
    /// Returns an error if the id or category is empty, or the price is negative
    /// or above [`MAX_PRICE`].
    pub fn validate(&self) -> Result<(), ProductError> {
        if self.id.as_str().is_empty() {
            return Err(ProductError::EmptyId);
        }
        if self.price < Decimal::ZERO {
            return Err(ProductError::NegativePrice {
                id: self.id.clone(),
                price: self.price,
            });
        }
        if self.price > MAX_PRICE {
            return Err(ProductError::PriceTooHigh {
                id: self.id.clone(),
                price: self.price,
                max: MAX_PRICE,
            });
        }
        if self.category.is_empty() {
            return Err(ProductError::EmptyCategory(self.id.clone()));
        }
        Ok(())
    }

    /// Unit price with currency, for display.
    #[must_use]
    pub fn unit_price(&self) -> Price {
        Price::usd(self.price)
    }

    /// Whether any stock remains.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
