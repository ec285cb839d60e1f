//! Product route handlers.

use std::collections::HashSet;
use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use zenith_core::Product;

use crate::catalog::FEATURED_PRODUCT_COUNT;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filter::{PriceRange, ProductFilter, filter_products};
use crate::recommendations::PRODUCT_PAGE_RECOMMENDATION_COUNT;
use crate::state::AppState;

/// Largest `count` a client may ask recommendations for.
pub const MAX_RECOMMENDATION_COUNT: u32 = 12;

/// Product display data.
#[derive(Debug, Serialize)]
pub struct ProductView<'a> {
    #[serde(flatten)]
    pub product: &'a Product,
    pub display_price: String,
    pub in_stock: bool,
}

impl<'a> From<&'a Product> for ProductView<'a> {
    fn from(product: &'a Product) -> Self {
        Self {
            product,
            display_price: product.unit_price().display(),
            in_stock: product.in_stock(),
        }
    }
}

/// Render a list of products.
pub fn product_views<'a, P>(products: &'a [P]) -> Vec<ProductView<'a>>
where
    P: AsRef<Product>,
{
    products
        .iter()
        .map(|product| ProductView::from(product.as_ref()))
        .collect()
}

/// Listing filter query. List parameters are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub q: Option<String>,
    pub categories: Option<String>,
    pub tags: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
}

impl ListingQuery {
    /// Convert the query into a filter.
    ///
    /// A single price bound leaves the other end open.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for unparseable prices or `min_price > max_price`.
    pub fn to_filter(&self) -> Result<ProductFilter> {
        let min = parse_price("min_price", self.min_price.as_deref())?;
        let max = parse_price("max_price", self.max_price.as_deref())?;

        let price_range = match (min, max) {
            (None, None) => None,
            (min, max) => {
                let range = PriceRange::new(
                    min.unwrap_or(Decimal::ZERO),
                    max.unwrap_or(Decimal::MAX),
                );
                if range.min > range.max {
                    return Err(AppError::BadRequest(
                        "min_price must not exceed max_price".to_string(),
                    ));
                }
                Some(range)
            }
        };

        Ok(ProductFilter {
            categories: split_list(self.categories.as_deref()),
            tags: split_list(self.tags.as_deref()),
            search_query: self.q.clone().unwrap_or_default(),
            price_range,
        })
    }
}

fn split_list(value: Option<&str>) -> HashSet<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse_price(name: &str, value: Option<&str>) -> Result<Option<Decimal>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => Decimal::from_str(raw)
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{name} is not a valid price"))),
    }
}

/// A plain list of products.
#[derive(Debug, Serialize)]
pub struct ProductList<'a> {
    pub products: Vec<ProductView<'a>>,
}

/// Filtered listing.
#[derive(Debug, Serialize)]
pub struct ListingResponse<'a> {
    pub products: Vec<ProductView<'a>>,
    pub total: usize,
    pub filters_active: bool,
}

/// Display the product listing, filtered by the query.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<serde_json::Value>> {
    let filter = query.to_filter()?;
    let outcome = filter_products(state.catalog(), &filter);

    let listing = ListingResponse {
        products: product_views(&outcome.products),
        total: outcome.products.len(),
        filters_active: outcome.filters_active,
    };
    to_json(&listing)
}

/// Featured products for the home page.
#[instrument(skip(state))]
pub async fn featured(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    to_json(&ProductList {
        products: product_views(state.catalog().featured(FEATURED_PRODUCT_COUNT)),
    })
}

/// Filter dimensions for the listing sidebar.
#[derive(Debug, Serialize)]
pub struct Facets<'a> {
    pub categories: &'a [String],
    pub tags: &'a [String],
}

/// Every category and tag in the catalog.
#[instrument(skip(state))]
pub async fn facets(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let catalog = state.catalog();
    to_json(&Facets {
        categories: catalog.categories(),
        tags: catalog.tags(),
    })
}

/// Display product detail.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let product = state
        .catalog()
        .get_product_by_id(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    add_breadcrumb(
        "navigation",
        "Viewed product",
        Some(&[("product_id", id.as_str())]),
    );
    to_json(&ProductView::from(product.as_ref()))
}

/// Recommendation count query.
#[derive(Debug, Default, Deserialize)]
pub struct CountQuery {
    pub count: Option<u32>,
}

impl CountQuery {
    /// The requested count clamped to `1..=MAX_RECOMMENDATION_COUNT`.
    #[must_use]
    pub fn resolve(&self, default: u32) -> u32 {
        self.count
            .unwrap_or(default)
            .clamp(1, MAX_RECOMMENDATION_COUNT)
    }
}

/// "You Might Also Like" for a product.
#[instrument(skip(state))]
pub async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CountQuery>,
) -> Result<Json<serde_json::Value>> {
    let product = state
        .catalog()
        .get_product_by_id(&id)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    let products = state
        .recommendations()
        .recommend(
            std::slice::from_ref(&product.id),
            query.resolve(PRODUCT_PAGE_RECOMMENDATION_COUNT),
        )
        .await;

    to_json(&ProductList {
        products: product_views(&products),
    })
}

/// Serialize a borrowed view into an owned JSON body.
pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Json<serde_json::Value>> {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| AppError::Internal(format!("failed to serialize response: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_query_splits_lists() {
        let query = ListingQuery {
            q: Some("lamp".to_string()),
            categories: Some("Home, Tech,,".to_string()),
            tags: Some("smart".to_string()),
            ..ListingQuery::default()
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.search_query, "lamp");
        assert_eq!(filter.categories.len(), 2);
        assert!(filter.categories.contains("Tech"));
        assert!(filter.tags.contains("smart"));
        assert!(filter.price_range.is_none());
    }

    #[test]
    fn test_search_query_is_kept_verbatim() {
        let query = ListingQuery {
            q: Some("lamp ".to_string()),
            ..ListingQuery::default()
        };
        assert_eq!(query.to_filter().unwrap().search_query, "lamp ");
    }

    #[test]
    fn test_single_price_bound_is_open_ended() {
        let query = ListingQuery {
            min_price: Some("25".to_string()),
            ..ListingQuery::default()
        };
        let range = query.to_filter().unwrap().price_range.unwrap();
        assert_eq!(range.min, Decimal::new(25, 0));
        assert_eq!(range.max, Decimal::MAX);
    }

    #[test]
    fn test_bad_prices_rejected() {
        let query = ListingQuery {
            min_price: Some("cheap".to_string()),
            ..ListingQuery::default()
        };
        assert!(matches!(query.to_filter(), Err(AppError::BadRequest(_))));

        let query = ListingQuery {
            min_price: Some("50".to_string()),
            max_price: Some("10".to_string()),
            ..ListingQuery::default()
        };
        assert!(matches!(query.to_filter(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_count_query_clamps() {
        assert_eq!(CountQuery::default().resolve(4), 4);
        assert_eq!(CountQuery { count: Some(0) }.resolve(4), 1);
        assert_eq!(CountQuery { count: Some(500) }.resolve(4), MAX_RECOMMENDATION_COUNT);
    }
}
