//! Product filtering for the listing page.
//!
//! A product passes when every active predicate passes: category membership,
//! any-tag intersection, case-insensitive name/description search and an
//! inclusive price range. Results keep catalog order.

use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use zenith_core::Product;

use crate::catalog::Catalog;

/// Inclusive price bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl PriceRange {
    #[must_use]
    pub const fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    /// Whether `price` lies within the bounds, inclusive on both ends.
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        self.min <= price && price <= self.max
    }
}

/// Current filter state. Empty collections and an empty query restrict nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub categories: HashSet<String>,
    pub tags: HashSet<String>,
    pub search_query: String,
    pub price_range: Option<PriceRange>,
}

impl ProductFilter {
    /// Whether any predicate restricts the result.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.categories.is_empty()
            || !self.tags.is_empty()
            || !self.search_query.is_empty()
            || self.price_range.is_some()
    }

    /// Reset every dimension.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether a single product satisfies all active predicates.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        self.matches_with_query(product, &self.search_query.to_lowercase())
    }

    /// [`Self::matches`] with the search query already lowercased.
    fn matches_with_query(&self, product: &Product, query: &str) -> bool {
        self.matches_category(product)
            && self.matches_tags(product)
            && matches_search(product, query)
            && self.matches_price(product)
    }

    fn matches_category(&self, product: &Product) -> bool {
        self.categories.is_empty() || self.categories.contains(&product.category)
    }

    fn matches_tags(&self, product: &Product) -> bool {
        self.tags.is_empty() || product.tags.iter().any(|tag| self.tags.contains(tag))
    }

    fn matches_price(&self, product: &Product) -> bool {
        self.price_range
            .is_none_or(|range| range.contains(product.price))
    }
}

fn matches_search(product: &Product, query: &str) -> bool {
    query.is_empty()
        || product.name.to_lowercase().contains(query)
        || product.description.to_lowercase().contains(query)
}

/// Result of applying a filter.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Matching products in catalog order.
    pub products: Vec<Arc<Product>>,
    /// Whether any predicate was active, so an empty result can be told apart
    /// from an empty catalog.
    pub filters_active: bool,
}

/// Apply `filter` to every product in the catalog.
#[must_use]
pub fn filter_products(catalog: &Catalog, filter: &ProductFilter) -> FilterOutcome {
    let query = filter.search_query.to_lowercase();
    let products = catalog
        .products()
        .iter()
        .filter(|product| filter.matches_with_query(product, &query))
        .cloned()
        .collect();

    FilterOutcome {
        products,
        filters_active: filter.is_active(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::catalog::tests::product;

    fn ids(outcome: &FilterOutcome) -> Vec<&str> {
        outcome.products.iter().map(|p| p.id.as_str()).collect()
    }

    fn set(values: &[&str]) -> HashSet<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn five_products() -> Catalog {
        Catalog::new(vec![
            product("a1", "A", &["new"], 1000),
            product("b1", "B", &["sale"], 2000),
            product("a2", "A", &["sale"], 3000),
            product("b2", "B", &[], 4000),
            product("a3", "A", &["new", "sale"], 5000),
        ])
        .unwrap()
    }

    #[test]
    fn test_category_filter_preserves_order() {
        let catalog = five_products();
        let filter = ProductFilter {
            categories: set(&["A"]),
            ..ProductFilter::default()
        };
        let outcome = filter_products(&catalog, &filter);
        assert_eq!(ids(&outcome), ["a1", "a2", "a3"]);
        assert!(outcome.filters_active);
    }

    #[test]
    fn test_no_filters_returns_everything() {
        let catalog = five_products();
        let outcome = filter_products(&catalog, &ProductFilter::default());
        assert_eq!(outcome.products.len(), 5);
        assert!(!outcome.filters_active);
    }

    #[test]
    fn test_tags_match_any() {
        let catalog = five_products();
        let filter = ProductFilter {
            tags: set(&["new", "missing"]),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter_products(&catalog, &filter)), ["a1", "a3"]);
    }

    #[test]
    fn test_dimensions_combine_with_and() {
        let catalog = five_products();
        let filter = ProductFilter {
            categories: set(&["B"]),
            tags: set(&["sale"]),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter_products(&catalog, &filter)), ["b1"]);
    }

    #[test]
    fn test_search_is_case_insensitive_on_name_and_description() {
        let mut lamp = product("lamp", "Home", &[], 100);
        lamp.name = "Aura Smart Lamp".to_string();
        let mut throw = product("throw", "Home", &[], 100);
        throw.description = "Pairs well with a LAMP".to_string();
        let catalog = Catalog::new(vec![lamp, throw, product("other", "Home", &[], 100)]).unwrap();

        let filter = ProductFilter {
            search_query: "lamp".to_string(),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter_products(&catalog, &filter)), ["lamp", "throw"]);
    }

    #[test]
    fn test_search_query_is_not_trimmed() {
        let mut lamp = product("lamp", "Home", &[], 100);
        lamp.name = "Aura Smart Lamp".to_string();
        lamp.description = "Ambient".to_string();
        let mut desk = product("desk", "Home", &[], 100);
        desk.description = "A lamp stand".to_string();
        let catalog = Catalog::new(vec![lamp, desk]).unwrap();

        let filter = ProductFilter {
            search_query: "LAMP ".to_string(),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter_products(&catalog, &filter)), ["desk"]);
        assert!(
            catalog
                .products()
                .iter()
                .all(|p| filter.matches(p) == (p.id.as_str() == "desk"))
        );
    }

    #[test]
    fn test_price_range_is_inclusive() {
        let catalog = five_products();
        let filter = ProductFilter {
            price_range: Some(PriceRange::new(Decimal::new(20, 0), Decimal::new(40, 0))),
            ..ProductFilter::default()
        };
        assert_eq!(ids(&filter_products(&catalog, &filter)), ["b1", "a2", "b2"]);
    }

    #[test]
    fn test_active_filter_with_empty_result() {
        let catalog = five_products();
        let filter = ProductFilter {
            categories: set(&["Z"]),
            ..ProductFilter::default()
        };
        let outcome = filter_products(&catalog, &filter);
        assert!(outcome.products.is_empty());
        assert!(outcome.filters_active);
    }

    #[test]
    fn test_clear_resets_every_dimension() {
        let mut filter = ProductFilter {
            categories: set(&["A"]),
            tags: set(&["new"]),
            search_query: "x".to_string(),
            price_range: Some(PriceRange::new(Decimal::ZERO, Decimal::ONE)),
        };
        filter.clear();
        assert!(!filter.is_active());
    }

    const CATEGORIES: [&str; 3] = ["A", "B", "C"];
    const TAGS: [&str; 4] = ["new", "sale", "eco", "gift"];

    fn arb_product(index: usize) -> impl Strategy<Value = Product> {
        (
            0..CATEGORIES.len(),
            proptest::sample::subsequence(TAGS.to_vec(), 0..=TAGS.len()),
            0_i64..20_000,
            proptest::sample::select(vec!["lamp", "Desk", "bag", "LAMP shade"]),
        )
            .prop_map(move |(category, tags, cents, name)| {
                let mut p = product(&format!("p{index}"), CATEGORIES[category], &tags, cents);
                p.name = name.to_string();
                p
            })
    }

    fn arb_catalog() -> impl Strategy<Value = Catalog> {
        (0_usize..12)
            .prop_flat_map(|len| (0..len).map(arb_product).collect::<Vec<_>>())
            .prop_map(|products| Catalog::new(products).unwrap())
    }

    fn arb_filter() -> impl Strategy<Value = ProductFilter> {
        (
            proptest::sample::subsequence(CATEGORIES.to_vec(), 0..=CATEGORIES.len()),
            proptest::sample::subsequence(TAGS.to_vec(), 0..=TAGS.len()),
            proptest::sample::select(vec!["", "lamp", "desk", "zzz"]),
            proptest::option::of((0_i64..10_000, 0_i64..10_000)),
        )
            .prop_map(|(categories, tags, query, range)| ProductFilter {
                categories: set(&categories),
                tags: set(&tags),
                search_query: query.to_string(),
                price_range: range.map(|(a, b)| {
                    PriceRange::new(Decimal::new(a.min(b), 2), Decimal::new(a.max(b), 2))
                }),
            })
    }

    fn satisfies_all(filter: &ProductFilter, p: &Product) -> bool {
        let category = filter.categories.is_empty() || filter.categories.contains(&p.category);
        let tags = filter.tags.is_empty() || p.tags.iter().any(|t| filter.tags.contains(t));
        let query = filter.search_query.to_lowercase();
        let search = query.is_empty()
            || p.name.to_lowercase().contains(&query)
            || p.description.to_lowercase().contains(&query);
        let price = filter
            .price_range
            .is_none_or(|r| r.min <= p.price && p.price <= r.max);
        category && tags && search && price
    }

    proptest! {
        #[test]
        fn proptest_filter_is_sound_and_complete(catalog in arb_catalog(), filter in arb_filter()) {
            let outcome = filter_products(&catalog, &filter);
            let returned: HashSet<&str> = outcome.products.iter().map(|p| p.id.as_str()).collect();

            for p in catalog.products() {
                prop_assert_eq!(returned.contains(p.id.as_str()), satisfies_all(&filter, p));
            }

            let positions: Vec<usize> = outcome
                .products
                .iter()
                .filter_map(|p| catalog.products().iter().position(|c| c.id == p.id))
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
