//! In-memory product catalog.
//!
//! The catalog is loaded once at startup and never mutated. Products are held
//! behind `Arc` so carts, filter results and recommendations share the
//! catalog's records instead of copying them.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::instrument;
use zenith_core::{Product, ProductError, ProductId};

/// Catalog embedded in the binary, used when no catalog path is configured.
const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Number of products shown in the home page "Featured Products" carousel.
pub const FEATURED_PRODUCT_COUNT: usize = 8;

/// Errors that can occur while loading a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid product: {0}")]
    InvalidProduct(#[from] ProductError),

    #[error("duplicate product id: {0}")]
    DuplicateId(ProductId),
}

/// The fixed set of purchasable products plus lookup indices.
#[derive(Debug, Default)]
pub struct Catalog {
    products: Vec<Arc<Product>>,
    by_id: HashMap<ProductId, usize>,
    by_category: HashMap<String, Vec<usize>>,
    by_tag: HashMap<String, Vec<usize>>,
    categories: Vec<String>,
    tags: Vec<String>,
}

impl Catalog {
    /// Build a catalog from product records, in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error if any product fails validation or two products share an id.
    pub fn new(products: Vec<Product>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        let mut seen_tags = HashSet::new();

        for (index, product) in products.into_iter().enumerate() {
            product.validate()?;
            if catalog.by_id.contains_key(&product.id) {
                return Err(CatalogError::DuplicateId(product.id));
            }

            catalog.by_id.insert(product.id.clone(), index);

            let in_category = catalog
                .by_category
                .entry(product.category.clone())
                .or_default();
            if in_category.is_empty() {
                catalog.categories.push(product.category.clone());
            }
            in_category.push(index);

            for tag in &product.tags {
                let with_tag = catalog.by_tag.entry(tag.clone()).or_default();
                // A product listing the same tag twice is indexed once.
                if with_tag.last() != Some(&index) {
                    with_tag.push(index);
                }
                if seen_tags.insert(tag.clone()) {
                    catalog.tags.push(tag.clone());
                }
            }

            catalog.products.push(Arc::new(product));
        }

        Ok(catalog)
    }

    /// Parse a catalog from a JSON array of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the products are invalid.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let products: Vec<Product> = serde_json::from_str(json)?;
        Self::new(products)
    }

    /// Load a catalog from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are invalid.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(products = catalog.len(), "Catalog loaded from file");
        Ok(catalog)
    }

    /// The catalog shipped with the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded catalog is invalid.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Look up a product by id. `None` for unknown ids.
    #[must_use]
    pub fn get_product_by_id(&self, id: &str) -> Option<Arc<Product>> {
        self.by_id
            .get(id)
            .and_then(|&index| self.products.get(index))
            .cloned()
    }

    /// Resolve a list of ids to products.
    ///
    /// Unknown ids are dropped and each product appears at most once. The
    /// result follows catalog order, not the order of `ids`.
    #[must_use]
    pub fn get_products_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Arc<Product>> {
        let wanted: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        self.products
            .iter()
            .filter(|product| wanted.contains(product.id.as_str()))
            .cloned()
            .collect()
    }

    /// All products in catalog order.
    #[must_use]
    pub fn products(&self) -> &[Arc<Product>] {
        &self.products
    }

    /// The first `count` products in catalog order.
    #[must_use]
    pub fn featured(&self, count: usize) -> &[Arc<Product>] {
        self.products.get(..count).unwrap_or(&self.products)
    }

    /// Products in a category, in catalog order.
    #[must_use]
    pub fn products_in_category(&self, category: &str) -> Vec<Arc<Product>> {
        self.indexed(self.by_category.get(category))
    }

    /// Products carrying a tag, in catalog order.
    #[must_use]
    pub fn products_with_tag(&self, tag: &str) -> Vec<Arc<Product>> {
        self.indexed(self.by_tag.get(tag))
    }

    /// Every distinct category, in order of first appearance.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Every distinct tag, in order of first appearance.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    fn indexed(&self, indices: Option<&Vec<usize>>) -> Vec<Arc<Product>> {
        indices
            .into_iter()
            .flatten()
            .filter_map(|&index| self.products.get(index))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use rust_decimal::Decimal;

    use super::*;

    /// Build a product with the fields the catalog cares about.
    pub fn product(id: &str, category: &str, tags: &[&str], price_cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: format!("Description of {id}"),
            long_description: String::new(),
            price: Decimal::new(price_cents, 2),
            image: id.to_string(),
            category: category.to_string(),
            tags: tags.iter().map(ToString::to_string).collect(),
            stock: 5,
        }
    }

    fn sample() -> Catalog {
        Catalog::new(vec![
            product("p1", "A", &["red", "sale"], 1000),
            product("p2", "B", &["blue"], 2000),
            product("p3", "A", &["blue", "sale"], 3000),
            product("p4", "C", &[], 4000),
        ])
        .unwrap()
    }

    #[test]
    fn test_get_product_by_id() {
        let catalog = sample();
        assert_eq!(catalog.get_product_by_id("p2").unwrap().category, "B");
        assert!(catalog.get_product_by_id("missing").is_none());
    }

    #[test]
    fn test_get_products_by_ids_follows_catalog_order() {
        let catalog = sample();
        let products = catalog.get_products_by_ids(&["p3", "missing", "p1", "p3"]);
        let ids: Vec<&str> = products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["p1", "p3"]);
    }

    #[test]
    fn test_get_products_by_ids_shares_records() {
        let catalog = sample();
        let resolved = catalog.get_products_by_ids(&["p1"]);
        let direct = catalog.get_product_by_id("p1").unwrap();
        assert!(Arc::ptr_eq(&resolved[0], &direct));
    }

    #[test]
    fn test_categories_and_tags_in_first_appearance_order() {
        let catalog = sample();
        assert_eq!(catalog.categories(), ["A", "B", "C"]);
        assert_eq!(catalog.tags(), ["red", "sale", "blue"]);
    }

    #[test]
    fn test_index_lookups() {
        let catalog = sample();
        let in_a: Vec<_> = catalog
            .products_in_category("A")
            .iter()
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(in_a, ["p1", "p3"]);
        assert_eq!(catalog.products_with_tag("blue").len(), 2);
        assert!(catalog.products_with_tag("green").is_empty());
    }

    #[test]
    fn test_duplicate_tag_on_one_product_indexed_once() {
        let catalog = Catalog::new(vec![product("p1", "A", &["x", "x"], 100)]).unwrap();
        assert_eq!(catalog.products_with_tag("x").len(), 1);
        assert_eq!(catalog.tags(), ["x"]);
    }

    #[test]
    fn test_featured_caps_at_catalog_size() {
        let catalog = sample();
        assert_eq!(catalog.featured(2).len(), 2);
        assert_eq!(catalog.featured(FEATURED_PRODUCT_COUNT).len(), 4);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let result = Catalog::new(vec![
            product("p1", "A", &[], 100),
            product("p1", "B", &[], 200),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateId(id)) if id.as_str() == "p1"));
    }

    #[test]
    fn test_negative_price_rejected() {
        let result = Catalog::new(vec![product("p1", "A", &[], -100)]);
        assert!(matches!(result, Err(CatalogError::InvalidProduct(_))));
    }

    #[test]
    fn test_price_above_ceiling_rejected() {
        let mut pricey = product("p1", "A", &[], 0);
        pricey.price = Decimal::from_i128_with_scale(10_i128.pow(25), 0);
        assert!(matches!(
            Catalog::new(vec![pricey]),
            Err(CatalogError::InvalidProduct(ProductError::PriceTooHigh { .. }))
        ));
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.len() >= FEATURED_PRODUCT_COUNT);
        assert!(catalog.categories().contains(&"Home".to_string()));
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        assert!(matches!(
            Catalog::from_json("{not json"),
            Err(CatalogError::Parse(_))
        ));
    }
}
