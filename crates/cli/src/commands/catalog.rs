//! Catalog commands.
//!
//! # Usage
//!
//! ```bash
//! # Validate the catalog the storefront would load
//! zenith-cli catalog check
//!
//! # Search a catalog file
//! zenith-cli catalog list --path data/catalog.json -q lamp
//! ```
//!
//! # Environment Variables
//!
//! - `STOREFRONT_CATALOG_PATH` - Catalog file used when `--path` is omitted

use std::io::{self, Write};
use std::path::Path;

use rust_decimal::Decimal;
use zenith_storefront::catalog::{Catalog, CatalogError};
use zenith_storefront::filter::{PriceRange, ProductFilter, filter_products};

/// Errors from catalog commands.
#[derive(Debug, thiserror::Error)]
pub enum CatalogCommandError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Output error: {0}")]
    Output(#[from] io::Error),

    #[error("--min-price ({min}) is greater than --max-price ({max})")]
    InvertedPriceRange { min: Decimal, max: Decimal },
}

/// Filter options for `catalog list`.
#[derive(Debug, Default)]
pub struct ListQuery {
    pub search: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl ListQuery {
    fn to_filter(&self) -> Result<ProductFilter, CatalogCommandError> {
        let price_range = match (self.min_price, self.max_price) {
            (None, None) => None,
            (min, max) => {
                let min = min.unwrap_or(Decimal::ZERO);
                let max = max.unwrap_or(Decimal::MAX);
                if min > max {
                    return Err(CatalogCommandError::InvertedPriceRange { min, max });
                }
                Some(PriceRange::new(min, max))
            }
        };

        Ok(ProductFilter {
            categories: self.categories.iter().cloned().collect(),
            tags: self.tags.iter().cloned().collect(),
            search_query: self.search.clone(),
            price_range,
        })
    }
}

fn load(path: Option<&Path>) -> Result<Catalog, CatalogError> {
    match path {
        Some(path) => Catalog::load(path),
        None => Catalog::builtin(),
    }
}

/// Validate a catalog and report its size.
///
/// # Errors
///
/// Returns an error if the catalog cannot be read or is invalid.
pub fn check(path: Option<&Path>) -> Result<(), CatalogCommandError> {
    let source = path.map_or_else(|| "embedded".to_string(), |p| p.display().to_string());
    tracing::info!("Checking {source} catalog...");

    let catalog = load(path)?;
    let out_of_stock = catalog.products().iter().filter(|p| !p.in_stock()).count();

    tracing::info!(
        products = catalog.len(),
        categories = catalog.categories().len(),
        tags = catalog.tags().len(),
        out_of_stock,
        "Catalog is valid"
    );
    Ok(())
}

/// Print the products matching `query`, one per line.
///
/// # Errors
///
/// Returns an error if the catalog is invalid, the price range is inverted or
/// stdout cannot be written.
pub fn list(path: Option<&Path>, query: &ListQuery) -> Result<(), CatalogCommandError> {
    let filter = query.to_filter()?;
    let catalog = load(path)?;
    let outcome = filter_products(&catalog, &filter);

    let mut out = io::stdout().lock();
    for product in &outcome.products {
        writeln!(
            out,
            "{:>4}  {:<32} {:>9}  {:<12} {}",
            product.id,
            product.name,
            product.unit_price().display(),
            product.category,
            product.tags.join(", ")
        )?;
    }

    if outcome.products.is_empty() && outcome.filters_active {
        tracing::info!("No products match the given filters");
    } else {
        tracing::info!(matches = outcome.products.len(), "Listed products");
    }
    Ok(())
}
