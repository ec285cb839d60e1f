//! AI-backed "You Might Also Like" recommendations.
//!
//! The gateway asks an injected [`RecommendationCapability`] for product ids
//! related to the ones the shopper is viewing or has carted, then resolves the
//! answer against the catalog. Recommendations are an enhancement: every
//! failure degrades to an empty list and is only logged.

mod claude;
mod error;

pub use claude::{ClaudeRecommender, parse_recommended_ids};
pub use error::GatewayError;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use zenith_core::{Product, ProductId};

use crate::catalog::Catalog;

/// Count requested when the caller does not specify one.
pub const DEFAULT_RECOMMENDATION_COUNT: u32 = 3;
/// Count shown under a product's detail page.
pub const PRODUCT_PAGE_RECOMMENDATION_COUNT: u32 = 4;
/// Count shown in the cart.
pub const CART_RECOMMENDATION_COUNT: u32 = 2;

const CACHE_CAPACITY: u64 = 1_000;

/// Request sent to the recommendation capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    /// Products currently viewed or carted. Never empty.
    pub product_ids: Vec<ProductId>,
    /// How many distinct recommendations to return.
    #[serde(default = "default_count")]
    pub number_of_recommendations: u32,
}

const fn default_count() -> u32 {
    DEFAULT_RECOMMENDATION_COUNT
}

/// Answer from the recommendation capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub recommended_product_ids: Vec<ProductId>,
}

/// An external source of recommended product ids.
///
/// Implementations are asked for exactly `number_of_recommendations` ids that
/// exclude the request's ids, but the gateway does not rely on either.
#[async_trait]
pub trait RecommendationCapability: Send + Sync {
    /// Recommend products related to `request.product_ids`.
    ///
    /// # Errors
    ///
    /// Returns an error if the capability cannot produce a well-formed answer.
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, GatewayError>;
}

type CacheKey = (Vec<ProductId>, u32);

/// Resolves capability answers to catalog products.
#[derive(Clone)]
pub struct RecommendationGateway {
    catalog: Arc<Catalog>,
    capability: Option<Arc<dyn RecommendationCapability>>,
    cache: Cache<CacheKey, Arc<[ProductId]>>,
}

impl RecommendationGateway {
    /// Create a gateway. With no capability every call returns no recommendations.
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        capability: Option<Arc<dyn RecommendationCapability>>,
        cache_ttl: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(cache_ttl)
            .build();

        Self {
            catalog,
            capability,
            cache,
        }
    }

    /// Whether a capability is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.capability.is_some()
    }

    /// Up to `count` catalog products related to `product_ids`.
    ///
    /// Returns an empty list when `product_ids` is empty, when the capability
    /// fails, or when none of its answers resolve to catalog products. Ids
    /// from the input are never recommended back.
    #[instrument(skip(self), fields(inputs = product_ids.len()))]
    pub async fn recommend(&self, product_ids: &[ProductId], count: u32) -> Vec<Arc<Product>> {
        if product_ids.is_empty() || count == 0 {
            return Vec::new();
        }
        let Some(capability) = &self.capability else {
            return Vec::new();
        };

        let key = cache_key(product_ids, count);
        if let Some(cached) = self.cache.get(&key).await {
            return self.resolve(product_ids, &cached, count);
        }

        let request = RecommendationRequest {
            product_ids: product_ids.to_vec(),
            number_of_recommendations: count,
        };

        let response = match capability.recommend(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get product recommendations");
                return Vec::new();
            }
        };

        let products = self.resolve(product_ids, &response.recommended_product_ids, count);
        if products.is_empty() {
            tracing::warn!(
                returned = response.recommended_product_ids.len(),
                "No recommended ids matched the catalog"
            );
        } else {
            self.cache
                .insert(key, response.recommended_product_ids.into())
                .await;
        }
        products
    }

    /// Drop input ids, resolve the rest against the catalog and cap at `count`.
    fn resolve(
        &self,
        inputs: &[ProductId],
        recommended: &[ProductId],
        count: u32,
    ) -> Vec<Arc<Product>> {
        let inputs: HashSet<&str> = inputs.iter().map(ProductId::as_str).collect();
        let candidates: Vec<&str> = recommended
            .iter()
            .map(ProductId::as_str)
            .filter(|id| !inputs.contains(id))
            .collect();

        let mut products = self.catalog.get_products_by_ids(&candidates);
        products.truncate(usize::try_from(count).unwrap_or(usize::MAX));
        products
    }
}

/// Input order and duplicates do not change the answer.
fn cache_key(product_ids: &[ProductId], count: u32) -> CacheKey {
    let mut ids = product_ids.to_vec();
    ids.sort();
    ids.dedup();
    (ids, count)
}
