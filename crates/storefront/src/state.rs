//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::CartRegistry;
use crate::catalog::{Catalog, CatalogError};
use crate::config::StorefrontConfig;
use crate::recommendations::{
    ClaudeRecommender, GatewayError, RecommendationCapability, RecommendationGateway,
};

/// Error building application state at startup.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("recommendation client error: {0}")]
    Recommender(#[from] GatewayError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and gives handlers the catalog,
/// the live carts and the recommendation gateway.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    catalog: Arc<Catalog>,
    carts: CartRegistry,
    recommendations: RecommendationGateway,
}

impl AppState {
    /// Create state from an already loaded catalog and an optional
    /// recommendation capability.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        catalog: Catalog,
        capability: Option<Arc<dyn RecommendationCapability>>,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let carts = CartRegistry::new(config.session_ttl);
        let recommendations = RecommendationGateway::new(
            Arc::clone(&catalog),
            capability,
            config.recommendation_cache_ttl,
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                carts,
                recommendations,
            }),
        }
    }

    /// Load the configured catalog and connect the Claude recommender when
    /// an API key is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog is invalid or the recommender cannot
    /// be built.
    pub fn from_config(config: StorefrontConfig) -> Result<Self, StateError> {
        let catalog = match &config.catalog_path {
            Some(path) => Catalog::load(path)?,
            None => Catalog::builtin()?,
        };

        let capability: Option<Arc<dyn RecommendationCapability>> = match &config.claude {
            Some(claude) => Some(Arc::new(ClaudeRecommender::new(claude, &catalog)?)),
            None => {
                tracing::warn!("CLAUDE_API_KEY not set, recommendations disabled");
                None
            }
        };

        Ok(Self::new(config, catalog, capability))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the live carts.
    #[must_use]
    pub fn carts(&self) -> &CartRegistry {
        &self.inner.carts
    }

    /// Get a reference to the recommendation gateway.
    #[must_use]
    pub fn recommendations(&self) -> &RecommendationGateway {
        &self.inner.recommendations
    }
}
