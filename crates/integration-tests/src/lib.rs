//! Integration tests for the Zenith Market storefront.
//!
//! Tests drive the full router in-process with `tower::ServiceExt::oneshot`,
//! carrying the session cookie between requests the way a browser would.
//! The recommendation capability is replaced by [`MockRecommender`].
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p zenith-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use axum::response::Response;
use tower::ServiceExt;
use zenith_core::ProductId;
use zenith_storefront::catalog::Catalog;
use zenith_storefront::config::StorefrontConfig;
use zenith_storefront::recommendations::{
    GatewayError, RecommendationCapability, RecommendationRequest, RecommendationResponse,
};
use zenith_storefront::routes;
use zenith_storefront::state::AppState;

// =============================================================================
// Mock Recommendation Capability
// =============================================================================

/// Recommendation capability with a scripted answer.
#[derive(Default)]
pub struct MockRecommender {
    answer: Mutex<Option<Vec<String>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<RecommendationRequest>>,
}

impl MockRecommender {
    /// Always answer with `ids`.
    pub fn answering(ids: &[&str]) -> Self {
        Self {
            answer: Mutex::new(Some(ids.iter().map(ToString::to_string).collect())),
            ..Self::default()
        }
    }

    /// Always fail.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Number of calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<RecommendationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RecommendationCapability for MockRecommender {
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        match self.answer.lock().unwrap().as_ref() {
            Some(ids) => Ok(RecommendationResponse {
                recommended_product_ids: ids.iter().map(ProductId::new).collect(),
            }),
            None => Err(GatewayError::MalformedOutput("scripted failure".to_string())),
        }
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// A response with its body read.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, or `Null` for non-JSON bodies.
    pub json: serde_json::Value,
    pub text: String,
}

impl TestResponse {
    /// Whether the response asks HTMX to refresh cart widgets.
    pub fn triggers_cart_update(&self) -> bool {
        self.headers
            .get("HX-Trigger")
            .is_some_and(|v| v == "cart-updated")
    }
}

/// One shopper talking to an in-process storefront.
pub struct TestContext {
    app: Router,
    cookie: Option<String>,
    pub recommender: Option<Arc<MockRecommender>>,
}

impl TestContext {
    /// Storefront over the embedded catalog, recommendations disabled.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Storefront over the embedded catalog using `recommender`.
    pub fn with_recommender(recommender: MockRecommender) -> Self {
        Self::build(Some(Arc::new(recommender)))
    }

    fn build(recommender: Option<Arc<MockRecommender>>) -> Self {
        let catalog = Catalog::builtin().unwrap();
        let capability = recommender
            .clone()
            .map(|mock| mock as Arc<dyn RecommendationCapability>);
        let state = AppState::new(StorefrontConfig::default(), catalog, capability);

        Self {
            app: routes::app(state),
            cookie: None,
            recommender,
        }
    }

    /// A second shopper on the same storefront, with no session.
    pub fn new_shopper(&self) -> Self {
        Self {
            app: self.app.clone(),
            cookie: None,
            recommender: self.recommender.clone(),
        }
    }

    /// Send a GET request.
    pub async fn get(&mut self, uri: &str) -> TestResponse {
        let response = self.send(Method::GET, uri, Body::empty(), false).await;
        read(response).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post_json(&mut self, uri: &str, body: serde_json::Value) -> TestResponse {
        let response = self
            .send(Method::POST, uri, Body::from(body.to_string()), true)
            .await;
        read(response).await
    }

    /// Send a GET request and return the unread response, for streaming bodies.
    pub async fn get_streaming(&mut self, uri: &str) -> Response {
        self.send(Method::GET, uri, Body::empty(), false).await
    }

    async fn send(&mut self, method: Method, uri: &str, body: Body, json: bool) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if json {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_string());
        }
        response
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

async fn read(response: Response) -> TestResponse {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let json = serde_json::from_str(&text).unwrap_or(serde_json::Value::Null);

    TestResponse {
        status,
        headers,
        json,
        text,
    }
}

/// Product ids from a `{"products": [...]}` body, in order.
pub fn product_ids(json: &serde_json::Value) -> Vec<String> {
    json["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

/// Product ids of the lines in a cart body, in order.
pub fn cart_ids(json: &serde_json::Value) -> Vec<String> {
    json["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["product_id"].as_str().unwrap().to_string())
        .collect()
}
