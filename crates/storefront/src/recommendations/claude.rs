//! Recommendation capability backed by the Anthropic Messages API.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use zenith_core::ProductId;

use crate::catalog::Catalog;
use crate::config::ClaudeConfig;

use super::error::{ApiErrorResponse, GatewayError};
use super::{RecommendationCapability, RecommendationRequest, RecommendationResponse};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 256;

/// Asks Claude for related product ids.
///
/// The system prompt lists every catalog product so the model answers with
/// ids that exist.
#[derive(Clone)]
pub struct ClaudeRecommender {
    inner: Arc<ClaudeRecommenderInner>,
}

struct ClaudeRecommenderInner {
    client: reqwest::Client,
    model: String,
    system: String,
}

impl ClaudeRecommender {
    /// Create a recommender for `catalog`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &ClaudeConfig, catalog: &Catalog) -> Result<Self, GatewayError> {
        let api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| GatewayError::InvalidApiKey(e.to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", api_key);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClaudeRecommenderInner {
                client,
                model: config.model.clone(),
                system: system_prompt(catalog),
            }),
        })
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<MessagesResponse, GatewayError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await.map_err(transport_error)?;
            serde_json::from_str(&body).map_err(|e| {
                GatewayError::MalformedOutput(format!("Failed to parse response: {e}"))
            })
        } else {
            Err(self.handle_error_status(status, response).await)
        }
    }

    async fn handle_error_status(
        &self,
        status: reqwest::StatusCode,
        response: reqwest::Response,
    ) -> GatewayError {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return GatewayError::RateLimited(retry_after);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return GatewayError::Unauthorized("Invalid API key".to_string());
        }

        match response.text().await {
            Ok(body) => match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_error) => GatewayError::Api {
                    error_type: api_error.error.error_type,
                    message: api_error.error.message,
                },
                Err(_) => GatewayError::Api {
                    error_type: status.to_string(),
                    message: body,
                },
            },
            Err(e) => transport_error(e),
        }
    }
}

#[async_trait]
impl RecommendationCapability for ClaudeRecommender {
    #[instrument(skip(self, request), fields(model = %self.inner.model))]
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> Result<RecommendationResponse, GatewayError> {
        let body = MessagesRequest {
            model: &self.inner.model,
            max_tokens: MAX_TOKENS,
            system: &self.inner.system,
            messages: vec![Message {
                role: "user",
                content: user_prompt(request),
            }],
        };

        let response = self
            .inner
            .client
            .post(ANTHROPIC_API_URL)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = self.handle_response(response).await?;
        let recommended_product_ids = parse_recommended_ids(&response.text())?;
        tracing::debug!(
            count = recommended_product_ids.len(),
            "Received recommendations"
        );

        Ok(RecommendationResponse {
            recommended_product_ids,
        })
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Http(e)
    }
}

fn system_prompt(catalog: &Catalog) -> String {
    let mut prompt = String::from(
        "You are a helpful shopping assistant. Given a list of product IDs, you will \
         respond with a list of recommended product IDs that the user might also be \
         interested in. Only recommend IDs from this catalog:\n",
    );
    for product in catalog.products() {
        let _ = writeln!(
            prompt,
            "- {}: {} ({}; tags: {})",
            product.id,
            product.name,
            product.category,
            product.tags.join(", ")
        );
    }
    prompt
}

fn user_prompt(request: &RecommendationRequest) -> String {
    let ids: Vec<&str> = request.product_ids.iter().map(ProductId::as_str).collect();
    format!(
        "Product IDs: {}\n\nReturn {} recommended product IDs. Do not repeat any of the \
         original product IDs in the recommendation. Respond with ONLY a JSON array of \
         product IDs.",
        ids.join(", "),
        request.number_of_recommendations
    )
}

/// Pull the recommended ids out of a model answer.
///
/// Accepts a bare JSON array or a `{"recommendedProductIds": [...]}` object,
/// optionally surrounded by prose or a code fence. Numeric ids are read as
/// their decimal text.
///
/// # Errors
///
/// Returns [`GatewayError::MalformedOutput`] if no id list can be found.
pub fn parse_recommended_ids(text: &str) -> Result<Vec<ProductId>, GatewayError> {
    let trimmed = text.trim();
    if let Ok(answer) = serde_json::from_str::<Answer>(trimmed) {
        return Ok(answer.into_ids());
    }

    let start = trimmed.find(['[', '{']);
    let end = trimmed.rfind([']', '}']);
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Answer>(&trimmed[start..=end])
                .map(Answer::into_ids)
                .map_err(|e| GatewayError::MalformedOutput(e.to_string()))
        }
        _ => Err(GatewayError::MalformedOutput(
            "no JSON array in answer".to_string(),
        )),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Answer {
    Ids(Vec<RawId>),
    Object {
        #[serde(rename = "recommendedProductIds")]
        recommended_product_ids: Vec<RawId>,
    },
}

impl Answer {
    fn into_ids(self) -> Vec<ProductId> {
        let raw = match self {
            Self::Ids(raw) => raw,
            Self::Object {
                recommended_product_ids,
            } => recommended_product_ids,
        };
        raw.into_iter().map(RawId::into_product_id).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn into_product_id(self) -> ProductId {
        match self {
            Self::Text(id) => ProductId::new(id),
            Self::Number(id) => ProductId::new(id.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

impl MessagesResponse {
    /// Concatenated text of every text block.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}
