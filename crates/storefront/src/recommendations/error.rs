//! Error types for the recommendation capability.

use thiserror::Error;

/// Errors that can occur while asking for recommendations.
///
/// None of these reach the shopper: the gateway logs them and shows no
/// recommendations instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not finish within the configured timeout.
    #[error("recommendation request timed out")]
    Timeout,

    /// The model API returned an error.
    #[error("API error ({error_type}): {message}")]
    Api {
        /// Error type from the API.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication failed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The answer did not contain a list of product ids.
    #[error("malformed recommendation output: {0}")]
    MalformedOutput(String),

    /// The API key cannot be sent as a header.
    #[error("invalid API key: {0}")]
    InvalidApiKey(String),
}

/// API error response body.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiError,
}

/// Nested error details.
#[derive(Debug, serde::Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}
