pub mod auth;
pub mod client;
pub mod jwt;
pub mod member;
pub mod oauth;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body shared by the JSON extractors and the OAuth2 endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "invalid_request")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Missing required parameter: code")]
    pub error_description: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: Some(description.into()),
        }
    }
}
