use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::ClientApp;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Club Dashboard")]
    pub name: String,

    #[validate(length(min = 1, max = 10, message = "Between 1 and 10 redirect URIs are required"))]
    #[schema(example = json!(["https://dashboard.example.com/callback"]))]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateClientRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 10, message = "Between 1 and 10 redirect URIs are required"))]
    pub redirect_uris: Option<Vec<String>>,

    /// Issue a fresh secret; the old one stops working immediately
    #[serde(default)]
    pub rotate_secret: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientResponse {
    pub client_id: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ClientApp> for ClientResponse {
    fn from(client: ClientApp) -> Self {
        Self {
            client_id: client.client_id,
            name: client.name,
            redirect_uris: client.redirect_uris,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

/// Client plus, on creation and rotation only, the plaintext secret.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClientWithSecretResponse {
    #[serde(flatten)]
    pub client: ClientResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClientListResponse {
    pub clients: Vec<ClientResponse>,
}
