use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::utils::redirect::redirect_uri_allowed;

/// A third-party application allowed to request delegated access.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ClientApp {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret_hash: String,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ClientApp {
    pub fn new(
        owner_id: Uuid,
        client_id: String,
        client_secret_hash: String,
        name: String,
        redirect_uris: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            client_id,
            client_secret_hash,
            name,
            redirect_uris,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `uri` may receive authorization codes for this client.
    pub fn allows_redirect(&self, uri: &str) -> bool {
        redirect_uri_allowed(&self.redirect_uris, uri)
    }
}
