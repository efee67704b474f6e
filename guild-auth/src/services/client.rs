//! Client registry: third-party OAuth2 applications, their redirect
//! allow-lists and secrets.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::ClientApp;
use crate::services::ServiceError;
use crate::store::{ClientStore, CredentialStore, StoreError};
use crate::utils::redirect::is_registrable_redirect_uri;
use crate::utils::{hash_client_secret, verify_client_secret, ClientSecret, ClientSecretHash};

#[derive(Debug, Clone)]
pub struct NewClient {
    pub owner_id: Uuid,
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub name: String,
    pub redirect_uris: Vec<String>,
}

/// Partial update; empty values leave the stored field untouched.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub client_secret: Option<ClientSecret>,
    pub name: Option<String>,
    pub redirect_uris: Option<Vec<String>>,
}

#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn CredentialStore>,
}

impl ClientService {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip_all, fields(client_id = %new.client_id, owner_id = %new.owner_id))]
    pub async fn register(&self, new: NewClient) -> Result<ClientApp, ServiceError> {
        if new.client_id.trim().is_empty() {
            return Err(invalid("client_id is required"));
        }
        if new.client_secret.is_empty() {
            return Err(invalid("client_secret is required"));
        }
        if new.name.trim().is_empty() {
            return Err(invalid("name is required"));
        }
        validate_redirect_uris(&new.redirect_uris)?;

        if self
            .store
            .find_client_by_client_id(&new.client_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::ClientIdAlreadyExists);
        }

        let hash = hash_client_secret(&new.client_secret)?;
        let client = ClientApp::new(
            new.owner_id,
            new.client_id,
            hash.into_string(),
            new.name.trim().to_string(),
            new.redirect_uris,
        );

        match self.store.create_client(&client).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(ServiceError::ClientIdAlreadyExists),
            Err(e) => return Err(e.into()),
        }

        tracing::info!("Client registered");
        Ok(client)
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        client_id: &str,
        update: ClientUpdate,
    ) -> Result<ClientApp, ServiceError> {
        let mut client = self.get(client_id).await?;

        if let Some(secret) = update.client_secret.filter(|s| !s.is_empty()) {
            client.client_secret_hash = hash_client_secret(&secret)?.into_string();
            tracing::info!("Client secret rotated");
        }
        if let Some(name) = update.name.filter(|n| !n.trim().is_empty()) {
            client.name = name.trim().to_string();
        }
        if let Some(uris) = update.redirect_uris.filter(|u| !u.is_empty()) {
            validate_redirect_uris(&uris)?;
            client.redirect_uris = uris;
        }
        client.updated_at = Utc::now();

        match self.store.update_client(&client).await {
            Ok(()) => Ok(client),
            Err(StoreError::NotFound(_)) => Err(ServiceError::ClientNotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, client_id: &str) -> Result<ClientApp, ServiceError> {
        self.store
            .find_client_by_client_id(client_id)
            .await?
            .ok_or(ServiceError::ClientNotFound)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<ClientApp, ServiceError> {
        match self.store.get_client(id).await {
            Ok(client) => Ok(client),
            Err(StoreError::NotFound(_)) => Err(ServiceError::ClientNotFound),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<ClientApp>, ServiceError> {
        Ok(self.store.list_clients_by_owner(owner_id).await?)
    }

    pub async fn delete(&self, client_id: &str) -> Result<(), ServiceError> {
        match self.store.delete_client(client_id).await {
            Ok(()) => {
                tracing::info!(client_id, "Client deleted");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => Err(ServiceError::ClientNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Membership test against the client's registered redirect URIs.
    pub async fn validate_redirect_uri(
        &self,
        client_id: &str,
        uri: &str,
    ) -> Result<bool, ServiceError> {
        Ok(self.get(client_id).await?.allows_redirect(uri))
    }

    /// Check client credentials; the hash comparison is constant-time.
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: &ClientSecret,
    ) -> Result<ClientApp, ServiceError> {
        let client = self
            .store
            .find_client_by_client_id(client_id)
            .await?
            .ok_or(ServiceError::InvalidClient)?;

        let hash = ClientSecretHash::new(client.client_secret_hash.clone());
        if !verify_client_secret(client_secret, &hash)? {
            tracing::warn!(client_id, "Client authentication failed");
            return Err(ServiceError::InvalidClientSecret);
        }

        Ok(client)
    }
}

fn invalid(msg: &str) -> ServiceError {
    ServiceError::InvalidClientRegistration(msg.to_string())
}

fn validate_redirect_uris(uris: &[String]) -> Result<(), ServiceError> {
    if uris.is_empty() {
        return Err(invalid("at least one redirect_uri is required"));
    }
    if let Some(bad) = uris.iter().find(|u| !is_registrable_redirect_uri(u)) {
        return Err(ServiceError::InvalidClientRegistration(format!(
            "redirect_uri must be an absolute https URL (http allowed for localhost): {}",
            bad
        )));
    }
    Ok(())
}
