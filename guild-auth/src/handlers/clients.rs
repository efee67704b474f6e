//! Self-service client registration, scoped to the signed-in owner.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::client::{
    ClientListResponse, ClientResponse, ClientWithSecretResponse, CreateClientRequest,
    UpdateClientRequest,
};
use crate::dtos::ErrorResponse;
use crate::middleware::SessionUser;
use crate::models::{ClientApp, User};
use crate::services::{ClientUpdate, NewClient, ServiceError};
use crate::utils::{generate_client_id, generate_secure_token, ClientSecret, ValidatedJson};
use crate::AppState;

/// Load a client the caller owns. Foreign clients look missing.
async fn owned_client(state: &AppState, owner: &User, client_id: &str) -> Result<ClientApp, ServiceError> {
    let client = state.client_service.get(client_id).await?;
    if client.owner_id != owner.id {
        return Err(ServiceError::ClientNotFound);
    }
    Ok(client)
}

/// Register a new OAuth2 client
#[utoipa::path(
    post,
    path = "/api/clients",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created; the secret is only shown now", body = ClientWithSecretResponse),
        (status = 400, description = "Invalid redirect URI", body = ErrorResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Clients"
)]
#[tracing::instrument(skip_all, fields(owner_id = %user.id))]
pub async fn create_client(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    ValidatedJson(req): ValidatedJson<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientWithSecretResponse>), AppError> {
    let secret = generate_secure_token();
    let client = state
        .client_service
        .register(NewClient {
            owner_id: user.id,
            client_id: generate_client_id(),
            client_secret: ClientSecret::new(secret.clone()),
            name: req.name,
            redirect_uris: req.redirect_uris,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ClientWithSecretResponse {
            client: client.into(),
            client_secret: Some(secret),
        }),
    ))
}

/// Clients owned by the signed-in member
#[utoipa::path(
    get,
    path = "/api/clients",
    responses(
        (status = 200, description = "Owned clients", body = ClientListResponse),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "Clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> Result<Json<ClientListResponse>, AppError> {
    let clients = state.client_service.list_for_owner(user.id).await?;
    Ok(Json(ClientListResponse {
        clients: clients.into_iter().map(ClientResponse::from).collect(),
    }))
}

/// Partially update a client, optionally rotating its secret
#[utoipa::path(
    patch,
    path = "/api/clients/{client_id}",
    params(("client_id" = String, Path, description = "Client ID")),
    request_body = UpdateClientRequest,
    responses(
        (status = 200, description = "Updated client; includes the new secret when rotated", body = ClientWithSecretResponse),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Clients"
)]
#[tracing::instrument(skip(state, user, req))]
pub async fn update_client(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(client_id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateClientRequest>,
) -> Result<Json<ClientWithSecretResponse>, AppError> {
    owned_client(&state, &user, &client_id).await?;

    let new_secret = req.rotate_secret.then(generate_secure_token);
    let client = state
        .client_service
        .update(
            &client_id,
            ClientUpdate {
                client_secret: new_secret.clone().map(ClientSecret::new),
                name: req.name,
                redirect_uris: req.redirect_uris,
            },
        )
        .await?;

    Ok(Json(ClientWithSecretResponse {
        client: client.into(),
        client_secret: new_secret,
    }))
}

/// Delete a client and everything issued to it
#[utoipa::path(
    delete,
    path = "/api/clients/{client_id}",
    params(("client_id" = String, Path, description = "Client ID")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 404, description = "Client not found", body = ErrorResponse)
    ),
    tag = "Clients"
)]
#[tracing::instrument(skip(state, user))]
pub async fn delete_client(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Path(client_id): Path<String>,
) -> Result<StatusCode, AppError> {
    owned_client(&state, &user, &client_id).await?;
    state.client_service.delete(&client_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
