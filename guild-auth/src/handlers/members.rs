use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::member::{MembersQuery, MembersResponse};
use crate::dtos::ErrorResponse;
use crate::middleware::SessionUser;
use crate::AppState;

/// Guild member directory for signed-in members
#[utoipa::path(
    get,
    path = "/api/members",
    params(MembersQuery),
    responses(
        (status = 200, description = "One page of members", body = MembersResponse),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "User"
)]
pub async fn list_members(
    State(state): State<AppState>,
    _user: SessionUser,
    Query(query): Query<MembersQuery>,
) -> Result<Json<MembersResponse>, AppError> {
    let (limit, offset) = (query.limit(), query.offset());
    let members = state.member_service.list(limit, offset).await?;
    Ok(Json(MembersResponse::page(members, limit, offset)))
}
