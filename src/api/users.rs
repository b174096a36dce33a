use axum::{extract::State, Json};
use tracing::info;
use validator::Validate;

use super::auth::AuthenticatedUser;
use super::models::{CreateUserRequest, UserResponse};
use super::AppState;
use crate::error::{AppError, AppResult};

/// Register a user profile
/// POST /users
///
/// Profiles are provisioned by the identity collaborator when an account is
/// created; this service only stores what the marketplace needs (contact
/// details and, later, the payment account).
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<Json<UserResponse>> {
    request.validate()?;

    let user = state
        .ledger
        .create_user(&request.display_name, &request.email, request.phone)
        .await?;

    info!("User registered: {}", user.id);

    Ok(Json(user.into()))
}

/// Fetch the caller's own profile
/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    AuthenticatedUser(caller): AuthenticatedUser,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .ledger
        .get_user(caller)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", caller)))?;

    Ok(Json(user.into()))
}
