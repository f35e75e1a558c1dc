use crate::domain::user::{CreateUserRequest, TokenRequest, UpdateUserRequest, User};
use crate::presentation::handlers::{ApiError, AppState};
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn create_user(
    state: web::Data<AppState>,
    req: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    info!("Registration request received");

    let user = state
        .users
        .register(req.into_inner())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to register user");
            ApiError::from(e)
        })?;

    info!(user_id = user.id, "User registered successfully");
    Ok(HttpResponse::Created().json(UserResponse::from(&user)))
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn create_token(
    state: web::Data<AppState>,
    req: web::Json<TokenRequest>,
) -> Result<HttpResponse, ApiError> {
    info!("Token request received");
    let token = state.users.issue_token(req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TokenResponse { token }))
}

#[instrument(skip(user), fields(user_id = user.0.id))]
pub async fn get_me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(&user.0))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id))]
pub async fn replace_me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let changes = UpdateUserRequest::from(req.into_inner());
    let updated = state.users.update_profile(&user.0, changes).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&updated)))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id))]
pub async fn patch_me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let updated = state.users.update_profile(&user.0, req.into_inner()).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(&updated)))
}

/// Deletes the account together with everything it owns.
#[instrument(skip(state, user), fields(user_id = user.0.id))]
pub async fn delete_me(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let user_id = user.0.id;
    // Account first, so no new rows can be attached to it while purging
    state.users.delete_user(user_id).await?;
    let recipes = state.recipes.purge_owner(user_id).await?;
    let tags = state.tags.purge_owner(user_id).await?;
    let ingredients = state.ingredients.purge_owner(user_id).await?;

    info!(recipes, tags, ingredients, "Account and owned data deleted");
    Ok(HttpResponse::NoContent().finish())
}
