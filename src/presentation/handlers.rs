use crate::application::attribute_service::AttributeService;
use crate::application::recipe_service::RecipeService;
use crate::application::user_service::UserService;
use crate::data::attribute_repository::InMemoryAttributeRepository;
use crate::data::recipe_repository::InMemoryRecipeRepository;
use crate::data::user_repository::InMemoryUserRepository;
use crate::domain::error::{DomainError, FieldErrors};
use crate::domain::recipe::AttributeKind;
use crate::infrastructure::config::Config;
use crate::infrastructure::storage::MediaStorage;
use crate::presentation::middleware::{AuthenticatedUser, RejectedCredentials, TokenSubject};
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError, web};
use chrono::Utc;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub type Users = UserService<InMemoryUserRepository>;
pub type Attributes = AttributeService<InMemoryAttributeRepository, InMemoryRecipeRepository>;
pub type Recipes = RecipeService<InMemoryRecipeRepository, InMemoryAttributeRepository>;

pub struct AppState {
    pub users: Users,
    pub tags: Attributes,
    pub ingredients: Attributes,
    pub recipes: Recipes,
}

impl AppState {
    pub fn in_memory(config: &Config) -> Self {
        let user_repository = Arc::new(InMemoryUserRepository::new());
        let recipe_repository = Arc::new(InMemoryRecipeRepository::new());
        let tag_repository = Arc::new(InMemoryAttributeRepository::new(AttributeKind::Tag));
        let ingredient_repository =
            Arc::new(InMemoryAttributeRepository::new(AttributeKind::Ingredient));
        let storage = MediaStorage::new(config.media_root.clone(), config.media_url.clone());

        Self {
            users: UserService::new(
                user_repository,
                config.jwt_secret.clone(),
                config.token_ttl_secs,
            ),
            tags: AttributeService::new(tag_repository.clone(), recipe_repository.clone()),
            ingredients: AttributeService::new(
                ingredient_repository.clone(),
                recipe_repository.clone(),
            ),
            recipes: RecipeService::new(
                recipe_repository,
                tag_repository,
                ingredient_repository,
                storage,
            ),
        }
    }

    pub fn attributes(&self, kind: AttributeKind) -> &Attributes {
        match kind {
            AttributeKind::Tag => &self.tags,
            AttributeKind::Ingredient => &self.ingredients,
        }
    }
}

// Uniform error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {message}")]
    Validation { message: String, fields: FieldErrors },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            fields: FieldErrors::new(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        let details = match self {
            ApiError::Validation { fields, .. } if !fields.is_empty() => {
                serde_json::json!(fields)
            }
            ApiError::Validation { message, .. } => serde_json::json!({ "message": message }),
            ApiError::NotFound(msg) | ApiError::Unauthorized(msg) => {
                serde_json::json!({ "message": msg })
            }
            // Internal details stay in the logs
            ApiError::Internal(_) => serde_json::json!({ "message": "Internal server error" }),
        };

        match self {
            ApiError::Validation { .. } => {
                warn!(error = %error_msg, status = %status, "Validation error")
            }
            ApiError::NotFound(_) => {
                warn!(error = %error_msg, status = %status, "Resource not found")
            }
            ApiError::Unauthorized(_) => {
                warn!(error = %error_msg, status = %status, "Unauthorized")
            }
            ApiError::Internal(_) => {
                error!(error = %error_msg, status = %status, "Internal error")
            }
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: error_msg,
            details,
        })
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ApiError::validation(msg),
            DomainError::Fields(fields) => ApiError::Validation {
                message: "Invalid input".to_string(),
                fields,
            },
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            DomainError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            DomainError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DomainError>() {
            Ok(domain) => ApiError::from(domain),
            Err(other) => ApiError::Internal(format!("{:#}", other)),
        }
    }
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::validation(err.to_string()).into()
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ApiError::validation(err.to_string()).into()
}

// Resolves the token subject attached by JwtAuthMiddleware to a live account
impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let subject = req.extensions().get::<TokenSubject>().copied();
        let rejected = req.extensions().get::<RejectedCredentials>().copied();
        let state = req.app_data::<web::Data<AppState>>().cloned();
        Box::pin(async move {
            let subject = subject.ok_or_else(|| {
                let reason = rejected
                    .map(|r| r.0)
                    .unwrap_or("Authentication credentials were not provided.");
                ApiError::Unauthorized(reason.to_string())
            })?;
            let state = state
                .ok_or_else(|| ApiError::Internal("Application state missing".to_string()))?;
            let user = state.users.authenticate(subject.user_id).await?;
            Ok(AuthenticatedUser(user))
        })
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[instrument]
pub async fn health_check() -> HttpResponse {
    info!("Health check requested");
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}
