use crate::domain::error::FieldErrors;
use crate::domain::recipe::{
    AttributeKind, AttributePatch, AttributeRequest, RecipeFilter, RecipePatch, RecipeRequest,
    RecipeSummary,
};
use crate::presentation::handlers::{ApiError, AppState};
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::stream;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

const IMAGE_FIELD: &str = "image";

#[derive(Debug, Deserialize)]
pub struct AttributeQuery {
    #[serde(default)]
    pub assigned_only: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecipeQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

// Tags and ingredients share these handlers; the scope supplies the kind.

#[instrument(skip(state, user), fields(user_id = user.0.id, kind = %*kind))]
pub async fn list_attributes(
    state: web::Data<AppState>,
    kind: web::Data<AttributeKind>,
    user: AuthenticatedUser,
    query: web::Query<AttributeQuery>,
) -> Result<HttpResponse, ApiError> {
    let rows = state
        .attributes(**kind)
        .list(user.0.id, query.assigned_only != 0)
        .await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id, kind = %*kind))]
pub async fn create_attribute(
    state: web::Data<AppState>,
    kind: web::Data<AttributeKind>,
    user: AuthenticatedUser,
    req: web::Json<AttributeRequest>,
) -> Result<HttpResponse, ApiError> {
    let attributes = state.attributes(**kind);
    let row = attributes.create(user.0.id, req.into_inner()).await?;
    if let Err(e) = state.users.authenticate(user.0.id).await {
        warn!(id = row.id, "Owner deleted during create, rolling back");
        if let Err(purged) = attributes.delete(user.0.id, row.id).await {
            debug!(error = %purged, "Row already purged");
        }
        return Err(e.into());
    }
    Ok(HttpResponse::Created().json(row))
}

#[instrument(skip(state, user), fields(user_id = user.0.id, kind = %*kind))]
pub async fn get_attribute(
    state: web::Data<AppState>,
    kind: web::Data<AttributeKind>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let row = state
        .attributes(**kind)
        .get(user.0.id, path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(row))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id, kind = %*kind))]
pub async fn replace_attribute(
    state: web::Data<AppState>,
    kind: web::Data<AttributeKind>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<AttributeRequest>,
) -> Result<HttpResponse, ApiError> {
    let patch = AttributePatch {
        name: Some(req.into_inner().name),
    };
    let row = state
        .attributes(**kind)
        .update(user.0.id, path.into_inner(), patch)
        .await?;
    Ok(HttpResponse::Ok().json(row))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id, kind = %*kind))]
pub async fn patch_attribute(
    state: web::Data<AppState>,
    kind: web::Data<AttributeKind>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<AttributePatch>,
) -> Result<HttpResponse, ApiError> {
    let row = state
        .attributes(**kind)
        .update(user.0.id, path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(row))
}

#[instrument(skip(state, user), fields(user_id = user.0.id, kind = %*kind))]
pub async fn delete_attribute(
    state: web::Data<AppState>,
    kind: web::Data<AttributeKind>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    state
        .attributes(**kind)
        .delete(user.0.id, path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[instrument(skip(state, user), fields(user_id = user.0.id))]
pub async fn list_recipes(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    query: web::Query<RecipeQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = RecipeFilter::from_query(query.tags.as_deref(), query.ingredients.as_deref())?;
    let recipes = state.recipes.list(user.0.id, &filter).await?;
    Ok(HttpResponse::Ok().json(recipes))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id))]
pub async fn create_recipe(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<RecipeRequest>,
) -> Result<HttpResponse, ApiError> {
    let recipe = state.recipes.create(user.0.id, req.into_inner()).await?;
    // A concurrent account deletion may have purged before this insert landed
    if let Err(e) = state.users.authenticate(user.0.id).await {
        warn!(recipe_id = recipe.id, "Owner deleted during create, rolling back");
        if let Err(purged) = state.recipes.delete(user.0.id, recipe.id).await {
            debug!(error = %purged, "Recipe already purged");
        }
        return Err(e.into());
    }
    info!(recipe_id = recipe.id, "Recipe created successfully");
    Ok(HttpResponse::Created().json(RecipeSummary::from(&recipe)))
}

#[instrument(skip(state, user), fields(user_id = user.0.id, recipe_id = %*path))]
pub async fn get_recipe(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    let detail = state.recipes.detail(user.0.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(detail))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id, recipe_id = %*path))]
pub async fn replace_recipe(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<RecipeRequest>,
) -> Result<HttpResponse, ApiError> {
    let patch = RecipePatch::from(req.into_inner());
    let recipe = state
        .recipes
        .update(user.0.id, path.into_inner(), patch)
        .await?;
    Ok(HttpResponse::Ok().json(RecipeSummary::from(&recipe)))
}

#[instrument(skip(state, user, req), fields(user_id = user.0.id, recipe_id = %*path))]
pub async fn patch_recipe(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: web::Json<RecipePatch>,
) -> Result<HttpResponse, ApiError> {
    let recipe = state
        .recipes
        .update(user.0.id, path.into_inner(), req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(RecipeSummary::from(&recipe)))
}

#[instrument(skip(state, user), fields(user_id = user.0.id, recipe_id = %*path))]
pub async fn delete_recipe(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
) -> Result<HttpResponse, ApiError> {
    state.recipes.delete(user.0.id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Accepts `multipart/form-data` with the file in the `image` field.
#[instrument(skip(state, user, req, body), fields(user_id = user.0.id, recipe_id = %*path, size = body.len()))]
pub async fn upload_image(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<u64>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, ApiError> {
    let recipe_id = path.into_inner();
    let data = read_image_field(&req, body).await?;
    let image = state
        .recipes
        .upload_image(user.0.id, recipe_id, data)
        .await?;
    Ok(HttpResponse::Ok().json(image))
}

async fn read_image_field(req: &HttpRequest, body: web::Bytes) -> Result<Vec<u8>, ApiError> {
    let image_error = |message: String| {
        let mut fields = FieldErrors::new();
        fields.insert(IMAGE_FIELD.to_string(), vec![message]);
        ApiError::Validation {
            message: "Invalid upload".to_string(),
            fields,
        }
    };

    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let boundary = multer::parse_boundary(content_type).map_err(|e| {
        warn!(error = %e, "Upload is not multipart");
        image_error("Expected a multipart/form-data upload.".to_string())
    })?;

    let body_stream = stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(body_stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| image_error(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let data = field.bytes().await.map_err(|e| image_error(e.to_string()))?;
        if data.is_empty() {
            break;
        }
        return Ok(data.to_vec());
    }

    Err(image_error("No file was submitted.".to_string()))
}
