use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use bytes::BytesMut;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{FilterQuery, ImageUploadResponse, ProductInput, SearchQuery},
    repo_types::{Product, ProductFilter},
};
use crate::{
    auth::extractors::AuthUser,
    error::{ApiError, ApiJson, ApiQuery},
    images::services::{
        check_content_type, public_base_url, store_image, UploadItem, MAX_IMAGE_BYTES,
    },
    state::AppState,
};

// Leaves headroom over the image limit so oversize files get a 400 from the
// handler instead of a 413 from the body limit.
const UPLOAD_BODY_LIMIT: usize = 8 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/filter", get(filter_products))
        .route("/products/search", get(search_products))
        .route("/products/:id", get(get_product))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
        .route(
            "/products/upload-image",
            post(upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
}

/// Ids that do not parse are reported exactly like ids owned by someone else.
fn product_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("Product"))
}

#[instrument(skip(state, identity))]
pub async fn list_products(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products = state
        .products
        .list(identity.user_id, &ProductFilter::default())
        .await
        .map_err(|e| state.internal(e))?;
    Ok(Json(products))
}

#[instrument(skip(state, identity))]
pub async fn get_product(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id = product_id(&id)?;
    match state.products.get(identity.user_id, id).await {
        Ok(Some(p)) => Ok(Json(p)),
        Ok(None) => {
            warn!(user_id = %identity.user_id, %id, "product not found");
            Err(ApiError::NotFound("Product"))
        }
        Err(e) => Err(state.internal(e)),
    }
}

#[instrument(skip(state, identity, payload))]
pub async fn create_product(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiJson(payload): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let new = payload.into_new()?;
    let product = state
        .products
        .create(identity.user_id, new)
        .await
        .map_err(|e| state.internal(e))?;

    info!(user_id = %identity.user_id, product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip(state, identity, payload))]
pub async fn update_product(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<ProductInput>,
) -> Result<Json<Product>, ApiError> {
    let id = product_id(&id)?;
    let patch = payload.into_patch()?;
    let updated = state
        .products
        .update(identity.user_id, id, patch)
        .await
        .map_err(|e| state.internal(e))?
        .ok_or_else(|| {
            warn!(user_id = %identity.user_id, %id, "update of unknown product");
            ApiError::NotFound("Product")
        })?;

    info!(user_id = %identity.user_id, product_id = %id, "product updated");
    Ok(Json(updated))
}

#[instrument(skip(state, identity))]
pub async fn delete_product(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = product_id(&id)?;
    let deleted = state
        .products
        .delete(identity.user_id, id)
        .await
        .map_err(|e| state.internal(e))?;
    if !deleted {
        warn!(user_id = %identity.user_id, %id, "delete of unknown product");
        return Err(ApiError::NotFound("Product"));
    }

    info!(user_id = %identity.user_id, product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, identity))]
pub async fn filter_products(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiQuery(query): ApiQuery<FilterQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let filter = query.into_filter()?;
    let products = state
        .products
        .list(identity.user_id, &filter)
        .await
        .map_err(|e| state.internal(e))?;
    Ok(Json(products))
}

#[instrument(skip(state, identity))]
pub async fn search_products(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let q = query.into_query()?;
    let products = state
        .products
        .search(identity.user_id, &q)
        .await
        .map_err(|e| state.internal(e))?;
    Ok(Json(products))
}

/// POST /products/upload-image (multipart, field `image`)
#[instrument(skip(state, identity, headers, multipart))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ImageUploadResponse>, ApiError> {
    let mut mp = multipart.map_err(|e| {
        warn!(error = %e, "upload without multipart body");
        ApiError::invalid_message("No file uploaded")
    })?;

    while let Some(mut field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::invalid_message(format!("Malformed upload: {}", e.body_text())))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let file_name = field.file_name().map(str::to_string);
        check_content_type(&content_type)?;

        let mut body = BytesMut::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::invalid_message(format!("Malformed upload: {}", e.body_text())))?
        {
            if body.len() + chunk.len() > MAX_IMAGE_BYTES {
                warn!(user_id = %identity.user_id, "image over size limit");
                return Err(ApiError::invalid_message("File too large. Maximum size is 5MB."));
            }
            body.extend_from_slice(&chunk);
        }

        let base_url = public_base_url(&headers);
        let image_url = store_image(
            &state,
            &base_url,
            UploadItem {
                body: body.freeze(),
                content_type: &content_type,
                file_name: file_name.as_deref(),
            },
        )
        .await?;

        info!(user_id = %identity.user_id, %image_url, "image uploaded");
        return Ok(Json(ImageUploadResponse { image_url }));
    }

    Err(ApiError::invalid_message("No file uploaded"))
}
