use std::sync::Arc;
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use crate::api::controllers::statistics;
use crate::api::{AdminSession, ApiContext, ApiError, Catalog, Result};
use crate::client::ImageFilter;
use crate::entities::{Counter, Image, ImagePatch, NewImage};
use crate::utils::code_utils::is_valid_image_code;

const UPLOAD_FAILED: &str = "Failed to upload image";

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/api/images", get(list_images).post(create_image))
        .route("/api/images/:image_id", get(get_image).put(update_image).delete(delete_image))
        .route("/api/images/code/:code", get(get_image_by_code))
}

/// A parsed image upload. Parsing touches neither the store nor the disk.
pub(crate) struct ImageUpload {
    pub filename: String,
    pub data: Bytes,
    pub new_image: NewImage,
}

impl ImageUpload {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut file: Option<(String, Bytes)> = None;
        let mut title = None;
        let mut category_id = None;
        let mut subcategory_id = None;
        let mut price = None;

        while let Some(field) = multipart.next_field().await.map_err(ApiError::from_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(ApiError::from_multipart)?;
                    if !filename.is_empty() && !data.is_empty() {
                        file = Some((filename, data));
                    }
                }
                "title" => title = Some(field.text().await.map_err(ApiError::from_multipart)?),
                "categoryId" => category_id = Some(field.text().await.map_err(ApiError::from_multipart)?),
                "subcategoryId" => subcategory_id = Some(field.text().await.map_err(ApiError::from_multipart)?),
                "price" => price = Some(field.text().await.map_err(ApiError::from_multipart)?),
                _ => return Err(ApiError::bad_request(format!("Unexpected field: {}", name))),
            }
        }

        let (Some((filename, data)), Some(title), Some(category_id)) = (file, title, category_id) else {
            return Err(ApiError::bad_request("Missing required fields"));
        };
        let price = parse_price(price.as_deref())?;
        let new_image = NewImage::new(&title, &category_id, subcategory_id.as_deref(), price)
            .map_err(ApiError::from_catalog(UPLOAD_FAILED))?;
        Ok(Self { filename, data, new_image })
    }
}

fn parse_price(price: Option<&str>) -> Result<Option<f64>> {
    match price.map(str::trim).filter(|x| !x.is_empty()) {
        None => Ok(None),
        Some(price) => price.parse::<f64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request("Invalid price")),
    }
}

/// Validates the references, writes the file, then persists the record. When
/// the record cannot be persisted the written file is removed again.
pub(crate) async fn store_image(ctx: &ApiContext, upload: ImageUpload) -> Result<Image> {
    {
        let db = ctx.db.read().await;
        db.ensure_connected().map_err(ApiError::from_catalog(UPLOAD_FAILED))?;
        db.validate_image_references(&upload.new_image.category_id, upload.new_image.subcategory_id.as_deref())
            .map_err(ApiError::from_catalog(UPLOAD_FAILED))?;
    }

    let asset = ctx.assets.save_image(&upload.data, &upload.filename).await
        .map_err(ApiError::internal(UPLOAD_FAILED))?;

    let mut db = ctx.db.write().await;
    match db.create_image(upload.new_image, asset.url.clone()).await {
        Ok(image) => {
            info!(id = %image.id, code = %image.code, url = %image.url, "image uploaded");
            Ok(image)
        }
        Err(err) => {
            error!(error = ?err, path = %asset.path.display(), "image record not persisted, removing uploaded file");
            if let Err(cleanup_err) = ctx.assets.remove(&asset.url).await {
                warn!(error = ?cleanup_err, path = %asset.path.display(), "failed to remove orphaned upload");
            }
            Err(ApiError::from_catalog(UPLOAD_FAILED)(err))
        }
    }
}

async fn list_images(
    State(db): State<Arc<RwLock<Catalog>>>,
    filter: std::result::Result<Query<ImageFilter>, QueryRejection>,
) -> Result<Json<Vec<Image>>> {
    let Query(filter) = filter?;
    let db = db.read().await;
    db.ensure_connected().map_err(ApiError::from_catalog("Failed to fetch images"))?;
    Ok(Json(db.find_images(&filter)))
}

async fn create_image(
    _admin: AdminSession,
    State(ctx): State<ApiContext>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Image>)> {
    let upload = ImageUpload::from_multipart(multipart?).await?;
    let image = store_image(&ctx, upload).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn get_image(
    State(ctx): State<ApiContext>,
    Path(image_id): Path<String>,
) -> Result<Json<Image>> {
    let image = ctx.db.read().await
        .get_image_by_id(&image_id)
        .ok_or(ApiError::NotFound)?;
    statistics::count(&ctx, Counter::ImageViews);
    Ok(Json(image))
}

/// Looks an image up by its shareable code. Codes are matched case-insensitively.
async fn get_image_by_code(
    State(ctx): State<ApiContext>,
    Path(code): Path<String>,
) -> Result<Json<Image>> {
    let code = code.trim().to_ascii_uppercase();
    if !is_valid_image_code(&code) {
        return Err(ApiError::NotFound);
    }
    let image = ctx.db.read().await
        .get_image_by_code(&code)
        .ok_or(ApiError::NotFound)?;
    statistics::count(&ctx, Counter::ImageViews);
    Ok(Json(image))
}

async fn update_image(
    _admin: AdminSession,
    State(db): State<Arc<RwLock<Catalog>>>,
    Path(image_id): Path<String>,
    patch: std::result::Result<Json<ImagePatch>, JsonRejection>,
) -> Result<Json<Image>> {
    let Json(patch) = patch?;
    let image = db.write().await
        .update_image(&image_id, patch).await
        .map_err(ApiError::from_catalog("Failed to update image"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(image))
}

async fn delete_image(
    _admin: AdminSession,
    State(ctx): State<ApiContext>,
    Path(image_id): Path<String>,
) -> Result<Json<Image>> {
    let image = remove_image(&ctx, &image_id).await?;
    Ok(Json(image))
}

/// Deletes the record, then its file. A file that is already gone is only logged.
pub(crate) async fn remove_image(ctx: &ApiContext, image_id: &str) -> Result<Image> {
    let image = ctx.db.write().await
        .delete_image(image_id).await
        .map_err(ApiError::from_catalog("Failed to delete image"))?
        .ok_or(ApiError::NotFound)?;
    if let Err(err) = ctx.assets.remove(&image.url).await {
        warn!(error = ?err, url = %image.url, "failed to remove image file");
    }
    info!(id = %image.id, "image deleted");
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_parsing() {
        assert_eq!(parse_price(None).unwrap(), None);
        assert_eq!(parse_price(Some("  ")).unwrap(), None);
        assert_eq!(parse_price(Some("12.50")).unwrap(), Some(12.5));
        assert!(matches!(parse_price(Some("cheap")), Err(ApiError::BadRequest(msg)) if msg == "Invalid price"));
    }
}
