use std::sync::Arc;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::RwLock;
use tracing::info;
use crate::api::{AdminSession, ApiContext, ApiError, Catalog, Result};
use crate::client::CategoryFilter;
use crate::entities::{Category, CategoryPatch, CategoryView, NewCategory};

pub fn router() -> Router<ApiContext> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/categories/:category_id", get(get_category).put(update_category).delete(delete_category))
}

async fn list_categories(
    State(db): State<Arc<RwLock<Catalog>>>,
    filter: std::result::Result<Query<CategoryFilter>, QueryRejection>,
) -> Result<Json<Vec<CategoryView>>> {
    let Query(filter) = filter?;
    let db = db.read().await;
    db.ensure_connected().map_err(ApiError::from_catalog("Failed to fetch categories"))?;
    Ok(Json(db.list_categories(&filter)))
}

async fn get_category(
    State(db): State<Arc<RwLock<Catalog>>>,
    Path(category_id): Path<String>,
) -> Result<Json<CategoryView>> {
    let category = db.read().await
        .get_category_by_id(&category_id)
        .ok_or(ApiError::NotFound)?;
    Ok(Json(category))
}

async fn create_category(
    _admin: AdminSession,
    State(db): State<Arc<RwLock<Catalog>>>,
    payload: std::result::Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>)> {
    let Json(new_category) = payload?;
    let category = db.write().await
        .create_category(new_category).await
        .map_err(ApiError::from_catalog("Failed to create category"))?;
    info!(id = %category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    _admin: AdminSession,
    State(db): State<Arc<RwLock<Catalog>>>,
    Path(category_id): Path<String>,
    patch: std::result::Result<Json<CategoryPatch>, JsonRejection>,
) -> Result<Json<Category>> {
    let Json(patch) = patch?;
    let category = db.write().await
        .update_category(&category_id, patch).await
        .map_err(ApiError::from_catalog("Failed to update category"))?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(category))
}

async fn delete_category(
    _admin: AdminSession,
    State(db): State<Arc<RwLock<Catalog>>>,
    Path(category_id): Path<String>,
) -> Result<Json<Category>> {
    let category = db.write().await
        .delete_category(&category_id).await
        .map_err(ApiError::from_catalog("Failed to delete category"))?
        .ok_or(ApiError::NotFound)?;
    info!(id = %category.id, "category deleted");
    Ok(Json(category))
}
