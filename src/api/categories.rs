//! Category endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::category::{Category, CreateCategory},
};

use super::AuthenticatedUser;

#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    responses(
        (status = 200, description = "Categories ordered by name", body = Vec<Category>)
    )
)]
pub async fn list_categories(State(state): State<crate::AppState>) -> AppResult<Json<Vec<Category>>> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(categories))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    State(state): State<crate::AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Category>> {
    let category = state.services.catalog.get_category(id).await?;
    Ok(Json(category))
}

/// Create a category
#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_category(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(category): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    claims.require_librarian()?;

    let created = state.services.catalog.create_category(category).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
