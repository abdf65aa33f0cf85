//! Borrower registry endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrower::{Borrower, CreateBorrower},
};

use super::AuthenticatedUser;

/// Get borrower by ID
#[utoipa::path(
    get,
    path = "/borrowers/{id}",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrower ID")
    ),
    responses(
        (status = 200, description = "Borrower", body = Borrower),
        (status = 403, description = "Not the borrower nor a librarian"),
        (status = 404, description = "Borrower not found")
    )
)]
pub async fn get_borrower(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Borrower>> {
    if claims.borrower_id != id {
        claims.require_librarian()?;
    }

    let borrower = state.services.borrowers.get_borrower(id).await?;
    Ok(Json(borrower))
}

/// Register a borrower
#[utoipa::path(
    post,
    path = "/borrowers",
    tag = "borrowers",
    security(("bearer_auth" = [])),
    request_body = CreateBorrower,
    responses(
        (status = 201, description = "Borrower registered", body = Borrower),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn create_borrower(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(borrower): Json<CreateBorrower>,
) -> AppResult<(StatusCode, Json<Borrower>)> {
    claims.require_librarian()?;

    let created = state.services.borrowers.create_borrower(borrower).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
