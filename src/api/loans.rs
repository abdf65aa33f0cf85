//! Loan management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{BorrowerLoans, Loan},
};

use super::AuthenticatedUser;

/// Checkout response
#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    /// The new loan
    pub loan: Loan,
    /// Copies of the book left on the shelf
    pub available_copies: i32,
    /// Status message
    pub message: String,
}

/// Return response
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    /// The closed loan
    pub loan: Loan,
    /// Copies of the book on the shelf after the return
    pub available_copies: i32,
    pub message: String,
}

/// Loans of the authenticated borrower
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Outstanding and returned loans", body = BorrowerLoans),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<BorrowerLoans>> {
    let loans = state.services.loans.get_borrower_loans(claims.borrower_id).await?;
    Ok(Json(loans))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/checkout",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 201, description = "Loan created", body = CheckoutResponse),
        (status = 404, description = "Book or borrower not found"),
        (status = 409, description = "Already borrowed or no copy available")
    )
)]
pub async fn checkout_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    let (loan, book) = state.services.loans.checkout(claims.borrower_id, book_id).await?;

    let message = format!(
        "\"{}\" borrowed successfully. Expected return date: {}",
        book.title,
        loan.due_at.format("%d/%m/%Y")
    );

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            loan,
            available_copies: book.available_copies,
            message,
        }),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let (loan, book) = state.services.loans.return_loan(claims.borrower_id, loan_id).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        message: format!("\"{}\" returned successfully", book.title),
        available_copies: book.available_copies,
        loan,
    }))
}
