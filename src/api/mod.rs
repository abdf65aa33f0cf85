//! API handlers for Biblioteca REST endpoints

pub mod authors;
pub mod books;
pub mod borrowers;
pub mod categories;
pub mod health;
pub mod loans;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::borrower::BorrowerClaims, AppState};

/// Extractor for the borrower identified by the bearer token
pub struct AuthenticatedUser(pub BorrowerClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = BorrowerClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books (catalog)
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book).delete(books::delete_book))
        .route("/books/:id/checkout", post(loans::checkout_book))
        // Loans
        .route("/loans", get(loans::get_my_loans))
        .route("/loans/:id/return", post(loans::return_loan))
        // Authors
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route("/authors/:id", get(authors::get_author))
        // Categories
        .route("/categories", get(categories::list_categories).post(categories::create_category))
        .route("/categories/:id", get(categories::get_category))
        // Borrowers
        .route("/borrowers", post(borrowers::create_borrower))
        .route("/borrowers/:id", get(borrowers::get_borrower))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
