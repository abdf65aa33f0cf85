//! OpenAPI documentation

use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{authors, books, borrowers, categories, health, loans};

/// Registers the `bearer_auth` scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Biblioteca API",
        version = "0.1.0",
        description = "Library loan tracking REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::delete_book,
        // Loans
        loans::checkout_book,
        loans::return_loan,
        loans::get_my_loans,
        // Authors
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        // Categories
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        // Borrowers
        borrowers::get_borrower,
        borrowers::create_borrower,
    ),
    components(
        schemas(
            // Catalog
            crate::models::book::BookDetails,
            crate::models::book::BookQuery,
            crate::models::book::CreateBook,
            crate::models::author::Author,
            crate::models::author::CreateAuthor,
            crate::models::category::Category,
            crate::models::category::CreateCategory,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanDetails,
            crate::models::loan::BorrowerLoans,
            loans::CheckoutResponse,
            loans::ReturnResponse,
            // Borrowers
            crate::models::borrower::Borrower,
            crate::models::borrower::CreateBorrower,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Book catalog"),
        (name = "loans", description = "Checkout and return"),
        (name = "authors", description = "Authors"),
        (name = "categories", description = "Categories"),
        (name = "borrowers", description = "Borrower registry")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_loan_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/books/{id}/checkout"));
        assert!(doc.paths.paths.contains_key("/loans/{id}/return"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }
}
