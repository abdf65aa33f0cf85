//! Borrower model and identity claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// Registered user who may hold loans
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Borrower {
    pub id: i32,
    pub username: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Register borrower request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBorrower {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(max = 200))]
    pub display_name: Option<String>,
}

/// Role carried by the bearer token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Borrower,
    Librarian,
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BorrowerClaims {
    pub sub: String,
    pub borrower_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl BorrowerClaims {
    /// Claims valid for `hours` from now
    pub fn new(username: &str, borrower_id: i32, role: Role, hours: i64) -> Self {
        let now = Utc::now();
        Self {
            sub: username.to_string(),
            borrower_id,
            role,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::hours(hours)).timestamp(),
        }
    }

    /// Sign the claims into a JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.role == Role::Librarian {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian privileges required".to_string()))
        }
    }
}
