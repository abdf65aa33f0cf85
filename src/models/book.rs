//! Book (catalog entry) model and copy accounting

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Book row as stored
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub author_id: i32,
    pub category_id: Option<i32>,
    pub publication_date: NaiveDate,
    pub total_copies: i32,
    pub available_copies: i32,
}

impl Book {
    /// Take one copy off the shelf.
    pub fn check_out(&mut self) -> AppResult<()> {
        if self.available_copies <= 0 {
            return Err(AppError::Unavailable(format!(
                "\"{}\" is not available for loan at the moment",
                self.title
            )));
        }
        self.available_copies -= 1;
        Ok(())
    }

    /// Put one copy back on the shelf, never above the total.
    pub fn check_in(&mut self) {
        if self.available_copies >= self.total_copies {
            tracing::warn!(
                "Book id={} already has all {} copies available, count left unchanged",
                self.id,
                self.total_copies
            );
            return;
        }
        self.available_copies += 1;
    }
}

/// Book with author and category names for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookDetails {
    pub id: i32,
    pub title: String,
    pub isbn: String,
    pub author_id: i32,
    pub author_name: String,
    pub category_id: Option<i32>,
    pub category_name: Option<String>,
    pub publication_date: NaiveDate,
    pub total_copies: i32,
    pub available_copies: i32,
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive title substring, matched literally
    pub title: Option<String>,
    pub author_id: Option<i32>,
    pub category_id: Option<i32>,
    /// Only books with at least one copy on the shelf
    pub available_only: Option<bool>,
}

/// Register book request. The author is referenced by name and created when missing.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 10, max = 17))]
    pub isbn: String,
    #[validate(length(min = 1, max = 200))]
    pub author_name: String,
    pub category_id: Option<i32>,
    pub publication_date: NaiveDate,
    #[validate(range(min = 0))]
    pub total_copies: i32,
    /// Defaults to `total_copies`
    #[validate(range(min = 0))]
    pub available_copies: Option<i32>,
}

impl CreateBook {
    /// Resolved (total, available) pair
    pub fn copies(&self) -> AppResult<(i32, i32)> {
        let available = self.available_copies.unwrap_or(self.total_copies);
        if available > self.total_copies {
            return Err(AppError::Validation(format!(
                "available_copies ({}) cannot exceed total_copies ({})",
                available, self.total_copies
            )));
        }
        Ok((self.total_copies, available))
    }
}

/// Strip separators from an ISBN and check its length
pub fn normalize_isbn(isbn: &str) -> AppResult<String> {
    let normalized: String = isbn
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let chars: Vec<char> = normalized.chars().collect();
    let well_formed = match chars.as_slice() {
        [body @ .., check] if chars.len() == 10 => {
            body.iter().all(char::is_ascii_digit) && (check.is_ascii_digit() || *check == 'X')
        }
        digits if digits.len() == 13 => digits.iter().all(char::is_ascii_digit),
        _ => false,
    };

    if well_formed {
        Ok(normalized)
    } else {
        Err(AppError::Validation(format!("Invalid ISBN: {}", isbn)))
    }
}
