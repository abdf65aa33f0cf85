//! Borrowers repository

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::borrower::{Borrower, CreateBorrower},
};

use super::violated_constraint;

#[derive(Clone)]
pub struct BorrowersRepository {
    pool: Pool<Postgres>,
}

impl BorrowersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Borrower> {
        sqlx::query_as::<_, Borrower>("SELECT * FROM borrowers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrower with id {} not found", id)))
    }

    /// Register a new borrower
    pub async fn create(&self, borrower: &CreateBorrower) -> AppResult<Borrower> {
        let username = borrower.username.trim();

        sqlx::query_as::<_, Borrower>(
            r#"
            INSERT INTO borrowers (username, display_name, created_at)
            VALUES ($1, $2, NOW())
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(borrower.display_name.as_deref().unwrap_or(username))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some(_) => AppError::Conflict(format!("Username \"{}\" is already taken", username)),
            None => e.into(),
        })
    }

    pub async fn exists(conn: &mut PgConnection, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM borrowers WHERE id = $1)")
            .bind(id)
            .fetch_one(conn)
            .await?;
        Ok(exists)
    }
}
