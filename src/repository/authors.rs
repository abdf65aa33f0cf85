//! Authors repository for database operations

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::author::{Author, CreateAuthor},
};

use super::violated_constraint;

#[derive(Clone)]
pub struct AuthorsRepository {
    pool: Pool<Postgres>,
}

impl AuthorsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// List all authors ordered by name
    pub async fn list(&self) -> AppResult<Vec<Author>> {
        let authors = sqlx::query_as::<_, Author>("SELECT * FROM authors ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(authors)
    }

    /// Get author by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>("SELECT * FROM authors WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Author with id {} not found", id)))
    }

    /// Create a new author
    pub async fn create(&self, author: &CreateAuthor) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(
            "INSERT INTO authors (name, biography) VALUES ($1, $2) RETURNING *",
        )
        .bind(author.name.trim())
        .bind(author.biography.as_deref().unwrap_or_default())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some(_) => AppError::Conflict(format!("Author \"{}\" already exists", author.name.trim())),
            None => e.into(),
        })
    }

    /// Return the id of the author with this exact name, inserting it if new.
    pub async fn get_or_create(conn: &mut PgConnection, name: &str) -> AppResult<i32> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO authors (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(conn)
        .await?;
        Ok(id)
    }
}
