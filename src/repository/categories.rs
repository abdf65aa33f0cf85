//! Categories repository

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::category::{Category, CreateCategory},
};

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: Pool<Postgres>,
}

impl CategoriesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name, id")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category with id {} not found", id)))
    }

    pub async fn create(&self, category: &CreateCategory) -> AppResult<Category> {
        let created = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(category.name.trim())
        .bind(category.description.as_deref().unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Check that a category exists, on the caller's connection
    pub async fn exists(conn: &mut PgConnection, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
            .bind(id)
            .fetch_one(conn)
            .await?;
        Ok(exists)
    }
}
