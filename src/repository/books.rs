//! Books repository for database operations

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookDetails, BookQuery, CreateBook},
};

use super::{authors::AuthorsRepository, categories::CategoriesRepository, violated_constraint};

const DETAILS_SELECT: &str = r#"
    SELECT b.id, b.title, b.isbn, b.author_id, a.name AS author_name,
           b.category_id, c.name AS category_name, b.publication_date,
           b.total_copies, b.available_copies
    FROM books b
    JOIN authors a ON a.id = b.author_id
    LEFT JOIN categories c ON c.id = b.category_id
"#;

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book with author and category names
    pub async fn get_details(&self, id: i32) -> AppResult<BookDetails> {
        let sql = format!("{} WHERE b.id = $1", DETAILS_SELECT);
        sqlx::query_as::<_, BookDetails>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// List books matching the filters, ordered by title
    pub async fn search(&self, query: &BookQuery) -> AppResult<Vec<BookDetails>> {
        let mut builder = QueryBuilder::<Postgres>::new(DETAILS_SELECT);
        builder.push(" WHERE 1=1");

        if let Some(ref title) = query.title {
            builder
                .push(" AND b.title ILIKE ")
                .push_bind(format!("%{}%", escape_like(title.trim())));
        }
        if let Some(author_id) = query.author_id {
            builder.push(" AND b.author_id = ").push_bind(author_id);
        }
        if let Some(category_id) = query.category_id {
            builder.push(" AND b.category_id = ").push_bind(category_id);
        }
        if query.available_only.unwrap_or(false) {
            builder.push(" AND b.available_copies > 0");
        }
        builder.push(" ORDER BY b.title, b.id");

        let books = builder
            .build_query_as::<BookDetails>()
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    /// Register a book. `book.isbn` must already be normalized.
    pub async fn create(&self, book: &CreateBook) -> AppResult<BookDetails> {
        let mut tx = self.pool.begin().await?;

        let author_id = AuthorsRepository::get_or_create(&mut tx, book.author_name.trim()).await?;

        if let Some(category_id) = book.category_id {
            if !CategoriesRepository::exists(&mut tx, category_id).await? {
                return Err(AppError::NotFound(format!(
                    "Category with id {} not found",
                    category_id
                )));
            }
        }

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO books (title, isbn, author_id, category_id, publication_date,
                               total_copies, available_copies)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(book.title.trim())
        .bind(&book.isbn)
        .bind(author_id)
        .bind(book.category_id)
        .bind(book.publication_date)
        .bind(book.total_copies)
        .bind(book.available_copies.unwrap_or(book.total_copies))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some("books_isbn_key") => {
                AppError::Conflict(format!("A book with ISBN {} already exists", book.isbn))
            }
            Some("books_copies_check") => AppError::Validation(
                "available_copies must be between 0 and total_copies".to_string(),
            ),
            _ => e.into(),
        })?;

        tx.commit().await?;

        self.get_details(id).await
    }

    /// Delete a book and its closed loans. Refused while any loan is outstanding.
    pub async fn delete(&self, id: i32) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        let outstanding: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND returned_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if outstanding > 0 {
            return Err(AppError::HasActiveLoans(format!(
                "\"{}\" cannot be removed while {} loan(s) are active",
                book.title, outstanding
            )));
        }

        sqlx::query("DELETE FROM loans WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(book)
    }
}

/// Escape `LIKE` metacharacters so the text matches literally
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
