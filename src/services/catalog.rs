//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::{Author, CreateAuthor},
        book::{normalize_isbn, BookDetails, BookQuery, CreateBook},
        category::{Category, CreateCategory},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with filters
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<Vec<BookDetails>> {
        self.repository.books.search(query).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        self.repository.books.get_details(id).await
    }

    /// Register a book, creating its author by name when needed
    pub async fn create_book(&self, book: CreateBook) -> AppResult<BookDetails> {
        let book = prepare_book(book)?;
        let created = self.repository.books.create(&book).await?;
        tracing::info!(
            "Registered book id={} isbn={} ({} copies)",
            created.id,
            created.isbn,
            created.total_copies
        );
        Ok(created)
    }

    /// Remove a book that has no outstanding loans
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let removed = self.repository.books.delete(id).await?;
        tracing::info!("Removed book id={} \"{}\"", removed.id, removed.title);
        Ok(())
    }

    pub async fn list_authors(&self) -> AppResult<Vec<Author>> {
        self.repository.authors.list().await
    }

    pub async fn get_author(&self, id: i32) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    pub async fn create_author(&self, author: CreateAuthor) -> AppResult<Author> {
        author.validate()?;
        self.repository.authors.create(&author).await
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories.list().await
    }

    pub async fn get_category(&self, id: i32) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    pub async fn create_category(&self, category: CreateCategory) -> AppResult<Category> {
        category.validate()?;
        self.repository.categories.create(&category).await
    }
}

/// Validate a registration and settle the ISBN and copy counts
fn prepare_book(mut book: CreateBook) -> AppResult<CreateBook> {
    book.validate()?;
    if book.title.trim().is_empty() || book.author_name.trim().is_empty() {
        return Err(AppError::Validation("title and author_name cannot be blank".to_string()));
    }
    book.isbn = normalize_isbn(&book.isbn)?;
    let (_, available) = book.copies()?;
    book.available_copies = Some(available);
    Ok(book)
}
