//! Borrower registry service

use validator::Validate;

use crate::{
    error::AppResult,
    models::borrower::{Borrower, CreateBorrower},
    repository::Repository,
};

#[derive(Clone)]
pub struct BorrowersService {
    repository: Repository,
}

impl BorrowersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_borrower(&self, id: i32) -> AppResult<Borrower> {
        self.repository.borrowers.get_by_id(id).await
    }

    /// Register a borrower
    pub async fn create_borrower(&self, borrower: CreateBorrower) -> AppResult<Borrower> {
        borrower.validate()?;
        let created = self.repository.borrowers.create(&borrower).await?;
        tracing::info!("Registered borrower id={} ({})", created.id, created.username);
        Ok(created)
    }
}
