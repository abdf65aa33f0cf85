//! Loan management service

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{BorrowerLoans, Loan},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    config: LoansConfig,
}

impl LoansService {
    pub fn new(repository: Repository, config: LoansConfig) -> Self {
        Self { repository, config }
    }

    /// Loans of a borrower, outstanding and returned
    pub async fn get_borrower_loans(&self, borrower_id: i32) -> AppResult<BorrowerLoans> {
        self.repository.loans.get_borrower_loans(borrower_id).await
    }

    /// Check a book out for a borrower
    pub async fn checkout(&self, borrower_id: i32, book_id: i32) -> AppResult<(Loan, Book)> {
        if self.config.duration_days <= 0 {
            return Err(AppError::Internal(format!(
                "Invalid loan duration: {} days",
                self.config.duration_days
            )));
        }

        let (loan, book) = self
            .repository
            .loans
            .checkout(borrower_id, book_id, self.config.duration_days)
            .await?;

        tracing::info!(
            "Loan id={} opened: book id={} to borrower id={}, due {} ({} of {} copies left)",
            loan.id,
            book.id,
            borrower_id,
            loan.due_at.format("%Y-%m-%d"),
            book.available_copies,
            book.total_copies
        );

        Ok((loan, book))
    }

    /// Return a loan held by the borrower
    pub async fn return_loan(&self, borrower_id: i32, loan_id: i32) -> AppResult<(Loan, Book)> {
        let (loan, book) = self.repository.loans.return_loan(borrower_id, loan_id).await?;

        tracing::info!(
            "Loan id={} closed: book id={} back from borrower id={} ({} of {} copies available)",
            loan.id,
            book.id,
            borrower_id,
            book.available_copies,
            book.total_copies
        );

        Ok((loan, book))
    }
}
