//! Loans repository for database operations
//!
//! Checkout and return run in a single transaction each. Rows are locked in
//! the order book, then loan, which is also the order used by book removal.

use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        loan::{BorrowerLoans, Loan, LoanDetails},
    },
};

use super::{borrowers::BorrowersRepository, violated_constraint};

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Check a book out to a borrower.
    ///
    /// Returns the new loan and the book with its updated copy count.
    pub async fn checkout(
        &self,
        borrower_id: i32,
        book_id: i32,
        duration_days: i64,
    ) -> AppResult<(Loan, Book)> {
        let mut tx = self.pool.begin().await?;

        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        if !BorrowersRepository::exists(&mut tx, borrower_id).await? {
            return Err(AppError::NotFound(format!(
                "Borrower with id {} not found",
                borrower_id
            )));
        }

        let already_borrowed: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE book_id = $1 AND borrower_id = $2 AND returned_at IS NULL
            )
            "#,
        )
        .bind(book_id)
        .bind(borrower_id)
        .fetch_one(&mut *tx)
        .await?;

        if already_borrowed {
            return Err(already_borrowed_error(&book));
        }

        book.check_out()?;

        let new_loan = Loan::open(book_id, borrower_id, Utc::now(), duration_days)?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, borrower_id, checked_out_at, due_at, returned_at, status)
            VALUES ($1, $2, $3, $4, NULL, $5)
            RETURNING *
            "#,
        )
        .bind(new_loan.book_id)
        .bind(new_loan.borrower_id)
        .bind(new_loan.checked_out_at)
        .bind(new_loan.due_at)
        .bind(new_loan.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some("loans_one_outstanding_per_borrower") => already_borrowed_error(&book),
            _ => e.into(),
        })?;

        sqlx::query("UPDATE books SET available_copies = $1 WHERE id = $2")
            .bind(book.available_copies)
            .bind(book.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| match violated_constraint(&e) {
                Some("books_copies_check") => AppError::Unavailable(format!(
                    "\"{}\" is not available for loan at the moment",
                    book.title
                )),
                _ => AppError::from(e),
            })?;

        tx.commit().await?;

        Ok((loan, book))
    }

    /// Return a loan held by `borrower_id`.
    ///
    /// Returns the closed loan and the book with its updated copy count.
    pub async fn return_loan(&self, borrower_id: i32, loan_id: i32) -> AppResult<(Loan, Book)> {
        let mut tx = self.pool.begin().await?;

        let book_id: i32 = sqlx::query_scalar(
            "SELECT book_id FROM loans WHERE id = $1 AND borrower_id = $2",
        )
        .bind(loan_id)
        .bind(borrower_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))?;

        let mut book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(book_id)
            .fetch_one(&mut *tx)
            .await?;

        let mut loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_one(&mut *tx)
            .await?;

        loan.close(Utc::now())?;

        sqlx::query("UPDATE loans SET returned_at = $1, status = $2 WHERE id = $3")
            .bind(loan.returned_at)
            .bind(loan.status)
            .bind(loan.id)
            .execute(&mut *tx)
            .await?;

        book.check_in();

        sqlx::query("UPDATE books SET available_copies = $1 WHERE id = $2")
            .bind(book.available_copies)
            .bind(book.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((loan, book))
    }

    /// Outstanding and returned loans of a borrower
    pub async fn get_borrower_loans(&self, borrower_id: i32) -> AppResult<BorrowerLoans> {
        let now = Utc::now();

        let mut outstanding = sqlx::query_as::<_, LoanDetails>(
            r#"
            SELECT l.id, l.book_id, b.title AS book_title, l.borrower_id,
                   l.checked_out_at, l.due_at, l.returned_at, l.status
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.borrower_id = $1 AND l.returned_at IS NULL
            ORDER BY l.checked_out_at DESC
            "#,
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;

        for loan in &mut outstanding {
            loan.mark_overdue(now);
        }

        let returned = sqlx::query_as::<_, LoanDetails>(
            r#"
            SELECT l.id, l.book_id, b.title AS book_title, l.borrower_id,
                   l.checked_out_at, l.due_at, l.returned_at, l.status
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.borrower_id = $1 AND l.returned_at IS NOT NULL
            ORDER BY l.returned_at DESC
            "#,
        )
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(BorrowerLoans { outstanding, returned })
    }
}

fn already_borrowed_error(book: &Book) -> AppError {
    AppError::AlreadyBorrowed(format!("You already have an active loan of \"{}\"", book.title))
}
