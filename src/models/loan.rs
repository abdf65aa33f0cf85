//! Loan model and lifecycle transitions

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgTypeInfo, Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Loan status. Stored as a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Pending,
    CheckedOut,
    Returned,
}

impl LoanStatus {
    pub fn as_code(&self) -> &'static str {
        match self {
            LoanStatus::Pending => "P",
            LoanStatus::CheckedOut => "E",
            LoanStatus::Returned => "D",
        }
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "P" => Ok(LoanStatus::Pending),
            "E" => Ok(LoanStatus::CheckedOut),
            "D" => Ok(LoanStatus::Returned),
            other => Err(format!("Invalid loan status code: {}", other)),
        }
    }
}

impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_code(), buf)
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    pub checked_out_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
}

/// Loan about to be inserted
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub borrower_id: i32,
    pub checked_out_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub status: LoanStatus,
}

impl Loan {
    /// Open a loan at `now`, due `duration_days` later
    pub fn open(
        book_id: i32,
        borrower_id: i32,
        now: DateTime<Utc>,
        duration_days: i64,
    ) -> AppResult<NewLoan> {
        let due_at = Duration::try_days(duration_days)
            .and_then(|duration| now.checked_add_signed(duration))
            .ok_or_else(|| {
                AppError::Internal(format!("Invalid loan duration: {} days", duration_days))
            })?;

        Ok(NewLoan {
            book_id,
            borrower_id,
            checked_out_at: now,
            due_at,
            status: LoanStatus::CheckedOut,
        })
    }

    /// Close the loan. A loan can be closed only once.
    pub fn close(&mut self, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(returned_at) = self.returned_at {
            return Err(AppError::AlreadyReturned(format!(
                "Loan {} was already returned on {}",
                self.id,
                returned_at.format("%d/%m/%Y")
            )));
        }
        self.returned_at = Some(now);
        self.status = LoanStatus::Returned;
        Ok(())
    }
}

/// Loan with book information for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub borrower_id: i32,
    pub checked_out_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    #[sqlx(skip)]
    pub is_overdue: bool,
}

impl LoanDetails {
    /// Flag the loan when it is still out past its due date
    pub fn mark_overdue(&mut self, now: DateTime<Utc>) {
        self.is_overdue = self.returned_at.is_none() && self.due_at < now;
    }
}

/// A borrower's loans, split by state
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowerLoans {
    /// Most recent checkout first
    pub outstanding: Vec<LoanDetails>,
    /// Most recent return first
    pub returned: Vec<LoanDetails>,
}
