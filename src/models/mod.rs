//! Data models for Biblioteca

pub mod author;
pub mod book;
pub mod borrower;
pub mod category;
pub mod loan;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookDetails};
pub use borrower::{Borrower, BorrowerClaims, Role};
pub use category::Category;
pub use loan::{Loan, LoanDetails, LoanStatus};
