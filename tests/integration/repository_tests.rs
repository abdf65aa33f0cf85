//! Repository tests against a throwaway database
//!
//! Each test gets a fresh, migrated database from `sqlx::test`.
//! Run with: DATABASE_URL=postgres://... cargo test --test repository_tests -- --ignored

use biblioteca_server::{
    error::AppError,
    models::{
        book::{BookQuery, CreateBook},
        borrower::CreateBorrower,
        LoanStatus,
    },
    repository::Repository,
};
use chrono::NaiveDate;
use sqlx::PgPool;

async fn add_borrower(repo: &Repository, username: &str) -> i32 {
    repo.borrowers
        .create(&CreateBorrower {
            username: username.to_string(),
            display_name: None,
        })
        .await
        .expect("Failed to create borrower")
        .id
}

async fn add_book(repo: &Repository, isbn: &str, copies: i32) -> i32 {
    repo.books
        .create(&CreateBook {
            title: "Memórias Póstumas de Brás Cubas".to_string(),
            isbn: isbn.to_string(),
            author_name: "Machado de Assis".to_string(),
            category_id: None,
            publication_date: NaiveDate::from_ymd_opt(1881, 1, 1).unwrap(),
            total_copies: copies,
            available_copies: None,
        })
        .await
        .expect("Failed to create book")
        .id
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_checkout_then_return(pool: PgPool) {
    let repo = Repository::new(pool);
    let borrower = add_borrower(&repo, "ana").await;
    let book = add_book(&repo, "9780000000001", 2).await;

    let (loan, after_checkout) = repo.loans.checkout(borrower, book, 14).await.unwrap();
    assert_eq!(after_checkout.available_copies, 1);
    assert_eq!(loan.status, LoanStatus::CheckedOut);
    assert!(loan.returned_at.is_none());

    let loans = repo.loans.get_borrower_loans(borrower).await.unwrap();
    assert_eq!(loans.outstanding.len(), 1);
    assert!(!loans.outstanding[0].is_overdue);
    assert!(loans.returned.is_empty());

    let (closed, after_return) = repo.loans.return_loan(borrower, loan.id).await.unwrap();
    assert_eq!(after_return.available_copies, 2);
    assert_eq!(closed.status, LoanStatus::Returned);

    let err = repo.loans.return_loan(borrower, loan.id).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyReturned(_)));
    assert_eq!(repo.books.get_details(book).await.unwrap().available_copies, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_second_checkout_by_same_borrower_is_refused(pool: PgPool) {
    let repo = Repository::new(pool);
    let borrower = add_borrower(&repo, "bruno").await;
    let book = add_book(&repo, "9780000000002", 3).await;

    repo.loans.checkout(borrower, book, 14).await.unwrap();
    let err = repo.loans.checkout(borrower, book, 14).await.unwrap_err();

    assert!(matches!(err, AppError::AlreadyBorrowed(_)));
    assert_eq!(repo.books.get_details(book).await.unwrap().available_copies, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_checkout_without_copies_is_refused(pool: PgPool) {
    let repo = Repository::new(pool);
    let first = add_borrower(&repo, "carla").await;
    let second = add_borrower(&repo, "davi").await;
    let book = add_book(&repo, "9780000000003", 1).await;

    repo.loans.checkout(first, book, 14).await.unwrap();
    let err = repo.loans.checkout(second, book, 14).await.unwrap_err();

    assert!(matches!(err, AppError::Unavailable(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_removal_blocked_by_outstanding_loan(pool: PgPool) {
    let repo = Repository::new(pool);
    let borrower = add_borrower(&repo, "elisa").await;
    let book = add_book(&repo, "9780000000004", 1).await;

    let (loan, _) = repo.loans.checkout(borrower, book, 14).await.unwrap();
    let err = repo.books.delete(book).await.unwrap_err();
    assert!(matches!(err, AppError::HasActiveLoans(_)));

    repo.loans.return_loan(borrower, loan.id).await.unwrap();
    repo.books.delete(book).await.unwrap();

    let loans = repo.loans.get_borrower_loans(borrower).await.unwrap();
    assert!(loans.outstanding.is_empty());
    assert!(loans.returned.is_empty());
    assert!(matches!(repo.books.get_details(book).await, Err(AppError::NotFound(_))));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_concurrent_checkouts_never_oversell(pool: PgPool) {
    let repo = Repository::new(pool);
    let book = add_book(&repo, "9780000000005", 2).await;

    let mut borrowers = Vec::new();
    for i in 0..5 {
        borrowers.push(add_borrower(&repo, &format!("reader-{}", i)).await);
    }

    let handles: Vec<_> = borrowers
        .into_iter()
        .map(|borrower| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.loans.checkout(borrower, book, 14).await })
        })
        .collect();

    let mut opened = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => opened += 1,
            Err(AppError::Unavailable(_)) => {}
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(opened, 2);
    assert_eq!(repo.books.get_details(book).await.unwrap().available_copies, 0);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore]
async fn test_title_search_matches_wildcards_literally(pool: PgPool) {
    let repo = Repository::new(pool);
    add_book(&repo, "9780000000006", 1).await;

    let query = BookQuery {
        title: Some("%".to_string()),
        ..Default::default()
    };
    assert!(repo.books.search(&query).await.unwrap().is_empty());

    let query = BookQuery {
        title: Some("brás".to_string()),
        ..Default::default()
    };
    assert_eq!(repo.books.search(&query).await.unwrap().len(), 1);
}
