//! API integration tests
//!
//! Run against a live server and database with: cargo test -- --ignored

use std::time::{SystemTime, UNIX_EPOCH};

use biblioteca_server::models::{BorrowerClaims, Role};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| "change-this-secret-in-production".to_string())
}

fn token(borrower_id: i32, role: Role) -> String {
    BorrowerClaims::new("integration", borrower_id, role, 1)
        .create_token(&secret())
        .expect("Failed to sign token")
}

fn librarian() -> String {
    token(0, Role::Librarian)
}

/// Digits unique enough for ISBNs and usernames across runs
fn unique_suffix() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
}

async fn register_borrower(client: &Client) -> i32 {
    let response = client
        .post(format!("{}/borrowers", BASE_URL))
        .bearer_auth(librarian())
        .json(&json!({ "username": format!("reader-{}", unique_suffix()) }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    body["id"].as_i64().expect("No borrower ID") as i32
}

async fn register_book(client: &Client, copies: i32) -> i64 {
    let isbn = format!("978{:010}", unique_suffix() % 10_000_000_000);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(librarian())
        .json(&json!({
            "title": "Grande Sertão: Veredas",
            "isbn": isbn,
            "author_name": "João Guimarães Rosa",
            "publication_date": "1956-01-01",
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], copies);
    body["id"].as_i64().expect("No book ID")
}

async fn checkout(client: &Client, token: &str, book_id: i64) -> reqwest::Response {
    client
        .post(format!("{}/books/{}/checkout", BASE_URL, book_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request")
}

async fn return_loan(client: &Client, token: &str, loan_id: i64) -> reqwest::Response {
    client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(token)
        .send()
        .await
        .expect("Failed to send request")
}

async fn delete_book(client: &Client, book_id: i64) -> reqwest::Response {
    client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(librarian())
        .send()
        .await
        .expect("Failed to send request")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_loan_lifecycle() {
    let client = Client::new();
    let borrower_id = register_borrower(&client).await;
    let reader = token(borrower_id, Role::Borrower);
    let book_id = register_book(&client, 3).await;

    // Checkout
    let response = checkout(&client, &reader, book_id).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], 2);
    assert!(body["loan"]["returned_at"].is_null());
    assert_eq!(body["loan"]["status"], "checked_out");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan ID");

    // Same borrower, same book
    let response = checkout(&client, &reader, book_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "AlreadyBorrowed");

    // Outstanding loan blocks removal
    let response = delete_book(&client, book_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "BookHasActiveLoans");

    // My loans
    let response = client
        .get(format!("{}/loans", BASE_URL))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["outstanding"][0]["id"], loan_id);
    assert_eq!(body["outstanding"][0]["is_overdue"], false);

    // Return restores the count
    let response = return_loan(&client, &reader, loan_id).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], 3);
    assert!(body["loan"]["returned_at"].is_string());
    assert_eq!(body["loan"]["status"], "returned");

    // Second return
    let response = return_loan(&client, &reader, loan_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "AlreadyReturned");

    // No outstanding loans left
    let response = delete_book(&client, book_id).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore]
async fn test_checkout_unavailable() {
    let client = Client::new();
    let first = token(register_borrower(&client).await, Role::Borrower);
    let second = token(register_borrower(&client).await, Role::Borrower);
    let book_id = register_book(&client, 1).await;

    let response = checkout(&client, &first, book_id).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = checkout(&client, &second, book_id).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "BookUnavailable");
}

#[tokio::test]
#[ignore]
async fn test_cannot_return_someone_elses_loan() {
    let client = Client::new();
    let owner = token(register_borrower(&client).await, Role::Borrower);
    let other = token(register_borrower(&client).await, Role::Borrower);
    let book_id = register_book(&client, 2).await;

    let response = checkout(&client, &owner, book_id).await;
    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan ID");

    let response = return_loan(&client, &other, loan_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = return_loan(&client, &owner, loan_id).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_checkouts_never_oversell() {
    let client = Client::new();
    let book_id = register_book(&client, 2).await;

    let mut tokens = Vec::new();
    for _ in 0..6 {
        tokens.push(token(register_borrower(&client).await, Role::Borrower));
    }

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|t| {
            let client = client.clone();
            tokio::spawn(async move { checkout(&client, &t, book_id).await.status() })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        if handle.await.expect("Task panicked") == StatusCode::CREATED {
            created += 1;
        }
    }
    assert_eq!(created, 2);

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available_copies"], 0);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_isbn() {
    let client = Client::new();
    let book_id = register_book(&client, 1).await;

    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .send()
        .await
        .expect("Failed to send request");
    let book: Value = response.json().await.expect("Failed to parse response");

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(librarian())
        .json(&json!({
            "title": "Another",
            "isbn": book["isbn"],
            "author_name": "Someone",
            "publication_date": "2000-01-01",
            "total_copies": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_checkout() {
    let client = Client::new();

    let response = client
        .post(format!("{}/books/1/checkout", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
