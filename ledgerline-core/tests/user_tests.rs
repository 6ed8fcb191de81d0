//! User service tests: registration, login and profile updates
//!
//! Run with: cargo test --test user_tests

mod common;

use chrono::Duration;

use ledgerline_core::config::Config;
use ledgerline_core::services::{CreateUserRequest, TransferRequest, UpdateUserRequest};
use ledgerline_core::{Error, LedgerContext, TokenError};

use common::{memory_store, random_owner, TEST_SECRET};

fn context() -> LedgerContext {
    let config = Config {
        token_symmetric_key: Some(TEST_SECRET.to_string()),
        access_token_duration: Duration::minutes(5),
        ..Config::default()
    };
    LedgerContext::with_store(config, memory_store()).unwrap()
}

fn new_user_request() -> CreateUserRequest {
    let username = random_owner();
    CreateUserRequest {
        email: format!("{username}@example.com"),
        full_name: "Test User".to_string(),
        password: "secret123".to_string(),
        username,
    }
}

#[test]
fn test_context_requires_token_key() {
    assert!(LedgerContext::with_store(Config::default(), memory_store()).is_err());
}

#[tokio::test]
async fn test_create_user() {
    let ctx = context();
    let request = new_user_request();

    let user = ctx.user_service.create_user(request.clone()).await.unwrap();
    assert_eq!(user.username, request.username);
    assert_eq!(user.full_name, request.full_name);
    assert_eq!(user.email, request.email);
    assert!(user.password_changed_at.is_none());

    let stored = ctx.store.get_user(&request.username).await.unwrap();
    assert_ne!(stored.hashed_password, request.password);
    assert!(stored.hashed_password.starts_with("$argon2id$"));

    assert!(matches!(
        ctx.user_service.create_user(request).await,
        Err(Error::UserExists(_))
    ));
}

#[tokio::test]
async fn test_create_user_validation() {
    let ctx = context();

    let bad = [
        CreateUserRequest {
            username: "NO".to_string(),
            ..new_user_request()
        },
        CreateUserRequest {
            password: "123".to_string(),
            ..new_user_request()
        },
        CreateUserRequest {
            email: "not-an-email".to_string(),
            ..new_user_request()
        },
        CreateUserRequest {
            full_name: "R2D2".to_string(),
            ..new_user_request()
        },
    ];
    for request in bad {
        assert!(matches!(
            ctx.user_service.create_user(request).await,
            Err(Error::Validation(_))
        ));
    }
}

#[tokio::test]
async fn test_login_and_authenticate() {
    let ctx = context();
    let request = new_user_request();
    ctx.user_service.create_user(request.clone()).await.unwrap();

    let login = ctx
        .user_service
        .login_user(&request.username, &request.password)
        .await
        .unwrap();
    assert_eq!(login.user.username, request.username);

    let payload = ctx.user_service.authenticate(&login.access_token).unwrap();
    assert_eq!(payload.username, request.username);
    assert_eq!(payload.expired_at, login.access_token_expires_at);
    assert_eq!(payload.expired_at - payload.issued_at, Duration::minutes(5));

    assert!(matches!(
        ctx.user_service
            .login_user(&request.username, "wrong-password")
            .await,
        Err(Error::IncorrectPassword)
    ));
    assert!(matches!(
        ctx.user_service.login_user("nobody_here", "secret123").await,
        Err(Error::UserNotFound(_))
    ));
    assert!(matches!(
        ctx.user_service.authenticate("garbage"),
        Err(Error::Token(TokenError::InvalidToken))
    ));
}

#[tokio::test]
async fn test_update_user() {
    let ctx = context();
    let request = new_user_request();
    ctx.user_service.create_user(request.clone()).await.unwrap();

    let updated = ctx
        .user_service
        .update_user(
            &request.username,
            UpdateUserRequest {
                username: request.username.clone(),
                full_name: Some("New Name".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "New Name");
    assert_eq!(updated.email, request.email);
    assert!(updated.password_changed_at.is_none());

    let updated = ctx
        .user_service
        .update_user(
            &request.username,
            UpdateUserRequest {
                username: request.username.clone(),
                password: Some("new-secret".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "New Name");
    assert!(updated.password_changed_at.is_some());

    assert!(matches!(
        ctx.user_service
            .login_user(&request.username, &request.password)
            .await,
        Err(Error::IncorrectPassword)
    ));
    ctx.user_service
        .login_user(&request.username, "new-secret")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cannot_update_other_user() {
    let ctx = context();
    let request = new_user_request();
    ctx.user_service.create_user(request.clone()).await.unwrap();

    let err = ctx
        .user_service
        .update_user(
            "someone_else",
            UpdateUserRequest {
                username: request.username,
                email: Some("evil@example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::PermissionDenied(_)));
}

#[tokio::test]
async fn test_end_to_end_transfer() {
    let ctx = context();
    let alice = new_user_request();
    let bob = new_user_request();
    ctx.user_service.create_user(alice.clone()).await.unwrap();
    ctx.user_service.create_user(bob.clone()).await.unwrap();

    let from = ctx
        .account_service
        .create_account(&alice.username, "USD")
        .await
        .unwrap();
    let to = ctx
        .account_service
        .create_account(&bob.username, "USD")
        .await
        .unwrap();
    ctx.account_service.set_balance(from.id, 100).await.unwrap();

    let login = ctx
        .user_service
        .login_user(&alice.username, &alice.password)
        .await
        .unwrap();
    let payload = ctx.user_service.authenticate(&login.access_token).unwrap();

    let result = ctx
        .transfer_service
        .create_transfer(
            &payload.username,
            TransferRequest {
                from_account_id: from.id,
                to_account_id: to.id,
                amount: 60,
                currency: "USD".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(result.from_account.balance, 40);
    assert_eq!(result.to_account.balance, 60);

    let entries = ctx
        .account_service
        .list_entries(&bob.username, to.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount, 60);

    // Bob cannot spend from Alice's account
    assert!(matches!(
        ctx.transfer_service
            .create_transfer(
                &bob.username,
                TransferRequest {
                    from_account_id: from.id,
                    to_account_id: to.id,
                    amount: 10,
                    currency: "USD".to_string(),
                },
            )
            .await,
        Err(Error::AccountNotOwned { .. })
    ));

}
