//! User service - registration, login and profile updates

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::UserProfile;
use crate::ports::{CreateUserParams, Store, UpdateUserParams};
use crate::services::password::{check_password, hash_password};
use crate::token::{Maker, Payload};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: String,
}

/// Partial profile update; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub password: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

/// A successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

fn validate_length(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(Error::validation(format!(
            "{field} must contain from {min}-{max} characters"
        )));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<()> {
    validate_length("username", username, 3, 100)?;
    if !username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(Error::validation(
            "username must contain only lowercase letters, digits, or underscore",
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    validate_length("password", password, 6, 100)
}

fn validate_full_name(full_name: &str) -> Result<()> {
    validate_length("full name", full_name, 3, 100)?;
    if !full_name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        return Err(Error::validation(
            "full name must contain only letters or spaces",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    validate_length("email", email, 3, 200)?;
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(Error::validation("email is not a valid email address"));
    }
    Ok(())
}

/// Hashing runs on the blocking pool
async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::PasswordHash(e.to_string()))?
}

async fn check_blocking(password: String, hashed_password: String) -> Result<()> {
    tokio::task::spawn_blocking(move || check_password(&password, &hashed_password))
        .await
        .map_err(|e| Error::PasswordHash(e.to_string()))?
}

/// User service
pub struct UserService {
    store: Arc<dyn Store>,
    maker: Arc<dyn Maker>,
    access_token_duration: Duration,
}

impl UserService {
    pub fn new(
        store: Arc<dyn Store>,
        maker: Arc<dyn Maker>,
        access_token_duration: Duration,
    ) -> Self {
        Self {
            store,
            maker,
            access_token_duration,
        }
    }

    /// Register a new user; the password is stored only as a hash
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserProfile> {
        validate_username(&request.username)?;
        validate_password(&request.password)?;
        validate_full_name(&request.full_name)?;
        validate_email(&request.email)?;

        let hashed_password = hash_blocking(request.password).await?;
        let user = self
            .store
            .create_user(CreateUserParams {
                username: request.username,
                hashed_password,
                full_name: request.full_name,
                email: request.email,
            })
            .await?;
        Ok(user.into())
    }

    pub async fn get_user(&self, username: &str) -> Result<UserProfile> {
        Ok(self.store.get_user(username).await?.into())
    }

    /// Check credentials and issue an access token
    pub async fn login_user(&self, username: &str, password: &str) -> Result<LoginResult> {
        validate_username(username)?;
        validate_password(password)?;

        let user = self.store.get_user(username).await?;
        check_blocking(password.to_string(), user.hashed_password.clone()).await?;

        let (access_token, payload) = self
            .maker
            .create_token(&user.username, self.access_token_duration)?;
        debug!("access token issued");

        Ok(LoginResult {
            access_token,
            access_token_expires_at: payload.expired_at,
            user: user.into(),
        })
    }

    /// Update the profile of `auth_username`; nobody may edit another user
    pub async fn update_user(
        &self,
        auth_username: &str,
        request: UpdateUserRequest,
    ) -> Result<UserProfile> {
        if request.username != auth_username {
            return Err(Error::PermissionDenied(
                "cannot update other user's info".to_string(),
            ));
        }
        if let Some(password) = &request.password {
            validate_password(password)?;
        }
        if let Some(full_name) = &request.full_name {
            validate_full_name(full_name)?;
        }
        if let Some(email) = &request.email {
            validate_email(email)?;
        }

        let hashed_password = match request.password {
            Some(password) => Some(hash_blocking(password).await?),
            None => None,
        };
        let user = self
            .store
            .update_user(UpdateUserParams {
                username: request.username,
                hashed_password,
                full_name: request.full_name,
                email: request.email,
            })
            .await?;
        Ok(user.into())
    }

    /// Verify an access token and return its payload
    pub fn authenticate(&self, token: &str) -> Result<Payload> {
        Ok(self.maker.verify_token(token)?)
    }
}
