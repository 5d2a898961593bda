//! Authentication and user profile endpoints

use crate::client::ApiClient;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// Authenticated user profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id", alias = "user_id")]
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordResetRequest<'a> {
    email: &'a str,
}

/// Token issued by `POST /auth/login`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub user_id: String,
    pub email: String,
    pub username: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl LoginResponse {
    /// Profile carried alongside the token
    pub fn user(&self) -> User {
        User {
            id: self.user_id.clone(),
            email: self.email.clone(),
            username: self.username.clone(),
            first_name: None,
            last_name: None,
        }
    }
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

/// Body of `PUT /users/me`; unset fields are left untouched server-side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Authentication endpoints
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/register`
    async fn register(&self, user: &NewUser) -> Result<User>;

    /// `POST /auth/login`
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse>;

    /// `GET /auth/me`
    async fn current_user(&self) -> Result<User>;

    /// `PUT /users/me`
    async fn update_user(&self, update: &ProfileUpdate) -> Result<User>;

    /// `POST /auth/password-reset`
    async fn request_password_reset(&self, email: &str) -> Result<()>;
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn register(&self, user: &NewUser) -> Result<User> {
        self.send_json(Method::POST, &["auth", "register"], user).await
    }

    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse> {
        self.send_json(Method::POST, &["auth", "login"], &LoginRequest { email, password })
            .await
    }

    async fn current_user(&self) -> Result<User> {
        self.get(&["auth", "me"]).await
    }

    async fn update_user(&self, update: &ProfileUpdate) -> Result<User> {
        self.send_json(Method::PUT, &["users", "me"], update).await
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        self.send_json_discard(
            Method::POST,
            &["auth", "password-reset"],
            &PasswordResetRequest { email },
        )
        .await
    }
}
