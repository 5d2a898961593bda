//! Authentication session
//!
//! [`AuthService`] owns the current user and authentication status. Other
//! services read that status through an [`AuthHandle`], which never blocks
//! and never mutates.

use crate::error::{Error, Result};
use crate::validation::{self, RegistrationForm};
use dash_api::{AuthApi, ProfileUpdate, UnauthorizedHandler, User};
use dash_core::{KeyValueStore, Navigator, NoticeSink, Route, keys};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const LOGIN_SUCCESS: &str = "Login successful!";
pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const REGISTER_SUCCESS: &str = "Registration successful! Please login.";
pub const REGISTER_FAILED: &str = "Registration failed. Please try again.";
pub const LOGGED_OUT: &str = "You have been logged out.";
pub const PASSWORD_RESET_SENT: &str =
    "If your email exists in our system, you will receive a password reset link.";
pub const PROFILE_UPDATED: &str = "Profile updated successfully!";
pub const PROFILE_UPDATE_FAILED: &str = "Failed to update profile. Please try again.";

/// Where the session stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// Not yet checked
    #[default]
    Loading,
    Authenticated(User),
    Unauthenticated,
}

/// Published authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub status: AuthStatus,
    /// Message from the last failed login, registration, or profile update
    pub last_error: Option<String>,
    /// A login, registration, or session check is in flight
    pub busy: bool,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self.status, AuthStatus::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match &self.status {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Read-only view of the authentication state
#[derive(Debug, Clone)]
pub struct AuthHandle {
    rx: watch::Receiver<AuthState>,
}

impl AuthHandle {
    pub(crate) fn new(rx: watch::Receiver<AuthState>) -> Self {
        Self { rx }
    }

    pub fn is_authenticated(&self) -> bool {
        self.rx.borrow().is_authenticated()
    }

    pub fn user(&self) -> Option<User> {
        self.rx.borrow().user().cloned()
    }

    pub fn state(&self) -> AuthState {
        self.rx.borrow().clone()
    }

    /// Receiver notified on every change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.rx.clone()
    }
}

/// Drops the session when any request comes back 401
struct SessionExpiry {
    state: Arc<watch::Sender<AuthState>>,
}

impl UnauthorizedHandler for SessionExpiry {
    fn on_unauthorized(&self) {
        self.state.send_if_modified(|state| {
            if state.status == AuthStatus::Unauthenticated {
                return false;
            }
            info!("Session expired, dropping to unauthenticated");
            state.status = AuthStatus::Unauthenticated;
            state.busy = false;
            true
        });
    }
}

/// Authentication session manager
pub struct AuthService {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
    notices: Arc<dyn NoticeSink>,
    state: Arc<watch::Sender<AuthState>>,
}

impl AuthService {
    pub fn new(
        api: Arc<dyn AuthApi>,
        store: Arc<dyn KeyValueStore>,
        navigator: Arc<dyn Navigator>,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            api,
            store,
            navigator,
            notices,
            state: Arc::new(state),
        }
    }

    /// Read-only handle for other services
    pub fn handle(&self) -> AuthHandle {
        AuthHandle::new(self.state.subscribe())
    }

    /// Handler to register with the API client's 401 interceptor
    pub fn expiry_handler(&self) -> Arc<dyn UnauthorizedHandler> {
        Arc::new(SessionExpiry {
            state: Arc::clone(&self.state),
        })
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    /// Resolve the session from the stored token
    ///
    /// Without a token no request is made. With one, the profile is fetched;
    /// any failure discards the token.
    pub async fn check_auth(&self) -> AuthStatus {
        if self.store.get(keys::TOKEN).is_none() {
            debug!("No stored token");
            self.set_status(AuthStatus::Unauthenticated);
            return AuthStatus::Unauthenticated;
        }

        self.state.send_modify(|state| state.busy = true);

        let status = match self.api.current_user().await {
            Ok(user) => {
                info!(user = %user.username, "Session restored");
                AuthStatus::Authenticated(user)
            }
            Err(e) => {
                warn!("Stored token rejected: {}", e);
                self.discard_token();
                AuthStatus::Unauthenticated
            }
        };

        self.set_status(status.clone());
        status
    }

    /// Log in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        validation::validate_login(email, password).into_result()?;

        self.begin();
        let response = match self.api.login(email.trim(), password).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(LOGIN_FAILED, e)),
        };

        if response.access_token.is_empty() {
            self.finish_with_error(LOGIN_FAILED);
            self.notices.error(LOGIN_FAILED);
            return Err(Error::Rejected(LOGIN_FAILED.to_string()));
        }

        if let Err(e) = self.store.set(keys::TOKEN, &response.access_token) {
            self.finish_with_error(LOGIN_FAILED);
            self.notices.error(LOGIN_FAILED);
            return Err(e.into());
        }

        let user = response.user();
        info!(user = %user.username, "Logged in");
        self.set_status(AuthStatus::Authenticated(user.clone()));
        self.notices.success(LOGIN_SUCCESS);
        self.navigator.navigate(Route::Dashboard);
        Ok(user)
    }

    /// Create an account; the user still has to log in afterwards
    pub async fn register(&self, form: &RegistrationForm) -> Result<User> {
        form.validate().into_result()?;

        self.begin();
        match self.api.register(&form.to_new_user()).await {
            Ok(user) => {
                info!(user = %user.username, "Registered");
                self.state.send_modify(|state| state.busy = false);
                self.notices.success(REGISTER_SUCCESS);
                self.navigator.navigate(Route::Login);
                Ok(user)
            }
            Err(e) => Err(self.fail(REGISTER_FAILED, e)),
        }
    }

    /// Drop the session and return to the login view
    pub fn logout(&self) {
        self.discard_token();
        self.state.send_replace(AuthState {
            status: AuthStatus::Unauthenticated,
            last_error: None,
            busy: false,
        });
        info!("Logged out");
        self.notices.info(LOGGED_OUT);
        self.navigator.navigate(Route::Login);
    }

    /// Ask for a password reset link
    ///
    /// The outcome shown is the same whether or not the address is known;
    /// backend failures are only logged.
    pub async fn request_password_reset(&self, email: &str) -> Result<&'static str> {
        validation::validate_reset_email(email).into_result()?;

        if let Err(e) = self.api.request_password_reset(email.trim()).await {
            warn!("Password reset request failed: {}", e);
        }

        self.notices.info(PASSWORD_RESET_SENT);
        Ok(PASSWORD_RESET_SENT)
    }

    /// Update the current user's profile
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        validation::validate_profile_update(update).into_result()?;

        match self.api.update_user(update).await {
            Ok(user) => {
                self.state.send_modify(|state| {
                    if state.is_authenticated() {
                        state.status = AuthStatus::Authenticated(user.clone());
                    }
                    state.last_error = None;
                });
                self.notices.success(PROFILE_UPDATED);
                Ok(user)
            }
            Err(e) => {
                let message = e.user_message(PROFILE_UPDATE_FAILED);
                warn!("Profile update failed: {}", e);
                self.state.send_modify(|state| state.last_error = Some(message.clone()));
                self.notices.error(&message);
                Err(Error::request(message, e))
            }
        }
    }

    /// Forget the last failure message
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| state.last_error.take().is_some());
    }

    fn begin(&self) {
        self.state.send_modify(|state| {
            state.busy = true;
            state.last_error = None;
        });
    }

    fn fail(&self, fallback: &str, source: dash_api::ApiError) -> Error {
        let message = source.user_message(fallback);
        warn!("{}: {}", fallback, source);
        self.finish_with_error(&message);
        self.notices.error(&message);
        Error::request(message, source)
    }

    fn finish_with_error(&self, message: &str) {
        self.state.send_modify(|state| {
            state.busy = false;
            state.last_error = Some(message.to_string());
        });
    }

    fn set_status(&self, status: AuthStatus) {
        self.state.send_modify(|state| {
            state.status = status;
            state.busy = false;
        });
    }

    fn discard_token(&self) {
        if let Err(e) = self.store.remove(keys::TOKEN) {
            warn!("Failed to remove stored token: {}", e);
        }
    }
}
