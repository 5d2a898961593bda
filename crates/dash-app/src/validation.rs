//! Client-side form validation
//!
//! Validation runs before any request is made; a form that fails here never
//! reaches the backend.

use dash_api::{NewUser, ProfileUpdate};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\S+@\S+\.\S+$").expect("email pattern is valid")
});

/// Minimum username length
pub const MIN_USERNAME_LEN: usize = 3;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 8;

/// Field-level validation failures, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    /// Record a failure for `field`; the first failure per field wins
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    /// Message recorded for `field`
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterate over `(field, message)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(field, message)| (*field, message.as_str()))
    }

    /// `Ok(())` when nothing failed
    pub fn into_result(self) -> crate::Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Check an email address; returns the failure message, if any
pub fn check_email(email: &str) -> Option<&'static str> {
    let email = email.trim();
    if email.is_empty() {
        Some("Email is required")
    } else if !EMAIL_PATTERN.is_match(email) {
        Some("Email is invalid")
    } else {
        None
    }
}

/// Check a new password against the strength rules
pub fn check_password(password: &str) -> Option<&'static str> {
    if password.is_empty() {
        Some("Password is required")
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        Some("Password must be at least 8 characters")
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Some("Password must contain at least one number")
    } else if !password.chars().any(char::is_uppercase) {
        Some("Password must contain at least one uppercase letter")
    } else {
        None
    }
}

/// Check a username
pub fn check_username(username: &str) -> Option<&'static str> {
    let username = username.trim();
    if username.is_empty() {
        Some("Username is required")
    } else if username.chars().count() < MIN_USERNAME_LEN {
        Some("Username must be at least 3 characters")
    } else {
        None
    }
}

/// Validate the login form: both fields must be present
pub fn validate_login(email: &str, password: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if email.trim().is_empty() {
        errors.add("email", "Email is required");
    }
    if password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors
}

/// Validate a password reset request
pub fn validate_reset_email(email: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if let Some(message) = check_email(email) {
        errors.add("email", message);
    }
    errors
}

/// Validate a profile update; only the fields being changed are checked
pub fn validate_profile_update(update: &ProfileUpdate) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    if let Some(message) = update.username.as_deref().and_then(check_username) {
        errors.add("username", message);
    }
    if let Some(message) = update.email.as_deref().and_then(check_email) {
        errors.add("email", message);
    }
    if let Some(message) = update.password.as_deref().and_then(check_password) {
        errors.add("password", message);
    }
    errors
}

/// Sign-up form as entered by the user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub agree_to_terms: bool,
}

impl RegistrationForm {
    /// Check every field of the form
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::default();

        if let Some(message) = check_username(&self.username) {
            errors.add("username", message);
        }
        if let Some(message) = check_email(&self.email) {
            errors.add("email", message);
        }
        if let Some(message) = check_password(&self.password) {
            errors.add("password", message);
        }
        if self.password != self.confirm_password {
            errors.add("confirm_password", "Passwords do not match");
        }
        if !self.agree_to_terms {
            errors.add("agree_to_terms", "You must agree to the terms and conditions");
        }

        errors
    }

    /// Registration payload; blank optional names are dropped
    pub fn to_new_user(&self) -> NewUser {
        let non_blank = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        NewUser {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            first_name: non_blank(&self.first_name),
            last_name: non_blank(&self.last_name),
        }
    }
}
