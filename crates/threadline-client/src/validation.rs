//! Client-side input checks. They mirror what the backend enforces so bad
//! input never costs a round trip.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ClientError;

pub const COMMENT_MIN_CHARS: usize = 3;
pub const COMMENT_MAX_CHARS: usize = 200;

const USERNAME_MIN_CHARS: usize = 5;
const USERNAME_MAX_CHARS: usize = 20;
const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 20;
const PASSWORD_SPECIALS: &str = "!@#$%^&*(),.?\":{}|<>";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\w.-]+@[a-zA-Z\d.-]+\.[a-zA-Z]{2,}$").expect("email pattern is valid")
});

/// Trim `text` and check it is 3 to 200 characters long.
pub fn validate_comment_text(text: &str) -> Result<String, ClientError> {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if !(COMMENT_MIN_CHARS..=COMMENT_MAX_CHARS).contains(&len) {
        return Err(ClientError::validation(format!(
            "Comment must be between {} and {} characters.",
            COMMENT_MIN_CHARS, COMMENT_MAX_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_login(username_or_email: &str, password: &str) -> Result<(), ClientError> {
    if username_or_email.trim().is_empty() {
        return Err(ClientError::validation("Username or email is required"));
    }
    if password.is_empty() {
        return Err(ClientError::validation("Password is required"));
    }
    Ok(())
}

pub fn validate_signup(username: &str, email: &str, password: &str) -> Result<(), ClientError> {
    if username.is_empty() {
        return Err(ClientError::validation("Username is required"));
    }
    if !is_valid_username(username) {
        return Err(ClientError::validation(format!(
            "Username must be alphanumeric and between {} and {} characters",
            USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
        )));
    }

    if email.is_empty() {
        return Err(ClientError::validation("Email is required"));
    }
    if !is_valid_email(email) {
        return Err(ClientError::validation("Invalid email format"));
    }

    if password.is_empty() {
        return Err(ClientError::validation("Password is required"));
    }
    if !is_valid_password(password) {
        return Err(ClientError::validation(format!(
            "Password must be {}-{} characters long, contain at least one uppercase letter, \
             one lowercase letter, one number, and one special character",
            PASSWORD_MIN_CHARS, PASSWORD_MAX_CHARS
        )));
    }

    Ok(())
}

pub fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len)
        && username.chars().all(char::is_alphanumeric)
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (PASSWORD_MIN_CHARS..=PASSWORD_MAX_CHARS).contains(&len)
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}
