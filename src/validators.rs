/// Input validators
///
/// Every validator trims its input and returns the normalized value or a
/// `ValidationError`. Usernames and emails come back lowercased.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MAX_NAME_LENGTH: usize = 256;
const MAX_URL_LENGTH: usize = 2048;
const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_PASSWORD_LENGTH: usize = 72; // bcrypt only reads the first 72 bytes

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9_.]+$").unwrap();

    static ref MEDIA_URL_REGEX: Regex = Regex::new(r"^https?://[^\s]+$").unwrap();
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed)
}

/// Validates and lowercases an email address
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let email = required("email", email)?.to_lowercase();

    if email.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email", MIN_EMAIL_LENGTH));
    }
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(&email) {
        return Err(ValidationError::InvalidFormat("email"));
    }
    if email.split('@').next().map_or(0, str::len) > 64 {
        return Err(ValidationError::SuspiciousContent("email"));
    }

    Ok(email)
}

/// Validates and lowercases a username
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let username = required("username", username)?.to_lowercase();

    if username.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username", MIN_USERNAME_LENGTH));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username", MAX_USERNAME_LENGTH));
    }
    if !USERNAME_REGEX.is_match(&username) {
        return Err(ValidationError::InvalidFormat("username"));
    }

    Ok(username)
}

/// Validates a display name
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let name = required("full_name", name)?;

    if name.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("full_name", MAX_NAME_LENGTH));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("full_name"));
    }

    Ok(name.to_string())
}

/// Validates a reference to already-uploaded media
pub fn is_valid_media_url(field: &'static str, url: &str) -> Result<String, ValidationError> {
    let url = required(field, url)?;

    if url.len() > MAX_URL_LENGTH {
        return Err(ValidationError::TooLong(field, MAX_URL_LENGTH));
    }
    if !MEDIA_URL_REGEX.is_match(url) {
        return Err(ValidationError::InvalidFormat(field));
    }

    Ok(url.to_string())
}

/// Checks a new secret against the length policy. The secret is not trimmed.
pub fn validate_password(field: &'static str, password: &str) -> Result<(), ValidationError> {
    if password.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(field, MIN_PASSWORD_LENGTH));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong(field, MAX_PASSWORD_LENGTH));
    }
    Ok(())
}

/// Normalizes a login identifier (username or email)
pub fn normalize_identifier(identifier: &str) -> Result<String, ValidationError> {
    Ok(required("username or email", identifier)?.to_lowercase())
}
