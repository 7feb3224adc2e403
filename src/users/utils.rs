use diesel::sqlite::SqliteConnection;
use regex::Regex;

use super::models::User;
use crate::types::{AppError, ValidationError};

lazy_static! {
    static ref USERNAME_RE: Regex = {
        let pattern = r"\A[\w.@+-]{1,150}\z";
        Regex::new(pattern).unwrap()
    };
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if !USERNAME_RE.is_match(username) {
        Err(ValidationError::from(
            "username",
            "Enter a valid username: up to 150 letters, digits and @/./+/-/_ only.",
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username(
    username_to_validate: &str,
    connection: &mut SqliteConnection,
) -> Result<(), AppError> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_username_re(username_to_validate) {
        errors.merge(e);
    } else if User::name_taken(username_to_validate, connection)? {
        errors.add_error("username", "A user with that username already exists.");
    }
    errors.into_result(()).map_err(AppError::from)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < 5 {
        let e = ValidationError::from("password1", "Password too short.");
        Err(e)
    } else {
        Ok(())
    }
}

/// Only local absolute paths are honoured as post-login destinations.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if is_local_path(path) => path.to_string(),
        _ => "/".to_string(),
    }
}

// Browsers treat `\` like `/`, so `/\host` is as off-site as `//host`.
fn is_local_path(path: &str) -> bool {
    let mut chars = path.chars();
    chars.next() == Some('/')
        && !matches!(chars.next(), Some('/') | Some('\\'))
        && !path.chars().any(char::is_control)
}
