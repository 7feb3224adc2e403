use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Redirect, Responder};
use rocket_dyn_templates::Template;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Error as IoError;

use crate::utils::login_path;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum AppError {
    Diesel(DieselError),
    Validation(ValidationError),
    Io(IoError),
    NotFound,
    Internal,
    Unauthorized,
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> AppError {
        AppError::Diesel(err)
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> AppError {
        AppError::Validation(err)
    }
}

impl From<IoError> for AppError {
    fn from(err: IoError) -> AppError {
        AppError::Io(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Field name to error messages, rendered next to the offending inputs.
#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn messages(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when no error was recorded, the collected errors otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationError> {
        if self.empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Either a rendered page or a redirect, for handlers that re-render a form
/// on failure and redirect on success.
#[derive(Responder)]
pub enum PageResponse {
    Render(Template),
    Redirect(Redirect),
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            AppError::NotFound | AppError::Diesel(DieselError::NotFound) => Err(Status::NotFound),

            AppError::Unauthorized => {
                let login = login_path(&req.uri().to_string());
                Redirect::to(login).respond_to(req)
            }

            AppError::Validation(error) => {
                tracing::debug!("unhandled validation error on {}: {:?}", req.uri(), error);
                Err(Status::UnprocessableEntity)
            }

            other => {
                tracing::error!("request to {} failed: {:?}", req.uri(), other);
                Err(Status::InternalServerError)
            }
        }
    }
}
