use diesel::sqlite::SqliteConnection;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest};
use rocket::response::Redirect;
use rocket::Request;
use rocket_dyn_templates::Template;
use serde::Serialize;

use crate::db::DbConnection;
use crate::types::{AppError, PageResponse, Validate, ValidationError};

pub mod models;
mod utils;

pub use self::utils::safe_next;
use self::utils::*;

/// Private cookie holding the id of the signed-in user.
pub const USER_COOKIE: &str = "user_id";

/// Guard for routes that need a signed-in user; `?` on the error redirects to
/// the login page.
pub type CurrentUser = Result<models::User, AppError>;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for models::User {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let user_id = request
            .cookies()
            .get_private(USER_COOKIE)
            .and_then(|cookie| cookie.value().parse::<i32>().ok());
        let user_id = match user_id {
            Some(user_id) => user_id,
            None => return Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
        };

        let mut connection = match DbConnection::from_request(request).await {
            Outcome::Success(connection) => connection,
            _ => return Outcome::Error((Status::ServiceUnavailable, AppError::Internal)),
        };
        match models::User::load_by_id(user_id, &mut connection) {
            Ok(user) => Outcome::Success(user),
            Err(AppError::Diesel(diesel::result::Error::NotFound)) => {
                Outcome::Error((Status::Unauthorized, AppError::Unauthorized))
            }
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthContext<'a> {
    user: Option<&'a models::User>,
    username: &'a str,
    next: &'a str,
    errors: &'a ValidationError,
}

#[derive(Debug, FromForm)]
pub struct Registration {
    username: Option<String>,
    password1: Option<String>,
    password2: Option<String>,
}

impl Validate for Registration {
    type Error = AppError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();

        let username = self.username.as_deref().unwrap_or_default().trim();
        match validate_username(username, connection) {
            Ok(_) => {}
            Err(AppError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        let password = self.password1.as_deref().unwrap_or_default();
        if let Err(e) = validate_password(password) {
            errors.merge(e);
        }
        if self.password2.as_deref() != Some(password) {
            errors.add_error("password2", "The two password fields didn't match.");
        }

        errors.into_result(self).map_err(AppError::from)
    }
}

#[get("/signup")]
pub fn signup_form() -> Template {
    let errors = ValidationError::default();
    Template::render(
        "auth/signup",
        AuthContext {
            user: None,
            username: "",
            next: "/",
            errors: &errors,
        },
    )
}

#[post("/signup", data = "<registration>")]
pub fn signup(
    mut connection: DbConnection,
    registration: Form<Registration>,
) -> Result<PageResponse, AppError> {
    let registration = registration.into_inner();
    let username = registration.username.clone().unwrap_or_default();

    match registration.validate(&mut connection) {
        Ok(registration) => {
            let password = registration.password1.unwrap_or_default();
            let user = models::User::create(username.trim(), &password, &mut connection)?;
            tracing::info!("registered user {}", user.username);
            Ok(PageResponse::Redirect(Redirect::to("/auth/login/")))
        }
        Err(AppError::Validation(errors)) => {
            tracing::debug!("signup rejected: {:?}", errors);
            Ok(PageResponse::Render(Template::render(
                "auth/signup",
                AuthContext {
                    user: None,
                    username: &username,
                    next: "/",
                    errors: &errors,
                },
            )))
        }
        Err(other) => Err(other),
    }
}

#[derive(Debug, FromForm)]
pub struct Login {
    username: Option<String>,
    password: Option<String>,
    next: Option<String>,
}

impl Login {
    fn authenticate(&self, connection: &mut SqliteConnection) -> Result<Option<models::User>, AppError> {
        let username = self.username.as_deref().unwrap_or_default().trim();
        let password = self.password.as_deref().unwrap_or_default();
        let user = match models::User::load_by_name(username, connection) {
            Ok(user) => user,
            Err(AppError::Diesel(diesel::result::Error::NotFound)) => return Ok(None),
            Err(e) => return Err(e),
        };
        if user.verify_password(password)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

#[get("/login?<next>")]
pub fn login_form(next: Option<&str>, current_user: Option<models::User>) -> Template {
    let errors = ValidationError::default();
    Template::render(
        "auth/login",
        AuthContext {
            user: current_user.as_ref(),
            username: "",
            next: &safe_next(next),
            errors: &errors,
        },
    )
}

#[post("/login", data = "<login>")]
pub fn login(
    mut connection: DbConnection,
    cookies: &CookieJar<'_>,
    login: Form<Login>,
) -> Result<PageResponse, AppError> {
    let login = login.into_inner();
    let next = safe_next(login.next.as_deref());

    match login.authenticate(&mut connection)? {
        Some(user) => {
            cookies.add_private(Cookie::new(USER_COOKIE, user.id.to_string()));
            tracing::info!("user {} logged in", user.username);
            Ok(PageResponse::Redirect(Redirect::to(next)))
        }
        None => {
            let errors = ValidationError::from(
                "__all__",
                "Please enter a correct username and password.",
            );
            Ok(PageResponse::Render(Template::render(
                "auth/login",
                AuthContext {
                    user: None,
                    username: login.username.as_deref().unwrap_or_default(),
                    next: &next,
                    errors: &errors,
                },
            )))
        }
    }
}

#[get("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Template {
    cookies.remove_private(Cookie::from(USER_COOKIE));
    let errors = ValidationError::default();
    Template::render(
        "auth/logged_out",
        AuthContext {
            user: None,
            username: "",
            next: "/",
            errors: &errors,
        },
    )
}
