use crypto::pbkdf2::*;
use diesel::insert_into;
use diesel::prelude::*;
use serde::Serialize;
use std::fmt;
use std::io::Result as IoResult;

use crate::db::schema::users;
use crate::types::AppError;

const PASSWORD_ROUNDS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl User {
    pub fn make_password(password: &str) -> IoResult<String> {
        pbkdf2_simple(password, PASSWORD_ROUNDS)
    }

    pub fn verify_password(&self, password_to_verify: &str) -> Result<bool, AppError> {
        let check = pbkdf2_check(password_to_verify, &self.password);
        check.map_err(|_| AppError::Internal)
    }

    pub fn create(
        username: &str,
        password: &str,
        connection: &mut SqliteConnection,
    ) -> Result<User, AppError> {
        let new_user = NewUser {
            username,
            password: User::make_password(password)?,
        };
        let user = insert_into(users::table)
            .values(&new_user)
            .get_result::<User>(connection)?;
        Ok(user)
    }

    pub fn load_by_id(user_id: i32, connection: &mut SqliteConnection) -> Result<User, AppError> {
        users::table
            .find(user_id)
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn load_by_name(name: &str, connection: &mut SqliteConnection) -> Result<User, AppError> {
        use crate::db::schema::users::dsl::*;
        users
            .filter(username.eq(name))
            .get_result::<User>(connection)
            .map_err(|e| e.into())
    }

    pub fn name_taken(name: &str, connection: &mut SqliteConnection) -> Result<bool, AppError> {
        use crate::db::schema::users::dsl::*;
        use diesel::dsl::exists;
        let taken = diesel::select(exists(users.filter(username.eq(name))))
            .get_result::<bool>(connection)?;
        Ok(taken)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: String,
}
