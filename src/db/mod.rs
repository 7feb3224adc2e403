use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, Error as PoolError};
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rocket::http::Status;
use rocket::outcome::{try_outcome, Outcome};
use rocket::request::{self, FromRequest};
use rocket::{Request, State};
use std::ops::{Deref, DerefMut};

use crate::config::Settings;

pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<SqliteConnection>>);

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        Io(::std::io::Error);
        R2D2(r2d2::Error);
        Diesel(DieselError);
    }
}

/// Applied to every connection the pool opens.
#[derive(Debug)]
struct SqlitePragmas;

impl r2d2::CustomizeConnection<SqliteConnection, PoolError> for SqlitePragmas {
    fn on_acquire(&self, connection: &mut SqliteConnection) -> ::std::result::Result<(), PoolError> {
        connection
            .batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(PoolError::QueryError)
    }
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = try_outcome!(request.guard::<&State<Pool>>().await);
        match pool.get() {
            Ok(connection) => Outcome::Success(DbConnection(connection)),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

// For the convenience of using a &mut DbConnection as a &mut SqliteConnection.
impl Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub fn init_pool(settings: &Settings) -> Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(settings.database_url.as_str());
    let pool = Pool::builder()
        .max_size(settings.pool_size)
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &Pool) -> Result<()> {
    let mut pooled = pool.get()?;
    let connection: &mut SqliteConnection = &mut pooled;
    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::from(format!("failed to run migrations: {}", e)))?;
    tracing::info!("applied {} pending migration(s)", applied.len());
    Ok(())
}
