use dotenv::dotenv;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::db::{Error, Result};

/// Application settings. Rocket's own knobs (address, port, secret key,
/// template dir) stay in `Rocket.toml` / `ROCKET_*`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub pool_size: u32,
    pub posts_per_page: i64,
    pub index_cache_ttl: Duration,
    pub media_root: PathBuf,
}

impl Settings {
    pub fn new<U: Into<String>, M: Into<PathBuf>>(database_url: U, media_root: M) -> Settings {
        Settings {
            database_url: database_url.into(),
            pool_size: 8,
            posts_per_page: 10,
            index_cache_ttl: Duration::from_secs(20),
            media_root: media_root.into(),
        }
    }

    pub fn from_env() -> Result<Settings> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")?;
        let media_root = env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string());
        let mut settings = Settings::new(database_url, media_root);
        settings.pool_size = var_or("DATABASE_POOL_SIZE", settings.pool_size)?;
        settings.posts_per_page = var_or("POSTS_PER_PAGE", settings.posts_per_page)?;
        if settings.posts_per_page < 1 {
            bail!("POSTS_PER_PAGE must be positive");
        }
        let cache_seconds = var_or("INDEX_CACHE_SECONDS", settings.index_cache_ttl.as_secs())?;
        settings.index_cache_ttl = Duration::from_secs(cache_seconds);
        Ok(settings)
    }
}

fn var_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| Error::from(format!("invalid {}: {}", key, e))),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(e) => Err(e.into()),
    }
}
