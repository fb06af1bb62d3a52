use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::StoreError;

pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn from_cli_or_env(cli_arg: Option<String>) -> Self {
        let url = if let Some(arg) = cli_arg {
            arg
        } else if let Ok(env) = std::env::var("DATABASE_URL") {
            env
        } else {
            "sqlite::memory:".to_string()
        };

        // An in-memory database keeps one database per connection.
        let max_connections = if url == "sqlite::memory:" { 1 } else { 20 };
        Self {
            url,
            max_connections,
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            busy_timeout: Duration::from_secs(1),
        }
    }

    pub async fn create_pool(&self) -> Result<SqlitePool, StoreError> {
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(StoreError::from)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await?;
        Ok(pool)
    }
}
