use std::env;
use thiserror::Error;

pub const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017/";
pub const DEFAULT_MONGO_DB: &str = "orders";

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    MissingVar(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_db: String,
    pub jwt_secret: String,
}

impl Config {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Ok(Config {
            mongo_uri: non_empty("MONGO_URI").unwrap_or_else(|| DEFAULT_MONGO_URI.to_string()),
            mongo_db: non_empty("MONGO_DB").unwrap_or_else(|| DEFAULT_MONGO_DB.to_string()),
            jwt_secret: non_empty("JWT_SECRET").ok_or(ConfigError::MissingVar("JWT_SECRET"))?,
        })
    }
}
