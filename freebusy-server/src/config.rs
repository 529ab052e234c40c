//! Process configuration from the environment.

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone)]
pub struct Config {
    /// Apple ID of the calendar account
    pub icloud_id: String,
    /// App-specific password for that account
    pub icloud_app_password: String,
    /// HTTP listen port
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment, after reading `.env` if it exists.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .with_context(|| format!("Missing environment variable: {}", key))
        };

        let icloud_id = required("ICLOUD_ID")?;
        let icloud_app_password = required("ICLOUD_APP_PASSWORD")?;

        let port = match lookup("PORT").filter(|v| !v.is_empty()) {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("Invalid PORT value: {}", port))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            icloud_id,
            icloud_app_password,
            port,
        })
    }
}
