use std::env;

use anyhow::{Context, Result};

const DEFAULT_MODEL: &str = "gpt-4o";

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path, from DATABASE_URL.
    pub database_url: String,
    pub openai_api_key: String,
    pub model: String,
}

impl Config {
    /// Load configuration from the process environment (a local .env file is
    /// honored when present). Missing required values are fatal.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .context("DATABASE_URL environment variable is required")?;
        let openai_api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable is required")?;
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Ok(Config {
            database_url,
            openai_api_key,
            model,
        })
    }
}
