//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The database URL is wrapped in `secrecy::SecretString` since
//! it may carry credentials.

pub mod secrets;

use std::time::Duration;

use crate::error::{Error, Result};
use crate::queue::QueueLockPolicy;
use crate::queue::lock::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use secrecy::SecretString;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub queue_lock_attempts: u32,
    pub queue_lock_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let delay_ms = optional_parsed(
            "TASKQ_QUEUE_LOCK_DELAY_MS",
            DEFAULT_RETRY_DELAY.as_millis() as u64,
        )?;
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            queue_lock_attempts: optional_parsed("TASKQ_QUEUE_LOCK_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?,
            queue_lock_delay: Duration::from_millis(delay_ms),
        })
    }

    /// Queue lock polling parameters from this configuration.
    pub fn queue_lock_policy(&self) -> QueueLockPolicy {
        QueueLockPolicy {
            max_attempts: self.queue_lock_attempts,
            retry_delay: self.queue_lock_delay,
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn optional_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
