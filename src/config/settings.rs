use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::quantive::RetryPolicy;

/// Property names in the backing store.
pub mod keys {
    pub const API_TOKEN: &str = "QUANTIVE_API_TOKEN";
    pub const ACCOUNT_ID: &str = "QUANTIVE_ACCOUNT_ID";
    pub const SESSION_ID: &str = "SESSION_ID";
    pub const DOC_ID: &str = "GOOGLE_DOC_ID";
    pub const SHEET_ID: &str = "GOOGLE_SHEET_ID";
    pub const LOOKBACK_DAYS: &str = "LOOKBACK_DAYS";
    pub const ENVIRONMENT: &str = "ENVIRONMENT";

    // Environment-qualified, stored as `{ENV}_{NAME}`
    pub const RATE_LIMIT_DELAY: &str = "RATE_LIMIT_DELAY";
    pub const RETRY_ATTEMPTS: &str = "RETRY_ATTEMPTS";
    pub const RETRY_DELAY: &str = "RETRY_DELAY";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

pub const DEFAULT_ENVIRONMENT: &str = "production";
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;
pub const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 1000;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_directive().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub api_token: String,
    pub account_id: String,
    pub session_id: String,
    pub doc_id: String,
    pub sheet_id: String,
    pub lookback_days: u32,
    pub environment: String,
    pub rate_limit_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub log_level: LogLevel,
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retry_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            rate_limit_delay: Duration::from_millis(self.rate_limit_delay_ms),
        }
    }

    /// Copy safe to print: the API token is masked.
    pub fn redacted(&self) -> Self {
        Self {
            api_token: mask_secret(&self.api_token),
            ..self.clone()
        }
    }
}

fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("{visible}****")
    }
}
