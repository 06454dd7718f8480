use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::shared::error::{QuantiveError, Result};

pub const MIN_API_TOKEN_LENGTH: usize = 20;

const API_TOKEN_PLACEHOLDERS: &[&str] = &[
    "YOUR_API_TOKEN",
    "YOUR_API_TOKEN_HERE",
    "YOUR_QUANTIVE_API_TOKEN",
    "<API_TOKEN>",
    "REPLACE_ME",
];

const ACCOUNT_ID_PLACEHOLDERS: &[&str] = &[
    "YOUR_ACCOUNT_ID",
    "YOUR_ACCOUNT_ID_HERE",
    "YOUR_QUANTIVE_ACCOUNT_ID",
    "<ACCOUNT_ID>",
    "REPLACE_ME",
];

const SESSION_ID_PLACEHOLDERS: &[&str] = &[
    "YOUR_SESSION_ID",
    "YOUR_SESSION_ID_HERE",
    "YOUR_SESSION_NAME",
    "<SESSION_ID>",
    "REPLACE_ME",
];

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static UUID pattern compiles")
});

/// 8-4-4-4-12 hex groups, any case.
pub fn is_uuid(value: &str) -> bool {
    UUID_RE.is_match(value.trim())
}

pub(crate) fn is_placeholder(value: &str, placeholders: &[&str]) -> bool {
    let value = value.trim();
    placeholders.iter().any(|p| p.eq_ignore_ascii_case(value))
}

fn require(field: &'static str, value: &str, placeholders: &[&str]) -> Result<()> {
    if value.trim().is_empty() {
        return Err(QuantiveError::MissingValue { field });
    }
    if is_placeholder(value, placeholders) {
        return Err(QuantiveError::Placeholder {
            field,
            value: value.trim().to_string(),
        });
    }
    Ok(())
}

pub fn validate_api_token(token: &str) -> Result<()> {
    require("API token", token, API_TOKEN_PLACEHOLDERS)?;
    let len = token.trim().chars().count();
    if len < MIN_API_TOKEN_LENGTH {
        return Err(QuantiveError::TokenTooShort {
            len,
            min: MIN_API_TOKEN_LENGTH,
        });
    }
    Ok(())
}

pub fn validate_account_id(account_id: &str) -> Result<()> {
    require("Account ID", account_id, ACCOUNT_ID_PLACEHOLDERS)
}

/// Session names are accepted; they only produce a warning.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    require("Session ID", session_id, SESSION_ID_PLACEHOLDERS)?;
    if !is_uuid(session_id) {
        warn!(
            session_id = %session_id.trim(),
            "Session ID is not a UUID; it will be resolved as a session name"
        );
    }
    Ok(())
}

pub(crate) fn is_session_placeholder(value: &str) -> bool {
    is_placeholder(value, SESSION_ID_PLACEHOLDERS)
}
