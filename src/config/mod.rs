mod manager;
mod settings;
mod validate;

pub use manager::ConfigManager;
pub use settings::{
    keys, Config, LogLevel, DEFAULT_ENVIRONMENT, DEFAULT_LOOKBACK_DAYS,
    DEFAULT_RATE_LIMIT_DELAY_MS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS,
};
pub use validate::{
    is_uuid, validate_account_id, validate_api_token, validate_session_id, MIN_API_TOKEN_LENGTH,
};
