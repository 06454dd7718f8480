use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::settings::{
    keys, Config, LogLevel, DEFAULT_ENVIRONMENT, DEFAULT_LOOKBACK_DAYS,
    DEFAULT_RATE_LIMIT_DELAY_MS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS,
};
use crate::config::validate::{
    is_session_placeholder, is_uuid, validate_account_id, validate_api_token,
    validate_session_id,
};
use crate::quantive::{QuantiveClient, RetryPolicy, Transport};
use crate::shared::error::{QuantiveError, Result};
use crate::shared::store::PropertyStore;

/// Reads, writes and validates configuration held in a [`PropertyStore`].
pub struct ConfigManager {
    store: Arc<dyn PropertyStore>,
    transport: Arc<dyn Transport>,
    base_url: Option<String>,
}

impl ConfigManager {
    pub fn new(store: Arc<dyn PropertyStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            base_url: None,
        }
    }

    /// Points clients built by this manager at another API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn get_property(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .store
            .get(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn set_property(&self, key: &str, value: &str) -> Result<()> {
        debug!(key, "setting property");
        self.store.set(key, value)
    }

    pub fn set_properties(&self, values: &BTreeMap<String, String>) -> Result<()> {
        debug!(count = values.len(), "setting properties");
        self.store.set_many(values)
    }

    pub fn all_properties(&self) -> Result<BTreeMap<String, String>> {
        self.store.all()
    }

    pub fn delete_all_properties(&self) -> Result<()> {
        info!("deleting all properties");
        self.store.delete_all()
    }

    /// Reads `{ENV}_{NAME}`; missing or unparseable values yield `default`.
    pub fn get_environment_setting<T: FromStr>(
        &self,
        environment: &str,
        name: &str,
        default: T,
    ) -> Result<T> {
        let key = format!("{}_{}", environment.to_uppercase(), name.to_uppercase());
        self.parse_or(&key, default)
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(default);
        };
        match raw.trim().parse() {
            Ok(value) => Ok(value),
            Err(_) => {
                debug!(key, value = %raw, "ignoring unparseable setting");
                Ok(default)
            }
        }
    }

    /// Configuration as stored, with defaults applied and no session lookup.
    pub fn read_config(&self) -> Result<Config> {
        let environment = self
            .store
            .get(keys::ENVIRONMENT)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());

        Ok(Config {
            api_token: self.get_property(keys::API_TOKEN, "")?,
            account_id: self.get_property(keys::ACCOUNT_ID, "")?,
            session_id: self.get_property(keys::SESSION_ID, "")?,
            doc_id: self.get_property(keys::DOC_ID, "")?,
            sheet_id: self.get_property(keys::SHEET_ID, "")?,
            lookback_days: self.parse_or(keys::LOOKBACK_DAYS, DEFAULT_LOOKBACK_DAYS)?,
            rate_limit_delay_ms: self.get_environment_setting(
                &environment,
                keys::RATE_LIMIT_DELAY,
                DEFAULT_RATE_LIMIT_DELAY_MS,
            )?,
            retry_attempts: self.get_environment_setting(
                &environment,
                keys::RETRY_ATTEMPTS,
                DEFAULT_RETRY_ATTEMPTS,
            )?,
            retry_delay_ms: self.get_environment_setting(
                &environment,
                keys::RETRY_DELAY,
                DEFAULT_RETRY_DELAY_MS,
            )?,
            log_level: self.get_environment_setting(
                &environment,
                keys::LOG_LEVEL,
                LogLevel::default(),
            )?,
            environment,
        })
    }

    /// Full configuration. A session ID that is not a UUID is treated as a
    /// session name and replaced by the matching session's ID.
    pub async fn get_config(&self) -> Result<Config> {
        let mut config = self.read_config()?;
        if is_uuid(&config.session_id) {
            config.session_id = config.session_id.trim().to_string();
        } else if !config.session_id.trim().is_empty()
            && !is_session_placeholder(&config.session_id)
        {
            let name = config.session_id.clone();
            let resolved = self.resolve_session_id(&config, &name).await?;
            config.session_id = resolved;
        }
        Ok(config)
    }

    /// Looks the name up with a single `get_sessions` call; no retries.
    async fn resolve_session_id(&self, config: &Config, name: &str) -> Result<String> {
        debug!(session = %name, "resolving session name");
        let sessions = self
            .client_with(config, RetryPolicy::none())?
            .list_sessions()
            .await?;
        let session = sessions
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| QuantiveError::SessionNotFound(name.to_string()))?;
        info!(session = %name, id = %session.id, "resolved session name");
        Ok(session.id)
    }

    /// API client authenticated with `config`'s credentials.
    pub fn client(&self, config: &Config) -> Result<QuantiveClient> {
        self.client_with(config, config.retry_policy())
    }

    /// Client built from the stored credentials, without resolving the
    /// session name. Enough for calls that do not need a session ID.
    pub fn api_client(&self) -> Result<QuantiveClient> {
        self.client(&self.read_config()?)
    }

    fn client_with(&self, config: &Config, retry: RetryPolicy) -> Result<QuantiveClient> {
        let client = QuantiveClient::with_transport(
            config.api_token.trim(),
            config.account_id.trim(),
            self.transport.clone(),
        )?
        .with_retry_policy(retry);
        match &self.base_url {
            Some(url) => client.with_base_url(url),
            None => Ok(client),
        }
    }

    pub fn validate_api_token(&self, token: &str) -> Result<()> {
        validate_api_token(token)
    }

    pub fn validate_account_id(&self, account_id: &str) -> Result<()> {
        validate_account_id(account_id)
    }

    pub fn validate_session_id(&self, session_id: &str) -> Result<()> {
        validate_session_id(session_id)
    }

    /// Runs every validator over the stored configuration; first failure wins.
    pub fn validate_config(&self) -> Result<()> {
        let config = self.read_config()?;
        self.validate_api_token(&config.api_token)?;
        self.validate_account_id(&config.account_id)?;
        self.validate_session_id(&config.session_id)?;
        Ok(())
    }
}
