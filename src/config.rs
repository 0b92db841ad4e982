use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const ENV_FILE: &str = ".env";

/// Upstream caps test-mode lookups at this many screen names.
pub const MAX_TEST_ACCOUNTS: usize = 5;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing credential: {0} is not set (env var or .env)")]
    MissingCredential(&'static str),
    #[error("messaging.{0} must not be empty")]
    EmptyTemplate(&'static str),
    #[error("test mode is on but no test.accounts are configured")]
    NoTestAccounts,
    #[error("messaging.send_limit must be greater than zero")]
    ZeroSendLimit,
    #[error("schedule.interval_hours must be greater than zero")]
    ZeroInterval,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub twitter: TwitterConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwitterConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_api_base() -> String {
    "https://api.twitter.com".to_string()
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self { api_base: default_api_base() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_db_file")]
    pub db_file: String,
}

fn default_db_file() -> String {
    "followers.db".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { db_file: default_db_file() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessagingConfig {
    /// Run every decision but never call the send endpoint or write rows.
    #[serde(default)]
    pub dry_run: bool,
    pub message: String,
    pub retry_message: String,
    #[serde(default = "default_retry_after_days")]
    pub retry_after_days: i64,
    #[serde(default = "default_send_limit")]
    pub send_limit: usize,
}

fn default_retry_after_days() -> i64 { 7 }
fn default_send_limit() -> usize { 1000 }

/// Follower thresholds. A missing or zero threshold is not applied.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    pub created_before: Option<String>,
    pub min_followers_count: Option<u64>,
    pub max_followers_count: Option<u64>,
    pub min_friends_count: Option<u64>,
    pub max_friends_count: Option<u64>,
    #[serde(default)]
    pub verified_only: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TestConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub accounts: Vec<String>,
    /// Send the retry template to test accounts instead of the first one.
    #[serde(default)]
    pub retry_message: bool,
}

impl TestConfig {
    /// Screen names actually used for a test run.
    pub fn capped_accounts(&self) -> &[String] {
        &self.accounts[..self.accounts.len().min(MAX_TEST_ACCOUNTS)]
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,
}

fn default_interval_hours() -> u64 { 6 }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_hours: default_interval_hours() }
    }
}

/// OAuth 1.0a user-context credentials.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Checks settings the run cannot start without. Called before any network call.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.messaging.message.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate("message"));
        }
        if self.messaging.retry_message.trim().is_empty() {
            return Err(ConfigError::EmptyTemplate("retry_message"));
        }
        if self.messaging.send_limit == 0 {
            return Err(ConfigError::ZeroSendLimit);
        }
        if self.schedule.interval_hours == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.test.enabled && self.test.accounts.is_empty() {
            return Err(ConfigError::NoTestAccounts);
        }
        Ok(())
    }

    /// Load `.env` from the working directory. Variables already set in the
    /// environment are left alone.
    pub fn load_env_file() {
        load_env_from(Path::new(ENV_FILE));
    }

    /// Credentials come from environment variables (after `load_env_file`).
    pub fn credentials() -> Result<Credentials, ConfigError> {
        Ok(Credentials {
            consumer_key: env_credential("TWITTER_CONSUMER_KEY")?,
            consumer_secret: env_credential("TWITTER_CONSUMER_SECRET")?,
            access_token: env_credential("TWITTER_ACCESS_TOKEN")?,
            access_token_secret: env_credential("TWITTER_ACCESS_TOKEN_SECRET")?,
        })
    }
}

fn load_env_from(path: &Path) {
    match dotenvy::from_path(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "loaded credentials file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(path = %path.display(), "ignoring unreadable env file: {}", e),
    }
}

fn env_credential(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !sanitize_key(&value).is_empty() => Ok(sanitize_key(&value)),
        _ => Err(ConfigError::MissingCredential(name)),
    }
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}
