use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::local_store::get_app_data_dir;
use crate::error::{AppError, AppResult};

pub const DEFAULT_GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
pub const DEFAULT_SCOPES: &str = "User.Read Directory.Read.All";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Backend for users, departments, sessions, chat history and ingestion records.
    pub api_base_url: Option<String>,
    /// Inference endpoint answering chat queries.
    pub chat_url: Option<String>,
    /// Ingestion worker trigger.
    pub inject_url: Option<String>,
    /// Vector-store administration backend.
    pub vectordb_url: Option<String>,
    pub graph_url: String,
    pub authority: String,
    pub client_id: Option<String>,
    pub scopes: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: None,
            chat_url: None,
            inject_url: None,
            vectordb_url: None,
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            authority: DEFAULT_AUTHORITY.to_string(),
            client_id: None,
            scopes: DEFAULT_SCOPES.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl Config {
    pub fn api_base_url(&self) -> AppResult<&str> {
        required(&self.api_base_url, "api base url")
    }

    pub fn chat_url(&self) -> AppResult<&str> {
        required(&self.chat_url, "chat url")
    }

    pub fn inject_url(&self) -> AppResult<&str> {
        required(&self.inject_url, "inject url")
    }

    pub fn vectordb_url(&self) -> AppResult<&str> {
        required(&self.vectordb_url, "vector store url")
    }

    /// Applies `VARTIK_*` environment overrides on top of the stored values.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("VARTIK_API_BASE_URL") {
            self.api_base_url = Some(v);
        }
        if let Some(v) = get("VARTIK_CHAT_URL") {
            self.chat_url = Some(v);
        }
        if let Some(v) = get("VARTIK_INJECT_URL") {
            self.inject_url = Some(v);
        }
        if let Some(v) = get("VARTIK_VECTORDB_URL") {
            self.vectordb_url = Some(v);
        }
        if let Some(v) = get("VARTIK_GRAPH_URL") {
            self.graph_url = v;
        }
        if let Some(v) = get("VARTIK_AUTHORITY") {
            self.authority = v;
        }
        if let Some(v) = get("VARTIK_CLIENT_ID") {
            self.client_id = Some(v);
        }
    }

    /// Sets one key by its CLI name. URL keys must parse as absolute URLs.
    pub fn set_value(&mut self, key: &str, value: &str) -> AppResult<()> {
        let value = value.trim().to_string();
        match key {
            "api-base-url" => self.api_base_url = Some(validate_url(&value)?),
            "chat-url" => self.chat_url = Some(validate_url(&value)?),
            "inject-url" => self.inject_url = Some(validate_url(&value)?),
            "vectordb-url" => self.vectordb_url = Some(validate_url(&value)?),
            "graph-url" => self.graph_url = validate_url(&value)?,
            "authority" => self.authority = validate_url(&value)?,
            "client-id" => self.client_id = Some(value),
            "scopes" => self.scopes = value,
            "request-timeout-secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .map_err(|_| AppError::Config(format!("{} is not a number", value)))?
            }
            "poll-interval-secs" => {
                self.poll_interval_secs = value
                    .parse()
                    .map_err(|_| AppError::Config(format!("{} is not a number", value)))?
            }
            other => return Err(AppError::Config(format!("unknown config key: {}", other))),
        }
        Ok(())
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> AppResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{} is not configured", name)))
}

fn validate_url(value: &str) -> AppResult<String> {
    url::Url::parse(value).map_err(|e| AppError::Config(format!("invalid url {}: {}", value, e)))?;
    Ok(value.trim_end_matches('/').to_string())
}

fn get_config_path() -> AppResult<PathBuf> {
    Ok(get_app_data_dir()?.join("config.json"))
}

pub fn load_config() -> AppResult<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&config_path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_config(config: &Config) -> AppResult<()> {
    let config_path = get_config_path()?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;
    debug!(path = %config_path.display(), "saved config");
    Ok(())
}

/// Stored config with environment overrides applied.
pub fn get_effective_config() -> AppResult<Config> {
    Ok(load_config()?.with_env_overrides())
}

pub fn set_value(key: &str, value: &str) -> AppResult<Config> {
    let mut config = load_config().unwrap_or_default();
    config.set_value(key, value)?;
    save_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_urls_are_configuration_errors() {
        let config = Config::default();
        assert!(matches!(config.api_base_url(), Err(AppError::Config(_))));
        assert!(matches!(config.chat_url(), Err(AppError::Config(_))));
    }

    #[test]
    fn set_value_validates_urls_and_numbers() {
        let mut config = Config::default();
        config
            .set_value("api-base-url", "https://api.example.com/api/")
            .unwrap();
        assert_eq!(config.api_base_url().unwrap(), "https://api.example.com/api");
        assert!(config.set_value("chat-url", "not a url").is_err());
        assert!(config.set_value("poll-interval-secs", "soon").is_err());
        config.set_value("poll-interval-secs", "3").unwrap();
        assert_eq!(config.poll_interval_secs, 3);
        assert!(config.set_value("theme", "dark").is_err());
    }

    #[test]
    fn environment_overrides_win_over_stored_values() {
        let mut config = Config {
            api_base_url: Some("https://stored".into()),
            ..Default::default()
        };
        config.apply_overrides(|key| match key {
            "VARTIK_API_BASE_URL" => Some("https://env".into()),
            "VARTIK_CHAT_URL" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.api_base_url.as_deref(), Some("https://env"));
        assert_eq!(config.chat_url, None);
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"chatUrl":"https://chat"}"#).unwrap();
        assert_eq!(config.chat_url.as_deref(), Some("https://chat"));
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(config.graph_url, DEFAULT_GRAPH_URL);
    }
}
