#![forbid(unsafe_code)]

//! Application configuration.
//!
//! A plain serde struct handed to the application builder. Every field has
//! a default, so partial TOML/JSON documents are fine:
//!
//! ```toml
//! name = "shop"
//! page_cache_size = 10
//! application_path = "Shop"
//! ```

use serde::{Deserialize, Serialize};

/// Configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[cfg(feature = "config-files")]
    #[error("invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[cfg(feature = "config-files")]
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub component_request_handler_key: String,
    pub direct_action_request_handler_key: String,
    pub resource_request_handler_key: String,
    pub default_request_handler_key: String,
    /// Regular page cache capacity; `0` disables backtracking.
    pub page_cache_size: usize,
    pub permanent_page_cache_size: usize,
    pub session_timeout_secs: u64,
    pub session_checkout_timeout_ms: u64,
    pub stores_ids_in_cookies: bool,
    pub stores_ids_in_urls: bool,
    pub max_component_stack_depth: usize,
    pub refuses_new_sessions: bool,
    /// Create a session for requests that arrive without one.
    pub autocreate_session: bool,
    pub page_refresh_on_backtrack: bool,
    pub direct_action_page: String,
    pub default_language: String,
    pub default_timezone: String,
    pub adaptor_prefix: Option<String>,
    pub application_path: Option<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "woframe".into(),
            component_request_handler_key: "wo".into(),
            direct_action_request_handler_key: "wa".into(),
            resource_request_handler_key: "wr".into(),
            default_request_handler_key: "wa".into(),
            page_cache_size: 5,
            permanent_page_cache_size: 5,
            session_timeout_secs: 3600,
            session_checkout_timeout_ms: 5000,
            stores_ids_in_cookies: true,
            stores_ids_in_urls: true,
            max_component_stack_depth: 20,
            refuses_new_sessions: false,
            autocreate_session: false,
            page_refresh_on_backtrack: true,
            direct_action_page: "Main".into(),
            default_language: "en".into(),
            default_timezone: "UTC".into(),
            adaptor_prefix: None,
            application_path: None,
        }
    }
}

impl ApplicationConfig {
    #[cfg(feature = "config-files")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()
    }

    #[cfg(feature = "config-files")]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()
    }

    /// Reject settings the request pipeline cannot work with.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.max_component_stack_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_component_stack_depth must be at least 1".into(),
            ));
        }
        let keys = [
            &self.component_request_handler_key,
            &self.direct_action_request_handler_key,
            &self.resource_request_handler_key,
        ];
        if keys.iter().any(|k| k.is_empty() || k.contains('/')) {
            return Err(ConfigError::Invalid(
                "request handler keys must be non-empty path segments".into(),
            ));
        }
        Ok(self)
    }

    /// URL prefix preceding the request handler key (`/adaptor/App`), or
    /// the empty string.
    pub fn url_prefix(&self) -> String {
        let mut prefix = String::new();
        if let Some(adaptor) = self.adaptor_prefix.as_deref().filter(|p| !p.is_empty()) {
            if !adaptor.starts_with('/') {
                prefix.push('/');
            }
            prefix.push_str(adaptor.trim_end_matches('/'));
        }
        if let Some(app) = self.application_path.as_deref().filter(|p| !p.is_empty()) {
            prefix.push('/');
            prefix.push_str(app.trim_matches('/'));
        }
        prefix
    }
}
