//! Process-level settings read from the environment.
//!
//! [`Settings`] gathers what a binary needs to build clients and a pool:
//! the credential, the model, the endpoint, and the pool size. Libraries
//! embedding this crate can skip it and build a
//! [`ClientConfig`](crate::client::ClientConfig) directly.

use crate::{
    backend::anthropic::DEFAULT_BASE_URL,
    client::{ClientConfig, DEFAULT_MODEL},
    error::{HarnessError, Result},
};

pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const MODEL_ENV: &str = "ANTHROPIC_MODEL";
pub const BASE_URL_ENV: &str = "ANTHROPIC_BASE_URL";
pub const POOL_SIZE_ENV: &str = "LLM_HARNESS_POOL_SIZE";

/// Pool size used when none is configured.
pub const DEFAULT_POOL_SIZE: usize = 3;

/// Settings for building clients and pools.
#[derive(Clone)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub pool_size: usize,
}

impl Settings {
    /// Read settings from the process environment.
    ///
    /// `ANTHROPIC_API_KEY` is required; everything else falls back to a
    /// default. The result is validated before it is returned.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which maps a variable name to its
    /// value. Empty values count as unset.
    ///
    /// ```
    /// use llm_harness::config::Settings;
    ///
    /// let settings = Settings::from_lookup(|name| match name {
    ///     "ANTHROPIC_API_KEY" => Some("sk-test".to_string()),
    ///     "LLM_HARNESS_POOL_SIZE" => Some("5".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(settings.pool_size, 5);
    /// ```
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get(API_KEY_ENV).ok_or_else(|| {
            HarnessError::InvalidConfig(format!("{} is not set", API_KEY_ENV))
        })?;

        let pool_size = match get(POOL_SIZE_ENV) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                HarnessError::InvalidConfig(format!(
                    "{} must be a positive integer, got '{}': {}",
                    POOL_SIZE_ENV, raw, e
                ))
            })?,
            None => DEFAULT_POOL_SIZE,
        };

        let settings = Self {
            api_key,
            model: get(MODEL_ENV).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get(BASE_URL_ENV).unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            pool_size,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would build an unusable pool or client.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(HarnessError::InvalidConfig("API key is empty".into()));
        }
        if self.pool_size == 0 {
            return Err(HarnessError::InvalidConfig(
                "pool size must be at least 1".into(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(HarnessError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    /// A [`ClientConfig`] carrying these settings' model and endpoint.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_model(self.model.clone())
            .with_base_url(self.base_url.clone())
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_only_key() {
        let s = Settings::from_lookup(lookup(&[(API_KEY_ENV, "sk-test")])).unwrap();
        assert_eq!(s.api_key, "sk-test");
        assert_eq!(s.model, DEFAULT_MODEL);
        assert_eq!(s.base_url, DEFAULT_BASE_URL);
        assert_eq!(s.pool_size, 3);
    }

    #[test]
    fn test_missing_key_is_invalid_config() {
        let err = Settings::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(ref m) if m.contains(API_KEY_ENV)));

        let err = Settings::from_lookup(lookup(&[(API_KEY_ENV, "  ")])).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
    }

    #[test]
    fn test_overrides() {
        let s = Settings::from_lookup(lookup(&[
            (API_KEY_ENV, "sk-test"),
            (MODEL_ENV, "claude-3-5-sonnet-20240620"),
            (BASE_URL_ENV, "http://localhost:8080"),
            (POOL_SIZE_ENV, " 8 "),
        ]))
        .unwrap();
        assert_eq!(s.model, "claude-3-5-sonnet-20240620");
        assert_eq!(s.base_url, "http://localhost:8080");
        assert_eq!(s.pool_size, 8);

        let config = s.client_config();
        assert_eq!(config.model, "claude-3-5-sonnet-20240620");
        assert_eq!(config.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_bad_pool_size() {
        for raw in ["0", "-1", "three"] {
            let err = Settings::from_lookup(lookup(&[(API_KEY_ENV, "sk"), (POOL_SIZE_ENV, raw)]))
                .unwrap_err();
            assert!(matches!(err, HarnessError::InvalidConfig(_)), "{}", raw);
        }
    }

    #[test]
    fn test_bad_base_url() {
        let err = Settings::from_lookup(lookup(&[(API_KEY_ENV, "sk"), (BASE_URL_ENV, "api.example")]))
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidConfig(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let s = Settings::from_lookup(lookup(&[(API_KEY_ENV, "sk-secret")])).unwrap();
        let shown = format!("{:?}", s);
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains("REDACTED"));
    }
}
