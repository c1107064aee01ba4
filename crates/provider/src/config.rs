//! Provider configuration

use std::path::Path;

use serde::Deserialize;

use crate::state::DynamicValue;

pub const DEFAULT_BASE_URL: &str = "https://api.vultr.com/v1/";

/// Provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Vultr API key
    pub api_key: Option<String>,

    /// API endpoint
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 60,
            user_agent: format!("terraform-provider-vultr/{}", vultr_common::VERSION),
        }
    }
}

impl ProviderConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Override from `VULTR_API_KEY` and `VULTR_BASE_URL`
    pub fn with_env(self) -> Self {
        self.with_overrides(
            std::env::var("VULTR_API_KEY").ok(),
            std::env::var("VULTR_BASE_URL").ok(),
        )
    }

    /// Override individual settings; empty values are ignored
    pub fn with_overrides(mut self, api_key: Option<String>, base_url: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = base_url.filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
        self
    }

    /// Apply the provider block sent by the host in a `configure` request
    pub fn with_provider_block(self, block: &DynamicValue) -> Self {
        let get = |key: &str| block.get(key).and_then(|v| v.as_string()).map(str::to_string);
        self.with_overrides(get("api_key"), get("base_url"))
    }
}
