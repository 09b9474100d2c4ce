//! Engine settings: target subscription, ARM endpoint and polling policies

use crate::error::{ConfigError, Result};
use armada_cloud::{
    BackoffConfig, ResourceTimeouts, RetryConfig, StabilityConfig, UnconfirmedDeletePolicy,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const DEFAULT_TOKEN_ENV: &str = "AZURE_ACCESS_TOKEN";
pub const SUBSCRIPTION_ENV: &str = "AZURE_SUBSCRIPTION_ID";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Falls back to `AZURE_SUBSCRIPTION_ID`
    pub subscription_id: Option<String>,

    pub azure: AzureSettings,

    /// Backoff for long-running operation status checks
    pub backoff: BackoffConfig,

    /// Stability poll used to confirm deletes
    pub stability: StabilityConfig,

    /// Transport retry inside the ARM client
    pub retry: RetryConfig,

    /// Overrides every kind's own timeouts when present
    pub timeouts: Option<ResourceTimeouts>,

    pub unconfirmed_delete: UnconfirmedDeletePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureSettings {
    pub endpoint: String,

    /// Name of the environment variable holding the bearer token
    pub token_env: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
        }
    }
}

impl Settings {
    /// Resolve the subscription from the file, then the environment
    pub fn subscription_id(&self) -> Result<String> {
        if let Some(id) = &self.subscription_id
            && !id.trim().is_empty()
        {
            return Ok(id.trim().to_string());
        }
        match std::env::var(SUBSCRIPTION_ENV) {
            Ok(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
            _ => Err(ConfigError::MissingSubscription),
        }
    }
}
