//! Azure binding error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("Environment variable {0} is not set")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Cloud error: {0}")]
    CloudError(#[from] armada_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, AzureError>;
