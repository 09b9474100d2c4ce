use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Configuration file not found. Checked the following locations:\n\
        - current directory: armada.local.yaml, .armada.local.yaml, armada.yaml, .armada.yaml\n\
        - ./.armada/ directory\n\
        - ~/.config/armada/armada.yaml\n\
        A path can also be given with the ARMADA_CONFIG_PATH environment variable"
    )]
    ConfigFileNotFound,

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {resource}.{field}: {reason}")]
    InvalidValue {
        resource: String,
        field: String,
        reason: String,
    },

    #[error("Invalid resource '{name}': {reason}")]
    InvalidResource { name: String, reason: String },

    #[error("No subscription configured; set subscription_id or AZURE_SUBSCRIPTION_ID")]
    MissingSubscription,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
