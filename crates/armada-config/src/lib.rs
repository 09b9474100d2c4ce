pub mod error;
pub mod manifest;
pub mod settings;

pub use error::*;
pub use manifest::Manifest;
pub use settings::{AzureSettings, Settings};

use manifest::RawResource;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const CANDIDATES: [&str; 4] = [
    "armada.local.yaml",
    ".armada.local.yaml",
    "armada.yaml",
    ".armada.yaml",
];

const PROJECT_DIR: &str = ".armada";

/// A loaded configuration file
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub settings: Settings,
    pub manifest: Manifest,
}

impl Config {
    /// Directory that holds the state for this configuration
    ///
    /// A file inside `.armada/` belongs to the directory above it.
    pub fn project_root(&self) -> PathBuf {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        if dir.file_name().is_some_and(|name| name == PROJECT_DIR)
            && let Some(parent) = dir.parent()
        {
            return parent.to_path_buf();
        }
        dir
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(flatten)]
    settings: Settings,
    #[serde(default)]
    resources: BTreeMap<String, RawResource>,
    #[serde(default)]
    data: BTreeMap<String, RawResource>,
}

/// Find the project's configuration file
///
/// Search order:
/// 1. `ARMADA_CONFIG_PATH` environment variable
/// 2. Current directory: armada.local.yaml, .armada.local.yaml, armada.yaml, .armada.yaml
/// 3. The same names inside `./.armada/`
/// 4. `~/.config/armada/armada.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("ARMADA_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("ARMADA_CONFIG_PATH points to a missing file: {}", path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let project_dir = current_dir.join(PROJECT_DIR);
    if project_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = project_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("armada").join("armada.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Parse settings and manifest from YAML text
pub fn parse_config(content: &str) -> Result<(Settings, Manifest)> {
    // an empty file is a valid, empty configuration
    if content.trim().is_empty() {
        return Ok((Settings::default(), Manifest::default()));
    }
    let raw: RawConfig = serde_yaml::from_str(content)?;
    let manifest = manifest::build(raw.resources, raw.data)?;
    Ok((raw.settings, manifest))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let (settings, manifest) = parse_config(&content).map_err(|e| match e {
        ConfigError::Yaml(source) => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    tracing::debug!(
        "Loaded {} resources and {} data sources from {}",
        manifest.resources.len(),
        manifest.data.len(),
        path.display()
    );
    Ok(Config {
        path: path.to_path_buf(),
        settings,
        manifest,
    })
}

/// Discover and load the configuration file
pub fn load_discovered() -> Result<Config> {
    load_config(&find_config_file()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use armada_cloud::UnconfirmedDeletePolicy;
    use serial_test::serial;
    use std::fs;

    const SAMPLE: &str = r#"
subscription_id: "0000"
azure:
  token_env: ARM_TOKEN
unconfirmed_delete: warn

resources:
  web_set:
    type: azure_availability_set
    name: web-set
    resource_group_name: rg1
    location: West Europe
    platform_fault_domain_count: 2

data:
  base_image:
    type: azure_shared_image_version
    name: 1.0.0
    gallery_name: gallery1
    image_name: ubuntu
    resource_group_name: rg1
"#;

    #[test]
    fn test_parse_config() {
        let (settings, manifest) = parse_config(SAMPLE).unwrap();
        assert_eq!(settings.subscription_id.as_deref(), Some("0000"));
        assert_eq!(settings.azure.token_env, "ARM_TOKEN");
        assert_eq!(settings.azure.endpoint, settings::DEFAULT_ENDPOINT);
        assert_eq!(settings.unconfirmed_delete, UnconfirmedDeletePolicy::Warn);

        let set = manifest.resource("web_set").unwrap();
        assert_eq!(set.kind, "azure_availability_set");
        assert_eq!(set.desired.int("platform_fault_domain_count").unwrap(), 2);

        let image = manifest.data_source("base_image").unwrap();
        assert_eq!(image.desired.string("name").unwrap(), "1.0.0");
    }

    #[test]
    fn test_parse_empty_config() {
        let (settings, manifest) = parse_config("").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_load_reports_path_on_syntax_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("armada.yaml");
        fs::write(&path, "resources: [unclosed").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { path: ref p, .. } if p == &path));
    }

    #[test]
    fn test_project_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = Config {
            path: temp_dir.path().join(".armada").join("armada.yaml"),
            settings: Settings::default(),
            manifest: Manifest::default(),
        };
        assert_eq!(config.project_root(), temp_dir.path());

        let config = Config {
            path: temp_dir.path().join("armada.yaml"),
            ..config
        };
        assert_eq!(config.project_root(), temp_dir.path());
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("armada.yaml"), SAMPLE).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        assert!(result.is_ok());
        assert!(result.unwrap().ends_with("armada.yaml"));

        let config = load_discovered().unwrap();
        assert_eq!(config.manifest.resources.len(), 1);

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_file_local_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("armada.yaml"), "").unwrap();
        fs::write(temp_dir.path().join("armada.local.yaml"), "").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap();
        assert!(result.ends_with("armada.local.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_project_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let project_dir = temp_dir.path().join(".armada");
        fs::create_dir(&project_dir).unwrap();
        fs::write(project_dir.join("armada.yaml"), "").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap();
        assert!(result.ends_with(".armada/armada.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "").unwrap();

        unsafe {
            std::env::set_var("ARMADA_CONFIG_PATH", config_path.to_str().unwrap());
        }

        let result = find_config_file().unwrap();
        assert_eq!(result, config_path);

        unsafe {
            std::env::remove_var("ARMADA_CONFIG_PATH");
        }
    }

    #[test]
    #[serial]
    fn test_find_config_file_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file();
        // a global ~/.config/armada/armada.yaml on the test machine would be found
        let global_exists = dirs::config_dir()
            .map(|dir| dir.join("armada").join("armada.yaml").exists())
            .unwrap_or(false);
        if !global_exists {
            assert!(matches!(result, Err(ConfigError::ConfigFileNotFound)));
        }

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_hidden_file_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join(".armada.local.yaml"), "").unwrap();
        fs::write(temp_dir.path().join("armada.yaml"), "").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let result = find_config_file().unwrap();
        assert!(result.ends_with(".armada.local.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }
}
