use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Plugin configuration file (`helmsubst.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub helm: HelmConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the generated `<app>.yaml` repository configs
    #[serde(default = "default_repository_config_dir")]
    pub repository_config_dir: PathBuf,
    /// Operator-provisioned repository credentials
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Directory receiving `plugin.log`
    #[serde(default = "default_log_location")]
    pub log_location: PathBuf,
    /// Root of the revision staging directories (defaults to the OS temp dir)
    #[serde(default = "std::env::temp_dir")]
    pub temp_root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmConfig {
    /// Helm executable name or path
    #[serde(default = "default_helm_binary")]
    pub binary: String,
    /// URL prefixes of registries whose dependencies need credentials
    #[serde(default = "default_authenticated_registries")]
    pub authenticated_registries: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Fail an application whose chart repository is not https instead of
    /// skipping it.
    #[serde(default)]
    pub reject_insecure_repositories: bool,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            repository_config_dir: default_repository_config_dir(),
            credentials_path: default_credentials_path(),
            log_location: default_log_location(),
            temp_root: std::env::temp_dir(),
        }
    }
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            binary: default_helm_binary(),
            authenticated_registries: default_authenticated_registries(),
        }
    }
}

impl PluginConfig {
    pub const FILE_NAME: &'static str = "helmsubst.toml";

    /// Load from the given file, or return defaults if it does not exist.
    pub fn load(config_path: &Path) -> crate::Result<Self> {
        if config_path.exists() {
            let content =
                std::fs::read_to_string(config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path.to_path_buf(),
                source: e,
            })
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}

/// Default location of the optional config file.
pub fn default_config_path() -> PathBuf {
    default_repository_config_dir().join(PluginConfig::FILE_NAME)
}

fn default_repository_config_dir() -> PathBuf {
    PathBuf::from("/helm-working-dir/")
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("/helm-working-dir/plugin-repositories/repositories.yaml")
}

fn default_log_location() -> PathBuf {
    PathBuf::from("/tmp/argocd-helm-envsubst-plugin/")
}

fn default_helm_binary() -> String {
    "helm".to_owned()
}

fn default_authenticated_registries() -> Vec<String> {
    vec!["https://gitlab.int.hextech.io".to_owned()]
}
