//! Helm repository configuration and chart metadata.
//!
//! [`RepositoryConfig`] is the `repositories.yaml` format Helm reads through
//! `--repository-config`. The same shape is used for the operator-provisioned
//! credential file the plugin looks usernames and passwords up in.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timestamp Helm writes when a repository file was not generated by `helm repo add`.
pub const GENERATED_EPOCH: &str = "0001-01-01T00:00:00Z";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default = "default_generated")]
    pub generated: String,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

/// One repository entry, optionally with credentials and TLS material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    #[serde(rename = "caFile")]
    pub ca_file: String,
    #[serde(rename = "certFile")]
    pub cert_file: String,
    #[serde(rename = "keyFile")]
    pub key_file: String,
    pub insecure_skip_tls_verify: bool,
    pub pass_credentials_all: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            api_version: String::new(),
            generated: default_generated(),
            repositories: Vec::new(),
        }
    }
}

impl RepositoryConfig {
    pub fn new(repositories: Vec<Repository>) -> Self {
        Self {
            repositories,
            ..Self::default()
        }
    }

    /// Load a repository/credential file.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::CredentialsRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_yaml::from_str(&content).map_err(|e| crate::Error::CredentialsParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Entry whose URL is exactly `url`.
    pub fn find_by_url(&self, url: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.url == url)
    }

    pub fn to_yaml(&self) -> crate::Result<String> {
        serde_yaml::to_string(self).map_err(|e| crate::Error::RepositoryConfigSerialize { source: e })
    }
}

fn default_generated() -> String {
    GENERATED_EPOCH.to_owned()
}

/// The parts of a chart's `Chart.yaml` the plugin needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: Option<Vec<ChartDependency>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartDependency {
    pub name: String,
    #[serde(default)]
    pub repository: Option<String>,
}

impl ChartMetadata {
    pub const FILE_NAME: &'static str = "Chart.yaml";

    /// Load `Chart.yaml` from a chart directory.
    pub fn load(chart_dir: &Path) -> crate::Result<Self> {
        let path = chart_dir.join(Self::FILE_NAME);
        let content = std::fs::read_to_string(&path).map_err(|e| crate::Error::ChartMetadataRead {
            path: path.clone(),
            source: e,
        })?;
        serde_yaml::from_str(&content).map_err(|e| crate::Error::ChartMetadataParse { path, source: e })
    }

    pub fn dependencies(&self) -> &[ChartDependency] {
        self.dependencies.as_deref().unwrap_or_default()
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies().is_empty()
    }
}
