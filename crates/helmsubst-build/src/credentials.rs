//! Per-application Helm repository configs for `helm dependency build`.
//!
//! A chart's dependencies are turned into a `repositories.yaml`. Only https
//! repositories are listed: Helm looks up an index file for every listed
//! repository, which non-https sources (`oci://`, `file://`) do not have.
//! Dependencies hosted on an authenticated registry get their credentials
//! from the operator-provisioned credential file.

use crate::error::StepError;
use crate::staging::write_private_file;
use helmsubst_core::descriptor::is_secure_url;
use helmsubst_core::{ChartMetadata, Repository, RepositoryConfig};
use std::path::{Path, PathBuf};

/// Looks up credentials for a repository URL.
pub trait CredentialResolver {
    /// Credentials and TLS material for `repository_url`, if any are known.
    fn lookup(&self, repository_url: &str) -> helmsubst_core::Result<Option<Repository>>;
}

/// Resolver that never returns credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

impl CredentialResolver for NoCredentials {
    fn lookup(&self, _repository_url: &str) -> helmsubst_core::Result<Option<Repository>> {
        Ok(None)
    }
}

/// Resolver backed by a credential file, consulted only for URLs under one of
/// the authenticated registry prefixes.
#[derive(Debug, Clone)]
pub struct FileCredentialResolver {
    path: PathBuf,
    authenticated_registries: Vec<String>,
}

impl FileCredentialResolver {
    pub fn new(path: impl Into<PathBuf>, authenticated_registries: Vec<String>) -> Self {
        Self {
            path: path.into(),
            authenticated_registries,
        }
    }

    fn is_authenticated(&self, repository_url: &str) -> bool {
        self.authenticated_registries
            .iter()
            .any(|prefix| repository_url.starts_with(prefix.as_str()))
    }
}

impl CredentialResolver for FileCredentialResolver {
    fn lookup(&self, repository_url: &str) -> helmsubst_core::Result<Option<Repository>> {
        if !self.is_authenticated(repository_url) {
            return Ok(None);
        }

        let config = RepositoryConfig::load(&self.path)?;
        let found = config.find_by_url(repository_url).cloned();
        if found.is_none() {
            tracing::warn!(
                url = repository_url,
                credentials = %self.path.display(),
                "no credentials found for authenticated registry"
            );
        }
        Ok(found)
    }
}

/// Build the repository list for a chart's dependencies.
pub fn generate_repository_config(
    chart: &ChartMetadata,
    credentials: &impl CredentialResolver,
) -> Result<RepositoryConfig, StepError> {
    let mut repositories = Vec::new();

    for dependency in chart.dependencies() {
        let Some(url) = dependency.repository.as_deref().filter(|u| !u.is_empty()) else {
            continue;
        };
        if !is_secure_url(url) {
            tracing::debug!(dependency = %dependency.name, url, "not https, leaving out of repository config");
            continue;
        }

        let mut repository = Repository {
            name: dependency.name.clone(),
            url: url.to_owned(),
            ..Repository::default()
        };
        if let Some(known) = credentials
            .lookup(url)
            .map_err(|e| StepError::Credentials { source: e })?
        {
            repository.username = known.username;
            repository.password = known.password;
            repository.ca_file = known.ca_file;
            repository.cert_file = known.cert_file;
            repository.key_file = known.key_file;
            repository.insecure_skip_tls_verify = known.insecure_skip_tls_verify;
            repository.pass_credentials_all = known.pass_credentials_all;
        }
        repositories.push(repository);
    }

    Ok(RepositoryConfig::new(repositories))
}

/// Path of the repository config generated for `app_name`.
pub fn repository_config_path(dir: &Path, app_name: &str) -> PathBuf {
    dir.join(format!("{app_name}.yaml"))
}

/// Write the repository config of `app_name` into `dir`.
pub fn write_repository_config(
    dir: &Path,
    app_name: &str,
    config: &RepositoryConfig,
) -> Result<PathBuf, StepError> {
    let path = repository_config_path(dir, app_name);
    let yaml = config
        .to_yaml()
        .map_err(|e| StepError::RepositoryConfig { source: e })?;

    std::fs::create_dir_all(dir)
        .and_then(|()| write_private_file(&path, yaml.as_bytes()))
        .map_err(|e| StepError::RepositoryConfigWrite {
            path: path.clone(),
            source: e,
        })?;

    Ok(path)
}
