//! Argo CD `Application` descriptors.
//!
//! Only the fields the staging pipeline consumes are modelled. Anything else
//! in the document (sync policy, project, destination server) is ignored.

use serde::Deserialize;
use std::path::Path;

/// Where a chart comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartReference {
    /// Helm repository URL (`spec.source.repoURL`)
    pub repository_url: String,
    /// Chart name inside the repository (`spec.source.chart`)
    pub chart_name: String,
    /// Chart version (`spec.source.targetRevision`); empty means latest
    pub target_revision: String,
}

impl ChartReference {
    /// Returns `true` if the repository is reached over `https`.
    pub fn is_secure(&self) -> bool {
        is_secure_url(&self.repository_url)
    }
}

/// One application to stage, read from a single descriptor file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationDescriptor {
    /// Application name; also the release name and the staging subdirectory.
    pub name: String,
    /// Target namespace (`spec.destination.namespace`)
    pub namespace: Option<String>,
    pub chart: ChartReference,
    /// Inline values (`spec.source.helm.values`), subject to substitution.
    pub values_override: Option<String>,
}

impl ApplicationDescriptor {
    /// Read and parse one descriptor file.
    ///
    /// # Errors
    ///
    /// - [`Error::DescriptorRead`](crate::Error::DescriptorRead) if the file cannot be read
    /// - [`Error::DescriptorParse`](crate::Error::DescriptorParse) if it is not an `Application` document
    /// - [`Error::DescriptorField`](crate::Error::DescriptorField) if `metadata.name` or `spec.source.chart` is empty
    pub fn read(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::DescriptorRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(path, &content)
    }

    /// Parse descriptor text. `path` is used for error reporting only.
    pub fn parse(path: &Path, content: &str) -> crate::Result<Self> {
        let manifest: ApplicationManifest =
            serde_yaml::from_str(content).map_err(|e| crate::Error::DescriptorParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        let missing = |field| crate::Error::DescriptorField {
            path: path.to_path_buf(),
            field,
        };

        let name = non_empty(manifest.metadata.name).ok_or_else(|| missing("metadata.name"))?;
        let source = manifest.spec.source;
        let chart_name = non_empty(source.chart).ok_or_else(|| missing("spec.source.chart"))?;

        Ok(Self {
            name,
            namespace: manifest.spec.destination.and_then(|d| non_empty(d.namespace)),
            chart: ChartReference {
                repository_url: source.repo_url.unwrap_or_default(),
                chart_name,
                target_revision: source.target_revision.unwrap_or_default(),
            },
            values_override: source.helm.and_then(|h| non_empty(h.values)),
        })
    }
}

/// Returns `true` if `url` parses and uses the `https` scheme.
pub fn is_secure_url(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| u.scheme() == "https")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ── Wire format ──

#[derive(Debug, Deserialize)]
struct ApplicationManifest {
    metadata: Metadata,
    spec: Spec,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Spec {
    source: Source,
    destination: Option<Destination>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Source {
    #[serde(rename = "repoURL")]
    repo_url: Option<String>,
    chart: Option<String>,
    target_revision: Option<String>,
    helm: Option<HelmSource>,
}

#[derive(Debug, Deserialize)]
struct HelmSource {
    values: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Destination {
    namespace: Option<String>,
}
