//! Build phase: every descriptor in the source directory becomes a staged
//! manifest under the revision directory.
//!
//! ```text
//! run(key)
//!   1. Discover     ── *.yaml / *.yml in the source directory, name order
//!   2. Stage root   ── StagingStore::ensure_revision_dir (clean slate)
//!   3. Per application
//!        Parse      ── ApplicationDescriptor::read     (Skip on failure)
//!        Filter     ── https only                      (Skip, or Fail by policy)
//!        Resolve    ── helm pull + archive cleanup
//!        Deps       ── repository config + helm dependency build, if declared
//!        Render     ── envsubst values + helm template
//!        Stage      ── <rev>/<name>/build.yaml
//! ```
//!
//! A failing application is recorded and the next one is processed; only
//! discovery and revision directory setup abort the run.

use crate::chart::{ChartResolver, DependencyBuilder};
use crate::credentials::CredentialResolver;
use crate::error::{PipelineError, StepError, error_chain};
use crate::staging::StagingStore;
use crate::template::TemplateRenderer;
use helmsubst_core::{AmbientContext, ApplicationDescriptor, RevisionKey};
use helmsubst_helm::{HelmClient, HelmExecutor};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Why an application was left out without failing the run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("not an application descriptor: {detail}")]
    NotADescriptor { detail: String },
    #[error("chart repository {url} does not use https")]
    InsecureRepository { url: String },
    #[error("application name {name:?} cannot be used as a directory name")]
    InvalidName { name: String },
    #[error("chart name {chart:?} cannot be used as a directory name")]
    InvalidChartName { chart: String },
    #[error("application {name} was already staged in this run")]
    DuplicateName { name: String },
}

/// Result of processing one descriptor file.
#[derive(Debug)]
pub enum ApplicationOutcome {
    Staged {
        name: String,
        artifact: PathBuf,
    },
    Skipped {
        source: PathBuf,
        name: Option<String>,
        reason: SkipReason,
    },
    Failed {
        source: PathBuf,
        name: String,
        error: StepError,
    },
}

impl ApplicationOutcome {
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Staged { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Aggregate result of one build pass.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub revision_dir: PathBuf,
    pub outcomes: Vec<ApplicationOutcome>,
}

impl BuildReport {
    pub fn staged(&self) -> impl Iterator<Item = &ApplicationOutcome> {
        self.outcomes.iter().filter(|o| o.is_staged())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ApplicationOutcome> {
        self.outcomes.iter().filter(|o| o.is_skipped())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ApplicationOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// `true` when no application failed.
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(ApplicationOutcome::is_failed)
    }
}

/// Settings of one build pass.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory holding the application descriptors
    pub source_dir: PathBuf,
    /// Directory receiving the generated `<app>.yaml` repository configs
    pub repository_config_dir: PathBuf,
    /// Fail instead of skip applications whose chart repository is not https
    pub reject_insecure_repositories: bool,
}

pub struct BuildPipeline<'a, E: HelmExecutor, C: CredentialResolver> {
    helm: &'a HelmClient<E>,
    store: &'a StagingStore,
    credentials: &'a C,
    context: &'a AmbientContext,
    options: BuildOptions,
}

impl<'a, E: HelmExecutor, C: CredentialResolver> BuildPipeline<'a, E, C> {
    pub fn new(
        helm: &'a HelmClient<E>,
        store: &'a StagingStore,
        credentials: &'a C,
        context: &'a AmbientContext,
        options: BuildOptions,
    ) -> Self {
        Self {
            helm,
            store,
            credentials,
            context,
            options,
        }
    }

    /// Run the build phase for `key`.
    pub async fn run(&self, key: &RevisionKey) -> Result<BuildReport, PipelineError> {
        tracing::info!(source = %self.options.source_dir.display(), revision = %key, "starting build");

        let descriptors = discover_descriptors(&self.options.source_dir)?;
        tracing::debug!(count = descriptors.len(), "discovered descriptor candidates");

        let revision_dir = self
            .store
            .ensure_revision_dir(key)
            .map_err(|e| PipelineError::Staging { source: e })?;

        let mut seen = HashSet::new();
        let mut outcomes = Vec::with_capacity(descriptors.len());
        for path in descriptors {
            let outcome = self.process(&path, key, &mut seen).await;
            log_outcome(&outcome);
            outcomes.push(outcome);
        }

        let report = BuildReport {
            revision_dir,
            outcomes,
        };
        tracing::info!(
            staged = report.staged().count(),
            skipped = report.skipped().count(),
            failed = report.failed().count(),
            "build finished"
        );
        Ok(report)
    }

    async fn process(
        &self,
        path: &Path,
        key: &RevisionKey,
        seen: &mut HashSet<String>,
    ) -> ApplicationOutcome {
        let skipped = |name: Option<&str>, reason| ApplicationOutcome::Skipped {
            source: path.to_path_buf(),
            name: name.map(str::to_owned),
            reason,
        };

        let descriptor = match ApplicationDescriptor::read(path) {
            Ok(descriptor) => descriptor,
            Err(e @ helmsubst_core::Error::DescriptorRead { .. }) => {
                return ApplicationOutcome::Failed {
                    source: path.to_path_buf(),
                    name: file_stem(path),
                    error: StepError::Descriptor { source: e },
                };
            }
            Err(e) => {
                return skipped(
                    None,
                    SkipReason::NotADescriptor {
                        detail: error_chain(&e),
                    },
                );
            }
        };
        let name = descriptor.name.clone();

        if !is_valid_dir_name(&name) {
            return skipped(Some(&name), SkipReason::InvalidName { name: name.clone() });
        }
        if !is_valid_dir_name(&descriptor.chart.chart_name) {
            let chart = descriptor.chart.chart_name.clone();
            return skipped(Some(&name), SkipReason::InvalidChartName { chart });
        }
        if !descriptor.chart.is_secure() {
            let url = descriptor.chart.repository_url.clone();
            if self.options.reject_insecure_repositories {
                return ApplicationOutcome::Failed {
                    source: path.to_path_buf(),
                    name,
                    error: StepError::InsecureRepository { url },
                };
            }
            return skipped(Some(&name), SkipReason::InsecureRepository { url });
        }
        if !seen.insert(name.clone()) {
            return skipped(Some(&name), SkipReason::DuplicateName { name: name.clone() });
        }

        match self.stage(&descriptor, key).await {
            Ok(artifact) => ApplicationOutcome::Staged { name, artifact },
            Err(error) => ApplicationOutcome::Failed {
                source: path.to_path_buf(),
                name,
                error,
            },
        }
    }

    async fn stage(
        &self,
        descriptor: &ApplicationDescriptor,
        key: &RevisionKey,
    ) -> Result<PathBuf, StepError> {
        let app_dir = self
            .store
            .prepare_application_dir(key, &descriptor.name)
            .map_err(|e| StepError::Staging { source: e })?;

        let chart_dir = ChartResolver::new(self.helm)
            .resolve(descriptor, &app_dir)
            .await?;

        DependencyBuilder::new(
            self.helm,
            self.credentials,
            &self.options.repository_config_dir,
        )
        .build_if_needed(&descriptor.name, &chart_dir)
        .await?;

        let manifest = TemplateRenderer::new(
            self.helm,
            &self.context.environment,
            self.context.namespace.as_deref(),
        )
        .render(descriptor, &chart_dir)
        .await?;

        self.store
            .write_artifact(key, &descriptor.name, &manifest)
            .map_err(|e| StepError::Staging { source: e })
    }
}

/// Regular `*.yaml` / `*.yml` files directly inside `dir`, sorted by name.
pub fn discover_descriptors(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let read_err = |e| PipelineError::SourceRead {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn is_valid_dir_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn log_outcome(outcome: &ApplicationOutcome) {
    match outcome {
        ApplicationOutcome::Staged { name, artifact } => {
            tracing::info!(app = %name, artifact = %artifact.display(), "staged");
        }
        ApplicationOutcome::Skipped {
            source,
            name,
            reason,
        } => {
            tracing::warn!(
                file = %source.display(),
                app = name.as_deref().unwrap_or("-"),
                reason = %reason,
                "skipped"
            );
        }
        ApplicationOutcome::Failed {
            source,
            name,
            error,
        } => {
            tracing::error!(
                file = %source.display(),
                app = %name,
                error = %error_chain(error),
                "failed"
            );
        }
    }
}
