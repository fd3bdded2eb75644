use crate::credentials::{CredentialResolver, generate_repository_config, write_repository_config};
use crate::error::StepError;
use crate::staging::remove_archives;
use helmsubst_core::{ApplicationDescriptor, ChartMetadata};
use helmsubst_helm::{HelmClient, HelmExecutor};
use std::path::{Path, PathBuf};

/// Fetches a descriptor's chart into a staging directory.
pub struct ChartResolver<'a, E: HelmExecutor> {
    helm: &'a HelmClient<E>,
}

impl<'a, E: HelmExecutor> ChartResolver<'a, E> {
    pub fn new(helm: &'a HelmClient<E>) -> Self {
        Self { helm }
    }

    /// Pull and untar the chart into `staging_dir`, drop leftover archives,
    /// and return the chart directory.
    pub async fn resolve(
        &self,
        descriptor: &ApplicationDescriptor,
        staging_dir: &Path,
    ) -> Result<PathBuf, StepError> {
        let chart = &descriptor.chart;
        tracing::info!(
            app = %descriptor.name,
            chart = %chart.chart_name,
            repo = %chart.repository_url,
            version = %chart.target_revision,
            "pulling chart"
        );

        self.helm
            .pull(chart, staging_dir)
            .await
            .map_err(|e| StepError::Pull { source: e })?;

        // Removal failures are logged inside; only a failed walk lands here.
        match remove_archives(staging_dir) {
            Ok(removed) if removed > 0 => {
                tracing::debug!(app = %descriptor.name, removed, "removed chart archives");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(app = %descriptor.name, error = %e, "archive cleanup incomplete"),
        }

        let chart_dir = staging_dir.join(&chart.chart_name);
        if !chart_dir.is_dir() {
            return Err(StepError::MissingChart(chart_dir));
        }
        Ok(chart_dir)
    }
}

/// Runs `helm dependency build` for charts that declare dependencies.
pub struct DependencyBuilder<'a, E: HelmExecutor, C: CredentialResolver> {
    helm: &'a HelmClient<E>,
    credentials: &'a C,
    repository_config_dir: &'a Path,
}

impl<'a, E: HelmExecutor, C: CredentialResolver> DependencyBuilder<'a, E, C> {
    pub fn new(helm: &'a HelmClient<E>, credentials: &'a C, repository_config_dir: &'a Path) -> Self {
        Self {
            helm,
            credentials,
            repository_config_dir,
        }
    }

    /// Returns `true` if dependencies were built.
    pub async fn build_if_needed(&self, app_name: &str, chart_dir: &Path) -> Result<bool, StepError> {
        let metadata =
            ChartMetadata::load(chart_dir).map_err(|e| StepError::ChartMetadata { source: e })?;

        if !metadata.has_dependencies() {
            tracing::debug!(app = app_name, "no dependencies found");
            return Ok(false);
        }

        tracing::info!(
            app = app_name,
            count = metadata.dependencies().len(),
            "building chart dependencies"
        );
        let config = generate_repository_config(&metadata, self.credentials)?;
        let config_path = write_repository_config(self.repository_config_dir, app_name, &config)?;

        let output = self
            .helm
            .dependency_build(chart_dir, &config_path)
            .await
            .map_err(|e| StepError::DependencyBuild { source: e })?;
        tracing::debug!(app = app_name, output = %output.trim(), "dependency build finished");

        Ok(true)
    }
}
