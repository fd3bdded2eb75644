use crate::command::{HelmCommand, HelmError};
use crate::executor::{HelmExecutor, RealExecutor};
use helmsubst_core::ChartReference;
use std::path::Path;

/// Helm operations client, parameterized over the executor for testability.
pub struct HelmClient<E: HelmExecutor = RealExecutor> {
    executor: E,
}

impl HelmClient<RealExecutor> {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            executor: RealExecutor::new(binary),
        }
    }
}

impl Default for HelmClient<RealExecutor> {
    fn default() -> Self {
        Self::with_executor(RealExecutor::default())
    }
}

impl<E: HelmExecutor> HelmClient<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// `helm pull <chart> --repo <url> [--version <rev>] --untar --untardir <dir>`
    ///
    /// The chart lands in `<untar_dir>/<chart_name>`.
    pub async fn pull(&self, chart: &ChartReference, untar_dir: &Path) -> Result<(), HelmError> {
        let mut command = HelmCommand::new([
            "pull",
            chart.chart_name.as_str(),
            "--repo",
            chart.repository_url.as_str(),
        ]);
        if !chart.target_revision.is_empty() {
            command = command.arg("--version").arg(chart.target_revision.as_str());
        }
        let command = command
            .arg("--untar")
            .arg("--untardir")
            .arg(path_str(untar_dir)?);

        self.executor.exec(&command).await?;
        Ok(())
    }

    /// `helm dependency build --repository-config <file>`, run inside `chart_dir`.
    pub async fn dependency_build(
        &self,
        chart_dir: &Path,
        repository_config: &Path,
    ) -> Result<String, HelmError> {
        let command = HelmCommand::new(["dependency", "build", "--repository-config"])
            .arg(path_str(repository_config)?)
            .current_dir(chart_dir);

        self.executor.exec(&command).await
    }

    /// `helm template <release> <chart> [--namespace <ns>] [--values <file>]`
    ///
    /// Returns the rendered manifest.
    pub async fn template(
        &self,
        release: &str,
        chart_dir: &Path,
        namespace: Option<&str>,
        values_file: Option<&Path>,
    ) -> Result<String, HelmError> {
        let mut command = HelmCommand::new(["template", release, path_str(chart_dir)?]);
        if let Some(ns) = namespace.filter(|ns| !ns.is_empty()) {
            command = command.arg("--namespace").arg(ns);
        }
        if let Some(values) = values_file {
            command = command.arg("--values").arg(path_str(values)?);
        }

        self.executor.exec(&command).await
    }
}

fn path_str(path: &Path) -> Result<&str, HelmError> {
    path.to_str()
        .ok_or_else(|| HelmError::InvalidPath(path.to_path_buf()))
}
