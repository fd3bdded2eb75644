use crate::error::StepError;
use crate::staging::write_private_file;
use helmsubst_core::ApplicationDescriptor;
use helmsubst_core::envsubst::substitute;
use helmsubst_helm::{HelmClient, HelmExecutor};
use std::path::{Path, PathBuf};

/// Values file written next to the chart when a descriptor carries inline values.
pub const OVERRIDE_VALUES_FILE: &str = "override.values.yaml";

/// Renders a resolved chart with `helm template`.
pub struct TemplateRenderer<'a, E: HelmExecutor> {
    helm: &'a HelmClient<E>,
    environment: &'a [(String, String)],
    default_namespace: Option<&'a str>,
}

impl<'a, E: HelmExecutor> TemplateRenderer<'a, E> {
    pub fn new(
        helm: &'a HelmClient<E>,
        environment: &'a [(String, String)],
        default_namespace: Option<&'a str>,
    ) -> Self {
        Self {
            helm,
            environment,
            default_namespace,
        }
    }

    /// Render `chart_dir` for `descriptor` and return the manifest text.
    pub async fn render(
        &self,
        descriptor: &ApplicationDescriptor,
        chart_dir: &Path,
    ) -> Result<String, StepError> {
        let values_file = match &descriptor.values_override {
            Some(values) => Some(self.write_values(chart_dir, values)?),
            None => None,
        };

        let namespace = descriptor.namespace.as_deref().or(self.default_namespace);
        tracing::info!(
            app = %descriptor.name,
            namespace = namespace.unwrap_or_default(),
            overrides = values_file.is_some(),
            "rendering chart"
        );

        self.helm
            .template(&descriptor.name, chart_dir, namespace, values_file.as_deref())
            .await
            .map_err(|e| StepError::Template { source: e })
    }

    fn write_values(&self, chart_dir: &Path, values: &str) -> Result<PathBuf, StepError> {
        let path = chart_dir.join(OVERRIDE_VALUES_FILE);
        let content = substitute(
            values.as_bytes(),
            self.environment.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );

        write_private_file(&path, &content).map_err(|e| StepError::ValuesWrite {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}
