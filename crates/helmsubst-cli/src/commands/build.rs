use helmsubst_build::{BuildOptions, BuildPipeline, FileCredentialResolver, StagingStore};
use helmsubst_core::{AmbientContext, PluginConfig};
use helmsubst_helm::HelmClient;
use std::path::Path;

pub async fn build(
    config: &PluginConfig,
    source_dir: &Path,
    app_name: Option<String>,
    revision: Option<String>,
) -> anyhow::Result<()> {
    let context = AmbientContext::capture();
    let key = super::revision_key(&context, app_name, revision);

    let helm = HelmClient::new(config.helm.binary.as_str());
    let store = StagingStore::new(&config.paths.temp_root);
    let credentials = FileCredentialResolver::new(
        &config.paths.credentials_path,
        config.helm.authenticated_registries.clone(),
    );
    let options = BuildOptions {
        source_dir: source_dir.to_path_buf(),
        repository_config_dir: config.paths.repository_config_dir.clone(),
        reject_insecure_repositories: config.policy.reject_insecure_repositories,
    };

    let report = BuildPipeline::new(&helm, &store, &credentials, &context, options)
        .run(&key)
        .await?;

    let failed = report.failed().count();
    if failed > 0 {
        anyhow::bail!(
            "{failed} application(s) failed to build; see {}",
            report.revision_dir.display()
        );
    }
    Ok(())
}
