use anyhow::Context;
use helmsubst_build::StagingStore;
use helmsubst_build::render::collect_manifests;
use helmsubst_core::{AmbientContext, PluginConfig};

pub fn render(
    config: &PluginConfig,
    app_name: Option<String>,
    revision: Option<String>,
) -> anyhow::Result<()> {
    let context = AmbientContext::capture();
    let key = super::revision_key(&context, app_name, revision);
    let store = StagingStore::new(&config.paths.temp_root);

    let manifests = collect_manifests(&store, &key)
        .with_context(|| format!("rendering revision {key}"))?;
    tracing::info!(revision = %key, count = manifests.len(), "rendering staged manifests");

    for manifest in manifests {
        println!("{}", manifest.content);
    }
    Ok(())
}
