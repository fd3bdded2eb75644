mod build;
mod generate;
mod render;

use anyhow::Context;
use helmsubst_core::{AmbientContext, PluginConfig, RevisionKey};
use std::path::Path;

pub use build::build;
pub use generate::generate;
pub use render::render;

pub(crate) fn load_config(path: &Path) -> anyhow::Result<PluginConfig> {
    PluginConfig::load(path).with_context(|| format!("loading {}", path.display()))
}

/// Revision key from explicit flags, falling back to the captured environment.
pub(crate) fn revision_key(
    context: &AmbientContext,
    app_name: Option<String>,
    revision: Option<String>,
) -> RevisionKey {
    RevisionKey::new(
        app_name.or_else(|| context.app_name.clone()).unwrap_or_default(),
        revision.or_else(|| context.revision.clone()).unwrap_or_default(),
    )
}
