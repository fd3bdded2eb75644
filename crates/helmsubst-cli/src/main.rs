mod commands;
mod logging;

use clap::{Args, Parser, Subcommand};
use helmsubst_core::config::default_config_path;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "argocd-helm-envsubst-plugin",
    about = "Render helm charts for Argo CD with #VAR# environment substitution"
)]
#[command(version)]
struct Cli {
    /// Plugin configuration file
    #[arg(long, global = true, env = "HELMSUBST_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,
    /// Directory receiving plugin.log (default: /tmp/argocd-helm-envsubst-plugin/)
    #[arg(long, global = true)]
    log_location: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull, template and stage every application (Argo CD init)
    Build {
        /// Directory holding the application descriptors
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Directory for generated repository configs (default: /helm-working-dir/)
        #[arg(long)]
        repository_path: Option<PathBuf>,
        /// Registry credentials file (default: /helm-working-dir/plugin-repositories/repositories.yaml)
        #[arg(long)]
        helm_registry_secret_config_path: Option<PathBuf>,
        #[command(flatten)]
        revision: RevisionArgs,
    },
    /// Print the manifests staged by `build` (Argo CD generate)
    Render {
        /// Application path; accepted for plugin compatibility
        #[arg(long)]
        path: Option<PathBuf>,
        #[command(flatten)]
        revision: RevisionArgs,
    },
    /// Substitute #VAR# placeholders from stdin to stdout
    Generate,
}

/// Overrides for the revision identity captured from the environment.
#[derive(Args)]
struct RevisionArgs {
    /// Application name [default: $ARGOCD_APP_NAME]
    #[arg(long)]
    app_name: Option<String>,
    /// Application revision [default: $ARGOCD_APP_REVISION_SHORT]
    #[arg(long)]
    revision: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = commands::load_config(&cli.config)?;
    if let Some(dir) = cli.log_location {
        config.paths.log_location = dir;
    }
    logging::init(&config.paths.log_location);

    match cli.command {
        Commands::Build {
            path,
            repository_path,
            helm_registry_secret_config_path,
            revision,
        } => {
            if let Some(dir) = repository_path {
                config.paths.repository_config_dir = dir;
            }
            if let Some(file) = helm_registry_secret_config_path {
                config.paths.credentials_path = file;
            }
            commands::build(&config, &path, revision.app_name, revision.revision).await?
        }
        Commands::Render { path, revision } => {
            if let Some(path) = path {
                tracing::debug!(path = %path.display(), "render ignores the application path");
            }
            commands::render(&config, revision.app_name, revision.revision)?
        }
        Commands::Generate => commands::generate()?,
    }

    Ok(())
}
