use helmsubst_helm::HelmError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("failed to clean up staging directory {path}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to create directory {path}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read staged artifact {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("staging directory {0} not found; run the build phase for this revision first")]
    RevisionMissing(PathBuf),
    #[error("staging path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
    #[error("invalid artifact pattern")]
    Pattern { source: glob::PatternError },
    #[error("failed to list staged artifacts")]
    Glob { source: glob::GlobError },
}

/// A step failure that stops one application.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to read descriptor")]
    Descriptor { source: helmsubst_core::Error },
    #[error("chart repository {url} does not use https")]
    InsecureRepository { url: String },
    #[error("helm pull failed")]
    Pull { source: HelmError },
    #[error("chart directory {0} does not exist after pull")]
    MissingChart(PathBuf),
    #[error("failed to read chart metadata")]
    ChartMetadata { source: helmsubst_core::Error },
    #[error("failed to resolve repository credentials")]
    Credentials { source: helmsubst_core::Error },
    #[error("failed to write repository config {path}")]
    RepositoryConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to generate repository config")]
    RepositoryConfig { source: helmsubst_core::Error },
    #[error("helm dependency build failed")]
    DependencyBuild { source: HelmError },
    #[error("failed to write override values {path}")]
    ValuesWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("helm template failed")]
    Template { source: HelmError },
    #[error("failed to stage artifact")]
    Staging { source: StagingError },
}

/// An error that stops the whole run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to read source directory {path}")]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to prepare revision directory")]
    Staging { source: StagingError },
}

/// Render an error with its full `source` chain on one line.
pub fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        out.push_str(": ");
        out.push_str(&source.to_string());
        current = source.source();
    }
    out
}
