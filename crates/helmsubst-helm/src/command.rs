use std::path::{Path, PathBuf};

/// One helm invocation: arguments plus an optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelmCommand {
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl HelmCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// The helm subcommand, e.g. `pull` or `template`.
    pub fn subcommand(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }

    /// Value following `flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HelmError {
    #[error("failed to run {binary}: is helm installed?")]
    NotFound {
        binary: String,
        source: std::io::Error,
    },

    #[error("helm command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("helm output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },

    #[error("path is not valid UTF-8: {0}")]
    InvalidPath(PathBuf),
}
