use crate::error::StagingError;
use helmsubst_core::RevisionKey;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File name of the rendered manifest inside each application directory.
pub const ARTIFACT_FILE_NAME: &str = "build.yaml";

/// Suffix of the packaged chart archives `helm pull` leaves behind.
const ARCHIVE_SUFFIX: &str = ".tgz";

/// Revision-scoped staging area shared by the build and render phases.
///
/// Layout:
///
/// ```text
/// <root>/<app>-<revision>/            revision directory
/// <root>/<app>-<revision>/<name>/     one per application
///     <chart>/                        untarred chart
///     build.yaml                      rendered manifest
/// ```
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn revision_dir(&self, key: &RevisionKey) -> PathBuf {
        key.dir_in(&self.root)
    }

    pub fn application_dir(&self, key: &RevisionKey, app_name: &str) -> PathBuf {
        self.revision_dir(key).join(app_name)
    }

    pub fn artifact_path(&self, key: &RevisionKey, app_name: &str) -> PathBuf {
        self.application_dir(key, app_name).join(ARTIFACT_FILE_NAME)
    }

    /// Remove and recreate the revision directory so every build pass starts
    /// from an empty directory.
    pub fn ensure_revision_dir(&self, key: &RevisionKey) -> Result<PathBuf, StagingError> {
        let dir = self.revision_dir(key);

        if dir.exists() {
            tracing::debug!(path = %dir.display(), "removing previous revision directory");
            std::fs::remove_dir_all(&dir).map_err(|e| StagingError::Cleanup {
                path: dir.clone(),
                source: e,
            })?;
        }
        create_private_dir(&dir)?;

        tracing::info!(path = %dir.display(), "created revision directory");
        Ok(dir)
    }

    /// Create (or empty) the directory of one application.
    pub fn prepare_application_dir(
        &self,
        key: &RevisionKey,
        app_name: &str,
    ) -> Result<PathBuf, StagingError> {
        let dir = self.application_dir(key, app_name);

        if dir.exists() {
            std::fs::remove_dir_all(&dir).map_err(|e| StagingError::Cleanup {
                path: dir.clone(),
                source: e,
            })?;
        }
        create_private_dir(&dir)?;

        Ok(dir)
    }

    /// Persist the rendered manifest of `app_name`, replacing any previous one.
    pub fn write_artifact(
        &self,
        key: &RevisionKey,
        app_name: &str,
        content: &str,
    ) -> Result<PathBuf, StagingError> {
        let path = self.artifact_path(key, app_name);
        if let Some(parent) = path.parent() {
            create_private_dir(parent)?;
        }

        write_private_file(&path, content.as_bytes()).map_err(|e| StagingError::Write {
            path: path.clone(),
            source: e,
        })?;

        Ok(path)
    }

    /// All staged artifacts of the revision, in glob order.
    ///
    /// # Errors
    ///
    /// [`StagingError::RevisionMissing`] if no build pass ran for `key`.
    pub fn list_artifacts(&self, key: &RevisionKey) -> Result<Vec<PathBuf>, StagingError> {
        let dir = self.revision_dir(key);
        if !dir.is_dir() {
            return Err(StagingError::RevisionMissing(dir));
        }

        let dir_str = dir
            .to_str()
            .ok_or_else(|| StagingError::InvalidPath(dir.clone()))?;
        let pattern = format!(
            "{}/*/{}",
            glob::Pattern::escape(dir_str),
            ARTIFACT_FILE_NAME
        );

        glob::glob(&pattern)
            .map_err(|e| StagingError::Pattern { source: e })?
            .map(|entry| entry.map_err(|e| StagingError::Glob { source: e }))
            .collect()
    }
}

/// Remove the `*.tgz` entries `helm pull` leaves at the top level of `dir`.
///
/// Only direct children are considered: archives inside the untarred chart,
/// such as vendored `charts/*.tgz` subcharts, are part of the chart.
/// Individual removal failures are logged and skipped. Returns the number of
/// entries removed.
pub fn remove_archives(dir: &Path) -> Result<usize, StagingError> {
    let mut archives = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| StagingError::Walk {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.file_name().to_string_lossy().ends_with(ARCHIVE_SUFFIX) {
            archives.push((entry.file_type().is_dir(), entry.into_path()));
        }
    }

    let mut removed = 0;
    for (is_dir, path) in archives {
        let result = if is_dir {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed chart archive");
                removed += 1;
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove chart archive"),
        }
    }

    Ok(removed)
}

fn create_private_dir(dir: &Path) -> Result<(), StagingError> {
    std::fs::create_dir_all(dir).map_err(|e| StagingError::Create {
        path: dir.to_path_buf(),
        source: e,
    })?;
    set_mode(dir, 0o700).map_err(|e| StagingError::Create {
        path: dir.to_path_buf(),
        source: e,
    })
}

/// Write `content` to `path` readable by the owner only.
///
/// New files are created with mode 0600; an existing file is narrowed to
/// 0600 as well.
pub(crate) fn write_private_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    set_mode(path, 0o600)?;
    file.write_all(content)?;
    file.flush()
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
