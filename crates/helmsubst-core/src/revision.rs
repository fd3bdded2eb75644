//! Revision identity shared by the build and render phases.
//!
//! Argo CD runs the plugin's `build` (init) and `render` (generate) commands
//! as separate processes. They find each other's artifacts through the
//! [`RevisionKey`], so both must be handed the same key. [`AmbientContext`]
//! captures the process environment once so a key and the substitution
//! environment are never re-read mid-run.

use std::fmt;
use std::path::{Path, PathBuf};

pub const APP_NAME_VAR: &str = "ARGOCD_APP_NAME";
pub const APP_REVISION_VAR: &str = "ARGOCD_APP_REVISION_SHORT";
pub const APP_NAMESPACE_VAR: &str = "ARGOCD_APP_NAMESPACE";

pub const DEFAULT_APP_NAME: &str = "default-app-name";
pub const DEFAULT_APP_REVISION: &str = "default-app-revision";

/// Identity of one build/render pair: `<app>-<revision>`.
///
/// # Examples
///
/// ```
/// use helmsubst_core::RevisionKey;
/// use std::path::Path;
///
/// let key = RevisionKey::new("app1", "rev123");
/// assert_eq!(key.dir_name(), "app1-rev123");
/// assert_eq!(key.dir_in(Path::new("/tmp")), Path::new("/tmp/app1-rev123"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionKey {
    app_name: String,
    revision: String,
}

impl RevisionKey {
    /// Build a key; empty parts fall back to the default sentinels so the key
    /// is always well-formed.
    pub fn new(app_name: impl Into<String>, revision: impl Into<String>) -> Self {
        let app_name = app_name.into();
        let revision = revision.into();
        Self {
            app_name: or_default(app_name, DEFAULT_APP_NAME),
            revision: or_default(revision, DEFAULT_APP_REVISION),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Directory name of the revision under the temp root.
    pub fn dir_name(&self) -> String {
        format!("{}-{}", self.app_name, self.revision)
    }

    pub fn dir_in(&self, root: &Path) -> PathBuf {
        root.join(self.dir_name())
    }
}

impl fmt::Display for RevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dir_name())
    }
}

fn or_default(value: String, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_owned()
    } else {
        value
    }
}

/// Snapshot of the process environment taken once per run.
#[derive(Debug, Clone, Default)]
pub struct AmbientContext {
    /// `ARGOCD_APP_NAME`
    pub app_name: Option<String>,
    /// `ARGOCD_APP_REVISION_SHORT`
    pub revision: Option<String>,
    /// `ARGOCD_APP_NAMESPACE`, used when a descriptor has no namespace
    pub namespace: Option<String>,
    /// All variables in enumeration order, for placeholder substitution.
    pub environment: Vec<(String, String)>,
}

impl AmbientContext {
    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are dropped.
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(k, v)| {
            Some((k.into_string().ok()?, v.into_string().ok()?))
        }))
    }

    /// Build a context from explicit variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let environment: Vec<(String, String)> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let lookup = |name: &str| {
            environment
                .iter()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.clone())
        };

        Self {
            app_name: lookup(APP_NAME_VAR),
            revision: lookup(APP_REVISION_VAR),
            namespace: lookup(APP_NAMESPACE_VAR),
            environment,
        }
    }

    /// Revision key derived from the captured identifiers.
    pub fn revision_key(&self) -> RevisionKey {
        RevisionKey::new(
            self.app_name.clone().unwrap_or_default(),
            self.revision.clone().unwrap_or_default(),
        )
    }
}
