//! `#KEY#` placeholder substitution.
//!
//! Every environment entry replaces each literal `#KEY#` in the input with
//! its value. Variables injected by Argo CD (`ARGOCD_*`) and Kubernetes
//! (`KUBERNETES_*`) are never substituted so they cannot leak into rendered
//! manifests through a colliding placeholder.
//!
//! Replacement is literal: no escaping, no nesting, and entries are applied
//! in the order given.

/// Prefixes of variable names that are never substituted.
pub const EXCLUDED_PREFIXES: &[&str] = &["ARGOCD_", "KUBERNETES_"];

const SIGIL: u8 = b'#';

/// Returns `true` if `key` belongs to an excluded namespace.
pub fn is_excluded(key: &str) -> bool {
    EXCLUDED_PREFIXES.iter().any(|prefix| key.starts_with(prefix))
}

/// Replace every `#KEY#` in `content` with the matching environment value.
///
/// # Examples
///
/// ```
/// use helmsubst_core::envsubst::substitute;
///
/// let out = substitute(b"env: #ENVIRONMENT#", [("ENVIRONMENT", "prod")]);
/// assert_eq!(out, b"env: prod");
/// ```
pub fn substitute<I, K, V>(content: &[u8], environment: I) -> Vec<u8>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut out = content.to_vec();

    for (key, value) in environment {
        let key = key.as_ref();
        if key.is_empty() {
            continue;
        }
        if is_excluded(key) {
            tracing::debug!(key, "skipping excluded variable");
            continue;
        }

        let mut placeholder = Vec::with_capacity(key.len() + 2);
        placeholder.push(SIGIL);
        placeholder.extend_from_slice(key.as_bytes());
        placeholder.push(SIGIL);

        out = replace_all(&out, &placeholder, value.as_ref().as_bytes());
    }

    out
}

/// String convenience over [`substitute`].
pub fn substitute_str<I, K, V>(content: &str, environment: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    // Keys and values are valid UTF-8, so splicing them into UTF-8 stays valid.
    String::from_utf8_lossy(&substitute(content.as_bytes(), environment)).into_owned()
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
