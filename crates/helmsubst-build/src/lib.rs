//! Chart resolution, rendering, and revision staging for the helm envsubst plugin.
//!
//! # Phases
//!
//! ```text
//! argocd-helm-envsubst-plugin build    (Argo CD "init")
//!   BuildPipeline::run(key) ── descriptors → helm pull → dependency build
//!                              → envsubst values → helm template
//!                              → <temp>/<app>-<revision>/<name>/build.yaml
//!
//! argocd-helm-envsubst-plugin render   (Argo CD "generate")
//!   render::collect_manifests(key) ── <temp>/<app>-<revision>/*/build.yaml
//! ```
//!
//! Both phases must be given the same [`RevisionKey`](helmsubst_core::RevisionKey).

pub mod chart;
pub mod credentials;
pub mod error;
pub mod pipeline;
pub mod render;
pub mod staging;
pub mod template;

pub use credentials::{CredentialResolver, FileCredentialResolver, NoCredentials};
pub use error::{PipelineError, StagingError, StepError};
pub use pipeline::{ApplicationOutcome, BuildOptions, BuildPipeline, BuildReport, SkipReason};
pub use staging::StagingStore;
