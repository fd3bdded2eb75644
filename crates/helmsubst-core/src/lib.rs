//! Core types and configuration for the Argo CD helm envsubst plugin.
//!
//! This crate defines the application descriptor model
//! ([`ApplicationDescriptor`]), the `#KEY#` substitution
//! ([`envsubst::substitute`]), the revision identity shared by the build and
//! render phases ([`RevisionKey`]), Helm repository files, and the plugin
//! configuration ([`PluginConfig`]).

pub mod config;
pub mod descriptor;
pub mod envsubst;
pub mod error;
pub mod repository;
pub mod revision;

pub use config::{HelmConfig, PathsConfig, PluginConfig, PolicyConfig};
pub use descriptor::{ApplicationDescriptor, ChartReference};
pub use error::{Error, Result};
pub use repository::{ChartDependency, ChartMetadata, Repository, RepositoryConfig};
pub use revision::{AmbientContext, RevisionKey};
