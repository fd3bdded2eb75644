use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Application descriptors ──
    #[error("failed to read descriptor {path}")]
    DescriptorRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not an application descriptor")]
    DescriptorParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("descriptor {path} is missing required field `{field}`")]
    DescriptorField { path: PathBuf, field: &'static str },

    // ── Repository credentials ──
    #[error("failed to read repository credentials from {path}")]
    CredentialsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse repository credentials at {path}")]
    CredentialsParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to serialize repository config")]
    RepositoryConfigSerialize { source: serde_yaml::Error },

    // ── Chart metadata ──
    #[error("failed to read chart metadata {path}")]
    ChartMetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse chart metadata {path}")]
    ChartMetadataParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}
