use std::path::PathBuf;

/// Everything that can go wrong while patching a project.
///
/// A missing target file is *not* an error: [`crate::patch`] reports it as
/// [`crate::PatchOutcome::Aborted`] so the host build keeps going.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest: {0}")]
    Manifest(String),

    #[error("project file: {0}")]
    Parse(String),

    #[error("config: {0}")]
    Config(String),

    #[error("invalid setting '{name}': {reason}")]
    InvalidSetting { name: String, reason: String },
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

impl From<toml::de::Error> for PatchError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(format!("TOML Error: {error}"))
    }
}
