use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LanError {
    #[error("Model invocation failed: {0}")]
    ModelInvocation(String),

    #[error("Failed to write transcript {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Conversation not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No assistant attached to this session")]
    NoAssistant,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LanError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Fold transport failures into `ModelInvocation` so callers of the
    /// assistant only ever see the model error class.
    pub fn into_model_error(self) -> Self {
        match self {
            Self::ModelInvocation(_) => self,
            other => Self::ModelInvocation(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, LanError>;
