use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification was cancelled")]
    Cancelled,

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("worker pool error: {0}")]
    WorkerPool(String),
}

impl VerifyError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VerifyError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, VerifyError::Cancelled)
    }
}

pub type Result<T, E = VerifyError> = std::result::Result<T, E>;
