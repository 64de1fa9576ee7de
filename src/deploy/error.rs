use crate::env::PromptError;
use crate::transport::{FileOp, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Remote {operation} failed for {path}: {source}")]
    Transport {
        operation: FileOp,
        path: String,
        #[source]
        source: TransportError,
    },

    #[error("Command session {operation} failed: {source}")]
    CommandSession {
        operation: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("Env resolution failed: {0}")]
    Prompt(#[from] PromptError),

    #[error("Deployment already ran; create a new deployer to run again")]
    AlreadyRun,
}

impl DeployError {
    /// Error mapper for a file-transport call.
    pub fn transport(operation: FileOp, path: &str) -> impl FnOnce(TransportError) -> Self {
        let path = path.to_string();
        move |source| DeployError::Transport {
            operation,
            path,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
