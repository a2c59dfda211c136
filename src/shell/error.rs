use thiserror::Error;

use crate::codec::CodecError;
use crate::config::ConfigError;

/// Errors surfaced by the shell to its host.
#[derive(Debug, Error)]
pub enum ShellError {
    /// The core produced bytes the shell cannot decode. Fatal: the dispatch
    /// loop stops.
    #[error("Protocol violation: {0}")]
    Protocol(#[source] CodecError),

    #[error("Failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("Failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No tokio runtime available to run the shell")]
    NoRuntime,

    #[error("Shell has stopped")]
    Stopped,

    #[error("Dispatch task failed: {0}")]
    Join(String),
}

impl ShellError {
    /// Whether this error means the core and shell disagree on the protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, ShellError::Protocol(_))
    }
}
