//! Step-level error types.

use thiserror::Error;

/// Why a step did not succeed.
///
/// The message is shown to form owners verbatim (prefixed with the step
/// title by the engine), so variants display as the bare message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StepError {
    /// Missing or malformed configuration, detected before any network call.
    #[error("{0}")]
    Config(String),

    /// A collaborator (mail server, HTTP endpoint, record sink) failed.
    #[error("{0}")]
    Transport(String),
}

impl StepError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Error raised by a transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
