//! Engine-level error types.
//!
//! Step failures never surface here; they are recorded in the
//! `WorkflowResult`.  These errors cover definitions the engine refuses to
//! accept in the first place.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The workflow JSON does not match the step schema.
    #[error("invalid workflow definition: {0}")]
    InvalidDefinition(#[from] serde_json::Error),

    /// The workflow parsed but failed structural validation.
    #[error("workflow validation failed: {}", .0.join("; "))]
    Rejected(Vec<String>),
}
