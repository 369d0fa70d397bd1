//! `steps` crate: the form/workflow data model, the `StepExecutor` trait and
//! the built-in executors for condition, notification, action and
//! integration steps.
//!
//! The engine crate dispatches each step through a `StepExecutor` trait
//! object; everything that leaves the process goes through the traits in
//! [`transport`].

pub mod builtin;
pub mod condition;
pub mod environment;
pub mod error;
pub mod mock;
pub mod models;
pub mod template;
pub mod traits;
pub mod transport;
pub mod value;

pub use environment::Environment;
pub use error::{StepError, TransportError};
pub use models::{FormData, FormDefinition, StepKind, Submission, WorkflowStep};
pub use traits::{StepExecutor, StepOutcome, WorkflowContext};
pub use transport::Transports;
