//! `engine` crate: ordered workflow execution, validation, dry runs and the
//! production transports.

pub mod error;
pub mod executor;
pub mod models;
pub mod rules;
pub mod tester;
pub mod transports;
pub mod validator;

pub use error::EngineError;
pub use executor::{builtin_registry, StepRegistry, WorkflowEngine};
pub use models::{ValidationReport, WorkflowResult};
pub use rules::{check_submission, FieldErrors};
pub use tester::{TestReport, WorkflowTester};
pub use validator::{parse_workflow, validate_json, validate_workflow};
