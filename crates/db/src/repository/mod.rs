//! Repository functions: one function per database operation.
//!
//! Every function takes a `&DbPool` and returns a `Result<T, DbError>`.
//! No business logic, no domain types: pure SQL.

pub mod forms;
pub mod records;
pub mod runs;
pub mod submissions;
