//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! repository test suite.
//!
//! # Modules
//!
//! - `fixtures`: A sample `Customer` entity and canned values
//! - `builders`: Builder for customer documents with sensible defaults
//! - `database`: MongoDB container management and per-test databases
//! - `assertions`: Assertion helpers for audit fields and ordering
//! - `generators`: Property-based and fake data generators
//! - `logging`: One-time log subscriber setup for tests

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;
pub mod logging;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::init_test_tracing;
