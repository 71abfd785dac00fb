pub mod assertions;
pub mod backend;
pub mod comparator;
pub mod directive;
pub mod engine;
pub mod error;
pub mod expectation;
pub mod i18n;
pub mod interpreter;
pub mod report;
pub mod suite;
pub mod types;

pub use crate::backend::{Backend, Connector};
pub use crate::engine::{Orchestrator, Phase, RunSettings, SuiteContext, run_suite, run_suites};
pub use crate::error::{AssertionFailure, Error, ErrorKind, Result, SpecError};
pub use crate::suite::Suite;
