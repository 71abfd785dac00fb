use std::fmt;
use std::path::PathBuf;
use thiserror::Error as ThisError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Malformed suite, test case, directive or expectation. Always raised before
/// any backend I/O for the step it concerns.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SpecError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("unsupported execution: {0}")]
    UnsupportedExecution(String),

    #[error("invalid testcase: {0}")]
    InvalidTestcase(String),

    #[error("invalid suite: {0}")]
    InvalidSuite(String),
}

/// Comparator mismatch or actual/expected count mismatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    pub fn with_sides(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let (Some(e), Some(a)) = (&self.expected, &self.actual) {
            write!(f, "\n  expected: {e}\n  actual:   {a}")?;
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailure {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Specification,
    Execution,
    Assertion,
}

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Specification(#[from] SpecError),

    #[error("{step} failed: {source:#}")]
    Execution {
        step: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl Error {
    pub fn execution(step: impl fmt::Display, source: anyhow::Error) -> Self {
        Self::Execution {
            step: step.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Specification(_) | Error::Io { .. } | Error::Parse { .. } => {
                ErrorKind::Specification
            }
            Error::Execution { .. } => ErrorKind::Execution,
            Error::Assertion(_) => ErrorKind::Assertion,
        }
    }
}
