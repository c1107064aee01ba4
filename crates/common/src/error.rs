//! Error types for the Vultr provider

use std::fmt;

use thiserror::Error;

/// Result type alias using the provider Error
pub type Result<T> = std::result::Result<T, Error>;

/// Logical API step that failed, reported alongside remote errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Get,
    List,
    Attach,
    Detach,
    Resize,
    Label,
    Delete,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Create => write!(f, "creating"),
            Step::Get => write!(f, "getting"),
            Step::List => write!(f, "listing"),
            Step::Attach => write!(f, "attaching"),
            Step::Detach => write!(f, "detaching"),
            Step::Resize => write!(f, "resizing"),
            Step::Label => write!(f, "setting label on"),
            Step::Delete => write!(f, "deleting"),
        }
    }
}

/// Failure reported by the remote API client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Provider error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Block storage ({id}) is not active after {checks} status checks")]
    ReadinessTimeout { id: String, checks: u32 },

    #[error("Invalid import format: {0}")]
    Format(String),

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Error {step} {kind} ({id}): {source}")]
    Provider {
        kind: &'static str,
        step: Step,
        id: String,
        #[source]
        source: ApiError,
    },
}

impl Error {
    /// Wrap a remote failure with the step and resource that triggered it.
    pub fn provider(kind: &'static str, step: Step, id: impl Into<String>, source: ApiError) -> Self {
        Error::Provider {
            kind,
            step,
            id: id.into(),
            source,
        }
    }

    /// Short category used as a diagnostic summary
    pub fn summary(&self) -> &'static str {
        match self {
            Error::Validation(_) => "Invalid configuration",
            Error::Parse(_) => "Unparseable value",
            Error::ReadinessTimeout { .. } => "Resource not ready",
            Error::Format(_) => "Invalid import identifier",
            Error::NotFound { .. } => "Resource not found",
            Error::Provider { .. } => "Remote API call failed",
        }
    }
}

/// Extension for annotating API results with call-site context.
pub trait ApiResultExt<T> {
    fn context(self, kind: &'static str, step: Step, id: &str) -> Result<T>;
}

impl<T> ApiResultExt<T> for std::result::Result<T, ApiError> {
    fn context(self, kind: &'static str, step: Step, id: &str) -> Result<T> {
        self.map_err(|e| Error::provider(kind, step, id, e))
    }
}
