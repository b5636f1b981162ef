//! Error types for the resolution engine.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error produced by user constructors, factories, initializers and disposers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cloneable handle to an error raised by user code.
///
/// Service records are shared between threads and rendered many times, so the
/// original error is kept behind an `Arc`.
#[derive(Clone)]
pub struct SharedError(Arc<dyn std::error::Error + Send + Sync>);

impl SharedError {
    pub fn new(error: BoxError) -> Self {
        Self(Arc::from(error))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(message.into().into())
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<BoxError> for SharedError {
    fn from(error: BoxError) -> Self {
        Self::new(error)
    }
}

/// A disposer that failed during container teardown.
#[derive(Debug, Clone)]
pub struct DisposeFailure {
    /// Formatted name of the service whose instance failed to dispose.
    pub service: String,
    pub error: SharedError,
}

impl fmt::Display for DisposeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]: {}", self.service, self.error)
    }
}

/// Errors surfaced by the container.
///
/// Every failed resolution is reported through [`ContainerError::Resolution`], whose
/// message carries the full construction trace with failing nodes marked.
///
/// # Examples
///
/// ```rust
/// use ferrous_resolve::ContainerError;
///
/// let err = ContainerError::Resolution {
///     message: "parameter not configured: [p] of service [B]".to_string(),
///     trace: "A\n\tB\n\t\t!p <---------------\n".to_string(),
///     source: None,
/// };
/// assert!(err.to_string().starts_with("parameter not configured"));
/// ```
#[derive(Debug, Clone, Error)]
pub enum ContainerError {
    /// A service could not be built; `trace` is the rendered construction tree.
    #[error("{message}\n\n{trace}")]
    Resolution {
        message: String,
        trace: String,
        #[source]
        source: Option<SharedError>,
    },
    /// One or more disposers failed; every failure is listed.
    #[error("error disposing container\n{}", format_failures(.0))]
    Dispose(Vec<DisposeFailure>),
    /// The container behind a deferred factory or lazy value is gone.
    #[error("container is disposed")]
    Disposed,
    /// A resolved value is not of the requested Rust type.
    #[error("type mismatch: service [{service}] is not a [{expected}]")]
    TypeMismatch {
        service: String,
        expected: &'static str,
    },
    /// A Rust type was requested that has no registered type definition.
    #[error("rust type [{0}] is not registered")]
    UnknownRustType(&'static str),
    /// Invalid registration or settings input.
    #[error("registration error: {0}")]
    Registration(String),
}

impl ContainerError {
    /// The rendered construction trace, if this is a resolution failure.
    pub fn trace(&self) -> Option<&str> {
        match self {
            ContainerError::Resolution { trace, .. } => Some(trace),
            _ => None,
        }
    }

    /// The failing node's message without the trace.
    pub fn message(&self) -> String {
        match self {
            ContainerError::Resolution { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

fn format_failures(failures: &[DisposeFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("\t{}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for container operations.
pub type DiResult<T> = Result<T, ContainerError>;
