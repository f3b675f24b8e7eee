//! Error types for the IoC container.

use std::fmt;
use std::sync::Arc;

/// Boxed error returned by user code (factories, disposal hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Dependency injection errors
///
/// Represents the various error conditions that can occur while compiling
/// call sites, resolving services, or tearing scopes down.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::DiError;
///
/// let circular = DiError::CircularDependency(vec!["A".into(), "B".into(), "A".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency detected: A -> B -> A");
///
/// let missing = DiError::NotRegistered("app::Mailer".into());
/// assert_eq!(missing.to_string(), "No service registered for app::Mailer");
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum DiError {
    /// No descriptor exists for the requested identifier
    #[error("No service registered for {0}")]
    NotRegistered(String),
    /// Cycle found while compiling or producing a service (includes path)
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CircularDependency(Vec<String>),
    /// A constructor dependency has no registration and no default
    #[error("Unable to resolve {parameter} while activating {owner}")]
    UnresolvableParameter {
        owner: &'static str,
        parameter: String,
    },
    /// Operation attempted on a provider or scope after teardown
    #[error("Cannot access a closed {0}")]
    ObjectDisposed(&'static str),
    /// One or more disposables failed during teardown
    #[error("{} disposable(s) failed during teardown: {}", .0.len(), join_failures(.0))]
    Disposal(Vec<DisposalFailure>),
    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),
    /// A factory or constructor reported an error
    #[error("Failed to produce {service}: {source}")]
    Factory {
        service: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
    /// Invalid lifetime resolution (e.g., scoped from root)
    #[error("Lifetime error: {0}")]
    WrongLifetime(String),
    /// Maximum dependency depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// A registration used a key that cannot identify a service
    #[error("Invalid service key for {0}")]
    InvalidKey(String),
    /// The container's provider is already built; registrations are closed
    #[error("Service container is already built")]
    AlreadyBuilt,
    /// Build-time validation found broken registrations
    #[error("{} invalid registration(s): {}", .0.len(), join_errors(.0))]
    InvalidRegistrations(Vec<DiError>),
}

impl DiError {
    /// Wraps an error raised by user code while producing `T`.
    pub fn factory<T: ?Sized + 'static>(error: impl Into<BoxError>) -> Self {
        DiError::Factory {
            service: std::any::type_name::<T>().to_string(),
            source: Arc::from(error.into()),
        }
    }
}

/// A single release that failed while a scope was closing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalFailure {
    /// Type name of the service whose release failed
    pub service: &'static str,
    /// Error or panic message
    pub message: String,
}

impl fmt::Display for DisposalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.service, self.message)
    }
}

fn join_failures(failures: &[DisposalFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_errors(errors: &[DiError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for DI operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;
