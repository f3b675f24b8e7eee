//! Diagnostic observers for resolution events.
//!
//! Observers are notified around every top-level resolution made through a
//! provider or scope (`get`, `get_required`, keyed and enumeration variants).
//! Nested dependency resolutions are not reported individually.

use std::sync::Arc;
use std::time::Duration;

use crate::error::DiError;
use crate::key::ServiceIdentifier;

/// Observer trait for resolution events.
///
/// Calls are made synchronously on the resolving task. Keep implementations
/// lightweight; queue expensive work elsewhere.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{DiError, DiObserver, ServiceCollection, ServiceIdentifier};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct CountingObserver {
///     resolved: AtomicUsize,
/// }
///
/// impl DiObserver for CountingObserver {
///     fn resolving(&self, _identifier: &ServiceIdentifier) {}
///
///     fn resolved(&self, _identifier: &ServiceIdentifier, _elapsed: Duration) {
///         self.resolved.fetch_add(1, Ordering::Relaxed);
///     }
///
///     fn resolution_failed(&self, identifier: &ServiceIdentifier, error: &DiError) {
///         eprintln!("{} failed: {}", identifier, error);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(CountingObserver::default()));
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a top-level resolution starts.
    fn resolving(&self, identifier: &ServiceIdentifier);

    /// Called after a top-level resolution succeeds.
    fn resolved(&self, identifier: &ServiceIdentifier, elapsed: Duration);

    /// Called when a top-level resolution fails.
    fn resolution_failed(&self, identifier: &ServiceIdentifier, error: &DiError);
}

/// Registered observers, shared by a provider and all its scopes.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn resolving(&self, identifier: &ServiceIdentifier) {
        for observer in &self.observers {
            observer.resolving(identifier);
        }
    }

    #[inline]
    pub(crate) fn resolved(&self, identifier: &ServiceIdentifier, elapsed: Duration) {
        for observer in &self.observers {
            observer.resolved(identifier, elapsed);
        }
    }

    #[inline]
    pub(crate) fn resolution_failed(&self, identifier: &ServiceIdentifier, error: &DiError) {
        for observer in &self.observers {
            observer.resolution_failed(identifier, error);
        }
    }
}

/// Built-in observer that emits `tracing` events.
///
/// Resolution start and success are logged at `DEBUG`, failures at `WARN`,
/// all under the target `ferrous_ioc::resolution`.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{LoggingObserver, ServiceCollection};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(LoggingObserver::new()));
/// ```
#[derive(Debug, Default)]
pub struct LoggingObserver {
    _private: (),
}

impl LoggingObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, identifier: &ServiceIdentifier) {
        tracing::debug!(target: "ferrous_ioc::resolution", service = %identifier, "resolving");
    }

    fn resolved(&self, identifier: &ServiceIdentifier, elapsed: Duration) {
        tracing::debug!(
            target: "ferrous_ioc::resolution",
            service = %identifier,
            elapsed_us = elapsed.as_micros() as u64,
            "resolved"
        );
    }

    fn resolution_failed(&self, identifier: &ServiceIdentifier, error: &DiError) {
        tracing::warn!(
            target: "ferrous_ioc::resolution",
            service = %identifier,
            error = %error,
            "resolution failed"
        );
    }
}
