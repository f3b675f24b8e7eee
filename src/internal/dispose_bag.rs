//! Internal disposal bag for managing release hooks.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{BoxError, DisposalFailure};

type SyncRelease = Box<dyn FnOnce() -> Result<(), BoxError> + Send>;
type AsyncRelease = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Release handle captured for one produced instance.
pub(crate) enum Disposer {
    Sync { service: &'static str, release: SyncRelease },
    Async { service: &'static str, release: AsyncRelease },
}

impl Disposer {
    pub(crate) fn sync<F>(service: &'static str, release: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Disposer::Sync { service, release: Box::new(release) }
    }

    pub(crate) fn asynchronous<F>(service: &'static str, release: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send + 'static,
    {
        Disposer::Async { service, release: Box::new(release) }
    }
}

/// Append-only list of release handles in capture order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Disposer>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, disposer: Disposer) {
        self.entries.push(disposer);
    }

    /// Takes every captured handle, leaving the bag empty.
    pub(crate) fn take(&mut self) -> Vec<Disposer> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Releases `entries` in reverse capture order, awaiting async handles.
///
/// Every handle is attempted; errors and panics are collected.
pub(crate) async fn release_all_async(mut entries: Vec<Disposer>) -> Vec<DisposalFailure> {
    let mut failures = Vec::new();
    while let Some(disposer) = entries.pop() {
        let (service, outcome) = match disposer {
            Disposer::Sync { service, release } => (service, run_sync(release)),
            Disposer::Async { service, release } => {
                let outcome = match AssertUnwindSafe(async move { release().await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(payload) => Err(panic_message(payload)),
                };
                (service, outcome)
            }
        };
        record(&mut failures, service, outcome);
    }
    failures
}

/// Releases `entries` in reverse capture order without awaiting.
///
/// Async handles cannot be run here; each is reported as a failure.
pub(crate) fn release_all_sync(mut entries: Vec<Disposer>) -> Vec<DisposalFailure> {
    let mut failures = Vec::new();
    while let Some(disposer) = entries.pop() {
        let (service, outcome) = match disposer {
            Disposer::Sync { service, release } => (service, run_sync(release)),
            Disposer::Async { service, .. } => (
                service,
                Err("service only supports asynchronous disposal; use close_async".to_string()),
            ),
        };
        record(&mut failures, service, outcome);
    }
    failures
}

fn run_sync(release: SyncRelease) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(release)) {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(payload) => Err(panic_message(payload)),
    }
}

fn record(failures: &mut Vec<DisposalFailure>, service: &'static str, outcome: Result<(), String>) {
    match outcome {
        Ok(()) => tracing::debug!(service, "released disposable"),
        Err(message) => {
            tracing::warn!(service, %message, "disposable failed to release");
            failures.push(DisposalFailure { service, message });
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
