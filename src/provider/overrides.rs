//! Test-time service substitution.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::scope::EngineScope;
use crate::descriptors::AnyArc;
use crate::internal::FastHashMap;
use crate::key::ServiceIdentifier;

/// Tokens are never reused, so a token identifies one override region for
/// the life of the process.
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// An override in effect for some identifier.
#[derive(Clone)]
pub(crate) struct ActiveOverride {
    pub(crate) token: u64,
    pub(crate) instance: AnyArc,
}

/// Per-scope override entries, innermost last.
///
/// Each push gets a token so a guard removes exactly its own entry even when
/// guards for the same identifier are dropped out of order.
#[derive(Default)]
pub(crate) struct OverrideStack {
    /// Live entries; lets lookups skip the lock when nothing is overridden
    active: AtomicUsize,
    entries: Mutex<FastHashMap<ServiceIdentifier, Vec<ActiveOverride>>>,
}

impl OverrideStack {
    pub(crate) fn push(&self, identifier: ServiceIdentifier, instance: AnyArc) -> u64 {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock();
        entries
            .entry(identifier)
            .or_default()
            .push(ActiveOverride { token, instance });
        self.active.fetch_add(1, Ordering::Release);
        token
    }

    pub(crate) fn pop(&self, identifier: &ServiceIdentifier, token: u64) {
        let mut entries = self.entries.lock();
        let Some(stack) = entries.get_mut(identifier) else {
            return;
        };
        if let Some(position) = stack.iter().rposition(|entry| entry.token == token) {
            stack.remove(position);
            self.active.fetch_sub(1, Ordering::Release);
        }
        if stack.is_empty() {
            entries.remove(identifier);
        }
    }

    /// Innermost override for `identifier`, falling back to a wildcard-key override.
    pub(crate) fn find(&self, identifier: &ServiceIdentifier) -> Option<ActiveOverride> {
        if self.active.load(Ordering::Acquire) == 0 {
            return None;
        }

        let entries = self.entries.lock();
        let innermost = |id: &ServiceIdentifier| entries.get(id).and_then(|stack| stack.last()).cloned();

        innermost(identifier).or_else(|| identifier.wildcard().and_then(|wildcard| innermost(&wildcard)))
    }
}

/// Overrides consumed while producing one cached instance.
///
/// Recorders nest along a resolution: recording into one also records into
/// every enclosing recorder, so an instance built on top of another that
/// used an override is bound to that override too.
#[derive(Default)]
pub(crate) struct OverrideUse {
    used: Mutex<Vec<(ServiceIdentifier, u64)>>,
    parent: Option<Arc<OverrideUse>>,
}

impl OverrideUse {
    pub(crate) fn nested(parent: Option<Arc<OverrideUse>>) -> Arc<Self> {
        Arc::new(Self {
            used: Mutex::new(Vec::new()),
            parent,
        })
    }

    pub(crate) fn record(&self, identifier: &ServiceIdentifier, token: u64) {
        let mut recorder = Some(self);
        while let Some(current) = recorder {
            let mut used = current.used.lock();
            if !used.iter().any(|(_, seen)| *seen == token) {
                used.push((identifier.clone(), token));
            }
            drop(used);
            recorder = current.parent.as_deref();
        }
    }

    pub(crate) fn take(&self) -> Vec<(ServiceIdentifier, u64)> {
        std::mem::take(&mut *self.used.lock())
    }
}

/// Bounded override region. Dropping the guard removes the override it installed.
///
/// Returned by `override_service` and `override_keyed_service`. Nested guards
/// for the same service stack: the innermost live one wins, and dropping it
/// restores the next outer one.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// # async fn example() -> ferrous_ioc::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_instance(String::from("real"));
/// let provider = services.build()?;
///
/// {
///     let _guard = provider.override_service(Arc::new(String::from("fake")))?;
///     assert_eq!(*provider.get_required::<String>().await?, "fake");
/// }
/// assert_eq!(*provider.get_required::<String>().await?, "real");
/// # Ok(())
/// # }
/// ```
#[must_use = "the override ends as soon as the guard is dropped"]
pub struct OverrideGuard {
    engine: Arc<EngineScope>,
    identifier: ServiceIdentifier,
    token: u64,
}

impl OverrideGuard {
    pub(crate) fn new(engine: Arc<EngineScope>, identifier: ServiceIdentifier, token: u64) -> Self {
        Self { engine, identifier, token }
    }

    /// Identifier this guard overrides.
    pub fn identifier(&self) -> &ServiceIdentifier {
        &self.identifier
    }
}

impl Drop for OverrideGuard {
    fn drop(&mut self) {
        self.engine.overrides().pop(&self.identifier, self.token);
        self.engine.forget_override(self.token);
        tracing::debug!(service = %self.identifier, "override removed");
    }
}

impl std::fmt::Debug for OverrideGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideGuard")
            .field("identifier", &self.identifier)
            .field("token", &self.token)
            .finish()
    }
}
