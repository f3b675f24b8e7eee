//! Scopes: the resolution contexts that own caches and disposables.
//!
//! Every provider has one root [`EngineScope`]; scopes created from it are
//! siblings that share the root and its call-site factory but keep their own
//! scoped cache, disposables and overrides.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use super::overrides::{ActiveOverride, OverrideGuard, OverrideStack, OverrideUse};
use crate::call_site::{CallSiteFactory, RuntimeResolver, ServiceCacheKey};
use crate::config::ProviderOptions;
use crate::descriptors::AnyArc;
use crate::error::{DiError, DiResult};
use crate::internal::{dispose_bag, CallSiteChain, ConcurrentMap, DisposeBag, Disposer, FastHashMap, ResolutionPath};
use crate::key::{ServiceIdentifier, ServiceKey};
use crate::observer::Observers;
use crate::traits::ResolverCore;

const OPEN: u8 = 0;
const CLOSING: u8 = 1;
const CLOSED: u8 = 2;

/// State shared by the root scope and every scope derived from it.
pub(crate) struct ProviderCore {
    pub(crate) factory: CallSiteFactory,
    pub(crate) options: ProviderOptions,
    pub(crate) observers: Observers,
}

/// Instance built while overrides were in effect, reusable while every one
/// of them is still the override in effect.
struct BoundInstance {
    overrides: Vec<(ServiceIdentifier, u64)>,
    value: AnyArc,
}

/// Caches, disposables and overrides of one scope.
pub(crate) struct EngineScope {
    /// `None` for the root itself
    root: Option<Arc<EngineScope>>,
    core: Arc<ProviderCore>,
    resolved: Mutex<FastHashMap<ServiceCacheKey, AnyArc>>,
    bound: Mutex<FastHashMap<ServiceCacheKey, Vec<BoundInstance>>>,
    construction_locks: ConcurrentMap<ServiceCacheKey, tokio::sync::Mutex<()>>,
    disposables: Mutex<DisposeBag>,
    overrides: OverrideStack,
    state: AtomicU8,
}

impl EngineScope {
    pub(crate) fn new_root(core: Arc<ProviderCore>) -> Arc<Self> {
        Arc::new(Self::with_root(None, core))
    }

    fn new_child(root: &Arc<EngineScope>) -> Arc<Self> {
        Arc::new(Self::with_root(Some(root.clone()), root.core.clone()))
    }

    fn with_root(root: Option<Arc<EngineScope>>, core: Arc<ProviderCore>) -> Self {
        Self {
            root,
            core,
            resolved: Mutex::new(FastHashMap::default()),
            bound: Mutex::new(FastHashMap::default()),
            construction_locks: ConcurrentMap::new(),
            disposables: Mutex::new(DisposeBag::default()),
            overrides: OverrideStack::default(),
            state: AtomicU8::new(OPEN),
        }
    }

    #[inline]
    pub(crate) fn is_root(&self) -> bool {
        self.root.is_none()
    }

    /// Name used in `ObjectDisposed` errors and logs.
    pub(crate) fn kind(&self) -> &'static str {
        if self.is_root() {
            "ServiceProvider"
        } else {
            "ServiceScope"
        }
    }

    pub(crate) fn options(&self) -> &ProviderOptions {
        &self.core.options
    }

    pub(crate) fn factory(&self) -> &CallSiteFactory {
        &self.core.factory
    }

    pub(crate) fn observers(&self) -> &Observers {
        &self.core.observers
    }

    pub(crate) fn overrides(&self) -> &OverrideStack {
        &self.overrides
    }

    pub(crate) fn root_engine(self: &Arc<Self>) -> Arc<Self> {
        match &self.root {
            Some(root) => root.clone(),
            None => self.clone(),
        }
    }

    /// Override visible from this scope: its own first, then the root's.
    pub(crate) fn find_override(&self, identifier: &ServiceIdentifier) -> Option<ActiveOverride> {
        self.overrides
            .find(identifier)
            .or_else(|| self.root.as_ref().and_then(|root| root.overrides.find(identifier)))
    }

    pub(crate) fn cached(&self, key: &ServiceCacheKey) -> Option<AnyArc> {
        self.resolved.lock().get(key).cloned()
    }

    pub(crate) fn store(&self, key: ServiceCacheKey, instance: AnyArc) {
        self.resolved.lock().insert(key, instance);
    }

    /// Instance for `key` built under overrides that `view` still sees in effect.
    pub(crate) fn bound_cached(
        &self,
        key: &ServiceCacheKey,
        view: &EngineScope,
    ) -> Option<(AnyArc, Vec<(ServiceIdentifier, u64)>)> {
        let bound = self.bound.lock();
        bound.get(key)?.iter().find_map(|entry| {
            let current = entry.overrides.iter().all(|(identifier, token)| {
                view.find_override(identifier)
                    .is_some_and(|active| active.token == *token)
            });
            current.then(|| (entry.value.clone(), entry.overrides.clone()))
        })
    }

    pub(crate) fn store_bound(&self, key: ServiceCacheKey, overrides: Vec<(ServiceIdentifier, u64)>, value: AnyArc) {
        self.bound
            .lock()
            .entry(key)
            .or_default()
            .push(BoundInstance { overrides, value });
    }

    /// Drops every instance bound to the override `token`, here and in the root.
    ///
    /// Their disposables stay captured and are released when the owning
    /// scope closes.
    pub(crate) fn forget_override(&self, token: u64) {
        let purge = |engine: &EngineScope| {
            engine.bound.lock().retain(|_, entries| {
                entries.retain(|entry| entry.overrides.iter().all(|(_, used)| *used != token));
                !entries.is_empty()
            });
        };
        purge(self);
        if let Some(root) = &self.root {
            purge(root);
        }
    }

    pub(crate) fn construction_lock(&self, key: &ServiceCacheKey) -> Arc<tokio::sync::Mutex<()>> {
        self.construction_locks
            .get_or_add(key, |_| tokio::sync::Mutex::new(()))
    }

    /// Appends a release handle; a scope that is no longer open hands it back.
    pub(crate) fn capture_disposable(&self, disposer: Disposer) -> Result<(), Disposer> {
        let mut bag = self.disposables.lock();
        if self.state.load(Ordering::Acquire) != OPEN {
            return Err(disposer);
        }
        bag.push(disposer);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    /// Fails once this scope, or the root it hangs off, has started closing.
    pub(crate) fn ensure_open(&self) -> DiResult<()> {
        if !self.is_open() {
            return Err(DiError::ObjectDisposed(self.kind()));
        }
        match &self.root {
            Some(root) if !root.is_open() => Err(DiError::ObjectDisposed(root.kind())),
            _ => Ok(()),
        }
    }

    /// Moves `Open -> Closing` and takes the disposables. `None` if already closing or closed.
    fn begin_close(&self) -> Option<Vec<Disposer>> {
        let mut bag = self.disposables.lock();
        if self
            .state
            .compare_exchange(OPEN, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        Some(bag.take())
    }

    fn finish_close(&self, failures: Vec<crate::error::DisposalFailure>) -> DiResult<()> {
        self.resolved.lock().clear();
        self.bound.lock().clear();
        self.construction_locks.clear();
        self.state.store(CLOSED, Ordering::Release);

        if failures.is_empty() {
            tracing::debug!(scope = self.kind(), "closed");
            Ok(())
        } else {
            tracing::warn!(scope = self.kind(), failed = failures.len(), "closed with disposal failures");
            Err(DiError::Disposal(failures))
        }
    }

    fn close_sync(&self) -> DiResult<()> {
        let Some(entries) = self.begin_close() else {
            return Ok(());
        };
        tracing::debug!(scope = self.kind(), disposables = entries.len(), "closing");
        let failures = dispose_bag::release_all_sync(entries);
        self.finish_close(failures)
    }

    async fn close_async(&self) -> DiResult<()> {
        let Some(entries) = self.begin_close() else {
            return Ok(());
        };
        tracing::debug!(scope = self.kind(), disposables = entries.len(), "closing");
        let failures = dispose_bag::release_all_async(entries).await;
        self.finish_close(failures)
    }
}

impl Drop for EngineScope {
    fn drop(&mut self) {
        if self.state.load(Ordering::Acquire) != OPEN {
            return;
        }

        let entries = self.disposables.get_mut().take();
        if entries.is_empty() {
            return;
        }

        let (sync, pending): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|disposer| matches!(disposer, Disposer::Sync { .. }));

        if !pending.is_empty() {
            tracing::warn!(
                scope = self.kind(),
                undisposed = pending.len(),
                "dropped with asynchronous disposables; call close_async() before dropping"
            );
        }
        // Sync handles are released even without an explicit close.
        dispose_bag::release_all_sync(sync);
    }
}

/// Handle to a resolution scope.
///
/// Cheap to clone; clones share the same caches and disposables. Factories
/// receive a `ServiceScope` for the scope they are producing into.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Lifetime, Resolver, ServiceCollection, ServiceDescriptor};
/// use std::sync::Arc;
///
/// struct RequestContext { id: u64 }
///
/// # async fn example() -> ferrous_ioc::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add(ServiceDescriptor::factory(Lifetime::Scoped, |_| Ok(RequestContext { id: 7 })));
/// let provider = services.build()?;
///
/// let scope = provider.create_scope()?;
/// let first = scope.get_required::<RequestContext>().await?;
/// let second = scope.get_required::<RequestContext>().await?;
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(first.id, 7);
///
/// scope.close_async().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceScope {
    /// Scope that caches and owns what is produced through this handle
    pub(crate) engine: Arc<EngineScope>,
    /// Scope whose overrides apply; differs from `engine` while a singleton
    /// is being built on behalf of a scope
    pub(crate) view: Arc<EngineScope>,
    /// Identifiers being produced on this resolution
    pub(crate) path: ResolutionPath,
    usage: Option<Arc<OverrideUse>>,
}

impl ServiceScope {
    pub(crate) fn new(engine: Arc<EngineScope>) -> Self {
        Self {
            view: engine.clone(),
            engine,
            path: ResolutionPath::default(),
            usage: None,
        }
    }

    /// Same resolution, one level further down the production of `identifier`.
    pub(crate) fn enter(&self, identifier: &ServiceIdentifier) -> Self {
        Self {
            path: self.path.push(identifier),
            ..self.clone()
        }
    }

    /// Same resolution, continued on the root scope.
    pub(crate) fn on_root(&self) -> Self {
        Self {
            engine: self.engine.root_engine(),
            ..self.clone()
        }
    }

    /// Same resolution, recording the overrides it consumes.
    pub(crate) fn recording(&self) -> (Self, Arc<OverrideUse>) {
        let usage = OverrideUse::nested(self.usage.clone());
        let scope = Self {
            usage: Some(usage.clone()),
            ..self.clone()
        };
        (scope, usage)
    }

    pub(crate) fn find_override(&self, identifier: &ServiceIdentifier) -> Option<ActiveOverride> {
        self.view.find_override(identifier)
    }

    /// Notes that `identifier` was served by the override `token`.
    pub(crate) fn record_override(&self, identifier: &ServiceIdentifier, token: u64) {
        if let Some(usage) = &self.usage {
            usage.record(identifier, token);
        }
    }

    /// Creates a new scope under the same root.
    ///
    /// Creating a scope from a scope yields a sibling, not a nested child:
    /// scoped instances are never shared between the two.
    pub fn create_scope(&self) -> DiResult<ServiceScope> {
        self.engine.ensure_open()?;
        let root = self.engine.root_engine();
        Ok(ServiceScope::new(EngineScope::new_child(&root)))
    }

    /// Substitutes `instance` for `T` in this scope until the guard is dropped.
    ///
    /// Works whether or not `T` is registered. The instance is never disposed
    /// by the container.
    pub fn override_service<T: Send + Sync + 'static>(&self, instance: Arc<T>) -> DiResult<OverrideGuard> {
        self.install_override(ServiceIdentifier::of::<T>(), instance)
    }

    /// Substitutes `instance` for `T` under `key`.
    ///
    /// [`ServiceKey::Any`] overrides every keyed request for `T` that has no
    /// exact-key override of its own.
    pub fn override_keyed_service<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        instance: Arc<T>,
    ) -> DiResult<OverrideGuard> {
        self.install_override(ServiceIdentifier::keyed::<T>(key), instance)
    }

    fn install_override(&self, identifier: ServiceIdentifier, instance: AnyArc) -> DiResult<OverrideGuard> {
        self.engine.ensure_open()?;
        let token = self.engine.overrides().push(identifier.clone(), instance);
        tracing::debug!(service = %identifier, scope = self.engine.kind(), "override installed");
        Ok(OverrideGuard::new(self.engine.clone(), identifier, token))
    }

    /// True when `T` is registered, built in or currently overridden.
    ///
    /// [`ServiceScope`] and [`ServiceProvider`](crate::ServiceProvider) are
    /// built in: they resolve to the resolving scope and its provider.
    pub fn is_service<T: ?Sized + 'static>(&self) -> bool {
        self.is_resolvable(&ServiceIdentifier::of::<T>())
    }

    /// True when `T` under `key` is registered or currently overridden.
    pub fn is_keyed_service<T: ?Sized + 'static>(&self, key: impl Into<ServiceKey>) -> bool {
        self.is_resolvable(&ServiceIdentifier::keyed::<T>(key))
    }

    fn is_resolvable(&self, identifier: &ServiceIdentifier) -> bool {
        self.engine.factory().contains(identifier) || self.find_override(identifier).is_some()
    }

    /// True once `close` or `close_async` has started.
    pub fn is_closed(&self) -> bool {
        !self.engine.is_open()
    }

    /// Closes the scope, releasing synchronous disposables in reverse order.
    ///
    /// Asynchronous disposables cannot be awaited here and are reported as
    /// failures; use [`close_async`](Self::close_async) when any are registered.
    /// Every disposable is attempted; failures come back together as
    /// [`DiError::Disposal`]. Closing an already closed scope does nothing.
    pub fn close(&self) -> DiResult<()> {
        self.engine.close_sync()
    }

    /// Closes the scope, awaiting asynchronous disposables, in reverse order.
    pub async fn close_async(&self) -> DiResult<()> {
        self.engine.close_async().await
    }

    async fn resolve_identifier(&self, identifier: &ServiceIdentifier) -> DiResult<Option<AnyArc>> {
        let call_site = {
            let mut chain = CallSiteChain::new();
            self.engine
                .factory()
                .get_call_site(identifier, &mut chain, &self.view)?
        };

        match call_site {
            Some(call_site) => RuntimeResolver::resolve(call_site, self.clone()).await.map(Some),
            None => Ok(None),
        }
    }

    async fn resolve_all(&self, identifier: &ServiceIdentifier) -> DiResult<Vec<AnyArc>> {
        let call_sites = {
            let mut chain = CallSiteChain::new();
            self.engine
                .factory()
                .get_all_call_sites(identifier, &mut chain, &self.view)?
        };

        let mut instances = Vec::with_capacity(call_sites.len());
        for call_site in call_sites {
            instances.push(RuntimeResolver::resolve(call_site, self.clone()).await?);
        }
        Ok(instances)
    }

    /// Resolves the descriptor registered at `index`.
    pub(crate) async fn resolve_descriptor(&self, index: usize) -> DiResult<Option<AnyArc>> {
        let call_site = {
            let mut chain = CallSiteChain::new();
            self.engine
                .factory()
                .get_call_site_for_descriptor(index, &mut chain, &self.view)?
        };

        match call_site {
            Some(call_site) => RuntimeResolver::resolve(call_site, self.clone()).await.map(Some),
            None => Ok(None),
        }
    }
}

/// Runs a top-level resolution, notifying observers around it.
async fn observed<T, F>(observers: &Observers, identifier: &ServiceIdentifier, resolution: F) -> DiResult<T>
where
    F: std::future::Future<Output = DiResult<T>>,
{
    if !observers.has_observers() {
        return resolution.await;
    }

    observers.resolving(identifier);
    let started = Instant::now();
    let result = resolution.await;
    match &result {
        Ok(_) => observers.resolved(identifier, started.elapsed()),
        Err(error) => observers.resolution_failed(identifier, error),
    }
    result
}

impl ResolverCore for ServiceScope {
    fn resolve_any<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Option<AnyArc>>> {
        Box::pin(async move {
            self.engine.ensure_open()?;
            observed(self.engine.observers(), identifier, self.resolve_identifier(identifier)).await
        })
    }

    fn resolve_many<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Vec<AnyArc>>> {
        Box::pin(async move {
            self.engine.ensure_open()?;
            observed(self.engine.observers(), identifier, self.resolve_all(identifier)).await
        })
    }
}

impl std::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceScope")
            .field("kind", &self.engine.kind())
            .field("closed", &self.is_closed())
            .field("disposables", &self.engine.disposables.lock().len())
            .finish()
    }
}
