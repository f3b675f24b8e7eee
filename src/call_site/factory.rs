//! Compiles service descriptors into call sites.

use std::sync::Arc;

use parking_lot::ReentrantMutex;
use smallvec::SmallVec;

use super::{Builtin, CallSite, CallSiteKind, ResultCache, ServiceCacheKey};
use crate::descriptors::{ConstructorInfo, Fallback, Implementation, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::internal::{CallSiteChain, ConcurrentMap, FastHashMap};
use crate::key::ServiceIdentifier;
use crate::provider::EngineScope;

/// Compiles and memoizes call sites, one per `(identifier, slot)`.
///
/// Compilation of an identifier is serialized by a per-identifier reentrant
/// lock, so concurrent callers compile it at most once. Re-entry from the
/// same thread is allowed so the chain can report a cycle instead of the
/// thread deadlocking on itself.
///
/// Only a top-level compile waits for a lock. A nested compile that finds a
/// dependency's lock held by another thread compiles it without the lock;
/// the memo keeps whichever call site lands first. Two threads entering a
/// cycle from opposite ends therefore both reach the cycle check instead of
/// waiting on each other.
pub(crate) struct CallSiteFactory {
    descriptors: Vec<ServiceDescriptor>,
    /// Descriptor indices per identifier, in registration order
    lookup: FastHashMap<ServiceIdentifier, SmallVec<[usize; 1]>>,
    call_sites: ConcurrentMap<ServiceCacheKey, CallSite>,
    call_site_locks: ConcurrentMap<ServiceIdentifier, ReentrantMutex<()>>,
}

impl CallSiteFactory {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut lookup: FastHashMap<ServiceIdentifier, SmallVec<[usize; 1]>> = FastHashMap::default();
        for (index, descriptor) in descriptors.iter().enumerate() {
            lookup
                .entry(descriptor.identifier.clone())
                .or_default()
                .push(index);
        }

        Self {
            descriptors,
            lookup,
            call_sites: ConcurrentMap::new(),
            call_site_locks: ConcurrentMap::new(),
        }
    }

    pub(crate) fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// True when `identifier` is registered or built in.
    pub(crate) fn contains(&self, identifier: &ServiceIdentifier) -> bool {
        self.lookup.contains_key(identifier) || Builtin::of(identifier).is_some()
    }

    /// Call site for the last registration of `identifier`, `None` when unregistered.
    ///
    /// An active override visible from `scope` short-circuits descriptor
    /// lookup. [`ServiceScope`](crate::ServiceScope) and
    /// [`ServiceProvider`](crate::ServiceProvider) resolve without a
    /// registration unless one is supplied.
    pub(crate) fn get_call_site(
        &self,
        identifier: &ServiceIdentifier,
        chain: &mut CallSiteChain,
        scope: &EngineScope,
    ) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(active) = scope.find_override(identifier) {
            return Ok(Some(Arc::new(CallSite::overridden(identifier.clone(), active))));
        }

        let Some(indices) = self.lookup.get(identifier) else {
            return Ok(Builtin::of(identifier)
                .map(|builtin| Arc::new(CallSite::builtin(identifier.clone(), builtin))));
        };
        let last = indices[indices.len() - 1];
        self.compile(identifier, last, 0, chain, scope).map(Some)
    }

    /// Call sites for every registration of `identifier`, in registration order.
    pub(crate) fn get_all_call_sites(
        &self,
        identifier: &ServiceIdentifier,
        chain: &mut CallSiteChain,
        scope: &EngineScope,
    ) -> DiResult<Vec<Arc<CallSite>>> {
        if let Some(active) = scope.find_override(identifier) {
            return Ok(vec![Arc::new(CallSite::overridden(identifier.clone(), active))]);
        }

        let Some(indices) = self.lookup.get(identifier) else {
            return Ok(Builtin::of(identifier)
                .map(|builtin| Arc::new(CallSite::builtin(identifier.clone(), builtin)))
                .into_iter()
                .collect());
        };
        let count = indices.len();
        indices
            .iter()
            .enumerate()
            .map(|(position, &index)| self.compile(identifier, index, count - 1 - position, chain, scope))
            .collect()
    }

    /// Call site for the descriptor registered at `index`.
    pub(crate) fn get_call_site_for_descriptor(
        &self,
        index: usize,
        chain: &mut CallSiteChain,
        scope: &EngineScope,
    ) -> DiResult<Option<Arc<CallSite>>> {
        let Some(descriptor) = self.descriptors.get(index) else {
            return Ok(None);
        };
        let identifier = &descriptor.identifier;
        let Some(indices) = self.lookup.get(identifier) else {
            return Ok(None);
        };
        let Some(position) = indices.iter().position(|&candidate| candidate == index) else {
            return Ok(None);
        };
        let slot = indices.len() - 1 - position;
        self.compile(identifier, index, slot, chain, scope).map(Some)
    }

    fn compile(
        &self,
        identifier: &ServiceIdentifier,
        index: usize,
        slot: usize,
        chain: &mut CallSiteChain,
        scope: &EngineScope,
    ) -> DiResult<Arc<CallSite>> {
        let key = ServiceCacheKey::new(identifier.clone(), slot);
        if let Some(call_site) = self.call_sites.get(&key) {
            return Ok(call_site);
        }

        let lock = self
            .call_site_locks
            .get_or_add(identifier, |_| ReentrantMutex::new(()));
        let _guard = if chain.is_empty() {
            Some(lock.lock())
        } else {
            lock.try_lock()
        };

        if let Some(call_site) = self.call_sites.get(&key) {
            return Ok(call_site);
        }

        let descriptor = &self.descriptors[index];
        let call_site = chain.scoped(identifier, |chain| {
            self.create_exact(descriptor, identifier, slot, chain, scope)
        })?;
        let call_site = Arc::new(call_site);

        if call_site.volatile {
            tracing::trace!(service = %identifier, "call site depends on an override, not memoized");
            return Ok(call_site);
        }

        tracing::debug!(
            service = %identifier,
            slot,
            lifetime = %descriptor.lifetime,
            "compiled call site"
        );
        Ok(self.call_sites.get_or_insert(key, call_site))
    }

    fn create_exact(
        &self,
        descriptor: &ServiceDescriptor,
        identifier: &ServiceIdentifier,
        slot: usize,
        chain: &mut CallSiteChain,
        scope: &EngineScope,
    ) -> DiResult<CallSite> {
        let kind = match &descriptor.implementation {
            Implementation::Type(info) => self.create_constructor(info, chain, scope)?,
            Implementation::Factory(factory) => CallSiteKind::SyncFactory(factory.clone()),
            Implementation::AsyncFactory(factory) => CallSiteKind::AsyncFactory(factory.clone()),
            Implementation::Instance(instance) => {
                return Ok(CallSite::constant(identifier.clone(), instance.clone()));
            }
        };

        let cache = ResultCache::for_lifetime(descriptor.lifetime, identifier.clone(), slot);
        Ok(CallSite::new(identifier.clone(), cache, kind, descriptor.dispose.clone()))
    }

    fn create_constructor(
        &self,
        info: &ConstructorInfo,
        chain: &mut CallSiteChain,
        scope: &EngineScope,
    ) -> DiResult<CallSiteKind> {
        let mut parameters = Vec::with_capacity(info.dependencies.len());

        for dependency in &info.dependencies {
            let parameter = match self.get_call_site(&dependency.identifier, chain, scope)? {
                Some(call_site) => Some(call_site),
                None => match &dependency.fallback {
                    Fallback::Required => {
                        return Err(DiError::UnresolvableParameter {
                            owner: info.implementation,
                            parameter: dependency.identifier.to_string(),
                        });
                    }
                    Fallback::Optional => None,
                    Fallback::Default(value) => Some(Arc::new(CallSite::constant(
                        dependency.identifier.clone(),
                        value.clone(),
                    ))),
                },
            };
            parameters.push(parameter);
        }

        Ok(CallSiteKind::Constructor {
            implementation: info.implementation,
            parameters,
            activator: info.activator.clone(),
        })
    }

    /// Number of memoized call sites.
    #[cfg(test)]
    pub(crate) fn compiled_count(&self) -> usize {
        self.call_sites.len()
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn compiled_call_sites(&self) -> Vec<Arc<CallSite>> {
        self.call_sites.values()
    }
}
