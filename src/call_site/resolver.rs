//! Executes compiled call sites against a scope.

use std::sync::Arc;

use futures::future::BoxFuture;
use smallvec::SmallVec;

use super::{Builtin, CallSite, CallSiteKind, ServiceCacheKey};
use crate::descriptors::{AnyArc, Arguments};
use crate::error::{DiError, DiResult};
use crate::internal::dispose_bag;
use crate::lifetime::CacheLocation;
use crate::provider::{EngineScope, ServiceProvider, ServiceScope};

/// Stateless visitor over call sites.
///
/// Caching depends on the call site's cache location: root-cached values live
/// on the call site itself, scope-cached values in the resolving scope.
/// An instance whose production consumed an override is cached apart from
/// those, bound to the overrides it used, and reused only while they are
/// still in effect for the resolving scope.
pub(crate) struct RuntimeResolver;

impl RuntimeResolver {
    pub(crate) fn resolve(call_site: Arc<CallSite>, scope: ServiceScope) -> BoxFuture<'static, DiResult<AnyArc>> {
        Box::pin(async move {
            // Memoized call sites are shared, so an override that became
            // active after compilation is only visible here.
            if let Some(active) = scope.find_override(&call_site.identifier) {
                scope.record_override(&call_site.identifier, active.token);
                return Ok(active.instance);
            }
            if let Some(token) = call_site.override_token {
                scope.record_override(&call_site.identifier, token);
            }

            let location = call_site.cache.location;
            let guarded = call_site.is_factory() || location != CacheLocation::None;
            if !guarded {
                return Self::visit_no_cache(call_site, scope).await;
            }

            // Anything that waits on a construction lock must not already be
            // in production further up this resolution.
            if scope.path.contains(&call_site.identifier) {
                return Err(scope.path.cycle_to(&call_site.identifier));
            }
            let scope = scope.enter(&call_site.identifier);

            match location {
                CacheLocation::Root => Self::visit_root_cache(call_site, scope).await,
                CacheLocation::Scope => Self::visit_scope_cache(call_site, scope).await,
                CacheLocation::None => Self::visit_no_cache(call_site, scope).await,
            }
        })
    }

    async fn visit_root_cache(call_site: Arc<CallSite>, scope: ServiceScope) -> DiResult<AnyArc> {
        if let Some(value) = call_site.value.get() {
            tracing::trace!(service = %call_site.identifier, "singleton cache hit");
            return Ok(value.clone());
        }

        let root = scope.on_root();
        let key = &call_site.cache.key;
        if let Some(value) = Self::bound_hit(&root.engine, key, &scope) {
            return Ok(value);
        }

        let lock = root.engine.construction_lock(key);
        let _guard = lock.lock().await;
        if let Some(value) = call_site.value.get() {
            return Ok(value.clone());
        }
        if let Some(value) = Self::bound_hit(&root.engine, key, &scope) {
            return Ok(value);
        }

        let (builder, usage) = root.recording();
        let instance = Self::visit_call_site_main(&call_site, &builder).await?;
        Self::capture(&call_site, &instance, &root.engine).await?;

        let used = usage.take();
        if used.is_empty() {
            // Only reachable under the lock with the cell empty.
            let _ = call_site.value.set(instance.clone());
        } else {
            tracing::debug!(service = %call_site.identifier, overrides = used.len(), "singleton bound to overrides");
            root.engine.store_bound(key.clone(), used, instance.clone());
        }
        Ok(instance)
    }

    async fn visit_scope_cache(call_site: Arc<CallSite>, scope: ServiceScope) -> DiResult<AnyArc> {
        let engine = &scope.engine;
        if engine.is_root() && engine.options().validate_scopes {
            return Err(DiError::WrongLifetime(format!(
                "scoped service {} cannot be resolved from the root provider",
                call_site.identifier
            )));
        }

        let key = &call_site.cache.key;
        if let Some(value) = engine.cached(key) {
            tracing::trace!(service = %call_site.identifier, scope = engine.kind(), "scoped cache hit");
            return Ok(value);
        }
        if let Some(value) = Self::bound_hit(engine, key, &scope) {
            return Ok(value);
        }

        let lock = engine.construction_lock(key);
        let _guard = lock.lock().await;
        if let Some(value) = engine.cached(key) {
            return Ok(value);
        }
        if let Some(value) = Self::bound_hit(engine, key, &scope) {
            return Ok(value);
        }

        let (builder, usage) = scope.recording();
        let instance = Self::visit_call_site_main(&call_site, &builder).await?;
        Self::capture(&call_site, &instance, engine).await?;

        let used = usage.take();
        if used.is_empty() {
            engine.store(key.clone(), instance.clone());
        } else {
            engine.store_bound(key.clone(), used, instance.clone());
        }
        Ok(instance)
    }

    async fn visit_no_cache(call_site: Arc<CallSite>, scope: ServiceScope) -> DiResult<AnyArc> {
        let instance = Self::visit_call_site_main(&call_site, &scope).await?;
        Self::capture(&call_site, &instance, &scope.engine).await?;
        Ok(instance)
    }

    /// Override-bound instance for `key` in `owner`, as seen from `scope`.
    ///
    /// The overrides it was built with are recorded again, so whatever is
    /// being built on top of it is bound to them too.
    fn bound_hit(owner: &EngineScope, key: &ServiceCacheKey, scope: &ServiceScope) -> Option<AnyArc> {
        let (value, overrides) = owner.bound_cached(key, &scope.view)?;
        for (identifier, token) in &overrides {
            scope.record_override(identifier, *token);
        }
        tracing::trace!(service = %key.identifier, "override-bound cache hit");
        Some(value)
    }

    async fn visit_call_site_main(call_site: &CallSite, scope: &ServiceScope) -> DiResult<AnyArc> {
        match &call_site.kind {
            CallSiteKind::Constant(instance) => Ok(instance.clone()),
            CallSiteKind::Constructor {
                implementation,
                parameters,
                activator,
            } => {
                let mut values: SmallVec<[Option<AnyArc>; 4]> = SmallVec::with_capacity(parameters.len());
                for parameter in parameters {
                    let value = match parameter {
                        Some(parameter) => Some(Self::resolve(parameter.clone(), scope.clone()).await?),
                        None => None,
                    };
                    values.push(value);
                }

                tracing::debug!(implementation, "constructing service");
                activator(Arguments::new(*implementation, values))
            }
            CallSiteKind::SyncFactory(factory) => {
                tracing::debug!(service = %call_site.identifier, "invoking factory");
                factory(scope)
            }
            CallSiteKind::AsyncFactory(factory) => {
                tracing::debug!(service = %call_site.identifier, "invoking async factory");
                factory(scope.clone()).await
            }
            CallSiteKind::Builtin(Builtin::Scope) => Ok(Arc::new(ServiceScope::new(scope.engine.clone())) as AnyArc),
            CallSiteKind::Builtin(Builtin::Provider) => {
                Ok(Arc::new(ServiceProvider::from_root(scope.engine.root_engine())) as AnyArc)
            }
        }
    }

    /// Hands the instance's release handle to `engine`.
    ///
    /// A closed scope refuses the handle; the instance is released right
    /// away and the resolution fails with `ObjectDisposed`, or with
    /// `Disposal` when that release fails as well.
    async fn capture(call_site: &CallSite, instance: &AnyArc, engine: &EngineScope) -> DiResult<()> {
        let Some(hook) = &call_site.dispose else {
            return Ok(());
        };
        let Some(disposer) = hook(instance) else {
            return Ok(());
        };

        match engine.capture_disposable(disposer) {
            Ok(()) => Ok(()),
            Err(rejected) => {
                let failures = dispose_bag::release_all_async(vec![rejected]).await;
                if failures.is_empty() {
                    Err(DiError::ObjectDisposed(engine.kind()))
                } else {
                    Err(DiError::Disposal(failures))
                }
            }
        }
    }
}
