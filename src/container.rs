//! Lazily built container: registrations and resolution behind one value.

use std::sync::Arc;

use futures::future::BoxFuture;
use once_cell::sync::OnceCell;

use crate::call_site::Builtin;
use crate::collection::ServiceCollection;
use crate::descriptors::AnyArc;
use crate::error::{DiError, DiResult};
use crate::key::{ServiceIdentifier, ServiceKey};
use crate::provider::{OverrideGuard, ServiceProvider, ServiceScope};
use crate::traits::ResolverCore;

/// A [`ServiceCollection`] that builds its own provider on first use.
///
/// Resolving through the container builds the provider and activates
/// auto-activated singletons; `create_scope` and overrides build it without
/// activation. Once built, registrations are closed until the container is
/// closed again.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Resolver, ServiceContainer};
///
/// # async fn example() -> ferrous_ioc::DiResult<()> {
/// let mut container = ServiceContainer::new();
/// container.services_mut()?.add_instance(String::from("ready"));
/// assert!(container.service_provider().is_none());
///
/// assert_eq!(*container.get_required::<String>().await?, "ready");
/// assert!(container.service_provider().is_some());
///
/// container.close_async().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ServiceContainer {
    services: ServiceCollection,
    provider: OnceCell<ServiceProvider>,
    building: tokio::sync::Mutex<()>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container over existing registrations.
    pub fn from_collection(services: ServiceCollection) -> Self {
        Self {
            services,
            ..Self::default()
        }
    }

    /// Registrations, open until the provider is built.
    pub fn services_mut(&mut self) -> DiResult<&mut ServiceCollection> {
        if self.provider.get().is_some() {
            return Err(DiError::AlreadyBuilt);
        }
        Ok(&mut self.services)
    }

    pub fn services(&self) -> &ServiceCollection {
        &self.services
    }

    /// The provider, if something has built it already.
    pub fn service_provider(&self) -> Option<&ServiceProvider> {
        self.provider.get()
    }

    /// Builds and activates the provider on first call.
    pub async fn provider(&self) -> DiResult<&ServiceProvider> {
        if let Some(provider) = self.provider.get() {
            return Ok(provider);
        }

        let _building = self.building.lock().await;
        if let Some(provider) = self.provider.get() {
            return Ok(provider);
        }
        tracing::debug!(descriptors = self.services.len(), "building container provider");
        let provider = self.services.clone().build_async().await?;
        Ok(self.install(provider))
    }

    /// Builds the provider without activation on first call.
    fn provider_now(&self) -> DiResult<&ServiceProvider> {
        self.provider.get_or_try_init(|| self.services.clone().build())
    }

    fn install(&self, provider: ServiceProvider) -> &ServiceProvider {
        match self.provider.try_insert(provider) {
            Ok(provider) => provider,
            // Built concurrently by `create_scope` or an override.
            Err((existing, _unused)) => existing,
        }
    }

    pub fn create_scope(&self) -> DiResult<ServiceScope> {
        self.provider_now()?.create_scope()
    }

    pub fn override_service<T: Send + Sync + 'static>(&self, instance: Arc<T>) -> DiResult<OverrideGuard> {
        self.provider_now()?.override_service(instance)
    }

    pub fn override_keyed_service<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        instance: Arc<T>,
    ) -> DiResult<OverrideGuard> {
        self.provider_now()?.override_keyed_service(key, instance)
    }

    /// True when `T` is registered, built in or, once built, overridden.
    pub fn is_service<T: ?Sized + 'static>(&self) -> bool {
        match self.provider.get() {
            Some(provider) => provider.is_service::<T>(),
            None => self.is_registered(&ServiceIdentifier::of::<T>()),
        }
    }

    pub fn is_keyed_service<T: ?Sized + 'static>(&self, key: impl Into<ServiceKey>) -> bool {
        let key = key.into();
        match self.provider.get() {
            Some(provider) => provider.is_keyed_service::<T>(key),
            None => self.is_registered(&ServiceIdentifier::keyed::<T>(key)),
        }
    }

    fn is_registered(&self, identifier: &ServiceIdentifier) -> bool {
        self.services.contains(identifier) || Builtin::of(identifier).is_some()
    }

    /// Closes the provider, if built, and reopens registrations.
    pub async fn close_async(&mut self) -> DiResult<()> {
        match self.provider.take() {
            Some(provider) => provider.close_async().await,
            None => Ok(()),
        }
    }
}

impl ResolverCore for ServiceContainer {
    fn resolve_any<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Option<AnyArc>>> {
        Box::pin(async move { self.provider().await?.resolve_any(identifier).await })
    }

    fn resolve_many<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Vec<AnyArc>>> {
        Box::pin(async move { self.provider().await?.resolve_many(identifier).await })
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("descriptors", &self.services.len())
            .field("built", &self.provider.get().is_some())
            .finish()
    }
}
