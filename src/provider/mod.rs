//! Service provider: the compiled, resolvable form of a set of registrations.
//!
//! This module contains the [`ServiceProvider`] (root scope), the
//! [`ServiceScope`] handle and the [`OverrideGuard`] returned by overrides.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::call_site::{CallSite, CallSiteFactory, CallSiteKind};
use crate::config::ProviderOptions;
use crate::descriptors::{AnyArc, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::internal::CallSiteChain;
use crate::key::{ServiceIdentifier, ServiceKey};
use crate::lifetime::{CacheLocation, Lifetime};
use crate::observer::Observers;
use crate::traits::ResolverCore;

mod overrides;
mod scope;

pub use overrides::OverrideGuard;
pub use scope::ServiceScope;
pub(crate) use overrides::{ActiveOverride, OverrideUse};
pub(crate) use scope::{EngineScope, ProviderCore};

/// Builds a provider from an ordered list of descriptors.
///
/// When several descriptors share an identifier, the last one is used for
/// ordinary resolution and all of them for enumeration.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{compile_provider, Lifetime, ProviderOptions, Resolver, ServiceDescriptor};
///
/// # async fn example() -> ferrous_ioc::DiResult<()> {
/// let provider = compile_provider(
///     vec![
///         ServiceDescriptor::instance(1u32).into(),
///         ServiceDescriptor::factory(Lifetime::Transient, |_| Ok(2u32)).into(),
///     ],
///     ProviderOptions::default(),
/// )?;
///
/// assert_eq!(*provider.get_required::<u32>().await?, 2);
/// assert_eq!(provider.get_all::<u32>().await?.len(), 2);
/// # Ok(())
/// # }
/// ```
pub fn compile_provider(descriptors: Vec<ServiceDescriptor>, options: ProviderOptions) -> DiResult<ServiceProvider> {
    ServiceProvider::new(descriptors, options, Observers::default())
}

/// Root of a compiled container.
///
/// Resolves services through [`Resolver`](crate::Resolver), owns singletons and
/// their disposal, and creates scopes. Cloning is cheap and every clone refers
/// to the same root.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Arguments, DiResult, Dependency, Injectable, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// impl Injectable for UserService {
///     fn dependencies() -> Vec<Dependency> {
///         vec![Dependency::required::<Database>()]
///     }
///
///     fn construct(args: &mut Arguments) -> DiResult<Self> {
///         Ok(UserService { db: args.take()? })
///     }
/// }
///
/// # async fn example() -> DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_instance(Database { url: "postgres://localhost".to_string() });
/// services.add_transient::<UserService>();
///
/// let provider = services.build()?;
/// let users = provider.get_required::<UserService>().await?;
/// assert_eq!(users.db.url, "postgres://localhost");
///
/// provider.close_async().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    root: ServiceScope,
}

impl ServiceProvider {
    pub(crate) fn new(
        descriptors: Vec<ServiceDescriptor>,
        options: ProviderOptions,
        observers: Observers,
    ) -> DiResult<Self> {
        let wildcards: Vec<DiError> = descriptors
            .iter()
            .filter(|descriptor| descriptor.identifier.key().is_some_and(ServiceKey::is_any))
            .map(|descriptor| DiError::InvalidKey(descriptor.identifier.to_string()))
            .collect();
        if !wildcards.is_empty() {
            return Err(DiError::InvalidRegistrations(wildcards));
        }

        let count = descriptors.len();
        let core = Arc::new(ProviderCore {
            factory: CallSiteFactory::new(descriptors),
            options,
            observers,
        });
        let provider = Self {
            root: ServiceScope::new(EngineScope::new_root(core)),
        };

        if options.validate_on_build {
            provider.validate()?;
        }

        tracing::debug!(
            descriptors = count,
            validate_scopes = options.validate_scopes,
            validate_on_build = options.validate_on_build,
            "service provider compiled"
        );
        Ok(provider)
    }

    /// Provider handle for an existing root scope.
    pub(crate) fn from_root(root: Arc<EngineScope>) -> Self {
        Self {
            root: ServiceScope::new(root),
        }
    }

    /// Compiles every descriptor, collecting all failures.
    fn validate(&self) -> DiResult<()> {
        let engine = &self.root.engine;
        let validate_scopes = engine.options().validate_scopes;
        let mut errors = Vec::new();

        for (index, descriptor) in self.descriptors().iter().enumerate() {
            let mut chain = CallSiteChain::new();
            match engine.factory().get_call_site_for_descriptor(index, &mut chain, engine) {
                Ok(Some(call_site)) if validate_scopes && descriptor.lifetime == Lifetime::Singleton => {
                    if let Some(scoped) = find_scoped_dependency(&call_site) {
                        errors.push(DiError::WrongLifetime(format!(
                            "singleton {} depends on scoped service {}",
                            descriptor.identifier, scoped
                        )));
                    }
                }
                Ok(_) => {}
                Err(error) => errors.push(error),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            tracing::warn!(invalid = errors.len(), "registration validation failed");
            Err(DiError::InvalidRegistrations(errors))
        }
    }

    /// The registrations this provider was compiled from, in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        self.root.engine.factory().descriptors()
    }

    /// Creates a new scope for resolving scoped services.
    pub fn create_scope(&self) -> DiResult<ServiceScope> {
        self.root.create_scope()
    }

    /// Constructs every singleton registered with `auto_activate`.
    ///
    /// The flag is ignored, with a warning, on non-singleton registrations.
    pub async fn activate(&self) -> DiResult<()> {
        self.root.engine.ensure_open()?;

        for (index, descriptor) in self.descriptors().iter().enumerate() {
            if !descriptor.auto_activate {
                continue;
            }
            if descriptor.lifetime != Lifetime::Singleton {
                tracing::warn!(
                    service = %descriptor.identifier,
                    lifetime = %descriptor.lifetime,
                    "auto-activation only applies to singletons; ignored"
                );
                continue;
            }

            tracing::debug!(service = %descriptor.identifier, "auto-activating");
            self.root.resolve_descriptor(index).await?;
        }
        Ok(())
    }

    /// Overrides `T` on the root; visible from every scope.
    pub fn override_service<T: Send + Sync + 'static>(&self, instance: Arc<T>) -> DiResult<OverrideGuard> {
        self.root.override_service(instance)
    }

    /// Overrides `T` under `key` on the root; visible from every scope.
    pub fn override_keyed_service<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
        instance: Arc<T>,
    ) -> DiResult<OverrideGuard> {
        self.root.override_keyed_service(key, instance)
    }

    /// True when `T` is registered, built in or currently overridden.
    pub fn is_service<T: ?Sized + 'static>(&self) -> bool {
        self.root.is_service::<T>()
    }

    pub fn is_keyed_service<T: ?Sized + 'static>(&self, key: impl Into<ServiceKey>) -> bool {
        self.root.is_keyed_service::<T>(key)
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_closed()
    }

    /// Closes the root, releasing singleton and root-resolved disposables.
    ///
    /// See [`ServiceScope::close`].
    pub fn close(&self) -> DiResult<()> {
        self.root.close()
    }

    /// Closes the root, awaiting asynchronous disposables.
    pub async fn close_async(&self) -> DiResult<()> {
        self.root.close_async().await
    }

    /// Human-readable dump of registrations and compiled call sites.
    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let factory = self.root.engine.factory();
        let mut s = String::new();
        s.push_str("=== Service Provider Debug ===\n");
        s.push_str("Registrations:\n");
        for descriptor in factory.descriptors() {
            s.push_str(&format!(
                "  {}: {} ({:?}){}\n",
                descriptor.identifier,
                descriptor.lifetime,
                descriptor.implementation_kind(),
                if descriptor.auto_activate { " [auto-activate]" } else { "" }
            ));
        }
        s.push_str("Compiled call sites:\n");
        let mut compiled: Vec<String> = factory
            .compiled_call_sites()
            .iter()
            .map(|call_site| {
                format!(
                    "  {} -> {} {} ({:?}, slot {}){}\n",
                    call_site.identifier,
                    call_site.kind_name(),
                    call_site.implementation_name(),
                    call_site.cache.location,
                    call_site.cache.key.slot,
                    if call_site.value.get().is_some() { " [cached]" } else { "" }
                )
            })
            .collect();
        compiled.sort();
        for line in compiled {
            s.push_str(&line);
        }
        s
    }

    #[cfg(test)]
    pub(crate) fn compiled_count(&self) -> usize {
        self.root.engine.factory().compiled_count()
    }
}

/// First scoped service reachable through constructor parameters.
fn find_scoped_dependency(call_site: &CallSite) -> Option<ServiceIdentifier> {
    let CallSiteKind::Constructor { parameters, .. } = &call_site.kind else {
        return None;
    };

    parameters.iter().flatten().find_map(|parameter| {
        if parameter.cache.location == CacheLocation::Scope {
            Some(parameter.identifier.clone())
        } else {
            find_scoped_dependency(parameter)
        }
    })
}

impl ResolverCore for ServiceProvider {
    fn resolve_any<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Option<AnyArc>>> {
        self.root.resolve_any(identifier)
    }

    fn resolve_many<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Vec<AnyArc>>> {
        self.root.resolve_many(identifier)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("descriptors", &self.descriptors().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptors::{Arguments, Dependency, Injectable};
    use crate::traits::Resolver;

    struct Leaf;

    impl Injectable for Leaf {
        fn construct(_: &mut Arguments) -> DiResult<Self> {
            Ok(Leaf)
        }
    }

    struct Branch {
        _leaf: Arc<Leaf>,
    }

    impl Injectable for Branch {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::required::<Leaf>()]
        }

        fn construct(args: &mut Arguments) -> DiResult<Self> {
            Ok(Branch { _leaf: args.take()? })
        }
    }

    #[tokio::test]
    async fn call_sites_are_compiled_once_per_identifier() {
        let provider = compile_provider(
            vec![
                ServiceDescriptor::constructor::<Leaf>(Lifetime::Transient).into(),
                ServiceDescriptor::constructor::<Branch>(Lifetime::Transient).into(),
            ],
            ProviderOptions::default(),
        )
        .unwrap();

        for _ in 0..5 {
            provider.get_required::<Branch>().await.unwrap();
        }
        assert_eq!(provider.compiled_count(), 2);
    }

    #[tokio::test]
    async fn overridden_dependencies_are_not_memoized() {
        let provider = compile_provider(
            vec![
                ServiceDescriptor::constructor::<Leaf>(Lifetime::Transient).into(),
                ServiceDescriptor::constructor::<Branch>(Lifetime::Transient).into(),
            ],
            ProviderOptions::default(),
        )
        .unwrap();

        {
            let _guard = provider.override_service(Arc::new(Leaf)).unwrap();
            provider.get_required::<Branch>().await.unwrap();
        }
        assert_eq!(provider.compiled_count(), 0);

        provider.get_required::<Branch>().await.unwrap();
        assert_eq!(provider.compiled_count(), 2);
    }

    #[test]
    fn scoped_dependency_search_walks_constructor_graph() {
        let provider = compile_provider(
            vec![
                ServiceDescriptor::constructor::<Leaf>(Lifetime::Scoped).into(),
                ServiceDescriptor::constructor::<Branch>(Lifetime::Singleton).into(),
            ],
            ProviderOptions::new().validate_scopes(true).validate_on_build(true),
        );

        match provider {
            Err(DiError::InvalidRegistrations(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(&errors[0], DiError::WrongLifetime(message) if message.contains("Leaf")));
            }
            other => panic!("expected invalid registrations, got {:?}", other.map(|_| ())),
        }
    }
}
