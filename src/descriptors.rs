//! Service descriptors: one registration each.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use smallvec::SmallVec;

use crate::error::{DiError, DiResult};
use crate::internal::Disposer;
use crate::key::{ServiceIdentifier, ServiceKey};
use crate::lifetime::Lifetime;
use crate::provider::ServiceScope;
use crate::traits::{AsyncDispose, Dispose};

/// Type-erased shared instance, as produced and cached by the container.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

pub(crate) type Activator = Arc<dyn Fn(Arguments) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type SyncFactory = Arc<dyn Fn(&ServiceScope) -> DiResult<AnyArc> + Send + Sync>;
pub(crate) type AsyncFactory =
    Arc<dyn Fn(ServiceScope) -> BoxFuture<'static, DiResult<AnyArc>> + Send + Sync>;
pub(crate) type DisposeHook = Arc<dyn Fn(&AnyArc) -> Option<Disposer> + Send + Sync>;

/// A type the container can construct from a statically declared dependency list.
///
/// `dependencies` lists what `construct` consumes, in order. The list is read
/// once, when the call site for the type is compiled.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{Arguments, DiResult, Dependency, Injectable};
/// use std::sync::Arc;
///
/// struct EmailService;
///
/// impl Injectable for EmailService {
///     fn construct(_: &mut Arguments) -> DiResult<Self> {
///         Ok(EmailService)
///     }
/// }
///
/// struct UserService {
///     email: Arc<EmailService>,
/// }
///
/// impl Injectable for UserService {
///     fn dependencies() -> Vec<Dependency> {
///         vec![Dependency::required::<EmailService>()]
///     }
///
///     fn construct(args: &mut Arguments) -> DiResult<Self> {
///         Ok(UserService { email: args.take()? })
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Ordered dependencies handed to [`construct`](Self::construct).
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    /// Builds the instance from resolved dependencies.
    fn construct(args: &mut Arguments) -> DiResult<Self>;
}

#[derive(Clone)]
pub(crate) enum Fallback {
    Required,
    Optional,
    Default(AnyArc),
}

/// One constructor dependency.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::Dependency;
///
/// struct Clock;
/// struct Settings { retries: u32 }
///
/// let deps = vec![
///     Dependency::required::<Clock>(),
///     Dependency::keyed::<Clock>("utc"),
///     Dependency::optional::<Clock>().with_key("local"),
///     Dependency::defaulted(Settings { retries: 3 }),
/// ];
/// assert_eq!(deps.len(), 4);
/// ```
#[derive(Clone)]
pub struct Dependency {
    pub(crate) identifier: ServiceIdentifier,
    pub(crate) fallback: Fallback,
}

impl Dependency {
    /// Dependency that must be registered.
    pub fn required<T: Send + Sync + 'static>() -> Self {
        Self {
            identifier: ServiceIdentifier::of::<T>(),
            fallback: Fallback::Required,
        }
    }

    /// Required dependency on the registration of `T` under `key`.
    pub fn keyed<T: Send + Sync + 'static>(key: impl Into<ServiceKey>) -> Self {
        Self {
            identifier: ServiceIdentifier::keyed::<T>(key),
            fallback: Fallback::Required,
        }
    }

    /// Dependency that resolves to nothing when it is not registered.
    pub fn optional<T: Send + Sync + 'static>() -> Self {
        Self {
            identifier: ServiceIdentifier::of::<T>(),
            fallback: Fallback::Optional,
        }
    }

    /// Dependency that falls back to `value` when it is not registered.
    pub fn defaulted<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            identifier: ServiceIdentifier::of::<T>(),
            fallback: Fallback::Default(Arc::new(value)),
        }
    }

    /// Targets the registration under `key`, keeping the fallback.
    pub fn with_key(mut self, key: impl Into<ServiceKey>) -> Self {
        self.identifier = self.identifier.with_key(Some(key.into()));
        self
    }

    pub fn identifier(&self) -> &ServiceIdentifier {
        &self.identifier
    }

    pub fn is_required(&self) -> bool {
        matches!(self.fallback, Fallback::Required)
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fallback = match self.fallback {
            Fallback::Required => "required",
            Fallback::Optional => "optional",
            Fallback::Default(_) => "defaulted",
        };
        write!(f, "Dependency({}, {})", self.identifier, fallback)
    }
}

/// Resolved dependencies, consumed in declaration order by [`Injectable::construct`].
pub struct Arguments {
    owner: &'static str,
    position: usize,
    values: smallvec::IntoIter<[Option<AnyArc>; 4]>,
}

impl Arguments {
    pub(crate) fn new(owner: &'static str, values: SmallVec<[Option<AnyArc>; 4]>) -> Self {
        Self {
            owner,
            position: 0,
            values: values.into_iter(),
        }
    }

    /// Takes the next dependency, which must be present.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        match self.take_optional::<T>()? {
            Some(value) => Ok(value),
            None => Err(DiError::UnresolvableParameter {
                owner: self.owner,
                parameter: format!("#{} ({})", self.position - 1, std::any::type_name::<T>()),
            }),
        }
    }

    /// Takes the next dependency, `None` when an optional dependency was absent.
    pub fn take_optional<T: Send + Sync + 'static>(&mut self) -> DiResult<Option<Arc<T>>> {
        self.position += 1;
        match self.values.next() {
            Some(Some(value)) => crate::traits::downcast::<T>(value).map(Some),
            Some(None) => Ok(None),
            None => Err(DiError::UnresolvableParameter {
                owner: self.owner,
                parameter: format!(
                    "#{} ({}): more arguments taken than declared",
                    self.position - 1,
                    std::any::type_name::<T>()
                ),
            }),
        }
    }

    /// Number of arguments not yet taken.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

/// Constructor metadata for implementation-type registrations.
#[derive(Clone)]
pub(crate) struct ConstructorInfo {
    pub(crate) implementation: &'static str,
    pub(crate) dependencies: Vec<Dependency>,
    pub(crate) activator: Activator,
}

/// How a registration produces its instance. Exactly one strategy per descriptor.
#[derive(Clone)]
pub(crate) enum Implementation {
    Type(ConstructorInfo),
    Factory(SyncFactory),
    AsyncFactory(AsyncFactory),
    Instance(AnyArc),
}

/// Implementation strategy of a descriptor, for introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImplementationKind {
    /// Constructed from an [`Injectable`] type
    Type(&'static str),
    /// Synchronous factory
    Factory,
    /// Asynchronous factory
    AsyncFactory,
    /// Fixed instance supplied at registration
    Instance,
}

/// One service registration: identifier, implementation strategy, lifetime and
/// auto-activation flag.
///
/// Descriptors are immutable once built. When several share an identifier the
/// last one wins for ordinary resolution; all of them are returned by
/// enumeration.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{ImplementationKind, Lifetime, ServiceDescriptor};
///
/// struct Clock;
///
/// let descriptor: ServiceDescriptor = ServiceDescriptor::factory(Lifetime::Singleton, |_| Ok(Clock))
///     .keyed("utc")
///     .auto_activate()
///     .into();
///
/// assert_eq!(descriptor.lifetime(), Lifetime::Singleton);
/// assert_eq!(descriptor.implementation_kind(), ImplementationKind::Factory);
/// assert!(descriptor.is_auto_activated());
/// assert_eq!(descriptor.identifier().key().map(ToString::to_string), Some("utc".to_string()));
/// ```
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub(crate) identifier: ServiceIdentifier,
    pub(crate) lifetime: Lifetime,
    pub(crate) implementation: Implementation,
    pub(crate) auto_activate: bool,
    pub(crate) dispose: Option<DisposeHook>,
}

impl ServiceDescriptor {
    /// Registration constructed through [`Injectable`].
    pub fn constructor<T: Injectable>(lifetime: Lifetime) -> DescriptorBuilder<T> {
        let activator: Activator = Arc::new(|mut args: Arguments| {
            let instance = T::construct(&mut args)?;
            Ok(Arc::new(instance) as AnyArc)
        });
        DescriptorBuilder::new(
            lifetime,
            Implementation::Type(ConstructorInfo {
                implementation: std::any::type_name::<T>(),
                dependencies: T::dependencies(),
                activator,
            }),
        )
    }

    /// Registration produced by a synchronous factory of the active scope.
    pub fn factory<T, F>(lifetime: Lifetime, factory: F) -> DescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceScope) -> DiResult<T> + Send + Sync + 'static,
    {
        let factory: SyncFactory = Arc::new(move |scope: &ServiceScope| {
            factory(scope).map(|instance| Arc::new(instance) as AnyArc)
        });
        DescriptorBuilder::new(lifetime, Implementation::Factory(factory))
    }

    /// Registration produced by an asynchronous factory of the active scope.
    pub fn async_factory<T, F, Fut>(lifetime: Lifetime, factory: F) -> DescriptorBuilder<T>
    where
        T: Send + Sync + 'static,
        F: Fn(ServiceScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        let factory: AsyncFactory = Arc::new(move |scope: ServiceScope| {
            let pending = factory(scope);
            Box::pin(async move { pending.await.map(|instance| Arc::new(instance) as AnyArc) })
        });
        DescriptorBuilder::new(lifetime, Implementation::AsyncFactory(factory))
    }

    /// Registration of a fixed instance. Always a singleton, never disposed by the container.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> DescriptorBuilder<T> {
        Self::shared_instance(Arc::new(value))
    }

    /// Registration of a fixed, already shared instance.
    pub fn shared_instance<T: Send + Sync + 'static>(value: Arc<T>) -> DescriptorBuilder<T> {
        DescriptorBuilder::new(Lifetime::Singleton, Implementation::Instance(value as AnyArc))
    }

    pub fn identifier(&self) -> &ServiceIdentifier {
        &self.identifier
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn is_auto_activated(&self) -> bool {
        self.auto_activate
    }

    /// True when a disposal capability was attached at registration.
    pub fn is_disposable(&self) -> bool {
        self.dispose.is_some()
    }

    pub fn implementation_kind(&self) -> ImplementationKind {
        match &self.implementation {
            Implementation::Type(info) => ImplementationKind::Type(info.implementation),
            Implementation::Factory(_) => ImplementationKind::Factory,
            Implementation::AsyncFactory(_) => ImplementationKind::AsyncFactory,
            Implementation::Instance(_) => ImplementationKind::Instance,
        }
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("identifier", &self.identifier)
            .field("lifetime", &self.lifetime)
            .field("implementation", &self.implementation_kind())
            .field("auto_activate", &self.auto_activate)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

/// Typed builder for a [`ServiceDescriptor`].
///
/// The type parameter lets disposal capabilities be attached only to services
/// that implement [`Dispose`] or [`AsyncDispose`].
pub struct DescriptorBuilder<T> {
    descriptor: ServiceDescriptor,
    _service: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DescriptorBuilder<T> {
    fn new(lifetime: Lifetime, implementation: Implementation) -> Self {
        Self {
            descriptor: ServiceDescriptor {
                identifier: ServiceIdentifier::of::<T>(),
                lifetime,
                implementation,
                auto_activate: false,
                dispose: None,
            },
            _service: PhantomData,
        }
    }

    /// Registers under `key` instead of the unkeyed slot.
    ///
    /// [`ServiceKey::Any`] only selects overrides; a provider refuses to
    /// build from a registration keyed with it.
    pub fn keyed(mut self, key: impl Into<ServiceKey>) -> Self {
        let key = key.into();
        if key.is_any() {
            tracing::warn!(
                service = std::any::type_name::<T>(),
                "ServiceKey::Any cannot identify a registration"
            );
        }
        self.descriptor.identifier = ServiceIdentifier::keyed::<T>(key);
        self
    }

    /// Asks the provider to construct the service eagerly on activation.
    pub fn auto_activate(mut self) -> Self {
        self.descriptor.auto_activate = true;
        self
    }

    pub fn build(self) -> ServiceDescriptor {
        self.descriptor
    }

    fn with_dispose_hook(mut self, hook: DisposeHook) -> Self {
        // Fixed instances belong to whoever supplied them.
        if !matches!(self.descriptor.implementation, Implementation::Instance(_)) {
            self.descriptor.dispose = Some(hook);
        }
        self
    }
}

impl<T: Dispose> DescriptorBuilder<T> {
    /// Captures produced instances for synchronous release at scope teardown.
    pub fn disposable(self) -> Self {
        self.with_dispose_hook(Arc::new(|instance: &AnyArc| {
            let service = instance.clone().downcast::<T>().ok()?;
            Some(Disposer::sync(std::any::type_name::<T>(), move || {
                Dispose::dispose(&*service)
            }))
        }))
    }
}

impl<T: AsyncDispose> DescriptorBuilder<T> {
    /// Captures produced instances for awaited release at scope teardown.
    pub fn async_disposable(self) -> Self {
        self.with_dispose_hook(Arc::new(|instance: &AnyArc| {
            let service = instance.clone().downcast::<T>().ok()?;
            Some(Disposer::asynchronous(std::any::type_name::<T>(), move || {
                Box::pin(async move { AsyncDispose::dispose(&*service).await })
            }))
        }))
    }
}

impl<T: Send + Sync + 'static> From<DescriptorBuilder<T>> for ServiceDescriptor {
    fn from(builder: DescriptorBuilder<T>) -> Self {
        builder.build()
    }
}
