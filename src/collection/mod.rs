//! Service collection module for registering services.
//!
//! [`ServiceCollection`] is thin registration glue: every `add_*` method
//! appends a [`ServiceDescriptor`], and [`build`](ServiceCollection::build)
//! hands the ordered list to [`compile_provider`](crate::compile_provider).

use std::future::Future;
use std::sync::Arc;

use crate::config::ProviderOptions;
use crate::descriptors::{Injectable, ServiceDescriptor};
use crate::error::DiResult;
use crate::key::{ServiceIdentifier, ServiceKey};
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::provider::{ServiceProvider, ServiceScope};

/// Ordered list of registrations plus the options a provider is built with.
///
/// Registering the same service twice keeps both: the last one is resolved
/// by `get`, both are returned by `get_all`.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Lifetime, Resolver, ServiceCollection, ServiceDescriptor};
///
/// struct Clock;
///
/// # async fn example() -> ferrous_ioc::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services
///     .add_singleton_factory(|_| Ok(Clock))
///     .add_instance(String::from("app"))
///     .add(ServiceDescriptor::factory(Lifetime::Transient, |_| Ok(1u8)).keyed("one"));
///
/// assert_eq!(services.len(), 3);
/// let provider = services.build()?;
/// assert!(provider.is_keyed_service::<u8>("one"));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    observers: Observers,
    options: ProviderOptions,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a descriptor (or a [`DescriptorBuilder`](crate::DescriptorBuilder)).
    pub fn add(&mut self, descriptor: impl Into<ServiceDescriptor>) -> &mut Self {
        let descriptor = descriptor.into();
        tracing::trace!(
            service = %descriptor.identifier(),
            lifetime = %descriptor.lifetime(),
            "registered"
        );
        self.descriptors.push(descriptor);
        self
    }

    /// Appends `descriptor` only if its identifier has no registration yet.
    ///
    /// Returns whether it was added.
    pub fn try_add(&mut self, descriptor: impl Into<ServiceDescriptor>) -> bool {
        let descriptor = descriptor.into();
        if self.contains(descriptor.identifier()) {
            return false;
        }
        self.add(descriptor);
        true
    }

    // ----- Constructed types -----

    /// Registers `T`, constructed from its declared dependencies once per provider.
    pub fn add_singleton<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::constructor::<T>(Lifetime::Singleton))
    }

    /// Registers `T`, constructed once per scope.
    pub fn add_scoped<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::constructor::<T>(Lifetime::Scoped))
    }

    /// Registers `T`, constructed on every resolution.
    pub fn add_transient<T: Injectable>(&mut self) -> &mut Self {
        self.add(ServiceDescriptor::constructor::<T>(Lifetime::Transient))
    }

    pub fn add_keyed_singleton<T: Injectable>(&mut self, key: impl Into<ServiceKey>) -> &mut Self {
        self.add(ServiceDescriptor::constructor::<T>(Lifetime::Singleton).keyed(key))
    }

    pub fn add_keyed_scoped<T: Injectable>(&mut self, key: impl Into<ServiceKey>) -> &mut Self {
        self.add(ServiceDescriptor::constructor::<T>(Lifetime::Scoped).keyed(key))
    }

    pub fn add_keyed_transient<T: Injectable>(&mut self, key: impl Into<ServiceKey>) -> &mut Self {
        self.add(ServiceDescriptor::constructor::<T>(Lifetime::Transient).keyed(key))
    }

    // ----- Factories -----

    /// Registers a singleton factory that creates the instance on first request.
    ///
    /// The factory receives the root scope, runs once, and the result is shared
    /// by every scope.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceScope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Singleton, factory))
    }

    /// Registers a scoped factory that creates one instance per scope.
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceScope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Scoped, factory))
    }

    /// Registers a transient factory that creates a new instance on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceScope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Transient, factory))
    }

    pub fn add_keyed_singleton_factory<T, F>(&mut self, key: impl Into<ServiceKey>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceScope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Singleton, factory).keyed(key))
    }

    pub fn add_keyed_scoped_factory<T, F>(&mut self, key: impl Into<ServiceKey>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceScope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Scoped, factory).keyed(key))
    }

    pub fn add_keyed_transient_factory<T, F>(&mut self, key: impl Into<ServiceKey>, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ServiceScope) -> DiResult<T> + Send + Sync + 'static,
    {
        self.add(ServiceDescriptor::factory(Lifetime::Transient, factory).keyed(key))
    }

    // ----- Async factories -----

    /// Registers an async singleton factory.
    ///
    /// Suited to services that need asynchronous initialization (connection
    /// pools, handshakes). The factory runs once; concurrent callers wait for it.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_ioc::{Resolver, ServiceCollection};
    ///
    /// struct DatabasePool { connection_string: String }
    ///
    /// # async fn example() -> ferrous_ioc::DiResult<()> {
    /// let mut services = ServiceCollection::new();
    /// services.add_instance(String::from("postgres://localhost"));
    /// services.add_singleton_async_factory(|scope| async move {
    ///     let connection_string = scope.get_required::<String>().await?;
    ///     Ok::<_, ferrous_ioc::DiError>(DatabasePool { connection_string: connection_string.to_string() })
    /// });
    ///
    /// let provider = services.build()?;
    /// let pool = provider.get_required::<DatabasePool>().await?;
    /// assert_eq!(pool.connection_string, "postgres://localhost");
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_singleton_async_factory<T, F, Fut>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(ServiceScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.add(ServiceDescriptor::async_factory(Lifetime::Singleton, factory))
    }

    /// Registers an async scoped factory.
    pub fn add_scoped_async_factory<T, F, Fut>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(ServiceScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.add(ServiceDescriptor::async_factory(Lifetime::Scoped, factory))
    }

    /// Registers an async transient factory.
    pub fn add_transient_async_factory<T, F, Fut>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(ServiceScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.add(ServiceDescriptor::async_factory(Lifetime::Transient, factory))
    }

    // ----- Instances -----

    /// Registers a fixed instance shared across the entire application.
    ///
    /// The container never disposes it.
    pub fn add_instance<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.add(ServiceDescriptor::instance(value))
    }

    /// Registers an already shared instance.
    pub fn add_shared_instance<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.add(ServiceDescriptor::shared_instance(value))
    }

    pub fn add_keyed_instance<T: Send + Sync + 'static>(&mut self, key: impl Into<ServiceKey>, value: T) -> &mut Self {
        self.add(ServiceDescriptor::instance(value).keyed(key))
    }

    // ----- Diagnostics and options -----

    /// Adds an observer notified around every top-level resolution.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    /// Sets the options the provider will be built with.
    pub fn with_options(&mut self, options: ProviderOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    /// Registrations so far, in registration order.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// True when `identifier` has at least one registration.
    pub fn contains(&self, identifier: &ServiceIdentifier) -> bool {
        self.descriptors
            .iter()
            .any(|descriptor| descriptor.identifier() == identifier)
    }

    // ----- Building -----

    /// Compiles the registrations into a provider.
    ///
    /// With [`ProviderOptions::validate_on_build`], every registration is
    /// compiled now and all failures are reported together as
    /// [`DiError::InvalidRegistrations`](crate::DiError::InvalidRegistrations).
    pub fn build(self) -> DiResult<ServiceProvider> {
        ServiceProvider::new(self.descriptors, self.options, self.observers)
    }

    /// Builds the provider and constructs every auto-activated singleton.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_ioc::{Lifetime, ServiceCollection, ServiceDescriptor};
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// struct Warmup;
    ///
    /// # async fn example() -> ferrous_ioc::DiResult<()> {
    /// let started = Arc::new(AtomicUsize::new(0));
    /// let counter = started.clone();
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add(
    ///     ServiceDescriptor::factory(Lifetime::Singleton, move |_| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///         Ok(Warmup)
    ///     })
    ///     .auto_activate(),
    /// );
    ///
    /// let _provider = services.build_async().await?;
    /// assert_eq!(started.load(Ordering::SeqCst), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn build_async(self) -> DiResult<ServiceProvider> {
        let provider = self.build()?;
        provider.activate().await?;
        Ok(provider)
    }
}

impl Extend<ServiceDescriptor> for ServiceCollection {
    fn extend<I: IntoIterator<Item = ServiceDescriptor>>(&mut self, descriptors: I) {
        for descriptor in descriptors {
            self.add(descriptor);
        }
    }
}

impl std::fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("descriptors", &self.descriptors)
            .field("options", &self.options)
            .finish()
    }
}
