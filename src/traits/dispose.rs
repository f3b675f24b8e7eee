//! Disposal traits for resource cleanup.

use crate::error::BoxError;

/// Trait for synchronous resource disposal.
///
/// Implement this trait for services that need structured teardown (e.g., flushing caches,
/// closing connections) and register them with [`disposable`](crate::DescriptorBuilder::disposable).
/// The scope that produced an instance releases it, in reverse creation order, when it closes.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{BoxError, Dispose, Lifetime, ServiceCollection, ServiceDescriptor};
///
/// struct Cache {
///     name: String,
/// }
///
/// impl Dispose for Cache {
///     fn dispose(&self) -> Result<(), BoxError> {
///         println!("Flushing cache: {}", self.name);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add(
///     ServiceDescriptor::factory(Lifetime::Scoped, |_| Ok(Cache { name: "user_cache".into() }))
///         .disposable(),
/// );
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Perform synchronous cleanup of resources.
    fn dispose(&self) -> Result<(), BoxError>;
}

/// Trait for asynchronous resource disposal.
///
/// Implement this trait for services that require async teardown (e.g., graceful connection
/// shutdown, async I/O cleanup) and register them with
/// [`async_disposable`](crate::DescriptorBuilder::async_disposable). Async releases are
/// awaited by [`close_async`](crate::ServiceScope::close_async).
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{AsyncDispose, BoxError, Lifetime, ServiceCollection, ServiceDescriptor};
/// use async_trait::async_trait;
///
/// struct DatabaseClient {
///     connection_id: String,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for DatabaseClient {
///     async fn dispose(&self) -> Result<(), BoxError> {
///         println!("Closing database connection: {}", self.connection_id);
///         Ok(())
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add(
///     ServiceDescriptor::factory(Lifetime::Singleton, |_| {
///         Ok(DatabaseClient { connection_id: "conn_123".into() })
///     })
///     .async_disposable(),
/// );
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Perform asynchronous cleanup of resources.
    async fn dispose(&self) -> Result<(), BoxError>;
}
