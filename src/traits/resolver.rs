//! Resolver traits for service resolution.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::descriptors::AnyArc;
use crate::error::{DiError, DiResult};
use crate::key::{ServiceIdentifier, ServiceKey};

/// Core resolver trait for object-safe service resolution.
///
/// Works on type-erased instances. Every resolution compiles (or reuses) the
/// call site for the identifier and executes it against the implementing
/// scope. Most users should use the [`Resolver`] trait instead, which layers
/// typed accessors on top of this one.
pub trait ResolverCore: Send + Sync {
    /// Resolves the last registration for `identifier`.
    ///
    /// Returns `Ok(None)` when nothing is registered (and no override is active).
    fn resolve_any<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Option<AnyArc>>>;

    /// Resolves every registration for `identifier`, in registration order.
    fn resolve_many<'a>(
        &'a self,
        identifier: &'a ServiceIdentifier,
    ) -> BoxFuture<'a, DiResult<Vec<AnyArc>>>;
}

/// High-level resolver interface with generic methods for type-safe service resolution.
///
/// Implemented for every [`ResolverCore`], so both `ServiceProvider` and
/// `ServiceScope` expose the same accessors.
///
/// # Examples
///
/// ```
/// use ferrous_ioc::{Resolver, ServiceCollection};
///
/// # async fn example() -> ferrous_ioc::DiResult<()> {
/// let mut services = ServiceCollection::new();
/// services.add_instance(42usize);
///
/// let provider = services.build()?;
/// let number = provider.get_required::<usize>().await?;
/// assert_eq!(*number, 42);
/// assert!(provider.get::<String>().await?.is_none());
/// # Ok(())
/// # }
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves `T`, returning `None` when it is not registered.
    fn get<T: Send + Sync + 'static>(&self) -> BoxFuture<'_, DiResult<Option<Arc<T>>>> {
        Box::pin(async move {
            let identifier = ServiceIdentifier::of::<T>();
            self.resolve_any(&identifier)
                .await?
                .map(downcast::<T>)
                .transpose()
        })
    }

    /// Resolves `T`, failing with [`DiError::NotRegistered`] when it is not registered.
    fn get_required<T: Send + Sync + 'static>(&self) -> BoxFuture<'_, DiResult<Arc<T>>> {
        Box::pin(async move {
            let identifier = ServiceIdentifier::of::<T>();
            match self.resolve_any(&identifier).await? {
                Some(instance) => downcast::<T>(instance),
                None => Err(DiError::NotRegistered(identifier.to_string())),
            }
        })
    }

    /// Resolves the registration of `T` under `key`.
    fn get_keyed<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> BoxFuture<'_, DiResult<Option<Arc<T>>>> {
        let identifier = ServiceIdentifier::keyed::<T>(key);
        Box::pin(async move {
            self.resolve_any(&identifier)
                .await?
                .map(downcast::<T>)
                .transpose()
        })
    }

    /// Resolves the registration of `T` under `key`, failing when it is missing.
    fn get_required_keyed<T: Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> BoxFuture<'_, DiResult<Arc<T>>> {
        let identifier = ServiceIdentifier::keyed::<T>(key);
        Box::pin(async move {
            match self.resolve_any(&identifier).await? {
                Some(instance) => downcast::<T>(instance),
                None => Err(DiError::NotRegistered(identifier.to_string())),
            }
        })
    }

    /// Resolves every registration of `T`, in registration order.
    fn get_all<T: Send + Sync + 'static>(&self) -> BoxFuture<'_, DiResult<Vec<Arc<T>>>> {
        Box::pin(async move {
            let identifier = ServiceIdentifier::of::<T>();
            self.resolve_many(&identifier)
                .await?
                .into_iter()
                .map(downcast::<T>)
                .collect()
        })
    }
}

impl<R: ResolverCore + ?Sized> Resolver for R {}

pub(crate) fn downcast<T: Send + Sync + 'static>(instance: AnyArc) -> DiResult<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
}
