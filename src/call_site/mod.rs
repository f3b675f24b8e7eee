//! Compiled construction plans ("call sites").
//!
//! A call site describes how to produce the instance for one identifier and
//! where the result is cached. Call sites are compiled once per identifier
//! by the [`CallSiteFactory`] and executed by the [`RuntimeResolver`].

mod factory;
mod resolver;

pub(crate) use factory::CallSiteFactory;
pub(crate) use resolver::RuntimeResolver;

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::descriptors::{Activator, AnyArc, AsyncFactory, DisposeHook, SyncFactory};
use crate::key::ServiceIdentifier;
use crate::lifetime::{CacheLocation, Lifetime};
use crate::provider::{ActiveOverride, ServiceProvider, ServiceScope};

/// Cache identity of a resolved instance: the identifier plus its slot.
///
/// Slot 0 is the last registration for the identifier; enumeration gives
/// every earlier registration its own slot so each is cached separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ServiceCacheKey {
    pub(crate) identifier: ServiceIdentifier,
    pub(crate) slot: usize,
}

impl ServiceCacheKey {
    pub(crate) fn new(identifier: ServiceIdentifier, slot: usize) -> Self {
        Self { identifier, slot }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ResultCache {
    pub(crate) location: CacheLocation,
    pub(crate) key: ServiceCacheKey,
}

impl ResultCache {
    pub(crate) fn none(identifier: ServiceIdentifier) -> Self {
        Self {
            location: CacheLocation::None,
            key: ServiceCacheKey::new(identifier, 0),
        }
    }

    pub(crate) fn for_lifetime(lifetime: Lifetime, identifier: ServiceIdentifier, slot: usize) -> Self {
        Self {
            location: lifetime.cache_location(),
            key: ServiceCacheKey::new(identifier, slot),
        }
    }
}

/// Services every provider can resolve without a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    /// The scope doing the resolving
    Scope,
    /// The provider owning that scope
    Provider,
}

impl Builtin {
    pub(crate) fn of(identifier: &ServiceIdentifier) -> Option<Self> {
        if *identifier == ServiceIdentifier::of::<ServiceScope>() {
            Some(Builtin::Scope)
        } else if *identifier == ServiceIdentifier::of::<ServiceProvider>() {
            Some(Builtin::Provider)
        } else {
            None
        }
    }
}

pub(crate) enum CallSiteKind {
    Constructor {
        implementation: &'static str,
        /// `None` marks an optional dependency with nothing registered
        parameters: Vec<Option<Arc<CallSite>>>,
        activator: Activator,
    },
    SyncFactory(SyncFactory),
    AsyncFactory(AsyncFactory),
    Constant(AnyArc),
    Builtin(Builtin),
}

/// Reusable plan for producing one service instance.
pub(crate) struct CallSite {
    pub(crate) identifier: ServiceIdentifier,
    pub(crate) cache: ResultCache,
    pub(crate) kind: CallSiteKind,
    pub(crate) dispose: Option<DisposeHook>,
    /// Graph contains an override constant; must not be memoized
    pub(crate) volatile: bool,
    /// Set on constants standing in for an override
    pub(crate) override_token: Option<u64>,
    /// Root-cached value built without any override in effect
    pub(crate) value: OnceCell<AnyArc>,
}

impl CallSite {
    pub(crate) fn new(
        identifier: ServiceIdentifier,
        cache: ResultCache,
        kind: CallSiteKind,
        dispose: Option<DisposeHook>,
    ) -> Self {
        let volatile = match &kind {
            CallSiteKind::Constructor { parameters, .. } => {
                parameters.iter().flatten().any(|parameter| parameter.volatile)
            }
            _ => false,
        };
        Self {
            identifier,
            cache,
            kind,
            dispose,
            volatile,
            override_token: None,
            value: OnceCell::new(),
        }
    }

    /// Fixed instance: no caching, no disposal capture.
    pub(crate) fn constant(identifier: ServiceIdentifier, instance: AnyArc) -> Self {
        let cache = ResultCache::none(identifier.clone());
        Self::new(identifier, cache, CallSiteKind::Constant(instance), None)
    }

    /// Constant standing in for an active override.
    pub(crate) fn overridden(identifier: ServiceIdentifier, active: ActiveOverride) -> Self {
        let mut call_site = Self::constant(identifier, active.instance);
        call_site.volatile = true;
        call_site.override_token = Some(active.token);
        call_site
    }

    pub(crate) fn builtin(identifier: ServiceIdentifier, builtin: Builtin) -> Self {
        let cache = ResultCache::none(identifier.clone());
        Self::new(identifier, cache, CallSiteKind::Builtin(builtin), None)
    }

    pub(crate) fn is_factory(&self) -> bool {
        matches!(self.kind, CallSiteKind::SyncFactory(_) | CallSiteKind::AsyncFactory(_))
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn implementation_name(&self) -> &'static str {
        match &self.kind {
            CallSiteKind::Constructor { implementation, .. } => implementation,
            _ => self.identifier.type_name(),
        }
    }

    #[cfg(feature = "diagnostics")]
    pub(crate) fn kind_name(&self) -> &'static str {
        match &self.kind {
            CallSiteKind::Constructor { .. } => "Constructor",
            CallSiteKind::SyncFactory(_) => "SyncFactory",
            CallSiteKind::AsyncFactory(_) => "AsyncFactory",
            CallSiteKind::Constant(_) => "Constant",
            CallSiteKind::Builtin(_) => "Builtin",
        }
    }
}
