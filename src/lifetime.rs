//! Service lifetime definitions.

use std::fmt;

/// Service lifetimes controlling instance caching behavior
///
/// Defines how service instances are created, cached, and shared within
/// the container. Each lifetime maps onto the cache location of the call
/// site compiled for the registration.
///
/// # Lifetime Characteristics
///
/// - **Singleton**: one instance per provider, cached on the call site itself
/// - **Scoped**: one instance per scope, cached in the scope
/// - **Transient**: a fresh instance on every resolution
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::{CacheLocation, Lifetime};
///
/// assert_eq!(Lifetime::Singleton.cache_location(), CacheLocation::Root);
/// assert_eq!(Lifetime::Scoped.cache_location(), CacheLocation::Scope);
/// assert_eq!(Lifetime::Transient.cache_location(), CacheLocation::None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
pub enum Lifetime {
    /// Single instance per root provider, cached forever
    ///
    /// Created the first time it is requested, from the root scope, and
    /// shared by every scope and thread afterwards. Disposal is owned by
    /// the root.
    Singleton,
    /// Single instance per scope, cached for scope lifetime
    ///
    /// Multiple requests within the same scope return the same instance,
    /// different scopes get different instances.
    Scoped,
    /// New instance per resolution, never cached
    ///
    /// Disposable transients are still captured by the scope that produced
    /// them and released when that scope closes.
    Transient,
}

impl Lifetime {
    /// Cache policy used by call sites compiled for this lifetime.
    pub fn cache_location(self) -> CacheLocation {
        match self {
            Lifetime::Singleton => CacheLocation::Root,
            Lifetime::Scoped => CacheLocation::Scope,
            Lifetime::Transient => CacheLocation::None,
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifetime::Singleton => "Singleton",
            Lifetime::Scoped => "Scoped",
            Lifetime::Transient => "Transient",
        };
        f.write_str(name)
    }
}

/// Where the result of a call site is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLocation {
    /// Cached once on the call site, shared by the whole provider
    Root,
    /// Cached in the resolving scope
    Scope,
    /// Never cached
    None,
}
