//! Service identity types for the IoC container.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Optional discriminator that lets several registrations share one type.
///
/// `Any` is a wildcard sentinel: it never identifies a registration on its own,
/// but an override registered under `Any` stands in for every keyed request of
/// that type that has no exact-key override.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::ServiceKey;
///
/// let primary: ServiceKey = "primary".into();
/// let shard: ServiceKey = 3i64.into();
///
/// assert_eq!(primary.to_string(), "primary");
/// assert_eq!(shard.to_string(), "3");
/// assert!(ServiceKey::Any.is_any());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceKey {
    /// String key, the common case for named registrations
    Name(Arc<str>),
    /// Integer key, handy for shards and slots
    Index(i64),
    /// Wildcard matching any key (overrides only)
    Any,
}

impl ServiceKey {
    /// Returns true for the wildcard sentinel.
    pub fn is_any(&self) -> bool {
        matches!(self, ServiceKey::Any)
    }
}

impl From<&str> for ServiceKey {
    fn from(value: &str) -> Self {
        ServiceKey::Name(Arc::from(value))
    }
}

impl From<String> for ServiceKey {
    fn from(value: String) -> Self {
        ServiceKey::Name(Arc::from(value))
    }
}

impl From<i64> for ServiceKey {
    fn from(value: i64) -> Self {
        ServiceKey::Index(value)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKey::Name(name) => f.write_str(name),
            ServiceKey::Index(index) => write!(f, "{}", index),
            ServiceKey::Any => f.write_str("*"),
        }
    }
}

/// Value identity of a registration: the service type plus an optional key.
///
/// Identifiers are the key of every lookup table in the container. Equality
/// and hashing only consider the `TypeId` and the key; the type name is kept
/// for diagnostics.
///
/// # Examples
///
/// ```rust
/// use ferrous_ioc::ServiceIdentifier;
///
/// struct Mailer;
///
/// let plain = ServiceIdentifier::of::<Mailer>();
/// let keyed = ServiceIdentifier::keyed::<Mailer>("smtp");
///
/// assert_ne!(plain, keyed);
/// assert_eq!(keyed, ServiceIdentifier::keyed::<Mailer>("smtp"));
/// assert!(keyed.to_string().ends_with("Mailer[smtp]"));
/// ```
#[derive(Clone)]
pub struct ServiceIdentifier {
    type_id: TypeId,
    type_name: &'static str,
    key: Option<ServiceKey>,
}

impl ServiceIdentifier {
    /// Identifier of the unkeyed registration for `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
        }
    }

    /// Identifier of the registration for `T` under `key`.
    pub fn keyed<T: ?Sized + 'static>(key: impl Into<ServiceKey>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::of::<T>()
        }
    }

    /// Replaces the key, keeping the service type.
    pub fn with_key(&self, key: Option<ServiceKey>) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            key,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name (`std::any::type_name`).
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn key(&self) -> Option<&ServiceKey> {
        self.key.as_ref()
    }

    /// The wildcard form of a keyed identifier, used to look up `Any` overrides.
    pub(crate) fn wildcard(&self) -> Option<Self> {
        match &self.key {
            Some(key) if !key.is_any() => Some(self.with_key(Some(ServiceKey::Any))),
            _ => None,
        }
    }
}

impl PartialEq for ServiceIdentifier {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.key == other.key
    }
}

impl Eq for ServiceIdentifier {}

impl Hash for ServiceIdentifier {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.key.hash(state);
    }
}

impl fmt::Display for ServiceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}[{}]", self.type_name, key),
            None => f.write_str(self.type_name),
        }
    }
}

impl fmt::Debug for ServiceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceIdentifier({})", self)
    }
}
