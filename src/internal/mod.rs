//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod concurrent_map;
pub(crate) mod dispose_bag;

pub(crate) use circular::{CallSiteChain, ResolutionPath};
pub(crate) use concurrent_map::ConcurrentMap;
pub(crate) use dispose_bag::{DisposeBag, Disposer};

#[cfg(feature = "ahash")]
pub(crate) type FastHashMap<K, V> = ahash::AHashMap<K, V>;
#[cfg(not(feature = "ahash"))]
pub(crate) type FastHashMap<K, V> = std::collections::HashMap<K, V>;
