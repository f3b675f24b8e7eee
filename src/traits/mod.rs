//! Core traits for the IoC container.

mod dispose;
mod resolver;

pub use dispose::{Dispose, AsyncDispose};
pub use resolver::{Resolver, ResolverCore};
pub(crate) use resolver::downcast;
