//! # ferrous-ioc
//!
//! Call-site compiling dependency injection for Rust.
//!
//! Registrations are compiled, once per service, into reusable construction
//! plans ("call sites") that are executed against a scope. Results are cached
//! according to lifetime, disposable instances are released in reverse
//! creation order when their scope closes, and any service can be temporarily
//! overridden for tests.
//!
//! ## Features
//!
//! - **Lifetimes**: Singleton, Scoped and Transient, with concurrent callers
//!   constructing each cached instance exactly once
//! - **Static wiring**: dependencies are declared through [`Injectable`], no
//!   runtime reflection
//! - **Circular dependency detection**: reported with the full path, before
//!   any constructor runs
//! - **Keyed services and enumeration**: several registrations per type
//! - **Structured teardown**: sync and async disposal, every failure reported
//! - **Overrides**: RAII-scoped substitution of any service
//! - **Lazy container**: [`ServiceContainer`] builds its provider on first use
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_ioc::{Arguments, Dependency, DiResult, Injectable, Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! struct EmailService;
//!
//! impl Injectable for EmailService {
//!     fn construct(_: &mut Arguments) -> DiResult<Self> {
//!         Ok(EmailService)
//!     }
//! }
//!
//! struct UserService {
//!     email: Arc<EmailService>,
//! }
//!
//! impl Injectable for UserService {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::required::<EmailService>()]
//!     }
//!
//!     fn construct(args: &mut Arguments) -> DiResult<Self> {
//!         Ok(UserService { email: args.take()? })
//!     }
//! }
//!
//! # async fn example() -> DiResult<()> {
//! let mut services = ServiceCollection::new();
//! services.add_transient::<EmailService>();
//! services.add_transient::<UserService>();
//!
//! let provider = services.build()?;
//! let first = provider.get_required::<UserService>().await?;
//! let second = provider.get_required::<UserService>().await?;
//! assert!(!Arc::ptr_eq(&first.email, &second.email));
//!
//! provider.close_async().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once, from the root, and shared across the entire application
//! - **Scoped**: Created once per scope (ideal for request contexts)
//! - **Transient**: Created fresh on every resolution
//!
//! ## Scopes and Teardown
//!
//! ```rust
//! use ferrous_ioc::{BoxError, Dispose, Lifetime, Resolver, ServiceCollection, ServiceDescriptor};
//!
//! struct Connection;
//!
//! impl Dispose for Connection {
//!     fn dispose(&self) -> Result<(), BoxError> {
//!         println!("connection closed");
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> ferrous_ioc::DiResult<()> {
//! let mut services = ServiceCollection::new();
//! services.add(ServiceDescriptor::factory(Lifetime::Scoped, |_| Ok(Connection)).disposable());
//!
//! let provider = services.build()?;
//! let scope = provider.create_scope()?;
//! let _connection = scope.get_required::<Connection>().await?;
//! scope.close_async().await?; // "connection closed"
//! # Ok(())
//! # }
//! ```
//!
//! ## Overrides
//!
//! ```rust
//! use ferrous_ioc::{Resolver, ServiceCollection};
//! use std::sync::Arc;
//!
//! # async fn example() -> ferrous_ioc::DiResult<()> {
//! let mut services = ServiceCollection::new();
//! services.add_instance(String::from("production"));
//! let provider = services.build()?;
//!
//! let guard = provider.override_service(Arc::new(String::from("test")))?;
//! assert_eq!(*provider.get_required::<String>().await?, "test");
//! drop(guard);
//! assert_eq!(*provider.get_required::<String>().await?, "production");
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod collection;
pub mod config;
pub mod container;
pub mod descriptors;
pub mod error;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod provider;
pub mod traits;

// Internal modules
mod call_site;
mod internal;

pub use collection::ServiceCollection;
pub use config::ProviderOptions;
pub use container::ServiceContainer;
pub use descriptors::{Arguments, Dependency, DescriptorBuilder, ImplementationKind, Injectable, ServiceDescriptor};
pub use error::{BoxError, DiError, DiResult, DisposalFailure};
pub use key::{ServiceIdentifier, ServiceKey};
pub use lifetime::{CacheLocation, Lifetime};
pub use observer::{DiObserver, LoggingObserver};
pub use provider::{compile_provider, OverrideGuard, ServiceProvider, ServiceScope};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};
