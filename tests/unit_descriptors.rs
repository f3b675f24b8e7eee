/// Unit tests for descriptors, dependencies and argument handling.
use ferrous_ioc::{
    Arguments, BoxError, DiError, DiResult, Dependency, Dispose, ImplementationKind, Injectable, Lifetime,
    Resolver, ServiceCollection, ServiceDescriptor, ServiceIdentifier, ServiceKey,
};
use std::sync::Arc;

struct Clock;

impl Injectable for Clock {
    fn construct(_: &mut Arguments) -> DiResult<Self> {
        Ok(Clock)
    }
}

impl Dispose for Clock {
    fn dispose(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

#[test]
fn test_constructor_descriptor() {
    let descriptor = ServiceDescriptor::constructor::<Clock>(Lifetime::Scoped).build();

    assert_eq!(descriptor.identifier(), &ServiceIdentifier::of::<Clock>());
    assert_eq!(descriptor.lifetime(), Lifetime::Scoped);
    assert!(matches!(descriptor.implementation_kind(), ImplementationKind::Type(name) if name.ends_with("Clock")));
    assert!(!descriptor.is_auto_activated());
    assert!(!descriptor.is_disposable());
}

#[test]
fn test_factory_descriptors() {
    let sync: ServiceDescriptor = ServiceDescriptor::factory(Lifetime::Transient, |_| Ok(Clock)).into();
    assert_eq!(sync.implementation_kind(), ImplementationKind::Factory);
    assert_eq!(sync.lifetime(), Lifetime::Transient);

    let asynchronous: ServiceDescriptor =
        ServiceDescriptor::async_factory(Lifetime::Singleton, |_| async { Ok::<_, DiError>(Clock) }).into();
    assert_eq!(asynchronous.implementation_kind(), ImplementationKind::AsyncFactory);
}

#[test]
fn test_instance_descriptor_is_singleton_and_never_disposable() {
    let descriptor = ServiceDescriptor::instance(Clock).disposable().build();

    assert_eq!(descriptor.lifetime(), Lifetime::Singleton);
    assert_eq!(descriptor.implementation_kind(), ImplementationKind::Instance);
    assert!(!descriptor.is_disposable());

    let shared = ServiceDescriptor::shared_instance(Arc::new(Clock)).build();
    assert_eq!(shared.implementation_kind(), ImplementationKind::Instance);
}

#[test]
fn test_builder_options() {
    let descriptor = ServiceDescriptor::factory(Lifetime::Singleton, |_| Ok(Clock))
        .keyed(7i64)
        .auto_activate()
        .disposable()
        .build();

    assert_eq!(descriptor.identifier().key(), Some(&ServiceKey::Index(7)));
    assert!(descriptor.is_auto_activated());
    assert!(descriptor.is_disposable());
}

#[test]
fn test_descriptor_debug() {
    let descriptor = ServiceDescriptor::constructor::<Clock>(Lifetime::Transient).build();
    let debug = format!("{:?}", descriptor);

    assert!(debug.contains("ServiceDescriptor"));
    assert!(debug.contains("Transient"));
    assert!(debug.contains("Clock"));
}

#[test]
fn test_dependency_constructors() {
    let required = Dependency::required::<Clock>();
    assert!(required.is_required());
    assert_eq!(required.identifier(), &ServiceIdentifier::of::<Clock>());

    let keyed = Dependency::keyed::<Clock>("utc");
    assert!(keyed.is_required());
    assert_eq!(keyed.identifier(), &ServiceIdentifier::keyed::<Clock>("utc"));

    let optional = Dependency::optional::<Clock>().with_key("local");
    assert!(!optional.is_required());
    assert_eq!(optional.identifier(), &ServiceIdentifier::keyed::<Clock>("local"));

    let defaulted = Dependency::defaulted(5u8);
    assert!(!defaulted.is_required());
    assert!(format!("{:?}", defaulted).contains("defaulted"));
}

#[tokio::test]
async fn test_keyed_dependency_resolution() {
    struct Report {
        utc: Arc<String>,
        local: Option<Arc<String>>,
    }

    impl Injectable for Report {
        fn dependencies() -> Vec<Dependency> {
            vec![
                Dependency::keyed::<String>("utc"),
                Dependency::optional::<String>().with_key("local"),
            ]
        }

        fn construct(args: &mut Arguments) -> DiResult<Self> {
            assert_eq!(args.remaining(), 2);
            Ok(Report {
                utc: args.take()?,
                local: args.take_optional()?,
            })
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_keyed_instance("utc", "12:00Z".to_string());
    sc.add_transient::<Report>();
    let sp = sc.build().unwrap();

    let report = sp.get_required::<Report>().await.unwrap();
    assert_eq!(*report.utc, "12:00Z");
    assert!(report.local.is_none());
}

#[tokio::test]
async fn test_taking_more_arguments_than_declared_fails() {
    struct Greedy;

    impl Injectable for Greedy {
        fn construct(args: &mut Arguments) -> DiResult<Self> {
            args.take::<String>()?;
            Ok(Greedy)
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient::<Greedy>();
    let sp = sc.build().unwrap();

    match sp.get_required::<Greedy>().await {
        Err(DiError::UnresolvableParameter { owner, parameter }) => {
            assert!(owner.ends_with("Greedy"));
            assert!(parameter.contains("more arguments taken than declared"));
        }
        other => panic!("expected UnresolvableParameter, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_taking_the_wrong_type_is_a_mismatch() {
    struct Confused;

    impl Injectable for Confused {
        fn dependencies() -> Vec<Dependency> {
            vec![Dependency::required::<u32>()]
        }

        fn construct(args: &mut Arguments) -> DiResult<Self> {
            args.take::<u64>()?;
            Ok(Confused)
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_instance(1u32);
    sc.add_transient::<Confused>();
    let sp = sc.build().unwrap();

    assert!(matches!(
        sp.get_required::<Confused>().await,
        Err(DiError::TypeMismatch("u64"))
    ));
}

#[test]
fn test_wildcard_key_registration_is_rejected_at_build() {
    let mut sc = ServiceCollection::new();
    sc.add(ServiceDescriptor::instance(1u8).keyed(ServiceKey::Any));
    sc.add_keyed_instance("blue", 2u8);

    match sc.build() {
        Err(DiError::InvalidRegistrations(errors)) => {
            assert_eq!(errors.len(), 1);
            assert!(matches!(&errors[0], DiError::InvalidKey(service) if service.contains("u8")));
        }
        Err(other) => panic!("expected InvalidRegistrations, got {}", other),
        Ok(_) => panic!("a wildcard-keyed registration must not build"),
    }
}
