use ferrous_ioc::{
    Arguments, DiResult, Dependency, Injectable, Resolver, ServiceCollection, ServiceProvider, ServiceScope,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct RequestState {
    id: usize,
}

struct UnitOfWork {
    scope: Arc<ServiceScope>,
}

impl Injectable for UnitOfWork {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::required::<ServiceScope>()]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(UnitOfWork { scope: args.take()? })
    }
}

fn request_services() -> ServiceCollection {
    let next = Arc::new(AtomicUsize::new(0));
    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory(move |_| {
        Ok(RequestState {
            id: next.fetch_add(1, Ordering::SeqCst),
        })
    });
    sc.add_scoped::<UnitOfWork>();
    sc
}

#[tokio::test]
async fn test_scope_and_provider_are_services_without_registration() {
    let sp = ServiceCollection::new().build().unwrap();
    let scope = sp.create_scope().unwrap();

    assert!(sp.is_service::<ServiceScope>());
    assert!(sp.is_service::<ServiceProvider>());
    assert!(scope.is_service::<ServiceScope>());
    assert!(!sp.is_keyed_service::<ServiceScope>("named"));

    assert!(scope.get::<ServiceScope>().await.unwrap().is_some());
    assert!(scope.get::<ServiceProvider>().await.unwrap().is_some());
    assert_eq!(sp.get_all::<ServiceScope>().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_resolved_scope_shares_the_resolving_scope() {
    let sp = request_services().build().unwrap();
    let scope = sp.create_scope().unwrap();

    let state = scope.get_required::<RequestState>().await.unwrap();
    let resolved = scope.get_required::<ServiceScope>().await.unwrap();
    let through_resolved = resolved.get_required::<RequestState>().await.unwrap();
    assert!(Arc::ptr_eq(&state, &through_resolved));

    let other = sp.create_scope().unwrap();
    assert_ne!(other.get_required::<RequestState>().await.unwrap().id, state.id);
}

#[tokio::test]
async fn test_scope_is_injected_into_constructors() {
    let sp = request_services().build().unwrap();
    let scope = sp.create_scope().unwrap();

    let unit = scope.get_required::<UnitOfWork>().await.unwrap();
    let state = scope.get_required::<RequestState>().await.unwrap();
    assert!(Arc::ptr_eq(&state, &unit.scope.get_required::<RequestState>().await.unwrap()));

    scope.close_async().await.unwrap();
    assert!(unit.scope.is_closed());
}

#[tokio::test]
async fn test_resolved_provider_is_the_root() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(|_| Ok(RequestState { id: 42 }));
    let sp = sc.build().unwrap();
    let scope = sp.create_scope().unwrap();

    let provider = scope.get_required::<ServiceProvider>().await.unwrap();
    let singleton = sp.get_required::<RequestState>().await.unwrap();
    assert!(Arc::ptr_eq(&singleton, &provider.get_required::<RequestState>().await.unwrap()));

    sp.close_async().await.unwrap();
    assert!(provider.is_closed());
}

#[tokio::test]
async fn test_registration_replaces_builtin_scope() {
    let sp = ServiceCollection::new().build().unwrap();
    let mut sc = ServiceCollection::new();
    let fixed = sp.create_scope().unwrap();
    let registered = fixed.clone();
    sc.add_singleton_factory(move |_| Ok(registered.clone()));
    let other = sc.build().unwrap();

    let resolved = other.get_required::<ServiceScope>().await.unwrap();
    fixed.close().unwrap();
    assert!(resolved.is_closed());
}
