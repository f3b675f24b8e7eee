/// Property-based tests for service resolution
///
/// These tests verify that caching, enumeration and override behavior follow
/// the lifetime rules regardless of the registrations involved.
use ferrous_ioc::{DiResult, Lifetime, Resolver, ServiceCollection, ServiceDescriptor};
use proptest::prelude::*;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct ServiceA {
    value: String,
}

#[derive(Debug)]
struct Slot(usize);

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn lifetime() -> impl Strategy<Value = Lifetime> {
    prop_oneof![
        Just(Lifetime::Singleton),
        Just(Lifetime::Scoped),
        Just(Lifetime::Transient),
    ]
}

proptest! {
    #[test]
    fn singleton_resolution_consistency(service_value in "\\PC{0,50}") {
        let mut services = ServiceCollection::new();
        let value = service_value.clone();
        services.add_singleton_factory(move |_| Ok(ServiceA { value: value.clone() }));
        let provider = services.build().unwrap();

        let (first, second, from_scope) = block_on(async {
            let scope = provider.create_scope()?;
            DiResult::Ok((
                provider.get_required::<ServiceA>().await?,
                provider.get_required::<ServiceA>().await?,
                scope.get_required::<ServiceA>().await?,
            ))
        }).unwrap();

        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert!(Arc::ptr_eq(&first, &from_scope));
        prop_assert_eq!(&first.value, &service_value);
    }
}

proptest! {
    #[test]
    fn optional_resolution_matches_registration(register_service in any::<bool>()) {
        let mut services = ServiceCollection::new();
        if register_service {
            services.add_instance(ServiceA { value: "registered".into() });
        }
        let provider = services.build().unwrap();

        let (optional, required) = block_on(async {
            (
                provider.get::<ServiceA>().await.unwrap(),
                provider.get_required::<ServiceA>().await,
            )
        });

        prop_assert_eq!(optional.is_some(), register_service);
        prop_assert_eq!(required.is_ok(), register_service);
        prop_assert_eq!(provider.is_service::<ServiceA>(), register_service);
    }
}

proptest! {
    #[test]
    fn constructions_follow_lifetime(
        lifetime in lifetime(),
        scope_count in 1usize..5,
        resolutions in 1usize..8,
    ) {
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = constructions.clone();

        let mut services = ServiceCollection::new();
        services.add(ServiceDescriptor::factory(lifetime, move |_| {
            Ok(Slot(counter.fetch_add(1, Ordering::SeqCst)))
        }));
        let provider = services.build().unwrap();

        block_on(async {
            for _ in 0..scope_count {
                let scope = provider.create_scope()?;
                for _ in 0..resolutions {
                    scope.get_required::<Slot>().await?;
                }
            }
            DiResult::Ok(())
        }).unwrap();

        let expected = match lifetime {
            Lifetime::Singleton => 1,
            Lifetime::Scoped => scope_count,
            Lifetime::Transient => scope_count * resolutions,
        };
        prop_assert_eq!(constructions.load(Ordering::SeqCst), expected);
    }
}

proptest! {
    #[test]
    fn enumeration_preserves_registration_order(
        lifetimes in proptest::collection::vec(lifetime(), 1..8),
    ) {
        let mut services = ServiceCollection::new();
        for (index, lifetime) in lifetimes.iter().enumerate() {
            services.add(ServiceDescriptor::factory(*lifetime, move |_| Ok(Slot(index))));
        }
        let provider = services.build().unwrap();

        let (all, last) = block_on(async {
            let scope = provider.create_scope()?;
            DiResult::Ok((
                scope.get_all::<Slot>().await?,
                scope.get_required::<Slot>().await?,
            ))
        }).unwrap();

        prop_assert_eq!(all.len(), lifetimes.len());
        for (index, slot) in all.iter().enumerate() {
            prop_assert_eq!(slot.0, index);
        }
        prop_assert_eq!(last.0, lifetimes.len() - 1);
    }
}

proptest! {
    #[test]
    fn nested_overrides_unwind_to_registration(depth in 1usize..6) {
        let mut services = ServiceCollection::new();
        services.add_instance(Slot(usize::MAX));
        let provider = services.build().unwrap();

        let mut guards = Vec::new();
        for level in 0..depth {
            guards.push(provider.override_service(Arc::new(Slot(level))).unwrap());
            let seen = block_on(provider.get_required::<Slot>()).unwrap();
            prop_assert_eq!(seen.0, level);
        }

        while let Some(guard) = guards.pop() {
            drop(guard);
            let seen = block_on(provider.get_required::<Slot>()).unwrap();
            let expected = guards.len().checked_sub(1).unwrap_or(usize::MAX);
            prop_assert_eq!(seen.0, expected);
        }
    }
}
