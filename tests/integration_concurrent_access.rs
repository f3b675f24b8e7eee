//! Concurrent access integration tests
//!
//! These tests verify that ferrous-ioc behaves correctly under concurrent
//! access: cached lifetimes are constructed exactly once, scopes stay
//! isolated, and compilation happens once per service.

use ferrous_ioc::{
    Arguments, DiError, DiResult, Dependency, Injectable, Lifetime, Resolver, ServiceCollection,
    ServiceDescriptor, ServiceProvider,
};
use futures::future::join_all;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ===== Test Services =====

#[derive(Debug)]
pub struct CounterService {
    count: AtomicU32,
}

impl CounterService {
    pub fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get_count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

struct RequestState {
    _request: u32,
}

struct Pipeline {
    counter: Arc<CounterService>,
    state: Arc<RequestState>,
}

impl Injectable for Pipeline {
    fn dependencies() -> Vec<Dependency> {
        vec![
            Dependency::required::<CounterService>(),
            Dependency::required::<RequestState>(),
        ]
    }

    fn construct(args: &mut Arguments) -> DiResult<Self> {
        Ok(Pipeline {
            counter: args.take()?,
            state: args.take()?,
        })
    }
}

fn slow_counter_provider(constructions: Arc<AtomicU32>) -> ServiceProvider {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_async_factory(move |_| {
        let constructions = constructions.clone();
        async move {
            constructions.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, DiError>(CounterService {
                count: AtomicU32::new(0),
            })
        }
    });
    sc.build().unwrap()
}

/// Counter whose first construction stalls until cancelled; `count` holds the run number.
fn stalling_counter(lifetime: Lifetime, runs: Arc<AtomicU32>) -> ServiceProvider {
    let mut sc = ServiceCollection::new();
    sc.add(ServiceDescriptor::async_factory(lifetime, move |_| {
        let runs = runs.clone();
        async move {
            let run = runs.fetch_add(1, Ordering::SeqCst) + 1;
            if run == 1 {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            Ok::<_, DiError>(CounterService {
                count: AtomicU32::new(run),
            })
        }
    }));
    sc.build().unwrap()
}

// ===== Tests =====

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_singleton_constructed_once_under_contention() {
    let constructions = Arc::new(AtomicU32::new(0));
    let sp = slow_counter_provider(constructions.clone());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let sp = sp.clone();
            tokio::spawn(async move { sp.get_required::<CounterService>().await.unwrap() })
        })
        .collect();

    let instances: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|handle| handle.unwrap())
        .collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    for instance in &instances[1..] {
        assert!(Arc::ptr_eq(&instances[0], instance));
    }

    for instance in &instances {
        instance.increment();
    }
    assert_eq!(instances[0].get_count(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_singleton_from_many_scopes_concurrently() {
    let constructions = Arc::new(AtomicU32::new(0));
    let sp = slow_counter_provider(constructions.clone());

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let scope = sp.create_scope().unwrap();
            tokio::spawn(async move { scope.get_required::<CounterService>().await.unwrap() })
        })
        .collect();

    let instances: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|handle| handle.unwrap())
        .collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(instances.iter().all(|instance| Arc::ptr_eq(instance, &instances[0])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scoped_service_isolation() {
    let constructions = Arc::new(AtomicU32::new(0));
    let next_request = Arc::new(AtomicU32::new(0));
    let counter = constructions.clone();

    let mut sc = ServiceCollection::new();
    sc.add_scoped_async_factory(move |_| {
        let counter = counter.clone();
        let next_request = next_request.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, DiError>(RequestState {
                _request: next_request.fetch_add(1, Ordering::SeqCst),
            })
        }
    });
    let sp = sc.build().unwrap();

    let scopes: Vec<_> = (0..4).map(|_| sp.create_scope().unwrap()).collect();

    let mut handles = Vec::new();
    for scope in &scopes {
        for _ in 0..5 {
            let scope = scope.clone();
            handles.push(tokio::spawn(async move {
                scope.get_required::<RequestState>().await.unwrap()
            }));
        }
    }

    let instances: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|handle| handle.unwrap())
        .collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 4);
    for chunk in instances.chunks(5) {
        assert!(chunk.iter().all(|instance| Arc::ptr_eq(instance, &chunk[0])));
    }
    assert!(!Arc::ptr_eq(&instances[0], &instances[5]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_lifetime_concurrent_access() {
    let constructions = Arc::new(AtomicU32::new(0));
    let counter = constructions.clone();

    let mut sc = ServiceCollection::new();
    sc.add_singleton_factory(|_| {
        Ok(CounterService {
            count: AtomicU32::new(0),
        })
    });
    sc.add_scoped_factory(move |_| {
        Ok(RequestState {
            _request: counter.fetch_add(1, Ordering::SeqCst),
        })
    });
    sc.add_transient::<Pipeline>();
    let sp = sc.build().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let scope = sp.create_scope().unwrap();
            tokio::spawn(async move {
                let first = scope.get_required::<Pipeline>().await.unwrap();
                let second = scope.get_required::<Pipeline>().await.unwrap();
                assert!(!Arc::ptr_eq(&first, &second));
                assert!(Arc::ptr_eq(&first.state, &second.state));
                first.counter.increment();
                first
            })
        })
        .collect();

    let pipelines: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|handle| handle.unwrap())
        .collect();

    assert_eq!(constructions.load(Ordering::SeqCst), 8);
    assert_eq!(pipelines[0].counter.get_count(), 8);
    assert!(pipelines
        .iter()
        .all(|pipeline| Arc::ptr_eq(&pipeline.counter, &pipelines[0].counter)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_scope_creation_and_teardown() {
    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory(|_| Ok(RequestState { _request: 0 }));
    let sp = sc.build().unwrap();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let sp = sp.clone();
            tokio::spawn(async move {
                let scope = sp.create_scope()?;
                scope.get_required::<RequestState>().await?;
                scope.close_async().await
            })
        })
        .collect();

    for handle in join_all(handles).await {
        handle.unwrap().unwrap();
    }
    assert!(!sp.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_singleton_construction_can_be_retried() {
    let runs = Arc::new(AtomicU32::new(0));
    let sp = stalling_counter(Lifetime::Singleton, runs.clone());

    let cancelled = tokio::time::timeout(Duration::from_millis(50), sp.get_required::<CounterService>()).await;
    assert!(cancelled.is_err());

    let scope = sp.create_scope().unwrap();
    let retried = tokio::time::timeout(Duration::from_secs(5), scope.get_required::<CounterService>())
        .await
        .expect("lock released by the cancelled construction")
        .unwrap();
    assert_eq!(retried.get_count(), 2);
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    let again = sp.get_required::<CounterService>().await.unwrap();
    assert!(Arc::ptr_eq(&retried, &again));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_scoped_construction_can_be_retried() {
    let runs = Arc::new(AtomicU32::new(0));
    let sp = stalling_counter(Lifetime::Scoped, runs.clone());
    let scope = sp.create_scope().unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(50), scope.get_required::<CounterService>()).await;
    assert!(cancelled.is_err());

    let retried = tokio::time::timeout(Duration::from_secs(5), scope.get_required::<CounterService>())
        .await
        .expect("lock released by the cancelled construction")
        .unwrap();
    assert_eq!(retried.get_count(), 2);

    let again = scope.get_required::<CounterService>().await.unwrap();
    assert!(Arc::ptr_eq(&retried, &again));
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    scope.close_async().await.unwrap();
}
