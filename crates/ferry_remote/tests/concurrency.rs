//! Concurrent access tests for the connection cache.
//!
//! Many threads asking for the same endpoint at once must all end up holding
//! one shared connection, even though several of them may dial.

use std::sync::{Arc, Barrier};
use std::thread;

use ferry_remote::{Auth, Connection, ConnectionCache, LoopbackConnector};

/// Concurrent connects for one key agree on a single handle.
#[test]
fn concurrent_connects_share_one_connection() {
    let connector = Arc::new(LoopbackConnector::new());
    let cache = Arc::new(ConnectionCache::new(connector.clone()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache.connect(&Auth::new("localhost")).unwrap()
            })
        })
        .collect();

    let connections: Vec<Arc<Connection>> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();

    let first = &connections[0];
    assert!(connections.iter().all(|c| Arc::ptr_eq(first, c)));
    assert_eq!(cache.len(), 1);
    assert!(first.is_active());
    // Losers of the race may have dialed, but only one handle survives.
    assert!(connector.dial_count() >= 1);
}

/// Interleaved close and connect never leave callers disagreeing.
#[test]
fn close_and_connect_interleave_safely() {
    let cache = Arc::new(ConnectionCache::new(Arc::new(LoopbackConnector::new())));
    let original = cache.connect(&Auth::new("localhost")).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..50 {
                    if i % 2 == 0 {
                        cache.close(&Auth::new("localhost"));
                    } else {
                        let conn = cache.connect(&Auth::new("localhost")).unwrap();
                        // The handle may be closed again by a sibling right away,
                        // but it is always the same handle.
                        drop(conn);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let after = cache.connect(&Auth::new("localhost")).unwrap();
    assert!(Arc::ptr_eq(&original, &after));
    assert!(after.is_active());
}

/// Distinct endpoints dialed concurrently get distinct entries.
#[test]
fn concurrent_distinct_hosts() {
    let cache = Arc::new(ConnectionCache::new(Arc::new(LoopbackConnector::new())));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.connect(&Auth::new(format!("host-{i}"))).unwrap())
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    assert_eq!(cache.len(), 4);
}
