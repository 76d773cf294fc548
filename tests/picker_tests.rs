//! # Picker Concurrency Tests
//!
//! Exercises one shared picker from many threads and tasks at once, including
//! rebuilds published while calls are in flight.

use consul_traffic::load_balancing::attach_traffic_tags;
use consul_traffic::{Address, PriorityPickerBuilder, SharedPicker, TrafficError};
use std::collections::HashMap;
use std::sync::Arc;
use tonic::metadata::MetadataMap;

fn ready(n: usize) -> Vec<(usize, Address)> {
    (0..n)
        .map(|i| {
            let tags = if i % 2 == 0 { vec!["even"] } else { vec!["odd"] };
            (i, Address::new(format!("10.0.0.{}:80", i)).with_tags(tags))
        })
        .collect()
}

#[test]
fn test_concurrent_round_robin_is_fair() {
    let picker = Arc::new(PriorityPickerBuilder::new().build(ready(4)));
    let threads = 8;
    let picks_per_thread = 1000;

    let counts: Vec<HashMap<usize, usize>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let picker = picker.clone();
                scope.spawn(move || {
                    let mut counts = HashMap::new();
                    let metadata = MetadataMap::new();
                    for _ in 0..picks_per_thread {
                        *counts.entry(picker.pick(&metadata).unwrap()).or_insert(0) += 1;
                    }
                    counts
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let mut total: HashMap<usize, usize> = HashMap::new();
    for c in counts {
        for (conn, n) in c {
            *total.entry(conn).or_insert(0) += n;
        }
    }

    // Every pick advances the shared cursor exactly once
    assert_eq!(total.len(), 4);
    for n in total.values() {
        assert_eq!(*n, threads * picks_per_thread / 4);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_picks_during_rebuilds_always_see_whole_snapshots() {
    let shared = Arc::new(SharedPicker::new(PriorityPickerBuilder::new().build(ready(2))));

    let mut metadata = MetadataMap::new();
    attach_traffic_tags(&mut metadata, &["odd"]).unwrap();
    let metadata = Arc::new(metadata);

    let callers: Vec<_> = (0..16)
        .map(|_| {
            let shared = shared.clone();
            let metadata = metadata.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let snapshot = shared.current();
                    let conn = snapshot.pick(&metadata).unwrap();
                    // The odd-tagged connection with the lowest index wins
                    assert_eq!(conn, 1);
                    assert!(conn < snapshot.len());
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for size in 2..50 {
        shared.publish(PriorityPickerBuilder::new().build(ready(size)));
        tokio::task::yield_now().await;
    }

    for result in futures::future::join_all(callers).await {
        result.unwrap();
    }
}

#[test]
fn test_empty_ready_set_reports_no_connection() {
    let shared: SharedPicker<usize> = SharedPicker::empty();
    let mut metadata = MetadataMap::new();
    attach_traffic_tags(&mut metadata, &["odd"]).unwrap();

    assert_eq!(shared.pick(&metadata), Err(TrafficError::NoConnectionAvailable));
    assert_eq!(shared.pick(&MetadataMap::new()), Err(TrafficError::NoConnectionAvailable));
}
