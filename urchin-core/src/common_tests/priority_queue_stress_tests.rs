//! Common stress tests for `PriorityQueue` implementations.
//!
//! These tests verify concurrent correctness under high contention.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crate::queues::PriorityQueue;

/// Test delete_min racing a stream of inserts: every key is popped exactly
/// once or still present at the end
pub fn test_delete_min_during_inserts<Q>()
where
    Q: PriorityQueue<i32, i32> + Default + Send + Sync + 'static,
{
    let queue = Arc::new(Q::default());
    let num_inserters = 4;
    let num_deleters = 4;
    let keys_per_inserter = 20_000;

    let mut handles = Vec::new();

    for t in 0..num_inserters {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..keys_per_inserter {
                queue.insert(t * keys_per_inserter + i, t);
            }
            Vec::new()
        }));
    }

    let stop = Arc::new(AtomicBool::new(false));
    for _ in 0..num_deleters {
        let queue = Arc::clone(&queue);
        let stop = Arc::clone(&stop);
        handles.push(thread::spawn(move || {
            let mut popped = Vec::new();
            loop {
                match queue.delete_min() {
                    Some(entry) => popped.push(entry),
                    None if stop.load(Ordering::Relaxed) => break,
                    None => thread::yield_now(),
                }
            }
            popped
        }));
    }

    // Inserters finish first; deleters drain whatever is left
    for handle in handles.drain(..num_inserters as usize) {
        handle.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);

    let mut popped: Vec<(i32, i32)> = Vec::new();
    for handle in handles {
        popped.extend(handle.join().unwrap());
    }
    popped.extend(queue.to_vec());

    let total = (num_inserters * keys_per_inserter) as usize;
    assert_eq!(popped.len(), total, "keys lost or popped twice");

    let mut keys: Vec<i32> = popped.iter().map(|&(key, _)| key).collect();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), total, "duplicate pops");
}

/// Test memory ordering between producer and consumer
pub fn test_memory_ordering<Q>()
where
    Q: PriorityQueue<i32, i32> + Default + Send + Sync + 'static,
{
    let queue = Arc::new(Q::default());
    let data = Arc::new(AtomicUsize::new(0));
    let flag = Arc::new(AtomicBool::new(false));

    let queue1 = Arc::clone(&queue);
    let data1 = Arc::clone(&data);
    let flag1 = Arc::clone(&flag);

    let producer = thread::spawn(move || {
        data1.store(42, Ordering::Release);
        queue1.insert(100, 100);
        flag1.store(true, Ordering::Release);
    });

    let consumer = thread::spawn(move || {
        while !flag.load(Ordering::Acquire) {
            thread::yield_now();
        }
        assert_eq!(queue.delete_min(), Some((100, 100)));
        assert_eq!(data.load(Ordering::Acquire), 42);
    });

    producer.join().unwrap();
    consumer.join().unwrap();
}

/// Test many threads racing for the same minimum - exactly one wins each entry
pub fn test_concurrent_claim_same_min<Q>()
where
    Q: PriorityQueue<i32, i32> + Default + Send + Sync + 'static,
{
    let queue = Arc::new(Q::default());
    let num_threads = 32;

    queue.insert(42, 42);

    let success_count = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let success = Arc::clone(&success_count);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                if queue.delete_min().is_some() {
                    success.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        success_count.load(Ordering::Relaxed),
        1,
        "exactly one thread should claim the single entry"
    );
    assert!(queue.is_empty());
}

/// Test lock-freedom: every thread completes a fixed op count in bounded time
pub fn test_progress_guarantee<Q>()
where
    Q: PriorityQueue<i32, i32> + Default + Send + Sync + 'static,
{
    let queue = Arc::new(Q::default());
    let num_threads = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);

    let progress_counters: Vec<_> = (0..num_threads)
        .map(|_| Arc::new(AtomicUsize::new(0)))
        .collect();

    let stop = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let queue = Arc::clone(&queue);
            let counter = Arc::clone(&progress_counters[t]);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut i = 0i32;
                while !stop.load(Ordering::Relaxed) {
                    let key = (t as i32) * 1_000_000 + i;

                    queue.insert(key, i);
                    counter.fetch_add(1, Ordering::Relaxed);

                    if queue.delete_min().is_some() {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }

                    i += 1;
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_secs(2));
    stop.store(true, Ordering::Relaxed);

    for handle in handles {
        handle.join().unwrap();
    }

    let max_progress = progress_counters
        .iter()
        .map(|c| c.load(Ordering::Relaxed))
        .max()
        .unwrap();

    assert!(
        max_progress > 500,
        "no thread made sufficient progress (max: {})",
        max_progress
    );

    let threads_with_progress = progress_counters
        .iter()
        .filter(|c| c.load(Ordering::Relaxed) > 0)
        .count();

    assert!(
        threads_with_progress > num_threads / 2,
        "too few threads made progress: {}/{}",
        threads_with_progress,
        num_threads
    );
}

/// Test extreme contention on a single key: duplicate overwrites racing
/// delete_min must never leave two live entries for the key
pub fn test_extreme_contention_single_key<Q>()
where
    Q: PriorityQueue<i32, i32> + Default + Send + Sync + 'static,
{
    let queue = Arc::new(Q::default());
    let num_threads = 16;
    let ops_per_thread = 2_000;
    let the_key = 42;

    let pops = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let queue = Arc::clone(&queue);
            let pops = Arc::clone(&pops);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();

                for i in 0..ops_per_thread {
                    queue.insert(the_key, (t * ops_per_thread + i) as i32);
                    if i % 2 == 1 && queue.delete_min().is_some() {
                        pops.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Every snapshot entry carries the contended key, and at most one entry
    // can be live once the dust settles
    let snapshot = queue.to_vec();
    assert!(snapshot.len() <= 1, "snapshot: {:?}", snapshot);
    for &(key, _) in &snapshot {
        assert_eq!(key, the_key);
    }
}

/// Test high contention mixed operations on a small key space
pub fn test_high_contention_mixed<Q>()
where
    Q: PriorityQueue<i32, i32> + Default + Send + Sync + 'static,
{
    let queue = Arc::new(Q::default());
    let num_threads = 16;
    let duration = Duration::from_secs(1);
    let stop = Arc::new(AtomicBool::new(false));
    let ops_count = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..num_threads)
        .map(|t| {
            let queue = Arc::clone(&queue);
            let stop = Arc::clone(&stop);
            let ops = Arc::clone(&ops_count);
            thread::spawn(move || {
                let mut i = 0i32;
                while !stop.load(Ordering::Relaxed) {
                    // Narrow key space keeps every thread on the same nodes
                    let key = (t as i32 + i) % 64;
                    if i % 3 == 0 {
                        queue.delete_min();
                    } else {
                        queue.insert(key, i);
                    }
                    ops.fetch_add(1, Ordering::Relaxed);
                    i += 1;
                }
            })
        })
        .collect();

    thread::sleep(duration);
    stop.store(true, Ordering::Relaxed);

    for handle in handles {
        handle.join().unwrap();
    }

    // The queue must still be structurally sound: sorted, unique keys
    let snapshot = queue.to_vec();
    for window in snapshot.windows(2) {
        assert!(
            window[0].0 < window[1].0,
            "snapshot not sorted: {} then {}",
            window[0].0,
            window[1].0
        );
    }

    println!(
        "High contention mixed: {} ops, {} entries left",
        ops_count.load(Ordering::Relaxed),
        snapshot.len()
    );
}
