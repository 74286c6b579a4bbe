//! Multi-producer / multi-consumer behavior of the dedup queue.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ingest::{AddOutcome, DedupQueue};

const PRODUCERS: usize = 8;
const PER_PRODUCER: usize = 250;

#[test]
fn concurrent_adds_of_distinct_keys_are_never_lost() {
    let queue: Arc<DedupQueue<(usize, usize), usize>> = Arc::new(DedupQueue::new());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    assert_eq!(queue.add((producer, seq), seq), Ok(AddOutcome::Queued));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(queue.len(), PRODUCERS * PER_PRODUCER);

    let mut seen = HashSet::new();
    let mut next_seq = vec![0; PRODUCERS];
    while let Some(((producer, seq), value)) = queue.try_remove_next().unwrap() {
        assert!(seen.insert((producer, seq)), "key returned twice");
        assert_eq!(value, seq);
        // Each producer's keys come out in the order that producer added them.
        assert_eq!(seq, next_seq[producer]);
        next_seq[producer] += 1;
    }
    assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
}

#[tokio::test]
async fn blocking_removal_returns_each_concurrent_add_exactly_once() {
    let queue: Arc<DedupQueue<(usize, usize), usize>> = Arc::new(DedupQueue::new());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    queue.add((producer, seq), seq).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..PRODUCERS * PER_PRODUCER {
        let (key, value) = queue.remove_next().await.unwrap();
        assert_eq!(value, key.1);
        assert!(seen.insert(key), "key returned twice");
    }
    assert_eq!(seen.len(), PRODUCERS * PER_PRODUCER);
    assert!(queue.is_empty());
}

#[test]
fn concurrent_updates_to_one_key_coalesce_into_a_single_slot() {
    let queue: Arc<DedupQueue<&'static str, usize>> = Arc::new(DedupQueue::new());

    let handles: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    queue.add("hot", producer * PER_PRODUCER + seq).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(queue.len(), 1);
    let (key, _) = queue.try_remove_next().unwrap().unwrap();
    assert_eq!(key, "hot");
    assert!(queue.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn consumers_each_receive_distinct_entries() {
    const TOTAL: usize = 1_000;
    let queue: Arc<DedupQueue<usize, usize>> = Arc::new(DedupQueue::new());

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                let mut got = Vec::new();
                while let Some((key, _)) = queue
                    .remove_next_timeout(Duration::from_millis(500))
                    .await
                    .unwrap()
                {
                    got.push(key);
                }
                got
            })
        })
        .collect();

    for key in 0..TOTAL {
        queue.add(key, key).unwrap();
        if key % 100 == 0 {
            tokio::task::yield_now().await;
        }
    }

    let mut all = Vec::new();
    for consumer in consumers {
        all.extend(consumer.await.unwrap());
    }
    all.sort_unstable();
    assert_eq!(all, (0..TOTAL).collect::<Vec<_>>());
}
