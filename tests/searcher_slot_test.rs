//! Concurrency tests for the searcher snapshot slot: generations close
//! exactly once, never while a lease is outstanding.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;

use shrike::engine::{EngineSearcher, StoredDocument};
use shrike::error::Result;
use shrike::index::SearcherSlot;

/// Searcher that records close calls and any use after close.
#[derive(Debug)]
struct CountingSearcher {
    id: u64,
    closed: AtomicBool,
    closes: Arc<AtomicU64>,
    double_closes: Arc<AtomicU64>,
    reads_after_close: Arc<AtomicU64>,
}

#[derive(Clone, Default)]
struct Violations {
    closes: Arc<AtomicU64>,
    double_closes: Arc<AtomicU64>,
    reads_after_close: Arc<AtomicU64>,
}

impl Violations {
    fn searcher(&self, id: u64) -> Box<CountingSearcher> {
        Box::new(CountingSearcher {
            id,
            closed: AtomicBool::new(false),
            closes: Arc::clone(&self.closes),
            double_closes: Arc::clone(&self.double_closes),
            reads_after_close: Arc::clone(&self.reads_after_close),
        })
    }
}

impl EngineSearcher for CountingSearcher {
    fn doc_count(&self) -> u64 {
        if self.closed.load(Ordering::SeqCst) {
            self.reads_after_close.fetch_add(1, Ordering::SeqCst);
        }
        self.id
    }

    fn find_by_term(&self, _field: &str, _value: &str) -> Result<Vec<StoredDocument>> {
        if self.closed.load(Ordering::SeqCst) {
            self.reads_after_close.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Vec::new())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            self.double_closes.fetch_add(1, Ordering::SeqCst);
        } else {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[test]
fn test_randomized_interleaving_closes_each_generation_exactly_once() {
    const READERS: usize = 8;
    const PUBLISHES: u64 = 200;

    let slot = Arc::new(SearcherSlot::new("stress"));
    let violations = Violations::default();
    let stop = Arc::new(AtomicBool::new(false));

    slot.publish(violations.searcher(0));

    let mut readers = Vec::new();
    for _ in 0..READERS {
        let slot = Arc::clone(&slot);
        let stop = Arc::clone(&stop);
        readers.push(thread::spawn(move || {
            let mut rng = rand::rng();
            while !stop.load(Ordering::SeqCst) {
                let lease = slot.acquire().unwrap();
                assert!(!lease.is_closed());
                let before = lease.doc_count();
                if rng.random_range(0..4) == 0 {
                    thread::sleep(Duration::from_micros(rng.random_range(1..80)));
                }
                // the lease pins its generation for its whole lifetime
                assert_eq!(lease.doc_count(), before);
                assert!(!lease.is_closed());
                drop(lease);
            }
        }));
    }

    {
        let mut rng = rand::rng();
        for id in 1..=PUBLISHES {
            slot.publish(violations.searcher(id));
            if rng.random_range(0..8) == 0 {
                thread::sleep(Duration::from_micros(rng.random_range(1..120)));
            }
        }
    }

    stop.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().unwrap();
    }

    if let Some(wait) = slot.retire() {
        assert!(wait.wait(Duration::from_secs(5)));
    }

    // every published generation, initial one included, closed exactly once
    assert_eq!(violations.closes.load(Ordering::SeqCst), PUBLISHES + 1);
    assert_eq!(violations.double_closes.load(Ordering::SeqCst), 0);
    assert_eq!(violations.reads_after_close.load(Ordering::SeqCst), 0);
}

#[test]
fn test_publish_defers_close_to_the_slowest_reader() {
    let slot = SearcherSlot::new("orders");
    let violations = Violations::default();

    slot.publish(violations.searcher(1));
    let slow = slot.acquire().unwrap();

    let wait = slot.publish(violations.searcher(2)).unwrap();
    assert!(!wait.wait(Duration::from_millis(20)));
    assert_eq!(violations.closes.load(Ordering::SeqCst), 0);

    // readers arriving now land on the fresh generation
    let fresh = slot.acquire().unwrap();
    assert_eq!(fresh.doc_count(), 2);
    drop(fresh);
    assert_eq!(violations.closes.load(Ordering::SeqCst), 0);

    drop(slow);
    assert!(wait.wait(Duration::from_secs(1)));
    assert_eq!(violations.closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_retired_slot_rejects_new_acquisitions_while_draining() {
    let slot = Arc::new(SearcherSlot::new("orders"));
    let violations = Violations::default();

    slot.publish(violations.searcher(1));
    let held = slot.acquire().unwrap();

    let wait = slot.retire().unwrap();
    assert!(slot.acquire().is_err());
    assert!(!wait.wait(Duration::from_millis(10)));

    let drainer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        drop(held);
    });

    assert!(wait.wait(Duration::from_secs(1)));
    drainer.join().unwrap();
    assert_eq!(violations.closes.load(Ordering::SeqCst), 1);
    assert_eq!(violations.double_closes.load(Ordering::SeqCst), 0);
}
