//! Snapshot handoff between one writer and many readers.
//!
//! The slot holds the currently published searcher generation. Readers
//! acquire leases against it; the writer publishes a fresh generation after
//! every mutation that changed documents. A superseded generation is
//! physically closed exactly once, by whichever side drops the last
//! reference, and never while a lease is outstanding.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::error;
use parking_lot::RwLock;

use crate::engine::EngineSearcher;
use crate::error::{Result, ShrikeError};

/// One published generation of the searchable state.
///
/// The searcher is closed only when `usage == 0` and `marked` is set; the
/// two conditions are re-checked on every release and on marking, so the
/// close happens no matter which order they become true in.
#[derive(Debug)]
struct SearcherGeneration {
    searcher: Box<dyn EngineSearcher>,
    usage: AtomicU32,
    marked: AtomicBool,
    closed: AtomicBool,
    signal: OnceLock<(Sender<()>, Receiver<()>)>,
}

impl SearcherGeneration {
    fn new(searcher: Box<dyn EngineSearcher>) -> Self {
        SearcherGeneration {
            searcher,
            usage: AtomicU32::new(0),
            marked: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            signal: OnceLock::new(),
        }
    }

    fn add_ref(&self) {
        self.usage.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        let previous = self.usage.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "release without a matching add_ref");
        if previous == 1 && self.marked.load(Ordering::SeqCst) {
            self.close_now();
        }
    }

    fn is_marked(&self) -> bool {
        self.marked.load(Ordering::SeqCst)
    }

    /// Request disposal and hand back a completion signal.
    ///
    /// The signal must exist before the flag flips; a release racing with
    /// the marking could otherwise close the searcher with nothing to fire.
    fn mark_with_wait(&self) -> DisposalWait {
        let signal = self.signal.get_or_init(|| bounded(1));
        let wait = DisposalWait {
            receiver: signal.1.clone(),
        };
        self.marked.store(true, Ordering::SeqCst);
        if self.usage.load(Ordering::SeqCst) == 0 {
            self.close_now();
        }
        wait
    }

    /// Close the searcher, exactly once across all racing callers.
    fn close_now(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Err(e) = self.searcher.close() {
                error!("failed to close superseded searcher: {e}");
            }
            if let Some((sender, _)) = self.signal.get() {
                let _ = sender.try_send(());
            }
        }
    }
}

/// A reader's lease on one generation.
///
/// Derefs to the engine searcher. Dropping the lease releases the
/// generation and performs the deferred close if this was the last
/// reference to a superseded generation. Close errors are logged, never
/// surfaced to the dropping reader.
#[derive(Debug)]
pub struct SearcherLease {
    generation: Arc<SearcherGeneration>,
}

impl Deref for SearcherLease {
    type Target = dyn EngineSearcher;

    fn deref(&self) -> &Self::Target {
        self.generation.searcher.as_ref()
    }
}

impl Drop for SearcherLease {
    fn drop(&mut self) {
        self.generation.release();
    }
}

/// Handle to await the physical close of a superseded generation.
#[derive(Debug)]
pub struct DisposalWait {
    receiver: Receiver<()>,
}

impl DisposalWait {
    /// Block until the generation was closed or the timeout elapsed.
    /// Returns `true` if the close completed.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

/// The slot through which searcher generations are published and acquired.
#[derive(Debug)]
pub struct SearcherSlot {
    index_name: String,
    current: RwLock<Option<Arc<SearcherGeneration>>>,
    retired: AtomicBool,
    generation: AtomicU64,
}

impl SearcherSlot {
    /// Create an empty slot for the named index.
    pub fn new<S: Into<String>>(index_name: S) -> Self {
        SearcherSlot {
            index_name: index_name.into(),
            current: RwLock::new(None),
            retired: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Publish a fresh generation, superseding the current one.
    ///
    /// The superseded generation is marked for disposal and closed by its
    /// last reference; the returned handle can await that close. Returns
    /// `None` on the first publish. Publishing against a retired slot
    /// closes the incoming searcher instead of installing it.
    pub fn publish(&self, searcher: Box<dyn EngineSearcher>) -> Option<DisposalWait> {
        let previous = {
            let mut current = self.current.write();
            if self.retired.load(Ordering::SeqCst) {
                drop(current);
                if let Err(e) = searcher.close() {
                    error!(
                        "failed to close searcher published after '{}' was retired: {e}",
                        self.index_name
                    );
                }
                return None;
            }
            let fresh = Arc::new(SearcherGeneration::new(searcher));
            self.generation.fetch_add(1, Ordering::SeqCst);
            current.replace(fresh)
        };

        previous.map(|old| {
            // hold a transient reference so the mark cannot race a reader,
            // then release it; with no readers left this closes right here
            old.add_ref();
            let wait = old.mark_with_wait();
            old.release();
            wait
        })
    }

    /// Acquire a lease on the current generation.
    ///
    /// Retries when the sampled generation was superseded between the
    /// sample and the reference count; fails once the slot is retired.
    pub fn acquire(&self) -> Result<SearcherLease> {
        loop {
            let generation = {
                let current = self.current.read();
                match current.as_ref() {
                    Some(generation) => Arc::clone(generation),
                    None => {
                        return Err(if self.retired.load(Ordering::SeqCst) {
                            ShrikeError::closed(&self.index_name)
                        } else {
                            ShrikeError::index(format!(
                                "no searcher has been published for index '{}'",
                                self.index_name
                            ))
                        });
                    }
                }
            };

            generation.add_ref();
            if generation.is_marked() {
                // superseded under us; back out and sample the fresh one
                generation.release();
                continue;
            }

            let lease = SearcherLease { generation };
            if lease.is_closed() {
                let err = ShrikeError::engine(format!(
                    "acquired searcher for index '{}' is already closed",
                    self.index_name
                ));
                error!("{err}");
                return Err(err);
            }
            return Ok(lease);
        }
    }

    /// Retire the slot: take the current generation out, mark it for
    /// disposal and fail every subsequent acquire.
    pub fn retire(&self) -> Option<DisposalWait> {
        let taken = {
            let mut current = self.current.write();
            self.retired.store(true, Ordering::SeqCst);
            current.take()
        };

        taken.map(|old| {
            old.add_ref();
            let wait = old.mark_with_wait();
            old.release();
            wait
        })
    }

    /// Number of publishes so far. Stays constant across operations that
    /// do not republish, which makes no-op flushes observable.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use super::*;
    use crate::engine::StoredDocument;

    #[derive(Debug)]
    struct StubSearcher {
        closes: Arc<AtomicU32>,
        closed: AtomicBool,
        count: u64,
    }

    impl StubSearcher {
        fn new(closes: &Arc<AtomicU32>, count: u64) -> Box<StubSearcher> {
            Box::new(StubSearcher {
                closes: Arc::clone(closes),
                closed: AtomicBool::new(false),
                count,
            })
        }
    }

    impl EngineSearcher for StubSearcher {
        fn doc_count(&self) -> u64 {
            self.count
        }

        fn find_by_term(&self, _field: &str, _value: &str) -> Result<Vec<StoredDocument>> {
            Ok(Vec::new())
        }

        fn close(&self) -> Result<()> {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.closes.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_acquire_before_first_publish_fails() {
        let slot = SearcherSlot::new("orders");
        let err = slot.acquire().unwrap_err();
        assert!(err.to_string().contains("no searcher has been published"));
    }

    #[test]
    fn test_acquire_reads_published_generation() {
        let closes = Arc::new(AtomicU32::new(0));
        let slot = SearcherSlot::new("orders");

        assert!(slot.publish(StubSearcher::new(&closes, 7)).is_none());
        let lease = slot.acquire().unwrap();
        assert_eq!(lease.doc_count(), 7);
    }

    #[test]
    fn test_superseded_generation_waits_for_last_reader() {
        let closes = Arc::new(AtomicU32::new(0));
        let slot = SearcherSlot::new("orders");

        slot.publish(StubSearcher::new(&closes, 1));
        let lease = slot.acquire().unwrap();

        let wait = slot.publish(StubSearcher::new(&closes, 2)).unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        assert!(!wait.wait(Duration::from_millis(20)));

        drop(lease);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(wait.wait(Duration::from_secs(1)));

        // the fresh generation serves readers untouched
        assert_eq!(slot.acquire().unwrap().doc_count(), 2);
    }

    #[test]
    fn test_publish_with_no_readers_closes_immediately() {
        let closes = Arc::new(AtomicU32::new(0));
        let slot = SearcherSlot::new("orders");

        slot.publish(StubSearcher::new(&closes, 1));
        let wait = slot.publish(StubSearcher::new(&closes, 2)).unwrap();

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(wait.wait(Duration::from_millis(0)));
    }

    #[test]
    fn test_close_happens_exactly_once_with_competing_leases() {
        let closes = Arc::new(AtomicU32::new(0));
        let slot = SearcherSlot::new("orders");

        slot.publish(StubSearcher::new(&closes, 1));
        let first = slot.acquire().unwrap();
        let second = slot.acquire().unwrap();
        slot.publish(StubSearcher::new(&closes, 2));

        drop(first);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
        drop(second);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_retire_closes_current_and_fails_acquires() {
        let closes = Arc::new(AtomicU32::new(0));
        let slot = SearcherSlot::new("orders");

        slot.publish(StubSearcher::new(&closes, 1));
        let wait = slot.retire().unwrap();
        assert!(wait.wait(Duration::from_secs(1)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let err = slot.acquire().unwrap_err();
        assert_eq!(err.to_string(), "Index 'orders' has been closed");
    }

    #[test]
    fn test_retire_without_a_generation_returns_none() {
        let slot = SearcherSlot::new("orders");
        assert!(slot.retire().is_none());
    }

    #[test]
    fn test_publish_after_retire_closes_incoming_searcher() {
        let closes = Arc::new(AtomicU32::new(0));
        let slot = SearcherSlot::new("orders");

        slot.retire();
        assert!(slot.publish(StubSearcher::new(&closes, 1)).is_none());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(slot.acquire().is_err());
    }

    #[test]
    fn test_generation_counts_publishes_only() {
        let closes = Arc::new(AtomicU32::new(0));
        let slot = SearcherSlot::new("orders");
        assert_eq!(slot.generation(), 0);

        slot.publish(StubSearcher::new(&closes, 1));
        assert_eq!(slot.generation(), 1);

        let lease = slot.acquire().unwrap();
        drop(lease);
        assert_eq!(slot.generation(), 1);

        slot.publish(StubSearcher::new(&closes, 2));
        assert_eq!(slot.generation(), 2);
    }
}
