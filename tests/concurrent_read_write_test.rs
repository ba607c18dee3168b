//! Readers acquiring searchers while another thread keeps indexing: every
//! acquisition succeeds immediately and sees one committed state for the
//! whole lease.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;
use tempfile::TempDir;

use shrike::document::Document;
use shrike::index::{IndexRegistry, RegistryConfig};
use shrike::schema::IndexDefinition;

const INITIAL_DOCS: u64 = 50;
const BATCH_SIZE: u64 = 10;

#[test]
fn test_readers_never_block_and_see_committed_counts_only() {
    let dir = TempDir::new().unwrap();
    let mut registry = IndexRegistry::open(RegistryConfig::new(dir.path())).unwrap();
    let handle = registry.open_index(IndexDefinition::new("Orders")).unwrap();

    let initial: Vec<Document> = (0..INITIAL_DOCS)
        .map(|i| order_doc(&format!("orders/{i}")))
        .collect();
    handle.index_documents(&initial).unwrap();

    let stop = Arc::new(AtomicBool::new(false));

    // one writer producing full batches of fresh documents
    let writer = {
        let handle = Arc::clone(&handle);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut next_id = INITIAL_DOCS;
            let mut batches = 0u64;
            while !stop.load(Ordering::SeqCst) {
                let docs: Vec<Document> = (0..BATCH_SIZE)
                    .map(|i| order_doc(&format!("orders/{}", next_id + i)))
                    .collect();
                handle.index_documents(&docs).unwrap();
                next_id += BATCH_SIZE;
                batches += 1;
            }
            batches
        })
    };

    // readers performing 100 acquisitions each while the writer runs
    let mut readers = Vec::new();
    for _ in 0..4 {
        let handle = Arc::clone(&handle);
        readers.push(thread::spawn(move || {
            let mut rng = rand::rng();
            for _ in 0..100 {
                let lease = handle.searcher().unwrap();
                let count = lease.doc_count();

                // only whole batches are ever visible
                assert!(count >= INITIAL_DOCS);
                assert_eq!(count % BATCH_SIZE, 0, "saw a partially applied batch");

                if rng.random_range(0..3) == 0 {
                    thread::sleep(Duration::from_micros(rng.random_range(1..200)));
                }
                // the count must not drift while the lease is held
                assert_eq!(lease.doc_count(), count);
            }
        }));
    }

    for reader in readers {
        reader.join().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    let batches = writer.join().unwrap();

    let lease = handle.searcher().unwrap();
    assert_eq!(lease.doc_count(), INITIAL_DOCS + batches * BATCH_SIZE);
    drop(lease);

    drop(handle);
    assert!(registry.close().is_clean());
}

fn order_doc(id: &str) -> Document {
    Document::builder(id).add_text("status", "open").build()
}
