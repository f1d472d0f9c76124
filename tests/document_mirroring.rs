//! Property test: whatever edits a document receives, and however they
//! interleave with sync requests, the worker's mirror ends up equal to the
//! document.

mod common;

use std::sync::Arc;

use common::{edit, keyword_worker, uri};
use language_detection_worker::documents::{resource_key, InMemoryDocumentStore, ModelContentChange};
use language_detection_worker::metrics::Metrics;
use language_detection_worker::sync::{ResourceSyncManager, SyncOptions};
use quickcheck::{quickcheck, Arbitrary, Gen};

const ALPHABET: &[char] = &['a', 'b', 'c', ' ', '\n', 'x', 'y', 'z', '1', '\n'];

fn small_text(g: &mut Gen, max_len: usize) -> String {
    let len = usize::arbitrary(g) % (max_len + 1);
    (0..len).map(|_| *g.choose(ALPHABET).unwrap_or(&'a')).collect()
}

#[derive(Debug, Clone)]
struct Edit {
    start: (u32, u32),
    end: (u32, u32),
    text: String,
    /// Request a sync right after this edit.
    sync_after: bool,
}

impl Arbitrary for Edit {
    fn arbitrary(g: &mut Gen) -> Self {
        let position = |g: &mut Gen| (u32::arbitrary(g) % 6, u32::arbitrary(g) % 12);
        let start = position(g);
        let end = if bool::arbitrary(g) { start } else { position(g) };
        Edit {
            start,
            end,
            text: small_text(g, 8),
            sync_after: bool::arbitrary(g),
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    initial: String,
    batches: Vec<Vec<Edit>>,
}

impl Arbitrary for Session {
    fn arbitrary(g: &mut Gen) -> Self {
        let batches = (0..usize::arbitrary(g) % 12)
            .map(|_| (0..1 + usize::arbitrary(g) % 3).map(|_| Edit::arbitrary(g)).collect())
            .collect();
        Session {
            initial: small_text(g, 40),
            batches,
        }
    }
}

fn run_session(session: Session) -> bool {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async move {
        let a = uri("prop.txt");
        let store = Arc::new(InMemoryDocumentStore::new());
        store.open(a.clone(), &session.initial);
        let worker = keyword_worker();
        let manager = ResourceSyncManager::spawn(
            store.clone(),
            Arc::new(worker.clone()),
            SyncOptions::default(),
            Arc::new(Metrics::new()),
        );

        for batch in session.batches {
            let sync_after = batch.iter().any(|e| e.sync_after);
            let changes: Vec<ModelContentChange> = batch.iter().map(|e| edit(e.start, e.end, &e.text)).collect();
            store.apply_edits(&a, changes);
            if sync_after {
                manager.ensure_synced(&[a.clone()]).await.unwrap();
            }
        }
        manager.ensure_synced(&[a.clone()]).await.unwrap();

        let expected = store.document(&a).unwrap().text();
        let mirrored = worker.mirrored_text(&resource_key(&a)).await.unwrap();
        mirrored == Some(expected)
    })
}

quickcheck! {
    fn prop_mirror_matches_document(session: Session) -> bool {
        run_session(session)
    }
}

#[test]
fn test_mirror_matches_after_multi_line_edits() {
    let session = Session {
        initial: "foo\nbar\nbaz".to_string(),
        batches: vec![
            vec![Edit {
                start: (0, 1),
                end: (2, 1),
                text: "X\nY".to_string(),
                sync_after: true,
            }],
            vec![
                Edit {
                    start: (5, 0),
                    end: (5, 0),
                    text: "\ntail".to_string(),
                    sync_after: false,
                },
                Edit {
                    start: (0, 0),
                    end: (0, 0),
                    text: "head ".to_string(),
                    sync_after: false,
                },
            ],
        ],
    };
    assert!(run_session(session));
}
