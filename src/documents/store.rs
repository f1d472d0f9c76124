//! In-memory document store
//!
//! A minimal stand-in for an editor's live document set: documents are held
//! as ropes, edited through ordered range replacements, and every edit batch
//! is fanned out to subscribers as one [`ModelChangedEvent`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use ropey::Rope;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};
use url::Url;

use super::text::{apply_change, detect_eol, lines};
use super::{DocumentSource, DocumentSubscription, ModelChangedEvent, ModelContentChange, ModelSnapshot, TextModel};

/// Documents longer than this (in chars) are not mirrored.
pub const DEFAULT_MAX_SYNC_CHARS: usize = 50 * 1024 * 1024;

#[derive(Debug)]
struct Subscriber {
    changes: mpsc::UnboundedSender<ModelChangedEvent>,
    disposed: oneshot::Sender<()>,
}

#[derive(Debug)]
struct DocumentState {
    text: Rope,
    eol: String,
    version: i32,
    subscribers: Vec<Subscriber>,
    disposed: bool,
}

/// A live document held by [`InMemoryDocumentStore`].
#[derive(Debug)]
pub struct InMemoryDocument {
    uri: Url,
    max_sync_chars: usize,
    state: Mutex<DocumentState>,
}

impl InMemoryDocument {
    fn new(uri: Url, text: &str, max_sync_chars: usize) -> Self {
        Self {
            uri,
            max_sync_chars,
            state: Mutex::new(DocumentState {
                text: Rope::from_str(text),
                eol: detect_eol(text).to_string(),
                version: 1,
                subscribers: Vec::new(),
                disposed: false,
            }),
        }
    }

    /// Returns the current text of the document as a string.
    pub fn text(&self) -> String {
        self.state.lock().text.to_string()
    }

    /// Returns the current version of the document.
    pub fn version(&self) -> i32 {
        self.state.lock().version
    }

    /// Number of live subscribers, pruned lazily on emission.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.state.lock();
        state.subscribers.retain(|s| !s.changes.is_closed());
        state.subscribers.len()
    }

    /// Applies an ordered batch of changes as one new version and notifies
    /// subscribers. Returns `None` once the document is disposed.
    pub fn apply(&self, changes: Vec<ModelContentChange>) -> Option<i32> {
        let mut state = self.state.lock();
        if state.disposed {
            return None;
        }
        for change in &changes {
            apply_change(&mut state.text, change);
        }
        state.version += 1;

        let event = ModelChangedEvent {
            changes,
            eol: state.eol.clone(),
            version: state.version,
        };
        // Emission happens under the state lock so subscribers observe
        // versions in the order they were produced.
        state.subscribers.retain(|s| s.changes.send(event.clone()).is_ok());
        trace!("Applied version {} to {} ({} subscribers)", event.version, self.uri, state.subscribers.len());
        Some(event.version)
    }

    fn dispose(&self) {
        let mut state = self.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        for subscriber in state.subscribers.drain(..) {
            let _ = subscriber.disposed.send(());
        }
        debug!("Disposed document {}", self.uri);
    }
}

impl TextModel for InMemoryDocument {
    fn uri(&self) -> &Url {
        &self.uri
    }

    fn snapshot(&self) -> ModelSnapshot {
        let state = self.state.lock();
        ModelSnapshot {
            uri: self.uri.clone(),
            lines: lines(&state.text),
            eol: state.eol.clone(),
            version: state.version,
        }
    }

    fn is_too_large_for_syncing(&self) -> bool {
        self.state.lock().text.len_chars() > self.max_sync_chars
    }

    fn subscribe(&self) -> DocumentSubscription {
        let (changes_tx, changes) = mpsc::unbounded_channel();
        let (disposed_tx, disposed) = oneshot::channel();
        let mut state = self.state.lock();
        if state.disposed {
            let _ = disposed_tx.send(());
        } else {
            state.subscribers.push(Subscriber {
                changes: changes_tx,
                disposed: disposed_tx,
            });
        }
        DocumentSubscription { changes, disposed }
    }
}

/// The open document set.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<Url, Arc<InMemoryDocument>>>,
    max_sync_chars: usize,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_max_sync_chars(DEFAULT_MAX_SYNC_CHARS)
    }

    /// Creates a store whose documents report too-large above `max_sync_chars`.
    pub fn with_max_sync_chars(max_sync_chars: usize) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            max_sync_chars,
        }
    }

    /// Opens (or reopens) a document. Reopening disposes the previous instance.
    pub fn open(&self, uri: Url, text: &str) -> Arc<InMemoryDocument> {
        let document = Arc::new(InMemoryDocument::new(uri.clone(), text, self.max_sync_chars));
        let previous = self.documents.write().insert(uri, document.clone());
        if let Some(previous) = previous {
            previous.dispose();
        }
        document
    }

    pub fn document(&self, uri: &Url) -> Option<Arc<InMemoryDocument>> {
        self.documents.read().get(uri).cloned()
    }

    /// Applies `changes` to an open document and returns its new version.
    pub fn apply_edits(&self, uri: &Url, changes: Vec<ModelContentChange>) -> Option<i32> {
        self.document(uri)?.apply(changes)
    }

    /// Closes a document, firing its dispose event. Returns whether it was open.
    pub fn close(&self, uri: &Url) -> bool {
        let removed = self.documents.write().remove(uri);
        match removed {
            Some(document) => {
                document.dispose();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl DocumentSource for InMemoryDocumentStore {
    fn get(&self, uri: &Url) -> Option<Arc<dyn TextModel>> {
        self.document(uri).map(|document| document as Arc<dyn TextModel>)
    }
}
