//! Live document model consumed by the sync manager
//!
//! The editor owns its documents; this module only describes what the sync
//! manager needs from them: a full snapshot to seed a mirror, ordered change
//! events to keep it current, and a disposal signal to drop it.

pub mod store;
pub mod text;

use std::sync::Arc;

use lsp_types::Range;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use url::Url;

pub use store::{InMemoryDocument, InMemoryDocumentStore, DEFAULT_MAX_SYNC_CHARS};

/// Canonical string identity used to key mirrors on both sides of the channel.
pub fn resource_key(uri: &Url) -> String {
    uri.as_str().to_owned()
}

/// Full contents of a document at one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub uri: Url,
    pub lines: Vec<String>,
    pub eol: String,
    pub version: i32,
}

impl ModelSnapshot {
    /// Canonical identity of the snapshotted resource.
    pub fn key(&self) -> String {
        resource_key(&self.uri)
    }

    /// Rebuilds the document text from its lines.
    pub fn text(&self) -> String {
        self.lines.join(&self.eol)
    }
}

/// One line-range replacement. Ranges use zero-based lines and character
/// offsets and are interpreted against the text left by the preceding change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelContentChange {
    pub range: Range,
    pub text: String,
}

/// Incremental delta between two consecutive document versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelChangedEvent {
    pub changes: Vec<ModelContentChange>,
    pub eol: String,
    pub version: i32,
}

/// Receivers handed out by [`TextModel::subscribe`].
///
/// Dropping either receiver unsubscribes; the document prunes closed
/// subscribers on its next emission.
#[derive(Debug)]
pub struct DocumentSubscription {
    /// Content changes, in emission order, never coalesced.
    pub changes: mpsc::UnboundedReceiver<ModelChangedEvent>,
    /// Resolves once when the document is disposed. A dropped sender counts as
    /// disposal too.
    pub disposed: oneshot::Receiver<()>,
}

/// A live, mutable document owned by the editor.
pub trait TextModel: Send + Sync {
    fn uri(&self) -> &Url;

    /// Current full contents.
    fn snapshot(&self) -> ModelSnapshot;

    /// Whether the document exceeds the size the editor is willing to mirror.
    fn is_too_large_for_syncing(&self) -> bool;

    /// Subscribes to content changes and disposal.
    fn subscribe(&self) -> DocumentSubscription;
}

/// Resolves resource handles to live documents.
pub trait DocumentSource: Send + Sync {
    /// Returns `None` when the document no longer exists.
    fn get(&self, uri: &Url) -> Option<Arc<dyn TextModel>>;
}
