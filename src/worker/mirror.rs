//! Worker-side copy of a document.

use ropey::Rope;

use crate::documents::text::apply_change;
use crate::documents::{ModelChangedEvent, ModelSnapshot};

/// Text of one mirrored document, kept current by incremental deltas.
#[derive(Debug)]
pub struct MirrorModel {
    text: Rope,
    eol: String,
    version: i32,
}

impl MirrorModel {
    pub fn from_snapshot(snapshot: &ModelSnapshot) -> Self {
        Self {
            text: Rope::from_str(&snapshot.text()),
            eol: snapshot.eol.clone(),
            version: snapshot.version,
        }
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn eol(&self) -> &str {
        &self.eol
    }

    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// Applies a delta if it is newer than the mirror. Returns whether it was
    /// applied.
    pub fn apply(&mut self, event: &ModelChangedEvent) -> bool {
        if event.version <= self.version {
            return false;
        }
        for change in &event.changes {
            apply_change(&mut self.text, change);
        }
        self.eol.clone_from(&event.eol);
        self.version = event.version;
        true
    }

    /// The leading `max_chars` characters handed to the classifier.
    pub fn text_for_detection(&self, max_chars: usize) -> String {
        let end = self.text.len_chars().min(max_chars);
        self.text.slice(..end).to_string()
    }
}
