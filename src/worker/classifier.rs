//! Classifier interface used inside the worker
//!
//! The worker treats classification as a black box: text in, guesses with
//! confidences out. [`KeywordClassifier`] is a small heuristic implementation
//! so the crate works without an external model.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::host::WorkerHost;
use crate::backend::LanguageGuess;

/// Trait for text classifiers run by the worker
///
/// Implementations must be `Send + Sync`: `classify` is called from
/// `spawn_blocking` and should be CPU-bound.
pub trait LanguageClassifier: Send + Sync {
    /// Returns guesses in any order; the worker ranks and filters them.
    fn classify(&self, text: &str) -> anyhow::Result<Vec<LanguageGuess>>;
}

/// Builds a classifier from the host's asset locations on first use.
pub trait ClassifierLoader: Send + Sync {
    fn load(&self, host: &WorkerHost) -> anyhow::Result<Arc<dyn LanguageClassifier>>;
}

impl<F> ClassifierLoader for F
where
    F: Fn(&WorkerHost) -> anyhow::Result<Arc<dyn LanguageClassifier>> + Send + Sync,
{
    fn load(&self, host: &WorkerHost) -> anyhow::Result<Arc<dyn LanguageClassifier>> {
        self(host)
    }
}

struct LanguageProfile {
    label: &'static str,
    keywords: &'static [&'static str],
}

const PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        label: "py",
        keywords: &["def", "elif", "import", "self", "None", "lambda", "pass", "print", "True", "False"],
    },
    LanguageProfile {
        label: "rs",
        keywords: &["fn", "let", "mut", "impl", "pub", "struct", "enum", "match", "use", "crate"],
    },
    LanguageProfile {
        label: "js",
        keywords: &["function", "var", "const", "let", "require", "undefined", "console", "this", "prototype"],
    },
    LanguageProfile {
        label: "ts",
        keywords: &["interface", "type", "readonly", "export", "implements", "namespace", "number", "string", "const"],
    },
    LanguageProfile {
        label: "go",
        keywords: &["func", "package", "chan", "defer", "go", "goroutine", "fmt", "struct", "nil"],
    },
    LanguageProfile {
        label: "java",
        keywords: &["public", "class", "static", "void", "extends", "final", "private", "new", "throws"],
    },
    LanguageProfile {
        label: "c",
        keywords: &["#include", "int", "char", "void", "malloc", "printf", "sizeof", "unsigned", "typedef"],
    },
    LanguageProfile {
        label: "sh",
        keywords: &["echo", "fi", "then", "esac", "done", "export", "#!/bin/bash", "#!/bin/sh"],
    },
];

/// Keyword hit-ratio classifier
///
/// Each language's confidence is its share of all keyword hits in the text.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    index: HashMap<&'static str, Vec<&'static str>>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordClassifier {
    pub fn new() -> Self {
        let mut index: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for profile in PROFILES {
            for keyword in profile.keywords {
                index.entry(*keyword).or_default().push(profile.label);
            }
        }
        Self { index }
    }

    /// Loader that ignores the asset locations.
    pub fn loader() -> impl ClassifierLoader {
        |host: &WorkerHost| -> anyhow::Result<Arc<dyn LanguageClassifier>> {
            debug!("Loading keyword classifier for worker '{}'", host.label());
            Ok(Arc::new(KeywordClassifier::new()))
        }
    }
}

impl LanguageClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> anyhow::Result<Vec<LanguageGuess>> {
        let mut hits: HashMap<&'static str, usize> = HashMap::new();
        let mut total = 0usize;

        let tokens = text.split(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '#' | '!' | '/')));
        for token in tokens.filter(|t| !t.is_empty()) {
            if let Some(labels) = self.index.get(token) {
                for label in labels {
                    *hits.entry(*label).or_default() += 1;
                    total += 1;
                }
            }
        }

        if total == 0 {
            return Ok(Vec::new());
        }

        Ok(hits
            .into_iter()
            .map(|(label, count)| LanguageGuess::new(label, count as f32 / total as f32))
            .collect())
    }
}
