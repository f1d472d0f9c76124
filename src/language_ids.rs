//! Mapping from classifier labels to editor language identifiers.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Resolves a raw model label to an editor language id.
pub trait LanguageIdResolver: Send + Sync {
    /// Returns `None` for labels the editor has no language for.
    fn resolve(&self, label: &str) -> Option<String>;
}

static DEFAULT_LANGUAGE_IDS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("bat", "bat"),
        ("c", "c"),
        ("cpp", "cpp"),
        ("cs", "csharp"),
        ("css", "css"),
        ("go", "go"),
        ("html", "html"),
        ("java", "java"),
        ("js", "javascript"),
        ("json", "json"),
        ("md", "markdown"),
        ("php", "php"),
        ("ps1", "powershell"),
        ("py", "python"),
        ("rb", "ruby"),
        ("rs", "rust"),
        ("sh", "shellscript"),
        ("sql", "sql"),
        ("swift", "swift"),
        ("ts", "typescript"),
        ("xml", "xml"),
        ("yaml", "yaml"),
    ])
});

/// Static lookup table. Labels may be model labels (`py`) or editor ids
/// (`python`); both resolve to the editor id.
#[derive(Debug, Clone)]
pub struct LanguageIdMap {
    ids: HashMap<String, String>,
}

impl Default for LanguageIdMap {
    fn default() -> Self {
        let mut ids = HashMap::new();
        for (label, id) in DEFAULT_LANGUAGE_IDS.iter() {
            ids.insert(label.to_string(), id.to_string());
            ids.insert(id.to_string(), id.to_string());
        }
        Self { ids }
    }
}

impl LanguageIdMap {
    /// Adds or replaces one mapping.
    pub fn with(mut self, label: impl Into<String>, id: impl Into<String>) -> Self {
        self.ids.insert(label.into(), id.into());
        self
    }
}

impl LanguageIdResolver for LanguageIdMap {
    fn resolve(&self, label: &str) -> Option<String> {
        self.ids.get(&label.to_lowercase()).cloned()
    }
}
