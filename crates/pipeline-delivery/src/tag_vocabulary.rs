use std::collections::HashMap;

use pipeline_types::DocumentKind;
use serde::Deserialize;

/// Static `DocumentKind` → target tag-name table. External and loaded once
/// at worker start, the same way [`pipeline_correspondent::KnownMappings`]
/// and the kind-classifier's rule table are; a global restart is the cost
/// of changing it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagVocabulary {
    #[serde(flatten)]
    entries: HashMap<String, Vec<String>>,
}

impl TagVocabulary {
    pub fn load_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Tag names to attach for a kind: the configured list if one exists,
    /// otherwise a single tag named after the kind itself.
    #[must_use]
    pub fn tags_for(&self, kind: DocumentKind) -> Vec<String> {
        self.entries.get(kind.to_string().as_str()).cloned().unwrap_or_else(|| vec![kind.to_string()])
    }
}
