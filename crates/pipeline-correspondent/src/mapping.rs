use std::collections::HashMap;

use serde::Deserialize;

/// `KNOWN_MAPPINGS`: maps selected normalized keys to human-friendly display
/// names. Loaded once at worker start; picking up changes requires a
/// restart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnownMappings {
    #[serde(flatten)]
    entries: HashMap<String, String>,
}

impl KnownMappings {
    #[must_use]
    pub fn from_map(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }

    pub fn load_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Best available display name for a normalized key: the known mapping
    /// if one exists, otherwise a title-cased rendering of the key itself.
    #[must_use]
    pub fn get_best_name(&self, normalized_key: &str) -> String {
        self.entries
            .get(normalized_key)
            .cloned()
            .unwrap_or_else(|| crate::normalize::title_case(normalized_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mapping_wins_over_title_case() {
        let mut entries = HashMap::new();
        entries.insert("aukro".to_string(), "Aukro".to_string());
        let mappings = KnownMappings::from_map(entries);
        assert_eq!(mappings.get_best_name("aukro"), "Aukro");
    }

    #[test]
    fn unmapped_key_falls_back_to_title_case() {
        let mappings = KnownMappings::default();
        assert_eq!(mappings.get_best_name("acme corp"), "Acme Corp");
    }
}
