use std::collections::HashSet;

/// Configuration for key-path flattening
#[derive(Debug, Clone)]
pub struct FlattenConfig {
    /// String placed between path segments in flattened keys
    pub separator: String,

    /// Top-level keys to drop entirely instead of flattening.
    /// Only consulted at the root; nested keys with the same name still flatten.
    pub root_keys_to_ignore: HashSet<String>,

    /// Replacement for separator occurrences inside raw keys, applied before
    /// concatenation so a key containing the separator cannot be confused
    /// with a deeper path
    pub key_separator_replacement: Option<String>,
}

impl Default for FlattenConfig {
    fn default() -> Self {
        FlattenConfig {
            separator: String::from("_"),
            root_keys_to_ignore: HashSet::new(),
            key_separator_replacement: None,
        }
    }
}

impl FlattenConfig {
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn ignore_root_key(mut self, key: impl Into<String>) -> Self {
        self.root_keys_to_ignore.insert(key.into());
        self
    }

    pub fn with_key_separator_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.key_separator_replacement = Some(replacement.into());
        self
    }
}
