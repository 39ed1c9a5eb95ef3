use std::collections::HashMap;

/// Ordered multi-map for manifest entries and parsed tag-file pairs.
///
/// Keys keep first-insertion order; values for one key keep append order.
/// Manifests use the file path as key with (by convention) a single digest
/// value; tag files may legitimately repeat a tag name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyValueCollection {
    keys: Vec<String>,
    entries: HashMap<String, Vec<String>>,
}

impl KeyValueCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(values) => values.push(value.into()),
            None => {
                self.entries.insert(key.clone(), vec![value.into()]);
                self.keys.push(key);
            }
        }
    }

    /// Earliest-added value for `key`, if any.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `key` in append order, `None` if the key is absent.
    pub fn all(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in first-insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// All `(key, value)` pairs, keys in insertion order, values in append
    /// order within a key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys().flat_map(move |key| {
            self.entries[key]
                .iter()
                .map(move |value| (key, value.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
