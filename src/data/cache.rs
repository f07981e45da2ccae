//! Load Cache Module
//! Content-addressed memo of parsed datasets, invalidated explicitly.

use crate::data::{Dataset, FileFormat, LoadOptions, RawSource};
use std::collections::HashMap;
use tracing::debug;

/// Identity of a parse: what the bytes were and how they were read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub digest: String,
    pub format: FileFormat,
    pub options: LoadOptions,
}

impl CacheKey {
    pub fn new(raw: &RawSource, options: &LoadOptions) -> Self {
        Self {
            digest: raw.digest(),
            format: raw.format,
            options: *options,
        }
    }
}

#[derive(Default)]
pub struct LoadCache {
    entries: HashMap<CacheKey, Dataset>,
}

impl LoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<&Dataset> {
        let hit = self.entries.get(key);
        debug!(digest = %&key.digest[..key.digest.len().min(12)], hit = hit.is_some(), "load cache lookup");
        hit
    }

    pub fn insert(&mut self, key: CacheKey, dataset: Dataset) {
        self.entries.insert(key, dataset);
    }

    /// True when some entry was parsed from bytes with this digest.
    pub fn contains_digest(&self, digest: &str) -> bool {
        self.entries.keys().any(|k| k.digest == digest)
    }

    /// Drop every entry.
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "load cache invalidated");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataLoader;

    fn raw(text: &str) -> RawSource {
        RawSource {
            name: "c.csv".to_string(),
            format: FileFormat::Csv,
            bytes: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn key_depends_on_content_and_parse_options() {
        let a = raw("Date,Sales\n2023-01-01,1\n");
        let b = raw("Date,Sales\n2023-01-01,2\n");
        let opts = LoadOptions::default();
        let semicolon = LoadOptions {
            delimiter: Some(b';'),
            ..opts
        };

        assert_eq!(CacheKey::new(&a, &opts), CacheKey::new(&a.clone(), &opts));
        assert_ne!(CacheKey::new(&a, &opts), CacheKey::new(&b, &opts));
        assert_ne!(CacheKey::new(&a, &opts), CacheKey::new(&a, &semicolon));
    }

    #[test]
    fn invalidate_clears_entries() {
        let source = raw("Date,Sales\n2023-01-01,1\n");
        let opts = LoadOptions::default();
        let key = CacheKey::new(&source, &opts);
        let dataset = DataLoader::parse(&source, &opts).unwrap();

        let mut cache = LoadCache::new();
        cache.insert(key.clone(), dataset);
        assert!(cache.get(&key).is_some());
        assert!(cache.contains_digest(&key.digest));

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.get(&key).is_none());
    }
}
