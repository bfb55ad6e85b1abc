use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use image::DynamicImage;
use indexmap::IndexMap;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::models::AnalysisResult;

/// Content hash of an (image, configuration) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(image: &DynamicImage, config: &AnalysisConfig) -> Self {
        let mut hasher = DefaultHasher::new();
        image.width().hash(&mut hasher);
        image.height().hash(&mut hasher);
        format!("{:?}", image.color()).hash(&mut hasher);
        image.as_bytes().hash(&mut hasher);
        // the Debug form covers every field, floats included
        format!("{:?}", config).hash(&mut hasher);
        CacheKey(hasher.finish())
    }
}

/// Caller-owned cache of analysis results with least-recently-used eviction.
#[derive(Debug)]
pub struct AnalysisCache {
    capacity: usize,
    entries: IndexMap<CacheKey, Arc<AnalysisResult>>,
    hits: u64,
    misses: u64,
}

impl AnalysisCache {
    /// A cache holding at most `capacity` results (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: IndexMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a result and mark it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<AnalysisResult>> {
        match self.entries.shift_remove(key) {
            Some(result) => {
                self.hits += 1;
                self.entries.insert(*key, Arc::clone(&result));
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Store a result, evicting the least recently used entry when full.
    pub fn insert(&mut self, key: CacheKey, result: Arc<AnalysisResult>) {
        self.entries.shift_remove(&key);
        while self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                debug!("Evicting cached analysis {:?}", evicted);
            }
        }
        self.entries.insert(key, result);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
