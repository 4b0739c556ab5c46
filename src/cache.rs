//! Resolution cache: normalized document URI to decoded document.
//!
//! Entries are immutable once stored and shared through `Arc`, so a shallow
//! clone is an isolated overlay that still reuses everything already decoded.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use serde_json::Value;

#[derive(Debug, Default)]
pub struct ResolutionCache {
    store: RwLock<HashMap<String, Arc<Value>>>,
}

static BASE_CACHE: OnceLock<ResolutionCache> = OnceLock::new();

/// Process-wide base cache. Created empty on first use.
pub fn base_cache() -> &'static ResolutionCache {
    BASE_CACHE.get_or_init(ResolutionCache::new)
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached document.
    pub fn get(&self, uri: &str) -> Option<Arc<Value>> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.get(uri).cloned()
    }

    /// Cache a document under `uri`.
    pub fn set(&self, uri: impl Into<String>, value: impl Into<Arc<Value>>) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.insert(uri.into(), value.into());
    }

    /// Cache a document under `uri` unless that key is already taken.
    /// Returns whether the value was stored.
    pub fn set_if_absent(&self, uri: impl Into<String>, value: impl Into<Arc<Value>>) -> bool {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        match store.entry(uri.into()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
        }
    }

    /// Copy the index into a new cache; entries are shared, not duplicated.
    pub fn shallow_clone(&self) -> Self {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        Self {
            store: RwLock::new(store.clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Working cache for one composition: an overlay of `cache`, or of the
/// process-wide base cache when none is supplied.
pub(crate) fn cache_or_default(cache: Option<&ResolutionCache>) -> ResolutionCache {
    match cache {
        Some(cache) => cache.shallow_clone(),
        None => base_cache().shallow_clone(),
    }
}
