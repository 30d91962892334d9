//! # Manifest Registry
//!
//! In-memory store of the manifests this process created, indexed by id
//! and, once signed, by access key.
//!
//! Each manifest sits behind its own mutex so lifecycle calls on the same
//! manifest are serialized while the index stays readable. The index lock
//! is never held while a manifest is locked by the registry itself; callers
//! get an [`ManifestEntry`] handle and lock it after the index lock is gone.

use std::collections::HashMap;
use std::sync::Arc;

use mdfe_core::AccessKey;
use mdfe_state::ManifestDocument;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

/// Shared handle to one registered manifest.
pub type ManifestEntry = Arc<Mutex<ManifestDocument>>;

#[derive(Debug, Default)]
struct Index {
    by_id: HashMap<Uuid, ManifestEntry>,
    by_key: HashMap<String, Uuid>,
}

/// Thread-safe, cloneable manifest store.
#[derive(Debug, Clone, Default)]
pub struct ManifestRegistry {
    index: Arc<RwLock<Index>>,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manifest, indexing its key if it already has one.
    pub fn insert(&self, doc: ManifestDocument) -> ManifestEntry {
        let id = doc.id();
        let key = doc.access_key().map(|k| k.as_str().to_string());
        let entry = Arc::new(Mutex::new(doc));
        let mut index = self.index.write();
        index.by_id.insert(id, Arc::clone(&entry));
        if let Some(key) = key {
            index.by_key.insert(key, id);
        }
        entry
    }

    pub fn get(&self, id: &Uuid) -> Option<ManifestEntry> {
        self.index.read().by_id.get(id).cloned()
    }

    /// Manifest that was signed with `key`.
    pub fn find_by_key(&self, key: &AccessKey) -> Option<(Uuid, ManifestEntry)> {
        let index = self.index.read();
        let id = *index.by_key.get(key.as_str())?;
        index.by_id.get(&id).map(|entry| (id, Arc::clone(entry)))
    }

    /// Record the key assigned to manifest `id` at signing.
    pub fn index_key(&self, id: Uuid, key: &AccessKey) {
        self.index.write().by_key.insert(key.as_str().to_string(), id);
    }

    /// Copy of the manifest as it is now.
    pub fn snapshot(&self, id: &Uuid) -> Option<ManifestDocument> {
        self.get(id).map(|entry| entry.lock().clone())
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.index.read().by_id.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.index.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
