//! JSON object store - an on-disk [`ObjectFactory`]
//!
//! Each persisted object is one JSON document in the store directory.
//! `index.json` maps source identifiers to object ids and plays the part of
//! the search index: failing to update it is reported as
//! [`FactoryError::IndexCommunication`], which halts an import run.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{FactoryError, FactoryResult};
use crate::factory::{FactoryRequest, ObjectFactory, StoredObject};
use crate::logs::log_warning;
use crate::models::ObjectHandle;

/// Directory where objects are stored (relative to current dir)
pub const DEFAULT_STORE_DIR: &str = ".bulkload/objects";

const INDEX_FILE: &str = "index.json";

#[derive(Default)]
struct StoreState {
    /// id -> object
    objects: HashMap<String, StoredObject>,
    /// source identifier -> id
    index: BTreeMap<String, String>,
}

/// Store keeping one JSON file per object
pub struct JsonObjectStore {
    store_dir: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonObjectStore {
    /// Open the default store, loading existing objects
    pub fn new() -> FactoryResult<Self> {
        Self::with_dir(DEFAULT_STORE_DIR)
    }

    /// Open a store in a custom directory
    pub fn with_dir(dir: impl AsRef<Path>) -> FactoryResult<Self> {
        let store_dir = dir.as_ref().to_path_buf();
        let state = Self::load_all(&store_dir)?;
        Ok(Self {
            store_dir,
            state: Mutex::new(state),
        })
    }

    fn load_all(dir: &Path) -> FactoryResult<StoreState> {
        let mut state = StoreState::default();
        if !dir.exists() {
            return Ok(state);
        }

        for entry in fs::read_dir(dir)?.flatten() {
            let path = entry.path();
            let is_object = path.extension().is_some_and(|e| e == "json")
                && path.file_name().is_some_and(|n| n != INDEX_FILE);
            if !is_object {
                continue;
            }
            // Unreadable documents are skipped, not fatal
            if let Ok(content) = fs::read_to_string(&path) {
                if let Ok(object) = serde_json::from_str::<StoredObject>(&content) {
                    state.index.insert(object.source_identifier.clone(), object.id.clone());
                    state.objects.insert(object.id.clone(), object);
                }
            }
        }
        Ok(state)
    }

    pub fn dir(&self) -> &Path {
        &self.store_dir
    }

    /// All objects, oldest first
    pub fn list(&self) -> Vec<StoredObject> {
        let mut objects: Vec<StoredObject> = self.lock().objects.values().cloned().collect();
        objects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        objects
    }

    pub fn get(&self, id: &str) -> Option<StoredObject> {
        self.lock().objects.get(id).cloned()
    }

    pub fn get_by_source(&self, source_identifier: &str) -> Option<StoredObject> {
        let state = self.lock();
        state
            .index
            .get(source_identifier)
            .and_then(|id| state.objects.get(id))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_object(&self, object: &StoredObject) -> FactoryResult<()> {
        fs::create_dir_all(&self.store_dir)?;
        let path = self.store_dir.join(format!("{}.json", object.id));
        fs::write(path, serde_json::to_string_pretty(object)?)?;
        Ok(())
    }

    fn restore_object(&self, object: &StoredObject, previous: Option<&StoredObject>) {
        let restored = match previous {
            Some(previous) => self.write_object(previous),
            None => fs::remove_file(self.store_dir.join(format!("{}.json", object.id))).map_err(FactoryError::from),
        };
        if let Err(e) = restored {
            log_warning(format!("Could not roll back object {}: {}", object.id, e));
        }
    }

    fn write_index(&self, index: &BTreeMap<String, String>) -> FactoryResult<()> {
        let path = self.store_dir.join(INDEX_FILE);
        let content = serde_json::to_string_pretty(index)?;
        fs::write(&path, content).map_err(|e| {
            FactoryError::IndexCommunication(format!("cannot update {}: {}", path.display(), e))
        })
    }
}

impl ObjectFactory for JsonObjectStore {
    fn persist(&self, request: FactoryRequest<'_>) -> FactoryResult<ObjectHandle> {
        let mut state = self.lock();
        let existing = state
            .index
            .get(request.source_identifier_value)
            .and_then(|id| state.objects.get(id));

        let object = StoredObject::from_request(&request, existing)?;
        let previous = existing.cloned();
        self.write_object(&object)?;

        let mut index = state.index.clone();
        index.insert(object.source_identifier.clone(), object.id.clone());
        if let Err(e) = self.write_index(&index) {
            // Keep the disk in step with the index: undo the document write
            self.restore_object(&object, previous.as_ref());
            return Err(e);
        }

        let handle = object.handle();
        state.index = index;
        state.objects.insert(object.id.clone(), object);
        Ok(handle)
    }

    fn find(&self, source_identifier: &str) -> Option<ObjectHandle> {
        self.get_by_source(source_identifier).map(|o| o.handle())
    }
}
