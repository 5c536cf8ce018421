//! Object factory: the persistence seam of the import pipeline.
//!
//! The orchestrator hands parsed metadata to an [`ObjectFactory`] and gets a
//! handle back. How objects are written is the factory's business; see
//! [`crate::store::JsonObjectStore`] for the on-disk implementation and
//! [`InMemoryFactory`] for tests and dry runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{FactoryError, FactoryResult};
use crate::models::{ObjectHandle, ObjectKind, ParsedMetadata, TypeHandle};

/// File handling flags passed through to the factory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOptions {
    pub replace_files: bool,
    pub update_files: bool,
}

/// Everything a factory needs to persist one entry.
#[derive(Debug, Clone)]
pub struct FactoryRequest<'a> {
    pub attributes: &'a ParsedMetadata,
    pub source_identifier_value: &'a str,
    /// Metadata key holding the source identifier.
    pub work_identifier: &'a str,
    /// `None` when resolution failed.
    pub type_handle: Option<TypeHandle>,
    pub user: Option<&'a str>,
    pub file_options: FileOptions,
}

impl FactoryRequest<'_> {
    /// The resolved type, or `UnresolvedType`.
    pub fn require_type(&self) -> FactoryResult<&TypeHandle> {
        self.type_handle
            .as_ref()
            .ok_or_else(|| FactoryError::UnresolvedType(self.source_identifier_value.to_string()))
    }
}

/// Persists parsed metadata as repository objects.
pub trait ObjectFactory: Send + Sync {
    /// Create or update the object for a source identifier.
    ///
    /// Fails with [`FactoryError::IndexCommunication`] when the search index is
    /// unreachable.
    fn persist(&self, request: FactoryRequest<'_>) -> FactoryResult<ObjectHandle>;

    /// Look up an already persisted object.
    fn find(&self, source_identifier: &str) -> Option<ObjectHandle>;
}

/// A persisted object with its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub id: String,
    pub type_name: String,
    pub kind: ObjectKind,
    pub source_identifier: String,
    /// Attribute holding the source identifier.
    #[serde(default)]
    pub work_identifier: String,
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depositor: Option<String>,
    pub file_options: FileOptions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredObject {
    /// Build a new object, or update `existing` in place of it.
    pub fn from_request(request: &FactoryRequest<'_>, existing: Option<&StoredObject>) -> FactoryResult<Self> {
        let handle = request.require_type()?;
        let now = Utc::now();
        Ok(Self {
            id: existing
                .map(|o| o.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            type_name: handle.name.clone(),
            kind: handle.kind,
            source_identifier: request.source_identifier_value.to_string(),
            work_identifier: request.work_identifier.to_string(),
            attributes: request.attributes.as_map().clone(),
            depositor: request.user.map(String::from),
            file_options: request.file_options,
            created_at: existing.map(|o| o.created_at).unwrap_or(now),
            updated_at: now,
        })
    }

    pub fn handle(&self) -> ObjectHandle {
        ObjectHandle {
            id: self.id.clone(),
            type_name: self.type_name.clone(),
            kind: self.kind,
            source_identifier: self.source_identifier.clone(),
        }
    }
}

/// Factory keeping objects in memory.
#[derive(Debug, Default)]
pub struct InMemoryFactory {
    objects: Mutex<Vec<StoredObject>>,
}

impl InMemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredObject>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ObjectFactory for InMemoryFactory {
    fn persist(&self, request: FactoryRequest<'_>) -> FactoryResult<ObjectHandle> {
        let mut objects = self.lock();
        let position = objects
            .iter()
            .position(|o| o.source_identifier == request.source_identifier_value);

        let object = StoredObject::from_request(&request, position.map(|i| &objects[i]))?;
        let handle = object.handle();
        match position {
            Some(i) => objects[i] = object,
            None => objects.push(object),
        }
        Ok(handle)
    }

    fn find(&self, source_identifier: &str) -> Option<ObjectHandle> {
        self.lock()
            .iter()
            .find(|o| o.source_identifier == source_identifier)
            .map(StoredObject::handle)
    }
}
