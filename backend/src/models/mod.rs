//! Domain models for the Bulkload import pipeline.
//!
//! - [`RawRecord`] - one source row, header to value
//! - [`ParsedMetadata`] - normalized, enriched field map ready for persistence
//! - [`Entry`] - one unit of import work and its status
//! - [`ImporterRun`] - the batch execution context entries belong to
//! - [`TypeHandle`] / [`ObjectHandle`] - resolved object type and persisted object

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::EntryError;

/// A raw source record: header to string (or list of strings), in column order.
pub type RawRecord = Map<String, Value>;

/// Blank: null, whitespace-only strings and empty containers.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

// =============================================================================
// Parsed Metadata
// =============================================================================

/// Ordered field map built from a raw record.
///
/// Values are strings, lists of strings, or nested maps for object groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedMetadata(Map<String, Value>);

impl ParsedMetadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Present and not blank.
    pub fn is_present(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !is_blank(v))
    }

    /// The value itself, or the first element when it is a list.
    pub fn first(&self, key: &str) -> Option<&Value> {
        match self.0.get(key)? {
            Value::Array(items) => items.first(),
            other => Some(other),
        }
    }

    /// All string values of a field, whether stored as a scalar or a list.
    pub fn strings(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ParsedMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

// =============================================================================
// Entry
// =============================================================================

/// Terminal state of an entry's last build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntryStatus {
    #[default]
    Pending,
    Complete,
    Failed,
}

/// Structured detail of a recoverable failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Stable error class, e.g. `ValidationError`.
    pub error_class: String,
    pub error_message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn from_error(err: &EntryError) -> Self {
        Self {
            error_class: err.class_name().to_string(),
            error_message: err.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// One unit of import work derived from one source record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Stable external identifier.
    pub identifier: String,
    /// Source data as read by the parser.
    pub raw_record: RawRecord,
    /// Built by the metadata step of each build.
    pub parsed_metadata: ParsedMetadata,
    pub status: EntryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<ErrorInfo>,
    /// Id of the importer run this entry was last built in.
    pub last_run: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_at: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(identifier: impl Into<String>, raw_record: RawRecord, run: &ImporterRun) -> Self {
        Self {
            identifier: identifier.into(),
            raw_record,
            parsed_metadata: ParsedMetadata::new(),
            status: EntryStatus::Pending,
            last_error: None,
            last_run: run.id,
            status_at: None,
        }
    }

    pub fn mark_complete(&mut self) {
        self.status = EntryStatus::Complete;
        self.last_error = None;
        self.status_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, err: &EntryError) {
        self.status = EntryStatus::Failed;
        self.last_error = Some(ErrorInfo::from_error(err));
        self.status_at = Some(Utc::now());
    }
}

// =============================================================================
// Importer Run
// =============================================================================

/// The batch execution context grouping many entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImporterRun {
    pub id: Uuid,
    pub importer_name: String,
    pub started_at: DateTime<Utc>,
}

impl ImporterRun {
    pub fn start(importer_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            importer_name: importer_name.into(),
            started_at: Utc::now(),
        }
    }
}

// =============================================================================
// Object Types and Handles
// =============================================================================

/// Broad kind of a repository object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Work,
    Collection,
    FileSet,
}

/// A registered, resolvable object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeHandle {
    /// Canonical type name, e.g. `GenericWork`.
    pub name: String,
    pub kind: ObjectKind,
}

impl TypeHandle {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self { name: name.into(), kind }
    }
}

/// A persisted object as returned by a factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectHandle {
    pub id: String,
    pub type_name: String,
    pub kind: ObjectKind,
    pub source_identifier: String,
}

// =============================================================================
// Tests
// =============================================================================
