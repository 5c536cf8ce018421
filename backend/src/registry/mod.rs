//! Object type registry and factory type resolution.
//!
//! Type names found in metadata are normalized to canonical casing
//! (`fake_work` → `FakeWork`) and looked up in an explicit registry built at
//! startup. Resolution has two distinct failure paths:
//!
//! - the name is well-formed but unknown → no type (`None`)
//! - the name cannot be obtained at all → the configured default type

use std::collections::HashMap;
use thiserror::Error;

use crate::config::{FieldMapping, ImporterConfig};
use crate::logs::log_warning;
use crate::models::{ObjectKind, ParsedMetadata, TypeHandle};

pub const MODEL_FIELD: &str = "model";
pub const WORK_TYPE_FIELD: &str = "work_type";

/// Why a type could not be resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Well-formed lookup of an unregistered (or invalid) type name.
    #[error("Unknown object type '{0}'")]
    NotFound(String),

    /// No usable type name could be read.
    #[error("Malformed type lookup: {0}")]
    Malformed(String),
}

/// Registry of known object types, keyed by canonical name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeHandle>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Work`, `Collection` and `FileSet`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("Work", ObjectKind::Work);
        registry.register("Collection", ObjectKind::Collection);
        registry.register("FileSet", ObjectKind::FileSet);
        registry
    }

    /// Defaults plus the config's `work_types`, registered as works.
    pub fn from_config(config: &ImporterConfig) -> Self {
        let mut registry = Self::with_defaults();
        for raw in &config.work_types {
            let registered = canonical_type_name(raw)
                .map(|name| registry.register(&name, ObjectKind::Work))
                .unwrap_or(false);
            if !registered {
                log_warning(format!("Skipping invalid work type '{}'", raw));
            }
        }
        registry
    }

    /// Register a canonical type name. Returns false for invalid names.
    pub fn register(&mut self, name: &str, kind: ObjectKind) -> bool {
        if !is_valid_type_name(name) {
            return false;
        }
        self.types.insert(name.to_string(), TypeHandle::new(name, kind));
        true
    }

    pub fn lookup(&self, name: &str) -> Result<TypeHandle, ResolveError> {
        if !is_valid_type_name(name) {
            return Err(ResolveError::NotFound(name.to_string()));
        }
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Leading ASCII uppercase letter, then ASCII alphanumerics.
pub fn is_valid_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric()),
        _ => false,
    }
}

/// Normalize a raw type name to canonical casing.
///
/// Spaces become underscores; a name containing `-` or `_` is lowercased
/// first; then each `_`-separated segment is capitalized and joined.
pub fn canonical_type_name(raw: &str) -> Result<String, ResolveError> {
    let name = raw.replace(' ', "_");
    if name.is_empty() {
        return Err(ResolveError::Malformed("empty type name".to_string()));
    }
    let name = if name.contains(['-', '_']) {
        name.to_lowercase()
    } else {
        name
    };

    Ok(name.split('_').map(capitalize_first).collect())
}

fn capitalize_first(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Raw type name requested by the metadata, in priority order.
///
/// 1. `model`, when present
/// 2. `work_type` from the metadata, when the MAPPING declares `work_type`
/// 3. the default type name
pub fn requested_type_name(
    metadata: &ParsedMetadata,
    mapping: &FieldMapping,
    default_type: &str,
) -> Result<String, ResolveError> {
    if metadata.is_present(MODEL_FIELD) {
        return name_from(metadata, MODEL_FIELD);
    }
    // Condition reads the mapping, value reads the metadata
    if mapping.is_present(WORK_TYPE_FIELD) {
        return name_from(metadata, WORK_TYPE_FIELD);
    }
    Ok(default_type.to_string())
}

fn name_from(metadata: &ParsedMetadata, field: &str) -> Result<String, ResolveError> {
    match metadata.first(field).and_then(|v| v.as_str()) {
        Some(name) => Ok(name.to_string()),
        None => Err(ResolveError::Malformed(format!("no usable '{}' value", field))),
    }
}

/// Resolve the object type an entry should be persisted as.
pub fn resolve_factory_type(
    metadata: &ParsedMetadata,
    mapping: &FieldMapping,
    registry: &TypeRegistry,
    default_type: &str,
) -> Option<TypeHandle> {
    let attempt = requested_type_name(metadata, mapping, default_type)
        .and_then(|raw| canonical_type_name(&raw))
        .and_then(|name| registry.lookup(&name));

    match attempt {
        Ok(handle) => Some(handle),
        Err(ResolveError::NotFound(name)) => {
            log_warning(format!("Object type '{}' is not registered", name));
            None
        }
        Err(ResolveError::Malformed(reason)) => {
            log_warning(format!("{}, using default type '{}'", reason, default_type));
            registry.lookup(default_type).ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldSpec;
    use serde_json::json;

    fn metadata(value: serde_json::Value) -> ParsedMetadata {
        ParsedMetadata::from(value.as_object().unwrap().clone())
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::with_defaults();
        registry.register("FakeWork", ObjectKind::Work);
        registry
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_type_name("fake_work").unwrap(), "FakeWork");
        assert_eq!(canonical_type_name("Fake Work").unwrap(), "FakeWork");
        assert_eq!(canonical_type_name("FAKE_WORK").unwrap(), "FakeWork");
        assert_eq!(canonical_type_name("GenericWork").unwrap(), "GenericWork");
        assert_eq!(canonical_type_name("work").unwrap(), "Work");
        assert_eq!(canonical_type_name("fake-work").unwrap(), "Fake-work");
        assert!(matches!(canonical_type_name(""), Err(ResolveError::Malformed(_))));
    }

    #[test]
    fn test_model_resolves() {
        let handle = resolve_factory_type(&metadata(json!({ "model": "Work" })), &FieldMapping::new(), &registry(), "Work");
        assert_eq!(handle, Some(TypeHandle::new("Work", ObjectKind::Work)));
    }

    #[test]
    fn test_model_list_uses_first_element() {
        let handle = resolve_factory_type(
            &metadata(json!({ "model": ["fake_work", "Collection"] })),
            &FieldMapping::new(),
            &registry(),
            "Work",
        );
        assert_eq!(handle.unwrap().name, "FakeWork");
    }

    #[test]
    fn test_no_model_falls_back_to_default() {
        let handle = resolve_factory_type(&metadata(json!({ "title": "x" })), &FieldMapping::new(), &registry(), "Collection");
        assert_eq!(handle.unwrap().kind, ObjectKind::Collection);
    }

    #[test]
    fn test_unregistered_name_is_none() {
        let handle = resolve_factory_type(&metadata(json!({ "model": "Spaceship" })), &FieldMapping::new(), &registry(), "Work");
        assert!(handle.is_none());

        let handle = resolve_factory_type(&metadata(json!({ "model": "fake-work" })), &FieldMapping::new(), &registry(), "Work");
        assert!(handle.is_none());
    }

    #[test]
    fn test_work_type_needs_mapping_declaration() {
        let meta = metadata(json!({ "work_type": "fake work" }));

        // Not declared in the mapping: ignored, default used
        let handle = resolve_factory_type(&meta, &FieldMapping::new(), &registry(), "Work");
        assert_eq!(handle.unwrap().name, "Work");

        let mapping = FieldMapping::new().with("work_type", FieldSpec::from_source("Type"));
        let handle = resolve_factory_type(&meta, &mapping, &registry(), "Work");
        assert_eq!(handle.unwrap().name, "FakeWork");
    }

    #[test]
    fn test_declared_work_type_missing_from_metadata_uses_default() {
        let mapping = FieldMapping::new().with("work_type", FieldSpec::from_source("Type"));
        let handle = resolve_factory_type(&metadata(json!({ "title": "x" })), &mapping, &registry(), "Collection");
        assert_eq!(handle.unwrap().name, "Collection");
    }

    #[test]
    fn test_malformed_model_value_uses_default() {
        let handle = resolve_factory_type(
            &metadata(json!({ "model": { "name": "Work" } })),
            &FieldMapping::new(),
            &registry(),
            "FakeWork",
        );
        assert_eq!(handle.unwrap().name, "FakeWork");
    }

    #[test]
    fn test_registry_from_config() {
        let mut config = ImporterConfig::default();
        config.work_types = vec!["generic_work".into(), "Image".into(), "bad name!".into()];
        let registry = TypeRegistry::from_config(&config);
        assert!(registry.contains("GenericWork"));
        assert!(registry.contains("Image"));
        assert_eq!(registry.names(), vec!["Collection", "FileSet", "GenericWork", "Image", "Work"]);
    }
}
