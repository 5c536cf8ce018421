//! Importer configuration.
//!
//! One [`ImporterConfig`] is shared read-only by every entry of a run. It is
//! loaded from JSON, with defaults for every optional key, and can be tweaked
//! from the environment (see [`ImporterConfig::apply_env`]).

pub mod mapping;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

pub use mapping::{FieldMapping, FieldSpec, Split};

/// Parser-level settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParserFields {
    /// Rights statement applied to entries that have none.
    #[serde(default)]
    pub rights_statement: Option<String>,

    /// When truthy, the configured rights statement replaces any record value.
    #[serde(default)]
    pub override_rights_statement: Option<Value>,

    /// Any other parser settings, kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParserFields {
    /// Only `"true"` and `"1"` count, however they were encoded.
    pub fn override_rights_statement(&self) -> bool {
        let raw = match &self.override_rights_statement {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return false,
        };
        matches!(raw.as_str(), "true" | "1")
    }
}

/// Configuration of one importer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImporterConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// Build and validate metadata without persisting anything.
    #[serde(default)]
    pub validate_only: bool,

    #[serde(default = "default_visibility")]
    pub visibility: String,

    #[serde(default = "default_admin_set_id")]
    pub admin_set_id: String,

    #[serde(default)]
    pub parser_fields: ParserFields,

    /// Type used when a record names none.
    #[serde(default = "default_work_type")]
    pub default_work_type: String,

    /// Extra type names registered on top of the built-in ones.
    #[serde(default)]
    pub work_types: Vec<String>,

    /// Source column holding each record's identifier.
    #[serde(default = "default_source_identifier")]
    pub source_identifier: String,

    /// Metadata key the identifier is stored under for the factory.
    #[serde(default = "default_work_identifier")]
    pub work_identifier: String,

    #[serde(default = "default_required_elements")]
    pub required_elements: Vec<String>,

    /// Source column listing collection identifiers.
    #[serde(default = "default_collection_field")]
    pub collection_field: String,

    /// Depositor recorded on persisted objects.
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub replace_files: bool,

    #[serde(default)]
    pub update_files: bool,

    #[serde(default)]
    pub field_mapping: FieldMapping,
}

fn default_name() -> String {
    "csv-importer".to_string()
}

fn default_visibility() -> String {
    "open".to_string()
}

fn default_admin_set_id() -> String {
    "admin_set/default".to_string()
}

fn default_work_type() -> String {
    "Work".to_string()
}

fn default_source_identifier() -> String {
    "source_identifier".to_string()
}

fn default_work_identifier() -> String {
    "source".to_string()
}

fn default_required_elements() -> Vec<String> {
    vec!["title".to_string()]
}

fn default_collection_field() -> String {
    "collection".to_string()
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            validate_only: false,
            visibility: default_visibility(),
            admin_set_id: default_admin_set_id(),
            parser_fields: ParserFields::default(),
            default_work_type: default_work_type(),
            work_types: Vec::new(),
            source_identifier: default_source_identifier(),
            work_identifier: default_work_identifier(),
            required_elements: default_required_elements(),
            collection_field: default_collection_field(),
            user: None,
            replace_files: false,
            update_files: false,
            field_mapping: FieldMapping::new(),
        }
    }
}

impl ImporterConfig {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Override selected settings from `BULKLOAD_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("BULKLOAD_DEFAULT_WORK_TYPE") {
            if !v.trim().is_empty() {
                self.default_work_type = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("BULKLOAD_ADMIN_SET_ID") {
            if !v.trim().is_empty() {
                self.admin_set_id = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("BULKLOAD_VISIBILITY") {
            if !v.trim().is_empty() {
                self.visibility = v.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_work_type.trim().is_empty() {
            return Err(ConfigError::Invalid("default_work_type is empty".into()));
        }
        if self.source_identifier.trim().is_empty() {
            return Err(ConfigError::Invalid("source_identifier is empty".into()));
        }
        for (name, spec) in self.field_mapping.iter() {
            let relationship =
                spec.related_parents_field_mapping || spec.related_children_field_mapping;
            if relationship && spec.object.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "relationship field '{}' cannot belong to an object",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ImporterConfig::from_json_str("{}").unwrap();
        assert!(!config.validate_only);
        assert_eq!(config.visibility, "open");
        assert_eq!(config.admin_set_id, "admin_set/default");
        assert_eq!(config.default_work_type, "Work");
        assert_eq!(config.source_identifier, "source_identifier");
        assert_eq!(config.required_elements, vec!["title"]);
        assert!(config.field_mapping.is_empty());
    }

    #[test]
    fn test_override_rights_statement_encodings() {
        let mut fields = ParserFields::default();
        assert!(!fields.override_rights_statement());

        for truthy in [json!("true"), json!("1"), json!(true), json!(1)] {
            fields.override_rights_statement = Some(truthy);
            assert!(fields.override_rights_statement());
        }
        for falsy in [json!("yes"), json!("TRUE"), json!(false), json!(0), json!(null)] {
            fields.override_rights_statement = Some(falsy);
            assert!(!fields.override_rights_statement());
        }
    }

    #[test]
    fn test_extra_parser_fields_kept() {
        let config = ImporterConfig::from_json_str(
            r#"{ "parser_fields": { "rights_statement": "http://rightsstatements.org/vocab/InC/1.0/", "import_file_path": "x.csv" } }"#,
        )
        .unwrap();
        assert_eq!(
            config.parser_fields.rights_statement.as_deref(),
            Some("http://rightsstatements.org/vocab/InC/1.0/")
        );
        assert_eq!(config.parser_fields.extra["import_file_path"], "x.csv");
    }

    #[test]
    fn test_relationship_object_rejected() {
        let result = ImporterConfig::from_json_str(
            r#"{ "field_mapping": { "parents": { "object": "creator", "related_parents_field_mapping": true } } }"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("importer.json");
        std::fs::write(&path, r#"{ "name": "pilot", "validate_only": true }"#).unwrap();

        let config = ImporterConfig::from_json_file(&path).unwrap();
        assert_eq!(config.name, "pilot");
        assert!(config.validate_only);
    }
}
