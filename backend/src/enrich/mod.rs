//! Default enrichment from importer configuration.
//!
//! Each operation fills one attribute only when the record left it blank, so
//! they can be applied in any order and more than once.

use serde_json::{json, Value};

use crate::config::ImporterConfig;
use crate::models::ParsedMetadata;

pub const RIGHTS_STATEMENT: &str = "rights_statement";
pub const VISIBILITY: &str = "visibility";
pub const ADMIN_SET_ID: &str = "admin_set_id";

/// Set `rights_statement` from the parser fields.
///
/// Overwrites an existing value when `override_rights_statement` is truthy.
pub fn add_rights_statement(metadata: &mut ParsedMetadata, config: &ImporterConfig) {
    let Some(statement) = config.parser_fields.rights_statement.as_deref() else {
        return;
    };
    if statement.trim().is_empty() {
        return;
    }
    if config.parser_fields.override_rights_statement() || !metadata.is_present(RIGHTS_STATEMENT) {
        metadata.insert(RIGHTS_STATEMENT, json!([statement]));
    }
}

pub fn add_visibility(metadata: &mut ParsedMetadata, config: &ImporterConfig) {
    fill_blank(metadata, VISIBILITY, &config.visibility);
}

pub fn add_admin_set_id(metadata: &mut ParsedMetadata, config: &ImporterConfig) {
    fill_blank(metadata, ADMIN_SET_ID, &config.admin_set_id);
}

/// All three defaults.
pub fn apply_defaults(metadata: &mut ParsedMetadata, config: &ImporterConfig) {
    add_visibility(metadata, config);
    add_rights_statement(metadata, config);
    add_admin_set_id(metadata, config);
}

fn fill_blank(metadata: &mut ParsedMetadata, key: &str, value: &str) {
    if value.trim().is_empty() || metadata.is_present(key) {
        return;
    }
    metadata.insert(key, Value::String(value.to_string()));
}
