//! Field mapping configuration.
//!
//! A field mapping declares, per logical field, which source columns feed it
//! and how: grouped under an object, value-parsed, split, or flagged as a
//! parent/child relationship field.
//!
//! Declarations are ordered. Declaring the same logical name twice keeps the
//! LAST declaration, at the position of the first one. This holds for mappings
//! deserialized from JSON objects with duplicate keys too.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Default metadata key for parent identifiers.
pub const DEFAULT_PARENTS_FIELD: &str = "parents";

/// Default metadata key for child identifiers.
pub const DEFAULT_CHILDREN_FIELD: &str = "children";

/// Pattern used when `split` is just `true`.
pub const DEFAULT_SPLIT_PATTERN: &str = r"\s*\|\s*";

/// How a value is split into several values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Split {
    /// `true` splits on `|`.
    Enabled(bool),
    /// Custom regex.
    Pattern(String),
}

impl Split {
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Split::Enabled(true) => Some(DEFAULT_SPLIT_PATTERN),
            Split::Enabled(false) => None,
            Split::Pattern(p) => Some(p.as_str()),
        }
    }
}

/// Declaration of one logical field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Source columns feeding this field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<String>,

    /// Object group this field belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,

    /// Run values through [`crate::normalize::values::parse_value`].
    #[serde(default, skip_serializing_if = "is_false")]
    pub parsed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Split>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub related_parents_field_mapping: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub related_children_field_mapping: bool,

    /// Drop this field entirely.
    #[serde(default, skip_serializing_if = "is_false")]
    pub excluded: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl FieldSpec {
    pub fn from_source(source: &str) -> Self {
        Self {
            from: vec![source.to_string()],
            ..Self::default()
        }
    }

    pub fn in_object(mut self, object: &str) -> Self {
        self.object = Some(object.to_string());
        self
    }

    pub fn parsed(mut self) -> Self {
        self.parsed = true;
        self
    }

    pub fn with_split(mut self, split: Split) -> Self {
        self.split = Some(split);
        self
    }

    pub fn parents(mut self) -> Self {
        self.related_parents_field_mapping = true;
        self
    }

    pub fn children(mut self) -> Self {
        self.related_children_field_mapping = true;
        self
    }

    /// An empty declaration (`{}`) carries no information.
    pub fn is_blank(&self) -> bool {
        *self == FieldSpec::default()
    }
}

/// Ordered set of field declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(String, FieldSpec)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field. A repeated name replaces the earlier declaration.
    pub fn insert(&mut self, name: impl Into<String>, spec: FieldSpec) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = spec,
            None => self.entries.push((name, spec)),
        }
    }

    /// Builder form of [`FieldMapping::insert`].
    pub fn with(mut self, name: &str, spec: FieldSpec) -> Self {
        self.insert(name, spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Declared with a non-empty spec.
    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some_and(|s| !s.is_blank())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.entries.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First declaration listing `source` in its `from` columns.
    pub fn field_for_source(&self, source: &str) -> Option<(&str, &FieldSpec)> {
        self.iter().find(|(_, spec)| spec.from.iter().any(|f| f == source))
    }

    /// Metadata key holding parent identifiers.
    pub fn related_parents_parsed_mapping(&self) -> &str {
        self.iter()
            .find(|(_, spec)| spec.related_parents_field_mapping)
            .map(|(name, _)| name)
            .unwrap_or(DEFAULT_PARENTS_FIELD)
    }

    /// Metadata key holding child identifiers.
    pub fn related_children_parsed_mapping(&self) -> &str {
        self.iter()
            .find(|(_, spec)| spec.related_children_field_mapping)
            .map(|(name, _)| name)
            .unwrap_or(DEFAULT_CHILDREN_FIELD)
    }

    pub fn is_relationship_field(&self, name: &str) -> bool {
        name == self.related_parents_parsed_mapping()
            || name == self.related_children_parsed_mapping()
    }
}

impl Serialize for FieldMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, spec) in &self.entries {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = FieldMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to field declarations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FieldMapping, A::Error> {
                let mut mapping = FieldMapping::new();
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    mapping.insert(name, spec);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}
