//! Field normalization: raw record to parsed metadata.
//!
//! ```text
//! RawRecord                                 ParsedMetadata
//! ┌──────────────────────────────┐          ┌─────────────────────────────────┐
//! │ title_1: "A"                 │          │ title: ["A", "B"]               │
//! │ 2_title: "B"                 │   ──▶    │ creator: {                      │
//! │ creator_first_name: "Fake"   │          │   first_name: "Fake",           │
//! │ creator_language: "english"  │          │   language: "English" }         │
//! └──────────────────────────────┘          └─────────────────────────────────┘
//! ```
//!
//! Rules:
//!
//! - Enumerated variants of a column (`title_2`, `2_title`) merge into one
//!   list, ordered by their number. A plain `title` column counts as number 0.
//! - Fields declared with an `object` are grouped into a nested map keyed by
//!   their logical name. Comma-separated input becomes a list, and
//!   enumerated sub-field columns merge by number like top-level ones.
//! - Fields declared `parsed` go through [`values::parse_value`].
//! - Relationship fields are always lists, split on `|`.

pub mod values;

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::config::mapping::{FieldMapping, FieldSpec, Split, DEFAULT_SPLIT_PATTERN};
use crate::logs::log_warning;
use crate::models::{ParsedMetadata, RawRecord};

/// Split a column name into its base name and enumeration number.
///
/// `title_2` and `2_title` both give `("title", Some(2))`.
pub fn strip_enumeration(key: &str) -> (&str, Option<u32>) {
    let numbered = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    if let Some((base, n)) = key.rsplit_once('_') {
        if !base.is_empty() && numbered(n) {
            if let Ok(index) = n.parse() {
                return (base, Some(index));
            }
        }
    }
    if let Some((n, base)) = key.split_once('_') {
        if !base.is_empty() && numbered(n) {
            if let Ok(index) = n.parse() {
                return (base, Some(index));
            }
        }
    }
    (key, None)
}

enum Splitter {
    Pipe,
    Pattern(Regex),
}

impl Splitter {
    fn split(&self, value: &str) -> Vec<String> {
        let pieces: Vec<&str> = match self {
            Splitter::Pipe => value.split('|').collect(),
            Splitter::Pattern(re) => re.split(value).collect(),
        };
        pieces
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect()
    }
}

type Values = Vec<(u32, String)>;

enum Slot {
    Field { values: Values, list: bool },
    /// Sub-keys in first-seen order.
    Object(Vec<(String, Values)>),
}

/// Merges raw columns into parsed metadata according to a field mapping.
pub struct FieldNormalizer<'a> {
    mapping: &'a FieldMapping,
    splitters: HashMap<&'a str, Splitter>,
}

impl<'a> FieldNormalizer<'a> {
    pub fn new(mapping: &'a FieldMapping) -> Self {
        let mut splitters = HashMap::new();
        for (name, spec) in mapping.iter() {
            let Some(pattern) = spec.split.as_ref().and_then(Split::pattern) else {
                continue;
            };
            if pattern == DEFAULT_SPLIT_PATTERN {
                splitters.insert(name, Splitter::Pipe);
                continue;
            }
            match Regex::new(pattern) {
                Ok(re) => {
                    splitters.insert(name, Splitter::Pattern(re));
                }
                Err(e) => {
                    log_warning(format!("Ignoring split pattern for '{}': {}", name, e));
                }
            }
        }
        Self { mapping, splitters }
    }

    pub fn normalize(&self, record: &RawRecord) -> ParsedMetadata {
        let mut slots: Vec<(String, Slot)> = Vec::new();
        let pipe = Splitter::Pipe;

        for (raw_key, raw_value) in record {
            let values = raw_values(raw_value);
            if values.is_empty() {
                continue;
            }

            let (name, spec, index) = self.resolve(raw_key);
            if spec.is_some_and(|s| s.excluded) {
                continue;
            }
            let parsed = spec.is_some_and(|s| s.parsed);

            match spec.and_then(|s| s.object.as_deref()) {
                Some(object) => {
                    let pieces: Vec<String> = values
                        .iter()
                        .flat_map(|v| v.split(','))
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(|p| parse_if(parsed, &name, p))
                        .collect();
                    put_object(&mut slots, object, &name, index.unwrap_or(0), pieces);
                }
                None => {
                    let relationship = self.mapping.is_relationship_field(&name);
                    let splitter = match self.splitters.get(name.as_str()) {
                        Some(s) => Some(s),
                        None if relationship => Some(&pipe),
                        None => None,
                    };
                    let pieces: Vec<String> = values
                        .iter()
                        .flat_map(|v| match splitter {
                            Some(s) => s.split(v),
                            None => vec![v.clone()],
                        })
                        .map(|p| parse_if(parsed, &name, &p))
                        .collect();
                    let list = index.is_some() || relationship || splitter.is_some();
                    put_field(&mut slots, &name, index.unwrap_or(0), pieces, list);
                }
            }
        }

        let mut metadata = ParsedMetadata::new();
        for (name, slot) in slots {
            let value = match slot {
                Slot::Object(keys) => Value::Object(
                    keys.into_iter()
                        .filter_map(|(key, values)| Some((key, ordered(values, false)?)))
                        .collect::<Map<String, Value>>(),
                ),
                Slot::Field { values, list } => match ordered(values, list) {
                    Some(value) => value,
                    None => continue,
                },
            };
            metadata.insert(name, value);
        }
        metadata
    }

    /// Logical name, declaration and enumeration number for a source column.
    fn resolve(&self, raw_key: &str) -> (String, Option<&'a FieldSpec>, Option<u32>) {
        if let Some((name, spec)) = self.mapping.field_for_source(raw_key) {
            return (name.to_string(), Some(spec), None);
        }

        let (base, index) = strip_enumeration(raw_key);
        if index.is_some() {
            if let Some((name, spec)) = self.mapping.field_for_source(base) {
                return (name.to_string(), Some(spec), index);
            }
        }

        match self.mapping.get(base) {
            Some(spec) if spec.from.is_empty() => (base.to_string(), Some(spec), index),
            _ => (base.to_string(), None, index),
        }
    }
}

/// Normalize a record with a mapping.
pub fn normalize(record: &RawRecord, mapping: &FieldMapping) -> ParsedMetadata {
    FieldNormalizer::new(mapping).normalize(record)
}

fn raw_values(value: &Value) -> Vec<String> {
    let one = |v: &Value| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    let values: Vec<String> = match value {
        Value::Array(items) => items.iter().filter_map(one).collect(),
        other => one(other).into_iter().collect(),
    };
    values.into_iter().filter(|v| !v.is_empty()).collect()
}

fn parse_if(parsed: bool, field: &str, value: &str) -> String {
    if parsed {
        values::parse_value(field, value)
    } else {
        value.to_string()
    }
}

fn put_field(slots: &mut Vec<(String, Slot)>, name: &str, index: u32, pieces: Vec<String>, list: bool) {
    match slots.iter().position(|(n, _)| n == name) {
        Some(i) => match &mut slots[i].1 {
            Slot::Field { values, list: was_list } => {
                values.extend(pieces.into_iter().map(|p| (index, p)));
                *was_list |= list;
            }
            // An object group already owns this name
            Slot::Object(_) => {
                log_warning(format!("Field '{}' collides with an object group, value dropped", name));
            }
        },
        None => slots.push((
            name.to_string(),
            Slot::Field {
                values: pieces.into_iter().map(|p| (index, p)).collect(),
                list,
            },
        )),
    }
}

fn put_object(slots: &mut Vec<(String, Slot)>, object: &str, key: &str, index: u32, pieces: Vec<String>) {
    if pieces.is_empty() {
        return;
    }
    let pieces = pieces.into_iter().map(|p| (index, p));

    let position = slots.iter().position(|(n, _)| n == object);
    let i = match position {
        Some(i) => {
            if let Slot::Field { values, .. } = &slots[i].1 {
                let dropped: Vec<&str> = values.iter().map(|(_, v)| v.as_str()).collect();
                log_warning(format!(
                    "Field '{}' replaced by an object group, dropped: {}",
                    object,
                    dropped.join(", ")
                ));
                slots[i].1 = Slot::Object(Vec::new());
            }
            i
        }
        None => {
            slots.push((object.to_string(), Slot::Object(Vec::new())));
            slots.len() - 1
        }
    };

    if let Slot::Object(keys) = &mut slots[i].1 {
        match keys.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.extend(pieces),
            None => keys.push((key.to_string(), pieces.collect())),
        }
    }
}

/// Values sorted by enumeration number; a list unless `list` is false and
/// there is exactly one value.
fn ordered(mut values: Values, list: bool) -> Option<Value> {
    values.sort_by_key(|(index, _)| *index);
    if list || values.len() > 1 {
        Some(Value::Array(values.into_iter().map(|(_, v)| Value::String(v)).collect()))
    } else {
        values.pop().map(|(_, v)| Value::String(v))
    }
}
