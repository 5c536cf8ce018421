//! Value parsers applied to fields declared `parsed`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// (ISO 639-1, ISO 639-2, English name)
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("ar", "ara", "Arabic"),
    ("zh", "zho", "Chinese"),
    ("da", "dan", "Danish"),
    ("nl", "nld", "Dutch"),
    ("en", "eng", "English"),
    ("fi", "fin", "Finnish"),
    ("fr", "fra", "French"),
    ("de", "deu", "German"),
    ("el", "ell", "Greek"),
    ("he", "heb", "Hebrew"),
    ("hi", "hin", "Hindi"),
    ("it", "ita", "Italian"),
    ("ja", "jpn", "Japanese"),
    ("ko", "kor", "Korean"),
    ("la", "lat", "Latin"),
    ("no", "nor", "Norwegian"),
    ("pl", "pol", "Polish"),
    ("pt", "por", "Portuguese"),
    ("ru", "rus", "Russian"),
    ("es", "spa", "Spanish"),
    ("sv", "swe", "Swedish"),
    ("tr", "tur", "Turkish"),
    ("uk", "ukr", "Ukrainian"),
];

/// Bibliographic 639-2/B codes that differ from the terminology codes.
const LANGUAGE_ALIASES: &[(&str, &str)] = &[
    ("chi", "Chinese"),
    ("dut", "Dutch"),
    ("fre", "French"),
    ("ger", "German"),
    ("gre", "Greek"),
];

static LANGUAGE_LOOKUP: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut lookup = HashMap::new();
    for (two, three, name) in LANGUAGES {
        lookup.insert(two.to_string(), *name);
        lookup.insert(three.to_string(), *name);
        lookup.insert(name.to_lowercase(), *name);
    }
    for (code, name) in LANGUAGE_ALIASES {
        lookup.insert(code.to_string(), *name);
    }
    lookup
});

/// English language name for a code or name, if known.
pub fn language_name(value: &str) -> Option<&'static str> {
    LANGUAGE_LOOKUP.get(&value.trim().to_lowercase()).copied()
}

/// Normalize a value of a `parsed` field.
///
/// Fields named `*language` are expanded to English language names; unknown
/// values and other fields pass through unchanged.
pub fn parse_value(field: &str, value: &str) -> String {
    if field.ends_with("language") {
        if let Some(name) = language_name(value) {
            return name.to_string();
        }
    }
    value.to_string()
}
