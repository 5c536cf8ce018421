//! CSV reader producing raw import records.
//!
//! Detects encoding and delimiter, then turns each row into a [`RawRecord`]
//! keyed by header. No import semantics here: enumerated columns, object
//! groups and mapping are handled by [`crate::normalize`].

use serde_json::Value;
use std::path::Path;

use crate::models::RawRecord;

/// CSV reading error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.column {
            Some(col) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            None => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
        CsvError::new(line, err.to_string())
    }
}

/// Records plus what was detected while reading them
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub records: Vec<RawRecord>,
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
}

/// Guess the charset of raw bytes
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with a charset label, falling back to lossy UTF-8
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding_rs::Encoding::for_label(encoding.as_bytes()) {
        Some(enc) => enc.decode(bytes).0.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Pick the separator occurring most often in the header line
pub fn detect_delimiter(content: &str) -> char {
    let header = content.lines().next().unwrap_or("");
    [',', ';', '\t', '|']
        .into_iter()
        .map(|sep| (sep, header.matches(sep).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(sep, _)| sep)
        .unwrap_or(',')
}

/// Read CSV text with an explicit delimiter
pub fn parse_str(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<RawRecord>), CsvError> {
    if content.trim().is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|v| v.is_empty()) {
            continue;
        }

        let mut record = RawRecord::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = row.get(i).unwrap_or("");
            record.insert(header.clone(), Value::String(value.to_string()));
        }
        records.push(record);
    }

    Ok((headers, records))
}

/// Read CSV bytes, detecting encoding and delimiter
pub fn parse_bytes_auto(bytes: &[u8]) -> Result<ParseResult, CsvError> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);
    let (headers, records) = parse_str(&content, delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Read a CSV file, detecting encoding and delimiter
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> Result<ParseResult, CsvError> {
    let bytes = std::fs::read(path.as_ref())
        .map_err(|e| CsvError::new(0, format!("Cannot read file: {}", e)))?;
    parse_bytes_auto(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_csv() {
        let (headers, rows) = parse_str("source_identifier,title\n1,First\n2,Second", ',').unwrap();
        assert_eq!(headers, vec!["source_identifier", "title"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], "First");
        assert_eq!(rows[1]["source_identifier"], "2");
    }

    #[test]
    fn test_quoted_values_keep_commas() {
        let csv = "source_identifier,creator_position\n1,\"Leader, Jester, Queen\"";
        let (_, rows) = parse_str(csv, ',').unwrap();
        assert_eq!(rows[0]["creator_position"], "Leader, Jester, Queen");
    }

    #[test]
    fn test_column_order_preserved() {
        let (_, rows) = parse_str("title_2,title_1\nB,A", ',').unwrap();
        let keys: Vec<_> = rows[0].keys().cloned().collect();
        assert_eq!(keys, vec!["title_2", "title_1"]);
    }

    #[test]
    fn test_blank_rows_skipped_and_short_rows_padded() {
        let (_, rows) = parse_str("a;b;c\n1;2;3\n;;\n4\n", ';').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["a"], "4");
        assert_eq!(rows[1]["c"], "");
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_str("", ',').unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"source_identifier;title\n1;Alpha\n2;Beta").unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.headers, vec!["source_identifier", "title"]);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_error_message_format() {
        let err = CsvError::new(5, "unterminated quote").with_column("title");
        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'title'"));
    }
}
