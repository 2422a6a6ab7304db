//! Metadata normalization
//!
//! Extraction services emit every metadata value as text, booleans and
//! dates included. The normalizer parses the raw payload into ordered
//! (key, value) pairs, coerces each value into a typed
//! [`NormalizedValue`], and partitions keys into *known* fields (mapped to
//! first-class document columns) and *foreign* fields (namespaced
//! third-party vocabulary properties, kept verbatim). Keys matching
//! neither are dropped.
//!
//! Coercion precedence is boolean → numeric → date → text, and the order
//! is load-bearing: a bare year like "2020" must come out numeric, never
//! as a date.

use crate::assertion::{Iri, Term};
use crate::assertion::vocab;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from parsing a raw metadata payload.
///
/// Normalization never partially fails: on any of these, neither
/// partition is populated and the ingestion step fails.
#[derive(Debug, Error)]
pub enum MetadataParseError {
    #[error("metadata payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("metadata row {row} is malformed: {message}")]
    Row { row: usize, message: String },

    #[error("metadata key {key:?} has a non-scalar value")]
    NonScalar { key: String },
}

/// A metadata value after type coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NormalizedValue {
    Bool(bool),
    Number(serde_json::Number),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl NormalizedValue {
    /// The lexical form, as used for record-store columns.
    pub fn lexical(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true),
            Self::Text(s) => s.clone(),
        }
    }

    /// The graph term, with an explicit datatype tag where one applies.
    pub fn to_term(&self) -> Term {
        match self {
            Self::Bool(b) => Term::typed(b.to_string(), Iri::new(vocab::XSD_BOOLEAN)),
            Self::Number(n) => {
                let datatype = if n.is_f64() {
                    vocab::XSD_DOUBLE
                } else {
                    vocab::XSD_INTEGER
                };
                Term::typed(n.to_string(), Iri::new(datatype))
            }
            Self::Timestamp(t) => Term::typed(
                t.to_rfc3339_opts(SecondsFormat::Millis, true),
                vocab::xsd_date_time(),
            ),
            Self::Text(s) => Term::text(s.clone()),
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

/// Coerce a raw string value into a typed value.
///
/// Precedence: boolean → numeric → date → text. Numeric detection follows
/// the JSON number grammar, so "007" stays text and "4.2" becomes a
/// double.
pub fn coerce(raw: &str) -> NormalizedValue {
    let trimmed = raw.trim();

    if trimmed.eq_ignore_ascii_case("true") {
        return NormalizedValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return NormalizedValue::Bool(false);
    }

    if let Ok(n) = serde_json::from_str::<serde_json::Number>(trimmed) {
        return NormalizedValue::Number(n);
    }

    if let Some(t) = parse_timestamp(trimmed) {
        return NormalizedValue::Timestamp(t);
    }

    NormalizedValue::Text(raw.to_string())
}

/// Accepts RFC 3339 plus the zone-less date and datetime forms extraction
/// services actually emit. Zone-less input is taken as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&t));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&d.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// The known-field partition: values that map to document columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownFields {
    pub title: Option<NormalizedValue>,
    pub language: Option<NormalizedValue>,
    /// Publication date; populated only when the raw "date" value coerced
    /// to a timestamp.
    pub date: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl KnownFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.language.is_none()
            && self.date.is_none()
            && self.created.is_none()
            && self.modified.is_none()
    }

    pub fn title_text(&self) -> Option<String> {
        self.title.as_ref().map(NormalizedValue::lexical)
    }

    pub fn language_text(&self) -> Option<String> {
        self.language.as_ref().map(NormalizedValue::lexical)
    }
}

/// Output of normalization: both partitions, typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedMetadata {
    pub known: KnownFields,
    /// Foreign properties keyed by their namespaced key ("dc:creator").
    /// BTreeMap so iteration order is deterministic; a repeated key keeps
    /// the last value seen.
    pub foreign: BTreeMap<String, NormalizedValue>,
}

impl NormalizedMetadata {
    pub fn has_foreign(&self) -> bool {
        !self.foreign.is_empty()
    }
}

/// Registered vocabulary prefixes for foreign metadata keys.
///
/// A key is foreign iff its prefix (the part before the first ':') is
/// registered here. [`NamespaceTable::expand`] resolves a foreign key to
/// its absolute predicate IRI for graph embedding.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    prefixes: BTreeMap<String, String>,
}

impl NamespaceTable {
    pub fn empty() -> Self {
        Self {
            prefixes: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, prefix: impl Into<String>, base: impl Into<String>) {
        self.prefixes.insert(prefix.into(), base.into());
    }

    fn split<'a>(&self, key: &'a str) -> Option<(&'a str, &'a str)> {
        let (prefix, local) = key.split_once(':')?;
        if local.is_empty() || !self.prefixes.contains_key(prefix) {
            return None;
        }
        Some((prefix, local))
    }

    /// Does this key belong to a registered vocabulary?
    pub fn is_foreign(&self, key: &str) -> bool {
        self.split(key).is_some()
    }

    /// Resolve a foreign key to its absolute predicate IRI.
    pub fn expand(&self, key: &str) -> Option<Iri> {
        let (prefix, local) = self.split(key)?;
        Some(Iri::new(format!("{}{}", self.prefixes[prefix], local)))
    }
}

impl Default for NamespaceTable {
    /// The vocabularies extraction services are known to emit: Dublin
    /// Core, Adobe PDF/XMP/TIFF/EXIF, OOXML and ODF document properties.
    fn default() -> Self {
        let mut table = Self::empty();
        for (prefix, base) in [
            ("dc", "http://purl.org/dc/elements/1.1/"),
            ("dcterms", "http://purl.org/dc/terms/"),
            ("dcmitype", "http://purl.org/dc/dcmitype/"),
            ("pdf", "http://ns.adobe.com/pdf/1.3/"),
            ("xmp", "http://ns.adobe.com/xap/1.0/"),
            ("xmpTPg", "http://ns.adobe.com/xap/1.0/t/pg/"),
            ("xmpMM", "http://ns.adobe.com/xap/1.0/mm/"),
            ("tiff", "http://ns.adobe.com/tiff/1.0/"),
            ("exif", "http://ns.adobe.com/exif/1.0/"),
            (
                "cp",
                "http://schemas.openxmlformats.org/package/2006/metadata/core-properties/",
            ),
            (
                "extended-properties",
                "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties/",
            ),
            ("meta", "urn:oasis:names:tc:opendocument:xmlns:meta:1.0#"),
        ] {
            table.register(prefix, base);
        }
        table
    }
}

/// Parses raw extraction-service metadata into typed, partitioned form.
pub struct MetadataNormalizer {
    namespaces: NamespaceTable,
}

impl MetadataNormalizer {
    pub fn new(namespaces: NamespaceTable) -> Self {
        Self { namespaces }
    }

    pub fn namespaces(&self) -> &NamespaceTable {
        &self.namespaces
    }

    /// Normalize a raw payload.
    ///
    /// The payload is either a JSON object of scalar values or tabular
    /// `key,value` lines (quoted fields allowed) — both forms appear in
    /// the wild depending on the extraction service's Accept negotiation.
    pub fn normalize(&self, payload: &str) -> Result<NormalizedMetadata, MetadataParseError> {
        let pairs = parse_pairs(payload)?;

        let mut out = NormalizedMetadata::default();
        for (key, raw) in pairs {
            let value = coerce(&raw);
            if self.namespaces.is_foreign(&key) {
                out.foreign.insert(key, value);
            } else {
                match key.as_str() {
                    "title" => out.known.title = Some(value),
                    "language" => out.known.language = Some(value),
                    "date" => out.known.date = value.as_timestamp().or(out.known.date),
                    "created" => out.known.created = value.as_timestamp().or(out.known.created),
                    "modified" => out.known.modified = value.as_timestamp().or(out.known.modified),
                    _ => {} // unregistered namespace or unknown key: dropped
                }
            }
        }
        Ok(out)
    }
}

/// The raw extracted record as a JSON object (uncoerced string values,
/// later keys winning). This is what gets content-addressed as the
/// metadata artifact — coercion is a read-side concern and must not
/// change the stored record's bytes.
pub fn raw_record(payload: &str) -> Result<serde_json::Value, MetadataParseError> {
    let mut map = serde_json::Map::new();
    for (key, value) in parse_pairs(payload)? {
        map.insert(key, serde_json::Value::String(value));
    }
    Ok(serde_json::Value::Object(map))
}

/// Parse the raw payload into ordered (key, raw value) pairs.
fn parse_pairs(payload: &str) -> Result<Vec<(String, String)>, MetadataParseError> {
    if payload.trim_start().starts_with('{') {
        return parse_json_pairs(payload);
    }
    parse_tabular_pairs(payload)
}

fn parse_json_pairs(payload: &str) -> Result<Vec<(String, String)>, MetadataParseError> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(payload)?;
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        let raw = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Null => continue,
            _ => return Err(MetadataParseError::NonScalar { key }),
        };
        pairs.push((key, raw));
    }
    Ok(pairs)
}

/// Tabular form: one `key,value` row per line, double-quoted fields with
/// `""` escapes. Fields past the second are ignored, matching the
/// extraction service's ragged output.
fn parse_tabular_pairs(payload: &str) -> Result<Vec<(String, String)>, MetadataParseError> {
    let mut pairs = Vec::new();
    for (idx, line) in payload.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = idx + 1;
        let fields = split_csv_row(line).map_err(|message| MetadataParseError::Row { row, message })?;
        if fields.len() < 2 {
            return Err(MetadataParseError::Row {
                row,
                message: "expected key,value".to_string(),
            });
        }
        let mut it = fields.into_iter();
        let key = it.next().unwrap_or_default();
        let value = it.next().unwrap_or_default();
        pairs.push((key, value));
    }
    Ok(pairs)
}

fn split_csv_row(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        quoted = false;
                    }
                }
                _ => field.push(c),
            }
        } else {
            match c {
                '"' if field.is_empty() => quoted = true,
                ',' => fields.push(std::mem::take(&mut field)),
                _ => field.push(c),
            }
        }
    }
    if quoted {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_precedence() {
        assert_eq!(coerce("true"), NormalizedValue::Bool(true));
        assert_eq!(coerce("False"), NormalizedValue::Bool(false));
        assert_eq!(coerce("42"), NormalizedValue::Number(42.into()));
        // a bare year is numeric, not a date: numeric check runs first
        assert_eq!(coerce("2020"), NormalizedValue::Number(2020.into()));
        assert!(matches!(coerce("4.25"), NormalizedValue::Number(n) if n.is_f64()));
        assert!(matches!(
            coerce("2020-01-01T00:00:00Z"),
            NormalizedValue::Timestamp(_)
        ));
        assert!(matches!(coerce("2020-01-01"), NormalizedValue::Timestamp(_)));
        assert_eq!(coerce("hello"), NormalizedValue::Text("hello".to_string()));
        // leading zeros fail the JSON number grammar and stay text
        assert_eq!(coerce("007"), NormalizedValue::Text("007".to_string()));
    }

    #[test]
    fn known_and_foreign_partitions() {
        let normalizer = MetadataNormalizer::new(NamespaceTable::default());
        let meta = normalizer
            .normalize("title,Report\ndc:creator,Jane\nX-Parsed-By,SomeParser\nlanguage,en\n")
            .unwrap();

        assert_eq!(meta.known.title_text().as_deref(), Some("Report"));
        assert_eq!(meta.known.language_text().as_deref(), Some("en"));
        assert_eq!(meta.foreign.len(), 1);
        assert_eq!(
            meta.foreign.get("dc:creator"),
            Some(&NormalizedValue::Text("Jane".to_string()))
        );
    }

    #[test]
    fn date_fields_require_timestamp_coercion() {
        let normalizer = MetadataNormalizer::new(NamespaceTable::default());
        // "2020" coerces to a number, so the publication date stays unset
        let meta = normalizer.normalize("date,2020\n").unwrap();
        assert!(meta.known.date.is_none());

        let meta = normalizer.normalize("date,2020-06-01T12:00:00Z\n").unwrap();
        assert!(meta.known.date.is_some());
    }

    #[test]
    fn json_payload_form() {
        let normalizer = MetadataNormalizer::new(NamespaceTable::default());
        let meta = normalizer
            .normalize(r#"{"title":"Report","dc:creator":"Jane","pdf:PDFVersion":"1.7"}"#)
            .unwrap();
        assert_eq!(meta.known.title_text().as_deref(), Some("Report"));
        assert_eq!(meta.foreign.len(), 2);
    }

    #[test]
    fn quoted_values_keep_commas() {
        let normalizer = MetadataNormalizer::new(NamespaceTable::default());
        let meta = normalizer
            .normalize("title,\"Report, Volume 2\"\ndc:subject,\"a \"\"quoted\"\" word\"\n")
            .unwrap();
        assert_eq!(meta.known.title_text().as_deref(), Some("Report, Volume 2"));
        assert_eq!(
            meta.foreign.get("dc:subject"),
            Some(&NormalizedValue::Text("a \"quoted\" word".to_string()))
        );
    }

    #[test]
    fn malformed_payload_fails_whole() {
        let normalizer = MetadataNormalizer::new(NamespaceTable::default());
        assert!(normalizer.normalize("just-a-key-no-value\n").is_err());
        assert!(normalizer.normalize(r#"{"title": ["nested"]}"#).is_err());
        assert!(normalizer.normalize(r#"{"title": broken"#).is_err());
    }

    #[test]
    fn unregistered_prefixes_are_dropped() {
        let normalizer = MetadataNormalizer::new(NamespaceTable::default());
        let meta = normalizer.normalize("madeup:field,value\n").unwrap();
        assert!(meta.foreign.is_empty());
        assert!(meta.known.is_empty());
    }

    #[test]
    fn expand_resolves_registered_prefixes() {
        let table = NamespaceTable::default();
        assert_eq!(
            table.expand("dc:creator").unwrap().as_str(),
            "http://purl.org/dc/elements/1.1/creator"
        );
        assert!(table.expand("nope:creator").is_none());
        assert!(table.expand("plainkey").is_none());
    }
}
