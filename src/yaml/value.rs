//! Typed values read from and rendered into YAML text.
//!
//! Rendering is the inverse of [`parse_scalar`]: a rendered scalar always
//! reads back as the same [`ScalarValue`], which is what makes repeated
//! application of a patch set converge.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single YAML scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl ScalarValue {
    pub fn string(value: impl Into<String>) -> Self {
        ScalarValue::String(value.into())
    }

    /// Plain string form, as shown in a text field.
    pub fn to_display_string(&self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Integer(i) => i.to_string(),
            ScalarValue::Float(f) => render_float(*f),
            ScalarValue::String(s) => s.clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// YAML literal for this scalar: canonical for numbers and booleans,
    /// double-quoted for strings only when a bare form would be misread.
    pub fn render(&self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Integer(i) => i.to_string(),
            ScalarValue::Float(f) => render_float(*f),
            ScalarValue::String(s) => render_string(s),
        }
    }

    /// Empty strings and `false` are left out of rendered records.
    pub fn is_blank(&self) -> bool {
        match self {
            ScalarValue::String(s) => s.is_empty(),
            ScalarValue::Bool(b) => !b,
            _ => false,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::String(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::String(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Integer(value)
    }
}

/// Any value addressable at a path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(ScalarValue),
    StringArray(Vec<String>),
    ObjectArray(Vec<Record>),
}

/// A flat mapping inside an object array. Keeps insertion order.
///
/// Equality ignores key order: two records are equal when they hold the
/// same key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct Record {
    entries: Vec<(String, ScalarValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or overwrite in place; a new key goes to the end.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ScalarValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ScalarValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy without blank (empty/false) entries.
    pub fn normalized(&self) -> Record {
        Record {
            entries: self
                .entries
                .iter()
                .filter(|(_, v)| !v.is_blank())
                .cloned()
                .collect(),
        }
    }

    /// Entries ordered by `key_order` first, then by insertion order.
    pub fn ordered<'a>(&'a self, key_order: &'a [String]) -> Vec<(&'a str, &'a ScalarValue)> {
        let mut out: Vec<(&str, &ScalarValue)> = key_order
            .iter()
            .filter_map(|key| self.get(key).map(|v| (key.as_str(), v)))
            .collect();
        for (key, value) in self.iter() {
            if !key_order.iter().any(|k| k == key) {
                out.push((key, value));
            }
        }
        out
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a flat map of scalar values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut record = Record::new();
                while let Some((key, value)) = access.next_entry::<String, ScalarValue>()? {
                    record.set(key, value);
                }
                Ok(record)
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

/// Normalize a list of records for comparison and rendering.
pub fn normalize_records(records: &[Record]) -> Vec<Record> {
    records
        .iter()
        .map(Record::normalized)
        .filter(|r| !r.is_empty())
        .collect()
}

/// Parse the inline text of a scalar (comment already stripped).
///
/// Returns `None` for YAML null (`~`, `null`, empty) and for text that is
/// not a single well-formed scalar.
pub fn parse_scalar(raw: &str) -> Option<ScalarValue> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('"') {
        let (value, consumed) = unquote_double(rest)?;
        return rest[consumed..]
            .trim()
            .is_empty()
            .then_some(ScalarValue::String(value));
    }
    if let Some(rest) = raw.strip_prefix('\'') {
        let (value, consumed) = unquote_single(rest)?;
        return rest[consumed..]
            .trim()
            .is_empty()
            .then_some(ScalarValue::String(value));
    }

    match raw {
        "" | "~" | "null" | "Null" | "NULL" => None,
        "true" | "True" | "TRUE" => Some(ScalarValue::Bool(true)),
        "false" | "False" | "FALSE" => Some(ScalarValue::Bool(false)),
        ".inf" | "+.inf" | ".Inf" => Some(ScalarValue::Float(f64::INFINITY)),
        "-.inf" | "-.Inf" => Some(ScalarValue::Float(f64::NEG_INFINITY)),
        ".nan" | ".NaN" => Some(ScalarValue::Float(f64::NAN)),
        _ => Some(parse_number(raw).unwrap_or_else(|| ScalarValue::String(raw.to_string()))),
    }
}

fn parse_number(raw: &str) -> Option<ScalarValue> {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    if digits.is_empty() || !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().map(ScalarValue::Integer);
    }
    let numeric = digits
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'-' | b'+'));
    if numeric && digits.bytes().any(|b| b.is_ascii_digit()) {
        return raw.parse::<f64>().ok().map(ScalarValue::Float);
    }
    None
}

/// Decode a double-quoted scalar body; returns the value and the bytes
/// consumed including the closing quote.
pub(crate) fn unquote_double(rest: &str) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '"' => return Some((out, idx + 1)),
            '\\' => {
                let (_, next) = chars.next()?;
                out.push(match next {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            other => out.push(other),
        }
    }
    None
}

/// Decode a single-quoted scalar body (`''` escapes a quote).
pub(crate) fn unquote_single(rest: &str) -> Option<(String, usize)> {
    let mut out = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        if ch == '\'' {
            if matches!(chars.peek(), Some((_, '\''))) {
                chars.next();
                out.push('\'');
                continue;
            }
            return Some((out, idx + 1));
        }
        out.push(ch);
    }
    None
}

fn render_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_string()
    } else if f.is_infinite() {
        let inf = if f > 0.0 { ".inf" } else { "-.inf" };
        inf.to_string()
    } else if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

/// Whether a bare string would be misread or break the line structure.
pub fn needs_quoting(s: &str) -> bool {
    if s.is_empty() || s.trim() != s {
        return true;
    }
    if s.contains(':') || s.contains('#') || s.chars().any(|c| c.is_control()) {
        return true;
    }
    if s.starts_with([
        '-', '?', ',', '[', ']', '{', '}', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`',
    ]) {
        return true;
    }
    !matches!(parse_scalar(s), Some(ScalarValue::String(ref parsed)) if parsed == s)
}

pub fn render_string(s: &str) -> String {
    if !needs_quoting(s) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Mapping keys follow the same quoting rule as string values.
pub fn render_key(key: &str) -> String {
    render_string(key)
}

/// Block lines for a string array, relative to the sequence indent.
pub fn render_string_array(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| format!("- {}", render_string(item)))
        .collect()
}

/// Block lines for an object array. Blank subkeys and records left empty
/// after dropping them are omitted.
pub fn render_object_array(items: &[Record], key_order: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    for record in normalize_records(items) {
        for (idx, (key, value)) in record.ordered(key_order).into_iter().enumerate() {
            let lead = if idx == 0 { "- " } else { "  " };
            lines.push(format!("{lead}{}: {}", render_key(key), value.render()));
        }
    }
    lines
}
