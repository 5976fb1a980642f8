//! Typed getters at a dotted path.
//!
//! Readers never fail: a missing key, a malformed line or a value of the
//! wrong shape all read as absent, and the caller falls back to its default.

use crate::yaml::path::YamlPath;
use crate::yaml::scan::{Child, Document, LineKind, Lookup, Shape};
use crate::yaml::value::{parse_scalar, Record, ScalarValue};

pub fn get_scalar(text: &str, path: &YamlPath) -> Option<ScalarValue> {
    let doc = Document::scan(text);
    let child = found(&doc, path)?;
    scalar_of(&doc, &child)
}

pub fn get_string_array(text: &str, path: &YamlPath) -> Option<Vec<String>> {
    let doc = Document::scan(text);
    let child = found(&doc, path)?;
    string_array_of(&doc, &child)
}

pub fn get_object_array(text: &str, path: &YamlPath) -> Option<Vec<Record>> {
    let doc = Document::scan(text);
    let child = found(&doc, path)?;
    object_array_of(&doc, &child)
}

/// Keys of the mapping at `path`, in document order. Empty when the path
/// is absent or does not hold a mapping.
pub fn list_map_keys(text: &str, path: &YamlPath) -> Vec<String> {
    let doc = Document::scan(text);
    let Ok(Some(mapping)) = doc.mapping_at(path) else {
        return Vec::new();
    };
    let mut keys: Vec<String> = Vec::with_capacity(mapping.children.len());
    for child in mapping.children {
        if !keys.contains(&child.key) {
            keys.push(child.key);
        }
    }
    keys
}

/// Whether `path` resolves to an existing key.
pub fn has_path(text: &str, path: &YamlPath) -> bool {
    found(&Document::scan(text), path).is_some()
}

fn found(doc: &Document<'_>, path: &YamlPath) -> Option<Child> {
    match doc.lookup(path).ok()? {
        Lookup::Found { child, .. } => Some(child),
        Lookup::Missing { .. } => None,
    }
}

pub(crate) fn scalar_of(doc: &Document<'_>, child: &Child) -> Option<ScalarValue> {
    if child.last != child.line {
        return None;
    }
    let raw = doc.inline_value(child)?;
    if raw.starts_with(['|', '>', '[', '{']) {
        return None;
    }
    parse_scalar(raw)
}

pub(crate) fn string_array_of(doc: &Document<'_>, child: &Child) -> Option<Vec<String>> {
    if let Some(raw) = doc.inline_value(child) {
        return (raw.trim() == "[]").then(Vec::new);
    }

    let Shape::Sequence(level) = doc.shape(child.line + 1, child.last + 1).ok()? else {
        return None;
    };

    let mut items = Vec::new();
    for idx in child.line + 1..=child.last {
        let line = doc.line(idx);
        match &line.kind {
            LineKind::Blank | LineKind::Comment => {}
            LineKind::Item(item) if line.indent == level && item.entry.is_none() => {
                if let Some(value) = item.value.and_then(|span| parse_scalar(doc.slice(span))) {
                    items.push(value.to_display_string());
                }
            }
            _ => return None,
        }
    }
    Some(items)
}

pub(crate) fn object_array_of(doc: &Document<'_>, child: &Child) -> Option<Vec<Record>> {
    if let Some(raw) = doc.inline_value(child) {
        return (raw.trim() == "[]").then(Vec::new);
    }

    let Shape::Sequence(level) = doc.shape(child.line + 1, child.last + 1).ok()? else {
        return None;
    };

    let mut records: Vec<Record> = Vec::new();
    // Column of the keys inside the current item
    let mut column: Option<usize> = None;

    for idx in child.line + 1..=child.last {
        let line = doc.line(idx);
        match &line.kind {
            LineKind::Blank | LineKind::Comment => {}
            LineKind::Item(item) if line.indent == level => {
                if item.value.is_some() {
                    return None;
                }
                let mut record = Record::new();
                column = match &item.entry {
                    Some(entry) => {
                        if entry.value.is_none() {
                            return None;
                        }
                        if let Some(value) = entry.value.and_then(|s| parse_scalar(doc.slice(s))) {
                            record.set(entry.key.clone(), value);
                        }
                        Some(entry.key_start - line.start)
                    }
                    None => None,
                };
                records.push(record);
            }
            LineKind::Entry(entry) if line.indent > level => {
                let col = *column.get_or_insert(line.indent);
                if line.indent != col || entry.value.is_none() {
                    return None;
                }
                let record = records.last_mut()?;
                if let Some(value) = entry.value.and_then(|s| parse_scalar(doc.slice(s))) {
                    record.set(entry.key.clone(), value);
                }
            }
            _ => return None,
        }
    }
    Some(records)
}
