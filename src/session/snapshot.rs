//! Typed view of the document: one value per schema field and one row list
//! per identity group.

use crate::config::schema::{FieldKind, FieldSpec, Schema, TemplateGroupSpec};
use crate::yaml::path::YamlPath;
use crate::yaml::reader::{get_object_array, get_scalar, get_string_array, list_map_keys};
use crate::yaml::snippet::{
    extract_comment_section, extract_top_level_block, normalize_snippet_to_root,
};
use crate::yaml::value::{normalize_records, Record, ScalarValue};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    /// Kept as typed so a half-entered number survives until save
    Number(String),
    /// Newline or comma separated items, as typed
    List(String),
    Enum(String),
    Records(Vec<Record>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldInputError {
    #[error("'{0}' is not a boolean")]
    NotABool(String),
    #[error("invalid records JSON: {0}")]
    Records(String),
}

impl FieldValue {
    /// Value shown for a field whose key is absent.
    pub fn default_for(spec: &FieldSpec) -> FieldValue {
        let default = spec.default.clone().unwrap_or_default();
        match spec.kind {
            FieldKind::Text => FieldValue::Text(default),
            FieldKind::Bool => FieldValue::Bool(parse_bool(&default).unwrap_or(false)),
            FieldKind::Number => FieldValue::Number(default),
            FieldKind::List => FieldValue::List(default),
            FieldKind::Enum => FieldValue::Enum(default),
            FieldKind::Records => FieldValue::Records(Vec::new()),
        }
    }

    /// Parse user input for a field of `kind`. Records are given as JSON.
    pub fn from_input(kind: FieldKind, raw: &str) -> Result<FieldValue, FieldInputError> {
        Ok(match kind {
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Bool => FieldValue::Bool(
                parse_bool(raw).ok_or_else(|| FieldInputError::NotABool(raw.to_string()))?,
            ),
            FieldKind::Number => FieldValue::Number(raw.to_string()),
            FieldKind::List => FieldValue::List(raw.to_string()),
            FieldKind::Enum => FieldValue::Enum(raw.to_string()),
            FieldKind::Records => FieldValue::Records(
                serde_json::from_str(raw).map_err(|e| FieldInputError::Records(e.to_string()))?,
            ),
        })
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Number(s) | FieldValue::Enum(s) => f.write_str(s),
            FieldValue::List(s) => f.write_str(&s.replace('\n', ", ")),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Records(records) => write!(f, "{} record(s)", records.len()),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "True" | "TRUE" | "yes" | "on" | "1" => Some(true),
        "false" | "False" | "FALSE" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// One entry of an identity-keyed group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityRow {
    pub identity: String,
    /// Identity at load time; `None` for rows added since
    pub original: Option<String>,
    pub records: Vec<Record>,
}

impl IdentityRow {
    pub fn new(identity: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            identity: identity.into(),
            original: None,
            records,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub fields: BTreeMap<String, FieldValue>,
    pub groups: BTreeMap<String, Vec<IdentityRow>>,
}

impl Snapshot {
    pub fn field(&self, id: &str) -> Option<&FieldValue> {
        self.fields.get(id)
    }

    /// Replace a field's value. Returns `false` for an unknown id.
    pub fn set(&mut self, id: &str, value: FieldValue) -> bool {
        match self.fields.get_mut(id) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn rows(&self, group: &str) -> &[IdentityRow] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn rows_mut(&mut self, group: &str) -> Option<&mut Vec<IdentityRow>> {
        self.groups.get_mut(group)
    }
}

/// Read every schema field and identity group out of `text`.
pub fn load_snapshot(text: &str, schema: &Schema) -> Snapshot {
    let sources: Vec<(&TemplateGroupSpec, String)> = schema
        .templates
        .iter()
        .filter_map(|template| template_source(text, template).map(|src| (template, src)))
        .collect();

    let mut snapshot = Snapshot::default();
    for field in &schema.fields {
        let source = sources
            .iter()
            .find(|(template, _)| template.fields.contains(&field.id))
            .map_or(text, |(_, src)| src.as_str());
        snapshot
            .fields
            .insert(field.id.clone(), read_field(source, field));
    }

    for group in &schema.identity_groups {
        let Some(parent) = group.parent_path() else {
            continue;
        };
        // Keys whose body is not a readable list of records are left alone
        let rows = list_map_keys(text, &parent)
            .into_iter()
            .filter_map(|identity| {
                let records = get_object_array(text, &parent.child(identity.clone()))
                    .filter(|records| !normalize_records(records).is_empty())?;
                Some(IdentityRow {
                    original: Some(identity.clone()),
                    identity,
                    records,
                })
            })
            .collect();
        snapshot.groups.insert(group.id.clone(), rows);
    }

    snapshot
}

/// Synthetic document for a template whose root key is not live yet.
fn template_source(text: &str, template: &TemplateGroupSpec) -> Option<String> {
    if !extract_top_level_block(text, &template.root_key).is_empty() {
        return None;
    }
    let section = extract_comment_section(text, &template.start_marker, &template.end_marker);
    if section.is_empty() {
        return None;
    }
    Some(normalize_snippet_to_root(&section, &template.root_key))
}

fn read_field(text: &str, field: &FieldSpec) -> FieldValue {
    let Some(path) = field.yaml_path() else {
        return FieldValue::default_for(field);
    };
    read_at(text, &path, field).unwrap_or_else(|| FieldValue::default_for(field))
}

fn read_at(text: &str, path: &YamlPath, field: &FieldSpec) -> Option<FieldValue> {
    Some(match field.kind {
        FieldKind::Text => FieldValue::Text(get_scalar(text, path)?.to_display_string()),
        FieldKind::Bool => FieldValue::Bool(get_scalar(text, path)?.as_bool()?),
        FieldKind::Number => match get_scalar(text, path)? {
            value @ (ScalarValue::Integer(_) | ScalarValue::Float(_)) => {
                FieldValue::Number(value.to_display_string())
            }
            _ => return None,
        },
        FieldKind::List => FieldValue::List(get_string_array(text, path)?.join("\n")),
        FieldKind::Enum => FieldValue::Enum(get_scalar(text, path)?.to_display_string()),
        FieldKind::Records => FieldValue::Records(get_object_array(text, path)?),
    })
}
