use crate::yaml::operations::{KeyOrderMap, PatchSet};
use crate::yaml::path::YamlPath;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

/// Static description of the document a session edits.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Schema {
    #[serde(default)]
    pub key_order: KeyOrderMap,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub templates: Vec<TemplateGroupSpec>,
    #[serde(default)]
    pub identity_groups: Vec<IdentityGroupSpec>,
}

impl Schema {
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// The template group a field belongs to, if any.
    pub fn template_for(&self, field_id: &str) -> Option<&TemplateGroupSpec> {
        self.templates
            .iter()
            .find(|t| t.fields.iter().any(|f| f == field_id))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let mut ids: HashSet<&str> = HashSet::new();

        for field in &self.fields {
            if field.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    owner: None,
                    field: "fields.id",
                });
            } else if !ids.insert(&field.id) {
                issues.push(ValidationIssue::DuplicateId {
                    id: field.id.clone(),
                });
            }
            check_path(&mut issues, &field.id, &field.path);
            if field.item_key_order.is_some() && field.kind != FieldKind::Records {
                issues.push(ValidationIssue::InvalidCombo {
                    owner: Some(field.id.clone()),
                    message: "item_key_order only applies to records fields".to_string(),
                });
            }
        }

        let mut claimed: HashSet<&str> = HashSet::new();
        for template in &self.templates {
            if template.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    owner: None,
                    field: "templates.id",
                });
            }
            if template.root_key.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    owner: Some(template.id.clone()),
                    field: "root_key",
                });
            }
            if template.start_marker.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    owner: Some(template.id.clone()),
                    field: "start_marker",
                });
            }
            if template.end_marker.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    owner: Some(template.id.clone()),
                    field: "end_marker",
                });
            }

            for field_id in &template.fields {
                let Some(field) = self.field(field_id) else {
                    issues.push(ValidationIssue::UnknownField {
                        owner: template.id.clone(),
                        field: field_id.clone(),
                    });
                    continue;
                };
                if !claimed.insert(field_id) {
                    issues.push(ValidationIssue::InvalidCombo {
                        owner: Some(template.id.clone()),
                        message: format!("field '{field_id}' belongs to more than one template"),
                    });
                }
                let under_root = field.yaml_path().is_some_and(|path| {
                    path.len() > 1 && path.parts()[0] == template.root_key
                });
                if !under_root {
                    issues.push(ValidationIssue::InvalidCombo {
                        owner: Some(template.id.clone()),
                        message: format!(
                            "field '{field_id}' is not under root key '{}'",
                            template.root_key
                        ),
                    });
                }
            }
        }

        let mut group_ids: HashSet<&str> = HashSet::new();
        for group in &self.identity_groups {
            if group.id.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    owner: None,
                    field: "identity_groups.id",
                });
            } else if !group_ids.insert(&group.id) {
                issues.push(ValidationIssue::DuplicateId {
                    id: group.id.clone(),
                });
            }
            check_path(&mut issues, &group.id, &group.parent);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

fn check_path(issues: &mut Vec<ValidationIssue>, owner: &str, path: &str) {
    match YamlPath::parse(path) {
        Ok(parsed) if parsed.is_root() => issues.push(ValidationIssue::InvalidPath {
            owner: owner.to_string(),
            path: path.to_string(),
            message: "path must name a key".to_string(),
        }),
        Ok(_) => {}
        Err(err) => issues.push(ValidationIssue::InvalidPath {
            owner: owner.to_string(),
            path: path.to_string(),
            message: err.to_string(),
        }),
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    Bool,
    Number,
    List,
    Enum,
    Records,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FieldSpec {
    pub id: String,
    pub path: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub item_key_order: Option<Vec<String>>,
    /// Value the field shows when its key is absent
    #[serde(default)]
    pub default: Option<String>,
}

impl FieldSpec {
    pub fn yaml_path(&self) -> Option<YamlPath> {
        YamlPath::parse(&self.path).ok().filter(|p| !p.is_root())
    }
}

/// A block that may only exist as a commented example until first saved.
#[derive(Debug, Deserialize, Clone)]
pub struct TemplateGroupSpec {
    pub id: String,
    pub root_key: String,
    pub start_marker: String,
    pub end_marker: String,
    /// Field ids living under `root_key`
    #[serde(default)]
    pub fields: Vec<String>,
}

/// A mapping of `identity -> [records]` edited as rows.
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityGroupSpec {
    pub id: String,
    pub parent: String,
    #[serde(default)]
    pub item_key_order: Option<Vec<String>>,
}

impl IdentityGroupSpec {
    pub fn parent_path(&self) -> Option<YamlPath> {
        YamlPath::parse(&self.parent).ok().filter(|p| !p.is_root())
    }
}

/// Structural checks for a patch file.
pub fn validate_patch_set(set: &PatchSet) -> Result<(), ValidationError> {
    let mut issues = Vec::new();

    if set.is_empty() {
        issues.push(ValidationIssue::EmptyPatchList);
    }
    for patch in &set.patches {
        if patch.path.is_root() {
            issues.push(ValidationIssue::InvalidPath {
                owner: "patches".to_string(),
                path: String::new(),
                message: "path must name a key".to_string(),
            });
        }
    }
    for template in &set.templates {
        for (field, value) in [
            ("root_key", &template.root_key),
            ("start_marker", &template.start_marker),
            ("end_marker", &template.end_marker),
        ] {
            if value.trim().is_empty() {
                issues.push(ValidationIssue::MissingField {
                    owner: Some(template.root_key.clone()).filter(|k| !k.is_empty()),
                    field,
                });
            }
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { issues })
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone)]
pub enum ValidationIssue {
    EmptyPatchList,
    MissingField {
        owner: Option<String>,
        field: &'static str,
    },
    DuplicateId {
        id: String,
    },
    InvalidPath {
        owner: String,
        path: String,
        message: String,
    },
    UnknownField {
        owner: String,
        field: String,
    },
    InvalidCombo {
        owner: Option<String>,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyPatchList => write!(f, "patch file contains no patches"),
            ValidationIssue::MissingField { owner, field } => match owner {
                Some(id) => write!(f, "'{id}' missing required field '{field}'"),
                None => write!(f, "missing required field '{field}'"),
            },
            ValidationIssue::DuplicateId { id } => write!(f, "duplicate id '{id}'"),
            ValidationIssue::InvalidPath {
                owner,
                path,
                message,
            } => write!(f, "'{owner}' has invalid path '{path}': {message}"),
            ValidationIssue::UnknownField { owner, field } => {
                write!(f, "'{owner}' references unknown field '{field}'")
            }
            ValidationIssue::InvalidCombo { owner, message } => match owner {
                Some(id) => write!(f, "'{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid configuration: {message}"),
            },
        }
    }
}
