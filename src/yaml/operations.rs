use crate::yaml::path::YamlPath;
use crate::yaml::value::{Record, ScalarValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One structural change at a path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub path: YamlPath,
    #[serde(rename = "operation")]
    pub op: PatchOp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PatchOp {
    SetScalar {
        value: ScalarValue,
    },
    SetStringArray {
        items: Vec<String>,
    },
    SetObjectArray {
        items: Vec<Record>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_key_order: Option<Vec<String>>,
    },
    SetEnum {
        value: String,
    },
    Delete,
}

impl Patch {
    pub fn set_scalar(path: YamlPath, value: impl Into<ScalarValue>) -> Self {
        Self {
            path,
            op: PatchOp::SetScalar {
                value: value.into(),
            },
        }
    }

    pub fn set_string_array(path: YamlPath, items: Vec<String>) -> Self {
        Self {
            path,
            op: PatchOp::SetStringArray { items },
        }
    }

    pub fn set_object_array(
        path: YamlPath,
        items: Vec<Record>,
        item_key_order: Option<Vec<String>>,
    ) -> Self {
        Self {
            path,
            op: PatchOp::SetObjectArray {
                items,
                item_key_order,
            },
        }
    }

    pub fn set_enum(path: YamlPath, value: impl Into<String>) -> Self {
        Self {
            path,
            op: PatchOp::SetEnum {
                value: value.into(),
            },
        }
    }

    pub fn delete(path: YamlPath) -> Self {
        Self {
            path,
            op: PatchOp::Delete,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.op, PatchOp::Delete)
    }
}

/// Materialize a commented example section as a real block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatePatch {
    pub root_key: String,
    /// Body-only YAML for the block, unindented
    pub snippet: String,
    pub start_marker: String,
    pub end_marker: String,
}

/// Everything one save writes: template expansions first, then patches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchSet {
    #[serde(default)]
    pub templates: Vec<TemplatePatch>,
    #[serde(default)]
    pub patches: Vec<Patch>,
}

impl PatchSet {
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty() && self.patches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.templates.len() + self.patches.len()
    }
}

/// Canonical child-key order per parent path (`""` is the root).
///
/// Only consulted when a key is inserted; existing keys are never moved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyOrderMap {
    orders: BTreeMap<String, Vec<String>>,
}

impl KeyOrderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, parent: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orders
            .insert(parent.to_string(), keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn order_for(&self, parent: &YamlPath) -> Option<&[String]> {
        self.orders.get(&parent.as_string()).map(Vec::as_slice)
    }

    /// Position of `key` in its parent's canonical order.
    pub fn rank(&self, parent: &YamlPath, key: &str) -> Option<usize> {
        self.order_for(parent)?.iter().position(|k| k == key)
    }

    /// Orders below `base`, re-keyed relative to it.
    pub fn subtree(&self, base: &YamlPath) -> KeyOrderMap {
        let orders = self
            .orders
            .iter()
            .filter_map(|(parent, keys)| {
                let parent = YamlPath::parse(parent).ok()?;
                let relative = parent.strip_prefix(base)?;
                Some((relative.as_string(), keys.clone()))
            })
            .collect();
        KeyOrderMap { orders }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_and_subtree() {
        let map = KeyOrderMap::new()
            .with("", ["host", "port", "tls"])
            .with("ampcode", ["upstream-url", "upstream-api-key"]);
        assert_eq!(map.rank(&YamlPath::root(), "port"), Some(1));
        assert_eq!(map.rank(&YamlPath::root(), "other"), None);

        let sub = map.subtree(&YamlPath::parse("ampcode").unwrap());
        assert_eq!(sub.rank(&YamlPath::root(), "upstream-api-key"), Some(1));
        assert!(sub.order_for(&YamlPath::parse("host").unwrap()).is_none());
    }
}
