//! Per-field comparison of the current snapshot against the baseline.

use crate::config::schema::FieldSpec;
use crate::session::snapshot::FieldValue;
use crate::yaml::operations::PatchOp;
use crate::yaml::value::{normalize_records, ScalarValue};

/// The operation that takes a field from `baseline` to `current`, or
/// `None` when nothing needs to be written.
pub fn diff_field(spec: &FieldSpec, baseline: &FieldValue, current: &FieldValue) -> Option<PatchOp> {
    match current {
        FieldValue::Text(value) => {
            if matches!(baseline, FieldValue::Text(old) if old == value) {
                return None;
            }
            Some(if value.is_empty() {
                PatchOp::Delete
            } else {
                PatchOp::SetScalar {
                    value: ScalarValue::string(value.clone()),
                }
            })
        }
        FieldValue::Bool(value) => {
            if matches!(baseline, FieldValue::Bool(old) if old == value) {
                return None;
            }
            Some(PatchOp::SetScalar {
                value: ScalarValue::Bool(*value),
            })
        }
        FieldValue::Number(value) => {
            let trimmed = value.trim();
            if matches!(baseline, FieldValue::Number(old) if old.trim() == trimmed) {
                return None;
            }
            if trimmed.is_empty() {
                return None;
            }
            match parse_number(trimmed) {
                Some(value) => Some(PatchOp::SetScalar { value }),
                None => {
                    tracing::warn!(field = %spec.id, value = %trimmed, "ignoring non-numeric value");
                    None
                }
            }
        }
        FieldValue::List(raw) => {
            let items = split_list(raw);
            if matches!(baseline, FieldValue::List(old) if split_list(old) == items) {
                return None;
            }
            Some(if items.is_empty() {
                PatchOp::Delete
            } else {
                PatchOp::SetStringArray { items }
            })
        }
        FieldValue::Enum(value) => {
            if matches!(baseline, FieldValue::Enum(old) if old == value) {
                return None;
            }
            Some(if value.is_empty() {
                PatchOp::Delete
            } else {
                PatchOp::SetEnum {
                    value: value.clone(),
                }
            })
        }
        FieldValue::Records(records) => {
            let items = normalize_records(records);
            if matches!(baseline, FieldValue::Records(old) if normalize_records(old) == items) {
                return None;
            }
            Some(if items.is_empty() {
                PatchOp::Delete
            } else {
                PatchOp::SetObjectArray {
                    items,
                    item_key_order: spec.item_key_order.clone(),
                }
            })
        }
    }
}

/// The set operation rendering a non-default value, used for template
/// snippets. Default and emptied values render nothing.
pub fn content_op(spec: &FieldSpec, current: &FieldValue) -> Option<PatchOp> {
    match diff_field(spec, &FieldValue::default_for(spec), current)? {
        PatchOp::Delete => None,
        op => Some(op),
    }
}

/// Split a list field on newlines and commas, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(['\n', ','])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(raw: &str) -> Option<ScalarValue> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(ScalarValue::Integer(int));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(ScalarValue::Float)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::FieldKind;
    use crate::yaml::value::Record;

    fn spec(kind: FieldKind) -> FieldSpec {
        FieldSpec {
            id: "f".to_string(),
            path: "f".to_string(),
            kind,
            item_key_order: None,
            default: None,
        }
    }

    #[test]
    fn emptied_text_deletes() {
        let op = diff_field(
            &spec(FieldKind::Text),
            &FieldValue::Text("a".into()),
            &FieldValue::Text(String::new()),
        );
        assert_eq!(op, Some(PatchOp::Delete));
    }

    #[test]
    fn numbers_compare_trimmed_and_skip_garbage() {
        let s = spec(FieldKind::Number);
        let base = FieldValue::Number("8317".into());
        assert_eq!(diff_field(&s, &base, &FieldValue::Number(" 8317 ".into())), None);
        assert_eq!(diff_field(&s, &base, &FieldValue::Number(String::new())), None);
        assert_eq!(diff_field(&s, &base, &FieldValue::Number("abc".into())), None);
        assert_eq!(
            diff_field(&s, &base, &FieldValue::Number("0.5".into())),
            Some(PatchOp::SetScalar {
                value: ScalarValue::Float(0.5)
            })
        );
    }

    #[test]
    fn lists_resplit_before_comparing() {
        let s = spec(FieldKind::List);
        let base = FieldValue::List("a\nb".into());
        assert_eq!(diff_field(&s, &base, &FieldValue::List("a, b,\n".into())), None);
        assert_eq!(
            diff_field(&s, &base, &FieldValue::List(" , ".into())),
            Some(PatchOp::Delete)
        );
    }

    #[test]
    fn records_compare_normalized() {
        let s = spec(FieldKind::Records);
        let base = FieldValue::Records(vec![Record::new().with("name", "a")]);
        let same = FieldValue::Records(vec![
            Record::new().with("name", "a").with("fork", false),
            Record::new().with("note", ""),
        ]);
        assert_eq!(diff_field(&s, &base, &same), None);
        assert_eq!(
            diff_field(&s, &base, &FieldValue::Records(Vec::new())),
            Some(PatchOp::Delete)
        );
    }

    #[test]
    fn defaults_have_no_content() {
        let mut s = spec(FieldKind::Bool);
        assert_eq!(content_op(&s, &FieldValue::Bool(false)), None);
        s.default = Some("true".to_string());
        assert!(content_op(&s, &FieldValue::Bool(false)).is_some());
    }
}
