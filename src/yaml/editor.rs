//! Applying structural patches to YAML text.
//!
//! Each patch resolves against a fresh scan of the current buffer and
//! compiles to a single [`Edit`]. Nothing outside that edit's span changes.

use crate::edit::{Edit, EditResult};
use crate::yaml::errors::{ResolveError, YamlError};
use crate::yaml::operations::{KeyOrderMap, Patch, PatchOp};
use crate::yaml::path::YamlPath;
use crate::yaml::reader::{has_path, object_array_of, scalar_of, string_array_of};
use crate::yaml::scan::{Child, Document, LineKind, Lookup, MappingBlock};
use crate::yaml::validator::validate_document;
use crate::yaml::value::{
    normalize_records, render_key, render_object_array, render_string, render_string_array,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YamlPlan {
    Edit(Edit),
    NoOp(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PatchOutcome {
    Applied,
    NoOp { reason: String },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    pub path: YamlPath,
    #[serde(flatten)]
    pub outcome: PatchOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub text: String,
    pub outcomes: Vec<PatchReport>,
}

impl ApplyReport {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, PatchOutcome::Applied))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PatchOutcome::Skipped { .. }))
    }

    pub fn noops(&self) -> usize {
        self.count(|o| matches!(o, PatchOutcome::NoOp { .. }))
    }

    fn count(&self, pred: impl Fn(&PatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Apply `patches` in order; each one sees the previous result.
///
/// Reapplying the same list is a no-op when it holds at most one patch per
/// path, which is what [`build_patches`](crate::session::build_patches)
/// emits. A delete followed by a set of the same key re-inserts it by rank
/// each time.
///
/// Only a document whose top-level structure cannot be decided is a hard
/// error. A patch that cannot be resolved is skipped and reported.
pub fn apply_patches(
    text: &str,
    patches: &[Patch],
    key_order: &KeyOrderMap,
) -> Result<ApplyReport, YamlError> {
    let mut report = ApplyReport {
        text: text.to_string(),
        outcomes: Vec::with_capacity(patches.len()),
    };
    if patches.is_empty() {
        return Ok(report);
    }

    validate_document(text)?;

    for patch in patches {
        let planned = YamlEditor::new(&report.text).plan(patch, key_order);
        let outcome = match planned {
            Ok(YamlPlan::Edit(edit)) => match edit.apply(&report.text)? {
                EditResult::Applied { text, .. } => {
                    tracing::debug!(path = %patch.path, "applied patch");
                    report.text = text;
                    PatchOutcome::Applied
                }
                EditResult::AlreadyApplied => PatchOutcome::NoOp {
                    reason: "span already holds the new text".to_string(),
                },
            },
            Ok(YamlPlan::NoOp(reason)) => {
                tracing::debug!(path = %patch.path, %reason, "patch is a no-op");
                PatchOutcome::NoOp { reason }
            }
            Err(err) => {
                tracing::warn!(path = %patch.path, error = %err, "skipping patch");
                PatchOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
        };
        report.outcomes.push(PatchReport {
            path: patch.path.clone(),
            outcome,
        });
    }

    Ok(report)
}

/// A value rendered for insertion: inline after `key:`, or as block lines
/// relative to the key's body indentation.
enum Rendered {
    Inline(String),
    Block(Vec<String>),
}

impl Rendered {
    fn of(op: &PatchOp) -> Option<Self> {
        Some(match op {
            PatchOp::SetScalar { value } => Rendered::Inline(value.render()),
            PatchOp::SetEnum { value } => Rendered::Inline(render_string(value)),
            PatchOp::SetStringArray { items } => block_or_empty(render_string_array(items)),
            PatchOp::SetObjectArray {
                items,
                item_key_order,
            } => block_or_empty(render_object_array(
                items,
                item_key_order.as_deref().unwrap_or_default(),
            )),
            PatchOp::Delete => return None,
        })
    }
}

fn block_or_empty(lines: Vec<String>) -> Rendered {
    if lines.is_empty() {
        Rendered::Inline("[]".to_string())
    } else {
        Rendered::Block(lines)
    }
}

pub struct YamlEditor<'a> {
    doc: Document<'a>,
}

impl<'a> YamlEditor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            doc: Document::scan(text),
        }
    }

    fn text(&self) -> &'a str {
        self.doc.text()
    }

    pub fn plan(&self, patch: &Patch, key_order: &KeyOrderMap) -> Result<YamlPlan, ResolveError> {
        if patch.path.is_root() {
            return Err(ResolveError::RootPath);
        }

        let plan = match Rendered::of(&patch.op) {
            Some(rendered) => self.plan_set(patch, &rendered, key_order)?,
            None => self.plan_delete(&patch.path)?,
        };

        if let YamlPlan::Edit(edit) = &plan {
            self.validate_edit(edit, patch)?;
        }
        Ok(plan)
    }

    fn plan_set(
        &self,
        patch: &Patch,
        rendered: &Rendered,
        key_order: &KeyOrderMap,
    ) -> Result<YamlPlan, ResolveError> {
        match self.doc.lookup(&patch.path)? {
            Lookup::Found { child, .. } => {
                if reads_back(&self.doc, &child, &patch.op) {
                    return Ok(YamlPlan::NoOp(format!(
                        "value already matches: {}",
                        patch.path
                    )));
                }
                self.replace_value(&patch.path, &child, rendered)
                    .map(|edit| YamlPlan::Edit(self.match_line_endings(edit)))
            }
            Lookup::Missing { mapping, depth } => {
                let chain = &patch.path.parts()[depth..];
                self.insert_chain(&mapping, chain, rendered, key_order)
                    .map(|edit| YamlPlan::Edit(self.match_line_endings(edit)))
            }
        }
    }

    /// New lines are built with `\n`; a CRLF document gets CRLF.
    fn match_line_endings(&self, mut edit: Edit) -> Edit {
        if uses_crlf(self.text()) {
            edit.new_text = edit.new_text.replace('\n', "\r\n");
        }
        edit
    }

    fn replace_value(
        &self,
        path: &YamlPath,
        child: &Child,
        rendered: &Rendered,
    ) -> Result<Edit, ResolveError> {
        let text = self.text();
        let entry = self.doc.entry(child.line).ok_or_else(|| ResolveError::Unsupported {
            path: path.as_string(),
        })?;

        // Inline scalar in place: only the value span changes
        if let (Some(span), Rendered::Inline(value), true) =
            (entry.value, rendered, child.last == child.line)
        {
            return Ok(Edit::new(
                span.start,
                span.end,
                value.clone(),
                &text[span.start..span.end],
            ));
        }

        let key_line = self.doc.line(child.line);
        let comment = entry
            .comment
            .map(|c| format!(" {}", text[c..key_line.end].trim_end()))
            .unwrap_or_default();

        let new_text = match rendered {
            Rendered::Inline(value) => format!(" {value}{comment}"),
            Rendered::Block(lines) => {
                let indent = self
                    .body_indent(child)
                    .unwrap_or(key_line.indent + 2);
                format!("{comment}\n{}", indent_lines(lines, indent))
            }
        };

        let start = entry.colon + 1;
        let end = self.doc.line(child.last).end;
        Ok(Edit::new(start, end, new_text, &text[start..end]))
    }

    /// Indentation of the first content line under a key.
    fn body_indent(&self, child: &Child) -> Option<usize> {
        (child.line + 1..=child.last)
            .map(|idx| self.doc.line(idx))
            .find(|line| !matches!(line.kind, LineKind::Blank | LineKind::Comment))
            .map(|line| line.indent)
    }

    fn insert_chain(
        &self,
        mapping: &MappingBlock,
        chain: &[String],
        rendered: &Rendered,
        key_order: &KeyOrderMap,
    ) -> Result<Edit, ResolveError> {
        let text = self.text();
        let base = match (mapping.indent, mapping.owner) {
            (Some(indent), _) => indent,
            (None, Some(owner)) => self.doc.line(owner).indent + 2,
            (None, None) => 0,
        };
        let block = render_chain(chain, rendered, base);

        // Empty mapping under a key: open it into a block
        if let (Some(owner), true) = (mapping.owner, mapping.children.is_empty()) {
            let line = self.doc.line(owner);
            let entry = self.doc.entry(owner).ok_or_else(|| ResolveError::Unsupported {
                path: mapping.path.as_string(),
            })?;
            let comment = entry
                .comment
                .map(|c| format!(" {}", text[c..line.end].trim_end()))
                .unwrap_or_default();
            let start = entry.colon + 1;
            return Ok(Edit::new(
                start,
                line.end,
                format!("{comment}\n{block}"),
                &text[start..line.end],
            ));
        }

        // Empty document, or nothing but comments and blanks
        let Some(last_child) = mapping.children.last() else {
            let lead = if text.is_empty() || text.ends_with('\n') {
                ""
            } else {
                "\n"
            };
            return Ok(Edit::insert(text.len(), format!("{lead}{block}\n")));
        };

        let key = &chain[0];
        let later_sibling = key_order.rank(&mapping.path, key).and_then(|rank| {
            mapping.children.iter().find(|c| {
                key_order
                    .rank(&mapping.path, &c.key)
                    .is_some_and(|other| other > rank)
            })
        });

        match later_sibling {
            Some(sibling) => {
                let anchor = self.doc.leading_comment_start(sibling.line);
                Ok(Edit::insert(
                    self.doc.line(anchor).start,
                    format!("{block}\n"),
                ))
            }
            None => Ok(Edit::insert(
                self.doc.line(last_child.last).end,
                format!("\n{block}"),
            )),
        }
    }

    fn plan_delete(&self, path: &YamlPath) -> Result<YamlPlan, ResolveError> {
        let Lookup::Found { child, .. } = self.doc.lookup(path)? else {
            return Ok(YamlPlan::NoOp(format!("key absent: {path}")));
        };

        // Climb while the parent would be left empty and has no comment of its own
        let mut target = child;
        for len in (1..path.len()).rev() {
            let Lookup::Found { parent, child: owner } = self.doc.lookup(&path.prefix(len))? else {
                break;
            };
            let mapping = self.doc.child_mapping(&parent, &owner)?;
            if mapping.children.len() != 1 || self.doc.owns_comment(owner.line, owner.last) {
                break;
            }
            target = owner;
        }

        let first = self.doc.line(target.line);
        let last = self.doc.line(target.last);
        let (start, end) = if last.next == last.end && target.line > 0 {
            // Final line without a newline: take the preceding one instead
            (self.doc.line(target.line - 1).end, last.end)
        } else {
            (first.start, last.next)
        };

        let text = self.text();
        Ok(YamlPlan::Edit(Edit::new(
            start,
            end,
            String::new(),
            &text[start..end],
        )))
    }

    /// The edited buffer must still scan cleanly and read back as intended.
    fn validate_edit(&self, edit: &Edit, patch: &Patch) -> Result<(), ResolveError> {
        let text = self.text();
        let mut updated = String::with_capacity(
            text.len() + edit.new_text.len() - (edit.byte_end - edit.byte_start),
        );
        updated.push_str(&text[..edit.byte_start]);
        updated.push_str(&edit.new_text);
        updated.push_str(&text[edit.byte_end..]);

        let doc = Document::scan(&updated);
        if let Some((line, message)) = doc.top_level_issue() {
            return Err(ResolveError::MalformedLine {
                line,
                message: message.to_string(),
            });
        }

        let ok = match &patch.op {
            PatchOp::Delete => !has_path(&updated, &patch.path),
            op => match doc.lookup(&patch.path)? {
                Lookup::Found { child, .. } => reads_back(&doc, &child, op),
                Lookup::Missing { .. } => false,
            },
        };
        if ok {
            Ok(())
        } else {
            Err(ResolveError::Unsupported {
                path: patch.path.as_string(),
            })
        }
    }
}

pub(crate) fn uses_crlf(text: &str) -> bool {
    text.contains("\r\n")
}

/// Whether the value under `child` already equals what `op` would write.
fn reads_back(doc: &Document<'_>, child: &Child, op: &PatchOp) -> bool {
    match op {
        PatchOp::SetScalar { value } => {
            scalar_of(doc, child).is_some_and(|current| current.render() == value.render())
        }
        PatchOp::SetEnum { value } => {
            scalar_of(doc, child).is_some_and(|current| current.to_display_string() == *value)
        }
        PatchOp::SetStringArray { items } => string_array_of(doc, child).as_ref() == Some(items),
        PatchOp::SetObjectArray { items, .. } => {
            object_array_of(doc, child).map(|records| normalize_records(&records))
                == Some(normalize_records(items))
        }
        PatchOp::Delete => false,
    }
}

fn render_chain(chain: &[String], rendered: &Rendered, base: usize) -> String {
    let mut lines = Vec::with_capacity(chain.len());
    for (depth, key) in chain.iter().enumerate() {
        let indent = " ".repeat(base + 2 * depth);
        let key = render_key(key);
        if depth + 1 < chain.len() {
            lines.push(format!("{indent}{key}:"));
            continue;
        }
        match rendered {
            Rendered::Inline(value) => lines.push(format!("{indent}{key}: {value}")),
            Rendered::Block(body) => {
                lines.push(format!("{indent}{key}:"));
                lines.push(indent_lines(body, base + 2 * depth + 2));
            }
        }
    }
    lines.join("\n")
}

fn indent_lines(lines: &[String], indent: usize) -> String {
    let pad = " ".repeat(indent);
    lines
        .iter()
        .map(|line| format!("{pad}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::value::{Record, ScalarValue};

    fn p(path: &str) -> YamlPath {
        YamlPath::parse(path).unwrap()
    }

    fn apply(text: &str, patches: &[Patch]) -> String {
        apply_patches(text, patches, &KeyOrderMap::new())
            .expect("apply")
            .text
    }

    #[test]
    fn replaces_inline_scalar_keeping_comment() {
        let text = "host: a # bind\nport: 1\n";
        let out = apply(text, &[Patch::set_scalar(p("host"), "0.0.0.0")]);
        assert_eq!(out, "host: 0.0.0.0 # bind\nport: 1\n");
    }

    #[test]
    fn quotes_strings_that_need_it() {
        let out = apply("url: x\n", &[Patch::set_scalar(p("url"), "http://a:1")]);
        assert_eq!(out, "url: \"http://a:1\"\n");
    }

    #[test]
    fn sets_enum_and_reads_back_by_display() {
        let text = "routing:\n  strategy: round-robin\n";
        let patch = Patch::set_enum(p("routing.strategy"), "fill-first");
        let out = apply(text, std::slice::from_ref(&patch));
        assert_eq!(out, "routing:\n  strategy: fill-first\n");

        let report = apply_patches(&out, &[patch], &KeyOrderMap::new()).unwrap();
        assert_eq!(report.noops(), 1);
    }

    #[test]
    fn replaces_array_block_keeping_indent() {
        let text = "keys:\n    - a\n    - b\nnext: 1\n";
        let out = apply(
            text,
            &[Patch::set_string_array(p("keys"), vec!["c".to_string()])],
        );
        assert_eq!(out, "keys:\n    - c\nnext: 1\n");
    }

    #[test]
    fn empty_array_renders_inline() {
        let out = apply(
            "keys:\n  - a\n",
            &[Patch::set_string_array(p("keys"), Vec::new())],
        );
        assert_eq!(out, "keys: []\n");
    }

    #[test]
    fn inserts_by_key_order() {
        let order = KeyOrderMap::new().with("", ["host", "port", "tls"]);
        let text = "host: a\n# TLS settings\ntls:\n  enable: false\n";
        let report =
            apply_patches(text, &[Patch::set_scalar(p("port"), 8080i64)], &order).unwrap();
        assert_eq!(
            report.text,
            "host: a\nport: 8080\n# TLS settings\ntls:\n  enable: false\n"
        );
    }

    #[test]
    fn unranked_key_appends_to_parent() {
        let text = "tls:\n  enable: true\nport: 1\n";
        let out = apply(text, &[Patch::set_scalar(p("tls.cert"), "c.pem")]);
        assert_eq!(out, "tls:\n  enable: true\n  cert: c.pem\nport: 1\n");
    }

    #[test]
    fn keeps_crlf_line_endings() {
        let out = apply("a: 1\r\n", &[Patch::set_scalar(p("b"), 2i64)]);
        assert_eq!(out, "a: 1\r\nb: 2\r\n");

        let out = apply(
            "keys:\r\n  - a\r\nnext: 1\r\n",
            &[
                Patch::set_string_array(p("keys"), vec!["b".to_string(), "c".to_string()]),
                Patch::set_scalar(p("tls.enable"), true),
            ],
        );
        assert_eq!(out, "keys:\r\n  - b\r\n  - c\r\nnext: 1\r\ntls:\r\n  enable: true\r\n");
    }

    #[test]
    fn materializes_missing_ancestors() {
        let out = apply("port: 1\n", &[Patch::set_scalar(p("a.b.c"), true)]);
        assert_eq!(out, "port: 1\na:\n  b:\n    c: true\n");
    }

    #[test]
    fn opens_empty_mapping() {
        let out = apply("a: {} # keep\n", &[Patch::set_scalar(p("a.b"), 1i64)]);
        assert_eq!(out, "a: # keep\n  b: 1\n");
    }

    #[test]
    fn inserts_into_empty_document() {
        assert_eq!(apply("", &[Patch::set_scalar(p("a"), 1i64)]), "a: 1\n");
        assert_eq!(
            apply("# only comments", &[Patch::set_scalar(p("a"), 1i64)]),
            "# only comments\na: 1\n"
        );
    }

    #[test]
    fn delete_cascades_to_empty_parent() {
        let text = "port: 1\ntls:\n  enable: true\nhost: x\n";
        let out = apply(text, &[Patch::delete(p("tls.enable"))]);
        assert_eq!(out, "port: 1\nhost: x\n");
    }

    #[test]
    fn delete_stops_at_commented_parent() {
        let text = "# TLS\ntls:\n  enable: true\n";
        let out = apply(text, &[Patch::delete(p("tls.enable"))]);
        assert_eq!(out, "# TLS\ntls:\n");
    }

    #[test]
    fn delete_at_eof_without_newline() {
        let out = apply("a: 1\nb: 2", &[Patch::delete(p("b"))]);
        assert_eq!(out, "a: 1");
    }

    #[test]
    fn missing_delete_and_equal_set_are_noops() {
        let text = "port: 8317\n";
        let report = apply_patches(
            text,
            &[
                Patch::delete(p("nope")),
                Patch::set_scalar(p("port"), 8317i64),
            ],
            &KeyOrderMap::new(),
        )
        .unwrap();
        assert_eq!(report.text, text);
        assert_eq!(report.noops(), 2);
    }

    #[test]
    fn ambiguous_key_is_skipped_not_fatal() {
        let text = "a: 1\na: 2\nb: 1\n";
        let report = apply_patches(
            text,
            &[
                Patch::set_scalar(p("a"), 3i64),
                Patch::set_scalar(p("b"), 2i64),
            ],
            &KeyOrderMap::new(),
        )
        .unwrap();
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.text, "a: 1\na: 2\nb: 2\n");
    }

    #[test]
    fn scalar_ancestor_is_skipped() {
        let report = apply_patches(
            "port: 1\n",
            &[Patch::set_scalar(p("port.inner"), 1i64)],
            &KeyOrderMap::new(),
        )
        .unwrap();
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.text, "port: 1\n");
    }

    #[test]
    fn object_array_with_item_order() {
        let items = vec![Record::new().with("alias", "x").with("name", "m")];
        let patch = Patch::set_object_array(
            p("models"),
            items,
            Some(vec!["name".to_string(), "alias".to_string()]),
        );
        let out = apply("port: 1\n", std::slice::from_ref(&patch));
        assert_eq!(out, "port: 1\nmodels:\n  - name: m\n    alias: x\n");
        assert_eq!(apply(&out, &[patch]), out);
    }

    #[test]
    fn top_level_issue_is_fatal() {
        let err = apply_patches(
            "a: \"open\n",
            &[Patch::set_scalar(p("b"), ScalarValue::Integer(1))],
            &KeyOrderMap::new(),
        );
        assert!(matches!(err, Err(YamlError::Malformed { line: 1, .. })));
    }

    #[test]
    fn empty_patch_list_is_identity() {
        let text = "a: \"open\n\tweird";
        assert_eq!(apply(text, &[]), text);
    }
}
