//! Turning snapshot differences into an ordered patch set.

use crate::config::schema::{IdentityGroupSpec, Schema, TemplateGroupSpec};
use crate::session::differ::{content_op, diff_field};
use crate::session::snapshot::{IdentityRow, Snapshot};
use crate::yaml::editor::apply_patches;
use crate::yaml::operations::{Patch, PatchSet, TemplatePatch};
use crate::yaml::path::YamlPath;
use crate::yaml::snippet::{extract_top_level_block, find_comment_section};
use crate::yaml::value::{normalize_records, Record};
use std::collections::{BTreeMap, HashSet};

/// Everything needed to bring `text` from `baseline` to `current`:
/// template expansions, then field patches in schema order, then identity
/// group upserts, then identity group deletes.
pub fn build_patches(
    text: &str,
    schema: &Schema,
    baseline: &Snapshot,
    current: &Snapshot,
) -> PatchSet {
    let mut set = PatchSet::default();
    let mut handled: HashSet<&str> = HashSet::new();

    for template in &schema.templates {
        if let Some(patch) = template_patch(text, schema, template, baseline, current) {
            handled.extend(template.fields.iter().map(String::as_str));
            set.templates.push(patch);
        }
    }

    for field in &schema.fields {
        if handled.contains(field.id.as_str()) {
            continue;
        }
        let (Some(path), Some(old), Some(new)) = (
            field.yaml_path(),
            baseline.field(&field.id),
            current.field(&field.id),
        ) else {
            continue;
        };
        if let Some(op) = diff_field(field, old, new) {
            set.patches.push(Patch { path, op });
        }
    }

    let mut deletes = Vec::new();
    for group in &schema.identity_groups {
        let (upserts, removed) =
            group_patches(group, baseline.rows(&group.id), current.rows(&group.id));
        set.patches.extend(upserts);
        deletes.extend(removed);
    }
    set.patches.extend(deletes);

    set
}

/// A template patch when the root key is not live, both markers exist,
/// the group changed and something non-default remains to render.
fn template_patch(
    text: &str,
    schema: &Schema,
    template: &TemplateGroupSpec,
    baseline: &Snapshot,
    current: &Snapshot,
) -> Option<TemplatePatch> {
    if !extract_top_level_block(text, &template.root_key).is_empty() {
        return None;
    }
    find_comment_section(text, &template.start_marker, &template.end_marker)?;

    let root = YamlPath::new([template.root_key.as_str()]);
    let mut changed = false;
    let mut body = Vec::new();
    for id in &template.fields {
        let (Some(field), Some(old), Some(new)) =
            (schema.field(id), baseline.field(id), current.field(id))
        else {
            continue;
        };
        changed |= diff_field(field, old, new).is_some();
        let relative = field.yaml_path().and_then(|p| p.strip_prefix(&root));
        if let (Some(path), Some(op)) = (relative, content_op(field, new)) {
            body.push(Patch { path, op });
        }
    }
    if !changed || body.is_empty() {
        return None;
    }

    match apply_patches("", &body, &schema.key_order.subtree(&root)) {
        Ok(report) => Some(TemplatePatch {
            root_key: template.root_key.clone(),
            snippet: report.text,
            start_marker: template.start_marker.clone(),
            end_marker: template.end_marker.clone(),
        }),
        Err(err) => {
            tracing::warn!(template = %template.id, error = %err, "cannot render template body");
            None
        }
    }
}

/// Upserts and deletes reconciling one identity group.
fn group_patches(
    group: &IdentityGroupSpec,
    baseline: &[IdentityRow],
    current: &[IdentityRow],
) -> (Vec<Patch>, Vec<Patch>) {
    let Some(parent) = group.parent_path() else {
        return (Vec::new(), Vec::new());
    };

    // Only identities that held records at load time are ever deleted
    let mut before: BTreeMap<&str, Vec<Record>> = BTreeMap::new();
    for row in baseline {
        let body = normalize_records(&row.records);
        if !body.is_empty() {
            before.entry(row.identity.as_str()).or_insert(body);
        }
    }

    // Rows with an identity and a body survive; the first claim on an identity wins
    let mut owned: HashSet<&str> = HashSet::new();
    let mut upserts = Vec::new();
    for row in current {
        let identity = row.identity.trim();
        let body = normalize_records(&row.records);
        if identity.is_empty() || body.is_empty() {
            continue;
        }
        if !owned.insert(identity) {
            tracing::warn!(group = %group.id, %identity, "duplicate identity; keeping the first row");
            continue;
        }
        if before.get(identity) != Some(&body) {
            upserts.push(Patch::set_object_array(
                parent.child(identity),
                body,
                group.item_key_order.clone(),
            ));
        }
    }

    let renamed_from = current
        .iter()
        .filter_map(|row| row.original.as_deref().filter(|o| *o != row.identity.trim()));
    let stale = baseline.iter().map(|row| row.identity.as_str());

    let mut deleted: HashSet<&str> = HashSet::new();
    let deletes = renamed_from
        .chain(stale)
        .filter(|identity| {
            before.contains_key(*identity)
                && !owned.contains(*identity)
                && deleted.insert(*identity)
        })
        .map(|identity| Patch::delete(parent.child(identity)))
        .collect();

    (upserts, deletes)
}

/// Whether any field or group differs between the two snapshots.
pub fn has_changes(schema: &Schema, baseline: &Snapshot, current: &Snapshot) -> bool {
    let field_changed = schema.fields.iter().any(|field| {
        match (baseline.field(&field.id), current.field(&field.id)) {
            (Some(old), Some(new)) => diff_field(field, old, new).is_some(),
            _ => false,
        }
    });
    field_changed
        || schema
            .identity_groups
            .iter()
            .any(|g| baseline.rows(&g.id) != current.rows(&g.id))
}
