//! Turning a commented example section into a real block.

use crate::edit::{Edit, EditResult};
use crate::yaml::editor::uses_crlf;
use crate::yaml::operations::TemplatePatch;
use crate::yaml::snippet::{
    extract_top_level_block, find_comment_section, normalize_snippet_to_root,
};

/// Expand each template in order against the running text.
pub fn apply_template_patches(text: &str, templates: &[TemplatePatch]) -> String {
    templates
        .iter()
        .fold(text.to_string(), |current, template| {
            match plan_template(&current, template) {
                Some(edit) => match edit.apply(&current) {
                    Ok(EditResult::Applied { text, .. }) => {
                        tracing::debug!(root_key = %template.root_key, "expanded template region");
                        text
                    }
                    Ok(EditResult::AlreadyApplied) => current,
                    Err(err) => {
                        tracing::warn!(
                            root_key = %template.root_key,
                            error = %err,
                            "skipping template"
                        );
                        current
                    }
                },
                None => current,
            }
        })
}

/// The edit that rewrites the marker region, or `None` when the root key
/// already has a real block or a marker is missing.
pub fn plan_template(text: &str, template: &TemplatePatch) -> Option<Edit> {
    if !extract_top_level_block(text, &template.root_key).is_empty() {
        tracing::debug!(root_key = %template.root_key, "root key already live; template skipped");
        return None;
    }
    let (start, end) = find_comment_section(text, &template.start_marker, &template.end_marker)?;
    let block = normalize_snippet_to_root(&template.snippet, &template.root_key);
    let mut region = format!("\n\n{block}\n");
    if uses_crlf(text) {
        region = region.replace('\n', "\r\n");
    }
    Some(Edit::new(start, end, region, &text[start..end]))
}
