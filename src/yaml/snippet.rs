//! Pulling blocks and commented example sections out of a document.
//!
//! Every extractor returns `""` for "no data"; callers must never patch
//! against an empty extraction.

use crate::yaml::scan::{Document, LineKind, Shape};
use crate::yaml::value::render_key;

/// The span of a real top-level key: its key line through the last content
/// line of its block, newline-terminated. `""` when the key is not live.
pub fn extract_top_level_block(text: &str, root_key: &str) -> String {
    let doc = Document::scan(text);
    let Ok(root) = doc.root() else {
        return String::new();
    };
    let Some(child) = root.children.iter().find(|c| c.key == root_key) else {
        return String::new();
    };

    let start = doc.line(child.line).start;
    let end = doc.line(child.last).end;
    let mut block = text[start..end].to_string();
    block.push('\n');
    block
}

/// Byte range strictly between the first occurrence of each marker, when
/// both exist and appear in order.
pub fn find_comment_section(
    text: &str,
    start_marker: &str,
    end_marker: &str,
) -> Option<(usize, usize)> {
    if start_marker.is_empty() || end_marker.is_empty() {
        return None;
    }
    let start = text.find(start_marker)? + start_marker.len();
    let end = text.find(end_marker)?;
    (end >= start).then_some((start, end))
}

/// Text strictly between the first occurrence of each marker, or `""`.
pub fn extract_comment_section(text: &str, start_marker: &str, end_marker: &str) -> String {
    find_comment_section(text, start_marker, end_marker)
        .map(|(start, end)| text[start..end].to_string())
        .unwrap_or_default()
}

/// Rewrite a body-only or `#`-commented snippet as `root_key:` followed by
/// its body indented one level, so it can be addressed as `[root_key, ...]`.
///
/// Degrades to `root_key: {}` when nothing usable remains.
pub fn normalize_snippet_to_root(snippet: &str, root_key: &str) -> String {
    let key = render_key(root_key);
    let empty = format!("{key}: {{}}\n");

    let raw: Vec<&str> = snippet.lines().filter(|l| !l.trim().is_empty()).collect();
    if raw.is_empty() {
        return empty;
    }

    let commented = raw.iter().all(|l| l.trim_start().starts_with('#'));
    let mut lines: Vec<String> = Vec::with_capacity(raw.len());
    for line in raw {
        let line = line.trim_end();
        let line = if commented { uncomment(line) } else { line };
        let content = line.trim_start();
        if content.is_empty() || content.starts_with('#') || (commented && is_prose(content)) {
            continue;
        }
        lines.push(line.to_string());
    }

    // Drop a leading `root_key:` header; its body is what we reindent.
    if let Some(first) = lines.first() {
        let header = first.trim();
        if header == format!("{key}:") || header == format!("{root_key}:") {
            lines.remove(0);
        }
    }

    let common = lines
        .iter()
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);
    let body: Vec<String> = lines
        .iter()
        .map(|l| format!("  {}", &l[common..]))
        .collect();
    if body.is_empty() {
        return empty;
    }

    let mut out = format!("{key}:\n");
    for line in &body {
        out.push_str(line);
        out.push('\n');
    }

    // The result must resolve as a mapping of one key with a block body.
    let doc = Document::scan(&out);
    let usable = doc.top_level_issue().is_none()
        && matches!(doc.root(), Ok(root) if root.children.len() == 1)
        && !doc
            .lines()
            .iter()
            .any(|l| matches!(l.kind, LineKind::Invalid(_)))
        && matches!(
            doc.shape(1, doc.lines().len()),
            Ok(Shape::Mapping(..) | Shape::Sequence(_))
        );
    if usable {
        out
    } else {
        empty
    }
}

fn uncomment(line: &str) -> &str {
    let content = line.trim_start();
    match content.strip_prefix('#') {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line,
    }
}

/// An uncommented line that reads as prose rather than YAML structure.
fn is_prose(content: &str) -> bool {
    if content.starts_with("- ") || content == "-" {
        return false;
    }
    match content.find(':') {
        Some(idx) => {
            let key = &content[..idx];
            let after = &content[idx + 1..];
            let key_like = !key.is_empty()
                && (key.starts_with(['"', '\''])
                    || key
                        .chars()
                        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')));
            !(key_like && (after.is_empty() || after.starts_with(' ')))
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
port: 8317

# ampcode-example-start
# Amp CLI integration
# ampcode:
#   upstream-url: \"https://ampcode.com\"
#   restrict-management-to-localhost: true
# ampcode-example-end

remote:
  secret: x
";

    #[test]
    fn extracts_top_level_blocks() {
        assert_eq!(extract_top_level_block(DOC, "remote"), "remote:\n  secret: x\n");
        assert_eq!(extract_top_level_block(DOC, "port"), "port: 8317\n");
        assert_eq!(extract_top_level_block(DOC, "ampcode"), "");
    }

    #[test]
    fn extracts_comment_sections() {
        let section = extract_comment_section(DOC, "# ampcode-example-start", "# ampcode-example-end");
        assert!(section.starts_with("\n# Amp CLI integration\n"));
        assert!(section.ends_with("true\n"));
        assert_eq!(extract_comment_section(DOC, "# nope", "# ampcode-example-end"), "");
        assert_eq!(
            extract_comment_section(DOC, "# ampcode-example-end", "# ampcode-example-start"),
            ""
        );
    }

    #[test]
    fn normalizes_commented_snippet() {
        let section = extract_comment_section(DOC, "# ampcode-example-start", "# ampcode-example-end");
        assert_eq!(
            normalize_snippet_to_root(&section, "ampcode"),
            "ampcode:\n  upstream-url: \"https://ampcode.com\"\n  restrict-management-to-localhost: true\n"
        );
    }

    #[test]
    fn normalizes_body_only_snippet() {
        assert_eq!(
            normalize_snippet_to_root("    a: 1\n    b:\n      - x\n", "root"),
            "root:\n  a: 1\n  b:\n    - x\n"
        );
    }

    #[test]
    fn rendered_snippet_keeps_every_key() {
        assert_eq!(
            normalize_snippet_to_root("models:\n  - name: a\n    extra key+1: 1\n", "root"),
            "root:\n  models:\n    - name: a\n      extra key+1: 1\n"
        );
    }

    #[test]
    fn degrades_on_garbage() {
        assert_eq!(normalize_snippet_to_root("", "ampcode"), "ampcode: {}\n");
        assert_eq!(
            normalize_snippet_to_root("# just some prose here\n", "ampcode"),
            "ampcode: {}\n"
        );
        assert_eq!(normalize_snippet_to_root("a: \"open\n", "ampcode"), "ampcode: {}\n");
    }
}
