//! Line-oriented structural index of a block-style YAML document.
//!
//! Nothing here builds a tree of values. Each line is classified once and
//! blocks are resolved on demand from indentation, so every span handed to
//! the applier points straight back into the original text.

use crate::yaml::errors::ResolveError;
use crate::yaml::path::YamlPath;
use crate::yaml::value::{unquote_double, unquote_single};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct Line {
    pub start: usize,
    /// End of the line content, excluding `\r\n` / `\n`
    pub end: usize,
    /// Start of the following line (or text length)
    pub next: usize,
    pub indent: usize,
    pub kind: LineKind,
}

#[derive(Debug, Clone)]
pub(crate) enum LineKind {
    Blank,
    Comment,
    Entry(Entry),
    Item(Item),
    /// Content that is neither a key nor a sequence item (block scalar text)
    Text,
    Invalid(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub key: String,
    pub key_start: usize,
    pub colon: usize,
    pub value: Option<Span>,
    pub comment: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct Item {
    pub value: Option<Span>,
    pub entry: Option<Entry>,
}

/// A key inside a mapping: its key line and the last content line of its block.
#[derive(Debug, Clone)]
pub(crate) struct Child {
    pub key: String,
    pub line: usize,
    pub last: usize,
}

/// A resolved mapping block.
#[derive(Debug, Clone)]
pub(crate) struct MappingBlock {
    pub path: YamlPath,
    /// Line of the owning key; `None` for the document root
    pub owner: Option<usize>,
    /// Indentation of existing children
    pub indent: Option<usize>,
    pub children: Vec<Child>,
}

#[derive(Debug)]
pub(crate) enum Shape {
    Empty,
    Mapping(usize, Vec<Child>),
    Sequence(usize),
}

pub(crate) enum Lookup {
    Found { parent: MappingBlock, child: Child },
    /// `depth` leading segments exist; `mapping` is the deepest of them
    Missing { mapping: MappingBlock, depth: usize },
}

#[derive(Debug)]
pub(crate) struct Document<'a> {
    text: &'a str,
    lines: Vec<Line>,
}

impl<'a> Document<'a> {
    pub fn scan(text: &'a str) -> Self {
        let mut lines = Vec::new();
        let mut offset = 0usize;
        let mut block_scalar_owner: Option<usize> = None;

        for raw in text.split_inclusive('\n') {
            let start = offset;
            let next = offset + raw.len();
            offset = next;

            let body = raw.strip_suffix('\n').unwrap_or(raw);
            let body = body.strip_suffix('\r').unwrap_or(body);
            let end = start + body.len();
            let content = body.trim_start_matches([' ', '\t']);
            let ws_len = body.len() - content.len();
            let leading = &body[..ws_len];
            let indent = ws_len;

            if let Some(owner_indent) = block_scalar_owner {
                if content.is_empty() || indent > owner_indent {
                    let kind = if content.is_empty() {
                        LineKind::Blank
                    } else {
                        LineKind::Text
                    };
                    lines.push(Line {
                        start,
                        end,
                        next,
                        indent,
                        kind,
                    });
                    continue;
                }
                block_scalar_owner = None;
            }

            let kind = if content.is_empty() {
                LineKind::Blank
            } else if content.starts_with('#') {
                LineKind::Comment
            } else if leading.contains('\t') {
                LineKind::Invalid("tab character in indentation".to_string())
            } else {
                classify(content, start + ws_len)
            };

            let opened = match &kind {
                LineKind::Entry(entry) => Some(entry),
                LineKind::Item(Item {
                    entry: Some(entry), ..
                }) => Some(entry),
                _ => None,
            };
            if let Some(span) = opened.and_then(|e| e.value) {
                if text[span.start..span.end].starts_with(['|', '>']) {
                    block_scalar_owner = Some(indent);
                }
            }

            lines.push(Line {
                start,
                end,
                next,
                indent,
                kind,
            });
        }

        Self { text, lines }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, idx: usize) -> &Line {
        &self.lines[idx]
    }

    pub fn slice(&self, span: Span) -> &'a str {
        &self.text[span.start..span.end]
    }

    pub fn entry(&self, idx: usize) -> Option<&Entry> {
        match &self.lines.get(idx)?.kind {
            LineKind::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// First issue on a line that decides top-level structure: a malformed
    /// line at column zero, or one whose indentation starts with a tab.
    pub fn top_level_issue(&self) -> Option<(usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .find_map(|(idx, line)| match &line.kind {
                LineKind::Invalid(message)
                    if line.indent == 0 || self.text[line.start..].starts_with('\t') =>
                {
                    Some((idx + 1, message.as_str()))
                }
                _ => None,
            })
    }

    /// Classify the content lines in `[lo, hi)` as one block.
    pub fn shape(&self, lo: usize, hi: usize) -> Result<Shape, ResolveError> {
        let mut indent: Option<usize> = None;
        let mut children: Vec<Child> = Vec::new();
        let mut sequence = false;

        for idx in lo..hi {
            let line = &self.lines[idx];
            if matches!(line.kind, LineKind::Blank | LineKind::Comment) {
                continue;
            }

            let Some(level) = indent else {
                indent = Some(line.indent);
                match &line.kind {
                    LineKind::Entry(entry) => children.push(Child {
                        key: entry.key.clone(),
                        line: idx,
                        last: idx,
                    }),
                    LineKind::Item(_) => sequence = true,
                    _ => return Err(self.malformed(idx)),
                }
                continue;
            };

            if line.indent < level {
                return Err(ResolveError::MalformedLine {
                    line: idx + 1,
                    message: "inconsistent indentation".to_string(),
                });
            }

            if line.indent > level {
                if let Some(current) = children.last_mut() {
                    current.last = idx;
                }
                continue;
            }

            match &line.kind {
                LineKind::Entry(entry) if !sequence => children.push(Child {
                    key: entry.key.clone(),
                    line: idx,
                    last: idx,
                }),
                LineKind::Item(_) if sequence => {}
                // Sequence written at the same indentation as its key
                LineKind::Item(_) => match children.last_mut() {
                    Some(current)
                        if self.entry(current.line).is_some_and(|e| e.value.is_none()) =>
                    {
                        current.last = idx;
                    }
                    _ => return Err(self.malformed(idx)),
                },
                _ => return Err(self.malformed(idx)),
            }
        }

        Ok(match indent {
            None => Shape::Empty,
            Some(level) if sequence => Shape::Sequence(level),
            Some(level) => Shape::Mapping(level, children),
        })
    }

    fn malformed(&self, idx: usize) -> ResolveError {
        let message = match &self.lines[idx].kind {
            LineKind::Invalid(message) => message.clone(),
            _ => "unexpected content for block structure".to_string(),
        };
        ResolveError::MalformedLine {
            line: idx + 1,
            message,
        }
    }

    pub fn root(&self) -> Result<MappingBlock, ResolveError> {
        match self.shape(0, self.lines.len())? {
            Shape::Empty => Ok(MappingBlock {
                path: YamlPath::root(),
                owner: None,
                indent: None,
                children: Vec::new(),
            }),
            Shape::Mapping(indent, children) => Ok(MappingBlock {
                path: YamlPath::root(),
                owner: None,
                indent: Some(indent),
                children,
            }),
            Shape::Sequence(_) => Err(ResolveError::NotAMapping {
                path: String::new(),
            }),
        }
    }

    /// Inline value text of a key, if any.
    pub fn inline_value(&self, child: &Child) -> Option<&'a str> {
        self.entry(child.line)
            .and_then(|e| e.value)
            .map(|span| self.slice(span))
    }

    /// The mapping held by `child`. An inline `{}` is an empty mapping.
    pub fn child_mapping(
        &self,
        parent: &MappingBlock,
        child: &Child,
    ) -> Result<MappingBlock, ResolveError> {
        let path = parent.path.child(child.key.clone());

        if let Some(value) = self.inline_value(child) {
            if value.trim() == "{}" && child.last == child.line {
                return Ok(MappingBlock {
                    path,
                    owner: Some(child.line),
                    indent: None,
                    children: Vec::new(),
                });
            }
            return Err(ResolveError::NotAMapping {
                path: path.as_string(),
            });
        }

        match self.shape(child.line + 1, child.last + 1)? {
            Shape::Empty => Ok(MappingBlock {
                path,
                owner: Some(child.line),
                indent: None,
                children: Vec::new(),
            }),
            Shape::Mapping(indent, children) => Ok(MappingBlock {
                path,
                owner: Some(child.line),
                indent: Some(indent),
                children,
            }),
            Shape::Sequence(_) => Err(ResolveError::NotAMapping {
                path: path.as_string(),
            }),
        }
    }

    /// Walk `path` as far as it exists.
    pub fn lookup(&self, path: &YamlPath) -> Result<Lookup, ResolveError> {
        let Some((leaf, ancestors)) = path.parts().split_last() else {
            return Err(ResolveError::RootPath);
        };

        let mut mapping = self.root()?;
        for (depth, segment) in ancestors.iter().enumerate() {
            let Some(child) = unique_child(&mapping, segment)? else {
                return Ok(Lookup::Missing { mapping, depth });
            };
            mapping = self.child_mapping(&mapping, &child)?;
        }

        match unique_child(&mapping, leaf)? {
            Some(child) => Ok(Lookup::Found {
                parent: mapping,
                child,
            }),
            None => Ok(Lookup::Missing {
                mapping,
                depth: ancestors.len(),
            }),
        }
    }

    /// Mapping block at `path`, `None` when any segment is absent.
    pub fn mapping_at(&self, path: &YamlPath) -> Result<Option<MappingBlock>, ResolveError> {
        if path.is_root() {
            return self.root().map(Some);
        }
        match self.lookup(path)? {
            Lookup::Found { parent, child } => self.child_mapping(&parent, &child).map(Some),
            Lookup::Missing { .. } => Ok(None),
        }
    }

    /// Start of the comment lines directly attached above `idx`.
    pub fn leading_comment_start(&self, idx: usize) -> usize {
        let mut first = idx;
        while first > 0 && matches!(self.lines[first - 1].kind, LineKind::Comment) {
            first -= 1;
        }
        first
    }

    /// Whether the mapping owned by `owner` carries a comment of its own:
    /// inline on the key line, directly above it, or anywhere in its body.
    pub fn owns_comment(&self, owner: usize, last: usize) -> bool {
        if self.entry(owner).is_some_and(|e| e.comment.is_some()) {
            return true;
        }
        if owner > 0 && matches!(self.lines[owner - 1].kind, LineKind::Comment) {
            return true;
        }
        let owner_indent = self.lines[owner].indent;
        for (idx, line) in self.lines.iter().enumerate().skip(owner + 1) {
            match line.kind {
                LineKind::Comment if idx <= last || line.indent > owner_indent => return true,
                LineKind::Blank | LineKind::Comment => {}
                _ if idx <= last => {}
                _ => break,
            }
        }
        false
    }
}

fn unique_child(mapping: &MappingBlock, key: &str) -> Result<Option<Child>, ResolveError> {
    let mut matches = mapping.children.iter().filter(|c| c.key == key);
    let first = matches.next().cloned();
    if matches.next().is_some() {
        return Err(ResolveError::AmbiguousKey {
            parent: mapping.path.as_string(),
            key: key.to_string(),
        });
    }
    Ok(first)
}

fn classify(content: &str, base: usize) -> LineKind {
    if content == "-" || content.starts_with("- ") {
        let after = &content[1..];
        let rest = after.trim_start();
        let rest_base = base + 1 + (after.len() - rest.len());
        if rest.is_empty() || rest.starts_with('#') {
            return LineKind::Item(Item {
                value: None,
                entry: None,
            });
        }
        return match parse_entry(rest, rest_base) {
            Ok(Some(entry)) => LineKind::Item(Item {
                value: None,
                entry: Some(entry),
            }),
            Ok(None) => match scalar_span(rest, rest_base) {
                Ok((span, _)) => LineKind::Item(Item {
                    value: Some(span),
                    entry: None,
                }),
                Err(message) => LineKind::Invalid(message),
            },
            Err(message) => LineKind::Invalid(message),
        };
    }

    match parse_entry(content, base) {
        Ok(Some(entry)) => LineKind::Entry(entry),
        Ok(None) => match scalar_span(content, base) {
            Ok(_) => LineKind::Text,
            Err(message) => LineKind::Invalid(message),
        },
        Err(message) => LineKind::Invalid(message),
    }
}

/// Parse `key: value  # comment`. `Ok(None)` when the content is not a
/// mapping entry at all.
fn parse_entry(content: &str, base: usize) -> Result<Option<Entry>, String> {
    if content.starts_with(['[', '{']) {
        return Ok(None);
    }

    let (key, colon) = if let Some(rest) = content.strip_prefix('"') {
        let Some((key, used)) = unquote_double(rest) else {
            return Err("unterminated double-quoted scalar".to_string());
        };
        match quoted_key_colon(content, 1 + used) {
            Some(colon) => (key, colon),
            None => return Ok(None),
        }
    } else if let Some(rest) = content.strip_prefix('\'') {
        let Some((key, used)) = unquote_single(rest) else {
            return Err("unterminated single-quoted scalar".to_string());
        };
        match quoted_key_colon(content, 1 + used) {
            Some(colon) => (key, colon),
            None => return Ok(None),
        }
    } else {
        let bytes = content.as_bytes();
        let mut found = None;
        for (idx, &b) in bytes.iter().enumerate() {
            if b == b'#' && idx > 0 && matches!(bytes[idx - 1], b' ' | b'\t') {
                break;
            }
            if b == b':' && matches!(bytes.get(idx + 1), None | Some(b' ' | b'\t')) {
                found = Some(idx);
                break;
            }
        }
        let Some(colon) = found else {
            return Ok(None);
        };
        let key = content[..colon].trim_end();
        if key.is_empty() {
            return Ok(None);
        }
        (key.to_string(), colon)
    };

    let after = &content[colon + 1..];
    let rest = after.trim_start_matches([' ', '\t']);
    let pos = colon + 1 + (after.len() - rest.len());

    let (value, comment) = if rest.is_empty() {
        (None, None)
    } else if rest.starts_with('#') {
        (None, Some(base + pos))
    } else {
        let (span, comment) = scalar_span(rest, base + pos)?;
        (Some(span), comment)
    };

    Ok(Some(Entry {
        key,
        key_start: base,
        colon: base + colon,
        value,
        comment,
    }))
}

fn quoted_key_colon(content: &str, after_quote: usize) -> Option<usize> {
    let rest = &content[after_quote..];
    let trimmed = rest.trim_start_matches([' ', '\t']);
    let colon = after_quote + (rest.len() - trimmed.len());
    let tail = trimmed.strip_prefix(':')?;
    (tail.is_empty() || tail.starts_with([' ', '\t'])).then_some(colon)
}

/// Span of an inline scalar starting at `rest`, plus the inline comment offset.
fn scalar_span(rest: &str, base: usize) -> Result<(Span, Option<usize>), String> {
    let quoted_end = if let Some(inner) = rest.strip_prefix('"') {
        let (_, used) = unquote_double(inner)
            .ok_or_else(|| "unterminated double-quoted scalar".to_string())?;
        1 + used
    } else if let Some(inner) = rest.strip_prefix('\'') {
        let (_, used) = unquote_single(inner)
            .ok_or_else(|| "unterminated single-quoted scalar".to_string())?;
        1 + used
    } else {
        0
    };

    let tail = &rest[quoted_end..];
    let cut = find_comment(tail);
    let value_end = quoted_end + tail[..cut.unwrap_or(tail.len())].trim_end().len();
    Ok((
        Span {
            start: base,
            end: base + value_end,
        },
        cut.map(|c| base + quoted_end + c),
    ))
}

fn find_comment(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    bytes
        .iter()
        .enumerate()
        .position(|(idx, &b)| b == b'#' && (idx == 0 || matches!(bytes[idx - 1], b' ' | b'\t')))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Server config
host: \"0.0.0.0\" # bind address
port: 8317
tls:
  enable: false
  # cert: /path
  cert: \"\"

api-keys:
- one
- two
";

    #[test]
    fn classifies_entries_and_comments() {
        let doc = Document::scan(SAMPLE);
        assert!(matches!(doc.line(0).kind, LineKind::Comment));
        let host = doc.entry(1).unwrap();
        assert_eq!(host.key, "host");
        assert_eq!(doc.slice(host.value.unwrap()), "\"0.0.0.0\"");
        assert!(host.comment.is_some());
    }

    #[test]
    fn root_children_cover_blocks() {
        let doc = Document::scan(SAMPLE);
        let root = doc.root().unwrap();
        let keys: Vec<_> = root.children.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["host", "port", "tls", "api-keys"]);
        let tls = &root.children[2];
        assert_eq!((tls.line, tls.last), (3, 6));
        let api_keys = &root.children[3];
        assert_eq!(api_keys.last, 10);
    }

    #[test]
    fn url_values_are_not_keys() {
        let doc = Document::scan("url: http://a:b/c # note\n");
        let entry = doc.entry(0).unwrap();
        assert_eq!(entry.key, "url");
        assert_eq!(doc.slice(entry.value.unwrap()), "http://a:b/c");
    }

    #[test]
    fn quoted_keys() {
        let doc = Document::scan("\"a.b\": 1\n'c': x\n");
        assert_eq!(doc.entry(0).unwrap().key, "a.b");
        assert_eq!(doc.entry(1).unwrap().key, "c");
    }

    #[test]
    fn block_scalar_bodies_are_opaque() {
        let doc = Document::scan("note: |\n  it's: \"raw\n  text\nnext: 1\n");
        let root = doc.root().unwrap();
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].last, 2);
    }

    #[test]
    fn nested_tab_indentation_blocks_descent() {
        let doc = Document::scan("a:\n  b:\n  \tc: 1\n");
        assert!(matches!(doc.line(2).kind, LineKind::Invalid(_)));
        assert!(doc.top_level_issue().is_none());
        let path = YamlPath::parse("a.b").unwrap();
        assert!(doc.mapping_at(&path).is_err());
    }

    #[test]
    fn leading_tab_is_a_top_level_issue() {
        let doc = Document::scan("a:\n\tb: 1\n");
        assert_eq!(doc.top_level_issue().map(|(line, _)| line), Some(2));
    }

    #[test]
    fn unterminated_quote_at_top_level() {
        let doc = Document::scan("a: \"open\n");
        assert_eq!(doc.top_level_issue().map(|(line, _)| line), Some(1));
    }

    #[test]
    fn lookup_reports_missing_depth() {
        let doc = Document::scan(SAMPLE);
        match doc.lookup(&YamlPath::parse("tls.key.path").unwrap()).unwrap() {
            Lookup::Missing { mapping, depth } => {
                assert_eq!(depth, 1);
                assert_eq!(mapping.path.as_string(), "tls");
            }
            Lookup::Found { .. } => panic!("expected missing"),
        }
    }

    #[test]
    fn duplicate_keys_are_ambiguous() {
        let doc = Document::scan("a: 1\na: 2\n");
        assert!(matches!(
            doc.lookup(&YamlPath::parse("a").unwrap()),
            Err(ResolveError::AmbiguousKey { .. })
        ));
    }
}
