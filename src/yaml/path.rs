use crate::yaml::errors::YamlError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dotted mapping-key path from the document root.
///
/// Segments containing `.` are written double-quoted: `providers."api.example"`.
/// The empty path addresses the root mapping.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct YamlPath {
    parts: Vec<String>,
}

impl YamlPath {
    pub fn root() -> Self {
        Self { parts: Vec::new() }
    }

    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, YamlError> {
        Ok(Self {
            parts: parse_dotted_path(input)?,
        })
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    pub fn is_root(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn parent(&self) -> Option<YamlPath> {
        let (_, rest) = self.parts.split_last()?;
        Some(Self {
            parts: rest.to_vec(),
        })
    }

    pub fn leaf(&self) -> Option<&str> {
        self.parts.last().map(String::as_str)
    }

    pub fn child(&self, key: impl Into<String>) -> YamlPath {
        let mut parts = self.parts.clone();
        parts.push(key.into());
        Self { parts }
    }

    pub fn prefix(&self, len: usize) -> YamlPath {
        Self {
            parts: self.parts[..len.min(self.parts.len())].to_vec(),
        }
    }

    pub fn starts_with(&self, other: &YamlPath) -> bool {
        self.parts.starts_with(&other.parts)
    }

    /// Path relative to `base`, if `base` is a prefix.
    pub fn strip_prefix(&self, base: &YamlPath) -> Option<YamlPath> {
        self.parts.strip_prefix(base.parts.as_slice()).map(|rest| Self {
            parts: rest.to_vec(),
        })
    }

    /// Dotted form used as a KeyOrderMap key; the root is `""`.
    pub fn as_string(&self) -> String {
        self.parts
            .iter()
            .map(|part| {
                if part.contains('.') || part.contains('"') {
                    format!("\"{}\"", part.replace('\\', "\\\\").replace('"', "\\\""))
                } else {
                    part.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for YamlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl TryFrom<String> for YamlPath {
    type Error = YamlError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<YamlPath> for String {
    fn from(path: YamlPath) -> Self {
        path.as_string()
    }
}

impl From<&[&str]> for YamlPath {
    fn from(parts: &[&str]) -> Self {
        Self::new(parts.iter().copied())
    }
}

fn parse_dotted_path(input: &str) -> Result<Vec<String>, YamlError> {
    let mut parts = Vec::new();
    if input.is_empty() {
        return Ok(parts);
    }

    let mut current = String::new();
    let mut chars = input.chars();
    let mut in_quotes = false;
    let mut quoted_segment = false;

    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' => in_quotes = false,
                '\\' => match chars.next() {
                    Some(next) => current.push(next),
                    None => break,
                },
                other => current.push(other),
            }
            continue;
        }

        match ch {
            '.' => {
                if current.is_empty() && !quoted_segment {
                    return Err(YamlError::InvalidPath {
                        input: input.to_string(),
                        message: "empty path segment".to_string(),
                    });
                }
                parts.push(std::mem::take(&mut current));
                quoted_segment = false;
            }
            '"' => {
                if !current.is_empty() || quoted_segment {
                    return Err(YamlError::InvalidPath {
                        input: input.to_string(),
                        message: "unexpected quote inside key".to_string(),
                    });
                }
                in_quotes = true;
                quoted_segment = true;
            }
            other => {
                if quoted_segment {
                    return Err(YamlError::InvalidPath {
                        input: input.to_string(),
                        message: "text after closing quote".to_string(),
                    });
                }
                current.push(other);
            }
        }
    }

    if in_quotes {
        return Err(YamlError::InvalidPath {
            input: input.to_string(),
            message: "unterminated quoted key".to_string(),
        });
    }

    if current.is_empty() && !quoted_segment {
        return Err(YamlError::InvalidPath {
            input: input.to_string(),
            message: "empty path segment".to_string(),
        });
    }
    parts.push(current);

    Ok(parts)
}
