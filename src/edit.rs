use std::io::Write;
use std::path::Path;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// The fundamental edit primitive: byte-span replacement with verification.
///
/// Every structural patch compiles down to exactly one of these. Intelligence
/// lives in span acquisition (the scanner and applier), not in application.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Edit does nothing until apply() is called"]
pub struct Edit {
    /// Starting byte offset (inclusive)
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// New text to insert at [byte_start, byte_end)
    pub new_text: String,
    /// Verification of what we expect to find before applying
    pub expected_before: EditVerification,
}

/// Verification strategy for edit safety.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large spans)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("before-text verification failed at byte {byte_start}")]
    BeforeTextMismatch {
        byte_start: usize,
        byte_end: usize,
        found: String,
    },

    #[error("invalid byte range: [{byte_start}, {byte_end}) in buffer of length {len}")]
    InvalidByteRange {
        byte_start: usize,
        byte_end: usize,
        len: usize,
    },

    #[error("edit span does not fall on UTF-8 character boundaries")]
    InvalidUtf8Edit,

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for success/already-applied"]
pub enum EditResult {
    /// Edit was applied; `text` is the new buffer
    Applied { text: String, bytes_changed: usize },
    /// Span already held `new_text`, buffer unchanged
    AlreadyApplied,
}

impl Edit {
    /// Create a new edit with automatic verification generation.
    pub fn new(
        byte_start: usize,
        byte_end: usize,
        new_text: impl Into<String>,
        expected_before: &str,
    ) -> Self {
        Self {
            byte_start,
            byte_end,
            new_text: new_text.into(),
            expected_before: EditVerification::from_text(expected_before),
        }
    }

    /// Pure insertion at `offset`.
    pub fn insert(offset: usize, new_text: impl Into<String>) -> Self {
        Self::new(offset, offset, new_text, "")
    }

    /// Validate the edit against the buffer, returning the current span text.
    fn validate<'a>(&self, content: &'a str) -> Result<&'a str, EditError> {
        if self.byte_start > self.byte_end || self.byte_end > content.len() {
            return Err(EditError::InvalidByteRange {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                len: content.len(),
            });
        }

        let current = content
            .get(self.byte_start..self.byte_end)
            .ok_or(EditError::InvalidUtf8Edit)?;

        // Idempotency: already holds the replacement
        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(EditError::BeforeTextMismatch {
                byte_start: self.byte_start,
                byte_end: self.byte_end,
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// Apply this edit to an in-memory buffer.
    pub fn apply(&self, content: &str) -> Result<EditResult, EditError> {
        let current = self.validate(content)?;
        if current == self.new_text {
            return Ok(EditResult::AlreadyApplied);
        }

        let mut text = String::with_capacity(
            content.len() + self.new_text.len() - (self.byte_end - self.byte_start),
        );
        text.push_str(&content[..self.byte_start]);
        text.push_str(&self.new_text);
        text.push_str(&content[self.byte_end..]);

        Ok(EditResult::Applied {
            text,
            bytes_changed: self.new_text.len(),
        })
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the original file is left untouched.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), EditError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_edit_verification_exact_match() {
        let verify = EditVerification::ExactMatch("port: 8080".to_string());
        assert!(verify.matches("port: 8080"));
        assert!(!verify.matches("port: 80"));
    }

    #[test]
    fn test_edit_verification_from_text_large() {
        let text = "x".repeat(2000);
        let verify = EditVerification::from_text(&text);
        assert!(matches!(verify, EditVerification::Hash(_)));
        assert!(verify.matches(&text));
    }

    #[test]
    fn test_edit_invalid_range() {
        let edit = Edit::new(5, 20, "replacement", "");
        let result = edit.apply("hello world");
        assert!(matches!(result, Err(EditError::InvalidByteRange { .. })));
    }

    #[test]
    fn test_edit_inverted_range() {
        let edit = Edit::new(10, 5, "replacement", "");
        assert!(matches!(
            edit.apply("hello world"),
            Err(EditError::InvalidByteRange { .. })
        ));
    }

    #[test]
    fn test_edit_splits_char_boundary() {
        let edit = Edit::new(1, 2, "x", "");
        assert!(matches!(edit.apply("ég"), Err(EditError::InvalidUtf8Edit)));
    }

    #[test]
    fn test_edit_applies_and_is_idempotent() {
        let edit = Edit::new(6, 10, "9090", "8080");
        let text = match edit.apply("port: 8080\n").unwrap() {
            EditResult::Applied { text, .. } => text,
            EditResult::AlreadyApplied => panic!("expected applied"),
        };
        assert_eq!(text, "port: 9090\n");
        assert_eq!(edit.apply(&text).unwrap(), EditResult::AlreadyApplied);
    }

    #[test]
    fn test_edit_before_text_mismatch() {
        let edit = Edit::new(6, 10, "9090", "8080");
        assert!(matches!(
            edit.apply("port: 7070\n"),
            Err(EditError::BeforeTextMismatch { .. })
        ));
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file_path = temp_dir.path().join("config.yaml");
        fs::write(&file_path, "port: 1\n").unwrap();

        write_atomic(&file_path, "port: 2\n").unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "port: 2\n");
    }
}
