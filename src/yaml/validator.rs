use crate::yaml::errors::YamlError;
use crate::yaml::scan::Document;

/// Reject a document whose top-level structure cannot be decided.
///
/// Malformed lines nested under a key are tolerated here; patches that
/// need to resolve through them are skipped individually.
pub fn validate_document(content: &str) -> Result<(), YamlError> {
    let doc = Document::scan(content);
    match doc.top_level_issue() {
        Some((line, message)) => Err(YamlError::Malformed {
            line,
            message: message.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_defects_are_tolerated() {
        assert!(validate_document("a:\n  b: \"open\n").is_ok());
        assert!(validate_document("").is_ok());
    }

    #[test]
    fn top_level_defects_are_rejected() {
        assert!(matches!(
            validate_document("a: 1\n\tb: 2\n"),
            Err(YamlError::Malformed { line: 2, .. })
        ));
        assert!(validate_document("key: 'open\n").is_err());
    }
}
