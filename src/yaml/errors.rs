use thiserror::Error;

#[derive(Error, Debug)]
pub enum YamlError {
    #[error("malformed YAML at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("invalid path '{input}': {message}")]
    InvalidPath { input: String, message: String },

    #[error("edit error: {0}")]
    Edit(#[from] crate::edit::EditError),
}

/// Why a single patch could not be resolved against the document.
///
/// These never abort a save; the applier records them and moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("line {line} is malformed: {message}")]
    MalformedLine { line: usize, message: String },

    #[error("ambiguous key '{key}' under '{parent}'")]
    AmbiguousKey { parent: String, key: String },

    #[error("'{path}' holds a scalar, not a mapping")]
    NotAMapping { path: String },

    #[error("'{path}' holds an unsupported value")]
    Unsupported { path: String },

    #[error("cannot patch the document root")]
    RootPath,
}
