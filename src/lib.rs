//! YAML Patcher: structural edits to hand-written YAML configuration
//!
//! Reads typed values out of a YAML document at dotted paths, and writes
//! changes back as the smallest possible byte-span edits, so comments,
//! spacing, key order and commented-out example sections all survive.
//!
//! # Architecture
//!
//! All edit operations compile down to a single primitive: [`Edit`], which
//! represents a verified byte-span replacement. Intelligence lives in span
//! acquisition (a line-oriented structural scan of the document), not in
//! the application logic. The document is never re-serialized.
//!
//! - [`yaml`]: path reader, snippet extraction, patch applier and template
//!   expansion
//! - [`session`]: baseline/current snapshots and the patch builder that
//!   diffs them
//! - [`config`]: the TOML schema and patch-file loaders
//!
//! # Safety
//!
//! - All edits verify expected before-text before applying
//! - Each applied patch must read back as the value it wrote
//! - Unresolvable patches are skipped and reported, never half-applied
//! - Idempotent operations
//!
//! # Example
//!
//! ```
//! use yaml_patcher::yaml::{apply_patches, KeyOrderMap, Patch, YamlPath};
//!
//! let text = "# Server\nhost: 127.0.0.1 # bind\n";
//! let patch = Patch::set_scalar(YamlPath::parse("host").unwrap(), "0.0.0.0");
//! let report = apply_patches(text, &[patch], &KeyOrderMap::new()).unwrap();
//! assert_eq!(report.text, "# Server\nhost: 0.0.0.0 # bind\n");
//! ```

pub mod config;
pub mod edit;
pub mod session;
pub mod yaml;

// Re-exports
pub use config::{load_schema_from_path, load_schema_from_str, ConfigError, Schema};
pub use edit::{write_atomic, Edit, EditError, EditResult, EditVerification};
pub use session::{FieldValue, SaveOutcome, Session, Snapshot};
pub use yaml::{
    apply_patches, apply_template_patches, ApplyReport, KeyOrderMap, Patch, PatchOp,
    PatchOutcome, PatchSet, TemplatePatch, YamlError, YamlPath,
};
