pub mod loader;
pub mod schema;

pub use loader::{
    load_patch_set_from_path, load_patch_set_from_str, load_schema_from_path,
    load_schema_from_str, ConfigError,
};
pub use schema::{
    validate_patch_set, FieldKind, FieldSpec, IdentityGroupSpec, Schema, TemplateGroupSpec,
    ValidationError, ValidationIssue,
};
