pub mod editor;
pub mod errors;
pub mod operations;
pub mod path;
pub mod reader;
pub(crate) mod scan;
pub mod snippet;
pub mod template;
pub mod validator;
pub mod value;

pub use editor::{apply_patches, ApplyReport, PatchOutcome, PatchReport, YamlEditor, YamlPlan};
pub use errors::{ResolveError, YamlError};
pub use operations::{KeyOrderMap, Patch, PatchOp, PatchSet, TemplatePatch};
pub use path::YamlPath;
pub use reader::{get_object_array, get_scalar, get_string_array, has_path, list_map_keys};
pub use snippet::{extract_comment_section, extract_top_level_block, normalize_snippet_to_root};
pub use template::apply_template_patches;
pub use validator::validate_document;
pub use value::{Record, ScalarValue, Value};
