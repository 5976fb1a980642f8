//! Load, edit and save a document through typed fields.
//!
//! A [`Session`] keeps two snapshots. Edits only touch the current one;
//! saving diffs it against the baseline and rewrites the text with the
//! minimal set of structural patches.

pub mod builder;
pub mod differ;
pub mod snapshot;
pub mod state;

pub use builder::build_patches;
pub use differ::{diff_field, split_list};
pub use snapshot::{load_snapshot, FieldInputError, FieldValue, IdentityRow, Snapshot};
pub use state::{SaveOutcome, Session};
