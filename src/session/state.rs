use crate::config::schema::Schema;
use crate::session::builder::{build_patches, has_changes};
use crate::session::snapshot::{load_snapshot, Snapshot};
use crate::yaml::editor::{apply_patches, PatchOutcome, PatchReport};
use crate::yaml::errors::YamlError;
use crate::yaml::operations::PatchSet;
use crate::yaml::template::apply_template_patches;

/// Result of a save: the new document text and what happened per patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub text: String,
    pub report: Vec<PatchReport>,
    pub templates: usize,
}

impl SaveOutcome {
    pub fn skipped(&self) -> impl Iterator<Item = &PatchReport> {
        self.report
            .iter()
            .filter(|r| matches!(r.outcome, PatchOutcome::Skipped { .. }))
    }
}

/// One editing session over a document: the text as loaded, the values it
/// held then, and the values as edited since.
#[derive(Debug, Clone)]
pub struct Session<'s> {
    schema: &'s Schema,
    text: String,
    baseline: Snapshot,
    current: Snapshot,
}

impl<'s> Session<'s> {
    pub fn load(text: impl Into<String>, schema: &'s Schema) -> Self {
        let text = text.into();
        let baseline = load_snapshot(&text, schema);
        Self {
            schema,
            current: baseline.clone(),
            baseline,
            text,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn baseline(&self) -> &Snapshot {
        &self.baseline
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// The only place edits go; the baseline stays as loaded.
    pub fn current_mut(&mut self) -> &mut Snapshot {
        &mut self.current
    }

    pub fn is_dirty(&self) -> bool {
        has_changes(self.schema, &self.baseline, &self.current)
    }

    pub fn plan(&self) -> PatchSet {
        build_patches(&self.text, self.schema, &self.baseline, &self.current)
    }

    /// Compute the new document text. The session itself is unchanged until
    /// [`Session::rebase`] is called with the persisted text.
    pub fn save(&self) -> Result<SaveOutcome, YamlError> {
        let set = self.plan();
        let expanded = apply_template_patches(&self.text, &set.templates);
        let report = apply_patches(&expanded, &set.patches, &self.schema.key_order)?;
        tracing::debug!(
            templates = set.templates.len(),
            patches = set.patches.len(),
            "session saved"
        );
        Ok(SaveOutcome {
            text: report.text,
            report: report.outcomes,
            templates: set.templates.len(),
        })
    }

    /// Adopt `text` as the new baseline after a successful persist.
    pub fn rebase(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.baseline = load_snapshot(&self.text, self.schema);
        self.current = self.baseline.clone();
    }
}
