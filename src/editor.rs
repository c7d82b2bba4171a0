//! Workflow configuration editor.
//!
//! The editor works on a draft catalog seeded with every formula currently in
//! effect (defaults overlaid with overrides). Saving writes the whole draft
//! as the override catalog: first to the local cache, then to the record
//! store. A store failure after a good local write is reported as a degraded
//! save, not an error.

use tracing::{info, warn};

use crate::cache::CatalogCache;
use crate::catalog::WorkflowCatalog;
use crate::error::{StoreError, WorkflowError};
use crate::fields::Pole;
use crate::store::RecordStore;
use crate::task::{FormulaSteps, StepPatch, TaskTemplate};

const PLACEHOLDER_TITLE: &str = "New step";

/// Result of `ConfigEditor::save_all` when the local write succeeded.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Written to the cache and the store.
    Synced { formulas: usize },
    /// Written to the cache only; the store rejected the sync.
    LocalOnly { formulas: usize, remote_error: StoreError },
}

/// Mutation surface over the catalog.
#[derive(Debug, Clone)]
pub struct ConfigEditor {
    draft: WorkflowCatalog,
    dirty: bool,
}

impl ConfigEditor {
    pub fn new(catalog: &WorkflowCatalog) -> Self {
        let seed = catalog
            .effective_map()
            .into_iter()
            .map(|(formula, steps)| FormulaSteps { formula, steps })
            .collect();
        ConfigEditor { draft: WorkflowCatalog::with_overrides(seed), dirty: false }
    }

    /// The draft as it would be after saving.
    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.draft
    }

    pub fn into_catalog(self) -> WorkflowCatalog {
        self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn placeholder(&self, formula: &str) -> TaskTemplate {
        TaskTemplate {
            key: Some(self.draft.next_step_key(formula)),
            title: PLACEHOLDER_TITLE.to_string(),
            day_offset: 0,
            default_assignee: String::new(),
            pole: Pole::Photo,
        }
    }

    fn ensure_formula(&self, formula: &str) -> Result<(), WorkflowError> {
        if self.draft.has_override(formula) {
            Ok(())
        } else {
            Err(WorkflowError::UnknownFormula(formula.trim().to_string()))
        }
    }

    /// Create a formula holding one placeholder step.
    pub fn add_formula(&mut self, name: &str) -> Result<(), WorkflowError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WorkflowError::EmptyFormulaName);
        }
        if self.draft.is_known(name) {
            return Err(WorkflowError::DuplicateFormula(name.to_string()));
        }
        let step = self.placeholder(name);
        self.draft.upsert_formula(name, vec![step]);
        self.dirty = true;
        info!(formula = name, "Formula added");
        Ok(())
    }

    /// Append a placeholder step; returns its index.
    pub fn add_step(&mut self, formula: &str) -> Result<usize, WorkflowError> {
        self.ensure_formula(formula)?;
        let step = self.placeholder(formula);
        self.draft.add_step(formula, step);
        self.dirty = true;
        Ok(self.draft.templates(formula).len() - 1)
    }

    /// Shallow-merge `patch` into a step. Offsets and titles are taken as given.
    pub fn update_step(&mut self, formula: &str, index: usize, patch: &StepPatch) -> Result<(), WorkflowError> {
        self.ensure_formula(formula)?;
        self.draft.update_step(formula, index, patch)?;
        self.dirty = true;
        Ok(())
    }

    /// Remove a step. Tasks generated from it stay as they are and simply
    /// stop advancing their pole.
    pub fn remove_step(&mut self, formula: &str, index: usize) -> Result<TaskTemplate, WorkflowError> {
        self.ensure_formula(formula)?;
        let removed = self.draft.remove_step(formula, index)?;
        self.dirty = true;
        Ok(removed)
    }

    /// Persist every formula of the draft, local cache first.
    pub fn save_all<S: RecordStore + ?Sized>(
        &mut self,
        cache: &CatalogCache,
        store: &mut S,
    ) -> Result<SaveOutcome, WorkflowError> {
        let payload = self.draft.override_payload();
        let formulas = payload.len();
        cache.store(&payload).map_err(WorkflowError::LocalCache)?;
        self.dirty = false;

        match store.upsert_override_catalog(&payload) {
            Ok(()) => {
                info!(formulas, "Workflow configuration saved");
                Ok(SaveOutcome::Synced { formulas })
            }
            Err(remote_error) => {
                warn!(formulas, error = %remote_error, "Workflow configuration saved locally only");
                Ok(SaveOutcome::LocalOnly { formulas, remote_error })
            }
        }
    }
}
