//! Record store boundary.
//!
//! The workflow engine talks to persistence only through `RecordStore`.
//! Records cross this boundary as typed structs; defaults for missing fields
//! are applied once when a store deserializes its data.

use crate::error::StoreError;
use crate::fields::*;
use crate::project::{NewProject, PoleStatusPatch, Project};
use crate::task::{normalise_title, FormulaSteps, NewTask, ProductionTask, TaskPatch};

/// Typed filter for `RecordStore::query_tasks`. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub project_id: Option<u64>,
    pub pole: Option<Pole>,
    /// Compared after trimming and lowercasing both sides.
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub include_archived: bool,
}

impl TaskFilter {
    pub fn project(project_id: u64) -> Self {
        TaskFilter { project_id: Some(project_id), include_archived: true, ..Default::default() }
    }

    pub fn matches(&self, task: &ProductionTask) -> bool {
        if let Some(pid) = self.project_id {
            if task.project_id != Some(pid) {
                return false;
            }
        }
        if let Some(pole) = self.pole {
            if task.pole != pole {
                return false;
            }
        }
        if let Some(ref title) = self.title {
            if normalise_title(&task.title) != normalise_title(title) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if task.status != status {
                return false;
            }
        }
        self.include_archived || !task.archived
    }
}

/// Persistence operations the workflow engine relies on.
pub trait RecordStore {
    fn projects(&self) -> Result<Vec<Project>, StoreError>;

    fn project(&self, id: u64) -> Result<Project, StoreError>;

    fn insert_project(&mut self, project: NewProject) -> Result<Project, StoreError>;

    fn update_pole_status(
        &mut self,
        project_id: u64,
        pole: Pole,
        patch: &PoleStatusPatch,
    ) -> Result<Project, StoreError>;

    fn query_tasks(&self, filter: &TaskFilter) -> Result<Vec<ProductionTask>, StoreError>;

    fn task(&self, id: u64) -> Result<ProductionTask, StoreError>;

    fn insert_task(&mut self, task: NewTask) -> Result<ProductionTask, StoreError>;

    fn update_task(&mut self, id: u64, patch: &TaskPatch) -> Result<ProductionTask, StoreError>;

    /// Replace the stored override catalog with `payload`.
    fn upsert_override_catalog(&mut self, payload: &[FormulaSteps]) -> Result<(), StoreError>;

    fn override_catalog(&self) -> Result<Vec<FormulaSteps>, StoreError>;
}
