//! Progress reconciliation between task completion and pole counters.
//!
//! Every surface that changes a task's status goes through
//! `ProgressReconciler`, so the rule lives in one place: a completed task
//! moves its pole's `current_step` up to the task's step number, and never
//! down.

use std::fmt;

use tracing::{debug, info, warn};

use crate::catalog::WorkflowCatalog;
use crate::error::StoreError;
use crate::fields::*;
use crate::generator::{project_formula, task_from_template};
use crate::project::{PoleStatusPatch, Project};
use crate::store::{RecordStore, TaskFilter};
use crate::task::{NewTask, ProductionTask, TaskPatch};

/// What a status change did to the pole counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// `current_step` moved forward.
    Advanced { pole: Pole, from: u32, to: u32 },
    /// The step is at or behind the counter; nothing changed.
    AlreadyAhead { pole: Pole, step: u32, current: u32 },
    /// The task no longer matches any step of its pole; nothing changed.
    StepNotInCatalog { pole: Pole },
    /// The new status is not `Done`; counters are never lowered here.
    NotCompleted,
    /// The task belongs to no project.
    Unlinked,
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reconciliation::Advanced { pole, from, to } => {
                write!(f, "{} advanced from step {} to {}", format_pole(*pole), from, to)
            }
            Reconciliation::AlreadyAhead { pole, step, current } => {
                write!(f, "{} already at step {} (task is step {})", format_pole(*pole), current, step)
            }
            Reconciliation::StepNotInCatalog { pole } => {
                write!(f, "no {} step matches this task, progress unchanged", format_pole(*pole))
            }
            Reconciliation::NotCompleted => write!(f, "progress unchanged"),
            Reconciliation::Unlinked => write!(f, "task has no project"),
        }
    }
}

/// Applies task completions to pole counters through a record store.
pub struct ProgressReconciler<'a, S: RecordStore + ?Sized> {
    store: &'a mut S,
    catalog: &'a WorkflowCatalog,
}

impl<'a, S: RecordStore + ?Sized> ProgressReconciler<'a, S> {
    pub fn new(store: &'a mut S, catalog: &'a WorkflowCatalog) -> Self {
        ProgressReconciler { store, catalog }
    }

    /// The project's task for `(title, pole)`, creating it when missing.
    ///
    /// A new task is built from the matching catalog step when there is one,
    /// otherwise from a minimal default due on the wedding day.
    pub fn find_or_create_task(
        &mut self,
        project: &Project,
        title: &str,
        pole: Pole,
    ) -> Result<ProductionTask, StoreError> {
        let filter = TaskFilter {
            project_id: Some(project.id),
            pole: Some(pole),
            title: Some(title.to_string()),
            include_archived: true,
            ..Default::default()
        };
        if let Some(existing) = self.store.query_tasks(&filter)?.into_iter().next() {
            return Ok(existing);
        }

        let draft = match self.catalog.find_template(project_formula(project), title, pole) {
            Some(template) => task_from_template(project, template),
            None => NewTask {
                project_id: Some(project.id),
                title: title.trim().to_string(),
                pole,
                deadline: project.wedding_date,
                status: TaskStatus::Todo,
                priority: Priority::Medium,
                phase: Phase::PostProd,
                assigned_to: String::new(),
                evaluation: None,
                archived: false,
                template_key: None,
            },
        };
        let task = self.store.insert_task(draft)?;
        info!(project_id = project.id, task_id = task.id, pole = format_pole(pole), title = %task.title, "Created missing task");
        Ok(task)
    }

    /// Persist `new_status` on the task, then advance its pole when the task
    /// is now done.
    ///
    /// The two writes are not atomic: if the pole write fails the task stays
    /// done and `reconcile_project` can repair the counter later.
    pub fn on_task_status_change(
        &mut self,
        task: &ProductionTask,
        new_status: TaskStatus,
    ) -> Result<Reconciliation, StoreError> {
        let task = self.store.update_task(task.id, &TaskPatch::status(new_status))?;
        debug!(task_id = task.id, status = format_status(new_status), "Task status saved");
        if new_status != TaskStatus::Done {
            return Ok(Reconciliation::NotCompleted);
        }
        self.advance(&task)
    }

    /// Move the pole counter up to the step number of a completed task.
    pub fn advance(&mut self, task: &ProductionTask) -> Result<Reconciliation, StoreError> {
        let Some(project_id) = task.project_id else {
            return Ok(Reconciliation::Unlinked);
        };
        let project = self.store.project(project_id)?;
        let formula = project_formula(&project);

        let Some(step) = self.catalog.step_number(formula, task.pole, task.template_key.as_deref(), &task.title)
        else {
            warn!(
                project_id,
                task_id = task.id,
                pole = format_pole(task.pole),
                title = %task.title,
                "Completed task has no step in the current catalog, progress unchanged"
            );
            return Ok(Reconciliation::StepNotInCatalog { pole: task.pole });
        };

        let current = project.pole(task.pole).current_step;
        if step <= current {
            return Ok(Reconciliation::AlreadyAhead { pole: task.pole, step, current });
        }

        let patch = PoleStatusPatch {
            current_step: Some(step),
            status: Some(PoleState::InProgress),
            ..Default::default()
        };
        self.store.update_pole_status(project_id, task.pole, &patch)?;
        info!(project_id, pole = format_pole(task.pole), from = current, to = step, "Pole advanced");
        Ok(Reconciliation::Advanced { pole: task.pole, from: current, to: step })
    }

    /// Mark a pole `Completed` once its counter has reached the last step.
    /// Returns whether the pole was promoted.
    pub fn finalize_pole(&mut self, project_id: u64, pole: Pole) -> Result<bool, StoreError> {
        let project = self.store.project(project_id)?;
        let total = self.catalog.step_count(project_formula(&project), pole);
        let status = project.pole(pole);
        if total == 0 || status.current_step < total || status.status == PoleState::Completed {
            return Ok(false);
        }
        let patch = PoleStatusPatch { status: Some(PoleState::Completed), ..Default::default() };
        self.store.update_pole_status(project_id, pole, &patch)?;
        info!(project_id, pole = format_pole(pole), steps = total, "Pole completed");
        Ok(true)
    }

    /// Set a pole's counter by hand. Unlike reconciliation this may lower it.
    pub fn set_pole_step(
        &mut self,
        project_id: u64,
        pole: Pole,
        step: u32,
        status: Option<PoleState>,
    ) -> Result<Project, StoreError> {
        let patch = PoleStatusPatch { current_step: Some(step), status, ..Default::default() };
        let project = self.store.update_pole_status(project_id, pole, &patch)?;
        info!(project_id, pole = format_pole(pole), step, "Pole step set by hand");
        Ok(project)
    }

    /// Replay every completed task of a project, then finalize its poles.
    /// Repairs counters left behind by a failed pole write.
    pub fn reconcile_project(&mut self, project_id: u64) -> Result<Vec<Reconciliation>, StoreError> {
        let filter = TaskFilter { status: Some(TaskStatus::Done), ..TaskFilter::project(project_id) };
        let done = self.store.query_tasks(&filter)?;
        let mut outcomes = Vec::with_capacity(done.len());
        for task in &done {
            outcomes.push(self.advance(task)?);
        }
        for pole in Pole::ALL {
            self.finalize_pole(project_id, pole)?;
        }
        Ok(outcomes)
    }
}
