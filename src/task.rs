//! Task and template data structures.
//!
//! `TaskTemplate` is the catalog-side description of one workflow step.
//! `ProductionTask` is the persisted, project-scoped record generated from it,
//! and `NewTask` is the same record before the store has assigned an id.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::fields::*;

/// Highest evaluation score a task can receive.
pub const MAX_EVALUATION: u8 = 20;

/// A project-independent workflow step defined by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    /// Stable identity, kept when the title is edited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub title: String,
    pub day_offset: i32,
    pub default_assignee: String,
    pub pole: Pole,
}

impl TaskTemplate {
    pub fn new(key: &str, title: &str, day_offset: i32, default_assignee: &str, pole: Pole) -> Self {
        TaskTemplate {
            key: Some(key.to_string()),
            title: title.to_string(),
            day_offset,
            default_assignee: default_assignee.to_string(),
            pole,
        }
    }

    /// Whether `title` names this step (case-insensitive, trimmed).
    pub fn matches_title(&self, title: &str) -> bool {
        normalise_title(&self.title) == normalise_title(title)
    }
}

/// The steps of one formula, as persisted in the override catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaSteps {
    pub formula: String,
    pub steps: Vec<TaskTemplate>,
}

/// Shallow patch applied to a template by the configuration editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepPatch {
    pub title: Option<String>,
    pub day_offset: Option<i32>,
    pub default_assignee: Option<String>,
    pub pole: Option<Pole>,
}

impl StepPatch {
    pub fn apply(&self, step: &mut TaskTemplate) {
        if let Some(title) = &self.title {
            step.title = title.clone();
        }
        if let Some(offset) = self.day_offset {
            step.day_offset = offset;
        }
        if let Some(who) = &self.default_assignee {
            step.default_assignee = who.clone();
        }
        if let Some(pole) = self.pole {
            step.pole = pole;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.day_offset.is_none()
            && self.default_assignee.is_none()
            && self.pole.is_none()
    }
}

/// A production task that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub project_id: Option<u64>,
    pub title: String,
    pub pole: Pole,
    pub deadline: NaiveDate,
    pub status: TaskStatus,
    pub priority: Priority,
    pub phase: Phase,
    pub assigned_to: String,
    pub evaluation: Option<u8>,
    pub archived: bool,
    pub template_key: Option<String>,
}

/// A persisted production task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionTask {
    pub id: u64,
    #[serde(default)]
    pub project_id: Option<u64>,
    pub title: String,
    pub pole: Pole,
    pub deadline: NaiveDate,
    pub status: TaskStatus,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default = "default_phase")]
    pub phase: Phase,
    #[serde(default)]
    pub assigned_to: String,
    #[serde(default)]
    pub evaluation: Option<u8>,
    #[serde(default)]
    pub archived: bool,
    /// Key of the template this task was generated from. Absent on legacy
    /// records, which are matched by title instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_key: Option<String>,
    #[serde(default)]
    pub created_at_utc: i64,
    #[serde(default)]
    pub updated_at_utc: i64,
}

fn default_priority() -> Priority {
    Priority::Medium
}

fn default_phase() -> Phase {
    Phase::PostProd
}

impl ProductionTask {
    /// Build the persisted record from a draft and the id the store chose.
    pub fn from_new(id: u64, task: NewTask, now_utc: i64) -> Self {
        ProductionTask {
            id,
            project_id: task.project_id,
            title: task.title,
            pole: task.pole,
            deadline: task.deadline,
            status: task.status,
            priority: task.priority,
            phase: task.phase,
            assigned_to: task.assigned_to,
            evaluation: task.evaluation,
            archived: task.archived,
            template_key: task.template_key,
            created_at_utc: now_utc,
            updated_at_utc: now_utc,
        }
    }

    /// Open tasks past their deadline.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.archived && self.status != TaskStatus::Done && self.deadline < today
    }
}

/// Field updates for a stored task; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub assigned_to: Option<String>,
    pub evaluation: Option<u8>,
    pub archived: Option<bool>,
    pub priority: Option<Priority>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        TaskPatch { status: Some(status), ..Default::default() }
    }

    /// Quality score on the studio's 0 to 20 scale.
    pub fn evaluation(score: u8) -> Result<Self, WorkflowError> {
        if score > MAX_EVALUATION {
            return Err(WorkflowError::InvalidEvaluation(score));
        }
        Ok(TaskPatch { evaluation: Some(score), ..Default::default() })
    }

    pub fn apply(&self, task: &mut ProductionTask) {
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(who) = &self.assigned_to {
            task.assigned_to = who.clone();
        }
        if let Some(score) = self.evaluation {
            task.evaluation = Some(score);
        }
        if let Some(archived) = self.archived {
            task.archived = archived;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
    }
}

/// Normalise a title for identity comparison: trimmed and lowercased.
pub fn normalise_title(s: &str) -> String {
    s.trim().to_lowercase()
}
