//! JSON-file record store and display helpers.
//!
//! `Database` keeps projects, production tasks and the override catalog in a
//! single pretty-printed JSON document. Every mutation is written back with
//! an atomic temp-file-and-rename. A database opened without a path lives in
//! memory only.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::fields::*;
use crate::project::{NewProject, PoleStatusPatch, Project};
use crate::store::{RecordStore, TaskFilter};
use crate::task::{FormulaSteps, NewTask, ProductionTask, TaskPatch};

/// The studio's project and task database.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub tasks: Vec<ProductionTask>,
    /// Override catalog as last synced by the configuration editor.
    #[serde(default)]
    pub workflow_configs: Vec<FormulaSteps>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Database {
    /// An empty database that is never written to disk.
    pub fn in_memory() -> Self {
        Database::default()
    }

    /// Load the database at `path`; a missing file yields an empty database
    /// that will be created on first write.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut db = if path.exists() {
            let mut buf = String::new();
            File::open(path)?.read_to_string(&mut buf)?;
            let db: Database = serde_json::from_str(&buf)?;
            debug!(path = %path.display(), projects = db.projects.len(), tasks = db.tasks.len(), "Loaded database");
            db
        } else {
            info!(path = %path.display(), "No database yet, starting empty");
            Database::default()
        };
        db.path = Some(path.to_path_buf());
        Ok(db)
    }

    /// Save database to JSON file using atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(self)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    fn persist(&self) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => self.save(path),
            None => Ok(()),
        }
    }

    /// Persist, or undo the in-memory change when the write fails.
    fn persist_or_rollback(&mut self, rollback: impl FnOnce(&mut Self)) -> Result<(), StoreError> {
        match self.persist() {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Database write failed, change discarded");
                rollback(self);
                Err(e)
            }
        }
    }

    fn next_task_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    fn next_project_id(&self) -> u64 {
        self.projects.iter().map(|p| p.id).max().unwrap_or(0) + 1
    }

    fn project_mut(&mut self, id: u64) -> Result<&mut Project, StoreError> {
        self.projects.iter_mut().find(|p| p.id == id).ok_or(StoreError::ProjectNotFound(id))
    }

    fn task_mut(&mut self, id: u64) -> Result<&mut ProductionTask, StoreError> {
        self.tasks.iter_mut().find(|t| t.id == id).ok_or(StoreError::TaskNotFound(id))
    }
}

impl RecordStore for Database {
    fn projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.projects.clone())
    }

    fn project(&self, id: u64) -> Result<Project, StoreError> {
        self.projects.iter().find(|p| p.id == id).cloned().ok_or(StoreError::ProjectNotFound(id))
    }

    fn insert_project(&mut self, project: NewProject) -> Result<Project, StoreError> {
        let project = Project::from_new(self.next_project_id(), project, Utc::now().timestamp());
        self.projects.push(project.clone());
        self.persist_or_rollback(|db| {
            db.projects.pop();
        })?;
        Ok(project)
    }

    fn update_pole_status(
        &mut self,
        project_id: u64,
        pole: Pole,
        patch: &PoleStatusPatch,
    ) -> Result<Project, StoreError> {
        let project = self.project_mut(project_id)?;
        let previous = project.pole(pole).clone();
        patch.apply(project.poles.get_mut(pole));
        let updated = project.clone();
        self.persist_or_rollback(|db| {
            if let Ok(project) = db.project_mut(project_id) {
                *project.poles.get_mut(pole) = previous;
            }
        })?;
        Ok(updated)
    }

    fn query_tasks(&self, filter: &TaskFilter) -> Result<Vec<ProductionTask>, StoreError> {
        Ok(self.tasks.iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    fn task(&self, id: u64) -> Result<ProductionTask, StoreError> {
        self.tasks.iter().find(|t| t.id == id).cloned().ok_or(StoreError::TaskNotFound(id))
    }

    fn insert_task(&mut self, task: NewTask) -> Result<ProductionTask, StoreError> {
        let task = ProductionTask::from_new(self.next_task_id(), task, Utc::now().timestamp());
        self.tasks.push(task.clone());
        self.persist_or_rollback(|db| {
            db.tasks.pop();
        })?;
        Ok(task)
    }

    fn update_task(&mut self, id: u64, patch: &TaskPatch) -> Result<ProductionTask, StoreError> {
        let task = self.task_mut(id)?;
        let previous = task.clone();
        patch.apply(task);
        task.updated_at_utc = Utc::now().timestamp();
        let updated = task.clone();
        self.persist_or_rollback(|db| {
            if let Ok(task) = db.task_mut(id) {
                *task = previous;
            }
        })?;
        Ok(updated)
    }

    fn upsert_override_catalog(&mut self, payload: &[FormulaSteps]) -> Result<(), StoreError> {
        let previous = std::mem::replace(&mut self.workflow_configs, payload.to_vec());
        self.persist_or_rollback(|db| db.workflow_configs = previous)
    }

    fn override_catalog(&self) -> Result<Vec<FormulaSteps>, StoreError> {
        Ok(self.workflow_configs.clone())
    }
}

/// Parse a date given as `YYYY-MM-DD`, "today", "tomorrow", "yesterday",
/// "in Nd" or "in Nw".
pub fn parse_date_input(s: &str) -> Option<NaiveDate> {
    let s = s.trim().to_lowercase();
    let today = Local::now().date_naive();

    match s.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        "yesterday" => return today.pred_opt(),
        _ => {}
    }

    // Out-of-range offsets are not a date.
    if let Some(rest) = s.strip_prefix("in ") {
        if let Some(nd) = rest.strip_suffix('d') {
            if let Ok(days) = nd.trim().parse::<i64>() {
                return Duration::try_days(days).and_then(|d| today.checked_add_signed(d));
            }
        }
        if let Some(nw) = rest.strip_suffix('w') {
            if let Ok(weeks) = nw.trim().parse::<i64>() {
                return Duration::try_weeks(weeks).and_then(|d| today.checked_add_signed(d));
            }
        }
    }

    NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()
}

/// Format a deadline relative to today ("today", "tomorrow", "in 3d", "2d late").
pub fn format_due_relative(due: NaiveDate, today: NaiveDate) -> String {
    let delta = (due - today).num_days();
    if delta == 0 {
        "today".into()
    } else if delta == 1 {
        "tomorrow".into()
    } else if delta > 1 {
        format!("in {}d", delta)
    } else {
        format!("{}d late", -delta)
    }
}

/// Format a wedding date with its weekday, e.g. "Sat 2025-03-01".
pub fn format_wedding_date(d: NaiveDate) -> String {
    format!("{} {}", d.weekday(), d)
}

/// Truncate a string to a maximum width, adding ellipsis if needed.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out = String::new();
        for (i, ch) in s.chars().enumerate() {
            if i + 1 >= width {
                out.push('…');
                break;
            }
            out.push(ch);
        }
        out
    }
}

/// Print tasks in a formatted table, optionally with the owning project's name.
pub fn print_task_table(tasks: &[&ProductionTask], project_names: Option<&HashMap<u64, String>>) {
    println!(
        "{:<5} {:<6} {:<11} {:<7} {:<10} {:<11} {:<18} {}",
        "ID", "Pole", "Status", "Pri", "Phase", "Due", "Assigned", "Title"
    );
    let today = Local::now().date_naive();
    for t in tasks {
        let project = project_names
            .and_then(|names| t.project_id.and_then(|pid| names.get(&pid)))
            .map(|name| format!("  ({})", name))
            .unwrap_or_default();
        let archived = if t.archived { " [archived]" } else { "" };
        println!(
            "{:<5} {:<6} {:<11} {:<7} {:<10} {:<11} {:<18} {}{}{}",
            t.id,
            format_pole(t.pole),
            format_status(t.status),
            format_priority(t.priority),
            format_phase(t.phase),
            format_due_relative(t.deadline, today),
            truncate(&t.assigned_to, 18),
            t.title,
            archived,
            project
        );
    }
}

/// Resolve a project identifier (either ID or name) to a project ID.
/// Returns an error if the name has multiple matches and suggests using ID instead.
pub fn resolve_project_identifier(identifier: &str, projects: &[Project]) -> Result<u64, String> {
    if let Ok(id) = identifier.parse::<u64>() {
        return if projects.iter().any(|p| p.id == id) {
            Ok(id)
        } else {
            Err(format!("Project with ID {} not found", id))
        };
    }

    let wanted = identifier.trim().to_lowercase();
    let matches: Vec<&Project> = projects.iter().filter(|p| p.name.to_lowercase() == wanted).collect();

    match matches.len() {
        0 => Err(format!("No project found with name '{}'", identifier)),
        1 => Ok(matches[0].id),
        _ => {
            let mut error_msg = format!("Multiple projects found with name '{}':\n", identifier);
            for project in matches {
                error_msg.push_str(&format!("  ID {}: {} ({})\n", project.id, project.name, project.wedding_date));
            }
            error_msg.push_str("Please use the specific ID instead.");
            Err(error_msg)
        }
    }
}
