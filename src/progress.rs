//! Read-side helpers: per-pole progress and overdue tasks.

use chrono::NaiveDate;

use crate::catalog::WorkflowCatalog;
use crate::fields::{Pole, PoleState, TaskStatus};
use crate::generator::project_formula;
use crate::project::Project;
use crate::task::ProductionTask;

/// Progress of one pole against the project's formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoleProgress {
    pub pole: Pole,
    pub current: u32,
    pub total: u32,
    pub state: PoleState,
}

impl PoleProgress {
    /// Completion ratio in `0.0..=1.0`. A pole without steps counts as empty.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (f64::from(self.current.min(self.total)) / f64::from(self.total)).clamp(0.0, 1.0)
        }
    }

    pub fn percent(&self) -> u16 {
        (self.ratio() * 100.0).round() as u16
    }

    /// "3/5", or "-" for a pole the formula does not use.
    pub fn label(&self) -> String {
        if self.total == 0 {
            "-".to_string()
        } else {
            format!("{}/{}", self.current.min(self.total), self.total)
        }
    }
}

/// Progress of every pole, in `Pole::ALL` order.
pub fn pole_progress(project: &Project, catalog: &WorkflowCatalog) -> Vec<PoleProgress> {
    let formula = project_formula(project);
    Pole::ALL
        .iter()
        .map(|&pole| {
            let status = project.pole(pole);
            PoleProgress {
                pole,
                current: status.current_step,
                total: catalog.step_count(formula, pole),
                state: status.status,
            }
        })
        .collect()
}

/// Open, non-archived tasks due before `today`, earliest first.
pub fn overdue_tasks<'a>(tasks: &'a [ProductionTask], today: NaiveDate) -> Vec<&'a ProductionTask> {
    let mut late: Vec<&ProductionTask> = tasks.iter().filter(|t| t.is_overdue(today)).collect();
    late.sort_by_key(|t| (t.deadline, t.id));
    late
}

/// Number of tasks still open (not done, not archived).
pub fn open_count(tasks: &[ProductionTask]) -> usize {
    tasks.iter().filter(|t| !t.archived && t.status != TaskStatus::Done).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::generator::generate_tasks;
    use crate::project::{NewProject, PoleStatusPatch};
    use crate::store::{RecordStore, TaskFilter};
    use crate::task::TaskPatch;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded(formula: &str) -> (Database, Project) {
        let mut db = Database::in_memory();
        let project = db
            .insert_project(NewProject {
                name: "Dubois".into(),
                wedding_date: date(2025, 3, 1),
                formula: Some(formula.into()),
            })
            .unwrap();
        for task in generate_tasks(&project, &WorkflowCatalog::new()) {
            db.insert_task(task).unwrap();
        }
        (db, project)
    }

    #[test]
    fn test_pole_progress_totals() {
        let (mut db, project) = seeded("Photo only");
        let patch = PoleStatusPatch { current_step: Some(2), ..Default::default() };
        let project = db.update_pole_status(project.id, Pole::Photo, &patch).unwrap();

        let progress = pole_progress(&project, &WorkflowCatalog::new());
        assert_eq!(progress.len(), 4);
        let photo = progress[0];
        assert_eq!((photo.current, photo.total), (2, 5));
        assert_eq!(photo.percent(), 40);
        assert_eq!(photo.label(), "2/5");

        let film = progress[1];
        assert_eq!(film.total, 0);
        assert_eq!(film.ratio(), 0.0);
        assert_eq!(film.label(), "-");
    }

    #[test]
    fn test_ratio_is_clamped_when_catalog_shrinks() {
        let p = PoleProgress { pole: Pole::Com, current: 7, total: 5, state: PoleState::Completed };
        assert_eq!(p.ratio(), 1.0);
        assert_eq!(p.label(), "5/5");
    }

    #[test]
    fn test_overdue_tasks() {
        let (mut db, project) = seeded("Photo only");
        let mut tasks = db.query_tasks(&TaskFilter::project(project.id)).unwrap();
        // Photo culling is due 2025-03-11.
        let culling = tasks.iter().find(|t| t.title == "Photo culling").unwrap().id;
        db.update_task(culling, &TaskPatch::status(TaskStatus::Done)).unwrap();
        tasks = db.query_tasks(&TaskFilter::project(project.id)).unwrap();

        let late = overdue_tasks(&tasks, date(2025, 3, 20));
        assert!(late.iter().all(|t| t.status != TaskStatus::Done));
        assert!(late.iter().all(|t| t.deadline < date(2025, 3, 20)));
        assert!(late.windows(2).all(|w| w[0].deadline <= w[1].deadline));
        assert!(late.iter().any(|t| t.title == "Photo colour grading"));
        assert!(overdue_tasks(&tasks, date(2024, 1, 1)).is_empty());
        assert_eq!(open_count(&tasks), tasks.len() - 1);
    }
}
