//! Task generation: expand a project's formula into concrete tasks.

use chrono::{Duration, NaiveDate};

use crate::catalog::{WorkflowCatalog, FALLBACK_FORMULA};
use crate::fields::*;
use crate::project::Project;
use crate::task::{NewTask, TaskTemplate};

/// Formula the generator and reconciler use for `project`.
pub fn project_formula(project: &Project) -> &str {
    project
        .formula
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(FALLBACK_FORMULA)
}

/// `wedding_date + day_offset` days, saturating at the calendar bounds.
pub fn deadline_for(wedding_date: NaiveDate, day_offset: i32) -> NaiveDate {
    wedding_date
        .checked_add_signed(Duration::days(i64::from(day_offset)))
        .unwrap_or(if day_offset < 0 { NaiveDate::MIN } else { NaiveDate::MAX })
}

/// Unsaved task for one template of `project`.
pub fn task_from_template(project: &Project, template: &TaskTemplate) -> NewTask {
    NewTask {
        project_id: Some(project.id),
        title: template.title.clone(),
        pole: template.pole,
        deadline: deadline_for(project.wedding_date, template.day_offset),
        status: TaskStatus::Todo,
        priority: priority_for_offset(template.day_offset),
        phase: phase_for_offset(template.day_offset),
        assigned_to: template.default_assignee.clone(),
        evaluation: None,
        archived: false,
        template_key: template.key.clone(),
    }
}

/// One unsaved task per template of the project's formula, in catalog order.
///
/// This is a pure function of the wedding date, the formula and the catalog.
/// It does not look at tasks the project may already have.
pub fn generate_tasks(project: &Project, catalog: &WorkflowCatalog) -> Vec<NewTask> {
    catalog
        .templates(project_formula(project))
        .iter()
        .map(|template| task_from_template(project, template))
        .collect()
}
