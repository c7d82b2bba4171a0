//! Command implementations for the CLI interface.
//!
//! Handlers take the opened `Workspace` (database, catalog, cache and
//! configuration) and return `anyhow::Result`; `main` prints the error chain.
//! Every status change goes through `ProgressReconciler`.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::Subcommand;
use clap_complete::{generate, Shell};
use tracing::info;

use crate::cache::{load_catalog, CatalogCache};
use crate::catalog::WorkflowCatalog;
use crate::config::StudioConfig;
use crate::db::*;
use crate::editor::{ConfigEditor, SaveOutcome};
use crate::fields::*;
use crate::generator::{generate_tasks, project_formula};
use crate::progress::{open_count, overdue_tasks, pole_progress};
use crate::project::{NewProject, Project};
use crate::reconciler::{ProgressReconciler, Reconciliation};
use crate::store::{RecordStore, TaskFilter};
use crate::task::{ProductionTask, StepPatch, TaskPatch, TaskTemplate};
use crate::tui::workflow_run::run_board_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Manage wedding projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Generate the project's tasks from its formula.
    Inject {
        /// Project ID or name.
        project: String,
        /// Inject even if the project already has tasks.
        #[arg(long)]
        force: bool,
    },

    /// List a project's tasks.
    Tasks {
        /// Project ID or name.
        project: String,
        /// Only show one pole.
        #[arg(long, value_enum)]
        pole: Option<Pole>,
        /// Include done and archived tasks.
        #[arg(long)]
        all: bool,
    },

    /// List open tasks past their deadline, across projects.
    Overdue,

    /// Mark a task done and advance its pole.
    Complete {
        /// Task ID.
        task: u64,
    },

    /// Set a done task back to todo. Pole progress is kept.
    Reopen {
        /// Task ID.
        task: u64,
    },

    /// Complete a step by title, creating the task if the project lacks it.
    Step {
        /// Project ID or name.
        project: String,
        /// Pole the step belongs to.
        #[arg(value_enum)]
        pole: Pole,
        /// Step title, matched case-insensitively.
        title: String,
    },

    /// Assign a task to someone.
    Assign {
        task: u64,
        who: String,
    },

    /// Record a quality evaluation (0 to 20) on a task.
    Evaluate {
        task: u64,
        score: u8,
    },

    /// Hide a task from listings.
    Archive {
        task: u64,
    },

    /// Set pole counters by hand.
    Pole {
        #[command(subcommand)]
        action: PoleAction,
    },

    /// Replay completed tasks of a project to repair pole counters.
    Reconcile {
        /// Project ID or name.
        project: String,
    },

    /// Inspect and edit the workflow catalog.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Launch the production board interface.
    Board,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type: bash | zsh | fish | powershell | elvish
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Create a project.
    Add {
        /// Couple or project name.
        name: String,
        /// Wedding date: YYYY-MM-DD, "today", "tomorrow", or "in Nd".
        #[arg(long)]
        date: String,
        /// Service formula, e.g. "Photo + Film long".
        #[arg(long)]
        formula: Option<String>,
    },
    /// List projects with their pole progress.
    List,
    /// Show one project.
    View {
        /// Project ID or name.
        project: String,
    },
}

#[derive(Subcommand)]
pub enum PoleAction {
    /// Set a pole's current step, and optionally its state.
    Set {
        /// Project ID or name.
        project: String,
        #[arg(value_enum)]
        pole: Pole,
        #[arg(long)]
        step: u32,
        #[arg(long, value_enum)]
        status: Option<PoleState>,
    },
}

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List formula names with their step counts.
    Formulas,
    /// Show the steps of a formula. `#` is the number the edit commands take.
    Show {
        formula: String,
        /// Only show one pole, in progress order; `Step` is its progress number.
        #[arg(long, value_enum)]
        pole: Option<Pole>,
    },
    /// Create a formula with one placeholder step.
    AddFormula {
        name: String,
    },
    /// Append a step to a formula.
    AddStep {
        formula: String,
        #[arg(long)]
        title: Option<String>,
        /// Days from the wedding date; negative means before.
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<i32>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long, value_enum)]
        pole: Option<Pole>,
    },
    /// Change fields of a step, by the `#` column of `show`.
    UpdateStep {
        formula: String,
        step: usize,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<i32>,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long, value_enum)]
        pole: Option<Pole>,
    },
    /// Remove a step, by the `#` column of `show`.
    RemoveStep {
        formula: String,
        step: usize,
    },
}

/// Everything a command needs, opened once per invocation.
pub struct Workspace {
    pub db: Database,
    pub catalog: WorkflowCatalog,
    pub cache: CatalogCache,
    pub config: StudioConfig,
}

impl Workspace {
    /// Open the database at `db_path` and load the catalog in effect.
    pub fn open(config: StudioConfig, db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        let cache = CatalogCache::new(&config.catalog_cache_path());
        let catalog = load_catalog(&db, &cache);
        Ok(Workspace { db, catalog, cache, config })
    }

    fn project(&self, identifier: &str) -> Result<Project> {
        let projects = self.db.projects()?;
        let id = resolve_project_identifier(identifier, &projects).map_err(|e| anyhow!(e))?;
        Ok(self.db.project(id)?)
    }

    fn task(&self, id: u64) -> Result<ProductionTask> {
        Ok(self.db.task(id)?)
    }

    fn project_names(&self) -> Result<HashMap<u64, String>> {
        Ok(self.db.projects()?.into_iter().map(|p| (p.id, p.name)).collect())
    }
}

/// Dispatch a parsed command.
pub fn run(mut ws: Workspace, command: Commands) -> Result<()> {
    match command {
        Commands::Project { action } => cmd_project(&mut ws, action),
        Commands::Inject { project, force } => cmd_inject(&mut ws, &project, force),
        Commands::Tasks { project, pole, all } => cmd_tasks(&ws, &project, pole, all),
        Commands::Overdue => cmd_overdue(&ws),
        Commands::Complete { task } => cmd_complete(&mut ws, task),
        Commands::Reopen { task } => cmd_reopen(&mut ws, task),
        Commands::Step { project, pole, title } => cmd_step(&mut ws, &project, pole, &title),
        Commands::Assign { task, who } => cmd_assign(&mut ws, task, who),
        Commands::Evaluate { task, score } => cmd_evaluate(&mut ws, task, score),
        Commands::Archive { task } => cmd_archive(&mut ws, task),
        Commands::Pole { action } => cmd_pole(&mut ws, action),
        Commands::Reconcile { project } => cmd_reconcile(&mut ws, &project),
        Commands::Catalog { action } => cmd_catalog(&mut ws, action),
        Commands::Board => cmd_board(ws),
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }
    }
}

/// Handle project management commands.
pub fn cmd_project(ws: &mut Workspace, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Add { name, date, formula } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("Project name cannot be empty");
            }
            let wedding_date = parse_date_input(&date)
                .ok_or_else(|| anyhow!("Invalid date '{}'. Use YYYY-MM-DD, today, tomorrow or in Nd.", date))?;
            let formula = formula.or_else(|| ws.config.default_formula.clone());
            if let Some(f) = &formula {
                if !ws.catalog.is_known(f) {
                    println!("Note: formula '{}' is not in the catalog; its tasks will follow the default workflow.", f);
                }
            }

            let project = ws.db.insert_project(NewProject { name, wedding_date, formula })?;
            info!(project_id = project.id, name = %project.name, "Project created");
            println!(
                "Created project {}: {} ({}, {})",
                project.id,
                project.name,
                format_wedding_date(project.wedding_date),
                project_formula(&project)
            );
        }

        ProjectAction::List => {
            let mut projects = ws.db.projects()?;
            if projects.is_empty() {
                println!("No projects found.");
                return Ok(());
            }
            projects.sort_by_key(|p| (p.wedding_date, p.id));

            println!(
                "{:<5} {:<24} {:<15} {:<28} {:<6} {:<6} {:<6} {:<6}",
                "ID", "Name", "Wedding", "Formula", "PHOTO", "FILM", "DVD", "COM"
            );
            for project in &projects {
                let labels: Vec<String> =
                    pole_progress(project, &ws.catalog).iter().map(|p| p.label()).collect();
                println!(
                    "{:<5} {:<24} {:<15} {:<28} {:<6} {:<6} {:<6} {:<6}",
                    project.id,
                    truncate(&project.name, 24),
                    format_wedding_date(project.wedding_date),
                    truncate(project_formula(project), 28),
                    labels[0],
                    labels[1],
                    labels[2],
                    labels[3]
                );
            }
        }

        ProjectAction::View { project } => {
            let project = ws.project(&project)?;
            let tasks = ws.db.query_tasks(&TaskFilter::project(project.id))?;
            let today = Local::now().date_naive();

            println!("Project {}: {}", project.id, project.name);
            println!("Wedding:  {}", format_wedding_date(project.wedding_date));
            println!("Formula:  {}", project_formula(&project));
            if let Some(f) = &project.formula {
                if !ws.catalog.is_known(f) {
                    println!("          ('{}' is unknown, default workflow applies)", f);
                }
            }
            println!(
                "Tasks:    {} total, {} open, {} overdue",
                tasks.len(),
                open_count(&tasks),
                overdue_tasks(&tasks, today).len()
            );
            println!();
            println!("{:<6} {:<12} {:<12} {:<18} {}", "Pole", "Step", "State", "Assigned", "Planned");
            for progress in pole_progress(&project, &ws.catalog) {
                let status = project.pole(progress.pole);
                println!(
                    "{:<6} {:<12} {:<12} {:<18} {}",
                    format_pole(progress.pole),
                    format!("{} {:>3}%", progress.label(), progress.percent()),
                    format_pole_state(progress.state),
                    truncate(if status.assigned_to.is_empty() { "-" } else { &status.assigned_to }, 18),
                    status.planned_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
                );
            }
        }
    }
    Ok(())
}

/// Generate and store the project's tasks.
pub fn cmd_inject(ws: &mut Workspace, project: &str, force: bool) -> Result<()> {
    let project = ws.project(project)?;
    let existing = ws.db.query_tasks(&TaskFilter::project(project.id))?;
    if !existing.is_empty() && !force {
        bail!(
            "Project '{}' already has {} tasks. Use --force to inject the workflow again.",
            project.name,
            existing.len()
        );
    }

    let drafts = generate_tasks(&project, &ws.catalog);
    let count = drafts.len();
    for draft in drafts {
        ws.db.insert_task(draft)?;
    }
    info!(project_id = project.id, formula = project_formula(&project), tasks = count, "Workflow injected");
    println!("Injected {} tasks into '{}' ({})", count, project.name, project_formula(&project));
    Ok(())
}

/// List a project's tasks by deadline.
pub fn cmd_tasks(ws: &Workspace, project: &str, pole: Option<Pole>, all: bool) -> Result<()> {
    let project = ws.project(project)?;
    let filter = TaskFilter { pole, include_archived: all, ..TaskFilter::project(project.id) };
    let mut tasks = ws.db.query_tasks(&filter)?;
    if !all {
        tasks.retain(|t| t.status != TaskStatus::Done);
    }
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    tasks.sort_by_key(|t| (t.deadline, t.id));
    let refs: Vec<&ProductionTask> = tasks.iter().collect();
    print_task_table(&refs, None);
    Ok(())
}

/// List open tasks past their deadline across all projects.
pub fn cmd_overdue(ws: &Workspace) -> Result<()> {
    let tasks = ws.db.query_tasks(&TaskFilter::default())?;
    let late = overdue_tasks(&tasks, Local::now().date_naive());
    if late.is_empty() {
        println!("Nothing overdue.");
        return Ok(());
    }
    let names = ws.project_names()?;
    print_task_table(&late, Some(&names));
    Ok(())
}

fn report(task: &ProductionTask, outcome: Reconciliation, pole_completed: bool) {
    match outcome {
        Reconciliation::NotCompleted => println!("Reopened task {}: {}", task.id, task.title),
        _ => {
            println!("Completed task {}: {} ({})", task.id, task.title, outcome);
            if pole_completed {
                println!("{} pole completed.", format_pole(task.pole));
            }
        }
    }
}

/// Persist `status` and apply the reconciliation rule, finalizing the pole
/// when the counter reaches its last step.
fn change_status(ws: &mut Workspace, task: &ProductionTask, status: TaskStatus) -> Result<()> {
    let mut reconciler = ProgressReconciler::new(&mut ws.db, &ws.catalog);
    let outcome = reconciler.on_task_status_change(task, status)?;
    let completed = match (outcome, task.project_id) {
        (Reconciliation::Advanced { pole, .. }, Some(project_id)) => reconciler.finalize_pole(project_id, pole)?,
        _ => false,
    };
    report(task, outcome, completed);
    Ok(())
}

/// Mark a task done.
pub fn cmd_complete(ws: &mut Workspace, id: u64) -> Result<()> {
    let task = ws.task(id)?;
    change_status(ws, &task, TaskStatus::Done)
}

/// Reopen a task. The pole counter is left where it is.
pub fn cmd_reopen(ws: &mut Workspace, id: u64) -> Result<()> {
    let task = ws.task(id)?;
    change_status(ws, &task, TaskStatus::Todo)
}

/// Complete a step by title, creating the task first when missing.
pub fn cmd_step(ws: &mut Workspace, project: &str, pole: Pole, title: &str) -> Result<()> {
    if title.trim().is_empty() {
        bail!("Step title cannot be empty");
    }
    let project = ws.project(project)?;
    let task = ProgressReconciler::new(&mut ws.db, &ws.catalog).find_or_create_task(&project, title, pole)?;
    change_status(ws, &task, TaskStatus::Done)
}

pub fn cmd_assign(ws: &mut Workspace, id: u64, who: String) -> Result<()> {
    let patch = TaskPatch { assigned_to: Some(who.trim().to_string()), ..Default::default() };
    let task = ws.db.update_task(id, &patch)?;
    println!("Assigned task {} to {}", task.id, task.assigned_to);
    Ok(())
}

pub fn cmd_evaluate(ws: &mut Workspace, id: u64, score: u8) -> Result<()> {
    let patch = TaskPatch::evaluation(score)?;
    let task = ws.db.update_task(id, &patch)?;
    println!("Task {} evaluated {}/20", task.id, score);
    Ok(())
}

pub fn cmd_archive(ws: &mut Workspace, id: u64) -> Result<()> {
    let patch = TaskPatch { archived: Some(true), ..Default::default() };
    let task = ws.db.update_task(id, &patch)?;
    println!("Archived task {}: {}", task.id, task.title);
    Ok(())
}

/// Handle manual pole updates.
pub fn cmd_pole(ws: &mut Workspace, action: PoleAction) -> Result<()> {
    match action {
        PoleAction::Set { project, pole, step, status } => {
            let project = ws.project(&project)?;
            let total = ws.catalog.step_count(project_formula(&project), pole);
            if step > total {
                println!("Note: {} has only {} steps in '{}'.", format_pole(pole), total, project_formula(&project));
            }
            let updated = ProgressReconciler::new(&mut ws.db, &ws.catalog).set_pole_step(project.id, pole, step, status)?;
            let state = updated.pole(pole);
            println!(
                "{} of '{}' set to step {} ({})",
                format_pole(pole),
                updated.name,
                state.current_step,
                format_pole_state(state.status)
            );
        }
    }
    Ok(())
}

/// Replay completed tasks and finalize poles.
pub fn cmd_reconcile(ws: &mut Workspace, project: &str) -> Result<()> {
    let project = ws.project(project)?;
    let outcomes = ProgressReconciler::new(&mut ws.db, &ws.catalog).reconcile_project(project.id)?;
    let mut advanced = 0;
    for outcome in &outcomes {
        match outcome {
            Reconciliation::Advanced { .. } => {
                advanced += 1;
                println!("  {}", outcome);
            }
            Reconciliation::StepNotInCatalog { .. } => println!("  {}", outcome),
            _ => {}
        }
    }
    println!("Reconciled {} done tasks of '{}', {} advanced a pole", outcomes.len(), project.name, advanced);
    Ok(())
}

fn step_index(step: usize) -> Result<usize> {
    step.checked_sub(1).ok_or_else(|| anyhow!("Steps are numbered from 1"))
}

fn step_patch(title: Option<String>, offset: Option<i32>, assignee: Option<String>, pole: Option<Pole>) -> StepPatch {
    StepPatch { title, day_offset: offset, default_assignee: assignee, pole }
}

/// Write the editor's draft and adopt it as the catalog in effect.
fn save_catalog(ws: &mut Workspace, mut editor: ConfigEditor) -> Result<()> {
    if !editor.is_dirty() {
        return Ok(());
    }
    match editor.save_all(&ws.cache, &mut ws.db)? {
        SaveOutcome::Synced { formulas } => println!("Saved {} formulas.", formulas),
        SaveOutcome::LocalOnly { formulas, remote_error } => {
            println!(
                "Saved {} formulas to the local cache only; database sync failed: {}",
                formulas, remote_error
            );
        }
    }
    ws.catalog = editor.into_catalog();
    Ok(())
}

/// Steps of `formula` with their 1-based catalog number, the number
/// `update-step` and `remove-step` take. With a pole, rows follow the pole's
/// progress order.
fn step_rows<'a>(catalog: &'a WorkflowCatalog, formula: &str, pole: Option<Pole>) -> Vec<(usize, &'a TaskTemplate)> {
    let mut rows: Vec<(usize, &TaskTemplate)> = catalog
        .templates(formula)
        .iter()
        .enumerate()
        .filter(|(_, step)| pole.map_or(true, |p| step.pole == p))
        .map(|(idx, step)| (idx + 1, step))
        .collect();
    if pole.is_some() {
        rows.sort_by_key(|(_, step)| step.day_offset);
    }
    rows
}

fn print_steps(catalog: &WorkflowCatalog, formula: &str, pole: Option<Pole>) {
    println!("{:<4} {:<5} {:<6} {:>6} {:<18} {:<30} {}", "#", "Step", "Pole", "Offset", "Assignee", "Title", "Key");
    for (position, (number, step)) in step_rows(catalog, formula, pole).into_iter().enumerate() {
        // Progress step only means something within one pole.
        let progress = if pole.is_some() { (position + 1).to_string() } else { "-".to_string() };
        println!(
            "{:<4} {:<5} {:<6} {:>6} {:<18} {:<30} {}",
            number,
            progress,
            format_pole(step.pole),
            step.day_offset,
            truncate(&step.default_assignee, 18),
            truncate(&step.title, 30),
            step.key.as_deref().unwrap_or("-")
        );
    }
}

/// Handle catalog inspection and editing.
pub fn cmd_catalog(ws: &mut Workspace, action: CatalogAction) -> Result<()> {
    match action {
        CatalogAction::Formulas => {
            println!("{:<32} {:>5}  {}", "Formula", "Steps", "");
            for name in ws.catalog.formula_names() {
                let marker = if ws.catalog.has_override(&name) { "custom" } else { "" };
                println!("{:<32} {:>5}  {}", truncate(&name, 32), ws.catalog.templates(&name).len(), marker);
            }
        }

        CatalogAction::Show { formula, pole } => {
            if !ws.catalog.is_known(&formula) {
                println!("Unknown formula '{}'; projects using it follow the default workflow:", formula);
            }
            print_steps(&ws.catalog, &formula, pole);
        }

        CatalogAction::AddFormula { name } => {
            let mut editor = ConfigEditor::new(&ws.catalog);
            editor.add_formula(&name)?;
            println!("Added formula '{}'.", name.trim());
            save_catalog(ws, editor)?;
        }

        CatalogAction::AddStep { formula, title, offset, assignee, pole } => {
            let mut editor = ConfigEditor::new(&ws.catalog);
            let idx = editor.add_step(&formula)?;
            let patch = step_patch(title, offset, assignee, pole);
            if !patch.is_empty() {
                editor.update_step(&formula, idx, &patch)?;
            }
            let step = &editor.catalog().templates(&formula)[idx];
            println!("Added step {} to '{}': {}", idx + 1, formula.trim(), step.title);
            save_catalog(ws, editor)?;
        }

        CatalogAction::UpdateStep { formula, step, title, offset, assignee, pole } => {
            let patch = step_patch(title, offset, assignee, pole);
            if patch.is_empty() {
                bail!("Nothing to update. Pass --title, --offset, --assignee or --pole.");
            }
            let mut editor = ConfigEditor::new(&ws.catalog);
            editor.update_step(&formula, step_index(step)?, &patch)?;
            println!("Updated step {} of '{}'.", step, formula.trim());
            save_catalog(ws, editor)?;
        }

        CatalogAction::RemoveStep { formula, step } => {
            let mut editor = ConfigEditor::new(&ws.catalog);
            let removed = editor.remove_step(&formula, step_index(step)?)?;
            println!("Removed step {} of '{}': {}", step, formula.trim(), removed.title);
            save_catalog(ws, editor)?;
        }
    }
    Ok(())
}

/// Launch the production board.
pub fn cmd_board(ws: Workspace) -> Result<()> {
    run_board_tui(ws.db, ws.catalog).context("Board interface failed")
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkflowError;
    use chrono::NaiveDate;
    use clap::Parser;
    use std::path::PathBuf;

    fn workspace(dir: &Path) -> Workspace {
        let config = StudioConfig {
            data_dir: dir.to_path_buf(),
            database_file: "studio.json".into(),
            catalog_cache_file: "workflow_cache.json".into(),
            log_level: "warn".into(),
            default_formula: None,
        };
        let db_path = config.database_path();
        Workspace::open(config, &db_path).unwrap()
    }

    fn add_project(ws: &mut Workspace, name: &str, formula: &str) -> Project {
        ws.db
            .insert_project(NewProject {
                name: name.into(),
                wedding_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                formula: Some(formula.into()),
            })
            .unwrap()
    }

    #[test]
    fn test_cli_parses_negative_offsets() {
        let cli = crate::cli::Cli::try_parse_from([
            "studio", "catalog", "update-step", "Photo only", "2", "--offset", "-7",
        ])
        .unwrap();
        match cli.command {
            Commands::Catalog { action: CatalogAction::UpdateStep { step, offset, .. } } => {
                assert_eq!(step, 2);
                assert_eq!(offset, Some(-7));
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_cli_global_paths() {
        let cli = crate::cli::Cli::try_parse_from(["studio", "overdue", "--db", "/tmp/x.json"]).unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/x.json")));
        assert!(matches!(cli.command, Commands::Overdue));
    }

    #[test]
    fn test_project_add_uses_configured_formula() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = workspace(dir.path());
        ws.config.default_formula = Some("Photo only".into());
        let action = ProjectAction::Add { name: "Garnier".into(), date: "2025-09-06".into(), formula: None };
        cmd_project(&mut ws, action).unwrap();
        let project = ws.project("garnier").unwrap();
        assert_eq!(project.formula.as_deref(), Some("Photo only"));

        let bad = ProjectAction::Add { name: "Roux".into(), date: "someday".into(), formula: None };
        assert!(cmd_project(&mut ws, bad).is_err());
    }

    #[test]
    fn test_inject_refuses_twice_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = workspace(dir.path());
        add_project(&mut ws, "Martin & Lucas", "Photo only");

        cmd_inject(&mut ws, "1", false).unwrap();
        assert_eq!(ws.db.tasks.len(), 14);
        assert!(cmd_inject(&mut ws, "1", false).is_err());
        assert_eq!(ws.db.tasks.len(), 14);
        cmd_inject(&mut ws, "1", true).unwrap();
        assert_eq!(ws.db.tasks.len(), 28);

        // Persisted to the database file.
        let reopened = Database::open(&ws.config.database_path()).unwrap();
        assert_eq!(reopened.tasks.len(), 28);
    }

    #[test]
    fn test_complete_and_step_drive_pole_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = workspace(dir.path());
        let project = add_project(&mut ws, "Martin & Lucas", "Photo + Film long");
        cmd_inject(&mut ws, "Martin & Lucas", false).unwrap();

        let upload = ws.db.tasks.iter().find(|t| t.title == "Client gallery upload").unwrap().id;
        cmd_complete(&mut ws, upload).unwrap();
        assert_eq!(ws.db.project(project.id).unwrap().pole(Pole::Photo).current_step, 3);

        cmd_reopen(&mut ws, upload).unwrap();
        assert_eq!(ws.db.task(upload).unwrap().status, TaskStatus::Todo);
        assert_eq!(ws.db.project(project.id).unwrap().pole(Pole::Photo).current_step, 3);

        let before = ws.db.tasks.len();
        cmd_step(&mut ws, "1", Pole::Film, "Drone permit").unwrap();
        assert_eq!(ws.db.tasks.len(), before + 1);
        assert_eq!(ws.db.project(project.id).unwrap().pole(Pole::Film).current_step, 0);
    }

    #[test]
    fn test_last_step_completes_pole() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = workspace(dir.path());
        let project = add_project(&mut ws, "Martin & Lucas", "Photo only");
        cmd_step(&mut ws, "1", Pole::Dvd, "Album and USB shipping").unwrap();
        let dvd = ws.db.project(project.id).unwrap().poles.dvd;
        assert_eq!(dvd.current_step, 4);
        assert_eq!(dvd.status, PoleState::Completed);
    }

    #[test]
    fn test_evaluate_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = workspace(dir.path());
        add_project(&mut ws, "Martin & Lucas", "Photo only");
        cmd_inject(&mut ws, "1", false).unwrap();
        cmd_evaluate(&mut ws, 1, 17).unwrap();
        assert_eq!(ws.db.task(1).unwrap().evaluation, Some(17));
        let err = cmd_evaluate(&mut ws, 1, 25).unwrap_err();
        assert!(matches!(err.downcast_ref::<WorkflowError>(), Some(WorkflowError::InvalidEvaluation(25))));
    }

    #[test]
    fn test_catalog_edits_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = workspace(dir.path());
        cmd_catalog(&mut ws, CatalogAction::AddFormula { name: "Elopement".into() }).unwrap();
        cmd_catalog(
            &mut ws,
            CatalogAction::UpdateStep {
                formula: "Elopement".into(),
                step: 1,
                title: Some("Same-week gallery".into()),
                offset: Some(5),
                assignee: None,
                pole: None,
            },
        )
        .unwrap();
        assert!(cmd_catalog(&mut ws, CatalogAction::RemoveStep { formula: "Elopement".into(), step: 0 }).is_err());

        let reopened = workspace(dir.path());
        let steps = reopened.catalog.templates("Elopement");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].title, "Same-week gallery");
        assert_eq!(steps[0].day_offset, 5);
        assert!(reopened.cache.load().unwrap().is_some());
    }

    #[test]
    fn test_pole_view_numbers_are_catalog_numbers() {
        let catalog = WorkflowCatalog::new();
        let formula = "Photo + Film long";
        let rows = step_rows(&catalog, formula, Some(Pole::Film));
        let by_progress = catalog.steps_for_pole(formula, Pole::Film);
        assert_eq!(rows.len(), by_progress.len());
        for ((number, step), expected) in rows.iter().zip(by_progress) {
            assert_eq!(*step, expected);
            assert_eq!(&catalog.templates(formula)[number - 1], expected);
        }
        // Film steps come after the photo ones, so the numbers differ from positions.
        assert!(rows[0].0 > 1);

        let all = step_rows(&catalog, formula, None);
        assert_eq!(all.len(), catalog.templates(formula).len());
        assert!(all.iter().enumerate().all(|(i, (number, _))| *number == i + 1));
    }
}
