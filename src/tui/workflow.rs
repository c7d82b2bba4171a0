//! Production board interface.
//!
//! Lists every project with its pole progress on the left, and the selected
//! project's tasks on the right. Completing or reopening a task from here goes
//! through the same `ProgressReconciler` as the CLI, so the gauges move the
//! moment a task is ticked off.

use std::io;
use std::time::Duration;

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, LineGauge, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::catalog::WorkflowCatalog;
use crate::db::{format_due_relative, format_wedding_date, truncate, Database};
use crate::error::StoreError;
use crate::fields::*;
use crate::generator::project_formula;
use crate::progress::pole_progress;
use crate::project::Project;
use crate::reconciler::{ProgressReconciler, Reconciliation};
use crate::store::{RecordStore, TaskFilter};
use crate::task::ProductionTask;
use crate::tui::colors::{pole_color, text_on, GOLD};

/// Which list receives Up/Down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Projects,
    Tasks,
}

/// Main board application state
pub struct BoardApp {
    db: Database,
    catalog: WorkflowCatalog,
    projects: Vec<Project>,
    tasks: Vec<ProductionTask>, // Visible tasks of the selected project
    selected_project: usize,
    selected_task: usize,
    project_scroll: usize,
    task_scroll: usize,
    focus: Focus,
    pole_filter: Option<Pole>,
    show_completed: bool,
    show_task_detail: bool,
    filter_active: bool,
    filter_text: String,
    status_message: String,
}

fn to_io(e: StoreError) -> io::Error {
    io::Error::other(e)
}

impl BoardApp {
    pub fn new(db: Database, catalog: WorkflowCatalog) -> io::Result<Self> {
        let mut projects = db.projects().map_err(to_io)?;
        projects.sort_by_key(|p| (p.wedding_date, p.id));

        let mut app = BoardApp {
            db,
            catalog,
            projects,
            tasks: Vec::new(),
            selected_project: 0,
            selected_task: 0,
            project_scroll: 0,
            task_scroll: 0,
            focus: Focus::Projects,
            pole_filter: None,
            show_completed: false,
            show_task_detail: false,
            filter_active: false,
            filter_text: String::new(),
            status_message: String::new(),
        };
        app.update_tasks();
        Ok(app)
    }

    fn current_project(&self) -> Option<&Project> {
        self.projects.get(self.selected_project)
    }

    fn current_task(&self) -> Option<&ProductionTask> {
        self.tasks.get(self.selected_task)
    }

    /// Reload projects from the store, keeping the selection on the same project.
    fn reload_projects(&mut self) {
        let selected_id = self.current_project().map(|p| p.id);
        match self.db.projects() {
            Ok(mut projects) => {
                projects.sort_by_key(|p| (p.wedding_date, p.id));
                self.projects = projects;
            }
            Err(e) => self.set_status_message(format!("Error loading projects: {}", e)),
        }
        if let Some(id) = selected_id {
            if let Some(idx) = self.projects.iter().position(|p| p.id == id) {
                self.selected_project = idx;
            }
        }
    }

    /// Rebuild the task list for the selected project and the active filters.
    fn update_tasks(&mut self) {
        self.tasks.clear();
        let Some(project_id) = self.current_project().map(|p| p.id) else {
            self.selected_task = 0;
            return;
        };

        let filter = TaskFilter { pole: self.pole_filter, ..TaskFilter::project(project_id) };
        let tasks = match self.db.query_tasks(&filter) {
            Ok(tasks) => tasks,
            Err(e) => {
                self.set_status_message(format!("Error loading tasks: {}", e));
                return;
            }
        };

        let needle = self.filter_text.to_lowercase();
        self.tasks = tasks
            .into_iter()
            .filter(|t| !t.archived)
            .filter(|t| self.show_completed || t.status != TaskStatus::Done)
            .filter(|t| {
                needle.is_empty()
                    || t.title.to_lowercase().contains(&needle)
                    || t.assigned_to.to_lowercase().contains(&needle)
            })
            .collect();
        self.tasks.sort_by_key(|t| (t.deadline, t.id));

        if self.tasks.is_empty() {
            self.selected_task = 0;
        } else if self.selected_task >= self.tasks.len() {
            self.selected_task = self.tasks.len() - 1;
        }
    }

    fn select_project(&mut self, idx: usize) {
        if idx < self.projects.len() && idx != self.selected_project {
            self.selected_project = idx;
            self.selected_task = 0;
            self.task_scroll = 0;
            self.update_tasks();
        }
    }

    /// Complete the selected task, or reopen it when already done.
    fn toggle_task_completion(&mut self) {
        let Some(task) = self.current_task().cloned() else {
            return;
        };
        match self.apply_toggle(&task) {
            Ok(message) => self.set_status_message(message),
            Err(e) => self.set_status_message(format!("Error saving: {}", e)),
        }
        self.reload_projects();
        self.update_tasks();
    }

    fn apply_toggle(&mut self, task: &ProductionTask) -> Result<String, StoreError> {
        let new_status = if task.status == TaskStatus::Done { TaskStatus::Todo } else { TaskStatus::Done };
        let mut reconciler = ProgressReconciler::new(&mut self.db, &self.catalog);
        let outcome = reconciler.on_task_status_change(task, new_status)?;

        let message = match outcome {
            Reconciliation::NotCompleted => format!("Task #{} reopened", task.id),
            Reconciliation::Advanced { pole, .. } => {
                let finished = match task.project_id {
                    Some(project_id) => reconciler.finalize_pole(project_id, pole)?,
                    None => false,
                };
                if finished {
                    format!("Task #{} completed: {} completed", task.id, format_pole(pole))
                } else {
                    format!("Task #{} completed: {}", task.id, outcome)
                }
            }
            other => format!("Task #{} completed: {}", task.id, other),
        };
        Ok(message)
    }

    /// Replay completed tasks of the selected project.
    fn reconcile_current(&mut self) {
        let Some(project_id) = self.current_project().map(|p| p.id) else {
            return;
        };
        let result = ProgressReconciler::new(&mut self.db, &self.catalog).reconcile_project(project_id);
        match result {
            Ok(outcomes) => {
                let advanced = outcomes.iter().filter(|o| matches!(o, Reconciliation::Advanced { .. })).count();
                self.set_status_message(format!("Reconciled {} done tasks, {} advanced a pole", outcomes.len(), advanced));
            }
            Err(e) => self.set_status_message(format!("Error reconciling: {}", e)),
        }
        self.reload_projects();
        self.update_tasks();
    }

    fn cycle_pole_filter(&mut self) {
        self.pole_filter = match self.pole_filter {
            None => Some(Pole::Photo),
            Some(Pole::Photo) => Some(Pole::Film),
            Some(Pole::Film) => Some(Pole::Dvd),
            Some(Pole::Dvd) => Some(Pole::Com),
            Some(Pole::Com) => None,
        };
        self.selected_task = 0;
        self.update_tasks();
        let label = self.pole_filter.map(format_pole).unwrap_or("all poles");
        self.set_status_message(format!("Showing {}", label));
    }

    /// Set a status message
    fn set_status_message(&mut self, msg: String) {
        self.status_message = msg;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
    }

    /// Handle keyboard input
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(self.handle_key(key));
                }
            }
        }
        Ok(false)
    }

    /// Apply one key press; returns true when the board should close.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.filter_active {
            match key.code {
                KeyCode::Esc => {
                    self.filter_active = false;
                    self.filter_text.clear();
                    self.update_tasks();
                    self.clear_status_message();
                }
                KeyCode::Enter => {
                    self.filter_active = false;
                    if self.filter_text.is_empty() {
                        self.set_status_message("Filter cleared".to_string());
                    } else {
                        self.set_status_message(format!("Filter: '{}' ({} tasks shown)", self.filter_text, self.tasks.len()));
                    }
                }
                KeyCode::Backspace => {
                    if self.filter_text.pop().is_some() {
                        self.update_tasks();
                    }
                }
                KeyCode::Char(c) => {
                    self.filter_text.push(c);
                    self.update_tasks();
                }
                _ => {}
            }
            return false;
        }

        if self.show_task_detail {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.show_task_detail = false;
            }
            return false;
        }

        self.clear_status_message();

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,

            KeyCode::Tab | KeyCode::Left | KeyCode::Right => {
                self.focus = match self.focus {
                    Focus::Projects if !self.tasks.is_empty() => Focus::Tasks,
                    _ => Focus::Projects,
                };
            }

            KeyCode::Up => match self.focus {
                Focus::Projects => self.select_project(self.selected_project.saturating_sub(1)),
                Focus::Tasks => self.selected_task = self.selected_task.saturating_sub(1),
            },
            KeyCode::Down => match self.focus {
                Focus::Projects => self.select_project(self.selected_project + 1),
                Focus::Tasks => {
                    if self.selected_task + 1 < self.tasks.len() {
                        self.selected_task += 1;
                    }
                }
            },

            KeyCode::Enter => {
                if self.focus == Focus::Tasks && self.current_task().is_some() {
                    self.show_task_detail = true;
                } else if !self.tasks.is_empty() {
                    self.focus = Focus::Tasks;
                }
            }

            KeyCode::Char('c') => {
                if self.focus == Focus::Tasks {
                    self.toggle_task_completion();
                } else {
                    self.set_status_message("Select a task first (Tab)".to_string());
                }
            }

            KeyCode::Char('p') => self.cycle_pole_filter(),

            KeyCode::Char('r') => self.reconcile_current(),

            KeyCode::Char('t') => {
                self.show_completed = !self.show_completed;
                self.update_tasks();
                let status = if self.show_completed { "Showing completed tasks" } else { "Hiding completed tasks" };
                self.set_status_message(status.to_string());
            }

            KeyCode::Char('/') => {
                self.filter_active = true;
                self.set_status_message("Filter: type to search title/assignee, Enter to apply, Esc to cancel".to_string());
            }

            KeyCode::Char('h') => {
                self.set_status_message(
                    "Help: Tab: Switch pane | Enter: Details | c: Complete/reopen | p: Pole | t: Toggle done | r: Reconcile | /: Filter | q: Quit".to_string(),
                );
            }

            _ => {}
        }
        false
    }

    /// Render the board
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(0),    // Board
                Constraint::Length(1), // Status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(chunks[1]);
        self.render_projects(f, body[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(6), Constraint::Min(0)])
            .split(body[1]);
        self.render_gauges(f, right[0]);
        self.render_tasks(f, right[1]);

        self.render_status_bar(f, chunks[2]);

        if self.show_task_detail {
            self.render_task_detail_popup(f);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let today = Local::now().date_naive();
        let context_display = format!("Projects: {}  Today: {}", self.projects.len(), format_wedding_date(today));

        let header_text = vec![Line::from(vec![
            Span::styled("PRODUCTION BOARD", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(context_display, Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC)),
        ])];

        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, area);
    }

    fn focus_style(&self, pane: Focus) -> Style {
        if self.focus == pane {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        }
    }

    /// Two lines per project: name and date, then one counter per pole.
    fn render_projects(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("Projects")
            .border_style(self.focus_style(Focus::Projects));
        let inner = block.inner(area);
        f.render_widget(block, area);

        if self.projects.is_empty() {
            f.render_widget(Paragraph::new("No projects yet. Add one with `studio project add`."), inner);
            return;
        }

        let visible = (inner.height as usize / 2).max(1);
        if self.selected_project < self.project_scroll {
            self.project_scroll = self.selected_project;
        } else if self.selected_project >= self.project_scroll + visible {
            self.project_scroll = self.selected_project + 1 - visible;
        }

        let mut lines = Vec::new();
        for (idx, project) in self.projects.iter().enumerate().skip(self.project_scroll).take(visible) {
            let selected = idx == self.selected_project;
            let name_style = if selected {
                Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let width = inner.width.saturating_sub(16) as usize;
            lines.push(Line::from(vec![
                Span::styled(format!("{:<w$}", truncate(&project.name, width), w = width), name_style),
                Span::styled(format!(" {}", format_wedding_date(project.wedding_date)), name_style),
            ]));

            let mut counters = vec![Span::raw("  ")];
            for progress in pole_progress(project, &self.catalog) {
                let style = if progress.state == PoleState::Completed {
                    Style::default().fg(pole_color(progress.pole)).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(pole_color(progress.pole))
                };
                counters.push(Span::styled(format!("{} {}  ", format_pole(progress.pole), progress.label()), style));
            }
            lines.push(Line::from(counters));
        }

        f.render_widget(Paragraph::new(lines), inner);
    }

    fn render_gauges(&self, f: &mut Frame, area: Rect) {
        let title = match self.current_project() {
            Some(p) => format!("{} ({})", p.name, project_formula(p)),
            None => "Progress".to_string(),
        };
        let block = Block::default().borders(Borders::ALL).title(title);
        let inner = block.inner(area);
        f.render_widget(block, area);

        let Some(project) = self.current_project() else {
            return;
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1); 4])
            .split(inner);

        for (row, progress) in rows.iter().zip(pole_progress(project, &self.catalog)) {
            let label = format!(
                "{:<5} {:>5} {:<11}",
                format_pole(progress.pole),
                progress.label(),
                format_pole_state(progress.state)
            );
            let gauge = LineGauge::default()
                .filled_style(Style::default().fg(pole_color(progress.pole)))
                .unfilled_style(Style::default().fg(Color::DarkGray))
                .ratio(progress.ratio())
                .label(label);
            f.render_widget(gauge, *row);
        }
    }

    fn render_tasks(&mut self, f: &mut Frame, area: Rect) {
        let mut title = String::from("Tasks");
        if let Some(pole) = self.pole_filter {
            title.push_str(&format!(" [{}]", format_pole(pole)));
        }
        if self.show_completed {
            title.push_str(" [+Done]");
        }
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(self.focus_style(Focus::Tasks));
        let inner = block.inner(area);
        f.render_widget(block, area);

        if self.tasks.is_empty() {
            f.render_widget(Paragraph::new("No open tasks."), inner);
            return;
        }

        let visible = (inner.height as usize).max(1);
        if self.selected_task < self.task_scroll {
            self.task_scroll = self.selected_task;
        } else if self.selected_task >= self.task_scroll + visible {
            self.task_scroll = self.selected_task + 1 - visible;
        }

        let today = Local::now().date_naive();
        let title_width = inner.width.saturating_sub(44) as usize;
        let mut lines = Vec::new();
        for (idx, task) in self.tasks.iter().enumerate().skip(self.task_scroll).take(visible) {
            let selected = self.focus == Focus::Tasks && idx == self.selected_task;
            let base = if selected {
                Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
            } else if task.is_overdue(today) {
                Style::default().fg(Color::Red)
            } else if task.status == TaskStatus::Done {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };
            let check = if task.status == TaskStatus::Done { "[x]" } else { "[ ]" };
            lines.push(Line::from(vec![
                Span::styled(format!("{} #{:<4} ", check, task.id), base),
                Span::styled(format!("{:<6}", format_pole(task.pole)), base.fg(pole_color(task.pole))),
                Span::styled(format!("{:<10} ", format_due_relative(task.deadline, today)), base),
                Span::styled(format!("{:<w$} ", truncate(&task.title, title_width), w = title_width), base),
                Span::styled(truncate(&task.assigned_to, 16), base),
            ]));
        }

        f.render_widget(Paragraph::new(lines), inner);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if self.filter_active {
            format!("Filter: {} | Type to search, Enter to apply, Esc to cancel", self.filter_text)
        } else if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let filter_indicator = if self.filter_text.is_empty() {
                String::new()
            } else {
                format!(" [Filter: {}]", self.filter_text)
            };
            format!(
                "Tasks: {}{} | Tab: Pane | c: Complete | p: Pole | t: Toggle done | r: Reconcile | h: Help",
                self.tasks.len(),
                filter_indicator
            )
        };

        let bg = self.current_task().map(|t| pole_color(t.pole)).unwrap_or(GOLD);
        let status = Paragraph::new(status_text)
            .style(Style::default().bg(bg).fg(text_on(bg)))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render_task_detail_popup(&self, f: &mut Frame) {
        let Some(task) = self.current_task() else {
            return;
        };

        let popup_area = {
            let area = f.area();
            let popup_width = (area.width * 70) / 100;
            let popup_height = (area.height * 60) / 100;
            let x = (area.width - popup_width) / 2;
            let y = (area.height - popup_height) / 2;
            Rect::new(x, y, popup_width, popup_height)
        };
        f.render_widget(Clear, popup_area);

        let today = Local::now().date_naive();
        let project = self.current_project().map(|p| p.name.as_str()).unwrap_or("-");
        let evaluation = task.evaluation.map(|e| format!("{}/20", e)).unwrap_or_else(|| "-".to_string());
        let detail_lines = vec![
            Line::from(vec![Span::styled(
                format!("Task #{}: {}", task.id, task.title),
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(format!("Project:    {}", project)),
            Line::from(format!("Pole:       {}", format_pole(task.pole))),
            Line::from(format!("Status:     {}", format_status(task.status))),
            Line::from(format!("Priority:   {}", format_priority(task.priority))),
            Line::from(format!("Phase:      {}", format_phase(task.phase))),
            Line::from(format!("Deadline:   {} ({})", task.deadline, format_due_relative(task.deadline, today))),
            Line::from(format!("Assigned:   {}", if task.assigned_to.is_empty() { "-" } else { &task.assigned_to })),
            Line::from(format!("Evaluation: {}", evaluation)),
            Line::from(format!("Step key:   {}", task.template_key.as_deref().unwrap_or("-"))),
        ];

        let popup_block = Block::default()
            .borders(Borders::ALL)
            .title("Task Details (Press Enter to close)")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(pole_color(task.pole)).add_modifier(Modifier::BOLD));

        let popup_paragraph = Paragraph::new(detail_lines)
            .block(popup_block)
            .wrap(Wrap { trim: true })
            .style(Style::default().bg(Color::Black));

        f.render_widget(popup_paragraph, popup_area);
    }

    /// Main event loop
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::generate_tasks;
    use crate::project::NewProject;
    use chrono::NaiveDate;
    use ratatui::backend::TestBackend;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn board() -> BoardApp {
        let mut db = Database::in_memory();
        let catalog = WorkflowCatalog::new();
        for (name, day) in [("Lefèvre", 20), ("Martin & Lucas", 1)] {
            let project = db
                .insert_project(NewProject {
                    name: name.into(),
                    wedding_date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
                    formula: Some("Photo only".into()),
                })
                .unwrap();
            for task in generate_tasks(&project, &catalog) {
                db.insert_task(task).unwrap();
            }
        }
        BoardApp::new(db, catalog).unwrap()
    }

    #[test]
    fn test_projects_sorted_by_wedding_date() {
        let app = board();
        assert_eq!(app.projects[0].name, "Martin & Lucas");
        assert_eq!(app.tasks.len(), 14);
        assert!(app.tasks.windows(2).all(|w| w[0].deadline <= w[1].deadline));
    }

    #[test]
    fn test_completing_from_board_moves_the_gauge() {
        let mut app = board();
        app.handle_key(key(KeyCode::Char('p')));
        assert_eq!(app.pole_filter, Some(Pole::Photo));
        app.handle_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Tasks);
        app.handle_key(key(KeyCode::Down));
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.current_task().unwrap().title, "Client gallery upload");

        app.handle_key(key(KeyCode::Char('c')));
        let project = app.current_project().unwrap();
        assert_eq!(project.pole(Pole::Photo).current_step, 3);
        assert!(app.status_message.contains("advanced"));
        // Done tasks are hidden by default.
        assert!(app.tasks.iter().all(|t| t.title != "Client gallery upload"));
    }

    #[test]
    fn test_reopen_keeps_progress() {
        let mut app = board();
        app.handle_key(key(KeyCode::Char('t')));
        app.handle_key(key(KeyCode::Char('p')));
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Char('c')));
        assert_eq!(app.current_task().unwrap().status, TaskStatus::Done);
        app.handle_key(key(KeyCode::Char('c')));
        assert_eq!(app.current_task().unwrap().status, TaskStatus::Todo);
        assert!(app.status_message.contains("reopened"));
        assert_eq!(app.current_project().unwrap().pole(Pole::Photo).current_step, 1);
    }

    #[test]
    fn test_filter_narrows_task_list() {
        let mut app = board();
        app.handle_key(key(KeyCode::Char('/')));
        for c in "album".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        assert!(!app.filter_active);
        assert!(!app.tasks.is_empty());
        assert!(app.tasks.iter().all(|t| t.title.to_lowercase().contains("album")));
    }

    #[test]
    fn test_render_smoke() {
        let mut app = board();
        let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        app.handle_key(key(KeyCode::Tab));
        app.handle_key(key(KeyCode::Enter));
        assert!(app.show_task_detail);
        terminal.draw(|f| app.render(f)).unwrap();
    }
}
