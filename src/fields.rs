//! Enumerations and field types for production tracking.
//!
//! This module defines the structured values shared by templates, tasks and
//! projects: production poles, task status, priority and phase, and the
//! aggregate state of a pole.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Production department a workflow step belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Pole {
    #[serde(alias = "PHOTO")]
    Photo,
    #[serde(alias = "FILM")]
    Film,
    /// Album and physical deliverables.
    #[serde(alias = "DVD")]
    Dvd,
    /// Client communication and social media.
    #[serde(alias = "COM")]
    Com,
}

impl Pole {
    pub const ALL: [Pole; 4] = [Pole::Photo, Pole::Film, Pole::Dvd, Pole::Com];
}

/// Task completion status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[serde(alias = "Todo")]
    Todo,
    #[serde(alias = "InProgress")]
    InProgress,
    #[serde(alias = "Done")]
    Done,
}

/// Priority derived from a template's day offset, or set by hand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Production phase relative to the wedding day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreProd,
    PostProd,
    Delivery,
}

/// Aggregate state of one pole of a project.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PoleState {
    #[default]
    Pending,
    InProgress,
    Completed,
    OnHold,
}

/// Derive the production phase from a day offset.
pub fn phase_for_offset(day_offset: i32) -> Phase {
    if day_offset < 0 {
        Phase::PreProd
    } else if day_offset > 60 {
        Phase::Delivery
    } else {
        Phase::PostProd
    }
}

/// Derive the default priority from a day offset.
pub fn priority_for_offset(day_offset: i32) -> Priority {
    match day_offset {
        0..=15 => Priority::High,
        d if d < 0 => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Format a pole for display.
pub fn format_pole(p: Pole) -> &'static str {
    match p {
        Pole::Photo => "PHOTO",
        Pole::Film => "FILM",
        Pole::Dvd => "DVD",
        Pole::Com => "COM",
    }
}

/// Format a task status for display.
pub fn format_status(s: TaskStatus) -> &'static str {
    match s {
        TaskStatus::Todo => "Todo",
        TaskStatus::InProgress => "InProgress",
        TaskStatus::Done => "Done",
    }
}

/// Format a priority for display.
pub fn format_priority(p: Priority) -> &'static str {
    match p {
        Priority::Low => "Low",
        Priority::Medium => "Medium",
        Priority::High => "High",
        Priority::Urgent => "Urgent",
    }
}

/// Format a phase for display.
pub fn format_phase(p: Phase) -> &'static str {
    match p {
        Phase::PreProd => "Pre-prod",
        Phase::PostProd => "Post-prod",
        Phase::Delivery => "Delivery",
    }
}

/// Format a pole state for display.
pub fn format_pole_state(s: PoleState) -> &'static str {
    match s {
        PoleState::Pending => "Pending",
        PoleState::InProgress => "In progress",
        PoleState::Completed => "Completed",
        PoleState::OnHold => "On hold",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_boundaries() {
        assert_eq!(phase_for_offset(-30), Phase::PreProd);
        assert_eq!(phase_for_offset(-1), Phase::PreProd);
        assert_eq!(phase_for_offset(0), Phase::PostProd);
        assert_eq!(phase_for_offset(10), Phase::PostProd);
        assert_eq!(phase_for_offset(60), Phase::PostProd);
        assert_eq!(phase_for_offset(61), Phase::Delivery);
        assert_eq!(phase_for_offset(70), Phase::Delivery);
    }

    #[test]
    fn test_priority_boundaries() {
        assert_eq!(priority_for_offset(-30), Priority::Medium);
        assert_eq!(priority_for_offset(0), Priority::High);
        assert_eq!(priority_for_offset(10), Priority::High);
        assert_eq!(priority_for_offset(15), Priority::High);
        assert_eq!(priority_for_offset(16), Priority::Low);
        assert_eq!(priority_for_offset(70), Priority::Low);
    }

    #[test]
    fn test_pole_accepts_legacy_uppercase() {
        let pole: Pole = serde_json::from_str("\"PHOTO\"").unwrap();
        assert_eq!(pole, Pole::Photo);
        let pole: Pole = serde_json::from_str("\"com\"").unwrap();
        assert_eq!(pole, Pole::Com);
        assert_eq!(serde_json::to_string(&Pole::Dvd).unwrap(), "\"dvd\"");
    }

    #[test]
    fn test_phase_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Phase::PreProd).unwrap(), "\"pre_prod\"");
        assert_eq!(serde_json::to_string(&PoleState::OnHold).unwrap(), "\"on_hold\"");
    }
}
