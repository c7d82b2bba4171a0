//! Project records and their per-pole progress.
//!
//! Projects are owned by the studio's CRUD layer; the workflow engine only
//! needs the wedding date, the purchased formula and one `PoleStatus` per
//! production pole.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fields::*;

/// Aggregate progress of one production pole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoleStatus {
    /// Highest step number reached for the pole.
    pub current_step: u32,
    pub assigned_to: String,
    pub status: PoleState,
    pub planned_date: Option<NaiveDate>,
}

/// One `PoleStatus` per production pole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoleBoard {
    pub photo: PoleStatus,
    pub film: PoleStatus,
    pub dvd: PoleStatus,
    pub com: PoleStatus,
}

impl PoleBoard {
    pub fn get(&self, pole: Pole) -> &PoleStatus {
        match pole {
            Pole::Photo => &self.photo,
            Pole::Film => &self.film,
            Pole::Dvd => &self.dvd,
            Pole::Com => &self.com,
        }
    }

    pub fn get_mut(&mut self, pole: Pole) -> &mut PoleStatus {
        match pole {
            Pole::Photo => &mut self.photo,
            Pole::Film => &mut self.film,
            Pole::Dvd => &mut self.dvd,
            Pole::Com => &mut self.com,
        }
    }
}

/// Field updates for a pole; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoleStatusPatch {
    pub current_step: Option<u32>,
    pub assigned_to: Option<String>,
    pub status: Option<PoleState>,
    pub planned_date: Option<NaiveDate>,
}

impl PoleStatusPatch {
    pub fn apply(&self, pole: &mut PoleStatus) {
        if let Some(step) = self.current_step {
            pole.current_step = step;
        }
        if let Some(who) = &self.assigned_to {
            pole.assigned_to = who.clone();
        }
        if let Some(status) = self.status {
            pole.status = status;
        }
        if let Some(date) = self.planned_date {
            pole.planned_date = Some(date);
        }
    }
}

/// A client project (one wedding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub wedding_date: NaiveDate,
    /// Purchased formula; the catalog falls back to its default when absent.
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub poles: PoleBoard,
    #[serde(default)]
    pub created_at_utc: i64,
}

/// A project that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub wedding_date: NaiveDate,
    pub formula: Option<String>,
}

impl Project {
    pub fn from_new(id: u64, project: NewProject, now_utc: i64) -> Self {
        Project {
            id,
            name: project.name,
            wedding_date: project.wedding_date,
            formula: project.formula,
            poles: PoleBoard::default(),
            created_at_utc: now_utc,
        }
    }

    pub fn pole(&self, pole: Pole) -> &PoleStatus {
        self.poles.get(pole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pole_fields_default_at_load() {
        let json = r#"{
            "id": 3,
            "name": "Dupont wedding",
            "wedding_date": "2025-03-01",
            "poles": { "photo": { "current_step": 2 } }
        }"#;
        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.formula, None);
        assert_eq!(project.pole(Pole::Photo).current_step, 2);
        assert_eq!(project.pole(Pole::Photo).status, PoleState::Pending);
        assert_eq!(project.pole(Pole::Film), &PoleStatus::default());
    }

    #[test]
    fn test_pole_patch_only_touches_given_fields() {
        let mut status = PoleStatus { current_step: 4, assigned_to: "Lea".into(), ..Default::default() };
        PoleStatusPatch { status: Some(PoleState::OnHold), ..Default::default() }.apply(&mut status);
        assert_eq!(status.current_step, 4);
        assert_eq!(status.assigned_to, "Lea");
        assert_eq!(status.status, PoleState::OnHold);
    }
}
