use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::person::{PersonAssignment, Role};

/// A unit of trackable work with a planning phase and a project phase.
///
/// Field names serialize to the backend's snake_case keys, so a cached
/// board round-trips through the same shape the wire uses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: u64,
    #[serde(rename = "name_task")]
    pub name: String,
    #[serde(default)]
    pub persons: Vec<PersonAssignment>,
    #[serde(default)]
    pub planning_description: String,
    #[serde(rename = "planning_file", default)]
    pub planning_files: Vec<FileRef>,
    #[serde(default)]
    pub planning_due_date: Option<NaiveDate>,
    #[serde(default)]
    pub planning_status: PlanningStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(rename = "project_file", default)]
    pub project_files: Vec<FileRef>,
    #[serde(default)]
    pub project_comment: String,
    #[serde(default)]
    pub project_status: ProjectStatus,
    #[serde(default)]
    pub project_due_date: Option<NaiveDate>,
    /// Transient edit flag, never persisted.
    #[serde(skip)]
    pub edit_mode: bool,
}

/// An attachment reference. `url` is set once the server has stored the
/// file; `data` carries the bytes of a locally attached file awaiting
/// upload and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRef {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
}

impl FileRef {
    pub fn stored(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            data: None,
        }
    }

    pub fn pending(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            url: None,
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PlanningStatus {
    #[default]
    #[serde(rename = "Not Approved")]
    NotApproved,
    Approved,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ProjectStatus {
    #[default]
    Undone,
    Working,
    Done,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    High,
    Medium,
    #[default]
    Low,
}

impl Priority {
    /// Fixed sort order for the TODO list: High sorts first.
    pub fn sort_rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('_', " ")
}

impl FromStr for PlanningStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "approved" => Ok(PlanningStatus::Approved),
            "not approved" => Ok(PlanningStatus::NotApproved),
            _ => Err(()),
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "undone" => Ok(ProjectStatus::Undone),
            "working" => Ok(ProjectStatus::Working),
            "done" => Ok(ProjectStatus::Done),
            _ => Err(()),
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(()),
        }
    }
}

impl fmt::Display for PlanningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanningStatus::NotApproved => write!(f, "Not Approved"),
            PlanningStatus::Approved => write!(f, "Approved"),
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectStatus::Undone => write!(f, "Undone"),
            ProjectStatus::Working => write!(f, "Working"),
            ProjectStatus::Done => write!(f, "Done"),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

impl Item {
    pub fn new(id: u64, name: String) -> Self {
        Self {
            id,
            name,
            persons: Vec::new(),
            planning_description: String::new(),
            planning_files: Vec::new(),
            planning_due_date: None,
            planning_status: PlanningStatus::NotApproved,
            priority: Priority::Low,
            project_files: Vec::new(),
            project_comment: String::new(),
            project_status: ProjectStatus::Undone,
            project_due_date: None,
            edit_mode: false,
        }
    }

    /// Both phases have reached their terminal status, so the item
    /// belongs in the COMPLETED list.
    pub fn is_complete(&self) -> bool {
        self.planning_status == PlanningStatus::Approved
            && self.project_status == ProjectStatus::Done
    }

    /// Demotion back to TODO returns both phases to their initial values.
    pub fn reset_statuses(&mut self) {
        self.planning_status = PlanningStatus::NotApproved;
        self.project_status = ProjectStatus::Undone;
    }

    pub fn person_with_role(&self, role: Role) -> Option<&PersonAssignment> {
        self.persons.iter().find(|p| p.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_item_defaults() {
        let item = Item::new(7, "Design review".to_string());
        assert_eq!(item.id, 7);
        assert_eq!(item.planning_status, PlanningStatus::NotApproved);
        assert_eq!(item.project_status, ProjectStatus::Undone);
        assert_eq!(item.priority, Priority::Low);
        assert!(item.persons.is_empty());
        assert!(!item.edit_mode);
    }

    #[test]
    fn test_is_complete_requires_both_statuses() {
        let mut item = Item::new(1, "x".to_string());
        assert!(!item.is_complete());

        item.planning_status = PlanningStatus::Approved;
        assert!(!item.is_complete());

        item.project_status = ProjectStatus::Done;
        assert!(item.is_complete());

        item.planning_status = PlanningStatus::NotApproved;
        assert!(!item.is_complete());
    }

    #[test]
    fn test_reset_statuses() {
        let mut item = Item::new(1, "x".to_string());
        item.planning_status = PlanningStatus::Approved;
        item.project_status = ProjectStatus::Done;

        item.reset_statuses();
        assert_eq!(item.planning_status, PlanningStatus::NotApproved);
        assert_eq!(item.project_status, ProjectStatus::Undone);
    }

    #[test]
    fn test_status_parsing_is_tolerant() {
        assert_eq!(
            "not_approved".parse::<PlanningStatus>(),
            Ok(PlanningStatus::NotApproved)
        );
        assert_eq!(
            "Not Approved".parse::<PlanningStatus>(),
            Ok(PlanningStatus::NotApproved)
        );
        assert_eq!("APPROVED".parse::<PlanningStatus>(), Ok(PlanningStatus::Approved));
        assert_eq!("working".parse::<ProjectStatus>(), Ok(ProjectStatus::Working));
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("someday".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_sort_rank() {
        assert!(Priority::High.sort_rank() < Priority::Medium.sort_rank());
        assert!(Priority::Medium.sort_rank() < Priority::Low.sort_rank());
    }

    #[test]
    fn test_serialized_field_names_match_wire() {
        let mut item = Item::new(3, "Ship it".to_string());
        item.planning_files.push(FileRef::stored("spec.pdf", "http://x/spec.pdf"));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["name_task"], "Ship it");
        assert_eq!(value["planning_status"], "Not Approved");
        assert_eq!(value["project_status"], "Undone");
        assert_eq!(value["planning_file"][0]["name"], "spec.pdf");
        assert!(value.get("edit_mode").is_none());
    }

    #[test]
    fn test_due_date_serializes_date_only() {
        let mut item = Item::new(1, "x".to_string());
        item.planning_due_date = NaiveDate::from_ymd_opt(2024, 3, 9);

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["planning_due_date"], "2024-03-09");
    }
}
