//! Enumerations and field types for tasks.
//!
//! Category and status are closed sets. Their wire spelling matches the
//! documents already stored by the task collection (`"Work"`, `"TO-DO"`, ...).

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// What area of life a task belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
pub enum Category {
    #[serde(alias = "work")]
    Work,
    #[serde(alias = "personal")]
    Personal,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Work, Category::Personal];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Personal => "Personal",
        }
    }
}

/// Workflow column a task sits in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
pub enum Status {
    #[serde(rename = "TO-DO")]
    #[value(name = "todo", alias = "to-do")]
    ToDo,
    #[serde(rename = "IN-PROGRESS")]
    #[value(name = "in-progress")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    #[value(name = "completed", alias = "done")]
    Completed,
}

impl Status {
    /// Columns in display order.
    pub const ALL: [Status; 3] = [Status::ToDo, Status::InProgress, Status::Completed];

    /// Wire and badge spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::ToDo => "TO-DO",
            Status::InProgress => "IN-PROGRESS",
            Status::Completed => "COMPLETED",
        }
    }

    /// Section heading used by the list view.
    pub fn heading(self) -> &'static str {
        match self {
            Status::ToDo => "Todo",
            Status::InProgress => "In Progress",
            Status::Completed => "Completed",
        }
    }

    /// Placeholder shown when a section or column has no tasks.
    pub fn empty_message(self) -> &'static str {
        match self {
            Status::ToDo => "No Tasks in To-Do",
            Status::InProgress => "No Tasks In Progress",
            Status::Completed => "No Completed Tasks",
        }
    }

    pub fn is_completed(self) -> bool {
        self == Status::Completed
    }

    /// Position of this status in [`Status::ALL`].
    pub fn column(self) -> usize {
        match self {
            Status::ToDo => 0,
            Status::InProgress => 1,
            Status::Completed => 2,
        }
    }

    pub fn from_column(index: usize) -> Option<Status> {
        Status::ALL.get(index).copied()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace([' ', '_'], "-").as_str() {
            "TO-DO" | "TODO" => Ok(Status::ToDo),
            "IN-PROGRESS" | "INPROGRESS" => Ok(Status::InProgress),
            "COMPLETED" | "DONE" => Ok(Status::Completed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "work" => Ok(Category::Work),
            "personal" => Ok(Category::Personal),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_wire_spelling() {
        assert_eq!(serde_json::to_string(&Status::InProgress).unwrap(), "\"IN-PROGRESS\"");
        let s: Status = serde_json::from_str("\"TO-DO\"").unwrap();
        assert_eq!(s, Status::ToDo);
        assert!(serde_json::from_str::<Status>("\"DONE\"").is_err());
    }

    #[test]
    fn category_parses_loosely_from_text() {
        assert_eq!("work".parse::<Category>().unwrap(), Category::Work);
        assert_eq!(" Personal ".parse::<Category>().unwrap(), Category::Personal);
        assert!("home".parse::<Category>().is_err());
    }

    #[test]
    fn status_columns_round_trip() {
        for s in Status::ALL {
            assert_eq!(Status::from_column(s.column()), Some(s));
        }
        assert_eq!(Status::from_column(3), None);
        assert_eq!("in progress".parse::<Status>().unwrap(), Status::InProgress);
    }
}
