//! Enumerations and field types for tasks.
//!
//! This module defines the structured values used to categorise tasks and to
//! drive list views: status, priority, recurrence period, sort keys, and the
//! autosave policy for the external target.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Maximum nesting depth. Roots sit at depth 0, the deepest subtask at depth 3.
pub const MAX_DEPTH: u8 = 3;

/// Task workflow status.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Blocked,
    Done,
}

impl Status {
    pub fn is_done(self) -> bool {
        self == Status::Done
    }
}

/// Priority classification for task importance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Sort rank, lower sorts first (urgent = 0).
    pub fn rank(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

/// Period unit of a recurrence rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ValueEnum, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum RecurrenceKind {
    None,
    Daily,
    Weekly,
    Monthly,
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum SortKey {
    /// Keep forest order.
    #[default]
    Manual,
    Priority,
    DueAsc,
    DueDesc,
}

/// When the external target gets written.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AutosaveMode {
    #[default]
    EveryChange,
    #[value(name = "every-5-minutes")]
    #[serde(rename = "every-5-minutes")]
    Every5Minutes,
    Manual,
}

/// Format a task status for display.
pub fn format_status(s: Status) -> &'static str {
    match s {
        Status::Todo => "Todo",
        Status::InProgress => "InProgress",
        Status::Blocked => "Blocked",
        Status::Done => "Done",
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
