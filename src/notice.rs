// User-facing notifications derived from operation results

use crate::store::{Deletion, Outcome};
use eyre::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A short message for the user about how an operation went
///
/// The store never emits these itself; callers build them from results and
/// decide how to show them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    /// Fetch success is silent
    pub fn for_fetch(result: &Result<Outcome<usize>>) -> Option<Self> {
        match result {
            Err(_) => Some(Self::error("Error fetching tasks")),
            Ok(_) => None,
        }
    }

    pub fn for_add<T>(result: &Result<Outcome<T>>) -> Option<Self> {
        Self::for_mutation(result, "Task added successfully", "Error adding task")
    }

    pub fn for_update<T>(result: &Result<Outcome<T>>) -> Option<Self> {
        Self::for_mutation(result, "Task updated successfully", "Error updating task")
    }

    /// A remote failure alone is not reported; the task is gone locally either way
    pub fn for_delete(deletion: &Deletion) -> Option<Self> {
        deletion
            .removed
            .as_ref()
            .map(|_| Self::success("Task deleted successfully"))
    }

    fn for_mutation<T>(result: &Result<Outcome<T>>, ok: &str, err: &str) -> Option<Self> {
        match result {
            Ok(Outcome::Applied(_)) => Some(Self::success(ok)),
            Ok(Outcome::Skipped | Outcome::Superseded) => None,
            Err(_) => Some(Self::error(err)),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
