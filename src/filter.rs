// View filters over the task list

use crate::task::Task;

/// Predicate selecting which tasks the filtered view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Completed,
    Uncompleted,
}

impl Filter {
    /// Parse a filter name, falling back to `All` for anything unrecognized
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Filter::Completed,
            "uncompleted" => Filter::Uncompleted,
            _ => Filter::All,
        }
    }

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Completed => task.completed,
            Filter::Uncompleted => !task.completed,
        }
    }

    /// Tasks passing this filter, in list order
    pub fn apply(self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

impl From<&str> for Filter {
    fn from(s: &str) -> Self {
        Filter::parse_lenient(s)
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Filter::All => write!(f, "all"),
            Filter::Completed => write!(f, "completed"),
            Filter::Uncompleted => write!(f, "uncompleted"),
        }
    }
}
