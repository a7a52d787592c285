// TodoStore - To-do list state management over a remote REST task API

pub mod api;
pub mod config;
pub mod filter;
pub mod memory;
pub mod notice;
pub mod store;
pub mod task;

// Re-export main types for convenience
pub use api::{HttpTaskApi, TaskApi};
pub use config::Config;
pub use filter::Filter;
pub use memory::{ApiCall, MemoryTaskApi};
pub use notice::{Notice, NoticeLevel};
pub use store::{Deletion, Outcome, TaskStore, now_ms};
pub use task::{NewTask, Task, TaskId, TitleUpdate};
