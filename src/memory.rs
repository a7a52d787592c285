// In-process TaskApi with scripted latency and failures

use crate::api::TaskApi;
use crate::task::{NewTask, Task, TaskId, TitleUpdate};
use async_trait::async_trait;
use eyre::{Result, eyre};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A request received by `MemoryTaskApi`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Fetch(String),
    Create(NewTask),
    UpdateTitle(TaskId, TitleUpdate),
    Delete(TaskId),
}

/// `TaskApi` serving tasks from memory
///
/// Every request is logged. Delays queued with `push_delay` are consumed one
/// per request, in order. While failing, requests are logged and then rejected.
#[derive(Default)]
pub struct MemoryTaskApi {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    tasks: Vec<Task>,
    next_server_id: i64,
    failing: bool,
    delays: VecDeque<Duration>,
    calls: Vec<ApiCall>,
}

impl MemoryTaskApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `tasks` on the server side
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let next_server_id = tasks.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        Self {
            inner: Mutex::new(Inner {
                tasks,
                next_server_id,
                ..Inner::default()
            }),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Delay the next not-yet-delayed request by `delay`
    pub fn push_delay(&self, delay: Duration) {
        self.lock().delays.push_back(delay);
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Tasks as the server currently sees them
    pub fn server_tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Log the call and claim its delay; the lock is released before sleeping
    async fn begin(&self, call: ApiCall) -> Result<()> {
        let (delay, failing) = {
            let mut inner = self.lock();
            inner.calls.push(call);
            (inner.delays.pop_front(), inner.failing)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if failing {
            return Err(eyre!("Remote task API unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskApi for MemoryTaskApi {
    async fn fetch(&self, url: &str) -> Result<Vec<Task>> {
        self.begin(ApiCall::Fetch(url.to_string())).await?;
        Ok(self.lock().tasks.clone())
    }

    async fn create(&self, task: &NewTask) -> Result<NewTask> {
        self.begin(ApiCall::Create(task.clone())).await?;
        let mut inner = self.lock();
        let id = TaskId(inner.next_server_id);
        inner.next_server_id += 1;
        inner.tasks.push(Task {
            id,
            title: task.title.clone(),
            completed: task.completed,
        });
        Ok(task.clone())
    }

    async fn update_title(&self, id: TaskId, update: &TitleUpdate) -> Result<TitleUpdate> {
        self.begin(ApiCall::UpdateTitle(id, update.clone())).await?;
        let mut inner = self.lock();
        if let Some(task) = inner.tasks.iter_mut().find(|t| t.id == id) {
            task.title = update.title.clone();
        }
        Ok(update.clone())
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.begin(ApiCall::Delete(id)).await?;
        self.lock().tasks.retain(|t| t.id != id);
        Ok(())
    }
}
