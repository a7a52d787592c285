// Task list state over a remote task API

use crate::api::TaskApi;
use crate::filter::Filter;
use crate::task::{NewTask, Task, TaskId, TitleUpdate};
use eyre::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Result of an operation whose remote call (if any) succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Local state was changed
    Applied(T),
    /// Nothing to do (blank input or unknown task); no request was sent
    Skipped,
    /// The response was discarded because a newer request for the same
    /// target had been issued, or the target disappeared meanwhile
    Superseded,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            _ => None,
        }
    }
}

/// Result of `TaskStore::delete_task`
#[derive(Debug)]
pub struct Deletion {
    /// Task removed from the local list, if it was there
    pub removed: Option<Task>,
    /// Result of the DELETE request. Local removal happens either way.
    pub remote: Result<()>,
}

/// To-do list state backed by a remote task API
///
/// Owns the task list, the active filter, the loading flag and the id of
/// the task being edited. Operations take `&self` so several requests can be
/// in flight at once; the state lock is never held across a request.
///
/// Fetches and title updates are sequenced: a response that arrives after a
/// newer request for the same target has been issued is discarded.
pub struct TaskStore {
    api: Arc<dyn TaskApi>,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    tasks: Vec<Task>,
    filter: Filter,
    is_loading: bool,
    editing_id: Option<TaskId>,
    next_seq: u64,
    latest_fetch: u64,
    latest_update: HashMap<TaskId, u64>,
    last_local_id: i64,
}

impl State {
    fn new() -> Self {
        Self {
            tasks: Vec::new(),
            filter: Filter::All,
            is_loading: true,
            editing_id: None,
            next_seq: 0,
            latest_fetch: 0,
            latest_update: HashMap::new(),
            last_local_id: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    /// Drop the editing marker and pending updates that point at removed tasks
    fn forget_removed(&mut self) {
        if let Some(id) = self.editing_id
            && self.position(id).is_none()
        {
            debug!(id = %id, "Edited task is gone, leaving editing mode");
            self.editing_id = None;
        }
        let tasks = &self.tasks;
        self.latest_update.retain(|id, _| tasks.iter().any(|t| t.id == *id));
    }

    /// Millisecond timestamp, bumped past the last local id and any id in the list
    fn next_local_id(&mut self) -> TaskId {
        let mut id = now_ms().max(self.last_local_id + 1);
        while self.tasks.iter().any(|t| t.id.0 == id) {
            id += 1;
        }
        self.last_local_id = id;
        TaskId(id)
    }
}

impl TaskStore {
    /// Create an empty store in the loading state
    pub fn new(api: Arc<dyn TaskApi>) -> Self {
        Self {
            api,
            state: Mutex::new(State::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Remote operations
    // ========================================================================

    /// Replace the task list with the records served at `url`
    ///
    /// The loading flag is cleared once the newest fetch resolves, whether it
    /// succeeded or not. On failure the task list is left as it was.
    /// Returns the number of tasks loaded.
    pub async fn fetch_tasks(&self, url: &str) -> Result<Outcome<usize>> {
        let seq = {
            let mut state = self.lock();
            let seq = state.next_seq();
            state.latest_fetch = seq;
            state.is_loading = true;
            seq
        };
        debug!(url, seq, "fetch_tasks: sending");

        let result = self.api.fetch(url).await;

        let mut state = self.lock();
        if state.latest_fetch != seq {
            debug!(seq, latest = state.latest_fetch, "fetch_tasks: superseded");
            return Ok(Outcome::Superseded);
        }
        state.is_loading = false;

        match result {
            Ok(tasks) => {
                let count = tasks.len();
                state.tasks = tasks;
                state.forget_removed();
                info!(url, count, "Fetched tasks");
                Ok(Outcome::Applied(count))
            }
            Err(e) => {
                warn!(url, error = ?e, "Failed to fetch tasks");
                Err(e)
            }
        }
    }

    /// Create a task titled `title` and append it with a locally generated id
    ///
    /// A blank title is skipped without contacting the server. The id the
    /// server echoes back is ignored.
    pub async fn add_task(&self, title: &str) -> Result<Outcome<Task>> {
        let title = title.trim();
        if title.is_empty() {
            debug!("add_task: blank title, skipping");
            return Ok(Outcome::Skipped);
        }

        let echo = self
            .api
            .create(&NewTask::new(title))
            .await
            .inspect_err(|e| warn!(title, error = ?e, "Failed to add task"))?;

        let mut state = self.lock();
        let task = Task {
            id: state.next_local_id(),
            title: echo.title,
            completed: echo.completed,
        };
        state.tasks.push(task.clone());
        info!(id = %task.id, title = %task.title, "Added task");

        Ok(Outcome::Applied(task))
    }

    /// Retitle task `id` with the title the server echoes back
    ///
    /// Completion is left alone. On success the editing marker is cleared if
    /// it pointed at `id`; on failure nothing changes.
    pub async fn update_task(&self, id: TaskId, title: &str) -> Result<Outcome<Task>> {
        let title = title.trim();
        if title.is_empty() {
            debug!(id = %id, "update_task: blank title, skipping");
            return Ok(Outcome::Skipped);
        }

        let seq = {
            let mut state = self.lock();
            if state.position(id).is_none() {
                debug!(id = %id, "update_task: unknown task, skipping");
                state.forget_removed();
                return Ok(Outcome::Skipped);
            }
            let seq = state.next_seq();
            state.latest_update.insert(id, seq);
            seq
        };

        let update = TitleUpdate {
            title: title.to_string(),
        };
        let echo = match self.api.update_title(id, &update).await {
            Ok(echo) => echo,
            Err(e) => {
                warn!(id = %id, error = ?e, "Failed to update task");
                let mut state = self.lock();
                if state.latest_update.get(&id) == Some(&seq) {
                    state.latest_update.remove(&id);
                }
                return Err(e);
            }
        };

        let mut state = self.lock();
        if state.latest_update.get(&id) != Some(&seq) {
            debug!(id = %id, seq, "update_task: superseded by a newer update");
            return Ok(Outcome::Superseded);
        }
        state.latest_update.remove(&id);

        let Some(pos) = state.position(id) else {
            debug!(id = %id, "update_task: task removed while request was in flight");
            return Ok(Outcome::Superseded);
        };
        state.tasks[pos].title = echo.title;
        if state.editing_id == Some(id) {
            state.editing_id = None;
        }
        let task = state.tasks[pos].clone();
        info!(id = %task.id, title = %task.title, "Updated task");

        Ok(Outcome::Applied(task))
    }

    /// Send a delete request for `id`, then drop it from the list
    ///
    /// The local removal does not depend on the remote result; a failed
    /// request is logged and reported in `Deletion::remote`. Deleting the
    /// task being edited leaves editing mode.
    pub async fn delete_task(&self, id: TaskId) -> Deletion {
        let remote = self.api.delete(id).await;
        if let Err(e) = &remote {
            warn!(id = %id, error = ?e, "Remote delete failed, removing locally anyway");
        }

        let mut state = self.lock();
        let removed = state.position(id).map(|pos| state.tasks.remove(pos));
        state.forget_removed();
        if removed.is_some() {
            info!(id = %id, "Deleted task");
        }

        Deletion { removed, remote }
    }

    /// Submit the input buffer: update the task being edited, or add a new one
    pub async fn submit(&self, input: &str) -> Result<Outcome<Task>> {
        match self.editing_id() {
            Some(id) => self.update_task(id, input).await,
            None => self.add_task(input).await,
        }
    }

    // ========================================================================
    // Local operations
    // ========================================================================

    /// Enter editing mode for `id`
    ///
    /// Returns the task's current title to seed the input buffer, or `None`
    /// (and no state change) if there is no such task.
    pub fn begin_edit(&self, id: TaskId) -> Option<String> {
        let mut state = self.lock();
        let title = state.tasks.iter().find(|t| t.id == id)?.title.clone();
        state.editing_id = Some(id);
        Some(title)
    }

    /// Flip completion of `id`. Returns false if there is no such task.
    pub fn toggle_completed(&self, id: TaskId) -> bool {
        let mut state = self.lock();
        match state.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.completed = !task.completed;
                debug!(id = %id, completed = task.completed, "Toggled task");
                true
            }
            None => false,
        }
    }

    /// Mark every task completed. Returns how many changed.
    pub fn complete_all(&self) -> usize {
        let mut state = self.lock();
        let mut changed = 0;
        for task in state.tasks.iter_mut().filter(|t| !t.completed) {
            task.completed = true;
            changed += 1;
        }
        debug!(changed, "Completed all tasks");
        changed
    }

    /// Remove every completed task. Returns how many were removed.
    ///
    /// Leaves editing mode if the edited task was among them.
    pub fn clear_completed(&self) -> usize {
        let mut state = self.lock();
        let before = state.tasks.len();
        state.tasks.retain(|t| !t.completed);
        let removed = before - state.tasks.len();
        state.forget_removed();
        debug!(removed, "Cleared completed tasks");
        removed
    }

    pub fn set_filter(&self, filter: Filter) {
        self.lock().filter = filter;
    }

    // ========================================================================
    // Readers
    // ========================================================================

    /// Full, unfiltered task list
    pub fn tasks(&self) -> Vec<Task> {
        self.lock().tasks.clone()
    }

    /// Task list restricted by the active filter
    pub fn filtered_tasks(&self) -> Vec<Task> {
        let state = self.lock();
        state.filter.apply(&state.tasks)
    }

    pub fn filter(&self) -> Filter {
        self.lock().filter
    }

    pub fn is_loading(&self) -> bool {
        self.lock().is_loading
    }

    pub fn editing_id(&self) -> Option<TaskId> {
        self.lock().editing_id
    }

    pub fn completed_count(&self) -> usize {
        self.lock().tasks.iter().filter(|t| t.completed).count()
    }

    pub fn total_count(&self) -> usize {
        self.lock().tasks.len()
    }
}

// Helper function for timestamps
pub fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{ApiCall, MemoryTaskApi};
    use std::time::Duration;

    const URL: &str = "mem://todos?_limit=4";

    fn seeded() -> Vec<Task> {
        vec![Task::new(1, "A"), Task::new(2, "B").done()]
    }

    /// Store fetched from a server holding `tasks`
    async fn loaded(tasks: Vec<Task>) -> (Arc<MemoryTaskApi>, TaskStore) {
        let api = Arc::new(MemoryTaskApi::with_tasks(tasks));
        let store = TaskStore::new(api.clone());
        store.fetch_tasks(URL).await.unwrap();
        (api, store)
    }

    #[test]
    fn test_new_store_is_loading_and_empty() {
        let store = TaskStore::new(Arc::new(MemoryTaskApi::new()));

        assert!(store.is_loading());
        assert!(store.tasks().is_empty());
        assert_eq!(store.filter(), Filter::All);
        assert_eq!(store.editing_id(), None);
    }

    #[tokio::test]
    async fn test_fetch_replaces_tasks_verbatim() {
        let (_api, store) = loaded(seeded()).await;

        assert_eq!(store.tasks(), seeded());
        assert!(!store.is_loading());
        assert_eq!(store.total_count(), 2);
        assert_eq!(store.completed_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_discards_local_tasks() {
        let (_api, store) = loaded(vec![Task::new(1, "A")]).await;
        store.add_task("local").await.unwrap();

        store.fetch_tasks(URL).await.unwrap();
        // The memory server kept the created task under its own id
        assert_eq!(store.tasks(), vec![Task::new(1, "A"), Task::new(2, "local")]);
    }

    #[tokio::test]
    async fn test_fetch_failure_clears_loading_and_keeps_tasks() {
        let api = Arc::new(MemoryTaskApi::with_tasks(seeded()));
        api.set_failing(true);
        let store = TaskStore::new(api.clone());

        let result = store.fetch_tasks(URL).await;

        assert!(result.is_err());
        assert!(!store.is_loading());
        assert!(store.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_stale_fetch_is_discarded() {
        let api = Arc::new(MemoryTaskApi::with_tasks(seeded()));
        let store = TaskStore::new(api.clone());
        api.push_delay(Duration::from_millis(50));

        let (stale, fresh) = tokio::join!(store.fetch_tasks("mem://slow"), async {
            let outcome = store.fetch_tasks("mem://fast").await;
            store.toggle_completed(TaskId(1));
            outcome
        });

        assert_eq!(stale.unwrap(), Outcome::Superseded);
        assert_eq!(fresh.unwrap(), Outcome::Applied(2));
        assert!(!store.is_loading());
        // The toggle made after the fresh fetch survived the stale response
        assert!(store.tasks()[0].completed);
    }

    #[tokio::test]
    async fn test_add_blank_title_is_skipped_without_request() {
        let (api, store) = loaded(seeded()).await;

        let outcome = store.add_task("   \t ").await.unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(store.tasks(), seeded());
        assert_eq!(api.calls(), vec![ApiCall::Fetch(URL.to_string())]);
    }

    #[tokio::test]
    async fn test_add_appends_with_local_id() {
        let (api, store) = loaded(seeded()).await;

        let task = store.add_task("  Buy milk ").await.unwrap().applied().unwrap();

        assert_eq!(task.title, "Buy milk");
        assert!(!task.completed);
        assert!(task.id.0 > 1_600_000_000_000, "id should be a ms timestamp");
        assert_eq!(store.tasks().last(), Some(&task));
        assert!(api.calls().contains(&ApiCall::Create(NewTask::new("Buy milk"))));
    }

    #[tokio::test]
    async fn test_add_failure_leaves_tasks_unchanged() {
        let (api, store) = loaded(seeded()).await;
        api.set_failing(true);

        assert!(store.add_task("X").await.is_err());
        assert_eq!(store.tasks(), seeded());
    }

    #[tokio::test]
    async fn test_concurrent_adds_get_distinct_ids() {
        let (api, store) = loaded(vec![]).await;
        api.push_delay(Duration::from_millis(30));
        api.push_delay(Duration::from_millis(5));

        let (first, second) = tokio::join!(store.add_task("X"), store.add_task("X"));
        let first = first.unwrap().applied().unwrap();
        let second = second.unwrap().applied().unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.title, "X");
        assert_eq!(second.title, "X");
        // The faster request resolved first, so it was appended first
        assert_eq!(store.tasks(), vec![second, first]);
    }

    #[tokio::test]
    async fn test_local_ids_skip_existing_ids() {
        let now = now_ms();
        let (_api, store) = loaded(vec![Task::new(now, "A"), Task::new(now + 1, "B")]).await;

        let task = store.add_task("C").await.unwrap().applied().unwrap();

        let ids: Vec<_> = store.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids[..2].contains(&task.id));
    }

    #[tokio::test]
    async fn test_edit_then_update() {
        let (_api, store) = loaded(seeded()).await;

        assert_eq!(store.begin_edit(TaskId(1)), Some("A".to_string()));
        assert_eq!(store.editing_id(), Some(TaskId(1)));

        let task = store.update_task(TaskId(1), "A2").await.unwrap().applied().unwrap();

        assert_eq!(task, Task::new(1, "A2"));
        assert_eq!(store.tasks()[0], Task::new(1, "A2"));
        assert_eq!(store.editing_id(), None);
    }

    #[tokio::test]
    async fn test_update_keeps_completion() {
        let (_api, store) = loaded(seeded()).await;

        store.update_task(TaskId(2), "B2").await.unwrap();

        assert_eq!(store.tasks()[1], Task::new(2, "B2").done());
    }

    #[tokio::test]
    async fn test_begin_edit_unknown_id_is_noop() {
        let (_api, store) = loaded(seeded()).await;

        assert_eq!(store.begin_edit(TaskId(99)), None);
        assert_eq!(store.editing_id(), None);
    }

    #[tokio::test]
    async fn test_update_failure_keeps_editing() {
        let (api, store) = loaded(seeded()).await;
        store.begin_edit(TaskId(1));
        api.set_failing(true);

        assert!(store.update_task(TaskId(1), "A2").await.is_err());
        assert_eq!(store.tasks(), seeded());
        assert_eq!(store.editing_id(), Some(TaskId(1)));
    }

    #[tokio::test]
    async fn test_update_blank_or_unknown_is_skipped() {
        let (api, store) = loaded(seeded()).await;

        assert_eq!(store.update_task(TaskId(1), "  ").await.unwrap(), Outcome::Skipped);
        assert_eq!(store.update_task(TaskId(99), "Z").await.unwrap(), Outcome::Skipped);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_update_does_not_overwrite_newer_title() {
        let (api, store) = loaded(seeded()).await;
        api.push_delay(Duration::from_millis(50));

        let (old, new) = tokio::join!(
            store.update_task(TaskId(1), "older"),
            store.update_task(TaskId(1), "newer")
        );

        assert_eq!(old.unwrap(), Outcome::Superseded);
        assert!(new.unwrap().is_applied());
        assert_eq!(store.tasks()[0].title, "newer");
    }

    #[tokio::test]
    async fn test_update_of_task_deleted_in_flight_is_superseded() {
        let (api, store) = loaded(seeded()).await;
        api.push_delay(Duration::from_millis(30));

        let (update, deletion) = tokio::join!(store.update_task(TaskId(1), "A2"), store.delete_task(TaskId(1)));

        assert_eq!(update.unwrap(), Outcome::Superseded);
        assert!(deletion.removed.is_some());
        assert_eq!(store.tasks(), vec![Task::new(2, "B").done()]);
    }

    #[tokio::test]
    async fn test_submit_follows_edit_state() {
        let (_api, store) = loaded(seeded()).await;

        let added = store.submit("C").await.unwrap().applied().unwrap();
        assert_eq!(store.total_count(), 3);

        store.begin_edit(added.id);
        let updated = store.submit("C2").await.unwrap().applied().unwrap();

        assert_eq!(updated.id, added.id);
        assert_eq!(updated.title, "C2");
        assert_eq!(store.total_count(), 3);
        assert_eq!(store.editing_id(), None);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_and_unknown_is_noop() {
        let (_api, store) = loaded(seeded()).await;

        assert!(store.toggle_completed(TaskId(1)));
        assert!(store.tasks()[0].completed);
        assert!(store.toggle_completed(TaskId(1)));
        assert!(!store.tasks()[0].completed);

        assert!(!store.toggle_completed(TaskId(99)));
        assert_eq!(store.tasks(), seeded());
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_and_keeps_order() {
        let (_api, store) = loaded(vec![Task::new(1, "A"), Task::new(2, "B"), Task::new(3, "C")]).await;

        let deletion = store.delete_task(TaskId(2)).await;

        assert!(deletion.remote.is_ok());
        assert_eq!(deletion.removed, Some(Task::new(2, "B")));
        assert_eq!(store.tasks(), vec![Task::new(1, "A"), Task::new(3, "C")]);
    }

    #[tokio::test]
    async fn test_delete_removes_locally_when_remote_fails() {
        let (api, store) = loaded(seeded()).await;
        api.set_failing(true);

        let deletion = store.delete_task(TaskId(1)).await;

        assert!(deletion.remote.is_err());
        assert_eq!(deletion.removed, Some(Task::new(1, "A")));
        assert_eq!(store.tasks(), vec![Task::new(2, "B").done()]);
    }

    #[tokio::test]
    async fn test_deleting_edited_task_returns_to_adding() {
        let (_api, store) = loaded(vec![Task::new(1, "A")]).await;
        store.begin_edit(TaskId(1));

        store.delete_task(TaskId(1)).await;
        assert_eq!(store.editing_id(), None);

        let first = store.submit("new task").await.unwrap().applied().unwrap();
        let second = store.submit("another").await.unwrap().applied().unwrap();

        assert_eq!(first.title, "new task");
        assert_eq!(second.title, "another");
        assert_eq!(store.total_count(), 2);
    }

    #[tokio::test]
    async fn test_clearing_edited_task_returns_to_adding() {
        let (_api, store) = loaded(seeded()).await;
        store.begin_edit(TaskId(2));

        assert_eq!(store.clear_completed(), 1);
        assert_eq!(store.editing_id(), None);

        let task = store.submit("C").await.unwrap().applied().unwrap();
        assert_eq!(store.tasks(), vec![Task::new(1, "A"), task]);
    }

    #[tokio::test]
    async fn test_refetch_without_edited_task_leaves_editing() {
        let (api, store) = loaded(seeded()).await;
        let added = store.add_task("local only").await.unwrap().applied().unwrap();
        store.begin_edit(added.id);
        // The memory server stored it under its own id, so the local id vanishes
        assert!(api.server_tasks().iter().all(|t| t.id != added.id));

        store.fetch_tasks(URL).await.unwrap();

        assert_eq!(store.editing_id(), None);
    }

    #[tokio::test]
    async fn test_failed_update_forgets_its_sequence() {
        let (api, store) = loaded(seeded()).await;
        api.set_failing(true);

        assert!(store.update_task(TaskId(1), "A2").await.is_err());
        assert!(store.lock().latest_update.is_empty());

        api.set_failing(false);
        assert!(store.update_task(TaskId(1), "A3").await.unwrap().is_applied());
        assert!(store.lock().latest_update.is_empty());
    }

    #[tokio::test]
    async fn test_clear_completed_drops_pending_update_of_removed_task() {
        let (api, store) = loaded(seeded()).await;
        api.push_delay(Duration::from_millis(30));

        let (update, cleared) = tokio::join!(store.update_task(TaskId(2), "B2"), async { store.clear_completed() });

        assert_eq!(cleared, 1);
        assert_eq!(update.unwrap(), Outcome::Superseded);
        assert!(store.lock().latest_update.is_empty());
    }

    #[tokio::test]
    async fn test_complete_all_then_clear_completed_empties() {
        let (_api, store) = loaded(vec![Task::new(1, "A"), Task::new(2, "B").done(), Task::new(3, "C")]).await;

        assert_eq!(store.complete_all(), 2);
        assert_eq!(store.completed_count(), 3);
        assert_eq!(store.clear_completed(), 3);
        assert!(store.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_clear_completed_keeps_open_tasks() {
        let (_api, store) = loaded(seeded()).await;

        assert_eq!(store.clear_completed(), 1);
        assert_eq!(store.tasks(), vec![Task::new(1, "A")]);
    }

    #[tokio::test]
    async fn test_filtered_view_follows_filter() {
        let (_api, store) = loaded(seeded()).await;

        store.set_filter(Filter::Completed);
        assert_eq!(store.filtered_tasks(), vec![Task::new(2, "B").done()]);

        store.set_filter(Filter::Uncompleted);
        assert_eq!(store.filtered_tasks(), vec![Task::new(1, "A")]);

        store.set_filter(Filter::parse_lenient("bogus"));
        assert_eq!(store.filter(), Filter::All);
        assert_eq!(store.filtered_tasks(), seeded());

        // The view is derived on every read
        store.set_filter(Filter::Completed);
        store.toggle_completed(TaskId(1));
        assert_eq!(store.filtered_tasks().len(), 2);
    }
}
