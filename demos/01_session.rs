//! Demo 01: A To-do Session
//!
//! Drives a TaskStore through a typical session against an in-memory task
//! server: initial fetch, add, edit, complete, filter and clean up.
//!
//! Run with: cargo run --example 01_session

use eyre::Result;
use std::sync::Arc;
use todostore::{Filter, MemoryTaskApi, Notice, Task, TaskId, TaskStore};

fn print_tasks(store: &TaskStore) {
    for task in store.filtered_tasks() {
        let mark = if task.completed { "x" } else { " " };
        println!("   [{}] {:>14}  {}", mark, task.id, task.title);
    }
    println!(
        "   ({} of {} completed, filter: {})\n",
        store.completed_count(),
        store.total_count(),
        store.filter()
    );
}

fn print_notice(notice: Option<Notice>) {
    if let Some(notice) = notice {
        println!("   -> {}", notice);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("TodoStore Session Demo");
    println!("======================\n");

    let api = Arc::new(MemoryTaskApi::with_tasks(vec![
        Task::new(1, "delectus aut autem"),
        Task::new(2, "quis ut nam facilis et officia qui"),
        Task::new(3, "fugiat veniam minus").done(),
    ]));
    let store = TaskStore::new(api.clone());
    println!("Store created (loading: {})\n", store.is_loading());

    // FETCH
    println!("1. FETCH - Loading tasks...");
    let result = store.fetch_tasks("mem://todos?_limit=4").await;
    print_notice(Notice::for_fetch(&result));
    print_tasks(&store);

    // ADD
    println!("2. ADD - Adding a task, then a blank one...");
    let result = store.submit("Write the weekly report").await;
    print_notice(Notice::for_add(&result));
    let result = store.submit("   ").await;
    println!("   blank input: {:?}", result?);
    print_tasks(&store);

    // EDIT
    println!("3. EDIT - Retitling task 1...");
    if let Some(title) = store.begin_edit(TaskId(1)) {
        println!("   editing #1, buffer holds: {}", title);
    }
    let result = store.submit("Read the autem chapter").await;
    print_notice(Notice::for_update(&result));
    print_tasks(&store);

    // COMPLETE + FILTER
    println!("4. TOGGLE + FILTER - Completing task 2 and showing open tasks...");
    store.toggle_completed(TaskId(2));
    store.set_filter(Filter::Uncompleted);
    print_tasks(&store);

    // DELETE
    println!("5. DELETE - Removing task 3...");
    print_notice(Notice::for_delete(&store.delete_task(TaskId(3)).await));
    store.set_filter(Filter::All);
    print_tasks(&store);

    // BULK
    println!("6. BULK - Complete all, then clear completed...");
    println!("   completed {} task(s)", store.complete_all());
    println!("   cleared {} task(s)", store.clear_completed());
    print_tasks(&store);

    println!("Server saw {} request(s).", api.calls().len());
    println!("\nDemo completed successfully!");
    Ok(())
}
