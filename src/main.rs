use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use todostore::{Config, Filter, HttpTaskApi, Notice, NoticeLevel, TaskId, TaskStore};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;

#[derive(Parser)]
#[command(name = "todostore")]
#[command(about = "TodoStore CLI - To-do list over a remote REST task API")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Path to a YAML config file (default: <config dir>/todostore/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the task API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tasks and print them
    List {
        /// all, completed or uncompleted
        #[arg(short, long, default_value = "all")]
        filter: String,
    },

    /// Interactive session reading commands from stdin
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }

    let api = Arc::new(HttpTaskApi::from_config(&config)?);
    let store = TaskStore::new(api);

    println!("Loading tasks from {}...", config.list_url());
    let fetched = store.fetch_tasks(&config.list_url()).await;
    show(Notice::for_fetch(&fetched));

    match cli.command {
        Commands::List { filter } => {
            store.set_filter(Filter::parse_lenient(&filter));
            render(&store);
        }
        Commands::Shell => {
            render(&store);
            shell(&store).await?;
        }
    }

    Ok(())
}

/// Commands accepted by the interactive shell
#[derive(Debug, PartialEq, Eq)]
enum ShellCommand {
    Add(String),
    Edit(TaskId),
    Toggle(TaskId),
    Delete(TaskId),
    CompleteAll,
    ClearCompleted,
    Filter(Filter),
    List,
    Help,
    Quit,
}

impl ShellCommand {
    fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let id = || rest.parse::<TaskId>().map_err(|_| format!("'{}' is not a task id", rest.trim()));

        match word {
            "add" | "a" => Ok(ShellCommand::Add(rest.to_string())),
            "edit" | "e" => Ok(ShellCommand::Edit(id()?)),
            "toggle" | "t" => Ok(ShellCommand::Toggle(id()?)),
            "delete" | "d" => Ok(ShellCommand::Delete(id()?)),
            "complete-all" => Ok(ShellCommand::CompleteAll),
            "clear-completed" => Ok(ShellCommand::ClearCompleted),
            "filter" | "f" => Ok(ShellCommand::Filter(Filter::parse_lenient(rest))),
            "list" | "ls" | "" => Ok(ShellCommand::List),
            "help" | "?" => Ok(ShellCommand::Help),
            "quit" | "q" | "exit" => Ok(ShellCommand::Quit),
            other => Err(format!("unknown command '{}', try 'help'", other)),
        }
    }
}

const HELP: &str = "\
add <text>        add a task, or save the title while editing
edit <id>         start editing a task
toggle <id>       flip completion
delete <id>       delete a task
complete-all      mark every task completed
clear-completed   remove completed tasks
filter <name>     all | completed | uncompleted
list              show tasks
quit              leave";

async fn shell(store: &TaskStore) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let prompt = match store.editing_id() {
            Some(id) => format!("edit #{}> ", id),
            None => "todo> ".to_string(),
        };
        print!("{}", prompt.bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match ShellCommand::parse(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{}", message.yellow());
                continue;
            }
        };

        match command {
            ShellCommand::Add(text) => {
                let editing = store.editing_id().is_some();
                let result = store.submit(&text).await;
                show(if editing {
                    Notice::for_update(&result)
                } else {
                    Notice::for_add(&result)
                });
            }
            ShellCommand::Edit(id) => match store.begin_edit(id) {
                Some(title) => println!("Editing #{}: {}", id, title),
                None => println!("{}", format!("No task #{}", id).yellow()),
            },
            ShellCommand::Toggle(id) => {
                if !store.toggle_completed(id) {
                    println!("{}", format!("No task #{}", id).yellow());
                }
            }
            ShellCommand::Delete(id) => show(Notice::for_delete(&store.delete_task(id).await)),
            ShellCommand::CompleteAll => {
                store.complete_all();
            }
            ShellCommand::ClearCompleted => {
                store.clear_completed();
            }
            ShellCommand::Filter(filter) => store.set_filter(filter),
            ShellCommand::List => {}
            ShellCommand::Help => {
                println!("{}", HELP);
                continue;
            }
            ShellCommand::Quit => break,
        }

        render(store);
    }

    Ok(())
}

fn show(notice: Option<Notice>) {
    let Some(notice) = notice else {
        return;
    };
    match notice.level {
        NoticeLevel::Success => println!("{}", notice.message.green()),
        NoticeLevel::Error => println!("{}", notice.message.red()),
    }
}

fn render(store: &TaskStore) {
    let tasks = store.filtered_tasks();
    println!(
        "{} ({} of {} completed, showing {})",
        "Todo List".bold(),
        store.completed_count(),
        store.total_count(),
        store.filter()
    );

    if tasks.is_empty() {
        println!("  {}", "no tasks".dimmed());
    }
    for task in tasks {
        let mark = if task.completed { "[x]".green() } else { "[ ]".normal() };
        let title = if task.completed {
            task.title.strikethrough()
        } else {
            task.title.normal()
        };
        let editing = if store.editing_id() == Some(task.id) {
            " (editing)".cyan()
        } else {
            "".normal()
        };
        println!("  {} {:>14}  {}{}", mark, task.id.to_string().dimmed(), title, editing);
    }
}
