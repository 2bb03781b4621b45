use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};
use eyre::{Context, Result};
use std::path::PathBuf;
use taskboard::config::{Backend, Config, ConfigFile};
use taskboard::{
    Criterion, KeyValueSlot, LoadOutcome, Priority, StoreError, StoreResult, Task, TaskFilter, TaskStatus, TaskStore,
    TaskUpdate, new_task_id,
};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Taskboard CLI - planner tasks with durable local persistence")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Config file (default: <config dir>/taskboard/config.yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the persisted tasks
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Storage backend: file or sqlite
    #[arg(short, long)]
    backend: Option<Backend>,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Free-form due time, e.g. "5:00 PM"
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(short, long, default_value = "Medium")]
        priority: Priority,
        /// Explicit id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Mark the task as shown on the planner board
        #[arg(long)]
        planner: bool,
    },

    /// Merge a JSON object of fields into a task
    Edit { id: String, updates: String },

    /// Mark a task completed
    Complete { id: String },

    /// Delete a task
    Delete { id: String },

    /// Insert or fully replace a task from its JSON form
    Sync { task: String },

    /// Move the task at one position to another (0-based)
    Move { from: usize, to: usize },

    /// Post a task to the focus view
    Focus { id: String },

    /// List tasks
    List {
        #[arg(long)]
        status: Option<TaskStatus>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        subject: Option<String>,
        /// Only tasks in the focus view
        #[arg(long)]
        focus: bool,
        /// Hide completed tasks
        #[arg(long)]
        pending: bool,
        /// Print the raw JSON array
        #[arg(long)]
        json: bool,
    },

    /// Print one task as JSON
    Show { id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let overrides = ConfigFile {
        backend: cli.backend,
        data_dir: cli.data_dir,
        key: None,
    };
    let config = Config::resolve(cli.config.as_deref(), overrides)?;

    let slot = config.open_slot()?;
    let mut store = TaskStore::open_with_key(slot, config.key.clone())?;
    report_load(store.load_outcome());

    run(&mut store, cli.command)?;

    if let Some(backup) = store.backup_key() {
        eprintln!(
            "{} data that could not be loaded was saved under key '{}'",
            "warning:".yellow().bold(),
            backup
        );
    }
    Ok(())
}

fn run(store: &mut TaskStore<Box<dyn KeyValueSlot>>, command: Commands) -> Result<()> {
    match command {
        Commands::Add {
            title,
            description,
            due,
            subject,
            priority,
            id,
            planner,
        } => {
            let mut task = Task::new(id.unwrap_or_else(new_task_id), title).with_priority(priority);
            task.description = description;
            task.due_time = due;
            task.subject = subject;
            task.status = Some(TaskStatus::Todo);
            task.completed = Some(false);
            if planner {
                task.in_planner = Some(true);
            }
            let id = task.id.clone();
            saved(store.add_task(task).map(|_| true))?;
            println!("Added {}", id);
        }
        Commands::Edit { id, updates } => {
            let updates: TaskUpdate = serde_json::from_str(&updates).context("Invalid update JSON")?;
            if saved(store.edit_task(&id, updates))? {
                println!("Updated {}", id);
            } else {
                not_found(&id);
            }
        }
        Commands::Complete { id } => {
            if saved(store.complete_task(&id))? {
                println!("Completed {}", id);
            } else {
                not_found(&id);
            }
        }
        Commands::Delete { id } => {
            if saved(store.delete_task(&id))? {
                println!("Deleted {}", id);
            } else {
                not_found(&id);
            }
        }
        Commands::Sync { task } => {
            let task: Task = serde_json::from_str(&task).context("Invalid task JSON")?;
            let id = task.id.clone();
            saved(store.sync_task(task).map(|_| true))?;
            println!("Synced {}", id);
        }
        Commands::Move { from, to } => {
            if saved(store.reorder_tasks(from, to))? {
                println!("Moved task {} to {}", from, to.min(store.tasks().len().saturating_sub(1)));
            } else {
                println!("{}", format!("No task at position {}", from).yellow());
            }
        }
        Commands::Focus { id } => {
            if saved(store.send_to_focus(&id))? {
                println!("Sent {} to focus", id);
            } else if store.get(&id).is_some() {
                println!("{}", format!("Task {} is already in focus", id).yellow());
            } else {
                not_found(&id);
            }
        }
        Commands::List {
            status,
            priority,
            subject,
            focus,
            pending,
            json,
        } => {
            let mut filter = TaskFilter::new();
            if let Some(status) = status {
                filter = filter.with(Criterion::Status(status));
            }
            if let Some(priority) = priority {
                filter = filter.with(Criterion::Priority(priority));
            }
            if let Some(subject) = subject {
                filter = filter.with(Criterion::Subject(subject));
            }
            if focus {
                filter = filter.with(Criterion::InFocus(true));
            }
            if pending {
                filter = filter.with(Criterion::Completed(false));
            }

            let tasks = store.tasks();
            if json {
                let matching = filter.apply(tasks);
                println!("{}", serde_json::to_string_pretty(&matching)?);
                return Ok(());
            }

            let mut shown = 0;
            for (position, task) in tasks.iter().enumerate() {
                if filter.matches(task) {
                    print_task(position, task);
                    shown += 1;
                }
            }
            if shown == 0 && filter.is_empty() {
                println!("No tasks");
            } else if shown == 0 {
                let criteria: Vec<String> = filter.criteria().iter().map(|c| c.to_string()).collect();
                println!("No tasks matching {}", criteria.join(", "));
            }
        }
        Commands::Show { id } => match store.get(&id) {
            Some(task) => println!("{}", serde_json::to_string_pretty(task)?),
            None => not_found(&id),
        },
    }

    Ok(())
}

// A failed write leaves the change in memory only, which dies with this process
fn saved(result: StoreResult<bool>) -> Result<bool> {
    match result {
        Err(e @ StoreError::PersistenceWrite { .. }) => {
            eprintln!("{} {}", "warning:".yellow().bold(), e);
            Err(e).context("Change was applied but could not be saved")
        }
        other => Ok(other?),
    }
}

fn report_load(outcome: &LoadOutcome) {
    match outcome {
        LoadOutcome::Corrupted { error } => {
            eprintln!("{} saved tasks are corrupted, starting empty ({})", "warning:".yellow().bold(), error)
        }
        LoadOutcome::Unreadable { error } => {
            eprintln!("{} could not read saved tasks, starting empty ({})", "warning:".yellow().bold(), error)
        }
        LoadOutcome::Restored { skipped, .. } if *skipped > 0 => {
            eprintln!("{} skipped {} saved task(s) that could not be read", "warning:".yellow().bold(), skipped)
        }
        LoadOutcome::Fresh | LoadOutcome::Restored { .. } => {}
    }
}

fn not_found(id: &str) {
    println!("{}", format!("No task with id {}", id).yellow());
}

fn priority_label(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => priority.as_str().red().bold(),
        Priority::Medium => priority.as_str().yellow(),
        Priority::Low => priority.as_str().green(),
    }
}

fn print_task(position: usize, task: &Task) {
    let mark = if task.is_completed() { "[x]" } else { "[ ]" };
    let title = if task.is_completed() {
        task.title.dimmed()
    } else {
        task.title.normal()
    };

    let mut line = format!("{:>3}. {} {} ({})", position, mark, title, priority_label(task.priority));
    if let Some(subject) = &task.subject {
        line.push_str(&format!(" #{}", subject.cyan()));
    }
    if let Some(due) = &task.due_time {
        line.push_str(&format!(" due {}", due));
    }
    if let Some(status) = task.status.filter(|s| *s == TaskStatus::InProgress) {
        line.push_str(&format!(" [{}]", status.to_string().blue()));
    }
    if task.is_in_focus() {
        line.push_str(&format!(" {}", "focus".magenta()));
    }
    println!("{}  {}", line, task.id.dimmed());
}
