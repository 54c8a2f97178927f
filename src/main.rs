use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use eyre::{Result, eyre};
use meshek::report::format_date;
use meshek::{
    Branch, Config, LocalBackend, NewTask, Recurrence, Registry, RegistryError, RegistryOptions, Task, TaskEdit,
    Urgency, YearMonth, calendar_link, export_filename, render_report,
};
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "meshek")]
#[command(about = "Meshek - recurring farm task tracker")]
#[command(version = env!("GIT_DESCRIBE"))]
struct Cli {
    /// Directory holding the task store (default: from config, else the platform data dir)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a task
    Add {
        title: String,

        /// Branch code: solar, dir, lychee, olives, avocado
        #[arg(short, long, value_parser = parse_branch)]
        branch: Branch,

        /// Due date YYYY-MM-DD (default: today)
        #[arg(long)]
        due: Option<NaiveDate>,

        #[arg(short, long)]
        assignee: Option<String>,

        #[arg(short, long, default_value = "")]
        notes: String,

        /// none, daily, weekly or monthly
        #[arg(short, long, default_value = "none")]
        recurring: Recurrence,
    },

    /// Mark a task done, or reopen a done task
    Toggle { id: String },

    /// Change a task's fields
    Edit(EditArgs),

    /// Move a completed task back to the active list
    Restore { id: String },

    /// Delete a task permanently
    Delete { id: String },

    /// Show active tasks, earliest due first
    List {
        #[arg(short, long, value_parser = parse_branch)]
        branch: Option<Branch>,
    },

    /// Show the completion log, most recent first
    Log(LogFilter),

    /// Show task counts
    Stats,

    /// Write the completion log to a text file
    Export {
        #[command(flatten)]
        filter: LogFilter,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Print a calendar link for a task
    Calendar { id: String },

    /// Rebuild the SQLite cache from the JSONL files
    Sync,
}

#[derive(Args)]
struct EditArgs {
    id: String,

    #[arg(long)]
    title: Option<String>,

    #[arg(short, long, value_parser = parse_branch)]
    branch: Option<Branch>,

    #[arg(short, long, conflicts_with = "clear_assignee")]
    assignee: Option<String>,

    /// Remove the assignee
    #[arg(long)]
    clear_assignee: bool,

    #[arg(long)]
    due: Option<NaiveDate>,

    #[arg(short, long)]
    notes: Option<String>,

    #[arg(short, long)]
    recurring: Option<Recurrence>,
}

impl EditArgs {
    fn to_edit(&self) -> TaskEdit {
        let assignee = if self.clear_assignee {
            Some(None)
        } else {
            self.assignee.clone().map(Some)
        };
        TaskEdit {
            title: self.title.clone(),
            branch: self.branch.clone(),
            assignee,
            due_date: self.due,
            notes: self.notes.clone(),
            recurring: self.recurring,
        }
    }
}

#[derive(Args)]
struct LogFilter {
    #[arg(short, long, value_parser = parse_branch)]
    branch: Option<Branch>,

    /// Completion month YYYY-MM
    #[arg(short, long)]
    month: Option<YearMonth>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir());
    debug!(data_dir = %data_dir.display(), "Opening task store");
    let backend = LocalBackend::open(&data_dir)?;

    let options = RegistryOptions::default().require_assignee(config.require_assignee);
    let mut registry = Registry::open(backend, options)?;

    match run(&mut registry, &config, cli.command) {
        Err(RegistryError::NotFound(id)) => {
            // Already gone, most likely removed by another session
            warn!(id = %id, "Task not found");
            println!("Task {} not found; nothing to do", id);
            Ok(())
        }
        other => Ok(other?),
    }
}

fn run(registry: &mut Registry<LocalBackend>, config: &Config, command: Commands) -> meshek::Result<()> {
    match command {
        Commands::Add {
            title,
            branch,
            due,
            assignee,
            notes,
            recurring,
        } => {
            let mut new = NewTask::new(title, branch, due.unwrap_or_else(|| registry.today()))
                .notes(notes)
                .recurring(recurring);
            new.assignee = assignee;
            let task = registry.create(new)?;
            println!("{} {}", "Added".green(), task.title);
            print_task(registry, config, &task);
        }
        Commands::Toggle { id } => {
            let id = resolve_id(registry, &id)?;
            let toggled = registry.toggle(&id)?;
            let verb = if toggled.task.completed { "Completed" } else { "Reopened" };
            println!("{} {}", verb.green(), toggled.task.title);
            if let Some(next) = &toggled.successor {
                println!("Next {} occurrence due {}", next.recurring, format_date(next.due_date));
            }
        }
        Commands::Edit(args) => {
            let id = resolve_id(registry, &args.id)?;
            let task = registry.edit(&id, args.to_edit())?;
            println!("{} {}", "Updated".green(), task.title);
            print_task(registry, config, &task);
        }
        Commands::Restore { id } => {
            let id = resolve_id(registry, &id)?;
            let task = registry.restore(&id)?;
            println!("{} {}", "Restored".green(), task.title);
        }
        Commands::Delete { id } => {
            let id = resolve_id(registry, &id)?;
            registry.delete(&id)?;
            println!("{} {}", "Deleted".red(), id);
        }
        Commands::List { branch } => {
            let active = registry.list_active(branch.as_ref());
            if active.is_empty() {
                println!("No active tasks");
            }
            for task in active {
                print_task(registry, config, task);
            }
            print_stats(registry);
        }
        Commands::Log(filter) => {
            let completed = registry.list_completed(filter.branch.as_ref(), filter.month);
            if completed.is_empty() {
                println!("No completed tasks");
            }
            for task in completed {
                print_task(registry, config, task);
            }
        }
        Commands::Stats => print_stats(registry),
        Commands::Export { filter, out } => {
            let completed = registry.list_completed(filter.branch.as_ref(), filter.month);
            if completed.is_empty() {
                println!("No completed tasks to export");
                return Ok(());
            }
            let report = render_report(&completed, registry.now());
            let path = out.join(export_filename(&config.export_prefix, registry.today()));
            std::fs::write(&path, report)
                .map_err(|e| RegistryError::Persistence(eyre!("Failed to write {}: {}", path.display(), e)))?;
            println!("Exported {} tasks to {}", completed.len(), path.display());
        }
        Commands::Calendar { id } => {
            let id = resolve_id(registry, &id)?;
            let task = registry.get(&id).ok_or_else(|| RegistryError::not_found(&id))?;
            println!("{}", calendar_link(task));
        }
        Commands::Sync => {
            println!("Syncing database from JSONL files...");
            registry.backend_mut().sync()?;
            registry.reload()?;
            println!("Sync complete ({} tasks)", registry.tasks().len());
        }
    }
    Ok(())
}

/// Known branch codes only; `Branch::from` would let typos through as `Unknown`
fn parse_branch(s: &str) -> std::result::Result<Branch, String> {
    s.parse()
}

/// Accept a full id, or an unambiguous prefix or suffix of one
fn resolve_id(registry: &Registry<LocalBackend>, input: &str) -> meshek::Result<String> {
    if registry.get(input).is_some() {
        return Ok(input.to_string());
    }
    let matches: Vec<&Task> = registry
        .tasks()
        .iter()
        .filter(|t| t.id.starts_with(input) || t.id.ends_with(input))
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => Err(RegistryError::not_found(input)),
        _ => Err(RegistryError::validation(format!(
            "id '{}' matches {} tasks",
            input,
            matches.len()
        ))),
    }
}

fn print_task(registry: &Registry<LocalBackend>, config: &Config, task: &Task) {
    // UUIDv7 ids share their leading timestamp bits, so show the tail
    let short_id = task
        .id
        .char_indices()
        .rev()
        .nth(7)
        .map_or(task.id.as_str(), |(i, _)| &task.id[i..]);
    let due = format_date(task.due_date);
    let due = match registry.urgency(task) {
        Urgency::Overdue => format!("{} (overdue!)", due).red().bold(),
        Urgency::DueSoon => due.yellow(),
        Urgency::Normal => due.normal(),
    };
    let title = if task.completed {
        task.title.dimmed()
    } else {
        task.title.bold()
    };

    let mut line = format!("{}  {}  {}  [{}]", short_id.dimmed(), due, title, task.branch.display_name());
    if let Some(assignee) = task.assignee_label(&config.assignees) {
        line.push_str(&format!("  @{}", assignee));
    }
    if task.recurring.is_recurring() {
        line.push_str(&format!("  ↻ {}", task.recurring));
    }
    println!("{}", line);

    if !task.notes.is_empty() {
        println!("          📝 {}", task.notes);
    }
    if let Some(done) = task.completed_date {
        println!("          {}", format!("✓ completed {}", format_date(done.date_naive())).green());
    }
}

fn print_stats(registry: &Registry<LocalBackend>) {
    let stats = registry.stats();
    println!(
        "Total: {}  Active: {}  Completed: {}",
        stats.total,
        stats.active.to_string().yellow(),
        stats.completed.to_string().green()
    );
}
