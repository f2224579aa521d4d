//! Flowboard CLI - drive a feature and task board from the terminal

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use flowboard_core::application::sync::{SharedExecutionStore, SharedFeatureStore};
use flowboard_core::application::{
    BackendSyncAdapter, DragEndEvent, DropOutcome, DropTarget, InMemoryBackend,
};
use flowboard_core::config::Config;
use flowboard_core::domain::events::TracingPublisher;
use flowboard_core::domain::{
    FeatureStatus, FeatureUpdate, LogLevel, NewFeature, Priority, Task, TaskStatus, TaskUpdate,
};
use flowboard_core::storage::BoardSnapshot;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Parser)]
#[command(name = "flowboard")]
#[command(author, version, about = "Feature and task workflow board", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Board file
    #[arg(long, global = true, default_value = "flowboard.json")]
    board: PathBuf,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the board
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },

    /// Manage features
    Features {
        #[command(subcommand)]
        action: FeatureAction,
    },

    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Control the execution run
    Run {
        #[command(subcommand)]
        action: RunAction,
    },

    /// Drop a card onto a column or another card
    Drag {
        /// Id of the dragged feature or task
        id: String,
        /// Target column (status)
        #[arg(long, conflicts_with = "onto")]
        column: Option<String>,
        /// Target card id
        #[arg(long)]
        onto: Option<String>,
        /// The dragged card is a task
        #[arg(long)]
        task: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BoardAction {
    /// Show every column
    Show,
}

#[derive(Subcommand)]
enum FeatureAction {
    /// List features
    List {
        /// Only this status
        #[arg(short, long, value_parser = parse_feature_status)]
        status: Option<FeatureStatus>,
        /// Match title, description or tags
        #[arg(long)]
        search: Option<String>,
        /// Only these priorities
        #[arg(short, long, value_parser = parse_priority)]
        priority: Vec<Priority>,
    },
    /// Add a feature to the backlog
    Add {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,
        #[arg(long)]
        tag: Vec<String>,
    },
    /// Move a feature to another column
    Move {
        id: String,
        #[arg(value_parser = parse_feature_status)]
        status: FeatureStatus,
    },
    /// Update feature fields
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long, value_parser = parse_priority)]
        priority: Option<Priority>,
    },
    /// Reorder a feature within its column
    Reorder {
        #[arg(value_parser = parse_feature_status)]
        status: FeatureStatus,
        from: usize,
        to: usize,
    },
    /// Remove a feature
    Remove { id: String },
}

#[derive(Subcommand)]
enum TaskAction {
    /// Add a task to a feature
    Add {
        feature_id: String,
        title: String,
        /// Task id (generated when omitted)
        #[arg(long)]
        id: Option<String>,
        /// Upstream task ids
        #[arg(long = "depends-on")]
        depends_on: Vec<String>,
        #[arg(short, long, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,
    },
    /// Change a task's status
    Status {
        id: String,
        #[arg(value_parser = parse_task_status)]
        status: TaskStatus,
        #[arg(long)]
        reason: Option<String>,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Start a ready task
    Start {
        id: String,
        #[arg(long)]
        agent: Option<String>,
    },
    /// Send a failed task back to pending
    Retry { id: String },
    /// Skip a failed or blocked task
    Skip { id: String },
    /// Cancel a failed or blocked task
    Cancel { id: String },
    /// Reopen a completed or cancelled task
    Reopen { id: String },
    /// Show what blocks a task
    Blocked { id: String },
    /// Show the next task to run
    Next,
    /// Promote pending tasks whose dependencies are complete
    Promote,
    /// Append a log line to a task
    Log {
        id: String,
        message: String,
        #[arg(long, default_value = "info")]
        level: String,
    },
}

#[derive(Subcommand)]
enum RunAction {
    /// Show run status
    Show,
    /// Begin planning
    Plan,
    /// Mark the plan ready
    Ready,
    /// Start executing and promote ready tasks
    Start,
    Pause,
    Resume,
    Fail,
    /// Reset the run
    Restart,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
    /// Reset to defaults
    Reset,
    /// Show config file path
    Path,
}

fn parse_feature_status(s: &str) -> Result<FeatureStatus, String> {
    FeatureStatus::parse(s).ok_or_else(|| {
        let valid: Vec<_> = FeatureStatus::all().iter().map(|s| s.as_str()).collect();
        format!("unknown feature status '{}' (expected one of: {})", s, valid.join(", "))
    })
}

fn parse_task_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s).ok_or_else(|| {
        let valid: Vec<_> = TaskStatus::all().iter().map(|s| s.as_str()).collect();
        format!("unknown task status '{}' (expected one of: {})", s, valid.join(", "))
    })
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    Priority::parse(s).ok_or_else(|| format!("unknown priority '{}'", s))
}

#[derive(Clone, Copy)]
struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn say(&self, message: impl AsRef<str>) {
        if !self.quiet && !self.is_json() {
            println!("{}", message.as_ref());
        }
    }

    fn json(&self, value: &serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

/// A board file opened for one command
///
/// Mutations go through the sync adapter against an in-process backend
/// seeded from the same file, so the CLI exercises the optimistic path a
/// remote-backed host would take.
struct Board {
    path: PathBuf,
    adapter: BackendSyncAdapter,
}

impl Board {
    async fn open(path: &Path, config: &Config) -> anyhow::Result<Self> {
        let snapshot = BoardSnapshot::load(path)
            .with_context(|| format!("Failed to load board file: {}", path.display()))?;
        let backend = InMemoryBackend::new(config.sync.push_buffer)
            .with_features(config.sync.project_id.clone(), snapshot.features.clone());
        let (features, tasks) = snapshot.into_stores(config, Arc::new(TracingPublisher))?;

        let adapter = BackendSyncAdapter::new(
            Arc::new(RwLock::new(features)),
            Arc::new(RwLock::new(tasks)),
            Arc::new(backend),
            config.sync.project_id.clone(),
        );
        adapter.load_features().await?;
        debug!(path = %path.display(), "Board opened");

        Ok(Self {
            path: path.to_path_buf(),
            adapter,
        })
    }

    fn features(&self) -> SharedFeatureStore {
        self.adapter.features()
    }

    fn tasks(&self) -> SharedExecutionStore {
        self.adapter.tasks()
    }

    /// Refresh card summaries and write the board back
    async fn save(&self) -> anyhow::Result<()> {
        let features = self.features();
        let tasks = self.tasks();
        let mut features = features.write().await;
        let tasks = tasks.read().await;

        let ids: Vec<String> = features.features().iter().map(|f| f.id.clone()).collect();
        for id in ids {
            features.set_task_summaries(&id, tasks.summaries_for(&id))?;
        }

        BoardSnapshot::from_stores(&features, &tasks)
            .save(&self.path)
            .with_context(|| format!("Failed to save board file: {}", self.path.display()))?;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FLOWBOARD_LOG")
                .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

/// Print an error with its hint; refusals exit with 2, failures with 1
fn report(err: &anyhow::Error) -> ExitCode {
    let Some(core) = err.downcast_ref::<flowboard_core::Error>() else {
        eprintln!("Error: {:#}", err);
        return ExitCode::FAILURE;
    };

    eprintln!("Error [{}]: {:#}", core.code(), err);
    if let Some(hint) = core.suggestion() {
        eprintln!("Hint: {}", hint);
    }
    if core.is_rejection() {
        ExitCode::from(2)
    } else {
        ExitCode::FAILURE
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let out = Output {
        format: cli.format,
        quiet: cli.quiet,
    };

    if let Commands::Config { action } = cli.command {
        return cmd_config(action, out);
    }

    let config = Config::load()?;
    let board = Board::open(&cli.board, &config).await?;

    match cli.command {
        Commands::Board { action } => cmd_board(&board, action, out).await,
        Commands::Features { action } => cmd_features(&board, action, out).await,
        Commands::Tasks { action } => cmd_tasks(&board, action, out).await,
        Commands::Run { action } => cmd_run(&board, action, out).await,
        Commands::Drag {
            id,
            column,
            onto,
            task,
        } => cmd_drag(&board, id, column, onto, task, out).await,
        Commands::Config { .. } => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_board(board: &Board, action: BoardAction, out: Output) -> anyhow::Result<()> {
    match action {
        BoardAction::Show => {
            let features = board.features();
            let tasks = board.tasks();
            let features = features.read().await;
            let tasks = tasks.read().await;

            if out.is_json() {
                let snapshot = BoardSnapshot::from_stores(&features, &tasks);
                return out.json(&serde_json::to_value(&snapshot)?);
            }

            println!("Features");
            for (status, count) in features.counts() {
                if status == FeatureStatus::InProgress {
                    println!("  {} ({}/{})", status.label(), count, features.wip_limit());
                } else {
                    println!("  {} ({})", status.label(), count);
                }
                for feature in features.column(status) {
                    println!(
                        "    {}  {}  [{}]  {}%",
                        feature.id,
                        feature.title,
                        feature.priority,
                        feature.progress()
                    );
                }
            }

            println!("Tasks");
            for status in TaskStatus::all() {
                let column = tasks.column(status);
                if column.is_empty() {
                    continue;
                }
                println!("  {} ({})", status, column.len());
                for task in column {
                    if task.blocked_by.is_empty() {
                        println!("    {}  {}", task.id, task.title);
                    } else {
                        println!(
                            "    {}  {}  (blocked by: {})",
                            task.id,
                            task.title,
                            task.blocked_by.join(", ")
                        );
                    }
                }
            }

            let run = tasks.run();
            println!(
                "Run: {}  {}/{} completed, {} failed",
                run.status, run.completed_count, run.total_tasks, run.failed_count
            );
        }
    }
    Ok(())
}

async fn cmd_features(board: &Board, action: FeatureAction, out: Output) -> anyhow::Result<()> {
    match action {
        FeatureAction::List {
            status,
            search,
            priority,
        } => {
            let store = board.features();
            let mut store = store.write().await;
            store.set_status_filter(status);
            store.set_priority_filter(priority);
            if let Some(search) = search {
                store.set_search(search);
            }

            let visible = store.visible();
            if out.is_json() {
                return out.json(&serde_json::to_value(&visible)?);
            }
            if visible.is_empty() {
                out.say("No features found.");
            }
            for feature in visible {
                println!(
                    "{}  {}  [{}]  {}",
                    feature.id,
                    feature.title,
                    feature.priority,
                    feature.status.label()
                );
            }
            return Ok(());
        }
        FeatureAction::Add {
            title,
            description,
            priority,
            tag,
        } => {
            let input = NewFeature {
                title,
                description,
                priority,
                tags: tag,
                ..Default::default()
            };
            let feature = board.adapter.create_feature(input).await?;
            if out.is_json() {
                out.json(&serde_json::to_value(&feature)?)?;
            } else if out.quiet {
                println!("{}", feature.id);
            } else {
                println!("Feature created: {}", feature.id);
            }
        }
        FeatureAction::Move { id, status } => {
            board.adapter.move_feature(&id, status).await?;
            out.say(format!("Feature '{}' moved to {}.", id, status.label()));
        }
        FeatureAction::Update {
            id,
            title,
            description,
            priority,
        } => {
            let update = FeatureUpdate {
                title,
                description,
                priority,
                ..Default::default()
            };
            if update.is_empty() {
                bail!("Nothing to update. Pass --title, --description or --priority.");
            }
            board.adapter.update_feature(&id, &update).await?;
            out.say(format!("Feature '{}' updated.", id));
        }
        FeatureAction::Reorder { status, from, to } => {
            let moved = board.features().write().await.reorder(status, from, to);
            if !moved {
                bail!(
                    "Cannot reorder {} from {} to {}: positions must differ and exist in the column",
                    status,
                    from,
                    to
                );
            }
            out.say(format!("Reordered {}.", status.label()));
        }
        FeatureAction::Remove { id } => {
            board.adapter.delete_feature(&id).await?;
            out.say(format!("Feature '{}' removed.", id));
        }
    }
    board.save().await
}

async fn cmd_tasks(board: &Board, action: TaskAction, out: Output) -> anyhow::Result<()> {
    let store = board.tasks();
    match action {
        TaskAction::Add {
            feature_id,
            title,
            id,
            depends_on,
            priority,
        } => {
            if board.features().read().await.get(&feature_id).is_none() {
                return Err(flowboard_core::Error::FeatureNotFound(feature_id).into());
            }
            let id = id.unwrap_or_else(Task::generate_id);
            let task = depends_on
                .into_iter()
                .fold(Task::new(&id, feature_id, title), |task, dep| task.with_dependency(dep))
                .with_priority(priority);
            store.write().await.add_task(task)?;
            if out.quiet {
                println!("{}", id);
            } else {
                out.say(format!("Task created: {}", id));
            }
        }
        TaskAction::Status {
            id,
            status,
            reason,
            agent,
        } => {
            let update = TaskUpdate {
                status: Some(status),
                reason,
                agent_id: agent,
                ..Default::default()
            };
            board.adapter.update_task(&id, &update).await?;
            out.say(format!("Task '{}' is now {}.", id, status));
        }
        TaskAction::Start { id, agent } => {
            store.write().await.start_task(&id, agent)?;
            out.say(format!("Task '{}' started.", id));
        }
        TaskAction::Retry { id } => {
            store.write().await.retry_task(&id)?;
            out.say(format!("Task '{}' queued for retry.", id));
        }
        TaskAction::Skip { id } => {
            store.write().await.skip_task(&id)?;
            out.say(format!("Task '{}' skipped.", id));
        }
        TaskAction::Cancel { id } => {
            store.write().await.cancel_task(&id)?;
            out.say(format!("Task '{}' cancelled.", id));
        }
        TaskAction::Reopen { id } => {
            store.write().await.reopen_task(&id)?;
            out.say(format!("Task '{}' reopened.", id));
        }
        TaskAction::Blocked { id } => {
            let state = store
                .read()
                .await
                .blocked_state(&id)
                .ok_or_else(|| flowboard_core::Error::TaskNotFound(id.clone()))?;
            if out.is_json() {
                return out.json(&json!({
                    "isBlocked": state.is_blocked,
                    "blockingIds": state.blocking_ids,
                }));
            }
            if !state.is_blocked {
                println!("Task '{}' is not blocked.", id);
            } else if state.blocking_ids.is_empty() {
                println!("Task '{}' is blocked.", id);
            } else {
                println!("Task '{}' is blocked by: {}", id, state.blocking_ids.join(", "));
            }
            return Ok(());
        }
        TaskAction::Next => {
            let store = store.read().await;
            let next = store.next_task();
            if out.is_json() {
                return out.json(&serde_json::to_value(next)?);
            }
            match next {
                Some(task) => println!("{}  {}  [{}]", task.id, task.title, task.priority),
                None => out.say("No ready task."),
            }
            return Ok(());
        }
        TaskAction::Promote => {
            let promoted = store.write().await.promote_ready();
            if promoted.is_empty() {
                out.say("No tasks to promote.");
            } else {
                out.say(format!("Promoted: {}", promoted.join(", ")));
            }
        }
        TaskAction::Log { id, message, level } => {
            let level = LogLevel::parse(&level)
                .ok_or_else(|| anyhow::anyhow!("Unknown log level '{}'", level))?;
            store.write().await.add_log(&id, level, message, None, None)?;
            out.say(format!("Logged to task '{}'.", id));
        }
    }
    board.save().await
}

async fn cmd_run(board: &Board, action: RunAction, out: Output) -> anyhow::Result<()> {
    let store = board.tasks();
    let mut store = store.write().await;
    match action {
        RunAction::Show => {
            let run = store.run();
            if out.is_json() {
                return out.json(&serde_json::to_value(run)?);
            }
            println!("Status: {}", run.status);
            println!(
                "Tasks: {} total, {} completed, {} failed, {} in progress ({}%)",
                run.total_tasks,
                run.completed_count,
                run.failed_count,
                run.in_progress_count,
                run.percent_complete()
            );
            if let Some(current) = &run.current_task_id {
                println!("Current task: {}", current);
            }
            return Ok(());
        }
        RunAction::Plan => store.plan_execution()?,
        RunAction::Ready => store.mark_ready()?,
        RunAction::Start => store.start_execution()?,
        RunAction::Pause => store.pause_execution()?,
        RunAction::Resume => store.resume_execution()?,
        RunAction::Fail => store.fail_execution()?,
        RunAction::Restart => store.restart_execution(),
    }
    out.say(format!("Run is {}.", store.run().status));
    drop(store);
    board.save().await
}

async fn cmd_drag(
    board: &Board,
    id: String,
    column: Option<String>,
    onto: Option<String>,
    task: bool,
    out: Output,
) -> anyhow::Result<()> {
    let target = match (column, onto) {
        (Some(column), _) => DropTarget::Column(column),
        (None, Some(item)) => DropTarget::Item(item),
        (None, None) => bail!("Pass --column <status> or --onto <id>."),
    };
    let event = if task {
        DragEndEvent::task(id, target)
    } else {
        DragEndEvent::feature(id, target)
    };

    match board.adapter.on_drag_end(&event).await? {
        DropOutcome::Moved => out.say(format!("Moved '{}'.", event.active_id)),
        DropOutcome::Reordered => out.say(format!("Reordered '{}'.", event.active_id)),
        DropOutcome::Rejected(reason) => bail!(reason),
        DropOutcome::Ignored => {
            out.say("Nothing to do.");
            return Ok(());
        }
    }
    board.save().await
}

fn cmd_config(action: ConfigAction, out: Output) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            out.say(format!("Set {} = {}", key, value));
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if out.is_json() {
                let map: serde_json::Map<_, _> = items
                    .into_iter()
                    .map(|(key, value)| (key, serde_json::Value::String(value)))
                    .collect();
                return out.json(&serde_json::Value::Object(map));
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            out.say("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
