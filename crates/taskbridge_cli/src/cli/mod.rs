use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the .taskrc file (defaults to $TASKRC, then ~/.taskrc)
    #[arg(long, value_name = "PATH", global = true)]
    pub taskrc: Option<PathBuf>,

    /// Task data directory (defaults to $TASKDATA, then data.location)
    #[arg(long = "data-dir", value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Path to the task binary (defaults to $TASKBRIDGE_TASK_BIN, then PATH)
    #[arg(long = "task-bin", value_name = "PATH", global = true)]
    pub task_bin: Option<PathBuf>,

    /// Kill task commands running longer than this
    #[arg(long = "timeout-secs", value_name = "SECONDS", global = true)]
    pub timeout_secs: Option<u64>,

    /// Where task records are read from
    #[arg(long, value_enum, default_value_t = Source::Export, global = true)]
    pub source: Source,

    /// Pass a setting to the task binary (format KEY=VALUE)
    #[arg(long = "rc", value_name = "KEY=VALUE", global = true)]
    pub rc: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    /// Run `task export`
    Export,
    /// Read taskchampion.sqlite3 directly (read-only)
    Sqlite,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    ///
    /// Example: taskbridge add "Buy milk" --due tomorrow
    Add {
        description: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        due: Option<String>,
        /// H, M or L
        #[arg(long)]
        priority: Option<String>,
    },
    /// Mark a task as completed
    ///
    /// Example: taskbridge done 1
    Done { id: String },
    /// Delete a task
    ///
    /// Example: taskbridge delete 1
    Delete { id: String },
    /// Show one task by id or uuid
    ///
    /// Example: taskbridge show 1
    Show { id: String },
    /// List tasks
    ///
    /// Example: taskbridge list pending
    /// Example: taskbridge list project home --all
    List {
        #[command(subcommand)]
        list: ListCommand,
    },
    /// List tasks holding an active id
    WorkingSet,
    /// List distinct project names
    Projects,
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Every task
    All {
        #[arg(long)]
        include_deleted: bool,
    },
    Pending,
    Completed,
    Deleted,
    /// Recurring templates
    Recurring,
    /// Tasks in one project (pending only unless --all)
    Project {
        name: String,
        #[arg(long)]
        all: bool,
    },
    /// Tasks without a project (pending only unless --all)
    Unassigned {
        #[arg(long)]
        all: bool,
    },
    /// Occurrences generated from a recurring task
    Children { parent_uuid: String },
}

/// Parse a raw `KEY=VALUE` argument for `--rc`. A leading `rc.` is accepted
/// and dropped.
pub fn parse_rc_override(raw: &str) -> Result<(String, String), String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "rc override must be in KEY=VALUE format".to_string())?;

    let key = key_raw.trim();
    let key = key.strip_prefix("rc.").unwrap_or(key).trim();
    if key.is_empty() {
        return Err("rc override key cannot be empty".to_string());
    }
    if key.contains(char::is_whitespace) {
        return Err(format!("rc override key '{key}' cannot contain whitespace"));
    }

    Ok((key.to_string(), value_raw.trim().to_string()))
}
