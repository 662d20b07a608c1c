use clap::Parser;
use clap::error::ErrorKind;
use std::time::Duration;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use taskbridge_cli::cli::{Cli, Command, ListCommand, Source, parse_rc_override};
use taskbridge_core::command::TaskClient;
use taskbridge_core::config::{ClientSettings, EnvVars, SettingsOverrides, resolve_task_binary};
use taskbridge_core::error::AppError;
use taskbridge_core::model::{DueDate, NewTask, Priority, Task, TaskId};
use taskbridge_core::repository::{RecordSource, TaskRepository, TaskWriter};
use taskbridge_core::storage::SqliteStore;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "TASKBRIDGE_LOG";

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

fn render_timestamp(value: OffsetDateTime, offset: UtcOffset) -> Result<String, AppError> {
    value
        .to_offset(offset)
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

fn render_optional(
    value: Option<OffsetDateTime>,
    offset: UtcOffset,
) -> Result<Option<String>, AppError> {
    value.map(|value| render_timestamp(value, offset)).transpose()
}

fn render_due(due: Option<&DueDate>, offset: UtcOffset) -> Result<Option<String>, AppError> {
    match due {
        Some(DueDate::At(at)) => render_timestamp(*at, offset).map(Some),
        Some(DueDate::Keyword(keyword)) => Ok(Some(keyword.clone())),
        None => Ok(None),
    }
}

fn id_json(id: &TaskId) -> serde_json::Value {
    match id {
        TaskId::Active(id) => serde_json::json!(id),
        TaskId::Permanent(uuid) => serde_json::json!(uuid),
        TaskId::Unassigned => serde_json::Value::Null,
    }
}

fn task_json(task: &Task, offset: UtcOffset) -> Result<serde_json::Value, AppError> {
    let mut annotations = Vec::with_capacity(task.annotations.len());
    for annotation in &task.annotations {
        annotations.push(serde_json::json!({
            "description": annotation.description,
            "entry": render_timestamp(annotation.entry, offset)?,
        }));
    }

    Ok(serde_json::json!({
        "id": id_json(&task.id),
        "uuid": task.uuid,
        "description": task.description,
        "status": task.status,
        "project": task.project,
        "priority": task.priority,
        "urgency": task.urgency,
        "entry": render_optional(task.entry, offset)?,
        "modified": render_optional(task.modified, offset)?,
        "start": render_optional(task.start, offset)?,
        "end": render_optional(task.end, offset)?,
        "due": render_due(task.due.as_ref(), offset)?,
        "wait": render_optional(task.wait, offset)?,
        "recur": task.recur,
        "mask": task.mask.as_ref().map(ToString::to_string),
        "imask": task.imask,
        "parent": task.parent,
        "tags": task.extra.get("tags"),
        "annotations": annotations,
    }))
}

fn print_tasks_json(tasks: &[Task]) -> Result<(), AppError> {
    let offset = local_offset();
    let mut payload = Vec::with_capacity(tasks.len());
    for task in tasks {
        payload.push(task_json(task, offset)?);
    }
    println!("{}", serde_json::Value::Array(payload));
    Ok(())
}

fn print_tasks_plain(tasks: &[Task]) -> Result<(), AppError> {
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    let offset = local_offset();
    let mut rows = Vec::with_capacity(tasks.len());
    for task in tasks {
        rows.push(TaskRow {
            id: task.id.to_string(),
            status: task
                .status
                .map(|status| status.label().to_string())
                .unwrap_or_else(|| "-".to_string()),
            project: task.project.clone().unwrap_or_else(|| "-".to_string()),
            due: render_due(task.due.as_ref(), offset)?.unwrap_or_else(|| "-".to_string()),
            description: task.description.clone(),
        });
    }

    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
    Ok(())
}

fn print_tasks(tasks: &[Task], json: bool) -> Result<(), AppError> {
    if json {
        print_tasks_json(tasks)
    } else {
        print_tasks_plain(tasks)
    }
}

fn print_task_detail(task: &Task, json: bool) -> Result<(), AppError> {
    let offset = local_offset();
    if json {
        println!("{}", task_json(task, offset)?);
        return Ok(());
    }

    println!("ID:          {}", task.id);
    if let Some(uuid) = task.uuid.as_deref() {
        println!("UUID:        {uuid}");
    }
    println!("Description: {}", task.description);
    if let Some(status) = task.status {
        println!("Status:      {status}");
    }
    if let Some(project) = task.project.as_deref() {
        println!("Project:     {project}");
    }
    if let Some(priority) = task.priority {
        println!("Priority:    {priority}");
    }
    if let Some(due) = render_due(task.due.as_ref(), offset)? {
        println!("Due:         {due}");
    }
    if let Some(wait) = render_optional(task.wait, offset)? {
        println!("Wait:        {wait}");
    }
    if let Some(entry) = render_optional(task.entry, offset)? {
        println!("Entered:     {entry}");
    }
    if let Some(end) = render_optional(task.end, offset)? {
        println!("Ended:       {end}");
    }
    if let Some(recur) = task.recur.as_deref() {
        println!("Recurrence:  {recur}");
    }
    for annotation in &task.annotations {
        println!(
            "  {} {}",
            render_timestamp(annotation.entry, offset)?,
            annotation.description
        );
    }
    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn settings_overrides(cli: &Cli) -> Result<SettingsOverrides, AppError> {
    // Non-interactive runs cannot answer confirmation prompts.
    let mut rc = vec![("confirmation".to_string(), "off".to_string())];
    for raw in &cli.rc {
        rc.push(parse_rc_override(raw).map_err(AppError::invalid_input)?);
    }

    Ok(SettingsOverrides {
        taskrc: cli.taskrc.clone(),
        data_dir: cli.data_dir.clone(),
        timeout: cli.timeout_secs.map(Duration::from_secs),
        rc,
    })
}

fn run_write<S: RecordSource + TaskWriter>(
    command: &Command,
    json: bool,
    repository: &TaskRepository<S>,
) -> Result<(), AppError> {
    match command {
        Command::Add {
            description,
            project,
            due,
            priority,
        } => {
            let mut draft = NewTask::new(description.as_str());
            if let Some(project) = project {
                draft = draft.with_project(project.as_str());
            }
            if let Some(due) = due {
                draft = draft.with_due(due.as_str());
            }
            if let Some(priority) = priority {
                let priority = priority
                    .parse::<Priority>()
                    .map_err(|err| AppError::invalid_input(err.to_string()))?;
                draft = draft.with_priority(priority);
            }

            let task = repository.create(&draft)?;
            if json {
                print_task_detail(&task, true)?;
            } else {
                println!("Created task {}: {}", task.id, task.description);
            }
        }
        Command::Done { id } => {
            repository.complete(id)?;
            if json {
                println!("{}", serde_json::json!({ "id": id, "status": "completed" }));
            } else {
                println!("Completed task {id}");
            }
        }
        Command::Delete { id } => {
            repository.delete(id)?;
            if json {
                println!("{}", serde_json::json!({ "id": id, "status": "deleted" }));
            } else {
                println!("Deleted task {id}");
            }
        }
        other => run_query(other, json, repository)?,
    }

    Ok(())
}

fn run_query<S: RecordSource>(
    command: &Command,
    json: bool,
    repository: &TaskRepository<S>,
) -> Result<(), AppError> {
    match command {
        Command::Add { .. } | Command::Done { .. } | Command::Delete { .. } => {
            return Err(AppError::invalid_input(
                "the sqlite source is read-only; use --source export to change tasks",
            ));
        }
        Command::Show { id } => {
            let task = repository
                .fetch_by_id(id)?
                .ok_or_else(|| AppError::NoTask(format!("no task matches '{id}'")))?;
            print_task_detail(&task, json)?;
        }
        Command::WorkingSet => {
            let snapshot = repository.fetch_all(false)?;
            print_tasks(&snapshot.working_set, json)?;
        }
        Command::Projects => {
            let projects = repository.fetch_projects()?;
            if json {
                println!("{}", serde_json::json!(projects));
            } else {
                for project in projects {
                    println!("{project}");
                }
            }
        }
        Command::List { list } => {
            let tasks = match list {
                ListCommand::All { include_deleted } => {
                    repository.fetch_all(*include_deleted)?.tasks
                }
                ListCommand::Pending => repository.fetch_pending()?,
                ListCommand::Completed => repository.fetch_completed()?,
                ListCommand::Deleted => repository.fetch_deleted()?,
                ListCommand::Recurring => repository.fetch_recurring()?,
                ListCommand::Project { name, all } => repository.fetch_by_project(name, !*all)?,
                ListCommand::Unassigned { all } => repository.fetch_without_project(!*all)?,
                ListCommand::Children { parent_uuid } => repository.fetch_children(parent_uuid)?,
            };
            print_tasks(&tasks, json)?;
        }
    }

    Ok(())
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    let env = EnvVars::from_process();
    let settings = ClientSettings::resolve(&settings_overrides(&cli)?, &env)?;
    debug!(source = ?cli.source, data_dir = %settings.data_dir.display(), "running command");

    match cli.source {
        Source::Export => {
            let binary = resolve_task_binary(cli.task_bin.as_deref(), &env)?;
            let repository = TaskRepository::new(TaskClient::new(settings.runner(binary)));
            run_write(&cli.command, cli.json, &repository)
        }
        Source::Sqlite => {
            let repository = TaskRepository::new(SqliteStore::in_data_dir(&settings.data_dir));
            run_query(&cli.command, cli.json, &repository)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
