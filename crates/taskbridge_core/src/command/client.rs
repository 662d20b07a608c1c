use crate::command::runner::{CommandOutput, CommandRunner};
use crate::command::scrape::{CreatedIdParser, FirstDigitRun};
use crate::error::AppError;
use crate::model::{NewTask, RawTask, Task};
use crate::repository::{RecordSource, TaskWriter};
use time::OffsetDateTime;
use tracing::{debug, warn};

const EXIT_NOT_FOUND: i32 = 127;
const EXIT_NO_TASK: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Export,
    Add,
    Done,
    Delete,
}

impl Operation {
    pub fn verb(self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Add => "add",
            Self::Done => "done",
            Self::Delete => "delete",
        }
    }

    /// Operations whose exit code 1 means the given id matched nothing.
    fn targets_existing_task(self) -> bool {
        matches!(self, Self::Done | Self::Delete)
    }
}

/// Maps an exit code onto the protocol's outcomes.
///
/// 0 is success, 127 means the tool could not be run, 1 on `done`/`delete`
/// means no such task, anything else is a failed command.
pub fn classify(operation: Operation, output: CommandOutput) -> Result<CommandOutput, AppError> {
    match output.code {
        Some(0) => Ok(output),
        Some(EXIT_NOT_FOUND) => Err(AppError::CommandNotFound(stream_or(
            &output.stderr,
            "task command could not be executed",
        ))),
        Some(EXIT_NO_TASK) if operation.targets_existing_task() => Err(AppError::NoTask(
            stream_or(&output.stderr, "no matching task"),
        )),
        Some(code) => Err(AppError::CommandExecution(stream_or(
            &output.stderr,
            &format!("task {} exited with code {code}", operation.verb()),
        ))),
        None => Err(AppError::CommandExecution(stream_or(
            &output.stderr,
            &format!("task {} was terminated by a signal", operation.verb()),
        ))),
    }
}

/// Parses the JSON array printed by `export`. Empty output is no records.
pub fn parse_export(stdout: &str) -> Result<Vec<RawTask>, AppError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(trimmed)
        .map_err(|err| AppError::invalid_data(format!("unreadable export output: {err}")))
}

fn stream_or(stream: &str, fallback: &str) -> String {
    let trimmed = stream.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Drives the task tool's command surface.
pub struct TaskClient<R> {
    runner: R,
    id_parser: Box<dyn CreatedIdParser>,
}

impl<R: CommandRunner> TaskClient<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            id_parser: Box::new(FirstDigitRun),
        }
    }

    pub fn with_id_parser<P: CreatedIdParser + 'static>(mut self, parser: P) -> Self {
        self.id_parser = Box::new(parser);
        self
    }

    /// `task export`
    pub fn export_all(&self) -> Result<Vec<RawTask>, AppError> {
        let output = self.invoke(Operation::Export, vec![Operation::Export.verb().to_string()])?;
        parse_export(&output.stdout)
    }

    /// `task <id-or-uuid> export`
    pub fn export_one(&self, id_or_uuid: &str) -> Result<Vec<RawTask>, AppError> {
        let target = required_id(id_or_uuid)?;
        let output = self.invoke(
            Operation::Export,
            vec![target, Operation::Export.verb().to_string()],
        )?;
        parse_export(&output.stdout)
    }

    /// Creates a task and reads it back.
    ///
    /// `add` only reports the new id in prose, so the record is fetched with
    /// a second `export`. Anything but exactly one record is an `AddTask`
    /// failure; the task may or may not exist in the tool afterwards.
    pub fn add(&self, draft: &NewTask, now: OffsetDateTime) -> Result<Task, AppError> {
        draft.validate()?;

        let mut args = vec![Operation::Add.verb().to_string()];
        args.extend(draft.arguments());
        let output = self.invoke(Operation::Add, args)?;

        let id = self
            .id_parser
            .parse_created_id(&output.stdout)
            .ok_or_else(|| {
                AppError::AddTask(stream_or(
                    &output.stderr,
                    &format!("no task id in add output: {}", output.stdout.trim()),
                ))
            })?;
        debug!(id, "task created");

        let mut records = self.export_one(&id.to_string())?.into_iter();
        match (records.next(), records.next()) {
            (Some(record), None) => Ok(Task::from_raw(record, now)?),
            (None, _) => Err(AppError::AddTask(format!(
                "export of new task {id} returned no record"
            ))),
            (Some(_), Some(_)) => Err(AppError::AddTask(format!(
                "export of new task {id} returned more than one record"
            ))),
        }
    }

    /// `task <id> done`
    pub fn complete(&self, id: &str) -> Result<bool, AppError> {
        self.finish(Operation::Done, id)
    }

    /// `task <id> delete`
    pub fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.finish(Operation::Delete, id)
    }

    fn finish(&self, operation: Operation, id: &str) -> Result<bool, AppError> {
        let target = required_id(id)?;
        self.invoke(operation, vec![target, operation.verb().to_string()])?;
        Ok(true)
    }

    fn invoke(&self, operation: Operation, args: Vec<String>) -> Result<CommandOutput, AppError> {
        let output = self.runner.run(&args)?;
        classify(operation, output).inspect_err(|err| {
            warn!(operation = operation.verb(), "task command failed: {err}");
        })
    }
}

fn required_id(id: &str) -> Result<String, AppError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }
    Ok(trimmed.to_string())
}

impl<R: CommandRunner> RecordSource for TaskClient<R> {
    fn export_all(&self) -> Result<Vec<RawTask>, AppError> {
        TaskClient::export_all(self)
    }

    fn export_one(&self, id_or_uuid: &str) -> Result<Vec<RawTask>, AppError> {
        TaskClient::export_one(self, id_or_uuid)
    }
}

impl<R: CommandRunner> TaskWriter for TaskClient<R> {
    fn add(&self, draft: &NewTask, now: OffsetDateTime) -> Result<Task, AppError> {
        TaskClient::add(self, draft, now)
    }

    fn complete(&self, id: &str) -> Result<bool, AppError> {
        TaskClient::complete(self, id)
    }

    fn delete(&self, id: &str) -> Result<bool, AppError> {
        TaskClient::delete(self, id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Operation, TaskClient, classify, parse_export};
    use crate::command::runner::{CommandOutput, CommandRunner, SystemRunner};
    use crate::command::scrape::CreatedIdParser;
    use crate::error::AppError;
    use crate::model::{NewTask, TaskId};
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use time::OffsetDateTime;
    use time::macros::datetime;

    /// Replays canned outputs and records the argument lists it was given.
    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        pub(crate) replies: RefCell<VecDeque<Result<CommandOutput, AppError>>>,
        pub(crate) calls: RefCell<Vec<Vec<String>>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(replies: Vec<Result<CommandOutput, AppError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<Vec<String>> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, args: &[String]) -> Result<CommandOutput, AppError> {
            self.calls.borrow_mut().push(args.to_vec());
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::io("no scripted reply left")))
        }
    }

    fn now() -> OffsetDateTime {
        datetime!(2025-03-10 12:00:00 UTC)
    }

    const NEW_TASK_EXPORT: &str = r#"[{"id":"42","description":"Buy milk","due":"20250311T000000Z","entry":"20250310T120000Z","modified":"20250310T120000Z","status":"pending","uuid":"3c1f7e2d-9b00-4f0e-8a8a-c2d9e0a40042","urgency":8.9}]"#;

    #[test]
    fn classify_maps_exit_codes() {
        let ok = classify(Operation::Export, CommandOutput::new(0, "[]", "")).unwrap();
        assert_eq!(ok.stdout, "[]");

        let err = classify(Operation::Export, CommandOutput::new(127, "", "sh: task: not found"))
            .unwrap_err();
        assert_eq!(err, AppError::CommandNotFound("sh: task: not found".into()));

        for operation in [Operation::Add, Operation::Done, Operation::Delete] {
            let err = classify(operation, CommandOutput::new(127, "", "sh: task: not found"))
                .unwrap_err();
            assert_eq!(err, AppError::CommandNotFound("sh: task: not found".into()));
        }

        let err = classify(Operation::Done, CommandOutput::new(1, "", "No tasks specified."))
            .unwrap_err();
        assert_eq!(err, AppError::NoTask("No tasks specified.".into()));

        let err = classify(Operation::Export, CommandOutput::new(1, "", "Unable to read."))
            .unwrap_err();
        assert_eq!(err, AppError::CommandExecution("Unable to read.".into()));

        let err = classify(Operation::Delete, CommandOutput::new(2, "", "")).unwrap_err();
        assert_eq!(
            err,
            AppError::CommandExecution("task delete exited with code 2".into())
        );
    }

    #[test]
    fn parse_export_handles_empty_and_invalid_output() {
        assert!(parse_export("").unwrap().is_empty());
        assert!(parse_export("[]\n").unwrap().is_empty());
        assert_eq!(parse_export("not json").unwrap_err().code(), "invalid_data");
    }

    #[test]
    fn export_all_parses_records() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput::new(
            0,
            r#"[{"id":1,"description":"a"},{"id":0,"description":"b"}]"#,
            "",
        ))]);
        let client = TaskClient::new(&runner);

        let records = client.export_all().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(runner.calls(), [["export"]]);
    }

    #[test]
    fn export_one_scopes_by_identifier() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput::new(0, "[]", ""))]);
        let client = TaskClient::new(&runner);

        let records = client.export_one(" 12 ").unwrap();

        assert!(records.is_empty());
        assert_eq!(runner.calls(), [["12", "export"]]);
    }

    #[test]
    fn export_one_rejects_blank_identifier() {
        let runner = ScriptedRunner::default();
        let client = TaskClient::new(&runner);

        let err = client.export_one("  ").unwrap_err();

        assert_eq!(err.code(), "invalid_input");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn add_creates_then_fetches_the_new_task() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::new(0, "Created task 42.\n", "")),
            Ok(CommandOutput::new(0, NEW_TASK_EXPORT, "")),
        ]);
        let client = TaskClient::new(&runner);

        let task = client
            .add(&NewTask::new("Buy milk").with_due("tomorrow"), now())
            .unwrap();

        assert!(task.is_active());
        assert_eq!(task.id, TaskId::Active(42));
        assert_eq!(task.id.to_string(), "42");
        assert_eq!(task.description, "Buy milk");
        assert_eq!(
            runner.calls(),
            [
                vec!["add", "Buy milk", "due:tomorrow"],
                vec!["42", "export"]
            ]
        );
    }

    #[test]
    fn add_without_digits_fails_before_export() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput::new(
            0,
            "Created task.\n",
            "Configuration override rc.verbose=nothing",
        ))]);
        let client = TaskClient::new(&runner);

        let err = client.add(&NewTask::new("Buy milk"), now()).unwrap_err();

        assert_eq!(
            err,
            AppError::AddTask("Configuration override rc.verbose=nothing".into())
        );
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn add_fails_when_export_finds_nothing() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::new(0, "Created task 42.\n", "")),
            Ok(CommandOutput::new(0, "[]", "")),
        ]);
        let client = TaskClient::new(&runner);

        let err = client.add(&NewTask::new("Buy milk"), now()).unwrap_err();

        assert_eq!(err.code(), "add_failed");
    }

    #[test]
    fn add_fails_when_export_finds_several_records() {
        let two = r#"[{"id":42,"description":"a"},{"id":42,"description":"b"}]"#;
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::new(0, "Created task 42.\n", "")),
            Ok(CommandOutput::new(0, two, "")),
        ]);
        let client = TaskClient::new(&runner);

        let err = client.add(&NewTask::new("Buy milk"), now()).unwrap_err();

        assert_eq!(err.code(), "add_failed");
    }

    #[test]
    fn add_rejects_invalid_description_without_running() {
        let runner = ScriptedRunner::default();
        let client = TaskClient::new(&runner);

        let err = client.add(&NewTask::new("two\nlines"), now()).unwrap_err();

        assert_eq!(err.code(), "invalid_task");
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn add_failure_exit_is_command_execution() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput::new(
            2,
            "",
            "The 'due' attribute does not allow a value of 'someday'.",
        ))]);
        let client = TaskClient::new(&runner);

        let err = client
            .add(&NewTask::new("Buy milk").with_due("someday"), now())
            .unwrap_err();

        assert_eq!(err.code(), "command_failed");
    }

    #[test]
    fn complete_unknown_task_is_no_task() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput::new(1, "", "No tasks specified."))]);
        let client = TaskClient::new(&runner);

        let err = client.complete("999").unwrap_err();

        assert!(matches!(err, AppError::NoTask(_)));
        assert_eq!(runner.calls(), [["999", "done"]]);
    }

    #[test]
    fn delete_reports_success() {
        let runner = ScriptedRunner::new(vec![Ok(CommandOutput::new(0, "Deleted 1 task.", ""))]);
        let client = TaskClient::new(&runner);

        assert!(client.delete("3").unwrap());
        assert_eq!(runner.calls(), [["3", "delete"]]);
    }

    #[test]
    fn missing_binary_is_command_not_found_for_every_operation() {
        let client = TaskClient::new(SystemRunner::new("/nonexistent/taskbridge-test/task"));

        let results = [
            client.export_all().map(|_| ()),
            client.export_one("1").map(|_| ()),
            client.add(&NewTask::new("Buy milk"), now()).map(|_| ()),
            client.complete("1").map(|_| ()),
            client.delete("1").map(|_| ()),
        ];

        for result in results {
            assert_eq!(result.unwrap_err().code(), "command_not_found");
        }
    }

    struct FixedId(u32);

    impl CreatedIdParser for FixedId {
        fn parse_created_id(&self, _stdout: &str) -> Option<u32> {
            Some(self.0)
        }
    }

    #[test]
    fn id_parser_can_be_replaced() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::new(0, "whatever", "")),
            Ok(CommandOutput::new(0, "[]", "")),
        ]);
        let client = TaskClient::new(&runner).with_id_parser(FixedId(5));

        client.add(&NewTask::new("Buy milk"), now()).unwrap_err();

        assert_eq!(runner.calls()[1], ["5", "export"]);
    }
}
