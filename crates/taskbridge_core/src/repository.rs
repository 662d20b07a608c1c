use crate::error::AppError;
use crate::model::{NewTask, RawTask, Task, TaskStatus, reconcile_masks};
use std::collections::BTreeSet;
use time::OffsetDateTime;

/// Where exported records come from: the tool itself or its local database.
pub trait RecordSource {
    fn export_all(&self) -> Result<Vec<RawTask>, AppError>;

    /// Zero or one record for an active id or a uuid.
    fn export_one(&self, id_or_uuid: &str) -> Result<Vec<RawTask>, AppError>;
}

/// Sources that can also change the tool's state.
pub trait TaskWriter {
    fn add(&self, draft: &NewTask, now: OffsetDateTime) -> Result<Task, AppError>;
    fn complete(&self, id: &str) -> Result<bool, AppError>;
    fn delete(&self, id: &str) -> Result<bool, AppError>;
}

pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Point-in-time result of a full fetch. Not refreshed after it is built.
#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub tasks: Vec<Task>,
    /// Tasks holding an active id, in export order.
    pub working_set: Vec<Task>,
}

pub struct TaskRepository<S, C = SystemClock> {
    source: S,
    clock: C,
}

impl<S: RecordSource> TaskRepository<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            clock: SystemClock,
        }
    }
}

impl<S: RecordSource, C: Clock> TaskRepository<S, C> {
    pub fn with_clock(source: S, clock: C) -> Self {
        Self { source, clock }
    }

    pub fn fetch_all(&self, include_deleted: bool) -> Result<TaskSnapshot, AppError> {
        let now = self.clock.now();
        let mut tasks = self
            .source
            .export_all()?
            .into_iter()
            .map(|record| Task::from_raw(record, now))
            .collect::<Result<Vec<_>, _>>()?;

        // Deleted children still mark their parent's slot.
        reconcile_masks(&mut tasks);
        if !include_deleted {
            tasks.retain(|task| !task.has_status(TaskStatus::Deleted));
        }

        let working_set = tasks
            .iter()
            .filter(|task| task.is_active() && !task.has_status(TaskStatus::Deleted))
            .cloned()
            .collect();

        Ok(TaskSnapshot { tasks, working_set })
    }

    /// `None` when nothing matches; more than one match is `InvalidData`.
    pub fn fetch_by_id(&self, id_or_uuid: &str) -> Result<Option<Task>, AppError> {
        let now = self.clock.now();
        let mut records = self.source.export_one(id_or_uuid)?.into_iter();
        match (records.next(), records.next()) {
            (None, _) => Ok(None),
            (Some(record), None) => Ok(Some(Task::from_raw(record, now)?)),
            (Some(_), Some(_)) => Err(AppError::invalid_data(format!(
                "'{id_or_uuid}' matched more than one task"
            ))),
        }
    }

    pub fn fetch_by_status(&self, status: TaskStatus) -> Result<Vec<Task>, AppError> {
        let include_deleted = status == TaskStatus::Deleted;
        self.fetch_matching(include_deleted, |task| task.has_status(status))
    }

    pub fn fetch_pending(&self) -> Result<Vec<Task>, AppError> {
        self.fetch_by_status(TaskStatus::Pending)
    }

    pub fn fetch_completed(&self) -> Result<Vec<Task>, AppError> {
        self.fetch_by_status(TaskStatus::Completed)
    }

    pub fn fetch_deleted(&self) -> Result<Vec<Task>, AppError> {
        self.fetch_by_status(TaskStatus::Deleted)
    }

    pub fn fetch_recurring(&self) -> Result<Vec<Task>, AppError> {
        self.fetch_by_status(TaskStatus::Recurring)
    }

    /// Tasks whose project is exactly `name`.
    pub fn fetch_by_project(&self, name: &str, only_pending: bool) -> Result<Vec<Task>, AppError> {
        self.fetch_matching(false, |task| {
            task.project.as_deref() == Some(name)
                && (!only_pending || task.has_status(TaskStatus::Pending))
        })
    }

    pub fn fetch_without_project(&self, only_pending: bool) -> Result<Vec<Task>, AppError> {
        self.fetch_matching(false, |task| {
            task.project.is_none() && (!only_pending || task.has_status(TaskStatus::Pending))
        })
    }

    /// Generated occurrences of the recurring task `parent_uuid`.
    pub fn fetch_children(&self, parent_uuid: &str) -> Result<Vec<Task>, AppError> {
        self.fetch_matching(false, |task| task.is_child_of(parent_uuid))
    }

    /// Distinct project names, sorted.
    pub fn fetch_projects(&self) -> Result<Vec<String>, AppError> {
        let snapshot = self.fetch_all(false)?;
        let projects: BTreeSet<String> = snapshot
            .tasks
            .into_iter()
            .filter_map(|task| task.project)
            .collect();
        Ok(projects.into_iter().collect())
    }

    fn fetch_matching<F>(&self, include_deleted: bool, predicate: F) -> Result<Vec<Task>, AppError>
    where
        F: Fn(&Task) -> bool,
    {
        let snapshot = self.fetch_all(include_deleted)?;
        Ok(snapshot
            .tasks
            .into_iter()
            .filter(|task| predicate(task))
            .collect())
    }
}

impl<S: RecordSource + TaskWriter, C: Clock> TaskRepository<S, C> {
    pub fn create(&self, draft: &NewTask) -> Result<Task, AppError> {
        self.source.add(draft, self.clock.now())
    }

    pub fn complete(&self, id: &str) -> Result<bool, AppError> {
        self.source.complete(id)
    }

    pub fn delete(&self, id: &str) -> Result<bool, AppError> {
        self.source.delete(id)
    }
}
