use crate::error::ModelError;
use crate::model::annotation::Annotation;
use crate::model::mask::{Mask, MaskMarker};
use crate::model::raw::{RawNumber, RawTask};
use crate::model::timestamp::{
    format_timestamp, optional_timestamp, parse_timestamp, persisted_timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// How a task is addressed.
///
/// `Active` ids are short-lived and only exist while the task sits in the
/// working set. The uuid is the only stable handle once it leaves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskId {
    Active(u32),
    Permanent(String),
    Unassigned,
}

impl TaskId {
    /// Prefers the active id and falls back to the uuid. The export reports
    /// `0` for tasks outside the working set, which counts as no id.
    pub fn resolve(id: Option<&RawNumber>, uuid: Option<&str>) -> Self {
        let active = id
            .and_then(RawNumber::as_index)
            .filter(|value| *value > 0)
            .and_then(|value| u32::try_from(value).ok());

        if let Some(active) = active {
            return Self::Active(active);
        }

        match uuid.map(str::trim).filter(|value| !value.is_empty()) {
            Some(uuid) => Self::Permanent(uuid.to_string()),
            None => Self::Unassigned,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    /// Token to pass on the tool's command line, if the task can be addressed.
    pub fn as_argument(&self) -> Option<String> {
        match self {
            Self::Active(id) => Some(id.to_string()),
            Self::Permanent(uuid) => Some(uuid.clone()),
            Self::Unassigned => None,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active(id) => write!(f, "{id}"),
            Self::Permanent(uuid) => f.write_str(uuid),
            Self::Unassigned => f.write_str("unassigned"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed,
    Deleted,
    Waiting,
    Recurring,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
            Self::Waiting => "waiting",
            Self::Recurring => "recurring",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "deleted" => Ok(Self::Deleted),
            "waiting" => Ok(Self::Waiting),
            "recurring" => Ok(Self::Recurring),
            other => Err(ModelError::InvalidField {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    #[serde(rename = "H")]
    High,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Low,
}

impl Priority {
    pub fn letter(self) -> &'static str {
        match self {
            Self::High => "H",
            Self::Medium => "M",
            Self::Low => "L",
        }
    }
}

impl FromStr for Priority {
    type Err = ModelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "H" => Ok(Self::High),
            "M" => Ok(Self::Medium),
            "L" => Ok(Self::Low),
            _ => Err(ModelError::InvalidField {
                field: "priority",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.letter())
    }
}

/// A due date, or the tool keyword it was given as (`tomorrow`, `eow`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DueDate {
    At(OffsetDateTime),
    Keyword(String),
}

impl DueDate {
    pub fn from_raw(raw: String) -> Self {
        match parse_timestamp(&raw) {
            Some(at) => Self::At(at),
            None => Self::Keyword(raw),
        }
    }

    pub fn to_raw(&self) -> String {
        match self {
            Self::At(at) => format_timestamp(*at),
            Self::Keyword(keyword) => keyword.clone(),
        }
    }

    pub fn timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            Self::At(at) => Some(*at),
            Self::Keyword(_) => None,
        }
    }
}

/// One record of the external tracker, normalized.
///
/// Built fresh from every read and never mutated to mirror a change in the
/// tool: completing or deleting goes through the client and a re-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub uuid: Option<String>,
    pub description: String,
    pub status: Option<TaskStatus>,
    pub project: Option<String>,
    pub priority: Option<Priority>,
    pub urgency: Option<f64>,
    pub entry: Option<OffsetDateTime>,
    pub modified: Option<OffsetDateTime>,
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
    pub due: Option<DueDate>,
    pub wait: Option<OffsetDateTime>,
    pub recur: Option<String>,
    pub rtype: Option<String>,
    pub mask: Option<Mask>,
    pub imask: Option<u32>,
    pub parent: Option<String>,
    pub annotations: Vec<Annotation>,
    pub extra: BTreeMap<String, serde_json::Value>,
    /// The `id` value exactly as exported (`0`, `"42"`, ...).
    raw_id: Option<RawNumber>,
}

impl Task {
    /// Builds a task from an exported record.
    ///
    /// `now` drives the waiting-to-pending normalization: a `waiting` task
    /// whose wait date has passed reads as `pending` with no wait date.
    pub fn from_raw(raw: RawTask, now: OffsetDateTime) -> Result<Self, ModelError> {
        let RawTask {
            id,
            uuid,
            description,
            status,
            project,
            priority,
            urgency,
            entry,
            modified,
            start,
            end,
            due,
            wait,
            recur,
            rtype,
            mask,
            imask,
            parent,
            annotations,
            extra,
        } = raw;

        let description = description.ok_or(ModelError::MissingField("description"))?;
        validate_description(&description)?;

        let uuid = non_empty(uuid);
        let persisted = uuid.is_some();

        let mut status = status
            .as_deref()
            .map(str::parse::<TaskStatus>)
            .transpose()?;
        let priority = non_empty(priority)
            .as_deref()
            .map(str::parse::<Priority>)
            .transpose()?;

        let entry = persisted_timestamp("entry", entry.as_deref(), persisted)?;
        let modified = persisted_timestamp("modified", modified.as_deref(), persisted)?;
        let start = optional_timestamp("start", start.as_deref())?;
        let end = optional_timestamp("end", end.as_deref())?;
        let mut wait = optional_timestamp("wait", wait.as_deref())?;
        let due = non_empty(due).map(DueDate::from_raw);

        let mask = mask.as_deref().map(Mask::parse).transpose()?;
        let imask = imask.as_ref().map(parse_imask).transpose()?;

        match status {
            Some(finished @ (TaskStatus::Completed | TaskStatus::Deleted)) if end.is_none() => {
                return Err(ModelError::MissingEnd(finished));
            }
            Some(TaskStatus::Waiting) => {
                let until = wait.ok_or(ModelError::MissingWait)?;
                if until <= now {
                    status = Some(TaskStatus::Pending);
                    wait = None;
                }
            }
            _ => {}
        }

        let raw_id = id;
        let id = TaskId::resolve(raw_id.as_ref(), uuid.as_deref());
        let annotations = annotations
            .unwrap_or_default()
            .into_iter()
            .map(|note| Annotation::from_raw(&id, note))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id,
            uuid,
            description,
            status,
            project: non_empty(project),
            priority,
            urgency,
            entry,
            modified,
            start,
            end,
            due,
            wait,
            recur: non_empty(recur),
            rtype: non_empty(rtype),
            mask,
            imask,
            parent: non_empty(parent),
            annotations,
            extra,
            raw_id,
        })
    }

    /// Re-encodes the task under the export's field names.
    pub fn to_raw(&self) -> RawTask {
        let id = match (&self.raw_id, &self.id) {
            (Some(raw), id) if TaskId::resolve(Some(raw), self.uuid.as_deref()) == *id => {
                Some(raw.clone())
            }
            (_, TaskId::Active(id)) => Some(RawNumber::Integer(u64::from(*id))),
            _ => None,
        };
        let annotations = if self.annotations.is_empty() {
            None
        } else {
            Some(self.annotations.iter().map(Annotation::to_raw).collect())
        };

        RawTask {
            id,
            uuid: self.uuid.clone(),
            description: Some(self.description.clone()),
            status: self.status.map(|status| status.label().to_string()),
            project: self.project.clone(),
            priority: self.priority.map(|priority| priority.letter().to_string()),
            urgency: self.urgency,
            entry: self.entry.map(format_timestamp),
            modified: self.modified.map(format_timestamp),
            start: self.start.map(format_timestamp),
            end: self.end.map(format_timestamp),
            due: self.due.as_ref().map(DueDate::to_raw),
            wait: self.wait.map(format_timestamp),
            recur: self.recur.clone(),
            rtype: self.rtype.clone(),
            mask: self.mask.as_ref().map(Mask::to_string),
            imask: self.imask.map(|index| RawNumber::Integer(u64::from(index))),
            parent: self.parent.clone(),
            annotations,
            extra: self.extra.clone(),
        }
    }

    /// True while the task holds an integer id in the working set.
    pub fn is_active(&self) -> bool {
        self.id.is_active()
    }

    pub fn has_status(&self, status: TaskStatus) -> bool {
        self.status == Some(status)
    }

    pub fn is_child_of(&self, parent_uuid: &str) -> bool {
        self.parent.as_deref() == Some(parent_uuid)
    }

    /// The mask this recurring task should carry once `child`'s current
    /// status is recorded in the child's slot.
    pub fn parent_mask_after(&self, child: &Task) -> Result<Mask, ModelError> {
        let is_parent = match self.uuid.as_deref() {
            Some(uuid) => child.is_child_of(uuid),
            None => false,
        };
        if !is_parent {
            return Err(ModelError::NotAChild {
                child: child.id.to_string(),
                parent: self.id.to_string(),
            });
        }

        let index = child.imask.ok_or(ModelError::MissingField("imask"))?;
        let status = child.status.ok_or(ModelError::MissingField("status"))?;
        let marker = MaskMarker::for_status(status).ok_or_else(|| ModelError::InvalidField {
            field: "status",
            value: status.to_string(),
        })?;

        self.mask
            .as_ref()
            .ok_or(ModelError::MissingField("mask"))?
            .with_marker(index, marker)
    }
}

pub(crate) fn validate_description(description: &str) -> Result<(), ModelError> {
    if description.trim().is_empty() {
        return Err(ModelError::MissingField("description"));
    }
    if description.contains(['\n', '\r']) {
        return Err(ModelError::MultilineDescription);
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn parse_imask(value: &RawNumber) -> Result<u32, ModelError> {
    value
        .as_index()
        .and_then(|index| u32::try_from(index).ok())
        .ok_or_else(|| ModelError::InvalidField {
            field: "imask",
            value: value.to_string(),
        })
}
