use crate::error::ModelError;
use crate::model::raw::RawAnnotation;
use crate::model::task::TaskId;
use crate::model::timestamp::{format_timestamp, optional_timestamp};
use time::OffsetDateTime;

/// A timestamped note read off a task. `task_id` points back at the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub task_id: TaskId,
    pub description: String,
    pub entry: OffsetDateTime,
}

impl Annotation {
    pub fn from_raw(task_id: &TaskId, raw: RawAnnotation) -> Result<Self, ModelError> {
        let entry = optional_timestamp("annotation.entry", raw.entry.as_deref())?
            .ok_or(ModelError::MissingField("annotation.entry"))?;

        Ok(Self {
            task_id: task_id.clone(),
            description: raw.description.unwrap_or_default(),
            entry,
        })
    }

    pub fn to_raw(&self) -> RawAnnotation {
        RawAnnotation {
            description: Some(self.description.clone()),
            entry: Some(format_timestamp(self.entry)),
        }
    }
}
