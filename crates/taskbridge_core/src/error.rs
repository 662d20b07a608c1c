use crate::model::TaskStatus;
use thiserror::Error;

/// Failures raised by the task tool protocol and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// The `task` binary could not be located or executed (exit 127).
    #[error("command_not_found - {0}")]
    CommandNotFound(String),
    /// The tool ran but exited outside the recognized codes. Carries stderr.
    #[error("command_failed - {0}")]
    CommandExecution(String),
    /// The identifier given to `done`/`delete` matched no task.
    #[error("no_task - {0}")]
    NoTask(String),
    /// The add-then-export sequence did not yield exactly one usable task.
    #[error("add_failed - {0}")]
    AddTask(String),
    #[error("invalid_task - {0}")]
    Model(#[from] ModelError),
    #[error("invalid_input - {0}")]
    InvalidInput(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
    #[error("io_error - {0}")]
    Io(String),
    #[error("storage_error - {0}")]
    Storage(String),
}

impl AppError {
    pub fn invalid_input<M: Into<String>>(message: M) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn io<M: Into<String>>(message: M) -> Self {
        Self::Io(message.into())
    }

    pub fn storage<M: Into<String>>(message: M) -> Self {
        Self::Storage(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::CommandNotFound(_) => "command_not_found",
            Self::CommandExecution(_) => "command_failed",
            Self::NoTask(_) => "no_task",
            Self::AddTask(_) => "add_failed",
            Self::Model(_) => "invalid_task",
            Self::InvalidInput(_) => "invalid_input",
            Self::InvalidData(_) => "invalid_data",
            Self::Io(_) => "io_error",
            Self::Storage(_) => "storage_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Model(err) => err.to_string(),
            Self::CommandNotFound(message)
            | Self::CommandExecution(message)
            | Self::NoTask(message)
            | Self::AddTask(message)
            | Self::InvalidInput(message)
            | Self::InvalidData(message)
            | Self::Io(message)
            | Self::Storage(message) => message.clone(),
        }
    }
}

/// A raw record could not be turned into a well-formed task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("invalid value `{value}` for field `{field}`")]
    InvalidField { field: &'static str, value: String },
    #[error("invalid timestamp `{value}` for field `{field}`")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("description must not contain line breaks")]
    MultilineDescription,
    #[error("status `{0}` requires an end timestamp")]
    MissingEnd(TaskStatus),
    #[error("status `waiting` requires a wait timestamp")]
    MissingWait,
    #[error("mask index {index} is out of range for a mask of length {len}")]
    MaskIndexOutOfRange { index: u32, len: usize },
    #[error("task {child} is not an occurrence of parent {parent}")]
    NotAChild { child: String, parent: String },
}
