use crate::error::ModelError;
use crate::model::task::{Priority, validate_description};

/// A task that has not been handed to the tool yet.
///
/// `due` stays a string: the tool resolves keywords such as `tomorrow` or
/// `eom` itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub description: String,
    pub project: Option<String>,
    pub due: Option<String>,
    pub priority: Option<Priority>,
}

impl NewTask {
    pub fn new<D: Into<String>>(description: D) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_project<P: Into<String>>(mut self, project: P) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_due<D: Into<String>>(mut self, due: D) -> Self {
        self.due = Some(due.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        validate_description(&self.description)
    }

    /// Arguments following `add`: the description, then `key:value` tokens
    /// for each non-empty field in a fixed order.
    pub fn arguments(&self) -> Vec<String> {
        let mut arguments = vec![self.description.trim().to_string()];

        let fields = [
            ("project", self.project.as_deref()),
            ("due", self.due.as_deref()),
            ("priority", self.priority.map(Priority::letter)),
        ];
        for (key, value) in fields {
            if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
                arguments.push(format!("{key}:{value}"));
            }
        }

        arguments
    }
}
