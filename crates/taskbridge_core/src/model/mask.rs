use crate::error::ModelError;
use crate::model::TaskStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one generated occurrence, as recorded on the recurring parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskMarker {
    Pending,
    Completed,
    Deleted,
    Waiting,
}

impl MaskMarker {
    pub fn from_char(marker: char) -> Option<Self> {
        match marker {
            '-' => Some(Self::Pending),
            '+' => Some(Self::Completed),
            'X' => Some(Self::Deleted),
            'W' => Some(Self::Waiting),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Pending => '-',
            Self::Completed => '+',
            Self::Deleted => 'X',
            Self::Waiting => 'W',
        }
    }

    /// Marker an occurrence in `status` leaves on its parent. Recurring
    /// templates are never occurrences.
    pub fn for_status(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::Pending => Some(Self::Pending),
            TaskStatus::Completed => Some(Self::Completed),
            TaskStatus::Deleted => Some(Self::Deleted),
            TaskStatus::Waiting => Some(Self::Waiting),
            TaskStatus::Recurring => None,
        }
    }
}

/// Occurrence ledger of a recurring task, one marker per generated child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mask(Vec<MaskMarker>);

impl Mask {
    pub fn parse(raw: &str) -> Result<Self, ModelError> {
        raw.chars()
            .map(|marker| {
                MaskMarker::from_char(marker).ok_or_else(|| ModelError::InvalidField {
                    field: "mask",
                    value: raw.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn markers(&self) -> &[MaskMarker] {
        &self.0
    }

    /// Copy of this mask with slot `index` set to `marker`.
    pub fn with_marker(&self, index: u32, marker: MaskMarker) -> Result<Self, ModelError> {
        let mut markers = self.0.clone();
        let slot = markers
            .get_mut(index as usize)
            .ok_or(ModelError::MaskIndexOutOfRange {
                index,
                len: self.0.len(),
            })?;
        *slot = marker;
        Ok(Self(markers))
    }
}

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for marker in &self.0 {
            write!(f, "{}", marker.as_char())?;
        }
        Ok(())
    }
}
