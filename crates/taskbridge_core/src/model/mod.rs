mod annotation;
mod draft;
mod mask;
mod raw;
mod recurrence;
mod task;
pub mod timestamp;

pub use annotation::Annotation;
pub use draft::NewTask;
pub use mask::{Mask, MaskMarker};
pub use raw::{RawAnnotation, RawNumber, RawTask};
pub use recurrence::reconcile_masks;
pub use task::{DueDate, Priority, Task, TaskId, TaskStatus};
