use crate::model::task::{Task, TaskStatus};
use tracing::warn;

/// Brings each recurring parent's mask in line with the finished occurrences
/// present in `tasks`, so a snapshot never shows a completed or deleted child
/// whose slot still reads pending.
pub fn reconcile_masks(tasks: &mut [Task]) {
    let finished: Vec<usize> = tasks
        .iter()
        .enumerate()
        .filter(|(_, task)| {
            task.parent.is_some()
                && (task.has_status(TaskStatus::Completed) || task.has_status(TaskStatus::Deleted))
        })
        .map(|(index, _)| index)
        .collect();

    for child_index in finished {
        let Some(child) = tasks.get(child_index).cloned() else {
            continue;
        };
        let Some(parent_uuid) = child.parent.as_deref() else {
            continue;
        };
        let Some(parent) = tasks
            .iter_mut()
            .find(|task| task.uuid.as_deref() == Some(parent_uuid))
        else {
            continue;
        };

        match parent.parent_mask_after(&child) {
            Ok(mask) => parent.mask = Some(mask),
            Err(err) => warn!(parent = %parent.id, child = %child.id, "skipping mask update: {err}"),
        }
    }
}
