//! Menubar rotation policy
//!
//! Only tasks flagged visible in the menubar take part in rotation. The cursor
//! indexes into that filtered list, so it has to heal itself when the list
//! shrinks between ticks.

use crate::settings::PriorityEmoji;
use crate::task::Task;

/// Shown in the status bar when no task is visible
pub const FALLBACK_GLYPH: &str = "📄";

/// Visible tasks in store order
pub fn visible_tasks(tasks: &[Task]) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(|t| t.is_visible_in_menubar)
}

/// Status bar text for a task
pub fn display_label(task: &Task, emoji: PriorityEmoji) -> String {
    if task.is_high_priority {
        format!("{} {}", emoji.glyph(), task.title)
    } else {
        task.title.clone()
    }
}

/// Position of the next visible task to show
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RotationCursor {
    current_index: usize,
}

impl RotationCursor {
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn reset(&mut self) {
        self.current_index = 0;
    }

    /// Pick the label for this tick and advance.
    ///
    /// With nothing visible the fallback glyph is returned and the cursor is
    /// left exactly where it was.
    pub fn step(&mut self, tasks: &[Task], emoji: PriorityEmoji) -> String {
        let visible: Vec<&Task> = visible_tasks(tasks).collect();
        if visible.is_empty() {
            return FALLBACK_GLYPH.to_string();
        }

        if self.current_index >= visible.len() {
            self.current_index = 0;
        }

        let label = display_label(visible[self.current_index], emoji);
        self.current_index = (self.current_index + 1) % visible.len();
        label
    }
}
