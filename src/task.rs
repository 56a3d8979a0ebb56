//! Task records and the ordered task store

use crate::events::{CoreEvent, EventBus};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// A task shown in the popover list and, when visible, in the menubar
#[derive(uniffi::Record, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_high_priority: bool,
    #[serde(default)]
    pub is_visible_in_menubar: bool,
}

impl Task {
    /// New task with a fresh id; not high priority, not visible.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            is_high_priority: false,
            is_visible_in_menubar: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Task title cannot be empty")]
    EmptyTitle,

    #[error("Cannot move task from {from} to {to} in a list of {len}")]
    InvalidPosition { from: u32, to: u32, len: usize },

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Ordered in-memory task list, optionally mirrored to a JSON file.
///
/// Every successful mutation publishes [`CoreEvent::TasksChanged`] before the
/// list is written back, so a failed write still leaves listeners in sync with
/// memory.
pub struct TaskStore {
    tasks: Vec<Task>,
    path: Option<PathBuf>,
    events: EventBus,
}

impl TaskStore {
    pub fn in_memory(events: EventBus) -> Self {
        Self {
            tasks: Vec::new(),
            path: None,
            events,
        }
    }

    /// Load the list from `path`; a missing file is an empty list.
    pub fn open(path: PathBuf, events: EventBus) -> Result<Self> {
        let tasks: Vec<Task> = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read tasks file {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse tasks file {:?}", path))?
        } else {
            Vec::new()
        };

        tracing::info!("Loaded {} tasks from {:?}", tasks.len(), path);

        Ok(Self {
            tasks,
            path: Some(path),
            events,
        })
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn add(&mut self, title: &str) -> Result<Task, TaskError> {
        let task = Task::new(normalize_title(title)?);
        self.tasks.push(task.clone());
        self.commit()?;
        Ok(task)
    }

    /// Replace the task with the same id. Unchanged records are not re-published.
    pub fn update(&mut self, mut task: Task) -> Result<(), TaskError> {
        task.title = normalize_title(&task.title)?;
        let slot = self
            .tasks
            .iter_mut()
            .find(|t| t.id == task.id)
            .ok_or_else(|| TaskError::NotFound(task.id.clone()))?;

        if *slot == task {
            return Ok(());
        }
        *slot = task;
        self.commit()
    }

    pub fn remove(&mut self, id: &str) -> Result<Task, TaskError> {
        let index = self.position(id)?;
        let removed = self.tasks.remove(index);
        self.commit()?;
        Ok(removed)
    }

    pub fn toggle_priority(&mut self, id: &str) -> Result<Task, TaskError> {
        let index = self.position(id)?;
        self.tasks[index].is_high_priority = !self.tasks[index].is_high_priority;
        self.commit()?;
        Ok(self.tasks[index].clone())
    }

    pub fn toggle_visibility(&mut self, id: &str) -> Result<Task, TaskError> {
        let index = self.position(id)?;
        self.tasks[index].is_visible_in_menubar = !self.tasks[index].is_visible_in_menubar;
        self.commit()?;
        Ok(self.tasks[index].clone())
    }

    /// Move the task at `from` so that it ends up at index `to`.
    pub fn move_task(&mut self, from: u32, to: u32) -> Result<(), TaskError> {
        let len = self.tasks.len();
        let (src, dst) = (from as usize, to as usize);
        if src >= len || dst >= len {
            return Err(TaskError::InvalidPosition { from, to, len });
        }
        if src == dst {
            return Ok(());
        }
        let task = self.tasks.remove(src);
        self.tasks.insert(dst, task);
        self.commit()
    }

    fn position(&self, id: &str) -> Result<usize, TaskError> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    fn commit(&self) -> Result<(), TaskError> {
        self.events.publish(CoreEvent::TasksChanged);
        self.save().map_err(|e| {
            tracing::warn!("Failed to persist tasks: {:#}", e);
            TaskError::Storage(e)
        })
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create tasks directory")?;
        }

        let content =
            serde_json::to_string_pretty(&self.tasks).context("Failed to serialize tasks")?;
        fs::write(path, content).with_context(|| format!("Failed to write tasks file {:?}", path))
    }
}

fn normalize_title(title: &str) -> Result<String, TaskError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(TaskError::EmptyTitle);
    }
    Ok(title.to_string())
}
