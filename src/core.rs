//! Core FFI facade for U Do
//!
//! This module provides the main interface exposed to Swift via UniFFI.
//! Swift owns the status item, the popover window and the views; everything
//! those views edit, and the rotation that drives the status item title,
//! lives here.

use crate::config::Config;
use crate::events::{CoreEvent, EventBus};
use crate::logging;
use crate::popover::{Point, PopoverController, Rect};
use crate::scheduler::{RotationScheduler, RotationSource};
use crate::settings::{PriorityColor, PriorityEmoji, Settings, SettingsError, SettingsState};
use crate::task::{Task, TaskError, TaskStore};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

// Global tokio runtime; one worker drives the rotation timer and event forwarding
static TOKIO_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tracing::info!("Creating Tokio runtime...");
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("udo-core")
        .enable_all()
        .build()
        .expect("Failed to create tokio runtime")
});

/// Error types for U Do
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum UDoError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid setting value: {message}")]
    InvalidSettingValue { message: String },

    #[error("Task not found: {message}")]
    TaskNotFound { message: String },

    #[error("Invalid task: {message}")]
    InvalidTask { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

impl From<anyhow::Error> for UDoError {
    fn from(err: anyhow::Error) -> Self {
        UDoError::Unexpected {
            message: format!("{:#}", err),
        }
    }
}

impl From<TaskError> for UDoError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => UDoError::TaskNotFound { message: id },
            TaskError::EmptyTitle | TaskError::InvalidPosition { .. } => UDoError::InvalidTask {
                message: err.to_string(),
            },
            TaskError::Storage(e) => UDoError::Storage {
                message: format!("{:#}", e),
            },
        }
    }
}

impl From<SettingsError> for UDoError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::InvalidValue(message) => UDoError::InvalidSettingValue { message },
            SettingsError::Storage(e) => UDoError::Storage {
                message: format!("{:#}", e),
            },
        }
    }
}

/// The status bar item title, implemented by Swift.
///
/// Called from the core's worker thread; implementations hop to the main
/// thread themselves.
#[uniffi::export(with_foreign)]
pub trait StatusIndicator: Send + Sync {
    fn set_label(&self, text: String);
}

/// The popover window, implemented by Swift.
///
/// Callbacks run while the core holds its popover lock, so they must not call
/// back into the `*_popover` methods synchronously.
#[uniffi::export(with_foreign)]
pub trait PopoverHost: Send + Sync {
    /// Order the window front at `frame` (screen coordinates)
    fn show_window(&self, frame: Rect);

    /// Order the window out
    fn hide_window(&self);

    /// Start or stop forwarding global mouse-down events to
    /// [`UDoCore::popover_pointer_down`]
    fn set_pointer_monitor(&self, enabled: bool);
}

/// Trait implemented by Swift to receive state updates
#[uniffi::export(with_foreign)]
pub trait EventHandler: Send + Sync {
    /// Called when the task list changes
    fn on_tasks_changed(&self, tasks: Vec<Task>);

    /// Called when any setting changes
    fn on_settings_changed(&self, settings: Settings);

    /// Called when an error occurs
    fn on_error(&self, error: String);
}

/// Token used by the host's color assets, e.g. `Color_3`
#[uniffi::export]
pub fn priority_color_token(color: PriorityColor) -> String {
    color.token().to_string()
}

#[uniffi::export]
pub fn priority_emoji_glyph(emoji: PriorityEmoji) -> String {
    emoji.glyph().to_string()
}

struct SharedState {
    tasks: Mutex<TaskStore>,
    settings: Mutex<SettingsState>,
}

impl SharedState {
    fn lock_tasks(&self) -> MutexGuard<'_, TaskStore> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_settings(&self) -> MutexGuard<'_, SettingsState> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RotationSource for SharedState {
    fn tasks(&self) -> Vec<Task> {
        self.lock_tasks().list().to_vec()
    }

    fn priority_emoji(&self) -> PriorityEmoji {
        self.lock_settings().priority_emoji()
    }

    fn rotation_interval_seconds(&self) -> u32 {
        self.lock_settings().rotation_interval_seconds()
    }
}

/// Main U Do core
#[derive(uniffi::Object)]
pub struct UDoCore {
    state: Arc<SharedState>,
    scheduler: RotationScheduler,
    popover: Mutex<PopoverController>,
    event_handler: Arc<dyn EventHandler>,
    forwarder: JoinHandle<()>,
}

#[uniffi::export]
impl UDoCore {
    /// Create a core backed by the platform config directory
    #[uniffi::constructor]
    pub fn new(
        status_indicator: Arc<dyn StatusIndicator>,
        popover_host: Arc<dyn PopoverHost>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Result<Arc<Self>, UDoError> {
        logging::init();
        let config = Config::load().map_err(|e| {
            tracing::error!("Config load error: {:#}", e);
            UDoError::Config {
                message: format!("{:#}", e),
            }
        })?;
        Self::build(config, status_indicator, popover_host, event_handler)
    }

    /// Create a core that keeps its files in `config_dir`
    #[uniffi::constructor]
    pub fn with_config_dir(
        config_dir: String,
        status_indicator: Arc<dyn StatusIndicator>,
        popover_host: Arc<dyn PopoverHost>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Result<Arc<Self>, UDoError> {
        logging::init();
        let config = Config::at(config_dir).map_err(|e| UDoError::Config {
            message: format!("{:#}", e),
        })?;
        Self::build(config, status_indicator, popover_host, event_handler)
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state.lock_tasks().list().to_vec()
    }

    pub fn task(&self, id: String) -> Option<Task> {
        self.state.lock_tasks().get(&id).cloned()
    }

    pub fn add_task(&self, title: String) -> Result<Task, UDoError> {
        let result = self.state.lock_tasks().add(&title);
        let task = self.report(result)?;
        tracing::info!(id = %task.id, "Task added");
        Ok(task)
    }

    pub fn update_task(&self, task: Task) -> Result<(), UDoError> {
        let result = self.state.lock_tasks().update(task);
        self.report(result)?;
        Ok(())
    }

    pub fn remove_task(&self, id: String) -> Result<(), UDoError> {
        let result = self.state.lock_tasks().remove(&id);
        let removed = self.report(result)?;
        tracing::info!(id = %removed.id, "Task removed");
        Ok(())
    }

    pub fn toggle_task_priority(&self, id: String) -> Result<Task, UDoError> {
        let result = self.state.lock_tasks().toggle_priority(&id);
        self.report(result)
    }

    pub fn toggle_task_visibility(&self, id: String) -> Result<Task, UDoError> {
        let result = self.state.lock_tasks().toggle_visibility(&id);
        self.report(result)
    }

    pub fn move_task(&self, from: u32, to: u32) -> Result<(), UDoError> {
        let result = self.state.lock_tasks().move_task(from, to);
        self.report(result)
    }

    pub fn settings(&self) -> Settings {
        self.state.lock_settings().get()
    }

    pub fn set_rotation_interval(&self, seconds: u32) -> Result<(), UDoError> {
        let result = self.state.lock_settings().set_rotation_interval(seconds);
        self.report(result)?;
        tracing::info!(seconds, "Rotation interval updated");
        Ok(())
    }

    pub fn set_priority_color(&self, token: String) -> Result<(), UDoError> {
        let result = self.state.lock_settings().set_priority_color(&token);
        self.report(result)
    }

    pub fn set_priority_emoji(&self, emoji: String) -> Result<(), UDoError> {
        let result = self.state.lock_settings().set_priority_emoji(&emoji);
        self.report(result)
    }

    /// Color tokens offered by the settings view, in display order
    pub fn priority_color_tokens(&self) -> Vec<String> {
        PriorityColor::ALL
            .iter()
            .map(|c| c.token().to_string())
            .collect()
    }

    /// Emoji offered by the settings view, in display order
    pub fn priority_emoji_glyphs(&self) -> Vec<String> {
        PriorityEmoji::ALL
            .iter()
            .map(|e| e.glyph().to_string())
            .collect()
    }

    /// Show the next visible task now, keeping the timer as is
    pub fn rotate_now(&self) {
        self.scheduler.step();
    }

    /// Back to the first visible task with a fresh timer
    pub fn restart_rotation(&self) {
        self.scheduler.restart();
    }

    /// Freeze the current label until the next restart or task change
    pub fn stop_rotation(&self) {
        self.scheduler.stop();
    }

    pub fn is_popover_visible(&self) -> bool {
        self.popover().is_visible()
    }

    /// Status item clicked; `anchor` is the button frame, `screen` the visible screen frame
    pub fn toggle_popover(&self, anchor: Rect, screen: Rect) {
        self.popover().toggle(anchor, screen);
    }

    pub fn show_popover(&self, anchor: Rect, screen: Rect) {
        self.popover().show(anchor, screen);
    }

    pub fn hide_popover(&self) {
        self.popover().hide();
    }

    /// Global mouse-down at `point`; returns whether the popover was dismissed
    pub fn popover_pointer_down(&self, point: Point) -> bool {
        self.popover().pointer_down(point)
    }
}

impl UDoCore {
    fn build(
        config: Config,
        status_indicator: Arc<dyn StatusIndicator>,
        popover_host: Arc<dyn PopoverHost>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Result<Arc<Self>, UDoError> {
        tracing::info!("Using config directory {:?}", config.dir());

        let events = EventBus::new();
        let tasks = TaskStore::open(config.tasks_path(), events.clone()).map_err(|e| {
            UDoError::Storage {
                message: format!("{:#}", e),
            }
        })?;
        let settings = SettingsState::open(config.settings_path(), events.clone()).map_err(|e| {
            UDoError::Storage {
                message: format!("{:#}", e),
            }
        })?;
        let interval = settings.rotation_interval_seconds();

        let state = Arc::new(SharedState {
            tasks: Mutex::new(tasks),
            settings: Mutex::new(settings),
        });

        let runtime = TOKIO_RUNTIME.handle();
        let scheduler = RotationScheduler::spawn(
            runtime,
            state.clone(),
            status_indicator,
            events.subscribe(),
        );
        let forwarder = spawn_forwarder(
            runtime,
            events.subscribe(),
            state.clone(),
            event_handler.clone(),
        );

        scheduler.start(interval);
        tracing::info!(interval, "U Do core started");

        Ok(Arc::new(Self {
            state,
            scheduler,
            popover: Mutex::new(PopoverController::new(popover_host)),
            event_handler,
            forwarder,
        }))
    }

    /// Storage failures keep the in-memory change, so besides returning the
    /// error the host is told to surface it.
    fn report<T, E: Into<UDoError>>(&self, result: Result<T, E>) -> Result<T, UDoError> {
        result.map_err(|e| {
            let err = e.into();
            if let UDoError::Storage { message } = &err {
                self.event_handler.on_error(message.clone());
            }
            err
        })
    }

    fn popover(&self) -> MutexGuard<'_, PopoverController> {
        self.popover.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for UDoCore {
    fn drop(&mut self) {
        self.forwarder.abort();
        self.popover().hide();
    }
}

/// Push fresh snapshots to Swift so open views re-render
fn spawn_forwarder(
    runtime: &Handle,
    mut events: broadcast::Receiver<CoreEvent>,
    state: Arc<SharedState>,
    handler: Arc<dyn EventHandler>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        loop {
            match events.recv().await {
                Ok(CoreEvent::TasksChanged) => {
                    let tasks = state.lock_tasks().list().to_vec();
                    handler.on_tasks_changed(tasks);
                }
                Ok(CoreEvent::SettingsChanged) => {
                    let settings = state.lock_settings().get();
                    handler.on_settings_changed(settings);
                }
                Ok(CoreEvent::RotationSettingsChanged) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event forwarder lagged, resending state");
                    let tasks = state.lock_tasks().list().to_vec();
                    handler.on_tasks_changed(tasks);
                    let settings = state.lock_settings().get();
                    handler.on_settings_changed(settings);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
