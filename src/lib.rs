//! U Do Core
//!
//! This library provides the core functionality for U Do,
//! a macOS menu bar application that rotates task titles through the status bar.

uniffi::setup_scaffolding!();

mod config;
mod core;
mod events;
mod logging;
mod popover;
mod rotation;
mod scheduler;
mod settings;
mod task;

pub use crate::core::{EventHandler, PopoverHost, StatusIndicator, UDoCore, UDoError};
pub use events::{CoreEvent, EventBus};
pub use popover::{Point, PopoverController, Rect};
pub use rotation::{RotationCursor, FALLBACK_GLYPH};
pub use scheduler::{RotationScheduler, RotationSource};
pub use settings::{PriorityColor, PriorityEmoji, Settings, SettingsState};
pub use task::{Task, TaskStore};
