//! Display settings and their persistence

use crate::events::{CoreEvent, EventBus};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

pub const MIN_ROTATION_INTERVAL_SECONDS: u32 = 1;
pub const MAX_ROTATION_INTERVAL_SECONDS: u32 = 60;
pub const DEFAULT_ROTATION_INTERVAL_SECONDS: u32 = 5;

/// Named color assets of the host app
#[derive(uniffi::Enum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityColor {
    #[default]
    Color1,
    Color2,
    Color3,
    Color4,
    Color5,
}

impl PriorityColor {
    pub const ALL: [PriorityColor; 5] = [
        PriorityColor::Color1,
        PriorityColor::Color2,
        PriorityColor::Color3,
        PriorityColor::Color4,
        PriorityColor::Color5,
    ];

    pub fn token(self) -> &'static str {
        match self {
            PriorityColor::Color1 => "Color_1",
            PriorityColor::Color2 => "Color_2",
            PriorityColor::Color3 => "Color_3",
            PriorityColor::Color4 => "Color_4",
            PriorityColor::Color5 => "Color_5",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.token() == token.trim())
    }
}

/// Marker glyphs offered for high priority tasks
#[derive(uniffi::Enum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PriorityEmoji {
    #[default]
    RedCircle,
    StopSign,
    DoubleExclamation,
    Collision,
    Warning,
}

impl PriorityEmoji {
    pub const ALL: [PriorityEmoji; 5] = [
        PriorityEmoji::RedCircle,
        PriorityEmoji::StopSign,
        PriorityEmoji::DoubleExclamation,
        PriorityEmoji::Collision,
        PriorityEmoji::Warning,
    ];

    pub fn glyph(self) -> &'static str {
        match self {
            PriorityEmoji::RedCircle => "🔴",
            PriorityEmoji::StopSign => "🛑",
            PriorityEmoji::DoubleExclamation => "‼️",
            PriorityEmoji::Collision => "💥",
            PriorityEmoji::Warning => "⚠️",
        }
    }

    pub fn from_glyph(glyph: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.glyph() == glyph.trim())
    }
}

/// Snapshot of the display settings
#[derive(uniffi::Record, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub rotation_interval_seconds: u32,
    pub priority_color: PriorityColor,
    pub priority_emoji: PriorityEmoji,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rotation_interval_seconds: DEFAULT_ROTATION_INTERVAL_SECONDS,
            priority_color: PriorityColor::default(),
            priority_emoji: PriorityEmoji::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Invalid setting value: {0}")]
    InvalidValue(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// On-disk shape written by [`SettingsState`]
#[derive(Serialize)]
struct SettingsFile<'a> {
    rotation_interval_seconds: u32,
    priority_color: &'a str,
    priority_emoji: &'a str,
}

impl<'a> From<&'a Settings> for SettingsFile<'a> {
    fn from(settings: &'a Settings) -> Self {
        Self {
            rotation_interval_seconds: settings.rotation_interval_seconds,
            priority_color: settings.priority_color.token(),
            priority_emoji: settings.priority_emoji.glyph(),
        }
    }
}

/// Read settings leniently: broken syntax, wrong types and out-of-range or
/// unknown values fall back to defaults key by key, with a warning.
fn parse_settings(content: &str) -> Settings {
    let defaults = Settings::default();
    let table: toml::Table = match toml::from_str(content) {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!("Settings file is not valid TOML, using defaults: {}", e);
            return defaults;
        }
    };

    let rotation_interval_seconds = match table.get("rotation_interval_seconds") {
        None => defaults.rotation_interval_seconds,
        Some(toml::Value::Integer(secs)) => (*secs).clamp(
            i64::from(MIN_ROTATION_INTERVAL_SECONDS),
            i64::from(MAX_ROTATION_INTERVAL_SECONDS),
        ) as u32,
        Some(other) => {
            tracing::warn!("Invalid rotation interval {} in settings, using default", other);
            defaults.rotation_interval_seconds
        }
    };

    let priority_color = match table.get("priority_color") {
        None => defaults.priority_color,
        Some(value) => value
            .as_str()
            .and_then(PriorityColor::from_token)
            .unwrap_or_else(|| {
                tracing::warn!("Unknown priority color {} in settings, using default", value);
                defaults.priority_color
            }),
    };

    let priority_emoji = match table.get("priority_emoji") {
        None => defaults.priority_emoji,
        Some(value) => value
            .as_str()
            .and_then(PriorityEmoji::from_glyph)
            .unwrap_or_else(|| {
                tracing::warn!("Unknown priority emoji {} in settings, using default", value);
                defaults.priority_emoji
            }),
    };

    Settings {
        rotation_interval_seconds,
        priority_color,
        priority_emoji,
    }
}

/// Process-wide settings, persisted on every change
pub struct SettingsState {
    settings: Settings,
    path: Option<PathBuf>,
    events: EventBus,
}

impl SettingsState {
    pub fn in_memory(events: EventBus) -> Self {
        Self {
            settings: Settings::default(),
            path: None,
            events,
        }
    }

    /// Load settings from `path`; a missing file yields defaults and a
    /// malformed one is read as far as it can be.
    pub fn open(path: PathBuf, events: EventBus) -> Result<Self> {
        let settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings file {:?}", path))?;
            parse_settings(&content)
        } else {
            Settings::default()
        };

        tracing::info!(?settings, "Settings loaded");

        Ok(Self {
            settings,
            path: Some(path),
            events,
        })
    }

    pub fn get(&self) -> Settings {
        self.settings
    }

    pub fn rotation_interval_seconds(&self) -> u32 {
        self.settings.rotation_interval_seconds
    }

    pub fn priority_emoji(&self) -> PriorityEmoji {
        self.settings.priority_emoji
    }

    pub fn set_rotation_interval(&mut self, seconds: u32) -> Result<(), SettingsError> {
        if !(MIN_ROTATION_INTERVAL_SECONDS..=MAX_ROTATION_INTERVAL_SECONDS).contains(&seconds) {
            return Err(SettingsError::InvalidValue(format!(
                "rotation interval must be between {} and {} seconds, got {}",
                MIN_ROTATION_INTERVAL_SECONDS, MAX_ROTATION_INTERVAL_SECONDS, seconds
            )));
        }
        if seconds == self.settings.rotation_interval_seconds {
            return Ok(());
        }

        self.settings.rotation_interval_seconds = seconds;
        self.events.publish(CoreEvent::RotationSettingsChanged);
        self.commit()
    }

    pub fn set_priority_color(&mut self, token: &str) -> Result<(), SettingsError> {
        let color = PriorityColor::from_token(token).ok_or_else(|| {
            SettingsError::InvalidValue(format!("unknown priority color {:?}", token))
        })?;
        if color == self.settings.priority_color {
            return Ok(());
        }

        self.settings.priority_color = color;
        self.commit()
    }

    pub fn set_priority_emoji(&mut self, glyph: &str) -> Result<(), SettingsError> {
        let emoji = PriorityEmoji::from_glyph(glyph).ok_or_else(|| {
            SettingsError::InvalidValue(format!("unknown priority emoji {:?}", glyph))
        })?;
        if emoji == self.settings.priority_emoji {
            return Ok(());
        }

        self.settings.priority_emoji = emoji;
        self.commit()
    }

    fn commit(&self) -> Result<(), SettingsError> {
        self.events.publish(CoreEvent::SettingsChanged);
        self.save().map_err(|e| {
            tracing::warn!("Failed to persist settings: {:#}", e);
            SettingsError::Storage(e)
        })
    }

    fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let content = toml::to_string(&SettingsFile::from(&self.settings))
            .context("Failed to serialize settings")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write settings file {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn tokens_round_trip_for_whole_palette() {
        for color in PriorityColor::ALL {
            assert_eq!(PriorityColor::from_token(color.token()), Some(color));
        }
        for emoji in PriorityEmoji::ALL {
            assert_eq!(PriorityEmoji::from_glyph(emoji.glyph()), Some(emoji));
        }
        assert_eq!(PriorityColor::from_token("Color_6"), None);
        assert_eq!(PriorityEmoji::from_glyph("🙂"), None);
    }

    #[test]
    fn interval_setter_rejects_out_of_range() {
        let mut state = SettingsState::in_memory(EventBus::new());
        for bad in [0, 61, u32::MAX] {
            assert!(matches!(
                state.set_rotation_interval(bad),
                Err(SettingsError::InvalidValue(_))
            ));
        }
        assert_eq!(state.rotation_interval_seconds(), DEFAULT_ROTATION_INTERVAL_SECONDS);

        state.set_rotation_interval(1).unwrap();
        state.set_rotation_interval(60).unwrap();
        assert_eq!(state.rotation_interval_seconds(), 60);
    }

    #[test]
    fn interval_change_signals_rotation() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let mut state = SettingsState::in_memory(events);

        state.set_rotation_interval(12).unwrap();
        assert_eq!(rx.try_recv(), Ok(CoreEvent::RotationSettingsChanged));
        assert_eq!(rx.try_recv(), Ok(CoreEvent::SettingsChanged));

        state.set_rotation_interval(12).unwrap();
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn decoration_change_does_not_restart_rotation() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let mut state = SettingsState::in_memory(events);

        state.set_priority_emoji("⚠️").unwrap();
        state.set_priority_color("Color_3").unwrap();
        assert_eq!(rx.try_recv(), Ok(CoreEvent::SettingsChanged));
        assert_eq!(rx.try_recv(), Ok(CoreEvent::SettingsChanged));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(state.priority_emoji(), PriorityEmoji::Warning);
        assert_eq!(state.get().priority_color, PriorityColor::Color3);
    }

    #[test]
    fn unknown_tokens_leave_state_untouched() {
        let mut state = SettingsState::in_memory(EventBus::new());
        assert!(state.set_priority_color("Magenta").is_err());
        assert!(state.set_priority_emoji("x").is_err());
        assert_eq!(state.get(), Settings::default());
    }

    #[test]
    fn persisted_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        let mut state = SettingsState::open(path.clone(), EventBus::new()).unwrap();
        assert_eq!(state.get(), Settings::default());
        state.set_rotation_interval(30).unwrap();
        state.set_priority_color("Color_5").unwrap();
        state.set_priority_emoji("💥").unwrap();

        let reopened = SettingsState::open(path, EventBus::new()).unwrap();
        assert_eq!(
            reopened.get(),
            Settings {
                rotation_interval_seconds: 30,
                priority_color: PriorityColor::Color5,
                priority_emoji: PriorityEmoji::Collision,
            }
        );
    }

    #[test]
    fn hand_edited_file_is_clamped_and_defaulted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "rotation_interval_seconds = 500\npriority_color = \"Teal\"\npriority_emoji = \"🛑\"\n",
        )
        .unwrap();

        let state = SettingsState::open(path, EventBus::new()).unwrap();
        assert_eq!(state.rotation_interval_seconds(), MAX_ROTATION_INTERVAL_SECONDS);
        assert_eq!(state.get().priority_color, PriorityColor::Color1);
        assert_eq!(state.priority_emoji(), PriorityEmoji::StopSign);
    }

    #[test]
    fn mistyped_value_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "rotation_interval_seconds = \"ten\"\npriority_color = 3\npriority_emoji = \"💥\"\n",
        )
        .unwrap();

        let state = SettingsState::open(path, EventBus::new()).unwrap();
        assert_eq!(
            state.get(),
            Settings {
                priority_emoji: PriorityEmoji::Collision,
                ..Settings::default()
            }
        );
    }

    #[test]
    fn broken_file_loads_defaults_and_is_rewritten_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "rotation_interval_seconds = = 7\n[priority").unwrap();

        let mut state = SettingsState::open(path.clone(), EventBus::new()).unwrap();
        assert_eq!(state.get(), Settings::default());

        state.set_rotation_interval(7).unwrap();
        let reopened = SettingsState::open(path, EventBus::new()).unwrap();
        assert_eq!(reopened.rotation_interval_seconds(), 7);
    }

    #[test]
    fn failed_write_keeps_change_and_still_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let mut state = SettingsState::open(path.clone(), events).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(matches!(
            state.set_priority_emoji("🛑"),
            Err(SettingsError::Storage(_))
        ));
        assert_eq!(state.priority_emoji(), PriorityEmoji::StopSign);
        assert_eq!(rx.try_recv(), Ok(CoreEvent::SettingsChanged));
    }
}
