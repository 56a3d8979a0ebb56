//! Popover window policy
//!
//! The popover is modeless: while it is on screen the host forwards global
//! pointer-down events, and any press outside the popover frame hides it. The
//! press itself is never swallowed, it still reaches whatever was clicked.

use crate::core::PopoverHost;
use std::sync::Arc;

/// Default popover content size in points
pub const POPOVER_WIDTH: f64 = 310.0;
pub const POPOVER_HEIGHT: f64 = 400.0;

/// Screen point, bottom-left origin
#[derive(uniffi::Record, Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Screen rectangle, bottom-left origin
#[derive(uniffi::Record, Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x <= self.max_x() && point.y >= self.y && point.y <= self.max_y()
    }
}

/// Frame for a popover of `width` x `height` hanging below the status item
/// `anchor`, centred on it and kept inside the visible `screen` horizontally.
pub fn place_below(anchor: Rect, width: f64, height: f64, screen: Rect) -> Rect {
    let x = anchor.x - (width - anchor.width) / 2.0;
    let x = x.max(screen.x).min(screen.max_x() - width);
    Rect {
        x,
        y: anchor.y - height,
        width,
        height,
    }
}

/// Global pointer monitoring, live for as long as this value is.
struct PointerSubscription {
    host: Arc<dyn PopoverHost>,
}

impl PointerSubscription {
    fn install(host: Arc<dyn PopoverHost>) -> Self {
        host.set_pointer_monitor(true);
        Self { host }
    }
}

impl Drop for PointerSubscription {
    fn drop(&mut self) {
        self.host.set_pointer_monitor(false);
    }
}

struct Shown {
    frame: Rect,
    _monitor: PointerSubscription,
}

pub struct PopoverController {
    host: Arc<dyn PopoverHost>,
    width: f64,
    height: f64,
    shown: Option<Shown>,
}

impl PopoverController {
    pub fn new(host: Arc<dyn PopoverHost>) -> Self {
        Self::with_size(host, POPOVER_WIDTH, POPOVER_HEIGHT)
    }

    pub fn with_size(host: Arc<dyn PopoverHost>, width: f64, height: f64) -> Self {
        Self {
            host,
            width,
            height,
            shown: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.shown.is_some()
    }

    pub fn frame(&self) -> Option<Rect> {
        self.shown.as_ref().map(|s| s.frame)
    }

    pub fn show(&mut self, anchor: Rect, screen: Rect) {
        let frame = place_below(anchor, self.width, self.height, screen);
        // Re-showing replaces the old subscription rather than stacking a second one.
        self.shown = None;
        self.host.show_window(frame);
        self.shown = Some(Shown {
            frame,
            _monitor: PointerSubscription::install(self.host.clone()),
        });
        tracing::debug!(?frame, "Popover shown");
    }

    pub fn hide(&mut self) {
        if self.shown.take().is_some() {
            self.host.hide_window();
            tracing::debug!("Popover hidden");
        }
    }

    /// Status item click
    pub fn toggle(&mut self, anchor: Rect, screen: Rect) {
        if self.is_visible() {
            self.hide();
        } else {
            self.show(anchor, screen);
        }
    }

    /// Feed a global pointer-down. Returns whether it dismissed the popover.
    pub fn pointer_down(&mut self, point: Point) -> bool {
        match self.frame() {
            Some(frame) if !frame.contains(point) => {
                self.hide();
                true
            }
            _ => false,
        }
    }
}
