//! Logging setup

use std::sync::Once;
use tracing::Level;

static INIT: Once = Once::new();

/// Install the global fmt subscriber. Safe to call more than once; a
/// subscriber installed by the host process wins.
pub fn init() {
    INIT.call_once(|| {
        let level = if cfg!(debug_assertions) {
            Level::DEBUG
        } else {
            Level::INFO
        };

        if let Err(e) = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .try_init()
        {
            eprintln!("[Rust] Logging already initialised: {}", e);
        }
    });
}
