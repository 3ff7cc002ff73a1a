//! Alert Module
//!
//! Throttled audio/visual cues raised when new blocks arrive.

mod prefs;
mod throttle;

pub use prefs::{AlertPreferences, FilePreferences, PreferenceSource};
pub use throttle::{AlertOutcome, AlertThrottle};

use std::io::Write;

use tracing::warn;

/// Context handed to the sink for a fired alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertCue {
    pub newly_blocked: u64,
}

/// Emits the actual effects. Synthesis and rendering live behind this seam.
pub trait AlertSink: Send + Sync {
    fn play_sound(&self, cue: &AlertCue);
    fn flash(&self, cue: &AlertCue);
}

/// Terminal sink: bell for audio, a highlighted log line for the flash
pub struct ConsoleAlertSink;

impl AlertSink for ConsoleAlertSink {
    fn play_sound(&self, _cue: &AlertCue) {
        let mut out = std::io::stdout();
        let _ = out.write_all(b"\x07");
        let _ = out.flush();
    }

    fn flash(&self, cue: &AlertCue) {
        warn!("🚨 {} new block(s)", cue.newly_blocked);
    }
}
