//! Alert Throttle
//!
//! Gates audio/visual alerts during bursts of blocks. Alerts inside the
//! minimum interval are dropped, never deferred.

use std::time::{Duration, Instant};

use tracing::debug;

use super::{AlertCue, AlertSink, PreferenceSource};

/// What a call to [`AlertThrottle::maybe_alert`] ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// Inside the quiet window; nothing emitted
    Suppressed,
    /// Window open; effects emitted according to the preferences
    Fired { audio: bool, visual: bool },
}

/// Time gate between consecutive alerts
#[derive(Debug, Clone)]
pub struct AlertThrottle {
    last_alert: Option<Instant>,
    min_interval: Duration,
}

impl AlertThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_alert: None,
            min_interval,
        }
    }

    /// Claim the alert slot at `now` if the quiet window has elapsed
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_alert {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_alert = Some(now);
        true
    }

    /// Fire the alert unless one fired less than `min_interval` ago.
    /// Preferences are read fresh on every fired alert.
    pub fn maybe_alert(
        &mut self,
        now: Instant,
        cue: AlertCue,
        prefs: &dyn PreferenceSource,
        sink: &dyn AlertSink,
    ) -> AlertOutcome {
        if !self.try_acquire(now) {
            debug!("Alert suppressed ({} newly blocked inside quiet window)", cue.newly_blocked);
            return AlertOutcome::Suppressed;
        }

        let prefs = prefs.load();
        if prefs.sound_enabled {
            sink.play_sound(&cue);
        }
        if prefs.visual_enabled {
            sink.flash(&cue);
        }

        AlertOutcome::Fired {
            audio: prefs.sound_enabled,
            visual: prefs.visual_enabled,
        }
    }
}

impl Default for AlertThrottle {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertPreferences;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingSink {
        sounds: Mutex<u32>,
        flashes: Mutex<u32>,
    }

    impl AlertSink for CountingSink {
        fn play_sound(&self, _cue: &AlertCue) {
            *self.sounds.lock().unwrap() += 1;
        }
        fn flash(&self, _cue: &AlertCue) {
            *self.flashes.lock().unwrap() += 1;
        }
    }

    const CUE: AlertCue = AlertCue { newly_blocked: 1 };

    #[test]
    fn test_twice_within_window_fires_once() {
        let sink = CountingSink::default();
        let prefs = AlertPreferences::default();
        let mut throttle = AlertThrottle::default();
        let t0 = Instant::now();

        assert!(matches!(throttle.maybe_alert(t0, CUE, &prefs, &sink), AlertOutcome::Fired { .. }));
        assert_eq!(
            throttle.maybe_alert(t0 + Duration::from_millis(200), CUE, &prefs, &sink),
            AlertOutcome::Suppressed
        );
        assert!(matches!(
            throttle.maybe_alert(t0 + Duration::from_millis(700), CUE, &prefs, &sink),
            AlertOutcome::Fired { .. }
        ));
        assert_eq!(*sink.sounds.lock().unwrap(), 2);
    }

    #[test]
    fn test_suppressed_alert_does_not_extend_window() {
        let mut throttle = AlertThrottle::default();
        let t0 = Instant::now();
        assert!(throttle.try_acquire(t0));
        assert!(!throttle.try_acquire(t0 + Duration::from_millis(400)));
        assert!(throttle.try_acquire(t0 + Duration::from_millis(500)));
    }

    #[test]
    fn test_disabled_channels_are_noops() {
        let sink = CountingSink::default();
        let prefs = AlertPreferences { sound_enabled: false, visual_enabled: true };
        let mut throttle = AlertThrottle::default();

        let outcome = throttle.maybe_alert(Instant::now(), CUE, &prefs, &sink);
        assert_eq!(outcome, AlertOutcome::Fired { audio: false, visual: true });
        assert_eq!(*sink.sounds.lock().unwrap(), 0);
        assert_eq!(*sink.flashes.lock().unwrap(), 1);
    }
}
