//! Persisted alert preferences
//!
//! User-scoped JSON file, read at call time so toggles take effect on the
//! very next alert.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertPreferences {
    pub sound_enabled: bool,
    pub visual_enabled: bool,
}

impl Default for AlertPreferences {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            visual_enabled: true,
        }
    }
}

/// Where alert preferences come from
pub trait PreferenceSource: Send + Sync {
    fn load(&self) -> AlertPreferences;
}

/// A fixed set of preferences
impl PreferenceSource for AlertPreferences {
    fn load(&self) -> AlertPreferences {
        *self
    }
}

/// Preferences stored in a JSON file
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, prefs: &AlertPreferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    /// Read-modify-write helper for the toggle commands
    pub fn update(&self, change: impl FnOnce(&mut AlertPreferences)) -> Result<AlertPreferences> {
        let mut prefs = self.load();
        change(&mut prefs);
        self.save(&prefs)?;
        Ok(prefs)
    }
}

impl PreferenceSource for FilePreferences {
    /// Missing file means defaults; an unreadable one is logged and ignored.
    fn load(&self) -> AlertPreferences {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return AlertPreferences::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring malformed alert preferences in {}: {}", self.path.display(), e);
            AlertPreferences::default()
        })
    }
}
