//! Cross-section notification badges
//!
//! The focused section is always passed in by the caller; the board never
//! consults a global router.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Serialize;

/// A navigable dashboard section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Dashboard,
    Events,
    Analytics,
    Actors,
}

impl Section {
    pub const ALL: [Section; 4] = [Section::Dashboard, Section::Events, Section::Analytics, Section::Actors];
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Section::Dashboard => "dashboard",
            Section::Events => "events",
            Section::Analytics => "analytics",
            Section::Actors => "actors",
        };
        f.write_str(name)
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.to_string() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown section '{}'", s))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BadgeBoard {
    counts: HashMap<Section, u64>,
}

impl BadgeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate `n` on `section` unless it is the one being looked at.
    /// Returns whether the badge moved.
    pub fn add(&mut self, section: Section, n: u64, focused: Section) -> bool {
        if n == 0 || section == focused {
            return false;
        }
        let count = self.counts.entry(section).or_insert(0);
        *count = count.saturating_add(n);
        true
    }

    /// The user arrived on `section`: its badge goes back to zero.
    /// Returns the count that was cleared.
    pub fn navigate(&mut self, section: Section) -> u64 {
        self.counts.remove(&section).unwrap_or(0)
    }

    pub fn count(&self, section: Section) -> u64 {
        self.counts.get(&section).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.counts.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.counts.values().all(|&c| c == 0)
    }

    /// Non-zero badges in section order
    pub fn snapshot(&self) -> Vec<(Section, u64)> {
        Section::ALL
            .into_iter()
            .map(|s| (s, self.count(s)))
            .filter(|(_, c)| *c > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_only_when_unfocused() {
        let mut board = BadgeBoard::new();
        assert!(board.add(Section::Events, 2, Section::Dashboard));
        assert!(board.add(Section::Events, 3, Section::Analytics));
        assert!(!board.add(Section::Events, 4, Section::Events));
        assert_eq!(board.count(Section::Events), 5);
    }

    #[test]
    fn test_navigate_resets_that_section_only() {
        let mut board = BadgeBoard::new();
        board.add(Section::Events, 2, Section::Dashboard);
        board.add(Section::Actors, 1, Section::Dashboard);

        assert_eq!(board.navigate(Section::Events), 2);
        assert_eq!(board.count(Section::Events), 0);
        assert_eq!(board.snapshot(), vec![(Section::Actors, 1)]);
    }

    #[test]
    fn test_section_parse() {
        assert_eq!("Events".parse::<Section>().unwrap(), Section::Events);
        assert!("settings".parse::<Section>().is_err());
    }
}
