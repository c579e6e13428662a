use serde::{Deserialize, Serialize};

use crate::profile::character::SlotName;
use crate::profile::cheats::{AchievementReport, InsaneStatsReport};
use crate::profile::starting_build::StartingBuild;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub save_game_class: Option<String>,
    pub engine_version: String,
    pub save_game_version: i32,
    pub slot: Option<SlotName>,
    pub level: Option<i64>,
    pub ergo: Option<i64>,
    pub humanity_level: Option<i64>,
    pub ng_plus: Option<i64>,
    pub deaths: Option<i64>,
    pub play_time_seconds: Option<f64>,
    pub starting_build: Option<StartingBuild>,
    pub lamp_attached: Option<bool>,
    pub item_count: usize,
    pub root_property_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityIssue {
    /// Re-encoding the parsed tree does not reproduce the file.
    InexactRoundTrip,
    /// Some payloads are kept as opaque bytes and cannot be edited.
    RawPayloads,
    MissingCharacter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    pub can_query: bool,
    pub can_apply_edits: bool,
    pub issues: Vec<CapabilityIssue>,
}

impl Capabilities {
    pub fn from_issues(issues: Vec<CapabilityIssue>) -> Self {
        let can_apply_edits = !issues.contains(&CapabilityIssue::InexactRoundTrip);
        Self {
            can_query: true,
            can_apply_edits,
            issues,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterEntry {
    pub name: String,
    pub label: String,
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatEntry {
    pub name: String,
    pub label: String,
    pub value: Option<i64>,
}

/// Cheats to run in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheatSelection {
    pub godmode: bool,
    pub insane_stats: bool,
    pub max_currency: Option<i64>,
    pub create_missing_currency: bool,
    pub unlock_locations: bool,
    pub auto_plat: bool,
}

impl CheatSelection {
    pub fn is_empty(&self) -> bool {
        !self.godmode
            && !self.insane_stats
            && self.max_currency.is_none()
            && !self.unlock_locations
            && !self.auto_plat
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CheatReport {
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub godmode: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insane_stats: Option<InsaneStatsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_currency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlock_locations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achievements: Option<AchievementReport>,
}

impl CheatReport {
    pub fn total(&self) -> usize {
        self.godmode.unwrap_or(0)
            + self.insane_stats.map(|r| r.total()).unwrap_or(0)
            + self.max_currency.unwrap_or(0)
            + self.unlock_locations.unwrap_or(0)
            + self.achievements.map(|r| r.changes).unwrap_or(0)
    }
}
