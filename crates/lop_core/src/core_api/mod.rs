mod engine;
mod error;
mod parts_catalog;
mod types;

pub use engine::{Engine, Session};
pub use error::{CoreError, CoreErrorCode};
pub use parts_catalog::{PartInfo, PartKind, WeaponPartsDb};
pub use types::{
    Capabilities, CapabilityIssue, CharacterEntry, CheatReport, CheatSelection, Snapshot,
    StatEntry,
};
