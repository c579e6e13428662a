use std::io::Cursor;
use std::path::Path;

use serde_json::Value;

use crate::gvas::{Document, PropertyMap, PropertyValue};
use crate::profile::builds::{self, BuildEdit, WeaponBuild};
use crate::profile::character::{self, CharacterField, SlotName};
use crate::profile::cheats;
use crate::profile::currency::{self, CurrencyKind, CurrencyRow};
use crate::profile::fast_travel::{self, Position, PositionEdit, Respawn, Spot, StargazerState};
use crate::profile::inventory::{
    self, AddOutcome, DedupeReport, ImportReport, InventoryExport, InventoryItem,
};
use crate::profile::missions::{self, QuestExport, QuestImportReport, QuestRecord, QuestRow, QuestState};
use crate::profile::path::FieldPath;
use crate::profile::slots::{self, AssistDirection, AssistSlot, EquipSlot, QuickSlot};
use crate::profile::CHARACTER_SAVE_DATA;
use crate::profile::starting_build::StartingBuild;
use crate::profile::stats::{self, PrimaryStat, SecondaryStat};
use crate::storage;

use super::error::{CoreError, CoreErrorCode};
use super::types::{
    Capabilities, CapabilityIssue, CharacterEntry, CheatReport, CheatSelection, Snapshot,
    StatEntry,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct Engine;

/// An open save with typed accessors and edits over its property tree.
#[derive(Debug, Clone)]
pub struct Session {
    document: Document,
    capabilities: Capabilities,
}

impl Engine {
    pub fn new() -> Self {
        Self
    }

    pub fn open_bytes<B: AsRef<[u8]>>(&self, bytes: B) -> Result<Session, CoreError> {
        let document = Document::parse_with_layout(Cursor::new(bytes.as_ref())).map_err(|e| {
            CoreError::new(CoreErrorCode::Parse, format!("failed to parse GVAS save: {e}"))
        })?;
        Ok(Session::new(document))
    }

    /// Open a `.sav`, or a `.json` export merged onto `template`.
    pub fn open_path(&self, path: &Path, template: Option<&Path>) -> Result<Session, CoreError> {
        let document = storage::load_path(path, template)?;
        Ok(Session::new(document))
    }
}

impl Session {
    pub fn new(document: Document) -> Self {
        let capabilities = capabilities_of(&document);
        Self {
            document,
            capabilities,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn root(&self) -> &PropertyMap {
        &self.document.root
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn snapshot(&self) -> Snapshot {
        let root = self.root();
        let header = &self.document.header;
        Snapshot {
            save_game_class: header.save_game_class.clone(),
            engine_version: header.engine_label(),
            save_game_version: header.save_game_version,
            slot: character::slot_name(root),
            level: character::field(root, CharacterField::Level),
            ergo: character::field(root, CharacterField::Ergo),
            humanity_level: character::field(root, CharacterField::HumanityLevel),
            ng_plus: character::field(root, CharacterField::NewGamePlusRound),
            deaths: character::field(root, CharacterField::Deaths),
            play_time_seconds: character::play_time(root),
            starting_build: character::starting_build(root),
            lamp_attached: character::lamp_attached(root),
            item_count: inventory::list(root).len(),
            root_property_count: root.len(),
        }
    }

    pub fn to_bytes_unmodified(&self) -> Result<Vec<u8>, CoreError> {
        Ok(self.document.to_bytes_unmodified()?)
    }

    pub fn to_bytes_modified(&self) -> Result<Vec<u8>, CoreError> {
        Ok(self.document.to_bytes_modified()?)
    }

    pub fn export_json(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self.document.to_json())?)
    }

    /// Merge edited JSON (a full export or just `root`) onto this save.
    pub fn import_json(&mut self, edited: &Value) -> Result<(), CoreError> {
        let document = storage::import_json(&self.document, edited, None)?;
        *self = Self::new(document);
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), CoreError> {
        if self.capabilities.can_apply_edits {
            return Ok(());
        }
        Err(CoreError::new(
            CoreErrorCode::UnsupportedOperation,
            format!("save cannot be edited: {:?}", self.capabilities.issues),
        ))
    }

    /// Run `op` on a copy of the root and keep the copy only if it succeeds.
    fn edit<T>(
        &mut self,
        op: impl FnOnce(&mut PropertyMap) -> std::io::Result<T>,
    ) -> Result<T, CoreError> {
        self.ensure_editable()?;
        let mut staged = self.document.root.clone();
        let out = op(&mut staged)?;
        self.document.root = staged;
        Ok(out)
    }

    // Character

    pub fn character_fields(&self) -> Vec<CharacterEntry> {
        CharacterField::ALL
            .iter()
            .map(|field| CharacterEntry {
                name: field.name().to_string(),
                label: field.label().to_string(),
                value: character::field(self.root(), *field),
            })
            .collect()
    }

    pub fn set_character_field(&mut self, field: CharacterField, value: i64) -> Result<bool, CoreError> {
        self.edit(|root| character::set_field(root, field, value))
    }

    pub fn set_play_time(&mut self, seconds: f64) -> Result<bool, CoreError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(CoreError::new(
                CoreErrorCode::InvalidValue,
                format!("play time must be a non-negative number of seconds, got {seconds}"),
            ));
        }
        self.edit(|root| character::set_play_time(root, seconds))
    }

    pub fn set_starting_build(&mut self, build: StartingBuild) -> Result<bool, CoreError> {
        self.edit(|root| character::set_starting_build(root, build))
    }

    pub fn set_lamp_attached(&mut self, attached: bool) -> Result<bool, CoreError> {
        self.edit(|root| character::set_lamp_attached(root, attached))
    }

    pub fn set_slot_name(&mut self, slot: &SlotName) -> Result<bool, CoreError> {
        self.edit(|root| character::set_slot_name(root, slot))
    }

    // Stats

    pub fn primary_stats(&self) -> Vec<StatEntry> {
        stats::primary_all(self.root())
            .into_iter()
            .map(|(stat, value)| StatEntry {
                name: stat.as_str().to_lowercase(),
                label: stat.as_str().to_string(),
                value,
            })
            .collect()
    }

    pub fn secondary_stats(&self) -> Vec<StatEntry> {
        SecondaryStat::ALL
            .iter()
            .map(|stat| StatEntry {
                name: stat.name().to_string(),
                label: stat.as_str().to_string(),
                value: stats::secondary(self.root(), *stat),
            })
            .collect()
    }

    pub fn set_primary_stat(&mut self, stat: PrimaryStat, value: i64) -> Result<bool, CoreError> {
        self.edit(|root| stats::set_primary(root, stat, value))
    }

    pub fn set_secondary_stat(&mut self, stat: SecondaryStat, value: i64) -> Result<bool, CoreError> {
        self.edit(|root| stats::set_secondary(root, stat, value))
    }

    // Inventory

    pub fn inventory(&self) -> Vec<InventoryItem> {
        inventory::list(self.root())
    }

    pub fn set_item_count(&mut self, code: &str, count: i64) -> Result<bool, CoreError> {
        self.edit(|root| inventory::set_item_count(root, code, count))
    }

    pub fn add_item(&mut self, code: &str, count: i64) -> Result<AddOutcome, CoreError> {
        self.edit(|root| inventory::add_item(root, code, count))
    }

    pub fn remove_item(&mut self, code: &str) -> Result<usize, CoreError> {
        self.edit(|root| inventory::remove_item(root, code))
    }

    pub fn dedupe_inventory(&mut self) -> Result<DedupeReport, CoreError> {
        self.edit(inventory::dedupe)
    }

    pub fn export_inventory(&self) -> InventoryExport {
        inventory::export(self.root())
    }

    pub fn import_inventory(&mut self, export: &InventoryExport, replace: bool) -> Result<ImportReport, CoreError> {
        self.edit(|root| inventory::import(root, export, replace))
    }

    // Weapon builds

    pub fn builds(&self) -> Vec<WeaponBuild> {
        builds::list(self.root())
    }

    pub fn set_build(&mut self, index: usize, edit: &BuildEdit) -> Result<(), CoreError> {
        self.edit(|root| builds::set_build(root, index, edit))
    }

    pub fn new_build(&mut self, edit: &BuildEdit) -> Result<usize, CoreError> {
        self.edit(|root| builds::new_build(root, edit))
    }

    pub fn clone_build(&mut self, index: usize) -> Result<usize, CoreError> {
        self.edit(|root| builds::clone_build(root, index))
    }

    pub fn delete_build(&mut self, index: usize) -> Result<(), CoreError> {
        self.edit(|root| builds::delete_build(root, index))
    }

    // Currency

    pub fn currency(&self) -> Vec<CurrencyRow> {
        currency::rows(self.root())
    }

    pub fn boss_ergo_total(&self) -> i64 {
        currency::boss_total(self.root())
    }

    pub fn set_currency(&mut self, kind: &CurrencyKind, value: i64) -> Result<usize, CoreError> {
        self.edit(|root| currency::set(root, kind, value))
    }

    // Missions

    pub fn quests(&self) -> Vec<QuestRow> {
        missions::discover_quests(self.root())
    }

    pub fn apply_quest_edit(
        &mut self,
        index: usize,
        state: Option<QuestState>,
        progress: Option<(Option<FieldPath>, i64)>,
    ) -> Result<bool, CoreError> {
        self.edit(|root| missions::apply_quest_edit(root, index, state, progress))
    }

    pub fn export_quests(&self) -> QuestExport {
        missions::export_quests(self.root())
    }

    pub fn import_quests(
        &mut self,
        records: &[QuestRecord],
        add_missing: bool,
    ) -> Result<QuestImportReport, CoreError> {
        self.edit(|root| missions::import_quests(root, records, add_missing))
    }

    // Fast travel

    pub fn spots(&self) -> Vec<Spot> {
        fast_travel::list(self.root())
    }

    pub fn set_spot_state(&mut self, code: &str, state: StargazerState) -> Result<bool, CoreError> {
        self.edit(|root| fast_travel::set_spot_state(root, code, state))
    }

    pub fn position(&self) -> Position {
        fast_travel::position(self.root())
    }

    pub fn set_position(&mut self, edit: &PositionEdit) -> Result<usize, CoreError> {
        self.edit(|root| fast_travel::set_position(root, edit))
    }

    pub fn respawn(&self) -> Respawn {
        fast_travel::respawn(self.root())
    }

    pub fn set_respawn(
        &mut self,
        teleport: Option<&str>,
        torsion_coil: Option<&str>,
    ) -> Result<usize, CoreError> {
        self.edit(|root| fast_travel::set_respawn(root, teleport, torsion_coil))
    }

    pub fn level_names(&self) -> Vec<String> {
        fast_travel::level_names(self.root())
    }

    // Slots

    pub fn quick_slots(&self) -> Vec<QuickSlot> {
        slots::quick_slots(self.root())
    }

    pub fn set_quick_slots_unlocked(&mut self, unlocked: bool) -> Result<usize, CoreError> {
        self.edit(|root| slots::set_quick_slots_unlocked(root, unlocked))
    }

    pub fn set_quick_slot(
        &mut self,
        line: u8,
        index: i64,
        item: &str,
        unlocked: Option<bool>,
    ) -> Result<bool, CoreError> {
        self.edit(|root| slots::set_quick_slot(root, line, index, item, unlocked))
    }

    pub fn assist_slots(&self) -> Vec<AssistSlot> {
        slots::assist_slots(self.root())
    }

    pub fn set_assist_slot(&mut self, direction: AssistDirection, item: &str) -> Result<bool, CoreError> {
        self.edit(|root| slots::set_assist_slot(root, direction, item))
    }

    pub fn equip_slots(&self) -> Vec<EquipSlot> {
        slots::equip_slots(self.root())
    }

    pub fn set_equip_slots_unlocked(&mut self, unlocked: bool) -> Result<usize, CoreError> {
        self.edit(|root| slots::set_equip_slots_unlocked(root, unlocked))
    }

    pub fn set_equip_slot_unlocked(&mut self, slot: &str, unlocked: bool) -> Result<bool, CoreError> {
        self.edit(|root| slots::set_equip_slot_unlocked(root, slot, unlocked))
    }

    // Cheats

    pub fn run_cheats(&mut self, selection: &CheatSelection, dry_run: bool) -> Result<CheatReport, CoreError> {
        let report = self.edit(|root| {
            let mut report = CheatReport {
                dry_run,
                ..CheatReport::default()
            };
            if selection.godmode {
                report.godmode = Some(cheats::godmode(root, dry_run)?);
            }
            if selection.insane_stats {
                report.insane_stats = Some(cheats::insane_stats(root, dry_run)?);
            }
            if let Some(max) = selection.max_currency {
                report.max_currency = Some(cheats::max_currency(
                    root,
                    max,
                    selection.create_missing_currency,
                    dry_run,
                )?);
            }
            if selection.unlock_locations {
                report.unlock_locations = Some(cheats::unlock_all_locations(root, dry_run)?);
            }
            if selection.auto_plat {
                let achievements = cheats::auto_plat_achievements(root, dry_run);
                if !achievements.found {
                    log::warn!("no achievement blocks found in save");
                }
                report.achievements = Some(achievements);
            }
            Ok(report)
        })?;
        log::info!(
            "cheats {}: {} field(s)",
            if dry_run { "would change" } else { "changed" },
            report.total()
        );
        Ok(report)
    }
}

fn capabilities_of(document: &Document) -> Capabilities {
    let mut issues = Vec::new();
    if !document.roundtrip_exact() {
        issues.push(CapabilityIssue::InexactRoundTrip);
    }
    if document.raw_property_count() > 0 {
        issues.push(CapabilityIssue::RawPayloads);
    }
    let has_character = document
        .root
        .get(CHARACTER_SAVE_DATA)
        .and_then(PropertyValue::as_struct)
        .is_some();
    if !has_character {
        issues.push(CapabilityIssue::MissingCharacter);
    }
    Capabilities::from_issues(issues)
}
