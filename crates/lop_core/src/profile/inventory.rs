use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize, Serializer};

use super::path::{FieldPath, NodeMut, NodeRef, find_struct_array, resolve, resolve_mut};
use super::{
    CHARACTER_SAVE_DATA, bool_of, int_of, invalid_input, not_found, text_of, write_bool, write_int,
    write_text,
};
use crate::gvas::{PropertyMap, PropertyValue, StructValue};

pub const CHARACTER_ITEM: &str = "CharacterItem_0";
pub const PLAYER_ITEMS: &str = "PlayerItems_0";
pub const FIRST_CODE: &str = "FirstCodeName_0";
pub const SECOND_CODE: &str = "SecondCodeName_0";
pub const COUNT: &str = "Count_0";
pub const EQUIP_SLOT: &str = "EquipItemSlotType_0";
pub const IS_WEAPON: &str = "bIsWeapon_0";
pub const SHARPNESS: &str = "SharpnessPoint_0";
pub const UNIQUE_ID: &str = "UniqueId_0";

pub const SLOT_ENUM: &str = "ELEquipSlotType";
pub const SLOT_NONE: &str = "ELEquipSlotType::E_NONE";
pub const INVENTORY_FORMAT: &str = "lop-inventory-v1";

const MAX_COUNT: i64 = i32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemCategory {
    Weapons,
    Consumables,
    Materials,
    KeysLore,
    Cosmetics,
    Other(String),
}

impl ItemCategory {
    /// Category from the item code prefix.
    pub fn of(code: &str) -> Self {
        if code.is_empty() {
            return Self::Other("Items".to_string());
        }
        let c = code.to_lowercase();
        let starts = |prefixes: &[&str]| prefixes.iter().any(|p| c.starts_with(p));
        if starts(&[
            "wp_", "weapon_", "handle_", "blade_", "grinder_", "venigni", "legionplug", "slavearm",
        ]) {
            return Self::Weapons;
        }
        if starts(&["consume_", "throw_", "grenade", "monard", "buff_"]) {
            return Self::Consumables;
        }
        if starts(&[
            "reinforce_",
            "quartz",
            "exchange_",
            "plug_",
            "material",
            "infusionstone",
            "venignicoin",
        ]) {
            return Self::Materials;
        }
        if starts(&[
            "collection_", "letter_", "key_", "map_", "record_", "journal_", "note_", "lore_",
        ]) {
            return Self::KeysLore;
        }
        if starts(&["hatcostume_", "head_", "mask_", "costume_", "gesture_"]) {
            return Self::Cosmetics;
        }
        let prefix = c.split('_').next().unwrap_or_default();
        match prefix {
            "wp" | "weapon" | "slavearm" => Self::Weapons,
            "mask" | "costume" | "hatcostume" | "head" | "gesture" => Self::Cosmetics,
            other => Self::Other(title_case(other)),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Weapons => "Weapons",
            Self::Consumables => "Consumables",
            Self::Materials => "Materials",
            Self::KeysLore => "Keys/Lore",
            Self::Cosmetics => "Cosmetics",
            Self::Other(label) => label,
        }
    }

    pub fn is_stackable(&self) -> bool {
        matches!(self, Self::Consumables | Self::Materials)
    }

    /// Categories that can be created as plain inventory rows.
    pub fn is_addable(&self) -> bool {
        matches!(
            self,
            Self::Consumables | Self::Materials | Self::KeysLore | Self::Cosmetics
        )
    }
}

impl fmt::Display for ItemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ItemCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CountKind {
    #[default]
    Int,
    Int64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryItem {
    pub index: usize,
    pub code: String,
    pub second_code: Option<String>,
    pub count: i64,
    pub count_kind: CountKind,
    pub slot: String,
    pub is_weapon: bool,
    pub sharpness: Option<i64>,
    pub unique_id: Option<i64>,
    pub category: ItemCategory,
}

impl InventoryItem {
    pub fn is_equipped(&self) -> bool {
        !slot_is_none(&self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AddOutcome {
    Created,
    Incremented { count: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DedupeReport {
    pub before: usize,
    pub after: usize,
    pub merged_stacks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub code: String,
    #[serde(default)]
    pub second_code: String,
    #[serde(default = "default_slot")]
    pub slot: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub count_type: CountKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryExport {
    pub format: String,
    pub items: Vec<InventoryRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub merged: usize,
}

fn default_slot() -> String {
    SLOT_NONE.to_string()
}

/// Matching key for item codes: trimmed, trailing commas dropped, lowercase.
pub fn item_key(code: &str) -> String {
    code.trim().trim_end_matches(',').to_lowercase()
}

/// Location of the player's item array.
pub fn items_path(root: &PropertyMap) -> Option<FieldPath> {
    let mut preferred = FieldPath::new();
    preferred.push_key(CHARACTER_SAVE_DATA);
    preferred.push_key(CHARACTER_ITEM);
    preferred.push_key(PLAYER_ITEMS);

    let mut fallback = FieldPath::new();
    fallback.push_key(CHARACTER_ITEM);
    fallback.push_key(PLAYER_ITEMS);

    [preferred, fallback]
        .into_iter()
        .find(|p| is_struct_array(root, p))
        .or_else(|| find_struct_array(root, PLAYER_ITEMS))
}

fn is_struct_array(root: &PropertyMap, path: &FieldPath) -> bool {
    matches!(
        resolve(root, path),
        Some(NodeRef::Value(v)) if v.as_struct_array().is_some()
    )
}

pub(crate) fn entries(root: &PropertyMap) -> Option<&Vec<StructValue>> {
    let path = items_path(root)?;
    match resolve(root, &path)? {
        NodeRef::Value(v) => v.as_struct_array(),
        _ => None,
    }
}

pub(crate) fn entries_mut(root: &mut PropertyMap) -> io::Result<&mut Vec<StructValue>> {
    let path = items_path(root).ok_or_else(|| not_found(PLAYER_ITEMS))?;
    let items = match resolve_mut(root, &path) {
        Some(NodeMut::Value(v)) => v.as_struct_array_mut(),
        _ => None,
    };
    items.ok_or_else(|| not_found(PLAYER_ITEMS))
}

pub(crate) fn code_of(entry: &PropertyMap) -> &str {
    text_of(entry, FIRST_CODE).unwrap_or_default()
}

pub(crate) fn is_weapon(entry: &PropertyMap) -> bool {
    bool_of(entry, IS_WEAPON) == Some(true)
}

pub(crate) fn count_of(entry: &PropertyMap) -> (i64, CountKind) {
    match entry.get(COUNT) {
        Some(PropertyValue::Int64(v)) => (*v, CountKind::Int64),
        Some(other) => (other.as_i64().unwrap_or(0), CountKind::Int),
        None => (0, CountKind::Int),
    }
}

/// Replace the count with the given width, creating it when missing.
pub(crate) fn write_count(entry: &mut PropertyMap, value: i64, kind: CountKind) -> bool {
    let next = match kind {
        CountKind::Int64 => PropertyValue::Int64(value),
        CountKind::Int => PropertyValue::Int(super::clamp_i32(value)),
    };
    if entry.get(COUNT) == Some(&next) {
        return false;
    }
    entry.insert(COUNT, next);
    true
}

/// Equip slot enum value, `E_NONE` when the entry has none.
pub(crate) fn slot_of(entry: &PropertyMap) -> &str {
    entry
        .iter()
        .filter_map(|p| p.value.as_enum())
        .find(|v| v.starts_with("ELEquipSlotType::"))
        .unwrap_or(SLOT_NONE)
}

fn slot_is_none(slot: &str) -> bool {
    slot.to_ascii_uppercase().ends_with("E_NONE")
}

fn set_slot_if_empty(entry: &mut PropertyMap, slot: &str) -> bool {
    if slot_is_none(slot) || !slot_is_none(slot_of(entry)) {
        return false;
    }
    let key = entry
        .iter()
        .find(|p| {
            p.value
                .as_enum()
                .is_some_and(|v| v.starts_with("ELEquipSlotType::"))
        })
        .map(|p| p.name.clone())
        .unwrap_or_else(|| EQUIP_SLOT.to_string());
    set_slot(entry, &key, slot)
}

fn set_slot(entry: &mut PropertyMap, key: &str, slot: &str) -> bool {
    if entry.get(key).and_then(PropertyValue::as_enum).is_some() {
        return write_text(entry, key, slot);
    }
    entry.insert(
        key,
        PropertyValue::Enum {
            enum_name: SLOT_ENUM.to_string(),
            value: Some(slot.to_string()),
        },
    );
    true
}

pub fn list(root: &PropertyMap) -> Vec<InventoryItem> {
    let Some(items) = entries(root) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, e)| e.as_properties().map(|p| (index, p)))
        .map(|(index, entry)| {
            let code = code_of(entry).to_string();
            let (count, count_kind) = count_of(entry);
            InventoryItem {
                index,
                category: ItemCategory::of(code.trim()),
                second_code: text_of(entry, SECOND_CODE)
                    .filter(|s| !s.is_empty() && *s != "None")
                    .map(str::to_string),
                count,
                count_kind,
                slot: slot_of(entry).to_string(),
                is_weapon: is_weapon(entry),
                sharpness: int_of(entry, SHARPNESS),
                unique_id: int_of(entry, UNIQUE_ID),
                code,
            }
        })
        .collect()
}

/// Set the count of the first non-weapon entry with this code.
pub fn set_item_count(root: &mut PropertyMap, code: &str, count: i64) -> io::Result<bool> {
    let key = item_key(code);
    let entry = entries_mut(root)?
        .iter_mut()
        .filter_map(StructValue::as_properties_mut)
        .find(|e| !is_weapon(e) && item_key(code_of(e)) == key)
        .ok_or_else(|| not_found(&format!("item '{code}'")))?;
    let (_, kind) = count_of(entry);
    Ok(write_count(entry, count.clamp(0, MAX_COUNT), kind))
}

/// Add `count` of an item: an existing stack grows, otherwise a new row is
/// cloned from a template entry.
pub fn add_item(root: &mut PropertyMap, code: &str, count: i64) -> io::Result<AddOutcome> {
    let code = code.trim().trim_end_matches(',');
    if code.is_empty() {
        return Err(invalid_input("item code must not be empty"));
    }
    let category = ItemCategory::of(code);
    if !category.is_addable() {
        return Err(invalid_input(format!(
            "'{code}' is a {category} entry and cannot be added as an inventory item"
        )));
    }
    let count = count.clamp(1, MAX_COUNT);
    let key = item_key(code);
    let items = entries_mut(root)?;

    if let Some(entry) = items
        .iter_mut()
        .filter_map(StructValue::as_properties_mut)
        .find(|e| !is_weapon(e) && item_key(code_of(e)) == key)
    {
        let (current, kind) = count_of(entry);
        let next = if current < 1 { count } else { (current + count).min(MAX_COUNT) };
        write_count(entry, next, kind);
        return Ok(AddOutcome::Incremented { count: next });
    }

    push_new_entry(items, code, count);
    log::debug!("added inventory row for {code}");
    Ok(AddOutcome::Created)
}

/// Remove every non-weapon entry with this code.
pub fn remove_item(root: &mut PropertyMap, code: &str) -> io::Result<usize> {
    let key = item_key(code);
    let items = entries_mut(root)?;
    let before = items.len();
    items.retain(|e| {
        e.as_properties()
            .is_none_or(|p| is_weapon(p) || item_key(code_of(p)) != key)
    });
    let removed = before - items.len();
    if removed == 0 {
        return Err(not_found(&format!("item '{code}'")));
    }
    Ok(removed)
}

/// Append a fresh row for `code`, cloned from a template of its category.
pub(crate) fn push_new_entry(items: &mut Vec<StructValue>, code: &str, count: i64) {
    let category = ItemCategory::of(code);
    let unique_id = next_unique_id(items);
    let entry = new_entry(items, code, &category, count, CountKind::Int, unique_id);
    items.push(StructValue::Properties(entry));
}

fn next_unique_id(items: &[StructValue]) -> i64 {
    items
        .iter()
        .filter_map(StructValue::as_properties)
        .filter_map(|e| int_of(e, UNIQUE_ID))
        .fold(0, i64::max)
        + 1
}

fn pick_template<'a>(items: &'a [StructValue], category: &ItemCategory) -> Option<&'a PropertyMap> {
    let plain = || {
        items
            .iter()
            .filter_map(StructValue::as_properties)
            .filter(|e| !is_weapon(e))
    };
    plain()
        .find(|e| {
            let code = code_of(e);
            !code.is_empty() && ItemCategory::of(code) == *category
        })
        .or_else(|| plain().next())
}

fn new_entry(
    templates: &[StructValue],
    code: &str,
    category: &ItemCategory,
    count: i64,
    fallback_kind: CountKind,
    unique_id: i64,
) -> PropertyMap {
    let template = pick_template(templates, category);
    let mut entry = template.cloned().unwrap_or_default();
    let kind = if template.is_some_and(|t| t.contains(COUNT)) {
        count_of(&entry).1
    } else {
        fallback_kind
    };

    write_text(&mut entry, FIRST_CODE, code);
    write_count(&mut entry, count, kind);
    set_slot(&mut entry, EQUIP_SLOT, SLOT_NONE);
    if entry.contains(UNIQUE_ID) {
        write_int(&mut entry, UNIQUE_ID, unique_id);
    }
    if entry.contains(IS_WEAPON) {
        write_bool(&mut entry, IS_WEAPON, false);
    }
    entry.remove(SECOND_CODE);
    entry
}

struct Stack {
    position: usize,
    total: i64,
    kind: CountKind,
    slot: String,
    members: usize,
}

/// Merge duplicate stacks of consumables and materials and drop exact clones
/// of everything else. First-seen order is kept.
pub fn dedupe(root: &mut PropertyMap) -> io::Result<DedupeReport> {
    let items = entries_mut(root)?;
    let before = items.len();

    let mut stacks: HashMap<String, Stack> = HashMap::new();
    let mut seen: HashSet<(String, String, i64, i64)> = HashSet::new();
    let mut kept: Vec<StructValue> = Vec::with_capacity(before);

    for entry in std::mem::take(items) {
        let Some(props) = entry.as_properties() else {
            kept.push(entry);
            continue;
        };
        let code = code_of(props).to_string();
        let key = item_key(&code);
        if key.is_empty() {
            kept.push(entry);
            continue;
        }
        let (count, kind) = count_of(props);
        let slot = slot_of(props).to_string();

        if ItemCategory::of(code.trim()).is_stackable() && !is_weapon(props) {
            match stacks.get_mut(&key) {
                Some(stack) => {
                    stack.total = stack.total.saturating_add(count);
                    stack.members += 1;
                    if kind == CountKind::Int64 {
                        stack.kind = CountKind::Int64;
                    }
                    if slot_is_none(&stack.slot) && !slot_is_none(&slot) {
                        stack.slot = slot;
                    }
                }
                None => {
                    stacks.insert(
                        key,
                        Stack {
                            position: kept.len(),
                            total: count,
                            kind,
                            slot,
                            members: 1,
                        },
                    );
                    kept.push(entry);
                }
            }
        } else {
            let ident = (
                key,
                item_key(text_of(props, SECOND_CODE).unwrap_or_default()),
                int_of(props, SHARPNESS).unwrap_or(0),
                int_of(props, UNIQUE_ID).unwrap_or(0),
            );
            if seen.insert(ident) {
                kept.push(entry);
            }
        }
    }

    let mut merged_stacks = 0;
    for stack in stacks.values().filter(|s| s.members > 1) {
        if let Some(props) = kept[stack.position].as_properties_mut() {
            write_count(props, stack.total, stack.kind);
            set_slot_if_empty(props, &stack.slot);
            merged_stacks += 1;
        }
    }

    let after = kept.len();
    *items = kept;
    if after != before {
        log::info!("inventory dedupe: {before} -> {after} entries");
    }
    Ok(DedupeReport {
        before,
        after,
        merged_stacks,
    })
}

pub fn export(root: &PropertyMap) -> InventoryExport {
    let items = entries(root)
        .map(|items| {
            items
                .iter()
                .filter_map(StructValue::as_properties)
                .map(|entry| {
                    let (count, count_type) = count_of(entry);
                    InventoryRecord {
                        code: code_of(entry).to_string(),
                        second_code: text_of(entry, SECOND_CODE).unwrap_or_default().to_string(),
                        slot: slot_of(entry).to_string(),
                        count,
                        count_type,
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    InventoryExport {
        format: INVENTORY_FORMAT.to_string(),
        items,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ImportKey {
    Code(String),
    Build(String, String, Option<i64>),
}

fn import_key(entry: &PropertyMap) -> ImportKey {
    if is_weapon(entry) {
        ImportKey::Build(
            item_key(code_of(entry)),
            item_key(text_of(entry, SECOND_CODE).unwrap_or_default()),
            int_of(entry, UNIQUE_ID),
        )
    } else {
        ImportKey::Code(item_key(code_of(entry)))
    }
}

/// Apply an inventory export. Matching rows have the imported count added.
/// With `replace` the item list is cleared first, so the result holds exactly
/// the exported rows at their exported counts; entries of the previous list
/// still serve as templates for the rebuilt rows.
pub fn import(
    root: &mut PropertyMap,
    export: &InventoryExport,
    replace: bool,
) -> io::Result<ImportReport> {
    if export.format != INVENTORY_FORMAT {
        log::warn!(
            "inventory import format '{}' differs from {INVENTORY_FORMAT}",
            export.format
        );
    }
    let items = entries_mut(root)?;
    let templates = items.clone();
    if replace {
        items.clear();
    }

    let mut by_key: HashMap<ImportKey, usize> = items
        .iter()
        .enumerate()
        .filter_map(|(i, e)| e.as_properties().map(|p| (import_key(p), i)))
        .collect();
    let mut report = ImportReport::default();

    for record in &export.items {
        let code = record.code.trim();
        if code.is_empty() {
            continue;
        }
        let second = record.second_code.trim();
        let slot = record.slot.trim();
        let key = if second.is_empty() {
            ImportKey::Code(item_key(code))
        } else {
            ImportKey::Build(item_key(code), item_key(second), None)
        };

        match by_key.get(&key).and_then(|&i| items[i].as_properties_mut()) {
            Some(entry) => {
                let (current, mut kind) = count_of(entry);
                let total = current.max(0).saturating_add(record.count.max(0));
                if kind == CountKind::Int && total > MAX_COUNT {
                    kind = CountKind::Int64;
                }
                write_count(entry, total, kind);
                if slot.starts_with("ELEquipSlotType::") {
                    set_slot_if_empty(entry, slot);
                }
                report.merged += 1;
            }
            None => {
                let category = ItemCategory::of(code);
                let unique_id = next_unique_id(items).max(next_unique_id(&templates));
                let mut entry = new_entry(
                    &templates,
                    code,
                    &category,
                    record.count.max(0),
                    record.count_type,
                    unique_id,
                );
                write_count(&mut entry, record.count.max(0), record.count_type);
                if !second.is_empty() {
                    write_text(&mut entry, SECOND_CODE, second);
                    write_bool(&mut entry, IS_WEAPON, true);
                }
                if slot.starts_with("ELEquipSlotType::") {
                    set_slot(&mut entry, EQUIP_SLOT, slot);
                }
                by_key.insert(key, items.len());
                items.push(StructValue::Properties(entry));
                report.created += 1;
            }
        }
    }
    Ok(report)
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut boundary = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if boundary {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            boundary = false;
        } else {
            out.push(c);
            boundary = true;
        }
    }
    out
}
