//! Quick-use belts, the assist radial and equip slot locks.

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::inventory::{self, CHARACTER_ITEM, code_of};
use super::{
    bool_of, character, character_mut, int_of, invalid_input, not_found, text_of, write_bool,
    write_int, write_text,
};
use crate::gvas::{Element, PropertyMap, PropertyValue, StructValue};

pub const USE_SLOT_DATA: &str = "UseSlotData_0";
pub const USE_SLOT_LINES: [&str; 2] = ["UseSlots1_0", "UseSlots2_0"];
pub const ASSIST_SLOT: &str = "AssistUseSlot_0";
pub const ASSIST_SLOTS: &str = "AssistUseSlots_0";
pub const EQUIP_SLOT_SAVES: &str = "EquipSlotSaveDatas_0";

const SLOT_INDEX: &str = "SlotIndex_0";
const ITEM_CODE: &str = "ItemCodeName_0";
const UNLOCK: &str = "bUnlock_0";
const EQUIP_SLOT_TYPE: &str = "EquipSlotType_0";
const ITEM_LINE_INDEX: [&str; 2] = ["UseItemSlotIndexFirst_0", "UseItemSlotIndexSecond_0"];
const EMPTY_ITEM: &str = "None";

/// Slots per quick-use line.
pub const LINE_SLOTS: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuickSlot {
    /// 1 or 2.
    pub line: u8,
    pub index: i64,
    pub item: String,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssistDirection {
    Up,
    Down,
    Left,
    Right,
}

impl AssistDirection {
    pub const ALL: [AssistDirection; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Left => "Left",
            Self::Right => "Right",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        let tail = key.rsplit_once("::").map_or(key, |(_, t)| t);
        Self::ALL.into_iter().find(|d| d.as_str() == tail)
    }
}

impl fmt::Display for AssistDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssistDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown assist direction '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistSlot {
    pub direction: AssistDirection,
    pub item: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquipSlot {
    pub slot: String,
    pub unlocked: bool,
}

fn struct_list<'a>(map: &'a PropertyMap, key: &str) -> impl Iterator<Item = &'a PropertyMap> {
    map.get(key)
        .and_then(PropertyValue::as_struct_array)
        .into_iter()
        .flatten()
        .filter_map(StructValue::as_properties)
}

fn struct_list_mut<'a>(
    map: &'a mut PropertyMap,
    key: &str,
) -> impl Iterator<Item = &'a mut PropertyMap> {
    map.get_mut(key)
        .and_then(PropertyValue::as_struct_array_mut)
        .into_iter()
        .flatten()
        .filter_map(StructValue::as_properties_mut)
}

fn use_slots(root: &PropertyMap) -> Option<&PropertyMap> {
    character(root)?.get(USE_SLOT_DATA)?.as_struct()
}

fn use_slots_mut(root: &mut PropertyMap) -> io::Result<&mut PropertyMap> {
    character_mut(root)?
        .get_mut(USE_SLOT_DATA)
        .and_then(PropertyValue::as_struct_mut)
        .ok_or_else(|| not_found(USE_SLOT_DATA))
}

fn equip_saves_owner_mut(root: &mut PropertyMap) -> io::Result<&mut PropertyMap> {
    character_mut(root)?
        .get_mut(CHARACTER_ITEM)
        .and_then(PropertyValue::as_struct_mut)
        .ok_or_else(|| not_found(CHARACTER_ITEM))
}

pub fn quick_slots(root: &PropertyMap) -> Vec<QuickSlot> {
    let Some(block) = use_slots(root) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (line, key) in (1u8..).zip(USE_SLOT_LINES) {
        out.extend(struct_list(block, key).map(|slot| QuickSlot {
            line,
            index: int_of(slot, SLOT_INDEX).unwrap_or(-1),
            item: text_of(slot, ITEM_CODE)
                .filter(|s| !s.is_empty())
                .unwrap_or(EMPTY_ITEM)
                .to_string(),
            unlocked: bool_of(slot, UNLOCK).unwrap_or(false),
        }));
    }
    out
}

/// Lock or unlock every quick-use slot. Returns the number of slots changed.
pub fn set_quick_slots_unlocked(root: &mut PropertyMap, unlocked: bool) -> io::Result<usize> {
    let block = use_slots_mut(root)?;
    let mut changed = 0;
    for key in USE_SLOT_LINES {
        for slot in struct_list_mut(block, key) {
            changed += usize::from(write_bool(slot, UNLOCK, unlocked));
        }
    }
    Ok(changed)
}

/// Put an item (or `None`) into a quick-use slot. The per-item line index on
/// inventory rows follows: whichever row pointed at the slot is cleared and
/// the chosen item's row is pointed at it.
pub fn set_quick_slot(
    root: &mut PropertyMap,
    line: u8,
    index: i64,
    item: &str,
    unlocked: Option<bool>,
) -> io::Result<bool> {
    if !(1..=2).contains(&line) {
        return Err(invalid_input(format!("quick-use line must be 1 or 2, got {line}")));
    }
    if !(0..LINE_SLOTS).contains(&index) {
        return Err(invalid_input(format!("quick-use slot must be 0..{LINE_SLOTS}, got {index}")));
    }
    let item = match item.trim() {
        "" => EMPTY_ITEM,
        code => code,
    };
    let line_key = USE_SLOT_LINES[usize::from(line - 1)];

    let slot = struct_list_mut(use_slots_mut(root)?, line_key)
        .find(|s| int_of(s, SLOT_INDEX) == Some(index))
        .ok_or_else(|| not_found(&format!("{line_key}[{index}]")))?;
    let mut changed = write_text(slot, ITEM_CODE, item);
    if let Some(unlocked) = unlocked {
        changed |= write_bool(slot, UNLOCK, unlocked);
    }

    let field = ITEM_LINE_INDEX[usize::from(line - 1)];
    if let Ok(items) = inventory::entries_mut(root) {
        let rows = items.iter_mut().filter_map(StructValue::as_properties_mut);
        let mut claimed = false;
        for row in rows {
            if int_of(row, field) == Some(index) {
                changed |= write_int(row, field, -1);
            }
            if !claimed && item != EMPTY_ITEM && code_of(row) == item {
                changed |= write_int(row, field, index);
                claimed = true;
            }
        }
    }
    Ok(changed)
}

fn assist_entries(root: &PropertyMap) -> Option<&Vec<crate::gvas::MapEntry>> {
    let block = character(root)?.get(ASSIST_SLOT)?.as_struct()?;
    match block.get(ASSIST_SLOTS)? {
        PropertyValue::Map { entries, .. } => Some(entries),
        _ => None,
    }
}

fn element_map(element: &Element) -> Option<&PropertyMap> {
    match element {
        Element::Struct(s) => s.as_properties(),
        _ => None,
    }
}

pub fn assist_slots(root: &PropertyMap) -> Vec<AssistSlot> {
    assist_entries(root)
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let direction = entry.key.as_str().and_then(AssistDirection::from_key)?;
            let item = element_map(&entry.value)
                .and_then(|m| text_of(m, ITEM_CODE))
                .unwrap_or(EMPTY_ITEM)
                .to_string();
            Some(AssistSlot { direction, item })
        })
        .collect()
}

/// Set the item on one assist direction. The direction must already exist.
pub fn set_assist_slot(root: &mut PropertyMap, direction: AssistDirection, item: &str) -> io::Result<bool> {
    let item = match item.trim() {
        "" => EMPTY_ITEM,
        code => code,
    };
    let entries = character_mut(root)?
        .get_mut(ASSIST_SLOT)
        .and_then(PropertyValue::as_struct_mut)
        .and_then(|block| match block.get_mut(ASSIST_SLOTS) {
            Some(PropertyValue::Map { entries, .. }) => Some(entries),
            _ => None,
        })
        .ok_or_else(|| not_found(ASSIST_SLOTS))?;
    let value = entries
        .iter_mut()
        .find(|e| e.key.as_str().and_then(AssistDirection::from_key) == Some(direction))
        .and_then(|e| match &mut e.value {
            Element::Struct(s) => s.as_properties_mut(),
            _ => None,
        })
        .ok_or_else(|| not_found(&format!("assist slot {direction}")))?;
    Ok(write_text(value, ITEM_CODE, item))
}

pub fn equip_slots(root: &PropertyMap) -> Vec<EquipSlot> {
    let Some(owner) = character(root)
        .and_then(|ch| ch.get(CHARACTER_ITEM))
        .and_then(PropertyValue::as_struct)
    else {
        return Vec::new();
    };
    struct_list(owner, EQUIP_SLOT_SAVES)
        .map(|s| EquipSlot {
            slot: text_of(s, EQUIP_SLOT_TYPE)
                .unwrap_or(inventory::SLOT_NONE)
                .to_string(),
            unlocked: bool_of(s, UNLOCK).unwrap_or(false),
        })
        .collect()
}

/// Lock or unlock every equip slot. Returns the number of slots changed.
pub fn set_equip_slots_unlocked(root: &mut PropertyMap, unlocked: bool) -> io::Result<usize> {
    let owner = equip_saves_owner_mut(root)?;
    if !owner.contains(EQUIP_SLOT_SAVES) {
        return Err(not_found(EQUIP_SLOT_SAVES));
    }
    Ok(struct_list_mut(owner, EQUIP_SLOT_SAVES)
        .map(|s| usize::from(write_bool(s, UNLOCK, unlocked)))
        .sum())
}

/// Lock or unlock one equip slot by its enum label (namespace optional).
pub fn set_equip_slot_unlocked(root: &mut PropertyMap, slot: &str, unlocked: bool) -> io::Result<bool> {
    let wanted = slot.trim();
    let owner = equip_saves_owner_mut(root)?;
    let entry = struct_list_mut(owner, EQUIP_SLOT_SAVES)
        .find(|s| {
            text_of(s, EQUIP_SLOT_TYPE).is_some_and(|label| {
                label.eq_ignore_ascii_case(wanted)
                    || label
                        .rsplit_once("::")
                        .is_some_and(|(_, tail)| tail.eq_ignore_ascii_case(wanted))
            })
        })
        .ok_or_else(|| not_found(&format!("equip slot '{slot}'")))?;
    Ok(write_bool(entry, UNLOCK, unlocked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvas::{ArrayValue, Guid, MapEntry};
    use crate::profile::CHARACTER_SAVE_DATA;
    use crate::profile::inventory::{FIRST_CODE, PLAYER_ITEMS};

    fn strukt(map: PropertyMap) -> PropertyValue {
        PropertyValue::Struct {
            struct_name: "Generic".into(),
            struct_guid: Guid::ZERO,
            value: StructValue::Properties(map),
        }
    }

    fn array(key: &str, elements: Vec<PropertyMap>) -> PropertyValue {
        PropertyValue::Array {
            inner_type: "StructProperty".into(),
            value: ArrayValue::Struct {
                field_name: key.into(),
                struct_name: "Generic".into(),
                struct_guid: Guid::ZERO,
                elements: elements.into_iter().map(StructValue::Properties).collect(),
            },
        }
    }

    fn quick(index: i32, item: &str) -> PropertyMap {
        let mut m = PropertyMap::new();
        m.insert(SLOT_INDEX, PropertyValue::Int(index));
        m.insert(ITEM_CODE, PropertyValue::Name(Some(item.into())));
        m.insert(UNLOCK, PropertyValue::Bool(index == 0));
        m
    }

    fn root() -> PropertyMap {
        let mut use_block = PropertyMap::new();
        use_block.insert(USE_SLOT_LINES[0], array(USE_SLOT_LINES[0], (0..5).map(|i| quick(i, "None")).collect()));
        use_block.insert(USE_SLOT_LINES[1], array(USE_SLOT_LINES[1], (0..5).map(|i| quick(i, "None")).collect()));

        let mut assist_value = PropertyMap::new();
        assist_value.insert(ITEM_CODE, PropertyValue::Name(Some("None".into())));
        let mut assist = PropertyMap::new();
        assist.insert(
            ASSIST_SLOTS,
            PropertyValue::Map {
                key_type: "EnumProperty".into(),
                value_type: "StructProperty".into(),
                entries: vec![MapEntry {
                    key: Element::Enum(Some("ELAssistSlotDirection::Up".into())),
                    value: Element::Struct(StructValue::Properties(assist_value)),
                }],
            },
        );

        let mut heal = PropertyMap::new();
        heal.insert(FIRST_CODE, PropertyValue::Name(Some("Consume_Heal_01".into())));
        heal.insert(ITEM_LINE_INDEX[0], PropertyValue::Int(-1));
        let mut old = PropertyMap::new();
        old.insert(FIRST_CODE, PropertyValue::Name(Some("Consume_Throw_Fire".into())));
        old.insert(ITEM_LINE_INDEX[0], PropertyValue::Int(2));

        let mut equip = PropertyMap::new();
        equip.insert(
            EQUIP_SLOT_TYPE,
            PropertyValue::Enum {
                enum_name: "ELEquipSlotType".into(),
                value: Some("ELEquipSlotType::E_WEAPON_MAIN_1".into()),
            },
        );
        equip.insert(UNLOCK, PropertyValue::Bool(false));

        let mut items = PropertyMap::new();
        items.insert(PLAYER_ITEMS, array(PLAYER_ITEMS, vec![heal, old]));
        items.insert(EQUIP_SLOT_SAVES, array(EQUIP_SLOT_SAVES, vec![equip]));

        let mut ch = PropertyMap::new();
        ch.insert(USE_SLOT_DATA, strukt(use_block));
        ch.insert(ASSIST_SLOT, strukt(assist));
        ch.insert(CHARACTER_ITEM, strukt(items));
        let mut root = PropertyMap::new();
        root.insert(CHARACTER_SAVE_DATA, strukt(ch));
        root
    }

    #[test]
    fn unlocking_counts_changes() {
        let mut root = root();
        assert_eq!(quick_slots(&root).len(), 10);
        assert_eq!(set_quick_slots_unlocked(&mut root, true).unwrap(), 8);
        assert_eq!(set_quick_slots_unlocked(&mut root, true).unwrap(), 0);
        assert_eq!(set_equip_slots_unlocked(&mut root, true).unwrap(), 1);
        assert!(equip_slots(&root)[0].unlocked);
        assert!(set_equip_slot_unlocked(&mut root, "e_weapon_main_1", false).unwrap());
    }

    #[test]
    fn quick_slot_assignment_moves_item_index() {
        let mut root = root();
        assert!(set_quick_slot(&mut root, 1, 2, "Consume_Heal_01", Some(true)).unwrap());
        let slot = quick_slots(&root).into_iter().find(|s| s.line == 1 && s.index == 2).unwrap();
        assert_eq!(slot.item, "Consume_Heal_01");
        assert!(slot.unlocked);

        let items = inventory::entries(&root).unwrap();
        let idx = |i: usize| int_of(items[i].as_properties().unwrap(), ITEM_LINE_INDEX[0]);
        assert_eq!(idx(0), Some(2));
        assert_eq!(idx(1), Some(-1));

        assert!(set_quick_slot(&mut root, 3, 0, "x", None).is_err());
        assert!(set_quick_slot(&mut root, 1, 5, "x", None).is_err());
    }

    #[test]
    fn assist_radial_edits() {
        let mut root = root();
        assert!(set_assist_slot(&mut root, AssistDirection::Up, "Consume_Heal_01").unwrap());
        assert_eq!(
            assist_slots(&root),
            vec![AssistSlot {
                direction: AssistDirection::Up,
                item: "Consume_Heal_01".into()
            }]
        );
        assert!(set_assist_slot(&mut root, AssistDirection::Left, "x").is_err());
    }
}
