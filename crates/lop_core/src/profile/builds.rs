use std::io;

use serde::{Deserialize, Serialize};

use super::inventory::{
    EQUIP_SLOT, FIRST_CODE, SECOND_CODE, SHARPNESS, SLOT_ENUM, SLOT_NONE, UNIQUE_ID, entries,
    entries_mut,
};
use super::{int_of, invalid_input, text_of, write_int, write_text};
use crate::gvas::{PropertyMap, PropertyValue, StructValue};

pub const HANDLE_PREFIX: &str = "WP_PC_HND_";
pub const BLADE_PREFIX: &str = "WP_PC_BLD_";

#[rustfmt::skip]
pub const EQUIP_SLOTS: &[&str] = &[
    "ELEquipSlotType::E_NONE",
    "ELEquipSlotType::E_WEAPON_1",
    "ELEquipSlotType::E_WEAPON_2",
    "ELEquipSlotType::E_WEAPON_3",
    "ELEquipSlotType::E_SLAVEARM",
    "ELEquipSlotType::E_SLAVEARM_2",
    "ELEquipSlotType::E_GEAR_EAR_1",
    "ELEquipSlotType::E_GEAR_EAR_2",
    "ELEquipSlotType::E_GEAR_EAR_3",
    "ELEquipSlotType::E_GEAR_EAR_4",
    "ELEquipSlotType::E_GEAR_WRIST",
    "ELEquipSlotType::E_CONVERTER",
    "ELEquipSlotType::E_LINER",
    "ELEquipSlotType::E_GRINDER_UNIT_SLOT",
    "ELEquipSlotType::E_MONAD_UNIT_SLOT",
    "ELEquipSlotType::E_EYEWEAR_COSTUME",
    "ELEquipSlotType::E_BODY_COSTUME",
    "ELEquipSlotType::E_BAG_COSTUM2",
    "ELEquipSlotType::E_BAG_COSTUM3",
];

/// An assembled weapon: handle and blade stored on one inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeaponBuild {
    /// Position of the row in the item array.
    pub index: usize,
    pub handle: String,
    pub blade: String,
    pub slot: String,
    pub sharpness: i64,
    pub unique_id: Option<i64>,
}

/// Fields written by [`set_build`] and [`new_build`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildEdit {
    pub handle: String,
    pub blade: String,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub sharpness: Option<i64>,
    #[serde(default)]
    pub unique_id: UniqueIdChoice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UniqueIdChoice {
    /// Leave the stored id as is.
    #[default]
    Keep,
    /// Assign the next free id among builds.
    Generate,
    Set(i64),
    Remove,
}

fn none_like(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "" | "none" | "null")
}

pub fn looks_like_build(handle: &str, blade: &str) -> bool {
    !none_like(handle)
        && !none_like(blade)
        && handle.starts_with(HANDLE_PREFIX)
        && blade.starts_with(BLADE_PREFIX)
}

fn build_of(index: usize, entry: &PropertyMap) -> Option<WeaponBuild> {
    let handle = text_of(entry, FIRST_CODE).unwrap_or_default();
    let blade = text_of(entry, SECOND_CODE).unwrap_or_default();
    looks_like_build(handle, blade).then(|| WeaponBuild {
        index,
        handle: handle.to_string(),
        blade: blade.to_string(),
        slot: text_of(entry, EQUIP_SLOT).unwrap_or(SLOT_NONE).to_string(),
        sharpness: int_of(entry, SHARPNESS).unwrap_or(0),
        unique_id: int_of(entry, UNIQUE_ID),
    })
}

pub fn list(root: &PropertyMap) -> Vec<WeaponBuild> {
    entries(root)
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, e)| e.as_properties().and_then(|p| build_of(i, p)))
                .collect()
        })
        .unwrap_or_default()
}

fn next_build_id(root: &PropertyMap) -> i64 {
    list(root)
        .iter()
        .filter_map(|b| b.unique_id)
        .fold(0, i64::max)
        + 1
}

fn validate(edit: &BuildEdit) -> io::Result<()> {
    if !looks_like_build(&edit.handle, &edit.blade) {
        return Err(invalid_input(format!(
            "handle must start with {HANDLE_PREFIX} and blade with {BLADE_PREFIX}"
        )));
    }
    if let Some(slot) = &edit.slot {
        if !slot.starts_with("ELEquipSlotType::") {
            return Err(invalid_input(format!("invalid equip slot '{slot}'")));
        }
    }
    Ok(())
}

fn apply(entry: &mut PropertyMap, edit: &BuildEdit, generated_id: i64) {
    write_text(entry, FIRST_CODE, edit.handle.trim());
    write_text(entry, SECOND_CODE, edit.blade.trim());
    if let Some(slot) = &edit.slot {
        if entry.get(EQUIP_SLOT).and_then(PropertyValue::as_enum).is_some() {
            write_text(entry, EQUIP_SLOT, slot);
        } else {
            entry.insert(
                EQUIP_SLOT,
                PropertyValue::Enum {
                    enum_name: SLOT_ENUM.to_string(),
                    value: Some(slot.clone()),
                },
            );
        }
    }
    if let Some(sharpness) = edit.sharpness {
        write_int(entry, SHARPNESS, sharpness);
    }
    let unique_id = match edit.unique_id {
        UniqueIdChoice::Keep => None,
        UniqueIdChoice::Generate => Some(generated_id),
        UniqueIdChoice::Set(id) => Some(id),
        UniqueIdChoice::Remove => {
            entry.remove(UNIQUE_ID);
            None
        }
    };
    if let Some(id) = unique_id {
        if entry.get(UNIQUE_ID).and_then(PropertyValue::as_i64).is_some() {
            write_int(entry, UNIQUE_ID, id);
        } else {
            entry.insert(UNIQUE_ID, PropertyValue::Int64(id));
        }
    }
}

fn build_entry_mut(root: &mut PropertyMap, index: usize) -> io::Result<&mut PropertyMap> {
    if !list(root).iter().any(|b| b.index == index) {
        return Err(invalid_input(format!("item row {index} is not a weapon build")));
    }
    entries_mut(root)?
        .get_mut(index)
        .and_then(StructValue::as_properties_mut)
        .ok_or_else(|| invalid_input(format!("item row {index} is not a weapon build")))
}

pub fn set_build(root: &mut PropertyMap, index: usize, edit: &BuildEdit) -> io::Result<()> {
    validate(edit)?;
    let generated = next_build_id(root);
    apply(build_entry_mut(root, index)?, edit, generated);
    Ok(())
}

/// Append a new build row; returns its item index.
pub fn new_build(root: &mut PropertyMap, edit: &BuildEdit) -> io::Result<usize> {
    validate(edit)?;
    let generated = next_build_id(root);
    let mut entry = PropertyMap::new();
    let edit = BuildEdit {
        slot: edit.slot.clone().or_else(|| Some(SLOT_NONE.to_string())),
        sharpness: edit.sharpness.or(Some(0)),
        ..edit.clone()
    };
    apply(&mut entry, &edit, generated);
    let items = entries_mut(root)?;
    items.push(StructValue::Properties(entry));
    Ok(items.len() - 1)
}

/// Copy a build row to the end of the list with a fresh id.
pub fn clone_build(root: &mut PropertyMap, index: usize) -> io::Result<usize> {
    let generated = next_build_id(root);
    let mut copy = build_entry_mut(root, index)?.clone();
    if copy.contains(UNIQUE_ID) {
        write_int(&mut copy, UNIQUE_ID, generated);
    } else {
        copy.insert(UNIQUE_ID, PropertyValue::Int64(generated));
    }
    let items = entries_mut(root)?;
    items.push(StructValue::Properties(copy));
    Ok(items.len() - 1)
}

pub fn delete_build(root: &mut PropertyMap, index: usize) -> io::Result<()> {
    build_entry_mut(root, index)?;
    entries_mut(root)?.remove(index);
    Ok(())
}
