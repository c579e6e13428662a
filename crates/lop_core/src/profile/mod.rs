//! Typed views and edits over the Lies of P property tree.
//!
//! Everything here works on the root [`PropertyMap`] of a parsed document and
//! keeps the stored property kinds: an `Int64Property` stays 64-bit, enum
//! labels keep their namespace, and missing numeric fields are created as
//! `IntProperty`.

pub mod builds;
pub mod character;
pub mod cheats;
pub mod currency;
pub mod fast_travel;
pub mod inventory;
pub mod missions;
pub mod path;
pub mod slots;
pub mod starting_build;
pub mod stats;

use std::io;

use crate::gvas::{PropertyMap, PropertyValue};

pub const CHARACTER_SAVE_DATA: &str = "CharacterSaveData_0";

pub(crate) fn character(root: &PropertyMap) -> Option<&PropertyMap> {
    root.get(CHARACTER_SAVE_DATA)?.as_struct()
}

pub(crate) fn character_mut(root: &mut PropertyMap) -> io::Result<&mut PropertyMap> {
    root.get_mut(CHARACTER_SAVE_DATA)
        .and_then(PropertyValue::as_struct_mut)
        .ok_or_else(|| not_found(CHARACTER_SAVE_DATA))
}

pub(crate) fn not_found(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{what} not found in save"))
}

pub(crate) fn invalid_input(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message.into())
}

pub(crate) fn int_of(map: &PropertyMap, key: &str) -> Option<i64> {
    map.get(key).and_then(PropertyValue::as_i64)
}

pub(crate) fn bool_of(map: &PropertyMap, key: &str) -> Option<bool> {
    map.get(key).and_then(PropertyValue::as_bool)
}

/// Text of a Name/Str/Object property or the label of an enum.
pub(crate) fn text_of<'a>(map: &'a PropertyMap, key: &str) -> Option<&'a str> {
    map.get(key).and_then(|v| v.as_str().or_else(|| v.as_enum()))
}

/// Write an integer keeping the stored width. A missing field becomes an
/// `IntProperty` and a Float/Double field keeps its float kind. Any other
/// kind, raw payloads included, is left alone. Returns whether anything
/// changed.
pub(crate) fn write_int(map: &mut PropertyMap, key: &str, value: i64) -> bool {
    let Some(stored) = map.get_mut(key) else {
        map.insert(key, PropertyValue::Int(clamp_i32(value)));
        return true;
    };
    if let Some(changed) = stored.set_integer(value) {
        return changed;
    }
    match stored {
        PropertyValue::Float(v) => replace_if_changed(v, value as f32),
        PropertyValue::Double(v) => replace_if_changed(v, value as f64),
        other => {
            log::warn!(
                "{key}: not writing integer {value} over a {}",
                other.type_name()
            );
            false
        }
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

pub(crate) fn write_bool(map: &mut PropertyMap, key: &str, value: bool) -> bool {
    if bool_of(map, key) == Some(value) {
        return false;
    }
    map.insert(key, PropertyValue::Bool(value));
    true
}

/// Write a name-like value keeping the stored kind (Name, Str, Enum label).
pub(crate) fn write_text(map: &mut PropertyMap, key: &str, text: &str) -> bool {
    let Some(value) = map.get_mut(key) else {
        map.insert(key, PropertyValue::Name(Some(text.to_string())));
        return true;
    };
    let slot = match value {
        PropertyValue::Str(v) | PropertyValue::Name(v) | PropertyValue::Object(v) => v,
        PropertyValue::Enum { value, .. } => value,
        PropertyValue::Byte {
            value: crate::gvas::ByteValue::Label(v),
            ..
        } => v,
        other => {
            *other = PropertyValue::Name(Some(text.to_string()));
            return true;
        }
    };
    if slot.as_deref() == Some(text) {
        return false;
    }
    *slot = Some(text.to_string());
    true
}

/// Point a stored enum label at `tail` (`E_*`), keeping its namespace:
/// `ELQuestState::E_INACTIVE` with `E_IN_PROGRESS` gives
/// `ELQuestState::E_IN_PROGRESS`.
pub(crate) fn retarget_enum(current: &str, tail: &str) -> String {
    let current = current.trim();
    if let Some((namespace, _)) = current.rsplit_once("::") {
        return format!("{namespace}::{tail}");
    }
    match current.find("E_") {
        Some(at) if at > 0 => format!("{}{tail}", &current[..at]),
        _ => tail.to_string(),
    }
}

pub(crate) fn clamp_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Lowercase alphanumeric form of an item or quest code used for matching.
pub fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Run an edit on a scratch copy when `dry_run` is set.
pub(crate) fn with_dry_run<T>(
    root: &mut PropertyMap,
    dry_run: bool,
    edit: impl FnOnce(&mut PropertyMap) -> T,
) -> T {
    if dry_run {
        let mut scratch = root.clone();
        edit(&mut scratch)
    } else {
        edit(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_int_preserves_int64_and_creates_int() {
        let mut map = PropertyMap::new();
        map.insert("Count_0", PropertyValue::Int64(3));
        assert!(write_int(&mut map, "Count_0", 7));
        assert_eq!(map.get("Count_0"), Some(&PropertyValue::Int64(7)));
        assert!(!write_int(&mut map, "Count_0", 7));

        assert!(write_int(&mut map, "New_0", 10_000_000_000));
        assert_eq!(map.get("New_0"), Some(&PropertyValue::Int(i32::MAX)));
    }

    #[test]
    fn write_int_keeps_float_kind_and_skips_other_kinds() {
        let mut map = PropertyMap::new();
        map.insert("Ratio_0", PropertyValue::Double(1.5));
        map.insert("Label_0", PropertyValue::Str(Some("x".into())));
        let raw = PropertyValue::Raw(crate::gvas::RawValue {
            type_name: "IntProperty".into(),
            header: vec![],
            payload: vec![1, 0, 0, 0, 0, 0],
        });
        map.insert("Odd_0", raw.clone());

        assert!(write_int(&mut map, "Ratio_0", 4));
        assert_eq!(map.get("Ratio_0"), Some(&PropertyValue::Double(4.0)));
        assert!(!write_int(&mut map, "Ratio_0", 4));

        assert!(!write_int(&mut map, "Label_0", 4));
        assert_eq!(map.get("Label_0"), Some(&PropertyValue::Str(Some("x".into()))));
        assert!(!write_int(&mut map, "Odd_0", 4));
        assert_eq!(map.get("Odd_0"), Some(&raw));
    }

    #[test]
    fn write_text_keeps_enum_kind() {
        let mut map = PropertyMap::new();
        map.insert(
            "Slot",
            PropertyValue::Enum {
                enum_name: "ELEquipSlotType".into(),
                value: Some("ELEquipSlotType::E_NONE".into()),
            },
        );
        assert!(write_text(&mut map, "Slot", "ELEquipSlotType::E_WEAPON"));
        assert_eq!(text_of(&map, "Slot"), Some("ELEquipSlotType::E_WEAPON"));
        assert_eq!(map.get("Slot").map(PropertyValue::type_name), Some("EnumProperty"));
    }

    #[test]
    fn normalize_code_drops_punctuation_and_case() {
        assert_eq!(normalize_code("Reinforce_SlaveArm_G1,"), "reinforceslavearmg1");
        assert_eq!(normalize_code(" Quartz "), "quartz");
    }

    #[test]
    fn retarget_enum_keeps_namespace() {
        assert_eq!(
            retarget_enum("ELQuestState::E_INACTIVE", "E_IN_PROGRESS"),
            "ELQuestState::E_IN_PROGRESS"
        );
        assert_eq!(retarget_enum("Type_E_NONE", "E_ACTIVE"), "Type_E_ACTIVE");
        assert_eq!(retarget_enum("", "E_ACTIVE"), "E_ACTIVE");
    }

    #[test]
    fn dry_run_leaves_root_untouched() {
        let mut map = PropertyMap::new();
        map.insert("A", PropertyValue::Int(1));
        let changed = with_dry_run(&mut map, true, |m| write_int(m, "A", 2));
        assert!(changed);
        assert_eq!(int_of(&map, "A"), Some(1));
    }
}
