use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{character, character_mut, int_of, not_found, text_of, write_int};
use crate::gvas::{PropertyMap, PropertyValue, StructValue};

pub const PRIMARY_LIST: &str = "FirstStatSimpleList_0";
const STAT_TYPE: &str = "StatType_0";
pub(crate) const STAT_DATA: &str = "StatData_0";
const DEFAULT_STAT_NAMESPACE: &str = "ELFirstStat";

pub const PRIMARY_MAX: i64 = 100;
pub const SECONDARY_MAX: i64 = 999_999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimaryStat {
    Vitality,
    Vigor,
    Tenacity,
    Capacity,
    Motivity,
    Technique,
    Advance,
}

impl PrimaryStat {
    pub const ALL: [PrimaryStat; 7] = [
        Self::Vitality,
        Self::Vigor,
        Self::Tenacity,
        Self::Capacity,
        Self::Motivity,
        Self::Technique,
        Self::Advance,
    ];

    /// Enum value without its namespace, e.g. `E_VITALITY`.
    pub fn tail(&self) -> &'static str {
        match *self {
            Self::Vitality => "E_VITALITY",
            Self::Vigor => "E_VIGOR",
            Self::Tenacity => "E_TENACITY",
            Self::Capacity => "E_CAPACITY",
            Self::Motivity => "E_MOTIVITY",
            Self::Technique => "E_TECHNIQUE",
            Self::Advance => "E_ADVANCE",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Vitality => "Vitality",
            Self::Vigor => "Vigor",
            Self::Tenacity => "Tenacity",
            Self::Capacity => "Capacity",
            Self::Motivity => "Motivity",
            Self::Technique => "Technique",
            Self::Advance => "Advance",
        }
    }

    fn from_enum_value(value: &str) -> Option<Self> {
        let tail = enum_tail(value);
        Self::ALL.into_iter().find(|s| s.tail() == tail)
    }
}

impl fmt::Display for PrimaryStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrimaryStat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stat| stat.as_str().eq_ignore_ascii_case(s.trim()))
            .or_else(|| Self::from_enum_value(s))
            .ok_or_else(|| format!("unknown attribute '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecondaryStat {
    HealthPoints,
    FrenzyPoints,
    SlaveMagazine,
    PulseRecharge,
}

impl SecondaryStat {
    pub const ALL: [SecondaryStat; 4] = [
        Self::HealthPoints,
        Self::FrenzyPoints,
        Self::SlaveMagazine,
        Self::PulseRecharge,
    ];

    /// Keys the value may be stored under, the game's own spelling first.
    pub fn keys(&self) -> &'static [&'static str] {
        match *self {
            Self::HealthPoints => &["SecondStat_HeadthPoint_0", "SecondStat_HealthPoint_0"],
            Self::FrenzyPoints => &["SecondStat_FrenzyPoint_0"],
            Self::SlaveMagazine => &["SecondStat_SlaveMagazinePoint_0", "SecondStat_SlaveMagazine_0"],
            Self::PulseRecharge => &["SecondStat_PulseRechargePoint_0", "SecondStat_PulseRecharge_0"],
        }
    }

    pub fn key(&self) -> &'static str {
        self.keys()[0]
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::HealthPoints => "Health Points",
            Self::FrenzyPoints => "Frenzy Points",
            Self::SlaveMagazine => "Slave Magazine",
            Self::PulseRecharge => "Pulse Recharge",
        }
    }

    pub fn name(&self) -> &'static str {
        match *self {
            Self::HealthPoints => "health",
            Self::FrenzyPoints => "frenzy",
            Self::SlaveMagazine => "slave_magazine",
            Self::PulseRecharge => "pulse_recharge",
        }
    }
}

impl fmt::Display for SecondaryStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecondaryStat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|stat| {
                stat.name().eq_ignore_ascii_case(&wanted)
                    || stat.keys().iter().any(|k| k.eq_ignore_ascii_case(&wanted))
            })
            .ok_or_else(|| format!("unknown secondary stat '{s}'"))
    }
}

/// Upper-cased enum value after its `Namespace::` prefix, with an `E_` lead.
pub(crate) fn enum_tail(value: &str) -> String {
    let trimmed = value.trim();
    let tail = trimmed
        .split_once("::")
        .map(|(_, tail)| tail)
        .unwrap_or(trimmed)
        .to_ascii_uppercase();
    if tail.starts_with("E_") {
        tail
    } else {
        format!("E_{tail}")
    }
}

pub fn primary(root: &PropertyMap, stat: PrimaryStat) -> Option<i64> {
    primary_entries(root)?
        .find(|entry| stat_of(entry) == Some(stat))
        .and_then(|entry| int_of(entry, STAT_DATA))
}

pub fn primary_all(root: &PropertyMap) -> Vec<(PrimaryStat, Option<i64>)> {
    PrimaryStat::ALL
        .into_iter()
        .map(|stat| (stat, primary(root, stat)))
        .collect()
}

/// Set an attribute, clamped to 0..=100. A stat absent from the list is
/// appended using the namespace of the existing entries.
pub fn set_primary(root: &mut PropertyMap, stat: PrimaryStat, value: i64) -> io::Result<bool> {
    let value = value.clamp(0, PRIMARY_MAX);
    let list = character_mut(root)?
        .get_mut(PRIMARY_LIST)
        .and_then(PropertyValue::as_struct_array_mut)
        .ok_or_else(|| not_found(PRIMARY_LIST))?;

    if let Some(entry) = list
        .iter_mut()
        .filter_map(StructValue::as_properties_mut)
        .find(|entry| stat_of(entry) == Some(stat))
    {
        return Ok(write_int(entry, STAT_DATA, value));
    }

    let namespace = list
        .iter()
        .filter_map(StructValue::as_properties)
        .filter_map(|entry| text_of(entry, STAT_TYPE))
        .find_map(|v| v.split_once("::").map(|(ns, _)| ns.to_string()))
        .unwrap_or_else(|| DEFAULT_STAT_NAMESPACE.to_string());

    let mut entry = PropertyMap::new();
    entry.insert(
        STAT_TYPE,
        PropertyValue::Enum {
            value: Some(format!("{namespace}::{}", stat.tail())),
            enum_name: namespace,
        },
    );
    entry.insert(STAT_DATA, PropertyValue::Int(value as i32));
    list.push(StructValue::Properties(entry));
    Ok(true)
}

/// Value of a secondary stat stored under any of its aliases.
pub fn secondary(root: &PropertyMap, stat: SecondaryStat) -> Option<i64> {
    let ch = character(root)?;
    stat.keys().iter().find_map(|k| int_of(ch, k))
}

/// Set a secondary stat, clamped to 0..=999 999 999. Writes to whichever
/// alias is stored, creating the game's spelling when none is.
pub fn set_secondary(root: &mut PropertyMap, stat: SecondaryStat, value: i64) -> io::Result<bool> {
    let value = value.clamp(0, SECONDARY_MAX);
    let ch = character_mut(root)?;
    let key = ch.first_present(stat.keys()).unwrap_or(stat.key());
    Ok(write_int(ch, key, value))
}

fn primary_entries(root: &PropertyMap) -> Option<impl Iterator<Item = &PropertyMap>> {
    let list = character(root)?
        .get(PRIMARY_LIST)
        .and_then(PropertyValue::as_struct_array)?;
    Some(list.iter().filter_map(StructValue::as_properties))
}

fn stat_of(entry: &PropertyMap) -> Option<PrimaryStat> {
    text_of(entry, STAT_TYPE).and_then(PrimaryStat::from_enum_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvas::{ArrayValue, Guid};

    fn stat_entry(tail: &str, value: i32) -> StructValue {
        let mut entry = PropertyMap::new();
        entry.insert(
            STAT_TYPE,
            PropertyValue::Enum {
                enum_name: "ELFirstStat".into(),
                value: Some(format!("ELFirstStat::{tail}")),
            },
        );
        entry.insert(STAT_DATA, PropertyValue::Int(value));
        StructValue::Properties(entry)
    }

    fn root() -> PropertyMap {
        let mut ch = PropertyMap::new();
        ch.insert(
            PRIMARY_LIST,
            PropertyValue::Array {
                inner_type: "StructProperty".into(),
                value: ArrayValue::Struct {
                    field_name: PRIMARY_LIST.into(),
                    struct_name: "LFirstStatSimpleData".into(),
                    struct_guid: Guid::ZERO,
                    elements: vec![stat_entry("E_VITALITY", 12), stat_entry("E_VIGOR", 8)],
                },
            },
        );
        ch.insert("SecondStat_HealthPoint_0", PropertyValue::Int(400));
        let mut root = PropertyMap::new();
        root.insert(
            super::super::CHARACTER_SAVE_DATA,
            PropertyValue::Struct {
                struct_name: "LCharacterSaveData".into(),
                struct_guid: Guid::ZERO,
                value: StructValue::Properties(ch),
            },
        );
        root
    }

    #[test]
    fn primary_reads_and_clamps() {
        let mut root = root();
        assert_eq!(primary(&root, PrimaryStat::Vitality), Some(12));
        assert!(set_primary(&mut root, PrimaryStat::Vitality, 250).unwrap());
        assert_eq!(primary(&root, PrimaryStat::Vitality), Some(100));
    }

    #[test]
    fn missing_primary_is_appended_with_namespace() {
        let mut root = root();
        assert_eq!(primary(&root, PrimaryStat::Advance), None);
        assert!(set_primary(&mut root, PrimaryStat::Advance, 5).unwrap());
        assert_eq!(primary(&root, PrimaryStat::Advance), Some(5));
        let list = character(&root)
            .and_then(|c| c.get(PRIMARY_LIST))
            .and_then(PropertyValue::as_struct_array)
            .unwrap();
        assert_eq!(list.len(), 3);
        let last = list[2].as_properties().unwrap();
        assert_eq!(text_of(last, STAT_TYPE), Some("ELFirstStat::E_ADVANCE"));
    }

    #[test]
    fn secondary_uses_stored_alias() {
        let mut root = root();
        assert_eq!(secondary(&root, SecondaryStat::HealthPoints), Some(400));
        set_secondary(&mut root, SecondaryStat::HealthPoints, 2_000_000_000).unwrap();
        let ch = character(&root).unwrap();
        assert_eq!(int_of(ch, "SecondStat_HealthPoint_0"), Some(SECONDARY_MAX));
        assert!(!ch.contains("SecondStat_HeadthPoint_0"));

        set_secondary(&mut root, SecondaryStat::FrenzyPoints, 7).unwrap();
        assert_eq!(secondary(&root, SecondaryStat::FrenzyPoints), Some(7));
    }

    #[test]
    fn enum_tail_normalizes() {
        assert_eq!(enum_tail("ELFirstStat::E_Vigor"), "E_VIGOR");
        assert_eq!(enum_tail("vigor"), "E_VIGOR");
        assert_eq!("technique".parse::<PrimaryStat>(), Ok(PrimaryStat::Technique));
    }
}
