use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::starting_build::StartingBuild;
use super::{
    bool_of, character, character_mut, int_of, invalid_input, text_of, write_bool, write_int,
    write_text,
};
use crate::gvas::{PropertyMap, PropertyValue};

pub const SLOT_NAME: &str = "SlotName_0";
pub const PLAY_TIME: &str = "CharacterPlayTime_0";
pub const STARTING_BUILD: &str = "DefaultStatCodeName_0";
pub const LAMP_ATTACHED: &str = "bAttachedPCLamp_0";

/// Integer fields of the character struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterField {
    Level,
    Ergo,
    NextLevelErgo,
    HumanityLevel,
    Humanity,
    NewGamePlusRound,
    Deaths,
    TotalDamage,
}

impl CharacterField {
    pub const ALL: [CharacterField; 8] = [
        Self::Level,
        Self::Ergo,
        Self::NextLevelErgo,
        Self::HumanityLevel,
        Self::Humanity,
        Self::NewGamePlusRound,
        Self::Deaths,
        Self::TotalDamage,
    ];

    pub fn key(&self) -> &'static str {
        match *self {
            Self::Level => "PlayerLevel_0",
            Self::Ergo => "AcquisitionSoul_0",
            Self::NextLevelErgo => "NextLevelUpRequireSoul_0",
            Self::HumanityLevel => "HumanityLevel_0",
            Self::Humanity => "AcquisitionHumanity_0",
            Self::NewGamePlusRound => "NewGamePlus_Round_0",
            Self::Deaths => "YouDieCount_0",
            Self::TotalDamage => "TotalReceiveDamage_0",
        }
    }

    /// Short name used on the command line and in JSON output.
    pub fn name(&self) -> &'static str {
        match *self {
            Self::Level => "level",
            Self::Ergo => "ergo",
            Self::NextLevelErgo => "next_level_ergo",
            Self::HumanityLevel => "humanity_level",
            Self::Humanity => "humanity",
            Self::NewGamePlusRound => "ng_plus",
            Self::Deaths => "deaths",
            Self::TotalDamage => "total_damage",
        }
    }

    pub fn label(&self) -> &'static str {
        match *self {
            Self::Level => "Level",
            Self::Ergo => "Ergo",
            Self::NextLevelErgo => "Ergo to Next Level",
            Self::HumanityLevel => "Humanity Level",
            Self::Humanity => "Humanity",
            Self::NewGamePlusRound => "NG+ Round",
            Self::Deaths => "Deaths",
            Self::TotalDamage => "Total Damage Taken",
        }
    }
}

impl fmt::Display for CharacterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for CharacterField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(&wanted) || f.key().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown character field '{s}'"))
    }
}

/// Save slot path stored as `/GUID/Slot` at the save root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotName {
    pub guid: String,
    pub slot: String,
}

impl SlotName {
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim_matches('/');
        let (guid, slot) = trimmed.split_once('/').unwrap_or((trimmed, ""));
        Self {
            guid: guid.to_string(),
            slot: slot.to_string(),
        }
    }

    pub fn to_path(&self) -> String {
        format!("/{}/{}", self.guid.trim(), self.slot.trim()).replace("//", "/")
    }
}

pub fn field(root: &PropertyMap, field: CharacterField) -> Option<i64> {
    character(root).and_then(|c| int_of(c, field.key()))
}

/// Set an integer field; negative values are raised to zero.
pub fn set_field(root: &mut PropertyMap, field: CharacterField, value: i64) -> io::Result<bool> {
    let ch = character_mut(root)?;
    Ok(write_int(ch, field.key(), value.max(0)))
}

pub fn play_time(root: &PropertyMap) -> Option<f64> {
    character(root)
        .and_then(|c| c.get(PLAY_TIME))
        .and_then(PropertyValue::as_f64)
}

pub fn set_play_time(root: &mut PropertyMap, seconds: f64) -> io::Result<bool> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid_input(format!("invalid play time {seconds}")));
    }
    let ch = character_mut(root)?;
    let next = match ch.get(PLAY_TIME) {
        Some(PropertyValue::Float(_)) => PropertyValue::Float(seconds as f32),
        _ => PropertyValue::Double(seconds),
    };
    if ch.get(PLAY_TIME) == Some(&next) {
        return Ok(false);
    }
    ch.insert(PLAY_TIME, next);
    Ok(true)
}

/// `H:MM:SS` rendering of a play time in seconds.
pub fn format_play_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Stored starting build code, which may be outside the known set.
pub fn starting_build_code(root: &PropertyMap) -> Option<&str> {
    character(root).and_then(|c| text_of(c, STARTING_BUILD))
}

pub fn starting_build(root: &PropertyMap) -> Option<StartingBuild> {
    starting_build_code(root).and_then(StartingBuild::from_code)
}

pub fn set_starting_build(root: &mut PropertyMap, build: StartingBuild) -> io::Result<bool> {
    let ch = character_mut(root)?;
    Ok(write_text(ch, STARTING_BUILD, build.code()))
}

pub fn lamp_attached(root: &PropertyMap) -> Option<bool> {
    character(root).and_then(|c| bool_of(c, LAMP_ATTACHED))
}

pub fn set_lamp_attached(root: &mut PropertyMap, attached: bool) -> io::Result<bool> {
    let ch = character_mut(root)?;
    Ok(write_bool(ch, LAMP_ATTACHED, attached))
}

pub fn slot_name(root: &PropertyMap) -> Option<SlotName> {
    root.get(SLOT_NAME)
        .and_then(PropertyValue::as_str)
        .map(SlotName::parse)
}

/// Rewrite the slot path. The property must already exist since the game
/// keys its save slots on it.
pub fn set_slot_name(root: &mut PropertyMap, slot: &SlotName) -> io::Result<bool> {
    if !root.contains(SLOT_NAME) {
        return Err(super::not_found(SLOT_NAME));
    }
    if slot.guid.trim().is_empty() {
        return Err(invalid_input("slot GUID must not be empty"));
    }
    Ok(write_text(root, SLOT_NAME, &slot.to_path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvas::StructValue;

    fn root_with(character_props: PropertyMap) -> PropertyMap {
        let mut root = PropertyMap::new();
        root.insert(SLOT_NAME, PropertyValue::Str(Some("/7656/SaveData-1_Character_1".into())));
        root.insert(
            super::super::CHARACTER_SAVE_DATA,
            PropertyValue::Struct {
                struct_name: "LCharacterSaveData".into(),
                struct_guid: Default::default(),
                value: StructValue::Properties(character_props),
            },
        );
        root
    }

    #[test]
    fn slot_name_parses_and_rebuilds() {
        let slot = SlotName::parse("/7656/SaveData-1_Character_1");
        assert_eq!(slot.guid, "7656");
        assert_eq!(slot.slot, "SaveData-1_Character_1");
        assert_eq!(slot.to_path(), "/7656/SaveData-1_Character_1");

        let bare = SlotName {
            guid: "42".into(),
            slot: String::new(),
        };
        assert_eq!(bare.to_path(), "/42/");
    }

    #[test]
    fn fields_keep_kind_and_clamp_negative() {
        let mut props = PropertyMap::new();
        props.insert("AcquisitionSoul_0", PropertyValue::Int64(10));
        let mut root = root_with(props);

        assert!(set_field(&mut root, CharacterField::Ergo, 5_000_000_000).unwrap());
        assert_eq!(field(&root, CharacterField::Ergo), Some(5_000_000_000));
        assert!(set_field(&mut root, CharacterField::Deaths, -4).unwrap());
        assert_eq!(field(&root, CharacterField::Deaths), Some(0));
    }

    #[test]
    fn play_time_rejects_nan_and_formats() {
        let mut root = root_with(PropertyMap::new());
        assert!(set_play_time(&mut root, f64::NAN).is_err());
        assert!(set_play_time(&mut root, 3725.5).unwrap());
        assert_eq!(play_time(&root), Some(3725.5));
        assert_eq!(format_play_time(3725.5), "1:02:05");
    }

    #[test]
    fn starting_build_and_lamp() {
        let mut root = root_with(PropertyMap::new());
        assert_eq!(starting_build(&root), None);
        set_starting_build(&mut root, StartingBuild::Dexterity).unwrap();
        assert_eq!(starting_build(&root), Some(StartingBuild::Dexterity));
        assert!(set_lamp_attached(&mut root, true).unwrap());
        assert!(!set_lamp_attached(&mut root, true).unwrap());
        assert_eq!(lamp_attached(&root), Some(true));
    }

    #[test]
    fn field_names_parse() {
        assert_eq!("ng-plus".parse::<CharacterField>(), Ok(CharacterField::NewGamePlusRound));
        assert_eq!("PlayerLevel_0".parse::<CharacterField>(), Ok(CharacterField::Level));
        assert!("mana".parse::<CharacterField>().is_err());
    }
}
