//! Stargazers (teleport spots) and the player's last position.

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::path::{FieldPath, NodeMut, NodeRef, resolve, resolve_mut, walk};
use super::{character, character_mut, invalid_input, not_found, retarget_enum, text_of, write_text};
use crate::gvas::{PropertyMap, PropertyValue, Quat, StructValue, Vector};

pub const SPOT_SAVE_DATA: &str = "SpotSaveData_0";
pub const TELEPORT_LIST: &str = "TeleportObjectSpotList_0";
pub const STARGAZER_TYPE: &str = "StargazerType_0";
pub const STARGAZER_ENUM: &str = "ELStargazerType";

pub const LATEST_LOCATION: &str = "LatestLocationName_0";
pub const LATEST_LEVEL: &str = "LatestPersistentLevelName_0";
pub const LATEST_TRANSFORM: &str = "LatestTransform_0";
pub const TRANSLATION: &str = "Translation_0";
pub const ROTATION: &str = "Rotation_0";
pub const RESPAWN_SPOT: &str = "RespawnTeleportObject_0";
pub const REGISTERED_COIL: &str = "RegistTorsionCoilName_0";

const CODE_KEYS: [&str; 4] = [
    "TeleportObjectCodeName_0",
    "SpotCodeName_0",
    "Name",
    "SpotUniqueId_0",
];
const STATE_KEYS: [&str; 4] = [STARGAZER_TYPE, "State_0", "State", "SpotType_0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StargazerState {
    Locked,
    ActiveIdle,
    Active,
}

impl StargazerState {
    pub const ALL: [StargazerState; 3] = [Self::Locked, Self::ActiveIdle, Self::Active];

    pub fn tail(&self) -> &'static str {
        match *self {
            Self::Locked => "E_NONE",
            Self::ActiveIdle => "E_ACTIVE_IDLE",
            Self::Active => "E_ACTIVE",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Locked => "Locked",
            Self::ActiveIdle => "Active (Idle)",
            Self::Active => "Active",
        }
    }

    /// State named by a stored enum label.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let upper = raw.to_ascii_uppercase();
        if upper.contains("E_NONE") {
            Some(Self::Locked)
        } else if upper.contains("E_ACTIVE_IDLE") {
            Some(Self::ActiveIdle)
        } else if upper.contains("E_ACTIVE") {
            Some(Self::Active)
        } else {
            None
        }
    }
}

impl fmt::Display for StargazerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StargazerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|st| {
                st.as_str().replace(['(', ')'], "").replace(' ', "_").eq_ignore_ascii_case(&wanted)
                    || st.tail().eq_ignore_ascii_case(&wanted)
            })
            .or_else(|| match wanted.to_ascii_lowercase().as_str() {
                "locked" | "none" => Some(Self::Locked),
                "idle" => Some(Self::ActiveIdle),
                _ => None,
            })
            .ok_or_else(|| format!("unknown stargazer state '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Spot {
    pub index: usize,
    pub code: String,
    pub label: String,
    pub state: Option<StargazerState>,
    pub raw_state: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Position {
    pub location: Option<String>,
    pub level: Option<String>,
    pub translation: Option<Vector>,
    pub rotation: Option<Quat>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionEdit {
    pub location: Option<String>,
    pub level: Option<String>,
    pub translation: Option<Vector>,
    pub rotation: Option<Quat>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Respawn {
    pub teleport: Option<String>,
    pub torsion_coil: Option<String>,
}

/// Display form of a spot or level code: `LD_`/`LV_` dropped, underscores
/// turned into single spaces.
pub fn pretty_code(code: &str) -> String {
    let trimmed = code.trim();
    let bare = ["LD_", "LV_"]
        .iter()
        .find_map(|p| trimmed.strip_prefix(p))
        .unwrap_or(trimmed);
    bare.split('_')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_spot(entry: &PropertyMap) -> bool {
    entry.first_present(&CODE_KEYS).is_some() && entry.first_present(&STATE_KEYS).is_some()
}

/// Location of the stargazer list: the usual `SpotSaveData_0` path, else the
/// longest spot-like struct array under `SpotSaveData_0`, else anywhere.
pub fn spots_path(root: &PropertyMap) -> Option<FieldPath> {
    let mut standard = FieldPath::new();
    standard.push_key(SPOT_SAVE_DATA);
    standard.push_key(TELEPORT_LIST);
    if matches!(resolve(root, &standard), Some(NodeRef::Value(v)) if v.as_struct_array().is_some())
    {
        return Some(standard);
    }

    let longest_under = |map: &PropertyMap| {
        let mut best: Option<(usize, FieldPath)> = None;
        walk(map, &mut |path, node| {
            let NodeRef::Value(value) = node else { return };
            let Some(list) = value.as_struct_array() else { return };
            let spot_like = list
                .first()
                .and_then(StructValue::as_properties)
                .is_some_and(looks_like_spot);
            if spot_like && best.as_ref().is_none_or(|(len, _)| list.len() > *len) {
                best = Some((list.len(), path.clone()));
            }
        });
        best.map(|(_, path)| path)
    };

    let under_spots = root.get(SPOT_SAVE_DATA).and_then(PropertyValue::as_struct).and_then(|spot| {
        longest_under(spot).map(|rel| {
            let mut base = FieldPath::new();
            base.push_key(SPOT_SAVE_DATA);
            base.join(&rel)
        })
    });
    under_spots.or_else(|| longest_under(root))
}

fn spot_entries(root: &PropertyMap) -> Option<&Vec<StructValue>> {
    match resolve(root, &spots_path(root)?)? {
        NodeRef::Value(v) => v.as_struct_array(),
        _ => None,
    }
}

pub(crate) fn spot_entries_mut(root: &mut PropertyMap) -> io::Result<&mut Vec<StructValue>> {
    let path = spots_path(root).ok_or_else(|| not_found(TELEPORT_LIST))?;
    let list = match resolve_mut(root, &path) {
        Some(NodeMut::Value(v)) => v.as_struct_array_mut(),
        _ => None,
    };
    list.ok_or_else(|| not_found(TELEPORT_LIST))
}

pub(crate) fn spot_code(entry: &PropertyMap) -> String {
    CODE_KEYS
        .iter()
        .find_map(|k| {
            let value = entry.get(k)?;
            value
                .as_str()
                .or_else(|| value.as_enum())
                .map(str::to_string)
                .or_else(|| value.as_i64().map(|n| n.to_string()))
        })
        .unwrap_or_default()
}

fn state_key(entry: &PropertyMap) -> Option<&'static str> {
    entry.first_present(&STATE_KEYS)
}

pub fn list(root: &PropertyMap) -> Vec<Spot> {
    let Some(entries) = spot_entries(root) else {
        return Vec::new();
    };
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, e)| e.as_properties().map(|p| (index, p)))
        .map(|(index, entry)| {
            let code = spot_code(entry);
            let raw_state = state_key(entry)
                .and_then(|k| text_of(entry, k))
                .unwrap_or_default()
                .to_string();
            Spot {
                index,
                label: pretty_code(&code),
                state: StargazerState::from_raw(&raw_state),
                raw_state,
                code,
            }
        })
        .collect()
}

/// Write a stargazer state, keeping the stored enum namespace. A spot
/// without a state field gets a `StargazerType_0` enum.
pub(crate) fn write_state(entry: &mut PropertyMap, state: StargazerState) -> io::Result<bool> {
    let Some(key) = state_key(entry) else {
        entry.insert(
            STARGAZER_TYPE,
            PropertyValue::Enum {
                enum_name: STARGAZER_ENUM.to_string(),
                value: Some(format!("{STARGAZER_ENUM}::{}", state.tail())),
            },
        );
        return Ok(true);
    };
    let Some(current) = text_of(entry, key) else {
        return Err(invalid_input(format!("stargazer state {key} is not an enum")));
    };
    let target = retarget_enum(current, state.tail());
    Ok(write_text(entry, key, &target))
}

/// Set the state of the spot with this code (case-insensitive).
pub fn set_spot_state(root: &mut PropertyMap, code: &str, state: StargazerState) -> io::Result<bool> {
    let wanted = code.trim();
    let entry = spot_entries_mut(root)?
        .iter_mut()
        .filter_map(StructValue::as_properties_mut)
        .find(|e| spot_code(e).eq_ignore_ascii_case(wanted))
        .ok_or_else(|| not_found(&format!("stargazer '{code}'")))?;
    write_state(entry, state)
}

fn transform(ch: &PropertyMap) -> Option<&PropertyMap> {
    ch.get(LATEST_TRANSFORM).and_then(PropertyValue::as_struct)
}

pub fn position(root: &PropertyMap) -> Position {
    let Some(ch) = character(root) else {
        return Position::default();
    };
    let transform = transform(ch);
    let translation = transform.and_then(|t| match t.get(TRANSLATION) {
        Some(PropertyValue::Struct {
            value: StructValue::Vector(v),
            ..
        }) => Some(*v),
        _ => None,
    });
    let rotation = transform.and_then(|t| match t.get(ROTATION) {
        Some(PropertyValue::Struct {
            value: StructValue::Quat(q),
            ..
        }) => Some(*q),
        _ => None,
    });
    Position {
        location: text_of(ch, LATEST_LOCATION).map(str::to_string),
        level: text_of(ch, LATEST_LEVEL).map(str::to_string),
        translation,
        rotation,
    }
}

/// Apply the given parts of a position. Returns how many fields changed.
pub fn set_position(root: &mut PropertyMap, edit: &PositionEdit) -> io::Result<usize> {
    let ch = character_mut(root)?;
    let mut changed = 0;
    if let Some(location) = &edit.location {
        changed += usize::from(write_text(ch, LATEST_LOCATION, location.trim()));
    }
    if let Some(level) = &edit.level {
        changed += usize::from(write_text(ch, LATEST_LEVEL, level.trim()));
    }
    if edit.translation.is_none() && edit.rotation.is_none() {
        return Ok(changed);
    }

    let transform = ch
        .get_mut(LATEST_TRANSFORM)
        .and_then(PropertyValue::as_struct_mut)
        .ok_or_else(|| not_found(LATEST_TRANSFORM))?;
    if let Some(next) = edit.translation {
        match transform.get_mut(TRANSLATION) {
            Some(PropertyValue::Struct {
                value: StructValue::Vector(v),
                ..
            }) => {
                if *v != next {
                    *v = next;
                    changed += 1;
                }
            }
            _ => return Err(not_found(TRANSLATION)),
        }
    }
    if let Some(next) = edit.rotation {
        match transform.get_mut(ROTATION) {
            Some(PropertyValue::Struct {
                value: StructValue::Quat(q),
                ..
            }) => {
                if *q != next {
                    *q = next;
                    changed += 1;
                }
            }
            _ => return Err(not_found(ROTATION)),
        }
    }
    Ok(changed)
}

pub fn respawn(root: &PropertyMap) -> Respawn {
    let Some(ch) = character(root) else {
        return Respawn::default();
    };
    Respawn {
        teleport: text_of(ch, RESPAWN_SPOT).map(str::to_string),
        torsion_coil: text_of(ch, REGISTERED_COIL).map(str::to_string),
    }
}

/// Set the respawn stargazer and/or the registered torsion coil.
pub fn set_respawn(
    root: &mut PropertyMap,
    teleport: Option<&str>,
    torsion_coil: Option<&str>,
) -> io::Result<usize> {
    let known: BTreeSet<String> = list(root).into_iter().map(|s| s.code.to_lowercase()).collect();
    for code in teleport.iter().chain(torsion_coil.iter()) {
        if !known.is_empty() && !known.contains(&code.trim().to_lowercase()) {
            log::warn!("respawn target '{code}' is not a known stargazer");
        }
    }
    let ch = character_mut(root)?;
    let mut changed = 0;
    if let Some(code) = teleport {
        changed += usize::from(write_text(ch, RESPAWN_SPOT, code.trim()));
    }
    if let Some(code) = torsion_coil {
        changed += usize::from(write_text(ch, REGISTERED_COIL, code.trim()));
    }
    Ok(changed)
}

/// Every `LV_*` level name stored anywhere in the save, sorted.
pub fn level_names(root: &PropertyMap) -> Vec<String> {
    let mut levels = BTreeSet::new();
    walk(root, &mut |_, node| {
        let text = match node {
            NodeRef::Value(v) => v.as_str().or_else(|| v.as_enum()),
            NodeRef::Element(e) => e.as_str(),
            _ => None,
        };
        if let Some(level) = text.filter(|t| t.starts_with("LV_")) {
            levels.insert((level.to_lowercase(), level.to_string()));
        }
    });
    levels.into_iter().map(|(_, level)| level).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvas::{ArrayValue, Guid};
    use crate::profile::CHARACTER_SAVE_DATA;

    fn spot(code: &str, state: &str) -> StructValue {
        let mut e = PropertyMap::new();
        e.insert("TeleportObjectCodeName_0", PropertyValue::Name(Some(code.into())));
        e.insert(
            STARGAZER_TYPE,
            PropertyValue::Enum {
                enum_name: STARGAZER_ENUM.into(),
                value: Some(state.into()),
            },
        );
        StructValue::Properties(e)
    }

    fn strukt(name: &str, value: StructValue) -> PropertyValue {
        PropertyValue::Struct {
            struct_name: name.into(),
            struct_guid: Guid::ZERO,
            value,
        }
    }

    fn root() -> PropertyMap {
        let mut spots = PropertyMap::new();
        spots.insert(
            TELEPORT_LIST,
            PropertyValue::Array {
                inner_type: "StructProperty".into(),
                value: ArrayValue::Struct {
                    field_name: TELEPORT_LIST.into(),
                    struct_name: "LTeleportObjectSpotSaveData".into(),
                    struct_guid: Guid::ZERO,
                    elements: vec![
                        spot("LD_Hotel_Krat_Entrance", "ELStargazerType::E_NONE"),
                        spot("LD_Station_Square", "ELStargazerType::E_ACTIVE"),
                    ],
                },
            },
        );

        let mut xf = PropertyMap::new();
        xf.insert(ROTATION, strukt("Quat", StructValue::Quat(Quat { w: 1.0, ..Quat::default() })));
        xf.insert(TRANSLATION, strukt("Vector", StructValue::Vector(Vector { x: 1.0, y: 2.0, z: 3.0 })));
        let mut ch = PropertyMap::new();
        ch.insert(LATEST_LOCATION, PropertyValue::Name(Some("LD_Station_Square".into())));
        ch.insert(LATEST_LEVEL, PropertyValue::Name(Some("LV_Krat_Central".into())));
        ch.insert(LATEST_TRANSFORM, strukt("Transform", StructValue::Properties(xf)));

        let mut root = PropertyMap::new();
        root.insert(CHARACTER_SAVE_DATA, strukt("LCharacterSaveData", StructValue::Properties(ch)));
        root.insert(SPOT_SAVE_DATA, strukt("LSpotSaveData", StructValue::Properties(spots)));
        root
    }

    #[test]
    fn lists_spots_with_states() {
        let spots = list(&root());
        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].label, "Hotel Krat Entrance");
        assert_eq!(spots[0].state, Some(StargazerState::Locked));
        assert_eq!(spots[1].state, Some(StargazerState::Active));
    }

    #[test]
    fn state_write_keeps_namespace() {
        let mut root = root();
        assert!(set_spot_state(&mut root, "ld_hotel_krat_entrance", StargazerState::ActiveIdle).unwrap());
        assert_eq!(list(&root)[0].raw_state, "ELStargazerType::E_ACTIVE_IDLE");
        assert!(set_spot_state(&mut root, "LD_Nowhere", StargazerState::Active).is_err());
    }

    #[test]
    fn position_and_respawn_edits() {
        let mut root = root();
        let pos = position(&root);
        assert_eq!(pos.translation, Some(Vector { x: 1.0, y: 2.0, z: 3.0 }));
        assert_eq!(pos.rotation.map(|q| q.w), Some(1.0));

        let edit = PositionEdit {
            level: Some("LV_Hotel".into()),
            translation: Some(Vector { x: 5.0, y: 2.0, z: 3.0 }),
            ..PositionEdit::default()
        };
        assert_eq!(set_position(&mut root, &edit).unwrap(), 2);
        assert_eq!(position(&root).level.as_deref(), Some("LV_Hotel"));

        assert_eq!(set_respawn(&mut root, Some("LD_Station_Square"), Some("LD_Station_Square")).unwrap(), 2);
        assert_eq!(respawn(&root).teleport.as_deref(), Some("LD_Station_Square"));
        assert_eq!(level_names(&root), vec!["LV_Hotel".to_string()]);
    }

    #[test]
    fn states_parse_from_labels() {
        assert_eq!("active-idle".parse::<StargazerState>(), Ok(StargazerState::ActiveIdle));
        assert_eq!("Locked".parse::<StargazerState>(), Ok(StargazerState::Locked));
        assert_eq!("E_ACTIVE".parse::<StargazerState>(), Ok(StargazerState::Active));
        assert_eq!(pretty_code("LV_Krat__Central"), "Krat Central");
    }
}
