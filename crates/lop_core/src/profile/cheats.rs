//! One-shot bulk edits. Each cheat reports how many fields it changed; with
//! `dry_run` the edit runs on a scratch copy and only the count is kept.

use std::collections::HashSet;
use std::io;

use serde::Serialize;

use super::character::{CharacterField, PLAY_TIME};
use super::currency::{CURRENCY_MAX, CurrencyKind, is_boss_ergo};
use super::fast_travel::{StargazerState, spot_entries_mut, write_state};
use super::inventory::{code_of, count_of, entries_mut, push_new_entry, write_count};
use super::stats::{PRIMARY_LIST, PRIMARY_MAX, SECONDARY_MAX, STAT_DATA, SecondaryStat};
use super::{character_mut, normalize_code, with_dry_run, write_bool, write_int};
use crate::gvas::{ArrayValue, Element, PropertyMap, PropertyValue, StructValue};

pub const GODMODE_HEALTH: i64 = i32::MAX as i64;
pub const DEFAULT_CURRENCY: i64 = 999_999_999;

const ACHIEVEMENT_CODE: &str = "AchievementCodeName_0";
const STATUS_LIST: &str = "StatusList_0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct InsaneStatsReport {
    pub character: usize,
    pub stats_primary: usize,
    pub stats_secondary: usize,
}

impl InsaneStatsReport {
    pub fn total(&self) -> usize {
        self.character + self.stats_primary + self.stats_secondary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AchievementReport {
    pub found: bool,
    pub changes: usize,
}

/// Health to `i32::MAX` under both spellings of the key.
pub fn godmode(root: &mut PropertyMap, dry_run: bool) -> io::Result<usize> {
    with_dry_run(root, dry_run, |root| {
        let ch = character_mut(root)?;
        let mut changed = 0;
        for key in SecondaryStat::HealthPoints.keys() {
            changed += usize::from(write_int(ch, key, GODMODE_HEALTH));
        }
        Ok(changed)
    })
}

pub fn insane_stats(root: &mut PropertyMap, dry_run: bool) -> io::Result<InsaneStatsReport> {
    with_dry_run(root, dry_run, |root| {
        let ch = character_mut(root)?;
        let mut report = InsaneStatsReport::default();

        if let Some(list) = ch.get_mut(PRIMARY_LIST).and_then(PropertyValue::as_struct_array_mut) {
            report.stats_primary = list
                .iter_mut()
                .filter_map(StructValue::as_properties_mut)
                .filter_map(|entry| entry.get_mut(STAT_DATA))
                .map(|data| data.set_integer(PRIMARY_MAX))
                .filter(|changed| *changed == Some(true))
                .count();
        }

        let targets = [
            (CharacterField::Level, 999),
            (CharacterField::Ergo, 999_999_999),
            (CharacterField::NextLevelErgo, 0),
            (CharacterField::HumanityLevel, 999),
            (CharacterField::Humanity, 999_999_999),
            (CharacterField::NewGamePlusRound, 999),
            (CharacterField::Deaths, 0),
            (CharacterField::TotalDamage, 0),
        ];
        for (field, value) in targets {
            report.character += usize::from(write_int(ch, field.key(), value));
        }

        match ch.get_mut(PLAY_TIME) {
            Some(PropertyValue::Double(t)) if *t != 0.0 => {
                *t = 0.0;
                report.character += 1;
            }
            Some(PropertyValue::Float(t)) if *t != 0.0 => {
                *t = 0.0;
                report.character += 1;
            }
            Some(_) => {}
            None => ch.insert(PLAY_TIME, PropertyValue::Double(0.0)),
        }

        for key in SecondaryStat::ALL.iter().flat_map(SecondaryStat::keys) {
            report.stats_secondary += usize::from(write_int(ch, key, SECONDARY_MAX));
        }
        Ok(report)
    })
}

fn is_currency_family(normalized: &str) -> bool {
    normalized == "quartz"
        || normalized.starts_with("reinforceslavearm")
        || normalized.contains("legionplug")
        || normalized == "exchangeslavearmparts4"
        || normalized.contains("goldcoinfruit")
        || normalized.contains("goldencoinfruit")
        || normalized == "exchangegoldenfruit"
        || normalized.starts_with("consumeetcplatinumcoin")
        || normalized.contains("venigni")
        || is_boss_ergo(normalized)
}

/// Ergo and every currency-like item to `max` (clamped to 0..=i32::MAX).
/// With `create_missing`, canonical currency items absent from the save are
/// added.
pub fn max_currency(
    root: &mut PropertyMap,
    max: i64,
    create_missing: bool,
    dry_run: bool,
) -> io::Result<usize> {
    let value = max.clamp(0, CURRENCY_MAX);
    with_dry_run(root, dry_run, |root| {
        let mut changed = usize::from(write_int(
            character_mut(root)?,
            CharacterField::Ergo.key(),
            value,
        ));

        let items = match entries_mut(root) {
            Ok(items) => items,
            Err(err) => {
                log::warn!("max currency: {err}; only ergo was set");
                return Ok(changed);
            }
        };

        for entry in items.iter_mut().filter_map(StructValue::as_properties_mut) {
            if is_currency_family(&normalize_code(code_of(entry))) {
                let width = count_of(entry).1;
                changed += usize::from(write_count(entry, value, width));
            }
        }

        if create_missing {
            let present: HashSet<String> = items
                .iter()
                .filter_map(StructValue::as_properties)
                .map(|e| normalize_code(code_of(e)))
                .collect();
            for code in CurrencyKind::canonical()
                .iter()
                .filter_map(CurrencyKind::canonical_code)
            {
                if !present.contains(&normalize_code(&code)) {
                    push_new_entry(items, &code, value);
                    log::debug!("max currency: created {code}");
                    changed += 1;
                }
            }
        }
        Ok(changed)
    })
}

/// Every stargazer active and reachable.
pub fn unlock_all_locations(root: &mut PropertyMap, dry_run: bool) -> io::Result<usize> {
    with_dry_run(root, dry_run, |root| {
        let spots = match spot_entries_mut(root) {
            Ok(spots) => spots,
            Err(err) => {
                log::warn!("unlock locations: {err}");
                return Ok(0);
            }
        };
        let mut changed = 0;
        for spot in spots.iter_mut().filter_map(StructValue::as_properties_mut) {
            changed += usize::from(write_state(spot, StargazerState::ActiveIdle)?);
            for (key, value) in [
                ("ActorSpawnable_0", true),
                ("ReserveActorSpawn_0", false),
                ("ReserveActorDespawn_0", false),
                ("TorsionCoilActivate_0", true),
            ] {
                changed += usize::from(write_bool(spot, key, value));
            }
        }
        Ok(changed)
    })
}

fn element_map(element: &mut Element) -> Option<&mut PropertyMap> {
    match element {
        Element::Struct(s) => s.as_properties_mut(),
        _ => None,
    }
}

fn child_maps(value: &mut PropertyValue) -> Vec<&mut PropertyMap> {
    match value {
        PropertyValue::Struct { value, .. } => value.as_properties_mut().into_iter().collect(),
        PropertyValue::Array {
            value: ArrayValue::Struct { elements, .. },
            ..
        } => elements
            .iter_mut()
            .filter_map(StructValue::as_properties_mut)
            .collect(),
        PropertyValue::Array {
            value: ArrayValue::Base(elements),
            ..
        }
        | PropertyValue::Set { elements, .. } => elements.iter_mut().filter_map(element_map).collect(),
        PropertyValue::Map { entries, .. } => entries
            .iter_mut()
            .flat_map(|e| [&mut e.key, &mut e.value])
            .filter_map(element_map)
            .collect(),
        _ => Vec::new(),
    }
}

/// Scalar bools below `map` set to true. Bool arrays are left alone.
fn flip_bools(map: &mut PropertyMap) -> usize {
    let mut changed = 0;
    for property in map.iter_mut() {
        if let PropertyValue::Bool(b) = &mut property.value {
            if !*b {
                *b = true;
                changed += 1;
            }
            continue;
        }
        for child in child_maps(&mut property.value) {
            changed += flip_bools(child);
        }
    }
    changed
}

fn fill_status_list(value: &mut PropertyValue) -> usize {
    let PropertyValue::Array {
        value: ArrayValue::Base(elements),
        ..
    } = value
    else {
        return 0;
    };
    let mut changed = 0;
    for element in elements {
        if let Element::Bool(b) = element {
            if !*b {
                *b = true;
                changed += 1;
            }
        }
    }
    changed
}

fn visit_achievements(map: &mut PropertyMap, report: &mut AchievementReport) {
    if map.contains(ACHIEVEMENT_CODE) {
        report.found = true;
        report.changes += flip_bools(map);
    }
    if let Some(status) = map.get_mut(STATUS_LIST) {
        report.changes += fill_status_list(status);
    }
    for property in map.iter_mut() {
        for child in child_maps(&mut property.value) {
            visit_achievements(child, report);
        }
    }
}

/// Every achievement block marked done: scalar bools inside any struct
/// holding `AchievementCodeName_0` become true, and every `StatusList_0`
/// bool array is filled with true.
pub fn auto_plat_achievements(root: &mut PropertyMap, dry_run: bool) -> AchievementReport {
    with_dry_run(root, dry_run, |root| {
        let mut report = AchievementReport::default();
        visit_achievements(root, &mut report);
        report
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvas::Guid;
    use crate::profile::fast_travel::{STARGAZER_ENUM, STARGAZER_TYPE};
    use crate::profile::inventory::{CHARACTER_ITEM, FIRST_CODE, PLAYER_ITEMS, list};
    use crate::profile::{CHARACTER_SAVE_DATA, character, int_of};

    fn strukt(map: PropertyMap) -> PropertyValue {
        PropertyValue::Struct {
            struct_name: "Generic".into(),
            struct_guid: Guid::ZERO,
            value: StructValue::Properties(map),
        }
    }

    fn array(elements: Vec<PropertyMap>) -> PropertyValue {
        PropertyValue::Array {
            inner_type: "StructProperty".into(),
            value: ArrayValue::Struct {
                field_name: "List".into(),
                struct_name: "Generic".into(),
                struct_guid: Guid::ZERO,
                elements: elements.into_iter().map(StructValue::Properties).collect(),
            },
        }
    }

    fn item(code: &str, count: PropertyValue) -> PropertyMap {
        let mut e = PropertyMap::new();
        e.insert(FIRST_CODE, PropertyValue::Name(Some(code.into())));
        e.insert("Count_0", count);
        e
    }

    fn root() -> PropertyMap {
        let mut stat = PropertyMap::new();
        stat.insert(STAT_DATA, PropertyValue::Int(10));
        let mut items = PropertyMap::new();
        items.insert(
            PLAYER_ITEMS,
            array(vec![
                item("Quartz", PropertyValue::Int(3)),
                item("CH05_Boss_Ergo", PropertyValue::Int64(1)),
                item("Consume_Heal_01", PropertyValue::Int(2)),
            ]),
        );
        let mut ch = PropertyMap::new();
        ch.insert(PRIMARY_LIST, array(vec![stat]));
        ch.insert("SecondStat_HeadthPoint_0", PropertyValue::Int(500));
        ch.insert(PLAY_TIME, PropertyValue::Double(1234.5));
        ch.insert(CHARACTER_ITEM, strukt(items));
        let mut root = PropertyMap::new();
        root.insert(CHARACTER_SAVE_DATA, strukt(ch));
        root
    }

    #[test]
    fn godmode_sets_both_health_keys() {
        let mut root = root();
        assert_eq!(godmode(&mut root, true).unwrap(), 2);
        assert_eq!(int_of(character(&root).unwrap(), "SecondStat_HeadthPoint_0"), Some(500));
        assert_eq!(godmode(&mut root, false).unwrap(), 2);
        assert_eq!(godmode(&mut root, false).unwrap(), 0);
        let ch = character(&root).unwrap();
        assert_eq!(int_of(ch, "SecondStat_HealthPoint_0"), Some(GODMODE_HEALTH));
    }

    #[test]
    fn insane_stats_counts_each_group() {
        let mut root = root();
        let report = insane_stats(&mut root, false).unwrap();
        assert_eq!(report.stats_primary, 1);
        // eight fields created plus the play time reset
        assert_eq!(report.character, 9);
        assert_eq!(report.stats_secondary, 7);
        assert_eq!(
            crate::profile::stats::secondary(&root, SecondaryStat::FrenzyPoints),
            Some(SECONDARY_MAX)
        );
        assert_eq!(insane_stats(&mut root, false).unwrap().total(), 0);
    }

    #[test]
    fn max_currency_sets_families_and_creates_canonical_items() {
        let mut root = root();
        let dry = max_currency(&mut root, DEFAULT_CURRENCY, true, true).unwrap();
        assert_eq!(list(&root).len(), 3);

        let changed = max_currency(&mut root, DEFAULT_CURRENCY, true, false).unwrap();
        assert_eq!(changed, dry);
        let items = list(&root);
        // quartz existed; ten other canonical items were added
        assert_eq!(items.len(), 13);
        assert_eq!(changed, 1 + 2 + 10);
        assert_eq!(items[0].count, DEFAULT_CURRENCY);
        assert_eq!(items[1].count, DEFAULT_CURRENCY);
        assert_eq!(items[2].count, 2);
        assert!(items.iter().any(|i| i.code == "VenigniCommemorativeCoin"));

        let clamped = max_currency(&mut root, i64::MAX, false, false).unwrap();
        assert_eq!(clamped, 13);
    }

    #[test]
    fn unlock_all_locations_activates_spots() {
        let mut spot = PropertyMap::new();
        spot.insert("TeleportObjectCodeName_0", PropertyValue::Name(Some("LD_A".into())));
        spot.insert(
            STARGAZER_TYPE,
            PropertyValue::Enum {
                enum_name: STARGAZER_ENUM.into(),
                value: Some("ELStargazerType::E_NONE".into()),
            },
        );
        let mut spots = PropertyMap::new();
        spots.insert("TeleportObjectSpotList_0", array(vec![spot]));
        let mut root = PropertyMap::new();
        root.insert("SpotSaveData_0", strukt(spots));

        assert_eq!(unlock_all_locations(&mut root, false).unwrap(), 5);
        assert_eq!(unlock_all_locations(&mut root, false).unwrap(), 0);
        let listed = crate::profile::fast_travel::list(&root);
        assert_eq!(listed[0].state, Some(StargazerState::ActiveIdle));
        assert_eq!(unlock_all_locations(&mut PropertyMap::new(), false).unwrap(), 0);
    }

    #[test]
    fn achievements_flip_bools_and_status_lists() {
        let mut achievement = PropertyMap::new();
        achievement.insert(ACHIEVEMENT_CODE, PropertyValue::Name(Some("ACH_01".into())));
        achievement.insert("bComplete_0", PropertyValue::Bool(false));
        achievement.insert("bRewarded_0", PropertyValue::Bool(true));
        let mut block = PropertyMap::new();
        block.insert("Achievements_0", array(vec![achievement]));
        block.insert(
            STATUS_LIST,
            PropertyValue::Array {
                inner_type: "BoolProperty".into(),
                value: ArrayValue::Base(vec![Element::Bool(false), Element::Bool(true), Element::Bool(false)]),
            },
        );
        block.insert("bUnrelated_0", PropertyValue::Bool(false));
        let mut root = PropertyMap::new();
        root.insert("AchievementSaveData_0", strukt(block));

        let dry = auto_plat_achievements(&mut root, true);
        assert_eq!(dry, AchievementReport { found: true, changes: 3 });
        let report = auto_plat_achievements(&mut root, false);
        assert_eq!(report, dry);
        assert_eq!(auto_plat_achievements(&mut root, false).changes, 0);

        let block = root.get("AchievementSaveData_0").and_then(PropertyValue::as_struct).unwrap();
        assert_eq!(block.get("bUnrelated_0"), Some(&PropertyValue::Bool(false)));
    }
}
