mod common;

use lop_core::core_api::{CapabilityIssue, CheatSelection, CoreErrorCode, Engine, Session};
use lop_core::gvas::{PropertyValue, Quat};
use lop_core::profile::character::CharacterField;
use lop_core::profile::currency::CurrencyKind;
use lop_core::profile::fast_travel::{PositionEdit, StargazerState};
use lop_core::profile::inventory::AddOutcome;
use lop_core::profile::missions::QuestState;
use lop_core::profile::starting_build::StartingBuild;
use lop_core::profile::stats::{PrimaryStat, SecondaryStat};

fn open() -> Session {
    Engine::new()
        .open_bytes(common::character_save())
        .expect("failed to open character save")
}

fn reopen(session: &Session) -> Session {
    let bytes = session.to_bytes_modified().expect("failed to encode session");
    Engine::new()
        .open_bytes(bytes)
        .expect("failed to reopen edited save")
}

#[test]
fn engine_opens_character_save() {
    let session = open();

    let caps = session.capabilities();
    assert!(caps.can_query);
    assert!(caps.can_apply_edits);
    assert_eq!(caps.issues, [CapabilityIssue::RawPayloads]);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.save_game_class.as_deref(), Some(common::SAVE_CLASS));
    assert_eq!(snapshot.engine_version, "5.1.1-0");
    assert_eq!(snapshot.level, Some(42));
    assert_eq!(snapshot.ergo, Some(150_000));
    assert_eq!(snapshot.deaths, Some(17));
    assert_eq!(snapshot.play_time_seconds, Some(7265.5));
    assert_eq!(snapshot.starting_build, Some(StartingBuild::Balance));
    assert_eq!(snapshot.lamp_attached, Some(true));
    assert_eq!(snapshot.item_count, 5);
    assert_eq!(snapshot.root_property_count, 5);
    let slot = snapshot.slot.expect("slot name");
    assert_eq!(slot.guid, "76561198000000001");
    assert_eq!(slot.slot, "SaveData-1_Character_0");
}

#[test]
fn engine_rejects_garbage() {
    let err = Engine::new()
        .open_bytes(b"not a save at all")
        .expect_err("garbage should not parse");
    assert_eq!(err.code, CoreErrorCode::Parse);
}

#[test]
fn unedited_session_encodes_identically() {
    let session = open();
    let bytes = common::character_save();
    assert_eq!(session.to_bytes_unmodified().expect("failed to copy"), bytes);
    assert_eq!(session.to_bytes_modified().expect("failed to encode"), bytes);
}

#[test]
fn character_edits_keep_stored_widths() {
    let mut session = open();
    assert!(session
        .set_character_field(CharacterField::Ergo, 999)
        .expect("failed to set ergo"));
    assert!(!session
        .set_character_field(CharacterField::Ergo, 999)
        .expect("failed to set ergo"));
    session
        .set_character_field(CharacterField::Deaths, -5)
        .expect("failed to set deaths");
    session
        .set_starting_build(StartingBuild::Strength)
        .expect("failed to set build");
    session.set_play_time(60.0).expect("failed to set play time");
    assert_eq!(
        session.set_play_time(-1.0).expect_err("negative play time").code,
        CoreErrorCode::InvalidValue
    );

    let reopened = reopen(&session);
    let ch = reopened
        .root()
        .get("CharacterSaveData_0")
        .and_then(PropertyValue::as_struct)
        .expect("character struct");
    assert_eq!(ch.get("AcquisitionSoul_0"), Some(&PropertyValue::Int64(999)));
    assert_eq!(ch.get("YouDieCount_0"), Some(&PropertyValue::Int(0)));
    let snapshot = reopened.snapshot();
    assert_eq!(snapshot.starting_build, Some(StartingBuild::Strength));
    assert_eq!(snapshot.play_time_seconds, Some(60.0));
}

#[test]
fn stats_read_and_write() {
    let mut session = open();
    let primary = session.primary_stats();
    assert_eq!(primary.len(), PrimaryStat::ALL.len());
    assert_eq!(primary[0].label, "Vitality");
    assert_eq!(primary[0].value, Some(12));
    assert!(primary.iter().any(|s| s.label == "Vigor" && s.value.is_none()));

    session
        .set_primary_stat(PrimaryStat::Vigor, 250)
        .expect("failed to set vigor");
    session
        .set_secondary_stat(SecondaryStat::FrenzyPoints, 40)
        .expect("failed to set frenzy");

    let reopened = reopen(&session);
    let vigor = reopened
        .primary_stats()
        .into_iter()
        .find(|s| s.label == "Vigor")
        .expect("vigor row");
    assert_eq!(vigor.value, Some(100));
    let frenzy = reopened
        .secondary_stats()
        .into_iter()
        .find(|s| s.name == "frenzy")
        .expect("frenzy row");
    assert_eq!(frenzy.value, Some(40));
}

#[test]
fn inventory_add_remove_and_dedupe() {
    let mut session = open();

    assert_eq!(
        session.add_item("quartz", 6).expect("failed to add quartz"),
        AddOutcome::Incremented { count: 10 }
    );
    assert_eq!(
        session.add_item("Reinforce_Normal_G1", 2).expect("failed to add material"),
        AddOutcome::Created
    );
    let err = session
        .add_item("WP_PC_HND_Axe", 1)
        .expect_err("weapons cannot be added as plain items");
    assert_eq!(err.code, CoreErrorCode::InvalidValue);

    let report = session.dedupe_inventory().expect("failed to dedupe");
    assert_eq!(report.before, 6);
    assert_eq!(report.after, 5);
    assert_eq!(report.merged_stacks, 1);

    let items = reopen(&session).inventory();
    let heal = items
        .iter()
        .find(|i| i.code == "Consume_Heal_Cell")
        .expect("heal cell row");
    assert_eq!(heal.count, 5);
    let created = items.last().expect("created row");
    assert_eq!(created.code, "Reinforce_Normal_G1");
    assert_eq!(created.count, 2);
    assert_eq!(created.unique_id, Some(2));

    assert_eq!(session.remove_item("Consume_Heal_Cell").expect("failed to remove"), 1);
    assert_eq!(
        session.remove_item("Consume_Heal_Cell").expect_err("already removed").code,
        CoreErrorCode::NotFound
    );
}

#[test]
fn weapon_builds_are_listed() {
    let session = open();
    let builds = session.builds();
    assert_eq!(builds.len(), 1);
    assert_eq!(builds[0].handle, "WP_PC_HND_Saber");
    assert_eq!(builds[0].blade, "WP_PC_BLD_Saber");
    assert_eq!(builds[0].slot, "ELEquipSlotType::E_WEAPON_1");
    assert_eq!(builds[0].sharpness, 100);
}

#[test]
fn currency_rows_and_writes() {
    let mut session = open();
    let rows = session.currency();
    assert_eq!(rows[0].kind, CurrencyKind::Ergo);
    assert_eq!(rows[0].total, 150_000);
    let quartz = rows
        .iter()
        .find(|r| r.kind == CurrencyKind::Quartz)
        .expect("quartz row");
    assert_eq!(quartz.total, 4);
    assert_eq!(session.boss_ergo_total(), 1);

    assert_eq!(
        session
            .set_currency(&CurrencyKind::Quartz, 50)
            .expect("failed to set quartz"),
        1
    );
    assert_eq!(
        session
            .set_currency(&CurrencyKind::LegionPlug, 7)
            .expect("failed to create legion plugs"),
        1
    );
    let rows = reopen(&session).currency();
    let total = |kind: CurrencyKind| rows.iter().find(|r| r.kind == kind).map(|r| r.total);
    assert_eq!(total(CurrencyKind::Quartz), Some(50));
    assert_eq!(total(CurrencyKind::LegionPlug), Some(7));
}

#[test]
fn quest_state_edits_keep_enum_namespace() {
    let mut session = open();
    let quests = session.quests();
    assert_eq!(quests.len(), 2);
    assert_eq!(quests[0].name, "Q_Main_Venigni");
    assert_eq!(quests[0].state, Some(QuestState::InProgress));
    assert_eq!(quests[0].progress[0].value, 2);

    assert!(session
        .apply_quest_edit(1, Some(QuestState::CompleteSuccess), Some((None, 3)))
        .expect("failed to edit quest"));

    let quests = reopen(&session).quests();
    assert_eq!(quests[1].raw_state, "ELQuestState::E_COMPLETE_SUCCESS");
    assert_eq!(quests[1].state, Some(QuestState::CompleteSuccess));
    assert_eq!(quests[1].progress[0].value, 3);
    assert_eq!(quests[0].state, Some(QuestState::InProgress));
}

#[test]
fn quest_export_imports_into_a_fresh_copy() {
    let mut edited = open();
    edited
        .apply_quest_edit(0, Some(QuestState::CompleteFail), None)
        .expect("failed to edit quest");
    let export = edited.export_quests();

    let mut fresh = open();
    let report = fresh
        .import_quests(&export.rows, false)
        .expect("failed to import quests");
    assert!(report.quests >= 1);
    assert_eq!(report.added, 0);
    assert_eq!(fresh.quests()[0].state, Some(QuestState::CompleteFail));
}

#[test]
fn stargazers_and_position() {
    let mut session = open();
    let spots = session.spots();
    assert_eq!(spots.len(), 2);
    assert_eq!(spots[0].state, Some(StargazerState::Active));
    assert_eq!(spots[1].state, Some(StargazerState::Locked));

    assert!(session
        .set_spot_state("ld_hotel_krat", StargazerState::ActiveIdle)
        .expect("failed to set spot"));
    let spots = reopen(&session).spots();
    assert_eq!(spots[1].raw_state, "ELStargazerType::E_ACTIVE_IDLE");

    let position = session.position();
    assert_eq!(position.level.as_deref(), Some("LV_Krat_Central_Station"));
    let translation = position.translation.expect("translation");
    assert_eq!(translation.y, -250.5);
    assert_eq!(session.level_names(), ["LV_Krat_Central_Station"]);
    assert_eq!(session.respawn().teleport.as_deref(), Some("LD_Krat_Station"));
    assert_eq!(
        session
            .set_respawn(Some("LD_Hotel_Krat"), None)
            .expect("failed to set respawn"),
        1
    );
}

#[test]
fn cheats_dry_run_leaves_save_untouched() {
    let mut session = open();
    let selection = CheatSelection {
        godmode: true,
        unlock_locations: true,
        ..CheatSelection::default()
    };

    let preview = session
        .run_cheats(&selection, true)
        .expect("failed to preview cheats");
    assert!(preview.dry_run);
    assert_eq!(preview.godmode, Some(2));
    assert!(preview.total() > 0);
    assert_eq!(
        session.to_bytes_modified().expect("failed to encode"),
        common::character_save()
    );

    let applied = session.run_cheats(&selection, false).expect("failed to run cheats");
    assert_eq!(applied.godmode, preview.godmode);
    assert_eq!(applied.unlock_locations, preview.unlock_locations);

    let reopened = reopen(&session);
    let health = reopened
        .secondary_stats()
        .into_iter()
        .find(|s| s.name == "health")
        .and_then(|s| s.value);
    assert_eq!(health, Some(i64::from(i32::MAX)));
    assert!(reopened
        .spots()
        .iter()
        .all(|s| s.state == Some(StargazerState::ActiveIdle)));
}

#[test]
fn json_export_import_is_identity() {
    let mut session = open();
    let exported = session.export_json().expect("failed to export");
    session.import_json(&exported).expect("failed to import");
    assert_eq!(
        session.to_bytes_modified().expect("failed to encode"),
        common::character_save()
    );
}

#[test]
fn json_import_applies_values_and_ignores_type_changes() {
    let mut session = open();
    let mut exported = session.export_json().expect("failed to export");
    let text = serde_json::to_string(&exported).expect("failed to serialize export");
    assert!(text.contains("PlayerLevel_0"));

    let character = find_property(&mut exported, "CharacterSaveData_0");
    let level = find_property(character, "PlayerLevel_0");
    *level = serde_json::json!(77);
    let deaths = find_property(character, "YouDieCount_0");
    *deaths = serde_json::json!("seventeen");

    session.import_json(&exported).expect("failed to import");
    let snapshot = session.snapshot();
    assert_eq!(snapshot.level, Some(77));
    assert_eq!(snapshot.deaths, Some(17));
}

/// Payload of the named property: the scalar of a simple value, or the body
/// of a struct.
fn find_property<'a>(
    json: &'a mut serde_json::Value,
    name: &str,
) -> &'a mut serde_json::Value {
    let pointer = locate(json, name, String::new()).expect("property in export");
    json.pointer_mut(&pointer).expect("pointer resolves")
}

fn locate(json: &serde_json::Value, name: &str, at: String) -> Option<String> {
    match json {
        serde_json::Value::Object(map) => {
            if let Some(found) = map.get(name) {
                return Some(untag(found, format!("{at}/{name}")));
            }
            map.iter()
                .find_map(|(k, v)| locate(v, name, format!("{at}/{k}")))
        }
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, v)| locate(v, name, format!("{at}/{i}"))),
        _ => None,
    }
}

/// Descend through single-key `{"Variant": ...}` wrappers.
fn untag(value: &serde_json::Value, at: String) -> String {
    match value.as_object() {
        Some(map) if map.len() == 1 => match map.iter().next() {
            Some((tag, inner)) => untag(inner, format!("{at}/{tag}")),
            None => at,
        },
        _ => at,
    }
}

#[test]
fn failed_edit_leaves_the_session_unchanged() {
    let bytes = common::save(&[common::strukt(
        "CharacterSaveData_0",
        "LCharacterSaveData",
        &[
            common::int("PlayerLevel_0", 7),
            common::name("LatestLocationName_0", "LD_Krat_Station"),
            common::strukt(
                "LatestTransform_0",
                "Transform",
                &[common::reals("Translation_0", "Vector", &[1.0, 2.0, 3.0])],
            ),
        ],
    )]);
    let mut session = Engine::new().open_bytes(&bytes).expect("failed to open save");

    let edit = PositionEdit {
        location: Some("LD_Hotel_Krat".into()),
        rotation: Some(Quat {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }),
        ..PositionEdit::default()
    };
    let err = session.set_position(&edit).unwrap_err();
    assert_eq!(err.code, CoreErrorCode::NotFound);
    assert_eq!(session.position().location.as_deref(), Some("LD_Krat_Station"));
    assert_eq!(session.to_bytes_modified().expect("failed to encode"), bytes);
}
