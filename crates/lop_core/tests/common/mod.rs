#![allow(dead_code)]

//! Byte-level builder for small Lies of P saves used by the integration tests.

pub const TRAILER: [u8; 4] = [0, 0, 0, 0];
pub const SAVE_CLASS: &str = "/Script/LiesofP.LSaveGame";

pub fn fstring(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as i32 + 1).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn i32_bytes(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn header() -> Vec<u8> {
    let mut out = b"GVAS".to_vec();
    i32_bytes(&mut out, 3);
    i32_bytes(&mut out, 522);
    i32_bytes(&mut out, 1009);
    for part in [5u16, 1, 1] {
        out.extend_from_slice(&part.to_le_bytes());
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    fstring(&mut out, "++UE5+Release-5.1");
    i32_bytes(&mut out, 3);
    i32_bytes(&mut out, 1);
    out.extend(1u8..=16);
    i32_bytes(&mut out, 7);
    fstring(&mut out, SAVE_CLASS);
    out
}

pub fn tag(name: &str, type_name: &str, header: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    fstring(&mut out, name);
    fstring(&mut out, type_name);
    i32_bytes(&mut out, payload.len() as i32);
    i32_bytes(&mut out, 0);
    out.extend_from_slice(header);
    out.push(0);
    out.extend_from_slice(payload);
    out
}

pub fn int(name: &str, v: i32) -> Vec<u8> {
    tag(name, "IntProperty", &[], &v.to_le_bytes())
}

pub fn int64(name: &str, v: i64) -> Vec<u8> {
    tag(name, "Int64Property", &[], &v.to_le_bytes())
}

pub fn double(name: &str, v: f64) -> Vec<u8> {
    tag(name, "DoubleProperty", &[], &v.to_le_bytes())
}

pub fn boolean(name: &str, v: bool) -> Vec<u8> {
    tag(name, "BoolProperty", &[u8::from(v)], &[])
}

pub fn name(name: &str, v: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    fstring(&mut payload, v);
    tag(name, "NameProperty", &[], &payload)
}

pub fn text(name: &str, v: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    fstring(&mut payload, v);
    tag(name, "StrProperty", &[], &payload)
}

pub fn enumeration(name: &str, enum_name: &str, v: &str) -> Vec<u8> {
    let mut header = Vec::new();
    fstring(&mut header, enum_name);
    let mut payload = Vec::new();
    fstring(&mut payload, v);
    tag(name, "EnumProperty", &header, &payload)
}

fn struct_header(struct_name: &str) -> Vec<u8> {
    let mut header = Vec::new();
    fstring(&mut header, struct_name);
    header.extend_from_slice(&[0u8; 16]);
    header
}

fn property_list(fields: &[Vec<u8>]) -> Vec<u8> {
    let mut out = fields.concat();
    fstring(&mut out, "None");
    out
}

pub fn strukt(name: &str, struct_name: &str, fields: &[Vec<u8>]) -> Vec<u8> {
    tag(name, "StructProperty", &struct_header(struct_name), &property_list(fields))
}

/// `Vector`/`Quat` payloads with double precision components.
pub fn reals(name: &str, struct_name: &str, components: &[f64]) -> Vec<u8> {
    let payload: Vec<u8> = components.iter().flat_map(|c| c.to_le_bytes()).collect();
    tag(name, "StructProperty", &struct_header(struct_name), &payload)
}

pub fn struct_array(name: &str, struct_name: &str, elements: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let body: Vec<u8> = elements.iter().flat_map(|fields| property_list(fields)).collect();

    let mut payload = Vec::new();
    i32_bytes(&mut payload, elements.len() as i32);
    fstring(&mut payload, name);
    fstring(&mut payload, "StructProperty");
    i32_bytes(&mut payload, body.len() as i32);
    i32_bytes(&mut payload, 0);
    fstring(&mut payload, struct_name);
    payload.extend_from_slice(&[0u8; 16]);
    payload.push(0);
    payload.extend_from_slice(&body);

    let mut header = Vec::new();
    fstring(&mut header, "StructProperty");
    tag(name, "ArrayProperty", &header, &payload)
}

/// A `TextProperty`, which is kept as opaque bytes.
pub fn localized_text(name: &str, raw: &[u8]) -> Vec<u8> {
    tag(name, "TextProperty", &[], raw)
}

pub fn save(properties: &[Vec<u8>]) -> Vec<u8> {
    let mut out = header();
    out.extend(property_list(properties));
    out.extend_from_slice(&TRAILER);
    out
}

fn item(code: &str, second: &str, count: i32, slot: &str, weapon: bool, unique_id: i32) -> Vec<Vec<u8>> {
    let mut fields = vec![
        name("FirstCodeName_0", code),
        name("SecondCodeName_0", second),
        int("Count_0", count),
        enumeration("EquipItemSlotType_0", "ELEquipSlotType", slot),
        boolean("bIsWeapon_0", weapon),
    ];
    if weapon {
        fields.push(int("SharpnessPoint_0", 100));
    }
    fields.push(int("UniqueId_0", unique_id));
    fields
}

fn stat(tail: &str, value: i32) -> Vec<Vec<u8>> {
    vec![
        enumeration("StatType_0", "ELFirstStat", &format!("ELFirstStat::{tail}")),
        int("StatData_0", value),
    ]
}

fn quest(code: &str, state: &str, step: i32) -> Vec<Vec<u8>> {
    vec![
        name("QuestCodeName_0", code),
        enumeration("QuestState_0", "ELQuestState", &format!("ELQuestState::{state}")),
        int("QuestStep_0", step),
    ]
}

fn spot(code: &str, state: &str) -> Vec<Vec<u8>> {
    vec![
        name("TeleportObjectCodeName_0", code),
        enumeration(
            "StargazerType_0",
            "ELStargazerType",
            &format!("ELStargazerType::{state}"),
        ),
    ]
}

pub const SLOT_PATH: &str = "/76561198000000001/SaveData-1_Character_0";

/// A character save with stats, a small inventory, two quests and two
/// stargazers, plus one property the codec keeps raw.
pub fn character_save() -> Vec<u8> {
    let items = vec![
        item("Quartz", "None", 4, "ELEquipSlotType::E_NONE", false, 0),
        item("Consume_Heal_Cell", "None", 3, "ELEquipSlotType::E_NONE", false, 0),
        item(
            "WP_PC_HND_Saber",
            "WP_PC_BLD_Saber",
            1,
            "ELEquipSlotType::E_WEAPON_1",
            true,
            1,
        ),
        item("Consume_Heal_Cell", "None", 2, "ELEquipSlotType::E_NONE", false, 0),
        item("Consume_BossErgo_Scrapped_Watchman", "None", 1, "ELEquipSlotType::E_NONE", false, 0),
    ];

    let character = strukt(
        "CharacterSaveData_0",
        "LCharacterSaveData",
        &[
            int("PlayerLevel_0", 42),
            int64("AcquisitionSoul_0", 150_000),
            int("HumanityLevel_0", 3),
            int("NewGamePlus_Round_0", 0),
            int("YouDieCount_0", 17),
            double("CharacterPlayTime_0", 7265.5),
            name("DefaultStatCodeName_0", "balance"),
            boolean("bAttachedPCLamp_0", true),
            int("SecondStat_HeadthPoint_0", 600),
            struct_array(
                "FirstStatSimpleList_0",
                "LFirstStatSimpleData",
                &[stat("E_VITALITY", 12), stat("E_MOTIVITY", 20)],
            ),
            strukt(
                "CharacterItem_0",
                "LCharacterItemSaveData",
                &[struct_array("PlayerItems_0", "LPlayerItemData", &items)],
            ),
            name("LatestLocationName_0", "LD_Krat_Station"),
            name("LatestPersistentLevelName_0", "LV_Krat_Central_Station"),
            strukt(
                "LatestTransform_0",
                "Transform",
                &[
                    reals("Translation_0", "Vector", &[100.0, -250.5, 30.0]),
                    reals("Rotation_0", "Quat", &[0.0, 0.0, 0.7071, 0.7071]),
                ],
            ),
            name("RespawnTeleportObject_0", "LD_Krat_Station"),
        ],
    );

    let quests = strukt(
        "QuestSaveData_0",
        "LQuestSaveData",
        &[struct_array(
            "QuestList_0",
            "LQuestData",
            &[
                quest("Q_Main_Venigni", "E_IN_PROGRESS", 2),
                quest("Q_Sub_Antonia", "E_INACTIVE", 0),
            ],
        )],
    );

    let spots = strukt(
        "SpotSaveData_0",
        "LSpotSaveData",
        &[struct_array(
            "TeleportObjectSpotList_0",
            "LTeleportObjectSpotData",
            &[
                spot("LD_Krat_Station", "E_ACTIVE"),
                spot("LD_Hotel_Krat", "E_NONE"),
            ],
        )],
    );

    save(&[
        text("SlotName_0", SLOT_PATH),
        character,
        quests,
        spots,
        localized_text("PlayerDescription_0", &[0, 0, 0, 0, 0xFF, 1, 0, 0, 0, 0]),
    ])
}
