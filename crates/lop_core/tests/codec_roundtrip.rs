mod common;

use std::io::{Cursor, ErrorKind};

use lop_core::gvas::{Document, PropertyValue, StructValue};
use lop_core::layout::SectionId;
use lop_core::profile::character::{self, CharacterField};
use lop_core::storage;

fn parse(bytes: &[u8]) -> Document {
    Document::parse_with_layout(Cursor::new(bytes)).expect("failed to parse GVAS fixture")
}

#[test]
fn character_save_round_trips_byte_for_byte() {
    let bytes = common::character_save();
    let doc = parse(&bytes);

    assert!(doc.roundtrip_exact());
    assert_eq!(doc.to_bytes_modified().expect("failed to encode"), bytes);
    assert_eq!(doc.to_bytes_unmodified().expect("failed to copy"), bytes);
    assert_eq!(doc.trailer, common::TRAILER);
    assert_eq!(doc.header.save_game_class.as_deref(), Some(common::SAVE_CLASS));
    assert_eq!(doc.header.engine_label(), "5.1.1-0");
    assert!(doc.header.large_world_coordinates());
}

#[test]
fn layout_covers_the_whole_file() {
    let bytes = common::character_save();
    let doc = parse(&bytes);
    let layout = doc.layout();

    assert_eq!(layout.file_len, bytes.len());
    assert_eq!(layout.sections.first().map(|s| s.id), Some(SectionId::Header));
    let labels: Vec<&str> = layout
        .sections
        .iter()
        .filter_map(|s| s.label.as_deref())
        .collect();
    assert_eq!(
        labels,
        [
            "SlotName_0",
            "CharacterSaveData_0",
            "QuestSaveData_0",
            "SpotSaveData_0",
            "PlayerDescription_0"
        ]
    );
    assert_eq!(doc.section_bytes(SectionId::Tail), Some(&common::TRAILER[..]));
    assert_eq!(
        doc.section_bytes(SectionId::Header),
        Some(common::header().as_slice())
    );
}

#[test]
fn unknown_property_types_are_kept_raw() {
    let doc = parse(&common::character_save());
    assert_eq!(doc.raw_property_count(), 1);
    match doc.root.get("PlayerDescription_0") {
        Some(PropertyValue::Raw(raw)) => {
            assert_eq!(raw.type_name, "TextProperty");
            assert!(raw.header.is_empty());
            assert_eq!(raw.payload.len(), 10);
        }
        other => panic!("expected raw TextProperty, got {other:?}"),
    }
}

#[test]
fn typed_values_keep_their_width() {
    let doc = parse(&common::character_save());
    let ch = doc
        .root
        .get("CharacterSaveData_0")
        .and_then(PropertyValue::as_struct)
        .expect("character struct");
    assert_eq!(ch.get("PlayerLevel_0"), Some(&PropertyValue::Int(42)));
    assert_eq!(ch.get("AcquisitionSoul_0"), Some(&PropertyValue::Int64(150_000)));
    assert_eq!(ch.get("CharacterPlayTime_0"), Some(&PropertyValue::Double(7265.5)));

    let transform = ch
        .get("LatestTransform_0")
        .and_then(PropertyValue::as_struct)
        .expect("transform struct");
    match transform.get("Translation_0") {
        Some(PropertyValue::Struct {
            value: StructValue::Vector(v),
            ..
        }) => assert_eq!((v.x, v.y, v.z), (100.0, -250.5, 30.0)),
        other => panic!("expected vector, got {other:?}"),
    }
}

#[test]
fn editing_one_field_changes_only_its_bytes() {
    let bytes = common::character_save();
    let mut doc = parse(&bytes);
    assert!(character::set_field(&mut doc.root, CharacterField::Level, 43).expect("failed to edit"));

    let edited = doc.to_bytes_modified().expect("failed to encode");
    assert_eq!(edited.len(), bytes.len());
    let differing = bytes.iter().zip(&edited).filter(|(a, b)| a != b).count();
    assert_eq!(differing, 1);

    let reparsed = parse(&edited);
    assert!(reparsed.roundtrip_exact());
    assert_eq!(character::field(&reparsed.root, CharacterField::Level), Some(43));
    assert_eq!(reparsed.raw_property_count(), 1);
}

#[test]
fn wide_strings_survive_a_rebuild() {
    let mut doc = parse(&common::character_save());
    doc.root
        .insert("Nickname_0", PropertyValue::Str(Some("ピノキオ".to_string())));
    doc.root.insert("Latin_0", PropertyValue::Str(Some("Krat café".to_string())));

    let rebuilt = Document::from_parts(doc.header.clone(), doc.root.clone(), doc.trailer.clone())
        .expect("failed to rebuild");
    assert!(rebuilt.roundtrip_exact());
    assert_eq!(
        rebuilt.root.get("Nickname_0").and_then(PropertyValue::as_str),
        Some("ピノキオ")
    );
    assert_eq!(
        rebuilt.root.get("Latin_0").and_then(PropertyValue::as_str),
        Some("Krat café")
    );
}

#[test]
fn non_finite_floats_survive_json_export_and_import() {
    let weird = f64::from_bits(0x7FF8_0000_0000_0042);
    let bytes = common::save(&[
        common::double("Weird_0", weird),
        common::reals("Translation_0", "Vector", &[f64::INFINITY, 1.0, f64::NAN]),
        common::int("PlayerLevel_0", 5),
    ]);
    let doc = parse(&bytes);
    assert!(doc.roundtrip_exact());

    let text = serde_json::to_string(&doc.to_json()).expect("export should serialize");
    let exported: serde_json::Value = serde_json::from_str(&text).expect("export is JSON");
    let rebuilt = storage::import_json(&doc, &exported, None).expect("import should succeed");
    assert_eq!(rebuilt.to_bytes_modified().expect("failed to encode"), bytes);
}

#[test]
fn rejects_foreign_and_unsupported_headers() {
    let mut bad_magic = common::character_save();
    bad_magic[0] = b'X';
    let err = Document::parse_with_layout(Cursor::new(bad_magic)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);

    let mut old_version = common::character_save();
    old_version[4..8].copy_from_slice(&1i32.to_le_bytes());
    let err = Document::parse_with_layout(Cursor::new(old_version)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);

    let mut new_tags = common::character_save();
    new_tags[12..16].copy_from_slice(&1012i32.to_le_bytes());
    let err = Document::parse_with_layout(Cursor::new(new_tags)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn truncated_file_is_an_error() {
    let bytes = common::character_save();
    let cut = &bytes[..bytes.len() / 2];
    assert!(Document::parse_with_layout(Cursor::new(cut)).is_err());
}
