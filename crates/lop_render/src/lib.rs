use std::fmt::Write as _;

use lop_core::core_api::{CharacterEntry, Session, StatEntry, WeaponPartsDb};
use lop_core::profile::builds::WeaponBuild;
use lop_core::profile::character::format_play_time;
use lop_core::profile::currency::CurrencyRow;
use lop_core::profile::fast_travel::{Spot, StargazerState};
use lop_core::profile::inventory::InventoryItem;
use lop_core::profile::missions::{QuestRow, QuestState};
use serde_json::{Map as JsonMap, Value as JsonValue};

const SHEET_WIDTH: usize = 76;
const TWO_COL_WIDTH_LEFT: usize = 38;
const INVENTORY_COL_WIDTH_CODE: usize = 40;
const INVENTORY_COL_WIDTH_CATEGORY: usize = 14;
const QUEST_COL_WIDTH_NAME: usize = 44;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    CanonicalV1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    #[default]
    Summary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextRenderOptions {
    /// List every inventory row, quest and stargazer instead of totals.
    pub verbose: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldSelection {
    pub slot: bool,
    pub level: bool,
    pub ergo: bool,
    pub humanity: bool,
    pub ng_plus: bool,
    pub deaths: bool,
    pub play_time: bool,
    pub starting_build: bool,
    pub lamp: bool,
    pub character: bool,
    pub stats: bool,
    pub currency: bool,
    pub inventory: bool,
    pub builds: bool,
    pub quests: bool,
    pub stargazers: bool,
    pub position: bool,
}

impl FieldSelection {
    pub fn is_any_selected(&self) -> bool {
        self.slot
            || self.level
            || self.ergo
            || self.humanity
            || self.ng_plus
            || self.deaths
            || self.play_time
            || self.starting_build
            || self.lamp
            || self.character
            || self.stats
            || self.currency
            || self.inventory
            || self.builds
            || self.quests
            || self.stargazers
            || self.position
    }
}

pub fn render_json_full(session: &Session, style: JsonStyle) -> JsonValue {
    render_json_full_with_parts(session, style, None)
}

/// Full JSON view; weapon builds get part names from `parts` when given.
pub fn render_json_full_with_parts(
    session: &Session,
    style: JsonStyle,
    parts: Option<&WeaponPartsDb>,
) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(default_json(session, parts)),
    }
}

pub fn render_json_selected(
    session: &Session,
    fields: &FieldSelection,
    style: JsonStyle,
) -> JsonValue {
    render_json_selected_with_parts(session, fields, style, None)
}

pub fn render_json_selected_with_parts(
    session: &Session,
    fields: &FieldSelection,
    style: JsonStyle,
    parts: Option<&WeaponPartsDb>,
) -> JsonValue {
    match style {
        JsonStyle::CanonicalV1 => JsonValue::Object(selected_json(fields, session, parts)),
    }
}

pub fn render_text(session: &Session, style: TextStyle) -> String {
    render_text_with_options(session, style, TextRenderOptions::default())
}

pub fn render_text_with_options(
    session: &Session,
    style: TextStyle,
    options: TextRenderOptions,
) -> String {
    match style {
        TextStyle::Summary => render_summary_impl(session, options),
    }
}

fn opt_i64(v: Option<i64>) -> JsonValue {
    v.map(JsonValue::from).unwrap_or(JsonValue::Null)
}

fn opt_string(v: Option<&str>) -> JsonValue {
    v.map(|s| JsonValue::String(s.to_string()))
        .unwrap_or(JsonValue::Null)
}

fn slot_to_json(session: &Session) -> JsonValue {
    let Some(slot) = session.snapshot().slot else {
        return JsonValue::Null;
    };
    let mut m = JsonMap::new();
    m.insert("guid".to_string(), JsonValue::String(slot.guid.clone()));
    m.insert("slot".to_string(), JsonValue::String(slot.slot.clone()));
    m.insert("path".to_string(), JsonValue::String(slot.to_path()));
    JsonValue::Object(m)
}

fn play_time_to_json(seconds: Option<f64>) -> JsonValue {
    match seconds {
        Some(s) => JsonValue::String(format_play_time(s)),
        None => JsonValue::Null,
    }
}

fn selected_json(
    fields: &FieldSelection,
    session: &Session,
    parts: Option<&WeaponPartsDb>,
) -> JsonMap<String, JsonValue> {
    let snapshot = session.snapshot();
    let mut out = JsonMap::new();

    if fields.slot {
        out.insert("slot".to_string(), slot_to_json(session));
    }
    if fields.level {
        out.insert("level".to_string(), opt_i64(snapshot.level));
    }
    if fields.ergo {
        out.insert("ergo".to_string(), opt_i64(snapshot.ergo));
    }
    if fields.humanity {
        out.insert(
            "humanity_level".to_string(),
            opt_i64(snapshot.humanity_level),
        );
    }
    if fields.ng_plus {
        out.insert("ng_plus".to_string(), opt_i64(snapshot.ng_plus));
    }
    if fields.deaths {
        out.insert("deaths".to_string(), opt_i64(snapshot.deaths));
    }
    if fields.play_time {
        out.insert(
            "play_time".to_string(),
            play_time_to_json(snapshot.play_time_seconds),
        );
    }
    if fields.starting_build {
        out.insert(
            "starting_build".to_string(),
            opt_string(snapshot.starting_build.map(|b| b.as_str())),
        );
    }
    if fields.lamp {
        out.insert(
            "lamp_attached".to_string(),
            snapshot
                .lamp_attached
                .map(JsonValue::Bool)
                .unwrap_or(JsonValue::Null),
        );
    }
    if fields.character {
        out.insert("character".to_string(), character_to_json(session));
    }
    if fields.stats {
        out.insert(
            "primary_stats".to_string(),
            stats_to_json(&session.primary_stats()),
        );
        out.insert(
            "secondary_stats".to_string(),
            stats_to_json(&session.secondary_stats()),
        );
    }
    if fields.currency {
        out.insert("currency".to_string(), currency_to_json(&session.currency()));
    }
    if fields.inventory {
        out.insert(
            "inventory".to_string(),
            inventory_to_json(&session.inventory()),
        );
    }
    if fields.builds {
        out.insert("builds".to_string(), builds_to_json(&session.builds(), parts));
    }
    if fields.quests {
        out.insert("quests".to_string(), quests_to_json(&session.quests()));
    }
    if fields.stargazers {
        out.insert("stargazers".to_string(), spots_to_json(&session.spots()));
    }
    if fields.position {
        out.insert("position".to_string(), position_to_json(session));
    }

    out
}

fn default_json(session: &Session, parts: Option<&WeaponPartsDb>) -> JsonMap<String, JsonValue> {
    let snapshot = session.snapshot();
    let mut out = JsonMap::new();

    out.insert(
        "save_game_class".to_string(),
        opt_string(snapshot.save_game_class.as_deref()),
    );
    out.insert(
        "engine_version".to_string(),
        JsonValue::String(snapshot.engine_version.clone()),
    );
    out.insert(
        "save_game_version".to_string(),
        JsonValue::from(snapshot.save_game_version),
    );
    out.insert("slot".to_string(), slot_to_json(session));
    out.insert("level".to_string(), opt_i64(snapshot.level));
    out.insert("ergo".to_string(), opt_i64(snapshot.ergo));
    out.insert(
        "humanity_level".to_string(),
        opt_i64(snapshot.humanity_level),
    );
    out.insert("ng_plus".to_string(), opt_i64(snapshot.ng_plus));
    out.insert("deaths".to_string(), opt_i64(snapshot.deaths));
    out.insert(
        "play_time".to_string(),
        play_time_to_json(snapshot.play_time_seconds),
    );
    out.insert(
        "starting_build".to_string(),
        opt_string(snapshot.starting_build.map(|b| b.as_str())),
    );
    out.insert(
        "lamp_attached".to_string(),
        snapshot
            .lamp_attached
            .map(JsonValue::Bool)
            .unwrap_or(JsonValue::Null),
    );
    out.insert("character".to_string(), character_to_json(session));
    out.insert(
        "primary_stats".to_string(),
        stats_to_json(&session.primary_stats()),
    );
    out.insert(
        "secondary_stats".to_string(),
        stats_to_json(&session.secondary_stats()),
    );
    out.insert("currency".to_string(), currency_to_json(&session.currency()));
    out.insert(
        "boss_ergo_total".to_string(),
        JsonValue::from(session.boss_ergo_total()),
    );
    out.insert(
        "inventory".to_string(),
        inventory_to_json(&session.inventory()),
    );
    out.insert("builds".to_string(), builds_to_json(&session.builds(), parts));
    out.insert("quests".to_string(), quests_to_json(&session.quests()));
    out.insert("stargazers".to_string(), spots_to_json(&session.spots()));
    out.insert("position".to_string(), position_to_json(session));
    out.insert(
        "root_property_count".to_string(),
        JsonValue::from(snapshot.root_property_count),
    );

    out
}

fn character_to_json(session: &Session) -> JsonValue {
    JsonValue::Array(
        session
            .character_fields()
            .iter()
            .map(|f: &CharacterEntry| {
                let mut m = JsonMap::new();
                m.insert("name".to_string(), JsonValue::String(f.name.clone()));
                m.insert("label".to_string(), JsonValue::String(f.label.clone()));
                m.insert("value".to_string(), opt_i64(f.value));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn stats_to_json(stats: &[StatEntry]) -> JsonValue {
    JsonValue::Array(
        stats
            .iter()
            .map(|s| {
                let mut m = JsonMap::new();
                m.insert("name".to_string(), JsonValue::String(s.name.clone()));
                m.insert("label".to_string(), JsonValue::String(s.label.clone()));
                m.insert("value".to_string(), opt_i64(s.value));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn currency_to_json(rows: &[CurrencyRow]) -> JsonValue {
    JsonValue::Array(
        rows.iter()
            .map(|r| {
                let mut m = JsonMap::new();
                m.insert("id".to_string(), JsonValue::String(r.id.clone()));
                m.insert("label".to_string(), JsonValue::String(r.label.clone()));
                m.insert("total".to_string(), JsonValue::from(r.total));
                m.insert(
                    "codes".to_string(),
                    JsonValue::Array(r.codes.iter().cloned().map(JsonValue::String).collect()),
                );
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn inventory_to_json(items: &[InventoryItem]) -> JsonValue {
    JsonValue::Array(
        items
            .iter()
            .map(|item| {
                let mut m = JsonMap::new();
                m.insert("index".to_string(), JsonValue::from(item.index));
                m.insert("code".to_string(), JsonValue::String(item.code.clone()));
                if let Some(second) = &item.second_code {
                    m.insert("second_code".to_string(), JsonValue::String(second.clone()));
                }
                m.insert("count".to_string(), JsonValue::from(item.count));
                m.insert(
                    "category".to_string(),
                    JsonValue::String(item.category.label().to_string()),
                );
                m.insert("slot".to_string(), JsonValue::String(item.slot.clone()));
                m.insert("is_weapon".to_string(), JsonValue::Bool(item.is_weapon));
                if let Some(sharpness) = item.sharpness {
                    m.insert("sharpness".to_string(), JsonValue::from(sharpness));
                }
                if let Some(unique_id) = item.unique_id {
                    m.insert("unique_id".to_string(), JsonValue::from(unique_id));
                }
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn part_name(parts: Option<&WeaponPartsDb>, code: &str) -> Option<String> {
    parts?
        .lookup(code)
        .map(|p| p.name.trim().to_string())
        .filter(|n| !n.is_empty())
}

fn builds_to_json(builds: &[WeaponBuild], parts: Option<&WeaponPartsDb>) -> JsonValue {
    JsonValue::Array(
        builds
            .iter()
            .map(|b| {
                let mut m = JsonMap::new();
                m.insert("index".to_string(), JsonValue::from(b.index));
                m.insert("handle".to_string(), JsonValue::String(b.handle.clone()));
                if let Some(name) = part_name(parts, &b.handle) {
                    m.insert("handle_name".to_string(), JsonValue::String(name));
                }
                m.insert("blade".to_string(), JsonValue::String(b.blade.clone()));
                if let Some(name) = part_name(parts, &b.blade) {
                    m.insert("blade_name".to_string(), JsonValue::String(name));
                }
                m.insert("slot".to_string(), JsonValue::String(b.slot.clone()));
                m.insert("sharpness".to_string(), JsonValue::from(b.sharpness));
                m.insert("unique_id".to_string(), opt_i64(b.unique_id));
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn quests_to_json(quests: &[QuestRow]) -> JsonValue {
    JsonValue::Array(
        quests
            .iter()
            .map(|q| {
                let mut m = JsonMap::new();
                m.insert("index".to_string(), JsonValue::from(q.index));
                m.insert("name".to_string(), JsonValue::String(q.name.clone()));
                m.insert(
                    "state".to_string(),
                    opt_string(q.state.as_ref().map(QuestState::as_str)),
                );
                m.insert(
                    "raw_state".to_string(),
                    JsonValue::String(q.raw_state.clone()),
                );
                m.insert(
                    "progress".to_string(),
                    JsonValue::Array(
                        q.progress
                            .iter()
                            .map(|p| {
                                let mut pm = JsonMap::new();
                                pm.insert("label".to_string(), JsonValue::String(p.label.clone()));
                                pm.insert("path".to_string(), JsonValue::String(p.path.to_string()));
                                pm.insert("value".to_string(), JsonValue::from(p.value));
                                JsonValue::Object(pm)
                            })
                            .collect(),
                    ),
                );
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn spots_to_json(spots: &[Spot]) -> JsonValue {
    JsonValue::Array(
        spots
            .iter()
            .map(|s| {
                let mut m = JsonMap::new();
                m.insert("code".to_string(), JsonValue::String(s.code.clone()));
                m.insert("label".to_string(), JsonValue::String(s.label.clone()));
                m.insert(
                    "state".to_string(),
                    opt_string(s.state.as_ref().map(StargazerState::as_str)),
                );
                JsonValue::Object(m)
            })
            .collect(),
    )
}

fn position_to_json(session: &Session) -> JsonValue {
    let position = session.position();
    let respawn = session.respawn();
    let mut m = JsonMap::new();
    m.insert("location".to_string(), opt_string(position.location.as_deref()));
    m.insert("level".to_string(), opt_string(position.level.as_deref()));
    m.insert(
        "translation".to_string(),
        position
            .translation
            .map(|v| JsonValue::from(vec![v.x, v.y, v.z]))
            .unwrap_or(JsonValue::Null),
    );
    m.insert(
        "rotation".to_string(),
        position
            .rotation
            .map(|q| JsonValue::from(vec![q.x, q.y, q.z, q.w]))
            .unwrap_or(JsonValue::Null),
    );
    m.insert("respawn".to_string(), opt_string(respawn.teleport.as_deref()));
    m.insert(
        "torsion_coil".to_string(),
        opt_string(respawn.torsion_coil.as_deref()),
    );
    JsonValue::Object(m)
}

fn render_summary_impl(session: &Session, options: TextRenderOptions) -> String {
    let snapshot = session.snapshot();

    let mut out = String::new();
    writeln!(&mut out).expect("writing to String cannot fail");
    writeln!(&mut out, "{}", centered_no_trailing("LIES OF P", SHEET_WIDTH))
        .expect("writing to String cannot fail");
    writeln!(&mut out, "{}", centered_no_trailing("SAVE SUMMARY", SHEET_WIDTH))
        .expect("writing to String cannot fail");
    let engine_line = format!(
        "Engine {}  Save v{}",
        snapshot.engine_version, snapshot.save_game_version
    );
    writeln!(&mut out, "{}", centered_no_trailing(&engine_line, SHEET_WIDTH))
        .expect("writing to String cannot fail");
    writeln!(&mut out).expect("writing to String cannot fail");

    let slot = snapshot
        .slot
        .as_ref()
        .map(|s| s.to_path())
        .unwrap_or_else(|| "-".to_string());
    writeln!(&mut out, "  Slot: {slot}").expect("writing to String cannot fail");
    let play_time = snapshot
        .play_time_seconds
        .map(format_play_time)
        .unwrap_or_else(|| "-".to_string());
    let build = snapshot
        .starting_build
        .map(|b| b.as_str())
        .unwrap_or("-");
    writeln!(
        &mut out,
        "  {:<width$}Play Time: {play_time}",
        format!("Build: {build}"),
        width = TWO_COL_WIDTH_LEFT - 2
    )
    .expect("writing to String cannot fail");
    writeln!(&mut out).expect("writing to String cannot fail");

    writeln!(&mut out, " ::: Character :::").expect("writing to String cannot fail");
    let character: Vec<(String, String)> = session
        .character_fields()
        .into_iter()
        .map(|f| (f.label, f.value.map(format_number_with_commas).unwrap_or_else(|| "-".to_string())))
        .collect();
    write_two_column_grid(&mut out, &character);
    writeln!(&mut out).expect("writing to String cannot fail");

    writeln!(&mut out, " ::: Attributes :::").expect("writing to String cannot fail");
    let stats: Vec<(String, String)> = session
        .primary_stats()
        .into_iter()
        .chain(session.secondary_stats())
        .map(|s| (s.label, s.value.map(format_number_with_commas).unwrap_or_else(|| "-".to_string())))
        .collect();
    write_two_column_grid(&mut out, &stats);
    writeln!(&mut out).expect("writing to String cannot fail");

    writeln!(&mut out, " ::: Currency :::").expect("writing to String cannot fail");
    let currency: Vec<(String, String)> = session
        .currency()
        .into_iter()
        .filter(|r| r.total != 0 || options.verbose)
        .map(|r| (r.label, format_number_with_commas(r.total)))
        .collect();
    if currency.is_empty() {
        writeln!(&mut out, "  none").expect("writing to String cannot fail");
    } else {
        write_two_column_grid(&mut out, &currency);
    }
    writeln!(&mut out).expect("writing to String cannot fail");

    write_inventory_section(&mut out, &session.inventory(), options.verbose);
    write_quest_section(&mut out, &session.quests(), options.verbose);
    write_stargazer_section(&mut out, &session.spots(), options.verbose);

    out
}

fn write_two_column_grid(out: &mut String, cells: &[(String, String)]) {
    for pair in cells.chunks(2) {
        let mut line = String::new();
        for (i, (label, value)) in pair.iter().enumerate() {
            let cell = format!("{label}: {value}");
            if i == 0 {
                line.push_str(&format!(
                    "  {:<width$}",
                    fit_column(&cell, TWO_COL_WIDTH_LEFT - 3),
                    width = TWO_COL_WIDTH_LEFT - 2
                ));
            } else {
                line.push_str(&cell);
            }
        }
        writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
    }
}

fn write_inventory_section(out: &mut String, items: &[InventoryItem], verbose: bool) {
    writeln!(out, " ::: Inventory ({} rows) :::", items.len())
        .expect("writing to String cannot fail");
    if items.is_empty() {
        writeln!(out, "  none").expect("writing to String cannot fail");
        writeln!(out).expect("writing to String cannot fail");
        return;
    }

    if !verbose {
        let mut per_category: Vec<(String, usize)> = Vec::new();
        for item in items {
            let label = item.category.label();
            match per_category.iter().position(|(l, _)| l == label) {
                Some(at) => per_category[at].1 += 1,
                None => per_category.push((label.to_string(), 1)),
            }
        }
        let cells: Vec<(String, String)> = per_category
            .into_iter()
            .map(|(label, n)| (label, n.to_string()))
            .collect();
        write_two_column_grid(out, &cells);
        writeln!(out).expect("writing to String cannot fail");
        return;
    }

    for item in items {
        let code = match &item.second_code {
            Some(second) => format!("{} + {second}", item.code),
            None => item.code.clone(),
        };
        let equipped = if item.is_equipped() { "  *" } else { "" };
        let line = format!(
            "  {:<a$}{:<b$}x{}{equipped}",
            fit_column(&code, INVENTORY_COL_WIDTH_CODE - 1),
            fit_column(item.category.label(), INVENTORY_COL_WIDTH_CATEGORY - 1),
            format_number_with_commas(item.count),
            a = INVENTORY_COL_WIDTH_CODE,
            b = INVENTORY_COL_WIDTH_CATEGORY
        );
        writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
    }
    writeln!(out).expect("writing to String cannot fail");
}

fn write_quest_section(out: &mut String, quests: &[QuestRow], verbose: bool) {
    let done = quests
        .iter()
        .filter(|q| q.state == Some(QuestState::CompleteSuccess))
        .count();
    writeln!(out, " ::: Quests ({done}/{} complete) :::", quests.len())
        .expect("writing to String cannot fail");
    let shown: Vec<&QuestRow> = quests
        .iter()
        .filter(|q| verbose || q.state == Some(QuestState::InProgress))
        .collect();
    if shown.is_empty() {
        writeln!(out, "  none in progress").expect("writing to String cannot fail");
    }
    for quest in shown {
        let state = quest
            .state
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| quest.raw_state.clone());
        let line = format!(
            "  {:<w$}{state}",
            fit_column(&quest.name, QUEST_COL_WIDTH_NAME - 1),
            w = QUEST_COL_WIDTH_NAME
        );
        writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
    }
    writeln!(out).expect("writing to String cannot fail");
}

fn write_stargazer_section(out: &mut String, spots: &[Spot], verbose: bool) {
    let unlocked = spots
        .iter()
        .filter(|s| matches!(s.state, Some(StargazerState::Active | StargazerState::ActiveIdle)))
        .count();
    writeln!(out, " ::: Stargazers ({unlocked}/{} unlocked) :::", spots.len())
        .expect("writing to String cannot fail");
    if verbose {
        for spot in spots {
            let state = spot.state.map(|s| s.as_str()).unwrap_or(spot.raw_state.as_str());
            let line = format!(
                "  {:<w$}{state}",
                fit_column(&spot.label, QUEST_COL_WIDTH_NAME - 1),
                w = QUEST_COL_WIDTH_NAME
            );
            writeln!(out, "{}", line.trim_end()).expect("writing to String cannot fail");
        }
    }
}

fn fit_column(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }

    let mut out: String = value.chars().take(width - 3).collect();
    out.push_str("...");
    out
}

fn centered_no_trailing(value: &str, width: usize) -> String {
    let len = value.chars().count();
    if len >= width {
        return value.to_string();
    }
    format!("{}{}", " ".repeat((width - len) / 2), value)
}

fn format_number_with_commas(n: i64) -> String {
    if n < 0 {
        return format!("-{}", format_number_with_commas(n.saturating_neg()));
    }
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}
