//! Quest discovery, state/progress edits and name-matched import.
//!
//! Quest layouts vary between game versions, so rows are located by key
//! names rather than fixed paths: the quest list is looked up under
//! `QuestSaveData_0`, each quest's name and state by a set of known keys,
//! and every integer below a quest is offered as a progress value.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::path::{FieldPath, NodeMut, NodeRef, Segment, resolve, resolve_mut, walk};
use super::{invalid_input, normalize_code, not_found, retarget_enum, text_of, write_text};
use crate::gvas::{PropertyMap, PropertyValue, StructValue};

const QUEST_ROOT_KEYS: [&str; 4] = [
    "QuestSaveData_0",
    "QuestSaveData",
    "Quest_Save_Data_0",
    "Quest_Save_Data",
];
const QUEST_LIST_KEYS: [&str; 4] = ["QuestList_0", "QuestList", "Quests", "StoryQuests"];
const STATE_KEYS: [&str; 6] = [
    "QuestState_0",
    "State",
    "QuestState",
    "ElQuestState",
    "EQuestState",
    "Quest_State_0",
];
const NAME_KEYS: [&str; 6] = [
    "QuestCodeName_0",
    "QuestName_0",
    "Name",
    "CodeName",
    "QuestId_0",
    "QuestID",
];

pub const QUEST_EXPORT_VERSION: u32 = 5;
pub const QUEST_EXPORT_MODE: &str = "match_by_name_smart";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestState {
    Inactive,
    InProgress,
    CompleteSuccess,
    CompleteFail,
}

impl QuestState {
    pub const ALL: [QuestState; 4] = [
        Self::Inactive,
        Self::InProgress,
        Self::CompleteSuccess,
        Self::CompleteFail,
    ];

    pub fn tail(&self) -> &'static str {
        match *self {
            Self::Inactive => "E_INACTIVE",
            Self::InProgress => "E_IN_PROGRESS",
            Self::CompleteSuccess => "E_COMPLETE_SUCCESS",
            Self::CompleteFail => "E_COMPLETE_FAIL",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Inactive => "Inactive",
            Self::InProgress => "In Progress",
            Self::CompleteSuccess => "Complete Success",
            Self::CompleteFail => "Complete Fail",
        }
    }

    /// Integer form used by saves that store the state as a number.
    pub fn code(&self) -> i64 {
        match *self {
            Self::Inactive => 0,
            Self::InProgress => 1,
            Self::CompleteSuccess => 2,
            Self::CompleteFail => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// State named by a stored enum label such as `ELQuestState::E_INACTIVE`.
    pub fn from_raw(raw: &str) -> Option<Self> {
        let upper = raw.trim().replace("::", "_").to_ascii_uppercase();
        [
            Self::CompleteSuccess,
            Self::CompleteFail,
            Self::InProgress,
            Self::Inactive,
        ]
        .into_iter()
        .find(|s| upper.contains(s.tail()))
    }
}

impl fmt::Display for QuestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuestState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().replace(' ', "_").eq_ignore_ascii_case(&wanted))
            .or_else(|| Self::from_raw(s))
            .or_else(|| wanted.parse().ok().and_then(Self::from_code))
            .ok_or_else(|| format!("unknown quest state '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestProgress {
    pub path: FieldPath,
    pub label: String,
    pub sig: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestRow {
    pub index: usize,
    pub name: String,
    pub state: Option<QuestState>,
    pub raw_state: String,
    pub state_path: Option<FieldPath>,
    pub progress: Vec<QuestProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    #[serde(default)]
    pub label: String,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_abs: Option<FieldPath>,
    #[serde(default)]
    pub sig: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestRecord {
    pub name: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub progress: Vec<ProgressRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestExport {
    pub version: u32,
    pub mode: String,
    #[serde(default)]
    pub exported_at: String,
    pub rows: Vec<QuestRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QuestImportReport {
    /// Quests whose state was written, plus quests added.
    pub quests: usize,
    pub progress: usize,
    pub added: usize,
}

fn key_path(key: &str) -> FieldPath {
    let mut path = FieldPath::new();
    path.push_key(key);
    path
}

fn key_matches(path: &FieldPath, keys: &[&str]) -> bool {
    path.last_key()
        .is_some_and(|k| keys.iter().any(|want| want.eq_ignore_ascii_case(k)))
}

fn looks_like_quest(entry: &PropertyMap) -> bool {
    entry.first_present(&STATE_KEYS).is_some() || entry.first_present(&NAME_KEYS).is_some()
}

/// Location of the quest list.
pub fn quests_path(root: &PropertyMap) -> Option<FieldPath> {
    let standard = root.first_present(&QUEST_ROOT_KEYS).and_then(|key| {
        let block = root.get(key)?.as_struct()?;
        let list_key = block.first_present(&QUEST_LIST_KEYS)?;
        block.get(list_key)?.as_struct_array().filter(|l| !l.is_empty())?;
        let mut path = key_path(key);
        path.push_key(list_key);
        Some(path)
    });
    if standard.is_some() {
        return standard;
    }

    let mut best: Option<(usize, FieldPath)> = None;
    walk(root, &mut |path, node| {
        let NodeRef::Value(value) = node else { return };
        let Some(list) = value.as_struct_array() else { return };
        let quest_like = list
            .first()
            .and_then(StructValue::as_properties)
            .is_some_and(looks_like_quest);
        if quest_like && best.as_ref().is_none_or(|(len, _)| list.len() > *len) {
            best = Some((list.len(), path.clone()));
        }
    });
    best.map(|(_, path)| path)
}

fn quest_list(root: &PropertyMap) -> Option<(FieldPath, &Vec<StructValue>)> {
    let path = quests_path(root)?;
    match resolve(root, &path)? {
        NodeRef::Value(v) => v.as_struct_array().map(|list| (path, list)),
        _ => None,
    }
}

fn quest_list_mut(root: &mut PropertyMap) -> io::Result<&mut Vec<StructValue>> {
    let path = quests_path(root).ok_or_else(|| not_found("quest list"))?;
    let list = match resolve_mut(root, &path) {
        Some(NodeMut::Value(v)) => v.as_struct_array_mut(),
        _ => None,
    };
    list.ok_or_else(|| not_found("quest list"))
}

/// Relative path of the first property named by `keys`, direct children
/// first, then depth-first.
fn find_key(map: &PropertyMap, keys: &[&str]) -> Option<FieldPath> {
    if let Some(key) = map.first_present(keys) {
        return Some(key_path(key));
    }
    let mut found = None;
    walk(map, &mut |path, node| {
        if found.is_none() && matches!(node, NodeRef::Value(_)) && key_matches(path, keys) {
            found = Some(path.clone());
        }
    });
    found
}

fn find_state_enum(map: &PropertyMap) -> Option<FieldPath> {
    let mut found = None;
    walk(map, &mut |path, node| {
        if found.is_some() {
            return;
        }
        let NodeRef::Value(value) = node else { return };
        let text = value.as_enum().or_else(|| value.as_str()).unwrap_or_default();
        if text.contains("QuestState::") || text.starts_with("E_") {
            found = Some(path.clone());
        }
    });
    found
}

fn first_string(map: &PropertyMap) -> Option<String> {
    let mut found = None;
    walk(map, &mut |_, node| {
        if found.is_none() {
            if let NodeRef::Value(value) = node {
                found = value.as_str().map(str::to_string);
            }
        }
    });
    found
}

fn value_text(value: &PropertyValue) -> Option<String> {
    value
        .as_str()
        .or_else(|| value.as_enum())
        .map(str::to_string)
        .or_else(|| value.as_i64().map(|n| n.to_string()))
}

fn value_at<'a>(map: &'a PropertyMap, rel: &FieldPath) -> Option<&'a PropertyValue> {
    match resolve(map, rel)? {
        NodeRef::Value(v) => Some(v),
        _ => None,
    }
}

fn tokens(path: &FieldPath) -> Vec<String> {
    path.segments()
        .iter()
        .map(|s| match s {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        })
        .collect()
}

/// Readable label from the last three path segments, indices attached to
/// the key before them: `Objectives_0[1].Count_0`.
pub fn progress_label(rel: &FieldPath) -> String {
    let segments = rel.segments();
    let tail = &segments[segments.len().saturating_sub(3)..];
    let mut out: Vec<String> = Vec::new();
    for segment in tail {
        match (segment, out.last_mut()) {
            (Segment::Index(i), Some(last)) => last.push_str(&format!("[{i}]")),
            (Segment::Index(i), None) => out.push(format!("[{i}]")),
            (Segment::Key(k), _) => out.push(k.clone()),
        }
    }
    if out.is_empty() {
        "value".to_string()
    } else {
        out.join(".")
    }
}

/// Last two path segments, lowercased and joined with `/`.
pub fn progress_sig(path: &FieldPath) -> String {
    let tokens = tokens(path);
    tokens[tokens.len().saturating_sub(2)..].join("/").to_lowercase()
}

fn collect_progress(entry: &PropertyMap, base: &FieldPath) -> Vec<QuestProgress> {
    let mut out = Vec::new();
    walk(entry, &mut |rel, node| {
        let value = match node {
            NodeRef::Value(v) => v.as_i64(),
            NodeRef::Element(e) => e.as_i64(),
            _ => None,
        };
        if let Some(value) = value {
            let path = base.join(rel);
            out.push(QuestProgress {
                label: progress_label(rel),
                sig: progress_sig(&path),
                path,
                value,
            });
        }
    });
    out
}

fn read_row(index: usize, base: FieldPath, entry: &PropertyMap) -> QuestRow {
    let state_rel = find_key(entry, &STATE_KEYS).or_else(|| find_state_enum(entry));
    let raw_state = state_rel
        .as_ref()
        .and_then(|rel| value_at(entry, rel))
        .and_then(value_text)
        .unwrap_or_else(|| QuestState::Inactive.as_str().to_string());
    let state = raw_state
        .parse::<i64>()
        .ok()
        .and_then(QuestState::from_code)
        .or_else(|| QuestState::from_raw(&raw_state));
    let name = find_key(entry, &NAME_KEYS)
        .and_then(|rel| value_at(entry, &rel))
        .and_then(value_text)
        .filter(|n| !n.is_empty())
        .or_else(|| first_string(entry))
        .unwrap_or_default();

    QuestRow {
        index,
        name,
        state,
        raw_state,
        state_path: state_rel.map(|rel| base.join(&rel)),
        progress: collect_progress(entry, &base),
    }
}

pub fn discover_quests(root: &PropertyMap) -> Vec<QuestRow> {
    let Some((path, list)) = quest_list(root) else {
        return Vec::new();
    };
    list.iter()
        .enumerate()
        .filter_map(|(i, e)| e.as_properties().map(|p| (i, p)))
        .map(|(i, entry)| {
            let mut base = path.clone();
            base.push_index(i);
            read_row(i, base, entry)
        })
        .collect()
}

/// Write a quest state at `path` (relative to `map`). Text states keep their
/// enum namespace; numeric states take the state's integer code.
fn write_state(map: &mut PropertyMap, path: &FieldPath, state: QuestState) -> io::Result<bool> {
    let mut parent = path.clone();
    let Some(Segment::Key(key)) = parent.pop() else {
        return Err(invalid_input(format!("quest state path {path} does not name a property")));
    };
    let owner = resolve_mut(map, &parent)
        .and_then(NodeMut::into_map)
        .ok_or_else(|| not_found(&path.to_string()))?;
    if let Some(current) = text_of(owner, &key) {
        let target = retarget_enum(current, state.tail());
        return Ok(write_text(owner, &key, &target));
    }
    owner
        .get_mut(&key)
        .and_then(|v| v.set_integer(state.code()))
        .ok_or_else(|| invalid_input(format!("quest state at {path} is neither text nor integer")))
}

fn write_progress(map: &mut PropertyMap, path: &FieldPath, value: i64) -> Option<bool> {
    resolve_mut(map, path)?.set_integer(value)
}

/// Change a quest's state and/or one progress value. Without an explicit
/// path the quest's first progress value is written.
pub fn apply_quest_edit(
    root: &mut PropertyMap,
    index: usize,
    state: Option<QuestState>,
    progress: Option<(Option<FieldPath>, i64)>,
) -> io::Result<bool> {
    let row = discover_quests(root)
        .into_iter()
        .find(|r| r.index == index)
        .ok_or_else(|| not_found(&format!("quest #{index}")))?;

    let mut changed = false;
    if let Some(state) = state {
        let path = row
            .state_path
            .as_ref()
            .ok_or_else(|| not_found(&format!("state of quest '{}'", row.name)))?;
        changed |= write_state(root, path, state)?;
    }
    if let Some((path, value)) = progress {
        let target = path
            .or_else(|| row.progress.first().map(|p| p.path.clone()))
            .ok_or_else(|| not_found(&format!("progress of quest '{}'", row.name)))?;
        changed |= write_progress(root, &target, value)
            .ok_or_else(|| invalid_input(format!("{target} is not an integer")))?;
    }
    Ok(changed)
}

pub fn export_quests(root: &PropertyMap) -> QuestExport {
    let rows = discover_quests(root)
        .into_iter()
        .map(|row| QuestRecord {
            name: row.name,
            state: Some(
                row.state
                    .map(|s| s.tail().to_string())
                    .unwrap_or_else(|| row.raw_state.replace("::", "_").to_ascii_uppercase()),
            ),
            progress: row
                .progress
                .into_iter()
                .map(|p| ProgressRecord {
                    label: p.label,
                    value: p.value,
                    path_abs: Some(p.path),
                    sig: p.sig,
                })
                .collect(),
        })
        .collect();
    QuestExport {
        version: QUEST_EXPORT_VERSION,
        mode: QUEST_EXPORT_MODE.to_string(),
        exported_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        rows,
    }
}

/// First integer below `map` stored under a property named `key`.
fn find_int_by_key(map: &PropertyMap, key: &str) -> Option<FieldPath> {
    let mut found = None;
    walk(map, &mut |path, node| {
        if found.is_some() {
            return;
        }
        if let NodeRef::Value(v) = node {
            let named = path.last_key().is_some_and(|k| k.eq_ignore_ascii_case(key));
            if named && v.as_i64().is_some() {
                found = Some(path.clone());
            }
        }
    });
    found
}

/// Takes the first index from `queue` not yet used.
fn take_unused(queue: Option<&mut VecDeque<usize>>, used: &HashSet<usize>) -> Option<usize> {
    let queue = queue?;
    while let Some(i) = queue.pop_front() {
        if !used.contains(&i) {
            return Some(i);
        }
    }
    None
}

/// One matching pass: records not yet applied are paired with progress
/// values of `dst` sharing the same key, first unused value first.
fn match_pass(
    root: &mut PropertyMap,
    dst: &QuestRow,
    records: &[ProgressRecord],
    done: &mut [bool],
    used: &mut HashSet<usize>,
    key_of: impl Fn(&ProgressRecord) -> String,
) -> usize {
    let mut index: HashMap<String, VecDeque<usize>> = HashMap::new();
    for (i, p) in dst.progress.iter().enumerate() {
        let record = ProgressRecord {
            label: p.label.clone(),
            value: p.value,
            path_abs: None,
            sig: p.sig.clone(),
        };
        index.entry(key_of(&record)).or_default().push_back(i);
    }

    let mut applied = 0;
    for (i, record) in records.iter().enumerate() {
        if done[i] {
            continue;
        }
        let key = key_of(record);
        if key.is_empty() {
            continue;
        }
        let Some(slot) = take_unused(index.get_mut(&key), used) else {
            continue;
        };
        used.insert(slot);
        if write_progress(root, &dst.progress[slot].path, record.value).is_some() {
            applied += 1;
        }
        done[i] = true;
    }
    applied
}

fn import_progress(
    root: &mut PropertyMap,
    dst: &QuestRow,
    records: &[ProgressRecord],
) -> usize {
    let mut applied = 0;
    let mut done = vec![false; records.len()];

    for (i, record) in records.iter().enumerate() {
        if let Some(path) = &record.path_abs {
            if write_progress(root, path, record.value).is_some() {
                applied += 1;
                done[i] = true;
            }
        }
    }

    let mut used: HashSet<usize> = HashSet::new();
    applied += match_pass(root, dst, records, &mut done, &mut used, |r| r.label.clone());
    applied += match_pass(root, dst, records, &mut done, &mut used, |r| normalize_code(&r.label));
    applied += match_pass(root, dst, records, &mut done, &mut used, |r| r.sig.clone());

    let mut position = 0;
    for (i, record) in records.iter().enumerate() {
        if done[i] {
            continue;
        }
        while position < dst.progress.len() && used.contains(&position) {
            position += 1;
        }
        if position >= dst.progress.len() {
            break;
        }
        if write_progress(root, &dst.progress[position].path, record.value).is_some() {
            applied += 1;
        }
        used.insert(position);
        position += 1;
        done[i] = true;
    }

    if let Some(mut base) = quests_path(root) {
        base.push_index(dst.index);
        for (i, record) in records.iter().enumerate() {
            let label = record.label.trim();
            if done[i] || label.is_empty() {
                continue;
            }
            let target = resolve(root, &base)
                .and_then(NodeRef::as_map)
                .and_then(|quest| find_int_by_key(quest, label))
                .map(|rel| base.join(&rel));
            if let Some(target) = target {
                if write_progress(root, &target, record.value).is_some() {
                    applied += 1;
                }
                done[i] = true;
            }
        }
    }
    applied
}

/// A new quest cloned from `template` with the name, state and any progress
/// values that can be matched by key.
fn quest_from_template(template: &StructValue, record: &QuestRecord) -> StructValue {
    let mut quest = template.clone();
    let Some(map) = quest.as_properties_mut() else {
        return quest;
    };
    if let Some(mut parent) = find_key(map, &NAME_KEYS) {
        if let Some(Segment::Key(key)) = parent.pop() {
            if let Some(owner) = resolve_mut(map, &parent).and_then(NodeMut::into_map) {
                write_text(owner, &key, record.name.trim());
            }
        }
    }
    let state = record
        .state
        .as_deref()
        .and_then(|s| s.parse::<QuestState>().ok())
        .unwrap_or(QuestState::InProgress);
    if let Some(rel) = find_key(map, &STATE_KEYS).or_else(|| find_state_enum(map)) {
        if let Err(err) = write_state(map, &rel, state) {
            log::warn!("new quest '{}': {err}", record.name);
        }
    }
    for progress in &record.progress {
        if let Some(rel) = find_int_by_key(map, progress.label.trim()) {
            write_progress(map, &rel, progress.value);
        }
    }
    quest
}

/// Apply exported quest rows by normalized quest name. Progress values are
/// matched by exact path, label, normalized label, signature, position and
/// finally a key search inside the quest. With `add_missing`, unknown quests
/// are appended as clones of the first quest.
pub fn import_quests(
    root: &mut PropertyMap,
    records: &[QuestRecord],
    add_missing: bool,
) -> io::Result<QuestImportReport> {
    let rows = discover_quests(root);
    let mut by_name: HashMap<String, VecDeque<QuestRow>> = HashMap::new();
    for row in rows {
        let key = normalize_code(&row.name);
        if !key.is_empty() {
            by_name.entry(key).or_default().push_back(row);
        }
    }
    let template = quest_list(root).and_then(|(_, list)| list.first().cloned());

    let mut report = QuestImportReport::default();
    for record in records {
        let key = normalize_code(&record.name);
        if key.is_empty() {
            continue;
        }

        if let Some(dst) = by_name.get_mut(&key).and_then(VecDeque::pop_front) {
            let state = record.state.as_deref().and_then(|s| match s.parse::<QuestState>() {
                Ok(state) => Some(state),
                Err(err) => {
                    log::warn!("quest '{}': {err}", record.name);
                    None
                }
            });
            if let (Some(state), Some(path)) = (state, &dst.state_path) {
                if write_state(root, path, state).is_ok() {
                    report.quests += 1;
                }
            }
            report.progress += import_progress(root, &dst, &record.progress);
            continue;
        }

        let Some(template) = template.as_ref().filter(|_| add_missing) else {
            continue;
        };
        let quest = quest_from_template(template, record);
        let list = quest_list_mut(root)?;
        list.push(quest);
        let index = list.len() - 1;
        report.added += 1;
        log::debug!("added quest '{}' at #{index}", record.name);

        if let Some(row) = discover_quests(root).into_iter().find(|r| r.index == index) {
            by_name.entry(key).or_default().push_back(row);
        }
    }
    report.quests += report.added;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gvas::{ArrayValue, Guid};

    fn quest(name: &str, state: &str, count: i32) -> StructValue {
        let mut objective = PropertyMap::new();
        objective.insert("Count_0", PropertyValue::Int(count));
        let mut q = PropertyMap::new();
        q.insert("QuestCodeName_0", PropertyValue::Name(Some(name.into())));
        q.insert(
            "QuestState_0",
            PropertyValue::Enum {
                enum_name: "ELQuestState".into(),
                value: Some(format!("ELQuestState::{state}")),
            },
        );
        q.insert(
            "Objectives_0",
            PropertyValue::Array {
                inner_type: "StructProperty".into(),
                value: ArrayValue::Struct {
                    field_name: "Objectives_0".into(),
                    struct_name: "LQuestObjective".into(),
                    struct_guid: Guid::ZERO,
                    elements: vec![StructValue::Properties(objective)],
                },
            },
        );
        StructValue::Properties(q)
    }

    fn root(quests: Vec<StructValue>) -> PropertyMap {
        let mut block = PropertyMap::new();
        block.insert(
            "QuestList_0",
            PropertyValue::Array {
                inner_type: "StructProperty".into(),
                value: ArrayValue::Struct {
                    field_name: "QuestList_0".into(),
                    struct_name: "LQuestSaveData".into(),
                    struct_guid: Guid::ZERO,
                    elements: quests,
                },
            },
        );
        let mut root = PropertyMap::new();
        root.insert(
            "QuestSaveData_0",
            PropertyValue::Struct {
                struct_name: "LQuestSave".into(),
                struct_guid: Guid::ZERO,
                value: StructValue::Properties(block),
            },
        );
        root
    }

    #[test]
    fn discovers_rows_with_progress() {
        let root = root(vec![
            quest("Q_Main_01", "E_IN_PROGRESS", 2),
            quest("Q_Side_Venigni", "E_INACTIVE", 0),
        ]);
        let rows = discover_quests(&root);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Q_Main_01");
        assert_eq!(rows[0].state, Some(QuestState::InProgress));
        assert_eq!(
            rows[0].state_path.as_ref().map(ToString::to_string).as_deref(),
            Some("QuestSaveData_0.QuestList_0[0].QuestState_0")
        );
        assert_eq!(rows[0].progress.len(), 1);
        assert_eq!(rows[0].progress[0].label, "Objectives_0[0].Count_0");
        assert_eq!(rows[0].progress[0].sig, "0/count_0");
        assert_eq!(rows[0].progress[0].value, 2);
    }

    #[test]
    fn edit_keeps_enum_namespace() {
        let mut root = root(vec![quest("Q_Main_01", "E_IN_PROGRESS", 2)]);
        assert!(apply_quest_edit(&mut root, 0, Some(QuestState::CompleteSuccess), Some((None, 5))).unwrap());
        let row = &discover_quests(&root)[0];
        assert_eq!(row.raw_state, "ELQuestState::E_COMPLETE_SUCCESS");
        assert_eq!(row.progress[0].value, 5);
        assert!(apply_quest_edit(&mut root, 3, None, None).is_err());
    }

    #[test]
    fn deep_scan_finds_unusual_layout() {
        let mut other = PropertyMap::new();
        other.insert(
            "Story_0",
            PropertyValue::Array {
                inner_type: "StructProperty".into(),
                value: ArrayValue::Struct {
                    field_name: "Story_0".into(),
                    struct_name: "LQuestSaveData".into(),
                    struct_guid: Guid::ZERO,
                    elements: vec![quest("Q_A", "E_INACTIVE", 0), quest("Q_B", "E_INACTIVE", 0)],
                },
            },
        );
        assert_eq!(quests_path(&other).map(|p| p.to_string()).as_deref(), Some("Story_0"));
    }

    #[test]
    fn import_matches_by_name_and_adds_missing() {
        let source = root(vec![
            quest("Q_Main_01", "E_COMPLETE_SUCCESS", 9),
            quest("Q_New", "E_COMPLETE_FAIL", 4),
        ]);
        let export = export_quests(&source);
        assert_eq!(export.version, QUEST_EXPORT_VERSION);

        let mut target = root(vec![quest("q main 01", "E_INACTIVE", 0)]);
        let report = import_quests(&mut target, &export.rows, true).unwrap();
        assert_eq!(report.added, 1);
        assert_eq!(report.quests, 2);
        assert!(report.progress >= 1);

        let rows = discover_quests(&target);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].state, Some(QuestState::CompleteSuccess));
        assert_eq!(rows[0].progress[0].value, 9);
        assert_eq!(rows[1].name, "Q_New");
        assert_eq!(rows[1].state, Some(QuestState::CompleteFail));
        assert_eq!(rows[1].raw_state, "ELQuestState::E_COMPLETE_FAIL");
    }

    #[test]
    fn states_parse() {
        assert_eq!("in progress".parse::<QuestState>(), Ok(QuestState::InProgress));
        assert_eq!("ELQuestState::E_COMPLETE_FAIL".parse::<QuestState>(), Ok(QuestState::CompleteFail));
        assert_eq!("2".parse::<QuestState>(), Ok(QuestState::CompleteSuccess));
        assert!("done".parse::<QuestState>().is_err());
    }
}
