use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process;
use std::str::FromStr;

use clap::{ArgAction, Args, Parser, Subcommand};
use lop_core::core_api::{CheatReport, CheatSelection, CoreError, Engine, PartKind, Session, WeaponPartsDb};
use lop_core::gvas::{Document, Vector};
use lop_core::profile::builds::{BuildEdit, UniqueIdChoice};
use lop_core::profile::character::{CharacterField, SlotName};
use lop_core::profile::currency::CurrencyKind;
use lop_core::profile::fast_travel::{PositionEdit, StargazerState};
use lop_core::profile::inventory::InventoryExport;
use lop_core::profile::missions::{QuestExport, QuestState};
use lop_core::profile::starting_build::StartingBuild;
use lop_core::profile::stats::{PrimaryStat, SecondaryStat};
use lop_core::settings::Settings;
use lop_core::storage::{self, WriteOptions};
use lop_render::{
    FieldSelection, JsonStyle, TextRenderOptions, TextStyle, render_json_full_with_parts,
    render_json_selected_with_parts, render_text_with_options,
};
use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Settings file; defaults to $LOP_SE_CONFIG, then the user config directory.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Raise log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a character sheet, or selected fields.
    Show(ShowArgs),
    /// Apply field edits and write the result.
    Edit(EditArgs),
    /// Run one or more cheats and write the result.
    Cheat(CheatArgs),
    /// Export a save (or its inventory or quests) as JSON.
    Export(ExportArgs),
    /// Merge edited JSON onto a template save and write a .sav.
    Import(ImportArgs),
    /// List quests with their state and progress values.
    Quests(ListArgs),
    /// List stargazers with their state.
    Spots(ListArgs),
    #[command(subcommand)]
    Debug(DebugCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
struct InputArgs {
    #[arg(value_name = "SAVE")]
    path: PathBuf,
    /// Template save for `.json` input.
    #[arg(long, value_name = "SAVE")]
    template: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    fields: FieldFlags,
    #[arg(long)]
    json: bool,
    /// List every inventory row, quest and stargazer.
    #[arg(long)]
    all: bool,
    /// Weapon part name table (`{"handles": {...}, "blades": {...}}`).
    #[arg(long, value_name = "JSON")]
    parts: Option<PathBuf>,
}

#[derive(Debug, Default, Args)]
struct FieldFlags {
    #[arg(long)]
    slot: bool,
    #[arg(long)]
    level: bool,
    #[arg(long)]
    ergo: bool,
    #[arg(long)]
    humanity: bool,
    #[arg(long = "ng-plus")]
    ng_plus: bool,
    #[arg(long)]
    deaths: bool,
    #[arg(long = "play-time")]
    play_time: bool,
    #[arg(long = "starting-build")]
    starting_build: bool,
    #[arg(long)]
    lamp: bool,
    #[arg(long)]
    character: bool,
    #[arg(long)]
    stats: bool,
    #[arg(long)]
    currency: bool,
    #[arg(long)]
    inventory: bool,
    #[arg(long)]
    builds: bool,
    #[arg(long)]
    quests: bool,
    #[arg(long)]
    stargazers: bool,
    #[arg(long)]
    position: bool,
}

impl FieldFlags {
    fn selection(&self) -> FieldSelection {
        FieldSelection {
            slot: self.slot,
            level: self.level,
            ergo: self.ergo,
            humanity: self.humanity,
            ng_plus: self.ng_plus,
            deaths: self.deaths,
            play_time: self.play_time,
            starting_build: self.starting_build,
            lamp: self.lamp,
            character: self.character,
            stats: self.stats,
            currency: self.currency,
            inventory: self.inventory,
            builds: self.builds,
            quests: self.quests,
            stargazers: self.stargazers,
            position: self.position,
        }
    }
}

#[derive(Debug, Args)]
struct OutputArgs {
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
    /// Do not back up an existing output file.
    #[arg(long = "no-backup")]
    no_backup: bool,
}

#[derive(Debug, Args)]
struct EditArgs {
    #[command(flatten)]
    input: InputArgs,
    #[command(flatten)]
    output: OutputArgs,
    #[command(flatten)]
    edits: EditFlags,
}

#[derive(Debug, Default, Args)]
struct EditFlags {
    #[arg(long = "set-level")]
    set_level: Option<i64>,
    #[arg(long = "set-ergo")]
    set_ergo: Option<i64>,
    #[arg(long = "set-humanity-level")]
    set_humanity_level: Option<i64>,
    #[arg(long = "set-ng-plus")]
    set_ng_plus: Option<i64>,
    #[arg(long = "set-deaths")]
    set_deaths: Option<i64>,
    /// Any character field by name, e.g. `next_level_ergo=1200`.
    #[arg(long = "set-character", value_name = "FIELD=VALUE", value_parser = parse_pair::<CharacterField, i64>)]
    set_character: Vec<(CharacterField, i64)>,
    /// Seconds, or `H:MM:SS`.
    #[arg(long = "set-play-time", value_parser = parse_play_time)]
    set_play_time: Option<f64>,
    #[arg(long = "set-starting-build")]
    set_starting_build: Option<StartingBuild>,
    #[arg(long = "set-lamp")]
    set_lamp: Option<bool>,
    /// `GUID/Slot`; the GUID may be a slot alias from the settings file.
    #[arg(long = "set-slot", value_name = "GUID/SLOT")]
    set_slot: Option<String>,
    #[arg(long = "set-stat", value_name = "ATTRIBUTE=VALUE", value_parser = parse_pair::<PrimaryStat, i64>)]
    set_stat: Vec<(PrimaryStat, i64)>,
    #[arg(long = "set-secondary", value_name = "STAT=VALUE", value_parser = parse_pair::<SecondaryStat, i64>)]
    set_secondary: Vec<(SecondaryStat, i64)>,
    #[arg(long = "set-item", value_name = "CODE=COUNT", value_parser = parse_pair::<String, i64>)]
    set_item: Vec<(String, i64)>,
    #[arg(long = "add-item", value_name = "CODE=COUNT", value_parser = parse_pair::<String, i64>)]
    add_item: Vec<(String, i64)>,
    #[arg(long = "remove-item", value_name = "CODE")]
    remove_item: Vec<String>,
    /// Merge duplicate stacks of stackable items.
    #[arg(long)]
    dedupe: bool,
    #[arg(long = "import-inventory", value_name = "JSON")]
    import_inventory: Option<PathBuf>,
    /// Clear the inventory first so it holds exactly the imported rows.
    #[arg(long = "replace-inventory", requires = "import_inventory")]
    replace_inventory: bool,
    #[arg(long = "set-currency", value_name = "ID=VALUE", value_parser = parse_pair::<CurrencyKind, i64>)]
    set_currency: Vec<(CurrencyKind, i64)>,
    #[arg(long = "set-quest", value_name = "INDEX=STATE", value_parser = parse_pair::<usize, QuestState>)]
    set_quest: Vec<(usize, QuestState)>,
    /// Write a quest's first progress value.
    #[arg(long = "set-quest-progress", value_name = "INDEX=VALUE", value_parser = parse_pair::<usize, i64>)]
    set_quest_progress: Vec<(usize, i64)>,
    #[arg(long = "import-quests", value_name = "JSON")]
    import_quests: Option<PathBuf>,
    /// Append quests from the import that the save lacks.
    #[arg(long = "add-missing-quests", requires = "import_quests")]
    add_missing_quests: bool,
    #[arg(long = "set-spot", value_name = "CODE=STATE", value_parser = parse_pair::<String, StargazerState>)]
    set_spot: Vec<(String, StargazerState)>,
    #[arg(long = "set-location")]
    set_location: Option<String>,
    #[arg(long = "set-map-level")]
    set_map_level: Option<String>,
    #[arg(long = "set-translation", value_name = "X,Y,Z", value_parser = parse_vector, allow_hyphen_values = true)]
    set_translation: Option<Vector>,
    #[arg(long = "set-respawn", value_name = "SPOT")]
    set_respawn: Option<String>,
    #[arg(long = "set-torsion-coil", value_name = "SPOT")]
    set_torsion_coil: Option<String>,
    #[arg(long = "new-build", value_name = "HANDLE,BLADE", value_parser = parse_build)]
    new_build: Vec<(String, String)>,
    #[arg(long = "clone-build", value_name = "INDEX")]
    clone_build: Vec<usize>,
    #[arg(long = "delete-build", value_name = "INDEX")]
    delete_build: Vec<usize>,
    #[arg(long = "unlock-quick-slots")]
    unlock_quick_slots: bool,
    #[arg(long = "unlock-equip-slots")]
    unlock_equip_slots: bool,
}

impl EditFlags {
    fn is_empty(&self) -> bool {
        self.set_level.is_none()
            && self.set_ergo.is_none()
            && self.set_humanity_level.is_none()
            && self.set_ng_plus.is_none()
            && self.set_deaths.is_none()
            && self.set_character.is_empty()
            && self.set_play_time.is_none()
            && self.set_starting_build.is_none()
            && self.set_lamp.is_none()
            && self.set_slot.is_none()
            && self.set_stat.is_empty()
            && self.set_secondary.is_empty()
            && self.set_item.is_empty()
            && self.add_item.is_empty()
            && self.remove_item.is_empty()
            && !self.dedupe
            && self.import_inventory.is_none()
            && self.set_currency.is_empty()
            && self.set_quest.is_empty()
            && self.set_quest_progress.is_empty()
            && self.import_quests.is_none()
            && self.set_spot.is_empty()
            && self.set_location.is_none()
            && self.set_map_level.is_none()
            && self.set_translation.is_none()
            && self.set_respawn.is_none()
            && self.set_torsion_coil.is_none()
            && self.new_build.is_empty()
            && self.clone_build.is_empty()
            && self.delete_build.is_empty()
            && !self.unlock_quick_slots
            && !self.unlock_equip_slots
    }

    fn character_edits(&self) -> Vec<(CharacterField, i64)> {
        let named = [
            (CharacterField::Level, self.set_level),
            (CharacterField::Ergo, self.set_ergo),
            (CharacterField::HumanityLevel, self.set_humanity_level),
            (CharacterField::NewGamePlusRound, self.set_ng_plus),
            (CharacterField::Deaths, self.set_deaths),
        ];
        named
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)))
            .chain(self.set_character.iter().copied())
            .collect()
    }
}

#[derive(Debug, Args)]
struct CheatArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long, value_name = "PATH", required_unless_present = "dry_run")]
    output: Option<PathBuf>,
    #[arg(long = "no-backup")]
    no_backup: bool,
    /// Health to the engine maximum.
    #[arg(long)]
    godmode: bool,
    /// Character values and every attribute to their maximum.
    #[arg(long = "insane-stats")]
    insane_stats: bool,
    /// Ergo and every currency item to N (default 999999999).
    #[arg(long = "max-currency", value_name = "N", num_args = 0..=1, default_missing_value = "999999999")]
    max_currency: Option<i64>,
    /// With --max-currency, add currency items the save does not hold.
    #[arg(long = "create-missing", requires = "max_currency")]
    create_missing: bool,
    /// Every stargazer to Active (Idle).
    #[arg(long = "unlock-locations")]
    unlock_locations: bool,
    /// Complete every achievement block found in the save.
    #[arg(long = "auto-plat")]
    auto_plat: bool,
    /// Report what would change without writing.
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[arg(long)]
    json: bool,
}

impl CheatArgs {
    fn selection(&self) -> CheatSelection {
        CheatSelection {
            godmode: self.godmode,
            insane_stats: self.insane_stats,
            max_currency: self.max_currency,
            create_missing_currency: self.create_missing,
            unlock_locations: self.unlock_locations,
            auto_plat: self.auto_plat,
        }
    }
}

#[derive(Debug, Args)]
struct ExportArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long, value_name = "JSON")]
    output: PathBuf,
    /// Export only the inventory (`lop-inventory-v1`).
    #[arg(long, conflicts_with = "quests")]
    inventory: bool,
    /// Export only quest states and progress values.
    #[arg(long)]
    quests: bool,
}

#[derive(Debug, Args)]
struct ImportArgs {
    #[arg(value_name = "EDITED.json")]
    edited: PathBuf,
    /// Save the JSON is merged onto; defaults to the settings file's template.
    #[arg(long, value_name = "SAVE")]
    template: Option<PathBuf>,
    #[command(flatten)]
    output: OutputArgs,
    /// Also write the merged JSON next to the output.
    #[arg(long = "debug-json")]
    debug_json: bool,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[command(flatten)]
    input: InputArgs,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum DebugCommand {
    /// Byte ranges of the header, each top-level property and the tail.
    Layout {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Check that a save parses, covers its bytes and re-encodes exactly.
    Validate {
        #[arg(value_name = "SAVE")]
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Field and byte differences between two saves.
    Compare {
        #[arg(value_name = "LEFT")]
        left: PathBuf,
        #[arg(value_name = "RIGHT")]
        right: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Print the settings file as JSON.
    Show,
    /// Name a Steam GUID; an empty name removes it.
    Nickname { guid: String, name: String },
    /// Short alias usable in place of a GUID; an empty GUID removes it.
    Alias { alias: String, guid: String },
    /// Add or rename a weapon handle or blade.
    Part {
        kind: PartKind,
        code: String,
        name: String,
        #[arg(long, default_value = "")]
        tooltip: String,
    },
    /// Default template for JSON imports; omit the path to clear it.
    Template { path: Option<PathBuf> },
    /// Turn backups of overwritten saves on or off.
    Backups {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut ctx = Context::load(cli.config.as_deref());
    match &cli.command {
        Command::Show(args) => show(&mut ctx, args),
        Command::Edit(args) => edit(&mut ctx, args),
        Command::Cheat(args) => cheat(&mut ctx, args),
        Command::Export(args) => export(&mut ctx, args),
        Command::Import(args) => import(&mut ctx, args),
        Command::Quests(args) => list_quests(&mut ctx, args),
        Command::Spots(args) => list_spots(&mut ctx, args),
        Command::Debug(command) => debug(command),
        Command::Config(command) => config(&mut ctx, command),
    }
}

fn init_logging(verbosity: u8) {
    let default = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init();
}

fn fail(context: &str, err: impl fmt::Display) -> ! {
    eprintln!("Error {context}: {err}");
    process::exit(1);
}

fn usage(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(2);
}

fn print_json(value: &JsonValue) {
    let rendered = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| fail("rendering JSON output", e));
    println!("{rendered}");
}

/// Settings plus where they came from.
struct Context {
    settings: Settings,
    path: Option<PathBuf>,
}

impl Context {
    fn load(explicit: Option<&Path>) -> Self {
        let path = Settings::resolve_path(explicit);
        let settings = match &path {
            Some(path) => Settings::load(path).unwrap_or_else(|e| fail("loading settings", e)),
            None => Settings::default(),
        };
        Self { settings, path }
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(err) = self.settings.save(path) {
            log::warn!("could not save settings: {err}");
        }
    }

    fn remember(&mut self, opened: &Path) {
        self.settings.push_recent(opened);
        self.persist();
    }

    fn template<'a>(&'a self, explicit: Option<&'a Path>) -> Option<&'a Path> {
        explicit.or(self.settings.default_template.as_deref())
    }

    fn write_options(&self, no_backup: bool) -> WriteOptions {
        WriteOptions {
            backup: self.settings.backups && !no_backup,
        }
    }

    fn parts(&self, table: Option<&Path>) -> WeaponPartsDb {
        WeaponPartsDb::load(table, &self.settings.weapon_parts)
    }
}

fn open_session(ctx: &mut Context, input: &InputArgs) -> Session {
    let template = ctx.template(input.template.as_deref()).map(Path::to_path_buf);
    let session = Engine::new()
        .open_path(&input.path, template.as_deref())
        .unwrap_or_else(|e| fail(&format!("opening {}", input.path.display()), e));
    for issue in &session.capabilities().issues {
        log::warn!("{}: {issue:?}", input.path.display());
    }
    ctx.remember(&input.path);
    session
}

fn write_session(ctx: &Context, session: &Session, output: &OutputArgs) {
    let bytes = session
        .to_bytes_modified()
        .unwrap_or_else(|e| fail("encoding edited save", e));
    write_bytes(ctx, &bytes, output);
}

fn write_bytes(ctx: &Context, bytes: &[u8], output: &OutputArgs) {
    let report = storage::write_save(&output.output, bytes, ctx.write_options(output.no_backup))
        .unwrap_or_else(|e| fail("writing save", e));
    if let Some(backup) = &report.backup {
        println!("Backed up previous file to {}", backup.display());
    }
    println!("Wrote edited save to {}", report.path.display());
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(ctx: &mut Context, args: &ShowArgs) {
    let session = open_session(ctx, &args.input);
    let parts = ctx.parts(args.parts.as_deref());
    let fields = args.fields.selection();

    if args.json {
        let json = if fields.is_any_selected() {
            render_json_selected_with_parts(&session, &fields, JsonStyle::CanonicalV1, Some(&parts))
        } else {
            render_json_full_with_parts(&session, JsonStyle::CanonicalV1, Some(&parts))
        };
        print_json(&json);
        return;
    }

    if fields.is_any_selected() {
        let json =
            render_json_selected_with_parts(&session, &fields, JsonStyle::CanonicalV1, Some(&parts));
        for (key, value) in selected_pairs(&json) {
            println!("{key}={value}");
        }
        return;
    }

    let options = TextRenderOptions { verbose: args.all };
    print!("{}", render_text_with_options(&session, TextStyle::Summary, options));
}

/// `key=value` lines for a selected JSON view; lists give one line per entry.
fn selected_pairs(json: &JsonValue) -> Vec<(String, String)> {
    let Some(map) = json.as_object() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, value) in map {
        match value {
            JsonValue::Array(entries) => {
                let singular = key.strip_suffix('s').unwrap_or(key);
                for entry in entries {
                    out.push((singular.to_string(), entry_summary(entry)));
                }
            }
            JsonValue::Object(obj) => match obj.get("path").and_then(JsonValue::as_str) {
                Some(path) => out.push((key.clone(), path.to_string())),
                None => out.push((key.clone(), value.to_string())),
            },
            other => out.push((key.clone(), scalar_text(other))),
        }
    }
    out
}

fn scalar_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "unknown".to_string(),
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn first_of<'a>(obj: &'a JsonMap<String, JsonValue>, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn entry_summary(entry: &JsonValue) -> String {
    let Some(obj) = entry.as_object() else {
        return scalar_text(entry);
    };
    let name = first_of(obj, &["name", "code", "id", "handle"]);
    let value = first_of(obj, &["value", "count", "total", "state", "blade"]);
    match (name, value) {
        (Some(name), Some(value)) => format!("{}={}", scalar_text(name), scalar_text(value)),
        _ => entry.to_string(),
    }
}

// ---------------------------------------------------------------------------
// edit
// ---------------------------------------------------------------------------

fn edit(ctx: &mut Context, args: &EditArgs) {
    if args.edits.is_empty() {
        usage("edit needs at least one --set-*, --add-item, --remove-item, --import-* or build flag");
    }
    let mut session = open_session(ctx, &args.input);
    let applied = apply_edits(&mut session, &args.edits, &ctx.settings)
        .unwrap_or_else(|e| fail("applying edits", e));
    log::info!("{applied} field(s) changed");
    write_session(ctx, &session, &args.output);
}

fn read_json_as<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let value = storage::read_json(path)?;
    Ok(serde_json::from_value(value)?)
}

fn apply_edits(session: &mut Session, edits: &EditFlags, settings: &Settings) -> Result<usize, CoreError> {
    let mut changed = 0usize;

    for (field, value) in edits.character_edits() {
        changed += usize::from(session.set_character_field(field, value)?);
    }
    if let Some(seconds) = edits.set_play_time {
        changed += usize::from(session.set_play_time(seconds)?);
    }
    if let Some(build) = edits.set_starting_build {
        changed += usize::from(session.set_starting_build(build)?);
    }
    if let Some(attached) = edits.set_lamp {
        changed += usize::from(session.set_lamp_attached(attached)?);
    }
    if let Some(raw) = &edits.set_slot {
        let mut slot = SlotName::parse(raw);
        if let Some(guid) = settings.alias_guid(&slot.guid) {
            slot.guid = guid.to_string();
        }
        if slot.slot.is_empty() {
            if let Some(current) = session.snapshot().slot {
                slot.slot = current.slot;
            }
        }
        changed += usize::from(session.set_slot_name(&slot)?);
    }

    for &(stat, value) in &edits.set_stat {
        changed += usize::from(session.set_primary_stat(stat, value)?);
    }
    for &(stat, value) in &edits.set_secondary {
        changed += usize::from(session.set_secondary_stat(stat, value)?);
    }

    for (code, count) in &edits.set_item {
        changed += usize::from(session.set_item_count(code, *count)?);
    }
    for (code, count) in &edits.add_item {
        log::info!("{code}: {:?}", session.add_item(code, *count)?);
        changed += 1;
    }
    for code in &edits.remove_item {
        changed += session.remove_item(code)?;
    }
    if let Some(path) = &edits.import_inventory {
        let export: InventoryExport = read_json_as(path)?;
        let report = session.import_inventory(&export, edits.replace_inventory)?;
        changed += report.created + report.merged;
    }
    if edits.dedupe {
        let report = session.dedupe_inventory()?;
        log::info!(
            "dedupe: {} -> {} rows, {} stack(s) merged",
            report.before,
            report.after,
            report.merged_stacks
        );
        changed += report.merged_stacks;
    }

    for (kind, value) in &edits.set_currency {
        changed += session.set_currency(kind, *value)?;
    }

    for &(index, state) in &edits.set_quest {
        changed += usize::from(session.apply_quest_edit(index, Some(state), None)?);
    }
    for &(index, value) in &edits.set_quest_progress {
        changed += usize::from(session.apply_quest_edit(index, None, Some((None, value)))?);
    }
    if let Some(path) = &edits.import_quests {
        let export: QuestExport = read_json_as(path)?;
        let report = session.import_quests(&export.rows, edits.add_missing_quests)?;
        changed += report.quests + report.progress;
    }

    for (code, state) in &edits.set_spot {
        changed += usize::from(session.set_spot_state(code, *state)?);
    }
    let position = PositionEdit {
        location: edits.set_location.clone(),
        level: edits.set_map_level.clone(),
        translation: edits.set_translation,
        rotation: None,
    };
    if position != PositionEdit::default() {
        changed += session.set_position(&position)?;
    }
    if edits.set_respawn.is_some() || edits.set_torsion_coil.is_some() {
        changed += session.set_respawn(
            edits.set_respawn.as_deref(),
            edits.set_torsion_coil.as_deref(),
        )?;
    }

    for (handle, blade) in &edits.new_build {
        let edit = BuildEdit {
            handle: handle.clone(),
            blade: blade.clone(),
            unique_id: UniqueIdChoice::Generate,
            ..BuildEdit::default()
        };
        let index = session.new_build(&edit)?;
        log::info!("new build at item row {index}");
        changed += 1;
    }
    for &index in &edits.clone_build {
        let clone = session.clone_build(index)?;
        log::info!("cloned build {index} to item row {clone}");
        changed += 1;
    }
    let mut deletions = edits.delete_build.clone();
    deletions.sort_unstable_by(|a, b| b.cmp(a));
    deletions.dedup();
    for index in deletions {
        session.delete_build(index)?;
        changed += 1;
    }

    if edits.unlock_quick_slots {
        changed += session.set_quick_slots_unlocked(true)?;
    }
    if edits.unlock_equip_slots {
        changed += session.set_equip_slots_unlocked(true)?;
    }

    Ok(changed)
}

// ---------------------------------------------------------------------------
// cheat
// ---------------------------------------------------------------------------

fn cheat(ctx: &mut Context, args: &CheatArgs) {
    let selection = args.selection();
    if selection.is_empty() {
        usage("cheat needs at least one of --godmode, --insane-stats, --max-currency, --unlock-locations, --auto-plat");
    }
    let mut session = open_session(ctx, &args.input);
    let report = session
        .run_cheats(&selection, args.dry_run)
        .unwrap_or_else(|e| fail("running cheats", e));

    if args.json {
        let value = serde_json::to_value(report).unwrap_or_else(|e| fail("rendering JSON output", e));
        print_json(&value);
    } else {
        print_cheat_report(&report);
    }

    if args.dry_run {
        return;
    }
    let Some(output) = &args.output else {
        usage("--output is required unless --dry-run is given");
    };
    let output = OutputArgs {
        output: output.clone(),
        no_backup: args.no_backup,
    };
    write_session(ctx, &session, &output);
}

fn print_cheat_report(report: &CheatReport) {
    let verb = if report.dry_run { "would change" } else { "changed" };
    if let Some(n) = report.godmode {
        println!("godmode: {verb} {n} field(s)");
    }
    if let Some(r) = report.insane_stats {
        println!(
            "insane stats: {verb} {} character, {} attribute, {} secondary field(s)",
            r.character, r.stats_primary, r.stats_secondary
        );
    }
    if let Some(n) = report.max_currency {
        println!("max currency: {verb} {n} field(s)");
    }
    if let Some(n) = report.unlock_locations {
        println!("unlock locations: {verb} {n} stargazer(s)");
    }
    if let Some(r) = report.achievements {
        if r.found {
            println!("achievements: {verb} {} field(s)", r.changes);
        } else {
            println!("achievements: no achievement blocks found");
        }
    }
    println!("total: {}", report.total());
}

// ---------------------------------------------------------------------------
// export / import
// ---------------------------------------------------------------------------

fn export(ctx: &mut Context, args: &ExportArgs) {
    let session = open_session(ctx, &args.input);
    let exported = if args.inventory {
        serde_json::to_value(session.export_inventory()).map_err(CoreError::from)
    } else if args.quests {
        serde_json::to_value(session.export_quests()).map_err(CoreError::from)
    } else {
        session.export_json()
    };
    let value = exported.unwrap_or_else(|e| fail("exporting JSON", e));

    let text = serde_json::to_string_pretty(&value).unwrap_or_else(|e| fail("rendering JSON", e));
    fs::write(&args.output, text)
        .unwrap_or_else(|e| fail(&format!("writing {}", args.output.display()), e));
    println!("Exported to {}", args.output.display());
}

fn import(ctx: &mut Context, args: &ImportArgs) {
    let Some(template) = ctx.template(args.template.as_deref()).map(Path::to_path_buf) else {
        usage("import needs --template <SAVE> or a default template in the settings file");
    };
    let base = storage::read_save(&template).unwrap_or_else(|e| fail("reading template", e));
    let edited = storage::read_json(&args.edited).unwrap_or_else(|e| fail("reading JSON", e));
    let debug_target = args.debug_json.then_some(args.output.output.as_path());
    let document = storage::import_json(&base, &edited, debug_target)
        .unwrap_or_else(|e| fail("merging JSON", e));
    let bytes = document
        .to_bytes_modified()
        .unwrap_or_else(|e| fail("encoding merged save", e));
    ctx.remember(&args.edited);
    write_bytes(ctx, &bytes, &args.output);
}

// ---------------------------------------------------------------------------
// quests / spots
// ---------------------------------------------------------------------------

fn list_quests(ctx: &mut Context, args: &ListArgs) {
    let session = open_session(ctx, &args.input);
    if args.json {
        let value = serde_json::to_value(session.quests())
            .unwrap_or_else(|e| fail("rendering JSON output", e));
        print_json(&value);
        return;
    }
    for quest in session.quests() {
        let state = quest
            .state
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| quest.raw_state.clone());
        let progress: Vec<String> = quest
            .progress
            .iter()
            .map(|p| format!("{}={}", p.label, p.value))
            .collect();
        println!(
            "[{:>3}] {:<40} {:<18} {}",
            quest.index,
            quest.name,
            state,
            progress.join(" ")
        );
    }
}

fn list_spots(ctx: &mut Context, args: &ListArgs) {
    let session = open_session(ctx, &args.input);
    if args.json {
        let value = serde_json::to_value(session.spots())
            .unwrap_or_else(|e| fail("rendering JSON output", e));
        print_json(&value);
        return;
    }
    for spot in session.spots() {
        let state = spot.state.map(|s| s.as_str()).unwrap_or(spot.raw_state.as_str());
        println!("{:<40} {:<32} {}", spot.code, spot.label, state);
    }
}

// ---------------------------------------------------------------------------
// debug
// ---------------------------------------------------------------------------

fn debug(command: &DebugCommand) {
    match command {
        DebugCommand::Layout { path, json } => debug_layout(path, *json),
        DebugCommand::Validate { path, json } => debug_validate(path, *json),
        DebugCommand::Compare { left, right, json } => debug_compare(left, right, *json),
    }
}

fn debug_layout(path: &Path, json: bool) {
    let document = storage::read_save(path).unwrap_or_else(|e| fail("reading save", e));
    let layout = document.layout();
    let validation = layout.validate();

    if json {
        let sections: Vec<JsonValue> = layout
            .sections
            .iter()
            .map(|s| {
                let mut m = JsonMap::new();
                m.insert("id".to_string(), JsonValue::String(s.id.to_string()));
                m.insert("start".to_string(), JsonValue::from(s.range.start));
                m.insert("end".to_string(), JsonValue::from(s.range.end));
                m.insert("len".to_string(), JsonValue::from(s.range.len()));
                if let Some(label) = &s.label {
                    m.insert("label".to_string(), JsonValue::String(label.clone()));
                }
                JsonValue::Object(m)
            })
            .collect();
        let mut out = JsonMap::new();
        out.insert("file_len".to_string(), JsonValue::from(layout.file_len));
        out.insert("validation_ok".to_string(), JsonValue::Bool(validation.is_ok()));
        out.insert("section_count".to_string(), JsonValue::from(sections.len()));
        out.insert("sections".to_string(), JsonValue::Array(sections));
        print_json(&JsonValue::Object(out));
        return;
    }

    println!("{} bytes, {} sections", layout.file_len, layout.sections.len());
    for s in &layout.sections {
        let label = s.label.as_deref().unwrap_or("");
        let line = format!(
            "{:<16} {:>10}..{:<10} {:>10}  {label}",
            s.id.to_string(),
            s.range.start,
            s.range.end,
            s.range.len()
        );
        println!("{}", line.trim_end());
    }
    if let Err(err) = validation {
        println!("layout invalid: {err}");
    }
}

fn validate_bytes(bytes: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    match Document::parse_with_layout(Cursor::new(bytes)) {
        Ok(document) => {
            if let Err(err) = document.layout().validate() {
                errors.push(format!("layout: {err}"));
            }
            if !document.roundtrip_exact() {
                errors.push("re-encoding does not reproduce the file".to_string());
            }
            let raw = document.raw_property_count();
            if raw > 0 {
                warnings.push(format!("{raw} property payload(s) kept as raw bytes"));
            }
        }
        Err(err) => errors.push(err.to_string()),
    }
    (errors, warnings)
}

fn debug_validate(path: &Path, json: bool) {
    let bytes = fs::read(path).unwrap_or_else(|e| fail(&format!("reading {}", path.display()), e));
    let (errors, warnings) = validate_bytes(&bytes);
    let ok = errors.is_empty();

    if json {
        let mut out = JsonMap::new();
        out.insert(
            "status".to_string(),
            JsonValue::String(if ok { "ok" } else { "error" }.to_string()),
        );
        out.insert("file_len".to_string(), JsonValue::from(bytes.len()));
        out.insert("errors".to_string(), JsonValue::from(errors));
        out.insert("warnings".to_string(), JsonValue::from(warnings));
        print_json(&JsonValue::Object(out));
    } else {
        for err in &errors {
            println!("error: {err}");
        }
        for warning in &warnings {
            println!("warning: {warning}");
        }
        if ok {
            println!("OK");
        }
    }

    if !ok {
        process::exit(1);
    }
}

fn debug_compare(left: &Path, right: &Path, json: bool) {
    let engine = Engine::new();
    let open = |path: &Path| {
        engine
            .open_path(path, None)
            .unwrap_or_else(|e| fail(&format!("opening {}", path.display()), e))
    };
    let (left_session, right_session) = (open(left), open(right));
    let left_bytes = left_session
        .to_bytes_unmodified()
        .unwrap_or_else(|e| fail("reading left save", e));
    let right_bytes = right_session
        .to_bytes_unmodified()
        .unwrap_or_else(|e| fail("reading right save", e));

    let first_difference = left_bytes
        .iter()
        .zip(&right_bytes)
        .position(|(a, b)| a != b)
        .or_else(|| (left_bytes.len() != right_bytes.len()).then(|| left_bytes.len().min(right_bytes.len())));
    let differing_bytes = left_bytes
        .iter()
        .zip(&right_bytes)
        .filter(|(a, b)| a != b)
        .count()
        + left_bytes.len().abs_diff(right_bytes.len());

    let left_view = render_json_full_with_parts(&left_session, JsonStyle::CanonicalV1, None);
    let right_view = render_json_full_with_parts(&right_session, JsonStyle::CanonicalV1, None);
    let field_differences = field_differences(&left_view, &right_view);

    if json {
        let mut out = JsonMap::new();
        out.insert("left_len".to_string(), JsonValue::from(left_bytes.len()));
        out.insert("right_len".to_string(), JsonValue::from(right_bytes.len()));
        out.insert("identical".to_string(), JsonValue::Bool(first_difference.is_none()));
        out.insert(
            "first_difference".to_string(),
            first_difference.map(JsonValue::from).unwrap_or(JsonValue::Null),
        );
        out.insert("differing_bytes".to_string(), JsonValue::from(differing_bytes));
        out.insert(
            "field_differences".to_string(),
            JsonValue::Array(
                field_differences
                    .into_iter()
                    .map(|(field, l, r)| {
                        let mut m = JsonMap::new();
                        m.insert("field".to_string(), JsonValue::String(field));
                        m.insert("left".to_string(), l);
                        m.insert("right".to_string(), r);
                        JsonValue::Object(m)
                    })
                    .collect(),
            ),
        );
        print_json(&JsonValue::Object(out));
        return;
    }

    match first_difference {
        None => println!("files are identical ({} bytes)", left_bytes.len()),
        Some(offset) => println!(
            "{differing_bytes} byte(s) differ, first at offset {offset:#x} ({} vs {} bytes)",
            left_bytes.len(),
            right_bytes.len()
        ),
    }
    for (field, l, r) in field_differences {
        println!("{field}: {} -> {}", compact(&l), compact(&r));
    }
}

fn field_differences(left: &JsonValue, right: &JsonValue) -> Vec<(String, JsonValue, JsonValue)> {
    let (Some(left), Some(right)) = (left.as_object(), right.as_object()) else {
        return Vec::new();
    };
    left.iter()
        .filter_map(|(key, l)| {
            let r = right.get(key).cloned().unwrap_or(JsonValue::Null);
            (l != &r).then(|| (key.clone(), l.clone(), r))
        })
        .collect()
}

fn compact(value: &JsonValue) -> String {
    let text = value.to_string();
    if text.chars().count() > 60 {
        let head: String = text.chars().take(57).collect();
        format!("{head}...")
    } else {
        text
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn config(ctx: &mut Context, command: &ConfigCommand) {
    match command {
        ConfigCommand::Show => {
            let value = serde_json::to_value(&ctx.settings)
                .unwrap_or_else(|e| fail("rendering JSON output", e));
            print_json(&value);
            return;
        }
        ConfigCommand::Nickname { guid, name } => ctx.settings.set_guid_nickname(guid, name),
        ConfigCommand::Alias { alias, guid } => ctx.settings.set_slot_alias(alias, guid),
        ConfigCommand::Part {
            kind,
            code,
            name,
            tooltip,
        } => {
            let mut parts = ctx.parts(None);
            parts.upsert_user_part(&mut ctx.settings.weapon_parts, *kind, code, name, tooltip);
        }
        ConfigCommand::Template { path } => ctx.settings.default_template = path.clone(),
        ConfigCommand::Backups { enabled } => ctx.settings.backups = *enabled,
    }

    let Some(path) = &ctx.path else {
        fail("saving settings", "no settings location (set --config or LOP_SE_CONFIG)");
    };
    ctx.settings
        .save(path)
        .unwrap_or_else(|e| fail("saving settings", e));
    println!("Saved settings to {}", path.display());
}

// ---------------------------------------------------------------------------
// argument parsers
// ---------------------------------------------------------------------------

fn parse_pair<K, V>(s: &str) -> Result<(K, V), String>
where
    K: FromStr,
    K::Err: fmt::Display,
    V: FromStr,
    V::Err: fmt::Display,
{
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim().parse().map_err(|e| format!("{e}"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value '{value}': {e}"))?;
    Ok((key, value))
}

fn parse_play_time(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if !s.contains(':') {
        return s.parse().map_err(|_| format!("invalid play time '{s}'"));
    }
    let mut seconds = 0.0;
    for part in s.split(':') {
        let value: f64 = part
            .parse()
            .map_err(|_| format!("invalid play time '{s}' (expected H:MM:SS)"))?;
        seconds = seconds * 60.0 + value;
    }
    Ok(seconds)
}

fn parse_vector(s: &str) -> Result<Vector, String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("invalid vector '{s}' (expected X,Y,Z)"))?;
    match parts[..] {
        [x, y, z] => Ok(Vector { x, y, z }),
        _ => Err(format!("invalid vector '{s}' (expected X,Y,Z)")),
    }
}

fn parse_build(s: &str) -> Result<(String, String), String> {
    let (handle, blade) = s
        .split_once(',')
        .ok_or_else(|| format!("expected HANDLE,BLADE, got '{s}'"))?;
    Ok((handle.trim().to_string(), blade.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_time_accepts_seconds_and_clock() {
        assert_eq!(parse_play_time("90.5"), Ok(90.5));
        assert_eq!(parse_play_time("2:01:05"), Ok(7265.0));
        assert!(parse_play_time("2:xx").is_err());
    }

    #[test]
    fn pairs_parse_typed_values() {
        let (stat, value) = parse_pair::<PrimaryStat, i64>("vigor=30").unwrap();
        assert_eq!(stat, PrimaryStat::Vigor);
        assert_eq!(value, 30);
        assert!(parse_pair::<String, i64>("Quartz").is_err());
        assert!(parse_pair::<String, i64>("Quartz=many").is_err());
    }

    #[test]
    fn vectors_need_three_components() {
        let v = parse_vector("1, -2.5, 3").unwrap();
        assert_eq!((v.x, v.y, v.z), (1.0, -2.5, 3.0));
        assert!(parse_vector("1,2").is_err());
    }

    #[test]
    fn list_entries_summarize_as_name_value() {
        let json = serde_json::json!({
            "level": 42,
            "slot": {"guid": "g", "slot": "s", "path": "/g/s"},
            "primary_stats": [{"name": "vigor", "label": "Vigor", "value": 30}],
            "play_time": null
        });
        let pairs = selected_pairs(&json);
        assert_eq!(
            pairs,
            vec![
                ("level".to_string(), "42".to_string()),
                ("slot".to_string(), "/g/s".to_string()),
                ("primary_stat".to_string(), "vigor=30".to_string()),
                ("play_time".to_string(), "unknown".to_string()),
            ]
        );
    }
}
