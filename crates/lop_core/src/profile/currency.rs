use std::fmt;
use std::io;
use std::str::FromStr;

use serde::Serialize;

use super::character::{self, CharacterField};
use super::inventory::{code_of, count_of, entries, entries_mut, push_new_entry, write_count};
use super::{invalid_input, normalize_code};
use crate::gvas::{PropertyMap, StructValue};

pub const CURRENCY_MAX: i64 = i32::MAX as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlatinumKind {
    Fancy,
    Hidden,
    Low,
}

impl PlatinumKind {
    pub const ALL: [PlatinumKind; 3] = [Self::Fancy, Self::Hidden, Self::Low];

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Fancy => "Fancy",
            Self::Hidden => "Hidden",
            Self::Low => "Low",
        }
    }
}

/// One row of the currency view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum CurrencyKind {
    /// `AcquisitionSoul_0` on the character.
    Ergo,
    Quartz,
    /// Legion calibers, grades 1 to 4.
    Reinforce(u8),
    LegionPlug,
    GoldCoinFruit,
    Platinum(PlatinumKind),
    VenigniCoin,
    /// Boss ergo items are listed one code per row.
    BossErgo(String),
}

impl CurrencyKind {
    /// Rows shown even when the save holds none of the items.
    pub fn canonical() -> Vec<CurrencyKind> {
        let mut out = vec![Self::Quartz];
        out.extend((1..=4).map(Self::Reinforce));
        out.push(Self::LegionPlug);
        out.push(Self::GoldCoinFruit);
        out.extend(PlatinumKind::ALL.into_iter().map(Self::Platinum));
        out.push(Self::VenigniCoin);
        out
    }

    /// Row for an item code, `None` when the item is not a currency.
    pub fn for_code(code: &str) -> Option<Self> {
        let n = normalize_code(code);
        if n.is_empty() {
            return None;
        }
        if is_boss_ergo(&n) {
            return Some(Self::BossErgo(code.to_string()));
        }
        if n == "quartz" {
            return Some(Self::Quartz);
        }
        if let Some(grade) = n
            .strip_prefix("reinforceslavearmg")
            .and_then(|g| g.parse::<u8>().ok())
            .filter(|g| (1..=4).contains(g))
        {
            return Some(Self::Reinforce(grade));
        }
        if n == "legionplug" || n == "exchangeslavearmparts4" {
            return Some(Self::LegionPlug);
        }
        if matches!(
            n.as_str(),
            "goldcoinfruit" | "goldencoinfruit" | "exchangegoldenfruit"
        ) {
            return Some(Self::GoldCoinFruit);
        }
        if let Some(kind) = n.strip_prefix("consumeetcplatinumcoin").and_then(|k| {
            PlatinumKind::ALL
                .into_iter()
                .find(|p| p.as_str().eq_ignore_ascii_case(k))
        }) {
            return Some(Self::Platinum(kind));
        }
        if n.contains("venigni") {
            return Some(Self::VenigniCoin);
        }
        None
    }

    pub fn label(&self) -> String {
        match self {
            Self::Ergo => "Ergo (Souls)".to_string(),
            Self::Quartz => "Quartz".to_string(),
            Self::Reinforce(g) => format!("Reinforce Slavearm G{g}"),
            Self::LegionPlug => "Legion Plug".to_string(),
            Self::GoldCoinFruit => "Gold Coin Fruit".to_string(),
            Self::Platinum(kind) => format!("Consume Etc Platinumcoin {}", kind.as_str()),
            Self::VenigniCoin => "Venigni Commemorative Coin".to_string(),
            Self::BossErgo(code) => pretty_code(code),
        }
    }

    /// Item created when the row is set and the save holds none.
    pub fn canonical_code(&self) -> Option<String> {
        match self {
            Self::Ergo | Self::BossErgo(_) => None,
            Self::Quartz => Some("quartz".to_string()),
            Self::Reinforce(g) => Some(format!("Reinforce_SlaveArm_G{g}")),
            Self::LegionPlug => Some("Exchange_SlaveArm_Parts_4".to_string()),
            Self::GoldCoinFruit => Some("Exchange_GoldenFruit".to_string()),
            Self::Platinum(kind) => Some(format!("Consume_Etc_Platinumcoin_{}", kind.as_str())),
            Self::VenigniCoin => Some("VenigniCommemorativeCoin".to_string()),
        }
    }

    /// Stable identifier used on the command line.
    pub fn id(&self) -> String {
        match self {
            Self::Ergo => "ergo".to_string(),
            Self::Quartz => "quartz".to_string(),
            Self::Reinforce(g) => format!("caliber:g{g}"),
            Self::LegionPlug => "legionplug".to_string(),
            Self::GoldCoinFruit => "goldcoinfruit".to_string(),
            Self::Platinum(kind) => format!("plat:{}", kind.as_str().to_ascii_lowercase()),
            Self::VenigniCoin => "venigni".to_string(),
            Self::BossErgo(code) => format!("boss::{code}"),
        }
    }
}

impl fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for CurrencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(code) = s.strip_prefix("boss::") {
            return Ok(Self::BossErgo(code.to_string()));
        }
        if s.eq_ignore_ascii_case("ergo") || s.eq_ignore_ascii_case("souls") {
            return Ok(Self::Ergo);
        }
        std::iter::once(Self::Ergo)
            .chain(Self::canonical())
            .find(|k| k.id().eq_ignore_ascii_case(s))
            .or_else(|| Self::for_code(s))
            .ok_or_else(|| format!("unknown currency '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyRow {
    pub kind: CurrencyKind,
    pub id: String,
    pub label: String,
    /// Item codes found in the save for this row.
    pub codes: Vec<String>,
    pub total: i64,
}

pub(crate) fn is_boss_ergo(normalized: &str) -> bool {
    if normalized.contains("boss") && normalized.contains("ergo") {
        return true;
    }
    normalized
        .find("nameless")
        .is_some_and(|at| normalized[at..].contains("ergo"))
}

fn pretty_code(code: &str) -> String {
    code.replace('_', " ")
        .trim()
        .replace("Reinforce SlaveArm", "Reinforce Slavearm")
        .replace("GoldenCoinFruit", "Gold Coin Fruit")
        .replace("LegionPlug", "Legion Plug")
}

/// Ergo first, then item rows sorted by label with boss ergo last.
pub fn rows(root: &PropertyMap) -> Vec<CurrencyRow> {
    let mut found: Vec<(CurrencyKind, Vec<String>, i64)> = CurrencyKind::canonical()
        .into_iter()
        .map(|k| (k, Vec::new(), 0))
        .collect();

    for entry in entries(root)
        .into_iter()
        .flatten()
        .filter_map(StructValue::as_properties)
    {
        let code = code_of(entry);
        let Some(kind) = CurrencyKind::for_code(code) else {
            continue;
        };
        let count = count_of(entry).0;
        match found.iter_mut().find(|(k, _, _)| *k == kind) {
            Some((_, codes, total)) => {
                if !codes.iter().any(|c| c == code) {
                    codes.push(code.to_string());
                }
                *total += count;
            }
            None => found.push((kind, vec![code.to_string()], count)),
        }
    }

    found.sort_by_key(|(k, _, _)| (matches!(k, CurrencyKind::BossErgo(_)), k.label().to_lowercase()));

    let ergo = character::field(root, CharacterField::Ergo).unwrap_or(0);
    std::iter::once((CurrencyKind::Ergo, Vec::new(), ergo))
        .chain(found)
        .map(|(kind, codes, total)| CurrencyRow {
            id: kind.id(),
            label: kind.label(),
            kind,
            codes,
            total,
        })
        .collect()
}

/// Sum of every boss ergo item.
pub fn boss_total(root: &PropertyMap) -> i64 {
    entries(root)
        .into_iter()
        .flatten()
        .filter_map(StructValue::as_properties)
        .filter(|e| is_boss_ergo(&normalize_code(code_of(e))))
        .map(|e| count_of(e).0)
        .sum()
}

/// Set a currency row. Every stored variant of the row takes the value; an
/// absent canonical item is created. Returns the number of entries written.
pub fn set(root: &mut PropertyMap, kind: &CurrencyKind, value: i64) -> io::Result<usize> {
    let value = value.clamp(0, CURRENCY_MAX);
    if *kind == CurrencyKind::Ergo {
        character::set_field(root, CharacterField::Ergo, value)?;
        return Ok(1);
    }

    let items = entries_mut(root)?;
    let mut written = 0;
    for entry in items.iter_mut().filter_map(StructValue::as_properties_mut) {
        if CurrencyKind::for_code(code_of(entry)).as_ref() == Some(kind) {
            let width = count_of(entry).1;
            write_count(entry, value, width);
            written += 1;
        }
    }
    if written > 0 {
        return Ok(written);
    }

    let code = kind
        .canonical_code()
        .ok_or_else(|| invalid_input(format!("no {} items in this save", kind.label())))?;
    push_new_entry(items, &code, value);
    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_rows() {
        assert_eq!(CurrencyKind::for_code("Quartz"), Some(CurrencyKind::Quartz));
        assert_eq!(
            CurrencyKind::for_code("Reinforce_SlaveArm_G3"),
            Some(CurrencyKind::Reinforce(3))
        );
        assert_eq!(CurrencyKind::for_code("Reinforce_SlaveArm_G9"), None);
        assert_eq!(
            CurrencyKind::for_code("Exchange_SlaveArm_Parts_4"),
            Some(CurrencyKind::LegionPlug)
        );
        assert_eq!(
            CurrencyKind::for_code("Consume_Etc_Platinumcoin_Hidden"),
            Some(CurrencyKind::Platinum(PlatinumKind::Hidden))
        );
        assert_eq!(
            CurrencyKind::for_code("CH05_Boss_Ergo"),
            Some(CurrencyKind::BossErgo("CH05_Boss_Ergo".into()))
        );
        assert_eq!(
            CurrencyKind::for_code("Nameless_Puppet_Ergo"),
            Some(CurrencyKind::BossErgo("Nameless_Puppet_Ergo".into()))
        );
        assert_eq!(CurrencyKind::for_code("Consume_Heal_01"), None);
    }

    #[test]
    fn ids_parse_back() {
        for kind in CurrencyKind::canonical() {
            assert_eq!(kind.id().parse::<CurrencyKind>(), Ok(kind));
        }
        assert_eq!("souls".parse::<CurrencyKind>(), Ok(CurrencyKind::Ergo));
        assert_eq!(
            "boss::CH05_Boss_Ergo".parse::<CurrencyKind>(),
            Ok(CurrencyKind::BossErgo("CH05_Boss_Ergo".into()))
        );
        assert!("gems".parse::<CurrencyKind>().is_err());
    }

    #[test]
    fn labels() {
        assert_eq!(CurrencyKind::BossErgo("CH05_Boss_Ergo".into()).label(), "CH05 Boss Ergo");
        assert_eq!(
            CurrencyKind::Platinum(PlatinumKind::Low).label(),
            "Consume Etc Platinumcoin Low"
        );
    }
}
