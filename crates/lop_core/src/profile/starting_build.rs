use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Starting build chosen at character creation (`DefaultStatCodeName_0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartingBuild {
    Balance,
    Dexterity,
    Strength,
}

impl StartingBuild {
    pub const BALANCE_CODE: &'static str = "balance";
    pub const DEXTERITY_CODE: &'static str = "dexterity";
    pub const STRENGTH_CODE: &'static str = "strength";

    pub const ALL: [StartingBuild; 3] = [Self::Balance, Self::Dexterity, Self::Strength];

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|build| build.code().eq_ignore_ascii_case(code.trim()))
    }

    pub fn code(&self) -> &'static str {
        match *self {
            Self::Balance => Self::BALANCE_CODE,
            Self::Dexterity => Self::DEXTERITY_CODE,
            Self::Strength => Self::STRENGTH_CODE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Balance => "Balance",
            Self::Dexterity => "Dexterity",
            Self::Strength => "Strength",
        }
    }
}

impl fmt::Display for StartingBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StartingBuild {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| {
            format!("unknown starting build '{s}' (expected balance, dexterity or strength)")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_case_insensitively() {
        for build in StartingBuild::ALL {
            assert_eq!(StartingBuild::from_code(build.code()), Some(build));
        }
        assert_eq!(StartingBuild::from_code(" Strength "), Some(StartingBuild::Strength));
        assert_eq!(StartingBuild::from_code("magic"), None);
        assert!("magic".parse::<StartingBuild>().is_err());
    }
}
