use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 16 raw bytes as stored in the file. Formatted as
/// `XXXXXXXX-XXXX-XXXX-XXXX-XXXXXXXXXXXX` over the byte order on disk.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Guid(pub [u8; 16]);

impl Guid {
    pub const ZERO: Guid = Guid([0u8; 16]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guid({self})")
    }
}

impl FromStr for Guid {
    type Err = io::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<u8> = s
            .trim()
            .trim_start_matches('{')
            .trim_end_matches('}')
            .bytes()
            .filter(|b| *b != b'-')
            .collect();
        if digits.len() != 32 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid guid '{s}': expected 32 hex digits"),
            ));
        }

        let mut out = [0u8; 16];
        for (i, pair) in digits.chunks_exact(2).enumerate() {
            let hi = hex_value(pair[0]);
            let lo = hex_value(pair[1]);
            match (hi, lo) {
                (Some(hi), Some(lo)) => out[i] = (hi << 4) | lo,
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("invalid guid '{s}': non-hex digit"),
                    ));
                }
            }
        }
        Ok(Guid(out))
    }
}

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Guid;

    #[test]
    fn display_and_parse_agree() {
        let mut raw = [0u8; 16];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = (i as u8) * 17;
        }
        let guid = Guid(raw);
        let text = guid.to_string();
        assert_eq!(text, "00112233-4455-6677-8899-AABBCCDDEEFF");
        assert_eq!(text.parse::<Guid>().unwrap(), guid);
        assert_eq!("{00112233445566778899aabbccddeeff}".parse::<Guid>().unwrap(), guid);
    }

    #[test]
    fn rejects_short_or_non_hex() {
        assert!("1234".parse::<Guid>().is_err());
        assert!("zz112233-4455-6677-8899-AABBCCDDEEFF".parse::<Guid>().is_err());
    }
}
