//! ByteCount - サイズ閾値などに使うバイト数
//!
//! `"20MB"` や `"512KiB"` のような表記をパースできる。
//! SI 接尾辞（KB, MB, GB, TB）は 1000 倍、IEC 接尾辞（KiB, MiB, GiB, TiB）は 1024 倍。

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteCount(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ByteCountParseError {
    #[error("empty byte count")]
    Empty,

    #[error("invalid number in byte count {0:?}")]
    InvalidNumber(String),

    #[error("unknown unit {unit:?} in byte count {input:?}")]
    UnknownUnit { input: String, unit: String },

    #[error("byte count {0:?} does not fit in 64 bits")]
    Overflow(String),
}

const UNITS: &[(&str, u64)] = &[
    ("", 1),
    ("B", 1),
    ("KB", 1_000),
    ("MB", 1_000_000),
    ("GB", 1_000_000_000),
    ("TB", 1_000_000_000_000),
    ("KIB", 1 << 10),
    ("MIB", 1 << 20),
    ("GIB", 1 << 30),
    ("TIB", 1 << 40),
];

impl ByteCount {
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteCount {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl FromStr for ByteCount {
    type Err = ByteCountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ByteCountParseError::Empty);
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(ByteCountParseError::InvalidNumber(s.to_string()));
        }
        let number: u64 = number
            .parse()
            .map_err(|_| ByteCountParseError::Overflow(s.to_string()))?;

        let unit_upper = unit.trim().to_ascii_uppercase();
        let multiplier = UNITS
            .iter()
            .find(|(name, _)| *name == unit_upper)
            .map(|(_, m)| *m)
            .ok_or_else(|| ByteCountParseError::UnknownUnit {
                input: s.to_string(),
                unit: unit.trim().to_string(),
            })?;

        number
            .checked_mul(multiplier)
            .map(ByteCount)
            .ok_or_else(|| ByteCountParseError::Overflow(s.to_string()))
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, multiplier) in [("GB", 1_000_000_000), ("MB", 1_000_000), ("KB", 1_000)] {
            if self.0 >= multiplier && self.0 % multiplier == 0 {
                return write!(f, "{}{}", self.0 / multiplier, name);
            }
        }
        write!(f, "{}B", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1000", 1_000)]
    #[case("20MB", 20_000_000)]
    #[case("20mb", 20_000_000)]
    #[case("512KiB", 512 * 1024)]
    #[case(" 3 GB ", 3_000_000_000)]
    #[case("7B", 7)]
    fn parses_sizes(#[case] input: &str, #[case] expected: u64) {
        assert_eq!(input.parse::<ByteCount>().unwrap(), ByteCount::new(expected));
    }

    #[rstest]
    #[case("", ByteCountParseError::Empty)]
    #[case("MB", ByteCountParseError::InvalidNumber("MB".to_string()))]
    #[case("10XB", ByteCountParseError::UnknownUnit { input: "10XB".to_string(), unit: "XB".to_string() })]
    #[case("99999999999TB", ByteCountParseError::Overflow("99999999999TB".to_string()))]
    fn rejects_bad_input(#[case] input: &str, #[case] expected: ByteCountParseError) {
        assert_eq!(input.parse::<ByteCount>().unwrap_err(), expected);
    }

    #[test]
    fn display_uses_largest_exact_unit() {
        assert_eq!(ByteCount::new(20_000_000).to_string(), "20MB");
        assert_eq!(ByteCount::new(1_500).to_string(), "1500B");
        assert_eq!(ByteCount::new(0).to_string(), "0B");
    }
}
