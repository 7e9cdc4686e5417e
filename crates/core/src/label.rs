//! Label metadata value objects: market and serial prefix.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Market a label batch was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Local,
    Export,
}

impl Default for Market {
    fn default() -> Self {
        Market::Local
    }
}

impl core::fmt::Display for Market {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Market::Local => f.write_str("local"),
            Market::Export => f.write_str("export"),
        }
    }
}

/// Printed serial prefix: exactly three uppercase ASCII letters.
///
/// A prefix partitions the serial space; two ranges with different prefixes
/// never interact, whatever their numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LabelPrefix([u8; 3]);

impl LabelPrefix {
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(LedgerError::validation(
                "prefix must be 3 uppercase letters (A-Z)",
            ));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII.
        core::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for LabelPrefix {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for LabelPrefix {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LabelPrefix> for String {
    fn from(value: LabelPrefix) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for LabelPrefix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_three_uppercase_letters() {
        let p = LabelPrefix::parse("ABC").unwrap();
        assert_eq!(p.as_str(), "ABC");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let p = LabelPrefix::parse(" XYZ ").unwrap();
        assert_eq!(p.as_str(), "XYZ");
    }

    #[test]
    fn rejects_lowercase_digits_and_wrong_length() {
        for bad in ["abc", "AB", "ABCD", "A1C", ""] {
            assert!(LabelPrefix::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
