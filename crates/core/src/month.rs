//! Billing period key (`"YYYY-MM"`).

use core::fmt;
use core::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Canonical `"YYYY-MM"` key identifying one calendar month.
///
/// The canonical form is zero-padded, so lexicographic order is chronological
/// order. That lets stores keep the raw string and still sort by period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthKey(String);

impl MonthKey {
    /// Parse a `"YYYY-MM"` key.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let trimmed = s.trim();
        let bytes = trimmed.as_bytes();
        if bytes.len() != 7 || bytes[4] != b'-' {
            return Err(DomainError::validation(format!(
                "month_key must look like YYYY-MM, got '{s}'"
            )));
        }
        let first = NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d")
            .map_err(|e| DomainError::validation(format!("invalid month_key '{s}': {e}")))?;
        Ok(Self::from_date(first))
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self(format!("{:04}-{:02}", date.year(), date.month()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `"202501"` for `"2025-01"`; used inside invoice numbers.
    pub fn compact(&self) -> String {
        self.0.replace('-', "")
    }

    pub fn year(&self) -> i32 {
        self.first_day().year()
    }

    pub fn month(&self) -> u32 {
        self.first_day().month()
    }

    /// First calendar day of the period (the invoice date on documents).
    pub fn first_day(&self) -> NaiveDate {
        // Constructed only from validated input.
        NaiveDate::parse_from_str(&format!("{}-01", self.0), "%Y-%m-%d")
            .unwrap_or(NaiveDate::MIN)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MonthKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MonthKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MonthKey> for String {
    fn from(value: MonthKey) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_key() {
        let key = MonthKey::parse("2025-01").unwrap();
        assert_eq!(key.as_str(), "2025-01");
        assert_eq!(key.compact(), "202501");
        assert_eq!(key.year(), 2025);
        assert_eq!(key.month(), 1);
        assert_eq!(key.first_day(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["2025-1", "2025/01", "2025-13", "25-01", "", "2025-001"] {
            assert!(MonthKey::parse(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn orders_chronologically() {
        let mut keys = vec![
            MonthKey::parse("2025-02").unwrap(),
            MonthKey::parse("2024-12").unwrap(),
            MonthKey::parse("2025-01").unwrap(),
        ];
        keys.sort();
        let ordered: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
        assert_eq!(ordered, vec!["2024-12", "2025-01", "2025-02"]);
    }

    #[test]
    fn serde_validates_on_the_way_in() {
        let ok: Result<MonthKey, _> = serde_json::from_str("\"2025-03\"");
        assert!(ok.is_ok());
        let bad: Result<MonthKey, _> = serde_json::from_str("\"March\"");
        assert!(bad.is_err());
    }
}
