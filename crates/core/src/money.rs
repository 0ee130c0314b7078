//! Money in the smallest currency unit.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Non-negative amount in the smallest currency unit (e.g., cents).
///
/// Single-currency by construction; the currency label is a presentation
/// concern of the document renderer.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Whole currency units (e.g., `Money::from_major(40)` is 40.00).
    pub fn from_major(units: u64) -> DomainResult<Self> {
        units
            .checked_mul(100)
            .map(Self)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// `self` as an hourly rate multiplied by `hours`, rounded to the nearest cent.
    pub fn times_hours(self, hours: f64) -> DomainResult<Money> {
        if !hours.is_finite() || hours < 0.0 {
            return Err(DomainError::validation(format!(
                "hours must be a non-negative number, got {hours}"
            )));
        }
        let raw = (self.0 as f64) * hours;
        if !raw.is_finite() || raw > u64::MAX as f64 {
            return Err(DomainError::validation("amount overflow"));
        }
        Ok(Money(raw.round() as u64))
    }

    pub fn checked_add(self, other: Money) -> DomainResult<Money> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::validation("amount overflow"))
    }

    /// Amount with thousands separators and two decimals: `"1,234.50"`.
    pub fn to_grouped_string(self) -> String {
        let units = (self.0 / 100).to_string();
        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (idx, ch) in units.chars().enumerate() {
            if idx > 0 && (units.len() - idx) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        format!("{grouped}.{:02}", self.0 % 100)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rate_times_hours() {
        let rate = Money::from_major(40).unwrap();
        assert_eq!(rate.times_hours(10.0).unwrap(), Money::from_major(400).unwrap());
        assert_eq!(rate.times_hours(7.5).unwrap(), Money::from_cents(30_000));
        assert_eq!(Money::from_cents(3333).times_hours(1.5).unwrap(), Money::from_cents(5000));
    }

    #[test]
    fn rejects_negative_or_nan_hours() {
        let rate = Money::from_major(40).unwrap();
        assert!(rate.times_hours(-1.0).is_err());
        assert!(rate.times_hours(f64::NAN).is_err());
        assert!(rate.times_hours(f64::INFINITY).is_err());
    }

    #[test]
    fn grouped_formatting() {
        assert_eq!(Money::from_cents(5).to_grouped_string(), "0.05");
        assert_eq!(Money::from_cents(40_000).to_grouped_string(), "400.00");
        assert_eq!(Money::from_cents(123_456_789).to_grouped_string(), "1,234,567.89");
        assert_eq!(Money::from_cents(100_000).to_string(), "1000.00");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Whole hours never lose a cent.
        #[test]
        fn whole_hours_are_exact(rate in 1u64..1_000_000u64, hours in 0u32..1_000u32) {
            let amount = Money::from_cents(rate).times_hours(hours as f64).unwrap();
            prop_assert_eq!(amount.cents(), rate * hours as u64);
        }
    }
}
