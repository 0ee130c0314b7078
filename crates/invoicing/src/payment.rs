use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbill_core::{DomainError, DomainResult, MonthKey};

/// Manually-toggled "this company paid for this month" marker.
///
/// Unique per `(company, month_key)`. Annotation only: it never gates or alters
/// invoice state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPayment {
    pub company: String,
    pub month_key: MonthKey,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

impl CompanyPayment {
    pub fn new(company: &str, month_key: MonthKey) -> DomainResult<Self> {
        let company = company.trim();
        if company.is_empty() {
            return Err(DomainError::validation("company label must not be empty"));
        }
        Ok(Self {
            company: company.to_string(),
            month_key,
            paid: false,
            paid_at: None,
        })
    }

    /// `paid = true` stamps `paid_at`; `paid = false` clears it.
    pub fn set_paid(&mut self, paid: bool, now: DateTime<Utc>) {
        self.paid = paid;
        self.paid_at = if paid { Some(now) } else { None };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_stamps_and_clears_paid_at() {
        let mut p = CompanyPayment::new(" Acme ", MonthKey::parse("2025-01").unwrap()).unwrap();
        assert_eq!(p.company, "Acme");
        let now = Utc::now();
        p.set_paid(true, now);
        assert_eq!(p.paid_at, Some(now));
        p.set_paid(false, now);
        assert!(!p.paid);
        assert_eq!(p.paid_at, None);
    }

    #[test]
    fn blank_company_is_rejected() {
        assert!(CompanyPayment::new("  ", MonthKey::parse("2025-01").unwrap()).is_err());
    }
}
