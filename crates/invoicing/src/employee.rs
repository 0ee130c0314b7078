use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use hourbill_core::{DomainError, DomainResult, EmployeeId, Money, VendorId};

use crate::analytics::UNASSIGNED_COMPANY;

/// Registration / update payload for an employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub name: String,
    /// Hourly rate in smallest currency unit.
    pub hourly_rate: Money,
    pub email: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub preferred_vendor_id: Option<VendorId>,
}

impl EmployeeDraft {
    pub fn new(name: impl Into<String>, hourly_rate: Money) -> Self {
        Self {
            name: name.into(),
            hourly_rate,
            email: None,
            company: None,
            start_date: None,
            preferred_vendor_id: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    pub fn with_preferred_vendor(mut self, vendor_id: VendorId) -> Self {
        self.preferred_vendor_id = Some(vendor_id);
        self
    }

    /// Trim text fields and enforce the registration rules.
    fn normalized(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("employee name must not be empty"));
        }
        if self.hourly_rate.is_zero() {
            return Err(DomainError::validation("hourly_rate must be positive"));
        }
        let email = non_blank(self.email);
        if let Some(email) = &email {
            if !email.contains('@') {
                return Err(DomainError::validation(format!("invalid email address '{email}'")));
            }
        }
        Ok(Self {
            name,
            hourly_rate: self.hourly_rate,
            email,
            company: non_blank(self.company),
            start_date: self.start_date,
            preferred_vendor_id: self.preferred_vendor_id,
        })
    }
}

/// A billable employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub hourly_rate: Money,
    pub email: Option<String>,
    pub company: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub preferred_vendor_id: Option<VendorId>,
    /// Total hours ever ingested; never decreases.
    pub lifetime_hours: f64,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn register(id: EmployeeId, draft: EmployeeDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let draft = draft.normalized()?;
        Ok(Self {
            id,
            name: draft.name,
            hourly_rate: draft.hourly_rate,
            email: draft.email,
            company: draft.company,
            start_date: draft.start_date,
            preferred_vendor_id: draft.preferred_vendor_id,
            lifetime_hours: 0.0,
            created_at: now,
        })
    }

    /// Replace the editable fields. `lifetime_hours` and existing invoices are untouched.
    pub fn apply_update(&mut self, draft: EmployeeDraft) -> DomainResult<()> {
        let draft = draft.normalized()?;
        self.name = draft.name;
        self.hourly_rate = draft.hourly_rate;
        self.email = draft.email;
        self.company = draft.company;
        self.start_date = draft.start_date;
        self.preferred_vendor_id = draft.preferred_vendor_id;
        Ok(())
    }

    /// Fold ingested hours into the lifetime accumulator.
    pub fn add_lifetime_hours(&mut self, hours: f64) -> DomainResult<()> {
        crate::timesheet::ensure_billable_increment(hours)?;
        self.lifetime_hours += hours;
        Ok(())
    }

    /// Company bucket used by analytics.
    pub fn company_label(&self) -> &str {
        self.company.as_deref().unwrap_or(UNASSIGNED_COMPANY)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> EmployeeDraft {
        EmployeeDraft::new("  Alice ", Money::from_major(40).unwrap())
            .with_email("alice@example.com")
            .with_company("Acme")
    }

    #[test]
    fn register_trims_and_starts_at_zero_hours() {
        let e = Employee::register(EmployeeId::new(), alice(), Utc::now()).unwrap();
        assert_eq!(e.name, "Alice");
        assert_eq!(e.lifetime_hours, 0.0);
        assert_eq!(e.company_label(), "Acme");
    }

    #[test]
    fn zero_rate_is_rejected() {
        let draft = EmployeeDraft::new("Bob", Money::ZERO);
        let err = Employee::register(EmployeeId::new(), draft, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn blank_company_rolls_up_as_unassigned() {
        let draft = EmployeeDraft::new("Carol", Money::from_cents(1)).with_company("   ");
        let e = Employee::register(EmployeeId::new(), draft, Utc::now()).unwrap();
        assert_eq!(e.company, None);
        assert_eq!(e.company_label(), UNASSIGNED_COMPANY);
    }

    #[test]
    fn update_keeps_lifetime_hours() {
        let mut e = Employee::register(EmployeeId::new(), alice(), Utc::now()).unwrap();
        e.add_lifetime_hours(12.5).unwrap();
        e.apply_update(EmployeeDraft::new("Alice", Money::from_major(100).unwrap()))
            .unwrap();
        assert_eq!(e.lifetime_hours, 12.5);
        assert_eq!(e.hourly_rate, Money::from_major(100).unwrap());
        assert_eq!(e.email, None);
    }

    #[test]
    fn lifetime_hours_never_decrease() {
        let mut e = Employee::register(EmployeeId::new(), alice(), Utc::now()).unwrap();
        assert!(e.add_lifetime_hours(-3.0).is_err());
        assert_eq!(e.lifetime_hours, 0.0);
    }
}
