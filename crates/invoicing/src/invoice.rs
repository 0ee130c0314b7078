use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbill_core::{DomainError, DomainResult, EmployeeId, InvoiceId, Money, MonthKey};

use crate::employee::Employee;
use crate::timesheet::EmployeeMonth;

/// Human-facing invoice number, unique across all invoices.
///
/// Format: `INV-<YYYYMM>-<employee suffix>-<UTC timestamp to the microsecond>`.
/// Two simultaneous generations for the same employee/month can still collide;
/// the `(employee, month)` uniqueness constraint is what guarantees idempotency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    pub fn generate(month_key: &MonthKey, employee_id: EmployeeId, at: DateTime<Utc>) -> Self {
        let hex = employee_id.to_string().replace('-', "");
        let suffix = &hex[hex.len().saturating_sub(12)..];
        Self(format!(
            "INV-{}-{}-{}",
            month_key.compact(),
            suffix,
            at.format("%Y%m%d%H%M%S%6f")
        ))
    }

    /// Wrap a number read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Delivery lifecycle, derived from the `approved` / `sent` flags.
///
/// `Draft -> Approved -> Sent`; no transition goes backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    Draft,
    Approved,
    Sent,
}

/// One invoice per employee per month.
///
/// `hours`, `rate` and `amount` are a snapshot taken at generation time and are
/// never recomputed; later rate changes on the employee do not reach them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    employee_id: EmployeeId,
    month_key: MonthKey,
    hours: f64,
    rate: Money,
    amount: Money,
    invoice_number: InvoiceNumber,
    artifact_path: Option<PathBuf>,
    approved: bool,
    sent: bool,
    created_at: DateTime<Utc>,
}

/// Column-level form of an [`Invoice`], as kept by SQL-backed stores.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub employee_id: EmployeeId,
    pub month_key: MonthKey,
    pub hours: f64,
    pub rate: Money,
    pub amount: Money,
    pub invoice_number: InvoiceNumber,
    pub artifact_path: Option<PathBuf>,
    pub approved: bool,
    pub sent: bool,
    pub created_at: DateTime<Utc>,
}

impl From<InvoiceRecord> for Invoice {
    fn from(record: InvoiceRecord) -> Self {
        Self {
            id: record.id,
            employee_id: record.employee_id,
            month_key: record.month_key,
            hours: record.hours,
            rate: record.rate,
            amount: record.amount,
            invoice_number: record.invoice_number,
            artifact_path: record.artifact_path,
            // A sent invoice was necessarily approved first.
            approved: record.approved || record.sent,
            sent: record.sent,
            created_at: record.created_at,
        }
    }
}

impl Invoice {
    pub fn to_record(&self) -> InvoiceRecord {
        InvoiceRecord {
            id: self.id,
            employee_id: self.employee_id,
            month_key: self.month_key.clone(),
            hours: self.hours,
            rate: self.rate,
            amount: self.amount,
            invoice_number: self.invoice_number.clone(),
            artifact_path: self.artifact_path.clone(),
            approved: self.approved,
            sent: self.sent,
            created_at: self.created_at,
        }
    }

    /// Freeze the employee's current rate and the month's hours into a draft invoice.
    pub fn issue(
        id: InvoiceId,
        employee: &Employee,
        month: &EmployeeMonth,
        invoice_number: InvoiceNumber,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if month.employee_id != employee.id {
            return Err(DomainError::validation("month total belongs to another employee"));
        }
        if !month.has_billable_hours() {
            return Err(DomainError::invalid_state(format!(
                "no billable hours for {} in {}",
                employee.name, month.month_key
            )));
        }
        let amount = employee.hourly_rate.times_hours(month.hours)?;

        Ok(Self {
            id,
            employee_id: employee.id,
            month_key: month.month_key.clone(),
            hours: month.hours,
            rate: employee.hourly_rate,
            amount,
            invoice_number,
            artifact_path: None,
            approved: false,
            sent: false,
            created_at: now,
        })
    }

    pub fn id(&self) -> InvoiceId {
        self.id
    }

    pub fn employee_id(&self) -> EmployeeId {
        self.employee_id
    }

    pub fn month_key(&self) -> &MonthKey {
        &self.month_key
    }

    pub fn hours(&self) -> f64 {
        self.hours
    }

    pub fn rate(&self) -> Money {
        self.rate
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn invoice_number(&self) -> &InvoiceNumber {
        &self.invoice_number
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> DeliveryState {
        match (self.approved, self.sent) {
            (_, true) => DeliveryState::Sent,
            (true, false) => DeliveryState::Approved,
            (false, false) => DeliveryState::Draft,
        }
    }

    /// Returns `true` when the flag actually flipped.
    pub fn approve(&mut self) -> bool {
        let changed = !self.approved;
        self.approved = true;
        changed
    }

    /// Sending requires prior approval.
    pub fn ensure_sendable(&self) -> DomainResult<()> {
        if !self.approved {
            return Err(DomainError::invalid_state(format!(
                "invoice {} is not approved",
                self.invoice_number
            )));
        }
        Ok(())
    }

    /// Returns `false` for an invoice that was already sent (no-op).
    pub fn mark_sent(&mut self) -> DomainResult<bool> {
        if self.sent {
            return Ok(false);
        }
        self.ensure_sendable()?;
        self.sent = true;
        Ok(true)
    }

    /// Record where the rendered document lives.
    pub fn attach_artifact(&mut self, path: PathBuf) {
        self.artifact_path = Some(path);
    }

    /// Deterministic document file name for this invoice.
    pub fn artifact_file_name(&self, employee_name: &str) -> String {
        let safe_name: String = employee_name
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .trim()
            .replace(' ', "_");
        let safe_name = if safe_name.is_empty() {
            "invoice".to_string()
        } else {
            safe_name
        };
        format!(
            "{}_{}_{}.pdf",
            safe_name,
            self.month_key.as_str().replace('-', "_"),
            self.invoice_number
        )
    }
}
