//! Monthly hour totals and the timesheet batches that feed them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbill_core::{DomainError, DomainResult, EmployeeId, MonthKey};

/// One submitted timesheet row, keyed by employee name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesheetRow {
    pub employee_name: String,
    pub hours: f64,
}

impl TimesheetRow {
    pub fn new(employee_name: impl Into<String>, hours: f64) -> Self {
        Self {
            employee_name: employee_name.into(),
            hours,
        }
    }
}

/// A timesheet submission for one billing month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimesheetBatch {
    pub month_key: MonthKey,
    pub rows: Vec<TimesheetRow>,
}

impl TimesheetBatch {
    pub fn new(month_key: MonthKey, rows: Vec<TimesheetRow>) -> Self {
        Self { month_key, rows }
    }

    /// Reject the whole batch if any row could decrement a total.
    pub fn validate(&self) -> DomainResult<()> {
        for (idx, row) in self.rows.iter().enumerate() {
            if row.employee_name.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "row {idx}: employee name must not be empty"
                )));
            }
            ensure_billable_increment(row.hours)
                .map_err(|e| DomainError::validation(format!("row {idx} ({}): {e}", row.employee_name)))?;
        }
        Ok(())
    }
}

/// Accumulated hours for one employee in one month.
///
/// Unique per `(employee_id, month_key)`; created lazily on the first row and
/// only ever incremented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeMonth {
    pub employee_id: EmployeeId,
    pub month_key: MonthKey,
    pub hours: f64,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeMonth {
    pub fn start(employee_id: EmployeeId, month_key: MonthKey, now: DateTime<Utc>) -> Self {
        Self {
            employee_id,
            month_key,
            hours: 0.0,
            updated_at: now,
        }
    }

    /// Add `hours` to the running total and stamp the update time.
    pub fn accumulate(&mut self, hours: f64, now: DateTime<Utc>) -> DomainResult<f64> {
        ensure_billable_increment(hours)?;
        self.hours += hours;
        self.updated_at = now;
        Ok(self.hours)
    }

    pub fn has_billable_hours(&self) -> bool {
        self.hours > 0.0
    }
}

pub(crate) fn ensure_billable_increment(hours: f64) -> DomainResult<()> {
    if !hours.is_finite() || hours < 0.0 {
        return Err(DomainError::validation(format!(
            "hours must be a non-negative number, got {hours}"
        )));
    }
    Ok(())
}
