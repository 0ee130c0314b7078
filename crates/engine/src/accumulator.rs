//! Timesheet ingestion: folds `(employee name, hours)` rows into month totals.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use hourbill_core::{EmployeeId, MonthKey};
use hourbill_infra::documents::DocumentRenderer;
use hourbill_infra::ledger::LedgerStore;
use hourbill_infra::mail::MailDispatcher;
use hourbill_invoicing::TimesheetBatch;

use crate::{EngineError, EngineResult, InvoiceEngine};

/// Outcome for one ingested row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccumulatedRow {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub added_hours: f64,
    pub month_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimesheetReceipt {
    pub month_key: MonthKey,
    pub rows: Vec<AccumulatedRow>,
}

impl<S, R, M> InvoiceEngine<S, R, M>
where
    S: LedgerStore,
    R: DocumentRenderer,
    M: MailDispatcher,
{
    /// Add a batch of hours to the month totals.
    ///
    /// All-or-nothing: rows are validated and every name resolved before the
    /// single store write, so an unknown employee or a bad row leaves the
    /// ledger untouched. Re-ingesting the same month adds on top.
    #[instrument(skip(self, batch), fields(month_key = %batch.month_key, rows = batch.rows.len()), err)]
    pub fn ingest_timesheet(&self, batch: &TimesheetBatch) -> EngineResult<TimesheetReceipt> {
        batch.validate()?;

        let mut entries = Vec::with_capacity(batch.rows.len());
        let mut names = Vec::with_capacity(batch.rows.len());
        for row in &batch.rows {
            let employee = self
                .store
                .find_employee_by_name(&row.employee_name)?
                .ok_or_else(|| {
                    EngineError::not_found(format!("employee '{}'", row.employee_name.trim()))
                })?;
            entries.push((employee.id, row.hours));
            names.push(employee.name);
        }

        let months = self
            .store
            .accumulate_hours(&batch.month_key, &entries, Utc::now())?;

        let rows = entries
            .iter()
            .zip(names)
            .zip(months)
            .map(|((&(employee_id, added_hours), employee_name), month)| AccumulatedRow {
                employee_id,
                employee_name,
                added_hours,
                month_total: month.hours,
            })
            .collect();
        info!("timesheet ingested");

        Ok(TimesheetReceipt {
            month_key: batch.month_key.clone(),
            rows,
        })
    }
}
