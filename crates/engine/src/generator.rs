//! Invoice generation.
//!
//! ## One invoice per employee-month
//!
//! Generation first looks for an existing invoice and returns it untouched
//! (repairing only a missing artifact). Two callers can still both see "no
//! invoice yet" and race to insert. The store's `(employee_id, month_key)`
//! constraint decides the winner; the loser deletes the artifact it rendered
//! and returns the winner's invoice, so every racer observes the same
//! invoice number. A collision on the invoice number alone is retried once
//! with a fresh number.
//!
//! ## Batches
//!
//! Every requested employee is checked (exists, has billable hours or an
//! invoice already) before anything is rendered or written, so a request that
//! names one employee without hours fails as a whole.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use hourbill_core::{EmployeeId, InvoiceId, MonthKey};
use hourbill_infra::documents::DocumentRenderer;
use hourbill_infra::ledger::{Constraint, LedgerStore};
use hourbill_infra::mail::MailDispatcher;
use hourbill_invoicing::{Employee, EmployeeMonth, Invoice, InvoiceNumber};

use crate::{EngineError, EngineResult, InvoiceEngine};

enum Plan {
    Existing(Invoice),
    Issue(Employee, EmployeeMonth),
}

impl<S, R, M> InvoiceEngine<S, R, M>
where
    S: LedgerStore,
    R: DocumentRenderer,
    M: MailDispatcher,
{
    /// Generate (or fetch) the invoice of each employee for `month_key`.
    ///
    /// Results follow request order; repeated ids are handled once.
    #[instrument(skip(self, month_key, employee_ids), fields(month_key = %month_key, requested = employee_ids.len()), err)]
    pub fn generate_invoices(
        &self,
        month_key: &MonthKey,
        employee_ids: &[EmployeeId],
    ) -> EngineResult<Vec<Invoice>> {
        let mut seen = HashSet::new();
        let mut plans = Vec::new();
        for &id in employee_ids.iter().filter(|id| seen.insert(**id)) {
            plans.push(self.plan(id, month_key)?);
        }

        let mut invoices = Vec::with_capacity(plans.len());
        for plan in plans {
            let invoice = match plan {
                Plan::Existing(mut invoice) => {
                    self.ensure_artifact(&mut invoice)?;
                    invoice
                }
                Plan::Issue(employee, month) => self.issue(&employee, &month)?,
            };
            invoices.push(invoice);
        }
        Ok(invoices)
    }

    fn plan(&self, id: EmployeeId, month_key: &MonthKey) -> EngineResult<Plan> {
        let employee = self.get_employee(id)?;
        if let Some(existing) = self.store.find_invoice(id, month_key)? {
            return Ok(Plan::Existing(existing));
        }
        match self.store.get_employee_month(id, month_key)? {
            Some(month) if month.has_billable_hours() => Ok(Plan::Issue(employee, month)),
            _ => Err(EngineError::invalid_state(format!(
                "no billable hours for {} in {}",
                employee.name, month_key
            ))),
        }
    }

    fn issue(&self, employee: &Employee, month: &EmployeeMonth) -> EngineResult<Invoice> {
        let mut retried = false;
        loop {
            let now = Utc::now();
            let number = InvoiceNumber::generate(&month.month_key, employee.id, now);
            let mut invoice = Invoice::issue(InvoiceId::new(), employee, month, number, now)?;
            let path = self.render_artifact(&invoice, Some(employee))?;
            invoice.attach_artifact(path.clone());

            match self.store.insert_invoice(invoice) {
                Ok(invoice) => {
                    info!(
                        employee_id = %employee.id,
                        invoice_number = %invoice.invoice_number(),
                        amount = %invoice.amount(),
                        "invoice generated"
                    );
                    return Ok(invoice);
                }
                Err(err) if err.is_unique_violation(Constraint::InvoiceEmployeeMonth) => {
                    let mut winner = self
                        .store
                        .find_invoice(employee.id, &month.month_key)?
                        .ok_or_else(|| {
                            EngineError::not_found(format!(
                                "invoice for {} in {}",
                                employee.name, month.month_key
                            ))
                        })?;
                    discard_orphan(&path, winner.artifact_path());
                    self.ensure_artifact(&mut winner)?;
                    debug!(
                        invoice_number = %winner.invoice_number(),
                        "concurrent generation resolved to existing invoice"
                    );
                    return Ok(winner);
                }
                Err(err) if err.is_unique_violation(Constraint::InvoiceNumber) && !retried => {
                    discard_orphan(&path, None);
                    warn!(employee_id = %employee.id, "invoice number collision, retrying");
                    retried = true;
                }
                Err(err) => {
                    discard_orphan(&path, None);
                    return Err(err.into());
                }
            }
        }
    }
}

/// Remove an artifact rendered for an insert that lost, unless the surviving
/// invoice points at the very same file.
fn discard_orphan(orphan: &Path, keep: Option<&Path>) {
    if keep == Some(orphan) {
        return;
    }
    if let Err(e) = std::fs::remove_file(orphan) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %orphan.display(), error = %e, "orphaned artifact not removed");
        }
    }
}
