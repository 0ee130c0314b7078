//! PDF artifacts backing invoices.
//!
//! Artifacts are derived data: they can always be re-rendered from the
//! invoice's frozen snapshot, so a missing file is repaired on demand rather
//! than treated as an error. The file name embeds the invoice number, which
//! keeps paths distinct across invoices and makes concurrent renders safe.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, instrument};

use hourbill_core::InvoiceId;
use hourbill_infra::documents::{DocumentRenderer, InvoiceDocument};
use hourbill_infra::ledger::LedgerStore;
use hourbill_infra::mail::MailDispatcher;
use hourbill_invoicing::{Employee, Invoice};

use crate::{EngineError, EngineResult, InvoiceEngine};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegenerationReport {
    pub regenerated: usize,
    pub missing_before: usize,
    pub total: usize,
}

impl<S, R, M> InvoiceEngine<S, R, M>
where
    S: LedgerStore,
    R: DocumentRenderer,
    M: MailDispatcher,
{
    /// Path of the invoice's PDF, re-rendering it first if the file is gone.
    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub fn invoice_pdf(&self, id: InvoiceId) -> EngineResult<PathBuf> {
        let mut invoice = self.get_invoice(id)?;
        self.ensure_artifact(&mut invoice)?;
        invoice
            .artifact_path()
            .map(|p| p.to_path_buf())
            .ok_or_else(|| EngineError::invalid_state("artifact path missing after render"))
    }

    /// Repair every invoice whose artifact is missing or unrecorded.
    #[instrument(skip(self), err)]
    pub fn regenerate_missing(&self) -> EngineResult<RegenerationReport> {
        let invoices = self.store.list_invoices()?;
        let mut report = RegenerationReport {
            total: invoices.len(),
            ..RegenerationReport::default()
        };
        for mut invoice in invoices {
            if artifact_present(&invoice) {
                continue;
            }
            report.missing_before += 1;
            if self.ensure_artifact(&mut invoice)? {
                report.regenerated += 1;
            }
        }
        info!(
            regenerated = report.regenerated,
            missing_before = report.missing_before,
            total = report.total,
            "artifact sweep finished"
        );
        Ok(report)
    }

    /// Make sure `invoice` has a readable artifact; returns whether it had to
    /// be rendered. Only the path is written back, and `invoice` is refreshed
    /// from the stored row.
    pub(crate) fn ensure_artifact(&self, invoice: &mut Invoice) -> EngineResult<bool> {
        if artifact_present(invoice) {
            return Ok(false);
        }
        let employee = self.store.get_employee(invoice.employee_id())?;
        let path = self.render_artifact(invoice, employee.as_ref())?;
        *invoice = self.store.attach_artifact(invoice.id(), &path)?;
        info!(invoice_number = %invoice.invoice_number(), "artifact regenerated");
        Ok(true)
    }

    /// Render `invoice` to its canonical path and return that path.
    pub(crate) fn render_artifact(
        &self,
        invoice: &Invoice,
        employee: Option<&Employee>,
    ) -> EngineResult<PathBuf> {
        let vendor = match employee.and_then(|e| e.preferred_vendor_id) {
            Some(vendor_id) => self.store.get_vendor(vendor_id)?,
            None => None,
        };
        let document = InvoiceDocument::from_snapshot(invoice, employee, vendor.as_ref());
        let path = self
            .settings
            .invoice_dir
            .join(invoice.artifact_file_name(&document.employee_name));
        self.renderer.render(&document, &path)?;
        Ok(path)
    }
}

fn artifact_present(invoice: &Invoice) -> bool {
    invoice.artifact_path().is_some_and(|p| p.is_file())
}
