//! Invoice document rendering.
//!
//! The engine hands a fully resolved [`InvoiceDocument`] to a
//! [`DocumentRenderer`] together with the target path; the renderer owns the
//! layout and the file write.

pub mod pdf;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use hourbill_core::{Money, MonthKey};
use hourbill_invoicing::{Employee, Invoice, Vendor};

pub use pdf::PdfRenderer;

/// Everything printed on one invoice, detached from the ledger types.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDocument {
    pub invoice_number: String,
    pub month_key: MonthKey,
    pub employee_name: String,
    pub employee_email: Option<String>,
    pub employee_company: Option<String>,
    pub employee_start_date: Option<NaiveDate>,
    pub vendor_name: Option<String>,
    pub hours: f64,
    pub rate: Money,
    pub amount: Money,
}

impl InvoiceDocument {
    /// Build from the invoice's frozen snapshot. Employee details are
    /// decoration only; a missing employee renders as "Employee".
    pub fn from_snapshot(
        invoice: &Invoice,
        employee: Option<&Employee>,
        vendor: Option<&Vendor>,
    ) -> Self {
        Self {
            invoice_number: invoice.invoice_number().to_string(),
            month_key: invoice.month_key().clone(),
            employee_name: employee
                .map(|e| e.name.clone())
                .unwrap_or_else(|| "Employee".to_string()),
            employee_email: employee.and_then(|e| e.email.clone()),
            employee_company: employee.and_then(|e| e.company.clone()),
            employee_start_date: employee.and_then(|e| e.start_date),
            vendor_name: vendor.map(|v| v.name.clone()),
            hours: invoice.hours(),
            rate: invoice.rate(),
            amount: invoice.amount(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("pdf generation failed: {0}")]
    Pdf(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Produces the artifact file for an invoice.
///
/// Implementations must write `target` atomically: readers either see the
/// previous file (or none) or the complete new one.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &InvoiceDocument, target: &Path) -> Result<(), RenderError>;
}

impl<R> DocumentRenderer for Arc<R>
where
    R: DocumentRenderer + ?Sized,
{
    fn render(&self, document: &InvoiceDocument, target: &Path) -> Result<(), RenderError> {
        (**self).render(document, target)
    }
}

/// Write `bytes` to a sibling temp file and rename it over `target`.
pub fn write_atomically(target: &Path, bytes: &[u8]) -> Result<(), RenderError> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| RenderError::io(&dir, e))?;

    let mut staged = tempfile::NamedTempFile::new_in(&dir).map_err(|e| RenderError::io(&dir, e))?;
    staged
        .write_all(bytes)
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| RenderError::io(staged.path(), e))?;
    staged
        .persist(target)
        .map_err(|e| RenderError::io(target, e.error))?;
    Ok(())
}
