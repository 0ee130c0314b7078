//! Invoice lifecycle engine.
//!
//! [`InvoiceEngine`] composes a [`LedgerStore`], a [`DocumentRenderer`] and a
//! [`MailDispatcher`] and exposes the lifecycle operations on top of them:
//!
//! ```text
//! timesheet rows ──ingest──▶ EmployeeMonth totals
//!                                  │
//!                              generate
//!                                  ▼
//!                 Invoice (Draft) + PDF artifact
//!                                  │ approve
//!                                  ▼
//!                          Invoice (Approved)
//!                                  │ send (grouped per delivery target)
//!                                  ▼
//!                            Invoice (Sent) ──▶ company totals / earnings
//! ```
//!
//! Each operation is an independent unit of work against the store. The
//! engine holds no mutable state between calls, so one engine can be shared
//! across threads. The store's uniqueness constraints are the final arbiter
//! under concurrency; see [`generator`] for how generation races resolve.

pub mod accumulator;
pub mod analytics;
pub mod artifacts;
pub mod delivery;
pub mod error;
pub mod generator;
pub mod registry;

use std::path::PathBuf;

use hourbill_core::InvoiceId;
use hourbill_infra::config::Config;
use hourbill_infra::documents::DocumentRenderer;
use hourbill_infra::ledger::LedgerStore;
use hourbill_infra::mail::MailDispatcher;
use hourbill_invoicing::Invoice;

pub use accumulator::{AccumulatedRow, TimesheetReceipt};
pub use analytics::CompanyTotals;
pub use artifacts::RegenerationReport;
pub use delivery::{DeliveredBatch, SendReport, SendRequest};
pub use error::{EngineError, EngineResult};

/// Engine-level knobs derived from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub invoice_dir: PathBuf,
    pub invoice_bcc: Vec<String>,
    pub reminder_to: Option<String>,
}

impl EngineSettings {
    pub fn new(invoice_dir: impl Into<PathBuf>) -> Self {
        Self {
            invoice_dir: invoice_dir.into(),
            invoice_bcc: Vec::new(),
            reminder_to: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            invoice_dir: config.artifacts.invoice_dir.clone(),
            invoice_bcc: config.delivery.invoice_bcc.clone(),
            reminder_to: config.delivery.reminder_to.clone(),
        }
    }
}

pub struct InvoiceEngine<S, R, M> {
    store: S,
    renderer: R,
    mailer: M,
    settings: EngineSettings,
}

impl<S, R, M> InvoiceEngine<S, R, M>
where
    S: LedgerStore,
    R: DocumentRenderer,
    M: MailDispatcher,
{
    pub fn new(store: S, renderer: R, mailer: M, settings: EngineSettings) -> Self {
        Self {
            store,
            renderer,
            mailer,
            settings,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn get_invoice(&self, id: InvoiceId) -> EngineResult<Invoice> {
        self.store
            .get_invoice(id)?
            .ok_or_else(|| EngineError::not_found(format!("invoice {id}")))
    }

    /// All invoices, newest first.
    pub fn list_invoices(&self) -> EngineResult<Vec<Invoice>> {
        Ok(self.store.list_invoices()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let config = Config::from_lookup(|key| match key {
            "INVOICE_DIR" => Some("/var/lib/hourbill/invoices".to_string()),
            "INVOICE_BCC" => Some("audit@acme.test".to_string()),
            "REMINDER_TO_EMAIL" => Some("timesheets@acme.test".to_string()),
            _ => None,
        })
        .unwrap();

        let settings = EngineSettings::from_config(&config);

        assert_eq!(settings.invoice_dir, PathBuf::from("/var/lib/hourbill/invoices"));
        assert_eq!(settings.invoice_bcc, vec!["audit@acme.test".to_string()]);
        assert_eq!(settings.reminder_to.as_deref(), Some("timesheets@acme.test"));
    }
}
