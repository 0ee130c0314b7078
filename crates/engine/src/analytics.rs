//! Company and monthly earnings views over sent invoices.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use hourbill_core::MonthKey;
use hourbill_infra::documents::DocumentRenderer;
use hourbill_infra::ledger::LedgerStore;
use hourbill_infra::mail::MailDispatcher;
use hourbill_invoicing::{CompanyPayment, CompanyTotal, MonthlyEarnings, analytics};

use crate::{EngineResult, InvoiceEngine};

/// Totals for one month; `month_key` is `None` only when nothing was ever sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompanyTotals {
    pub month_key: Option<MonthKey>,
    pub totals: Vec<CompanyTotal>,
}

impl<S, R, M> InvoiceEngine<S, R, M>
where
    S: LedgerStore,
    R: DocumentRenderer,
    M: MailDispatcher,
{
    /// Sent amounts per company for `month_key`, defaulting to the latest
    /// month that has any sent invoice.
    pub fn company_totals(&self, month_key: Option<&MonthKey>) -> EngineResult<CompanyTotals> {
        let rows = self.store.sent_invoice_rows()?;
        let month_key = match month_key {
            Some(m) => m.clone(),
            None => match analytics::latest_month(&rows) {
                Some(m) => m,
                None => return Ok(CompanyTotals::default()),
            },
        };
        let payments = self.store.company_payments(&month_key)?;
        let totals = analytics::company_totals(&month_key, &rows, &payments)?;
        Ok(CompanyTotals {
            month_key: Some(month_key),
            totals,
        })
    }

    /// Record whether `company` has paid for `month_key`. Repeating the same
    /// call is harmless; `paid = false` clears the payment time.
    #[instrument(skip(self, month_key), fields(month_key = %month_key), err)]
    pub fn mark_paid(
        &self,
        company: &str,
        month_key: &MonthKey,
        paid: bool,
    ) -> EngineResult<CompanyPayment> {
        let mut marker = CompanyPayment::new(company, month_key.clone())?;
        marker.set_paid(paid, Utc::now());
        let marker = self.store.upsert_company_payment(marker)?;
        info!(company = %marker.company, paid, "company payment marked");
        Ok(marker)
    }

    /// Sent amounts per month, oldest first.
    pub fn earnings_series(&self) -> EngineResult<Vec<MonthlyEarnings>> {
        let rows = self.store.sent_invoice_rows()?;
        Ok(analytics::earnings_series(&rows)?)
    }
}
