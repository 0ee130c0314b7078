//! Approval and delivery.
//!
//! ```text
//! Draft ──approve──▶ Approved ──send──▶ Sent
//! ```
//!
//! Neither flag is ever cleared. Sending is strict: one unapproved invoice
//! fails the whole call before anything is dispatched. Invoices that share a
//! delivery target travel in one message; a group's sent flags are persisted
//! only after its dispatch succeeded. If that write fails the mail is already
//! out: the call fails and a warning lists the delivered invoice numbers.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use hourbill_core::{InvoiceId, MonthKey};
use hourbill_infra::documents::DocumentRenderer;
use hourbill_infra::ledger::LedgerStore;
use hourbill_infra::mail::{MailAttachment, MailDispatcher, OutboundMail};
use hourbill_invoicing::Invoice;

use crate::{EngineError, EngineResult, InvoiceEngine};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendRequest {
    pub invoice_ids: Vec<InvoiceId>,
    /// Overrides vendor routing for every invoice when present.
    pub recipients: Option<Vec<String>>,
}

impl SendRequest {
    pub fn new(invoice_ids: Vec<InvoiceId>) -> Self {
        Self {
            invoice_ids,
            recipients: None,
        }
    }

    pub fn to(mut self, recipients: Vec<String>) -> Self {
        self.recipients = Some(recipients);
        self
    }
}

/// One dispatched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveredBatch {
    pub recipients: Vec<String>,
    pub invoice_numbers: Vec<String>,
    pub month_keys: Vec<MonthKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendReport {
    pub sent_count: usize,
    pub batches: Vec<DeliveredBatch>,
}

impl<S, R, M> InvoiceEngine<S, R, M>
where
    S: LedgerStore,
    R: DocumentRenderer,
    M: MailDispatcher,
{
    /// Approve every invoice that exists; unknown ids are skipped.
    ///
    /// Returns how many invoices were found (already-approved ones count).
    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    pub fn approve(&self, ids: &[InvoiceId]) -> EngineResult<usize> {
        let mut found = Vec::new();
        for id in dedup(ids) {
            match self.store.get_invoice(id)? {
                Some(_) => found.push(id),
                None => debug!(invoice_id = %id, "approve skipped unknown invoice"),
            }
        }
        let approved = self.store.approve_invoices(&found)?;
        info!(approved = approved.len(), "invoices approved");
        Ok(approved.len())
    }

    /// Deliver approved invoices, one message per delivery target.
    #[instrument(skip(self, request), fields(requested = request.invoice_ids.len()), err)]
    pub fn send(&self, request: &SendRequest) -> EngineResult<SendReport> {
        let explicit = match &request.recipients {
            Some(list) => Some(normalize_recipients(list)?),
            None => None,
        };

        let mut pending = Vec::new();
        for id in dedup(&request.invoice_ids) {
            let Some(invoice) = self.store.get_invoice(id)? else {
                debug!(invoice_id = %id, "send skipped unknown invoice");
                continue;
            };
            if invoice.is_sent() {
                debug!(invoice_number = %invoice.invoice_number(), "already sent");
                continue;
            }
            invoice.ensure_sendable()?;
            let target = match &explicit {
                Some(list) => list.clone(),
                None => self.vendor_target(&invoice)?,
            };
            pending.push((target, invoice));
        }

        let mut groups: BTreeMap<Vec<String>, Vec<Invoice>> = BTreeMap::new();
        for (target, mut invoice) in pending {
            self.ensure_artifact(&mut invoice)?;
            groups.entry(target).or_default().push(invoice);
        }

        let mut report = SendReport::default();
        for (recipients, invoices) in groups {
            let months: BTreeSet<MonthKey> =
                invoices.iter().map(|i| i.month_key().clone()).collect();
            let month_list = months
                .iter()
                .map(MonthKey::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            let attachments = invoices
                .iter()
                .filter_map(|i| i.artifact_path())
                .map(|p| MailAttachment::from_path(p.to_path_buf()))
                .collect();
            let mail = OutboundMail {
                subject: format!("Invoices for {month_list}"),
                body: format!("Attached are the invoices for {month_list}."),
                to: recipients.clone(),
                bcc: self.settings.invoice_bcc.clone(),
                attachments,
            };

            self.mailer.dispatch(&mail)?;

            let ids: Vec<InvoiceId> = invoices.iter().map(Invoice::id).collect();
            let invoices = match self.store.mark_invoices_sent(&ids) {
                Ok(invoices) => invoices,
                Err(err) => {
                    warn!(
                        recipients = %recipients.join(", "),
                        invoice_numbers = %numbers(&invoices).join(", "),
                        error = %err,
                        "invoices delivered but sent flags not recorded"
                    );
                    return Err(err.into());
                }
            };

            let batch = DeliveredBatch {
                recipients,
                invoice_numbers: numbers(&invoices),
                month_keys: months.into_iter().collect(),
            };
            info!(
                recipients = %batch.recipients.join(", "),
                invoices = batch.invoice_numbers.len(),
                "invoice batch delivered"
            );
            report.sent_count += invoices.len();
            report.batches.push(batch);
        }
        Ok(report)
    }

    /// Ask the timesheet inbox to submit hours for `month_key`.
    #[instrument(skip(self, month_key), fields(month_key = %month_key), err)]
    pub fn send_timesheet_reminder(&self, month_key: &MonthKey) -> EngineResult<()> {
        let to = self
            .settings
            .reminder_to
            .clone()
            .ok_or_else(|| EngineError::invalid_state("no reminder recipient configured"))?;
        let mail = OutboundMail {
            subject: format!("Timesheet Reminder - {month_key}"),
            body: format!(
                "Hi team,\n\nPlease submit your timesheet for {month_key}.\n\nThank you!"
            ),
            to: vec![to],
            bcc: Vec::new(),
            attachments: Vec::new(),
        };
        self.mailer.dispatch(&mail)?;
        info!("timesheet reminder sent");
        Ok(())
    }

    fn vendor_target(&self, invoice: &Invoice) -> EngineResult<Vec<String>> {
        let no_target = || {
            EngineError::invalid_state(format!(
                "invoice {} has no delivery target (no recipients and no vendor email)",
                invoice.invoice_number()
            ))
        };
        let employee = self.store.get_employee(invoice.employee_id())?;
        let vendor = match employee.and_then(|e| e.preferred_vendor_id) {
            Some(vendor_id) => self.store.get_vendor(vendor_id)?,
            None => None,
        };
        let emails = vendor.map(|v| v.emails).unwrap_or_default();
        if emails.is_empty() {
            return Err(no_target());
        }
        Ok(canonical(emails))
    }
}

fn numbers(invoices: &[Invoice]) -> Vec<String> {
    invoices
        .iter()
        .map(|i| i.invoice_number().to_string())
        .collect()
}

fn dedup(ids: &[InvoiceId]) -> Vec<InvoiceId> {
    let mut seen = HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

fn normalize_recipients(raw: &[String]) -> EngineResult<Vec<String>> {
    let list: Vec<String> = raw
        .iter()
        .map(|r| r.trim())
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    if list.is_empty() {
        return Err(EngineError::validation("recipient list is empty"));
    }
    if let Some(bad) = list.iter().find(|r| !r.contains('@')) {
        return Err(EngineError::validation(format!("invalid recipient '{bad}'")));
    }
    Ok(canonical(list))
}

/// Lowercased, sorted and deduplicated; used as the grouping key.
fn canonical(emails: Vec<String>) -> Vec<String> {
    let mut emails: Vec<String> = emails.into_iter().map(|e| e.to_lowercase()).collect();
    emails.sort();
    emails.dedup();
    emails
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_recipient_lists_are_rejected() {
        let err = normalize_recipients(&["  ".to_string()]).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn grouping_key_ignores_order_and_case() {
        let a = canonical(vec!["b@x.test".into(), "A@x.test".into()]);
        let b = canonical(vec!["a@x.test".into(), "B@x.test".into(), "b@x.test".into()]);
        assert_eq!(a, b);
        assert_eq!(a, vec!["a@x.test".to_string(), "b@x.test".to_string()]);
    }
}
