//! Roll-ups over sent invoices (company totals, earnings series).
//!
//! Pure folds over rows the ledger store has already joined; the engine fetches,
//! this module aggregates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use hourbill_core::{DomainResult, InvoiceId, Money, MonthKey};

use crate::payment::CompanyPayment;

/// Bucket for employees without a company label.
pub const UNASSIGNED_COMPANY: &str = "Unassigned";

/// A sent invoice joined with its employee's company label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentInvoiceRow {
    pub invoice_id: InvoiceId,
    pub month_key: MonthKey,
    pub company: Option<String>,
    pub amount: Money,
}

impl SentInvoiceRow {
    pub fn company_label(&self) -> &str {
        self.company.as_deref().unwrap_or(UNASSIGNED_COMPANY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyTotal {
    pub company: String,
    pub month_key: MonthKey,
    pub total_amount: Money,
    pub invoice_count: usize,
    pub paid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyEarnings {
    pub month_key: MonthKey,
    pub total_amount: Money,
}

/// Most recent month that has any sent invoice.
pub fn latest_month(rows: &[SentInvoiceRow]) -> Option<MonthKey> {
    rows.iter().map(|r| r.month_key.clone()).max()
}

/// Totals per company for `month_key`, ordered by company label, each joined
/// with its payment marker (`paid = false` when there is none).
pub fn company_totals(
    month_key: &MonthKey,
    rows: &[SentInvoiceRow],
    payments: &[CompanyPayment],
) -> DomainResult<Vec<CompanyTotal>> {
    let mut buckets: BTreeMap<&str, (Money, usize)> = BTreeMap::new();
    for row in rows.iter().filter(|r| &r.month_key == month_key) {
        let entry = buckets.entry(row.company_label()).or_insert((Money::ZERO, 0));
        entry.0 = entry.0.checked_add(row.amount)?;
        entry.1 += 1;
    }

    Ok(buckets
        .into_iter()
        .map(|(company, (total_amount, invoice_count))| {
            let paid = payments
                .iter()
                .any(|p| p.paid && &p.month_key == month_key && p.company == company);
            CompanyTotal {
                company: company.to_string(),
                month_key: month_key.clone(),
                total_amount,
                invoice_count,
                paid,
            }
        })
        .collect())
}

/// Sent amounts per month, oldest first.
pub fn earnings_series(rows: &[SentInvoiceRow]) -> DomainResult<Vec<MonthlyEarnings>> {
    let mut months: BTreeMap<&MonthKey, Money> = BTreeMap::new();
    for row in rows {
        let total = months.entry(&row.month_key).or_insert(Money::ZERO);
        *total = total.checked_add(row.amount)?;
    }
    Ok(months
        .into_iter()
        .map(|(month_key, total_amount)| MonthlyEarnings {
            month_key: month_key.clone(),
            total_amount,
        })
        .collect())
}
