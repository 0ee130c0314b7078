use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use hourbill_core::{DomainError, EmployeeId, InvoiceId, MonthKey, VendorId};
use hourbill_invoicing::{
    CompanyPayment, Employee, EmployeeMonth, Invoice, SentInvoiceRow, Vendor,
};

/// Uniqueness constraints enforced by every ledger store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// `employees.name`
    EmployeeName,
    /// `vendors.name`
    VendorName,
    /// `employee_months (employee_id, month_key)`
    EmployeeMonth,
    /// `invoices (employee_id, month_key)`
    InvoiceEmployeeMonth,
    /// `invoices.invoice_number`
    InvoiceNumber,
}

impl core::fmt::Display for Constraint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Constraint::EmployeeName => "uq_employee_name",
            Constraint::VendorName => "uq_vendor_name",
            Constraint::EmployeeMonth => "uq_employee_month",
            Constraint::InvoiceEmployeeMonth => "uq_invoice_employee_month",
            Constraint::InvoiceNumber => "uq_invoice_number",
        };
        f.write_str(name)
    }
}

/// Ledger store operation error.
///
/// These are **infrastructure errors** (constraint violations, missing rows on
/// write, storage failures) as opposed to domain errors, which the engine
/// raises before it ever reaches the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A write collided with a uniqueness constraint. Nothing was written.
    #[error("unique constraint {constraint} violated: {detail}")]
    UniqueViolation { constraint: Constraint, detail: String },

    /// A write referenced a row that does not exist. Nothing was written.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A staged change was rejected by a domain rule. Nothing was written.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn unique(constraint: Constraint, detail: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint,
            detail: detail.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_unique_violation(&self, constraint: Constraint) -> bool {
        matches!(self, LedgerError::UniqueViolation { constraint: c, .. } if *c == constraint)
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Durable record of the invoice lifecycle.
///
/// ## Atomicity
///
/// Every method is one unit of work: it either applies completely or leaves the
/// store untouched. Multi-row writes (`accumulate_hours`, `approve_invoices`,
/// `mark_invoices_sent`, `delete_employee`) are all-or-nothing.
///
/// ## Invoice writes
///
/// After insertion an invoice only changes through narrow one-way writes:
/// `approved` and `sent` are set, never cleared, and recording an artifact
/// path leaves both flags as stored. Callers never write back a whole row, so
/// a stale copy cannot undo a concurrent transition.
///
/// ## Uniqueness
///
/// Implementations must enforce the constraints listed in [`Constraint`] at
/// write time and report collisions as [`LedgerError::UniqueViolation`]. The
/// invoice generator relies on `InvoiceEmployeeMonth` as the final arbiter of
/// "one invoice per employee per month" under concurrent generation.
///
/// ## Relationships
///
/// References are plain foreign-key fields (`employee_id`,
/// `preferred_vendor_id`). Joins the engine needs are exposed as explicit
/// queries (`sent_invoice_rows`), never as lazy loading.
pub trait LedgerStore: Send + Sync {
    /// Insert a new employee (`EmployeeName` must be free).
    fn insert_employee(&self, employee: Employee) -> LedgerResult<Employee>;

    /// Replace an existing employee's editable fields. `lifetime_hours` is
    /// only ever changed by `accumulate_hours`.
    fn update_employee(&self, employee: &Employee) -> LedgerResult<()>;

    /// Delete an employee and cascade to its month totals and invoices.
    ///
    /// Returns the removed invoices, or `None` when the employee did not exist.
    fn delete_employee(&self, id: EmployeeId) -> LedgerResult<Option<Vec<Invoice>>>;

    fn get_employee(&self, id: EmployeeId) -> LedgerResult<Option<Employee>>;

    fn find_employee_by_name(&self, name: &str) -> LedgerResult<Option<Employee>>;

    /// All employees ordered by name.
    fn list_employees(&self) -> LedgerResult<Vec<Employee>>;

    fn insert_vendor(&self, vendor: Vendor) -> LedgerResult<Vendor>;

    fn get_vendor(&self, id: VendorId) -> LedgerResult<Option<Vendor>>;

    /// All vendors ordered by name.
    fn list_vendors(&self) -> LedgerResult<Vec<Vendor>>;

    /// Delete a vendor and clear it as preferred vendor on every employee.
    fn delete_vendor(&self, id: VendorId) -> LedgerResult<bool>;

    fn get_employee_month(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<EmployeeMonth>>;

    /// Fold `(employee, hours)` entries into month totals and lifetime hours.
    ///
    /// Month rows are created lazily. Returns the month row as it stood after
    /// each entry, in entry order. Fails without writing anything if any
    /// employee is missing.
    fn accumulate_hours(
        &self,
        month_key: &MonthKey,
        entries: &[(EmployeeId, f64)],
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<EmployeeMonth>>;

    /// Insert a new invoice (`InvoiceEmployeeMonth` and `InvoiceNumber` must be free).
    fn insert_invoice(&self, invoice: Invoice) -> LedgerResult<Invoice>;

    fn get_invoice(&self, id: InvoiceId) -> LedgerResult<Option<Invoice>>;

    fn find_invoice(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<Invoice>>;

    /// All invoices, newest first.
    fn list_invoices(&self) -> LedgerResult<Vec<Invoice>>;

    /// Record where an invoice's document lives and return the stored row.
    fn attach_artifact(&self, id: InvoiceId, path: &Path) -> LedgerResult<Invoice>;

    /// Set `approved` on every listed invoice. Fails without writing anything
    /// if one of them does not exist.
    fn approve_invoices(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>>;

    /// Set `sent` on every listed invoice. Fails without writing anything if
    /// one of them does not exist or is not approved. Already-sent rows are
    /// left as they are.
    fn mark_invoices_sent(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>>;

    /// Sent invoices joined with their employee's company label.
    fn sent_invoice_rows(&self) -> LedgerResult<Vec<SentInvoiceRow>>;

    /// Insert or replace the marker for `(company, month_key)`.
    fn upsert_company_payment(&self, payment: CompanyPayment) -> LedgerResult<CompanyPayment>;

    fn company_payments(&self, month_key: &MonthKey) -> LedgerResult<Vec<CompanyPayment>>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn insert_employee(&self, employee: Employee) -> LedgerResult<Employee> {
        (**self).insert_employee(employee)
    }

    fn update_employee(&self, employee: &Employee) -> LedgerResult<()> {
        (**self).update_employee(employee)
    }

    fn delete_employee(&self, id: EmployeeId) -> LedgerResult<Option<Vec<Invoice>>> {
        (**self).delete_employee(id)
    }

    fn get_employee(&self, id: EmployeeId) -> LedgerResult<Option<Employee>> {
        (**self).get_employee(id)
    }

    fn find_employee_by_name(&self, name: &str) -> LedgerResult<Option<Employee>> {
        (**self).find_employee_by_name(name)
    }

    fn list_employees(&self) -> LedgerResult<Vec<Employee>> {
        (**self).list_employees()
    }

    fn insert_vendor(&self, vendor: Vendor) -> LedgerResult<Vendor> {
        (**self).insert_vendor(vendor)
    }

    fn get_vendor(&self, id: VendorId) -> LedgerResult<Option<Vendor>> {
        (**self).get_vendor(id)
    }

    fn list_vendors(&self) -> LedgerResult<Vec<Vendor>> {
        (**self).list_vendors()
    }

    fn delete_vendor(&self, id: VendorId) -> LedgerResult<bool> {
        (**self).delete_vendor(id)
    }

    fn get_employee_month(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<EmployeeMonth>> {
        (**self).get_employee_month(employee_id, month_key)
    }

    fn accumulate_hours(
        &self,
        month_key: &MonthKey,
        entries: &[(EmployeeId, f64)],
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<EmployeeMonth>> {
        (**self).accumulate_hours(month_key, entries, at)
    }

    fn insert_invoice(&self, invoice: Invoice) -> LedgerResult<Invoice> {
        (**self).insert_invoice(invoice)
    }

    fn get_invoice(&self, id: InvoiceId) -> LedgerResult<Option<Invoice>> {
        (**self).get_invoice(id)
    }

    fn find_invoice(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<Invoice>> {
        (**self).find_invoice(employee_id, month_key)
    }

    fn list_invoices(&self) -> LedgerResult<Vec<Invoice>> {
        (**self).list_invoices()
    }

    fn attach_artifact(&self, id: InvoiceId, path: &Path) -> LedgerResult<Invoice> {
        (**self).attach_artifact(id, path)
    }

    fn approve_invoices(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        (**self).approve_invoices(ids)
    }

    fn mark_invoices_sent(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        (**self).mark_invoices_sent(ids)
    }

    fn sent_invoice_rows(&self) -> LedgerResult<Vec<SentInvoiceRow>> {
        (**self).sent_invoice_rows()
    }

    fn upsert_company_payment(&self, payment: CompanyPayment) -> LedgerResult<CompanyPayment> {
        (**self).upsert_company_payment(payment)
    }

    fn company_payments(&self, month_key: &MonthKey) -> LedgerResult<Vec<CompanyPayment>> {
        (**self).company_payments(month_key)
    }
}
