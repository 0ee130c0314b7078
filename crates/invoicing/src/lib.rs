//! Invoicing domain module.
//!
//! This crate contains the business rules of the invoice lifecycle (employees,
//! vendors, monthly hour totals, invoices and their delivery state, company
//! payment markers), implemented purely as deterministic domain logic
//! (no IO, no storage, no mail).

pub mod analytics;
pub mod employee;
pub mod invoice;
pub mod payment;
pub mod timesheet;
pub mod vendor;

pub use analytics::{CompanyTotal, MonthlyEarnings, SentInvoiceRow, UNASSIGNED_COMPANY};
pub use employee::{Employee, EmployeeDraft};
pub use invoice::{DeliveryState, Invoice, InvoiceNumber, InvoiceRecord};
pub use payment::CompanyPayment;
pub use timesheet::{EmployeeMonth, TimesheetBatch, TimesheetRow};
pub use vendor::{Vendor, VendorDraft};
