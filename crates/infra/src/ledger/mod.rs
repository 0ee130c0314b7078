//! Ledger store boundary.
//!
//! This module defines the infrastructure-facing contract for persisting
//! employees, vendors, monthly hour totals, invoices and company payment markers,
//! without making any storage-technology assumptions.

pub mod in_memory;
pub mod sqlite;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;
pub use r#trait::{Constraint, LedgerError, LedgerResult, LedgerStore};
