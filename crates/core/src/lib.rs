//! `hourbill-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the billing period key, money, and the domain error model.

pub mod error;
pub mod id;
pub mod money;
pub mod month;

pub use error::{DomainError, DomainResult};
pub use id::{EmployeeId, InvoiceId, VendorId};
pub use money::Money;
pub use month::MonthKey;
