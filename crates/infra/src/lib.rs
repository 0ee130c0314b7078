//! Infrastructure layer: ledger storage, document rendering, mail delivery, config.

pub mod config;
pub mod documents;
pub mod ledger;
pub mod mail;
