use thiserror::Error;

use hourbill_core::DomainError;
use hourbill_infra::documents::RenderError;
use hourbill_infra::ledger::LedgerError;
use hourbill_infra::mail::MailError;

/// Error returned by every engine operation.
///
/// The first four variants are the caller-facing taxonomy; the rest wrap
/// infrastructure failures from the store, the renderer and the mailer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate name on create/update.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("ledger store failure: {0}")]
    Store(#[source] LedgerError),

    #[error("artifact generation failed: {0}")]
    Artifact(#[from] RenderError),

    #[error("mail dispatch failed: {0}")]
    Dispatch(#[from] MailError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::NotFound(msg) => EngineError::NotFound(msg),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
            DomainError::InvalidState(msg) => EngineError::InvalidState(msg),
        }
    }
}

impl From<LedgerError> for EngineError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::UniqueViolation { detail, .. } => EngineError::Conflict(detail),
            LedgerError::NotFound { entity, id } => EngineError::NotFound(format!("{entity} {id}")),
            LedgerError::Domain(err) => err.into(),
            other => EngineError::Store(other),
        }
    }
}
