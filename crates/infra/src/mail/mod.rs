//! Outbound mail boundary.
//!
//! The engine composes [`OutboundMail`] values; a [`MailDispatcher`] turns
//! them into whatever the transport needs. A dispatch either hands the whole
//! message off or fails; there is no partial delivery.

pub mod recording;
pub mod smtp;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use recording::RecordingMailer;
pub use smtp::SmtpMailer;

/// File attached to a message; read at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAttachment {
    pub filename: String,
    pub path: PathBuf,
}

impl MailAttachment {
    /// Attachment named after the file itself.
    pub fn from_path(path: PathBuf) -> Self {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment.pdf".to_string());
        Self { filename, path }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub subject: String,
    pub body: String,
    pub to: Vec<String>,
    pub bcc: Vec<String>,
    pub attachments: Vec<MailAttachment>,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("cannot read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("mail transport failed: {0}")]
    Transport(String),

    #[error("mail is not configured: {0}")]
    NotConfigured(String),
}

/// Hands a composed message to a delivery transport.
pub trait MailDispatcher: Send + Sync {
    fn dispatch(&self, mail: &OutboundMail) -> Result<(), MailError>;
}

impl<M> MailDispatcher for Arc<M>
where
    M: MailDispatcher + ?Sized,
{
    fn dispatch(&self, mail: &OutboundMail) -> Result<(), MailError> {
        (**self).dispatch(mail)
    }
}
