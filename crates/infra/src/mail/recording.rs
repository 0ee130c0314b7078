//! Mail dispatcher that records messages instead of sending them (tests/dev).

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{MailDispatcher, MailError, OutboundMail};

#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundMail>>,
    failing: AtomicBool,
    /// Messages still accepted before dispatch starts failing.
    budget: Mutex<Option<usize>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every dispatch fails with a transport error. Clearing it also
    /// lifts a limit set by [`fail_after`](Self::fail_after).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
        if !failing {
            if let Ok(mut budget) = self.budget.lock() {
                *budget = None;
            }
        }
    }

    /// Accept `count` more messages, then fail every dispatch.
    pub fn fail_after(&self, count: usize) {
        if let Ok(mut budget) = self.budget.lock() {
            *budget = Some(count);
        }
    }

    /// Messages accepted so far, in dispatch order.
    pub fn sent(&self) -> Vec<OutboundMail> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl MailDispatcher for RecordingMailer {
    fn dispatch(&self, mail: &OutboundMail) -> Result<(), MailError> {
        let mut budget = self
            .budget
            .lock()
            .map_err(|_| MailError::Transport("recorder lock poisoned".to_string()))?;
        if self.failing.load(Ordering::SeqCst) || *budget == Some(0) {
            return Err(MailError::Transport("recording mailer set to fail".to_string()));
        }
        if mail.to.is_empty() {
            return Err(MailError::Build("message has no recipients".to_string()));
        }
        for attachment in &mail.attachments {
            std::fs::metadata(&attachment.path).map_err(|source| MailError::Attachment {
                path: attachment.path.clone(),
                source,
            })?;
        }
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("recorder lock poisoned".to_string()))?
            .push(mail.clone());
        if let Some(remaining) = budget.as_mut() {
            *remaining -= 1;
        }
        Ok(())
    }
}
