//! SMTP delivery through `lettre`.

use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};

use super::{MailDispatcher, MailError, OutboundMail};
use crate::config::SmtpConfig;

#[derive(Debug, Clone)]
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport, MailError> {
        if self.config.host.trim().is_empty() {
            return Err(MailError::NotConfigured("missing SMTP host".to_string()));
        }

        let mut builder = if self.config.starttls {
            SmtpTransport::starttls_relay(&self.config.host)
                .map_err(|e| MailError::Transport(format!("invalid SMTP host: {e}")))?
                .port(self.config.port)
        } else {
            SmtpTransport::builder_dangerous(&self.config.host).port(self.config.port)
        };

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(builder.build())
    }

    pub fn build_message(&self, mail: &OutboundMail) -> Result<Message, MailError> {
        let from = self
            .config
            .sender()
            .ok_or_else(|| MailError::NotConfigured("no sender address".to_string()))?;
        let mut builder = Message::builder()
            .from(parse_mailbox(from)?)
            .subject(mail.subject.clone());
        if mail.to.is_empty() {
            return Err(MailError::Build("message has no recipients".to_string()));
        }
        for to in &mail.to {
            builder = builder.to(parse_mailbox(to)?);
        }
        for bcc in &mail.bcc {
            builder = builder.bcc(parse_mailbox(bcc)?);
        }

        let pdf = ContentType::parse("application/pdf")
            .map_err(|e| MailError::Build(e.to_string()))?;
        let mut body = MultiPart::mixed().singlepart(SinglePart::plain(mail.body.clone()));
        for attachment in &mail.attachments {
            let bytes = std::fs::read(&attachment.path).map_err(|source| MailError::Attachment {
                path: attachment.path.clone(),
                source,
            })?;
            body = body.singlepart(
                Attachment::new(attachment.filename.clone()).body(bytes, pdf.clone()),
            );
        }

        builder
            .multipart(body)
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

fn parse_mailbox(raw: &str) -> Result<Mailbox, MailError> {
    raw.trim()
        .parse()
        .map_err(|_| MailError::InvalidAddress(raw.to_string()))
}

impl MailDispatcher for SmtpMailer {
    fn dispatch(&self, mail: &OutboundMail) -> Result<(), MailError> {
        let message = self.build_message(mail)?;
        let transport = self.transport()?;
        transport.send(&message).map_err(|e| {
            tracing::warn!(error = %e, subject = %mail.subject, "smtp send failed");
            MailError::Transport(e.to_string())
        })?;
        tracing::info!(
            subject = %mail.subject,
            recipients = mail.to.len(),
            attachments = mail.attachments.len(),
            "mail dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::MailAttachment;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            starttls: false,
            username: None,
            password: None,
            from_address: Some("billing@acme.test".to_string()),
        }
    }

    fn mail(attachments: Vec<MailAttachment>) -> OutboundMail {
        OutboundMail {
            subject: "Invoices for 2025-01".to_string(),
            body: "Attached are the invoices for 2025-01.".to_string(),
            to: vec!["ap@vendor.test".to_string()],
            bcc: vec!["audit@acme.test".to_string()],
            attachments,
        }
    }

    #[test]
    fn builds_multipart_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.pdf");
        std::fs::write(&path, b"%PDF-1.3").unwrap();

        let message = SmtpMailer::new(config())
            .build_message(&mail(vec![MailAttachment::from_path(path)]))
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Invoices for 2025-01"));
        assert!(raw.contains("alice.pdf"));
    }

    #[test]
    fn missing_attachment_is_reported() {
        let missing = MailAttachment::from_path("/nonexistent/alice.pdf".into());
        let err = SmtpMailer::new(config()).build_message(&mail(vec![missing])).unwrap_err();
        assert!(matches!(err, MailError::Attachment { .. }));
    }

    #[test]
    fn rejects_bad_recipient() {
        let mut bad = mail(Vec::new());
        bad.to = vec!["not-an-address".to_string()];
        let err = SmtpMailer::new(config()).build_message(&bad).unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(_)));
    }

    #[test]
    fn requires_a_sender() {
        let mut config = config();
        config.from_address = None;
        let err = SmtpMailer::new(config).build_message(&mail(Vec::new())).unwrap_err();
        assert!(matches!(err, MailError::NotConfigured(_)));
    }
}
