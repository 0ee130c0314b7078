use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hourbill_core::{DomainError, DomainResult, VendorId};

/// Registration payload for a vendor. `emails` is the comma-joined list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorDraft {
    pub name: String,
    pub emails: String,
}

impl VendorDraft {
    pub fn new(name: impl Into<String>, emails: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            emails: emails.into(),
        }
    }
}

/// Billing vendor: the party invoices are delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    /// Delivery addresses, at least one.
    pub emails: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Vendor {
    pub fn register(id: VendorId, draft: VendorDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("vendor name must not be empty"));
        }
        let emails = parse_email_list(&draft.emails)?;
        Ok(Self {
            id,
            name,
            emails,
            created_at: now,
        })
    }

    /// Comma-joined form, as stored and displayed.
    pub fn joined_emails(&self) -> String {
        self.emails.join(",")
    }
}

/// Split a comma-joined address list, dropping blanks.
pub fn parse_email_list(raw: &str) -> DomainResult<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let addr = part.trim();
        if addr.is_empty() {
            continue;
        }
        if !addr.contains('@') {
            return Err(DomainError::validation(format!("invalid email address '{addr}'")));
        }
        if !out.iter().any(|a| a.eq_ignore_ascii_case(addr)) {
            out.push(addr.to_string());
        }
    }
    if out.is_empty() {
        return Err(DomainError::validation(
            "at least one delivery email address is required",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_dedupes_addresses() {
        let v = Vendor::register(
            VendorId::new(),
            VendorDraft::new("Globex", " ap@globex.com, ,billing@globex.com,AP@globex.com"),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(v.emails, vec!["ap@globex.com", "billing@globex.com"]);
        assert_eq!(v.joined_emails(), "ap@globex.com,billing@globex.com");
    }

    #[test]
    fn requires_an_address() {
        let err = Vendor::register(VendorId::new(), VendorDraft::new("Globex", " , "), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(parse_email_list("not-an-address").is_err());
    }
}
