//! Configuration management.
//!
//! Everything is read from environment variables (optionally seeded from a
//! `.env` file). Parsing goes through a lookup function so tests never touch
//! the process environment.
//!
//! # Environment Variables
//!
//! - `SMTP_HOST` / `SMTP_PORT` (default `smtp.gmail.com:587`)
//! - `SMTP_USER` / `SMTP_PASS`: relay credentials, both or neither
//! - `SMTP_STARTTLS`: `true` (default) or `false` for a plain relay
//! - `FROM_EMAIL`: sender address, falls back to `SMTP_USER`
//! - `REMINDER_TO_EMAIL`: timesheet reminder recipient
//! - `INVOICE_BCC`: comma-separated addresses copied on invoice mail
//! - `INVOICE_DIR`: artifact directory (default `./generated_invoices`)
//! - `LEDGER_PATH`: SQLite ledger file (default `./hourbill.sqlite3`)
//! - `COMPANY_NAME`, `COMPANY_ADDRESS`, `COMPANY_EMAIL`
//! - `COMPANY_ADDRESSES`: `name=address;name=address` address book
//! - `DEFAULT_CURRENCY` (default `USD`)
//! - `LOG_FORMAT`: `json` (default) or `pretty`

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;

use hourbill_observability::LogFormat;

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub smtp: SmtpConfig,
    pub billing: BillingConfig,
    pub artifacts: ArtifactConfig,
    pub ledger: LedgerConfig,
    pub delivery: DeliveryConfig,
    pub log_format: LogFormat,
}

/// Outbound mail relay.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub starttls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

impl SmtpConfig {
    /// Sender address: explicit `FROM_EMAIL`, else the relay user.
    pub fn sender(&self) -> Option<&str> {
        self.from_address.as_deref().or(self.username.as_deref())
    }
}

/// Issuer details printed on invoice documents.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    pub company_name: String,
    pub company_address: String,
    pub company_email: String,
    /// Keys are lowercased company labels.
    pub company_addresses: BTreeMap<String, String>,
    pub currency: String,
}

impl BillingConfig {
    pub fn currency_label(&self) -> &str {
        if self.currency.eq_ignore_ascii_case("USD") {
            "$"
        } else {
            &self.currency
        }
    }

    /// Address book entry for `company`; the configured issuer falls back to
    /// `company_address`.
    pub fn address_for(&self, company: &str) -> &str {
        let company = company.trim();
        if let Some(address) = self.company_addresses.get(&company.to_lowercase()) {
            return address;
        }
        if company.eq_ignore_ascii_case(self.company_name.trim()) {
            return &self.company_address;
        }
        "Address on file"
    }

    /// Footer line naming the billing contact.
    pub fn contact_line(&self) -> String {
        format!("Billing questions: {}", self.company_email)
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            company_name: "Your Company LLC".to_string(),
            company_address: "123 Main St, City, State".to_string(),
            company_email: "billing@yourcompany.com".to_string(),
            company_addresses: BTreeMap::new(),
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub invoice_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryConfig {
    pub reminder_to: Option<String>,
    pub invoice_bcc: Vec<String>,
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable has an invalid value.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("SMTP_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("SMTP_PORT must be a port number, got '{raw}'"))?,
            None => 587,
        };
        let starttls = match get("SMTP_STARTTLS") {
            Some(raw) => parse_bool(&raw).context("SMTP_STARTTLS must be true or false")?,
            None => true,
        };

        let username = get("SMTP_USER");
        let password = get("SMTP_PASS");
        if username.is_some() != password.is_some() {
            anyhow::bail!("SMTP_USER and SMTP_PASS must be set together");
        }

        let from_address = get("FROM_EMAIL");
        if let Some(from) = &from_address {
            ensure_address("FROM_EMAIL", from)?;
        }
        let reminder_to = get("REMINDER_TO_EMAIL");
        if let Some(to) = &reminder_to {
            ensure_address("REMINDER_TO_EMAIL", to)?;
        }
        let invoice_bcc = split_list(get("INVOICE_BCC").as_deref().unwrap_or(""));
        for bcc in &invoice_bcc {
            ensure_address("INVOICE_BCC", bcc)?;
        }

        let defaults = BillingConfig::default();
        let company_email = get("COMPANY_EMAIL").unwrap_or(defaults.company_email);
        ensure_address("COMPANY_EMAIL", &company_email)?;
        let company_addresses = match get("COMPANY_ADDRESSES") {
            Some(raw) => parse_address_book(&raw)?,
            None => BTreeMap::new(),
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            smtp: SmtpConfig {
                host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port,
                starttls,
                username,
                password,
                from_address,
            },
            billing: BillingConfig {
                company_name: get("COMPANY_NAME").unwrap_or(defaults.company_name),
                company_address: get("COMPANY_ADDRESS").unwrap_or(defaults.company_address),
                company_email,
                company_addresses,
                currency: get("DEFAULT_CURRENCY")
                    .map(|c| c.to_uppercase())
                    .unwrap_or(defaults.currency),
            },
            artifacts: ArtifactConfig {
                invoice_dir: get("INVOICE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./generated_invoices")),
            },
            ledger: LedgerConfig {
                path: get("LEDGER_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("./hourbill.sqlite3")),
            },
            delivery: DeliveryConfig {
                reminder_to,
                invoice_bcc,
            },
            log_format,
        })
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("not a boolean: '{other}'"),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn ensure_address(key: &str, value: &str) -> anyhow::Result<()> {
    if !value.contains('@') {
        anyhow::bail!("{key} is not an email address: '{value}'");
    }
    Ok(())
}

fn parse_address_book(raw: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut book = BTreeMap::new();
    for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, address) = entry
            .split_once('=')
            .with_context(|| format!("COMPANY_ADDRESSES entry '{entry}' is not name=address"))?;
        let (name, address) = (name.trim(), address.trim());
        if name.is_empty() || address.is_empty() {
            anyhow::bail!("COMPANY_ADDRESSES entry '{entry}' has an empty side");
        }
        book.insert(name.to_lowercase(), address.to_string());
    }
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.smtp.host, "smtp.gmail.com");
        assert_eq!(config.smtp.port, 587);
        assert!(config.smtp.starttls);
        assert_eq!(config.billing.currency_label(), "$");
        assert_eq!(config.artifacts.invoice_dir, PathBuf::from("./generated_invoices"));
        assert_eq!(config.ledger.path, PathBuf::from("./hourbill.sqlite3"));
        assert!(config.delivery.reminder_to.is_none());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn sender_falls_back_to_relay_user() {
        let config = config_from(&[("SMTP_USER", "relay@acme.test"), ("SMTP_PASS", "pw")]).unwrap();
        assert_eq!(config.smtp.sender(), Some("relay@acme.test"));

        let config = config_from(&[
            ("SMTP_USER", "relay@acme.test"),
            ("SMTP_PASS", "pw"),
            ("FROM_EMAIL", "billing@acme.test"),
        ])
        .unwrap();
        assert_eq!(config.smtp.sender(), Some("billing@acme.test"));
    }

    #[test]
    fn credentials_must_come_in_pairs() {
        assert!(config_from(&[("SMTP_USER", "relay@acme.test")]).is_err());
    }

    #[test]
    fn rejects_bad_port() {
        assert!(config_from(&[("SMTP_PORT", "smtp")]).is_err());
    }

    #[test]
    fn parses_lists_and_address_book() {
        let config = config_from(&[
            ("INVOICE_BCC", "a@acme.test, b@acme.test"),
            ("COMPANY_ADDRESSES", "Globex = 1 Globex Way; Initech=4120 Freidrich Ln"),
            ("DEFAULT_CURRENCY", "eur"),
        ])
        .unwrap();
        assert_eq!(config.delivery.invoice_bcc, vec!["a@acme.test", "b@acme.test"]);
        assert_eq!(config.billing.address_for("GLOBEX"), "1 Globex Way");
        assert_eq!(config.billing.address_for("Umbrella"), "Address on file");
        assert_eq!(config.billing.currency_label(), "EUR");
    }

    #[test]
    fn issuer_uses_its_own_address_and_email() {
        let config = config_from(&[
            ("COMPANY_NAME", "Hourly Partners"),
            ("COMPANY_ADDRESS", "9 Harbor Rd, Portland, ME"),
            ("COMPANY_EMAIL", "ar@hourly.test"),
        ])
        .unwrap();
        assert_eq!(config.billing.address_for(" hourly partners"), "9 Harbor Rd, Portland, ME");
        assert_eq!(config.billing.address_for("Globex"), "Address on file");
        assert_eq!(config.billing.contact_line(), "Billing questions: ar@hourly.test");

        assert!(config_from(&[("COMPANY_EMAIL", "accounts")]).is_err());
    }

    #[test]
    fn rejects_malformed_address_book() {
        assert!(config_from(&[("COMPANY_ADDRESSES", "Globex")]).is_err());
    }
}
