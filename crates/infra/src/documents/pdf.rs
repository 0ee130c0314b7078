//! Letter-size single-page invoice layout with `printpdf` builtin fonts.

use std::io::BufWriter;
use std::path::Path;

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point,
};

use super::{DocumentRenderer, InvoiceDocument, RenderError, write_atomically};
use crate::config::BillingConfig;

const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const LEFT: f32 = 17.6;
const RIGHT: f32 = PAGE_WIDTH - 17.6;
const TOP_BAR: f32 = PAGE_HEIGHT - 28.2;
const BOTTOM_BAR: f32 = 14.1;
const BAR_HEIGHT: f32 = 14.1;

/// Renders invoices as PDF using the issuer details from [`BillingConfig`].
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    billing: BillingConfig,
}

impl PdfRenderer {
    pub fn new(billing: BillingConfig) -> Self {
        Self { billing }
    }

    /// Company shown in the header and its address line.
    fn issuer<'a>(&'a self, document: &'a InvoiceDocument) -> (&'a str, &'a str) {
        let company = document
            .employee_company
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(&self.billing.company_name);
        (company, self.billing.address_for(company))
    }

    pub fn to_bytes(&self, document: &InvoiceDocument) -> Result<Vec<u8>, RenderError> {
        let (doc, page, layer) = PdfDocument::new(
            format!("Invoice {}", document.invoice_number),
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Layer 1",
        );
        let layer = doc.get_page(page).get_layer(layer);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        let pen = Pen {
            layer: &layer,
            regular: &font,
            bold: &bold,
        };

        let currency = self.billing.currency_label();
        let (company, address) = self.issuer(document);
        let invoice_date = document.month_key.first_day().format("%-d-%b-%y").to_string();

        pen.rule(TOP_BAR + BAR_HEIGHT);
        pen.rule(TOP_BAR);
        pen.text(company, 11.0, LEFT, TOP_BAR + 5.0, true);
        pen.text(address, 8.0, LEFT, TOP_BAR + 1.0, false);
        pen.text("Invoice Number", 9.0, RIGHT - 70.0, TOP_BAR + 7.0, false);
        pen.text("Invoice Date", 9.0, RIGHT - 70.0, TOP_BAR + 2.8, false);
        pen.text_right(&document.invoice_number, 9.0, RIGHT, TOP_BAR + 7.0, true);
        pen.text_right(&invoice_date, 9.0, RIGHT, TOP_BAR + 2.8, true);

        let mut y = TOP_BAR - 14.0;
        pen.text("Employee", 10.0, LEFT, y, true);
        y -= 5.0;
        pen.text(&format!("Name: {}", document.employee_name), 9.0, LEFT, y, false);
        y -= 4.2;
        pen.text(company, 9.0, LEFT, y, false);
        if let Some(email) = &document.employee_email {
            y -= 4.2;
            pen.text(&format!("Email: {email}"), 9.0, LEFT, y, false);
        }
        if let Some(start) = document.employee_start_date {
            y -= 4.2;
            pen.text(&format!("Start date: {}", start.format("%Y-%m-%d")), 9.0, LEFT, y, false);
        }
        if let Some(vendor) = &document.vendor_name {
            y -= 4.2;
            pen.text(&format!("Vendor: {vendor}"), 9.0, LEFT, y, false);
        }

        y -= 9.0;
        pen.text("Description", 9.0, LEFT, y, true);
        pen.text_right("Hours", 9.0, RIGHT - 56.0, y, true);
        pen.text_right("Rate", 9.0, RIGHT - 28.0, y, true);
        pen.text_right("Amount", 9.0, RIGHT, y, true);
        y -= 3.5;
        pen.rule(y);
        y -= 5.6;

        let description = format!("{}, {}", document.employee_name, document.month_key);
        pen.text(&description, 9.0, LEFT, y, false);
        pen.text_right(&format!("{:.2}", document.hours), 9.0, RIGHT - 56.0, y, false);
        pen.text_right(
            &format!("{currency}{}", document.rate.to_grouped_string()),
            9.0,
            RIGHT - 28.0,
            y,
            false,
        );
        pen.text_right(
            &format!("{currency}{}", document.amount.to_grouped_string()),
            9.0,
            RIGHT,
            y,
            false,
        );

        pen.rule(BOTTOM_BAR + BAR_HEIGHT);
        pen.text("Thanks for your business", 10.0, LEFT, BOTTOM_BAR + 5.0, true);
        pen.text_right("Total", 10.0, RIGHT - 21.0, BOTTOM_BAR + 5.0, true);
        pen.text_right(
            &format!("{currency}{}", document.amount.to_grouped_string()),
            10.0,
            RIGHT,
            BOTTOM_BAR + 5.0,
            true,
        );
        pen.rule(BOTTOM_BAR);
        pen.text(&self.billing.contact_line(), 8.0, LEFT, BOTTOM_BAR - 5.0, false);

        let mut writer = BufWriter::new(Vec::<u8>::new());
        doc.save(&mut writer)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| RenderError::Pdf(e.to_string()))
    }
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, document: &InvoiceDocument, target: &Path) -> Result<(), RenderError> {
        let bytes = self.to_bytes(document)?;
        write_atomically(target, &bytes)?;
        tracing::debug!(
            invoice_number = %document.invoice_number,
            path = %target.display(),
            bytes = bytes.len(),
            "invoice pdf written"
        );
        Ok(())
    }
}

struct Pen<'a> {
    layer: &'a PdfLayerReference,
    regular: &'a IndirectFontRef,
    bold: &'a IndirectFontRef,
}

impl Pen<'_> {
    fn text(&self, text: &str, size: f32, x: f32, y: f32, bold: bool) {
        let font = if bold { self.bold } else { self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(y), font);
    }

    fn text_right(&self, text: &str, size: f32, right: f32, y: f32, bold: bool) {
        self.text(text, size, right - approx_width_mm(text, size), y, bold);
    }

    fn rule(&self, y: f32) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(LEFT - 3.5), Mm(y)), false),
                (Point::new(Mm(RIGHT + 3.5), Mm(y)), false),
            ],
            is_closed: false,
        });
    }
}

/// Rough Helvetica advance width; builtin fonts carry no metrics here.
fn approx_width_mm(text: &str, size: f32) -> f32 {
    let em: f32 = text
        .chars()
        .map(|c| match c {
            '.' | ',' | ':' | ' ' | 'i' | 'l' | 'j' | 't' | 'f' | 'I' => 0.28,
            '0'..='9' | '$' => 0.556,
            'm' | 'w' | 'M' | 'W' => 0.83,
            c if c.is_ascii_uppercase() => 0.67,
            _ => 0.52,
        })
        .sum();
    em * size * 0.3528
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourbill_core::{Money, MonthKey};

    fn document() -> InvoiceDocument {
        InvoiceDocument {
            invoice_number: "INV-202501-abcdef012345-20250201120000000000".to_string(),
            month_key: MonthKey::parse("2025-01").unwrap(),
            employee_name: "Alice Smith".to_string(),
            employee_email: Some("alice@globex.test".to_string()),
            employee_company: Some("Globex".to_string()),
            employee_start_date: None,
            vendor_name: None,
            hours: 10.0,
            rate: Money::from_major(40).unwrap(),
            amount: Money::from_major(400).unwrap(),
        }
    }

    #[test]
    fn renders_a_pdf_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("alice.pdf");
        PdfRenderer::default().render(&document(), &target).unwrap();

        let bytes = std::fs::read(&target).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn header_falls_back_to_the_configured_issuer() {
        let renderer = PdfRenderer::default();
        let mut doc = document();
        assert_eq!(renderer.issuer(&doc), ("Globex", "Address on file"));

        doc.employee_company = None;
        let billing = BillingConfig::default();
        assert_eq!(
            renderer.issuer(&doc),
            (billing.company_name.as_str(), billing.company_address.as_str())
        );
    }

    #[test]
    fn wider_text_measures_wider() {
        assert!(approx_width_mm("$1,000.00", 9.0) > approx_width_mm("$10.00", 9.0));
    }
}
