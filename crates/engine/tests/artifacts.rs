mod common;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use common::{Harness, dollars, month};
use hourbill_engine::{EngineError, RegenerationReport, SendRequest};
use hourbill_infra::documents::{DocumentRenderer, InvoiceDocument, PdfRenderer, RenderError};
use hourbill_invoicing::{DeliveryState, EmployeeDraft};

/// Renderer whose first render after [`arm`](Self::arm) parks until released.
struct GatedRenderer {
    inner: PdfRenderer,
    armed: AtomicBool,
    entered: Barrier,
    release: Barrier,
}

impl GatedRenderer {
    fn new() -> Self {
        Self {
            inner: PdfRenderer::default(),
            armed: AtomicBool::new(false),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl DocumentRenderer for GatedRenderer {
    fn render(&self, document: &InvoiceDocument, target: &Path) -> Result<(), RenderError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        self.inner.render(document, target)
    }
}

#[test]
fn deleted_pdf_is_rendered_again_from_the_snapshot() {
    let h = Harness::new();
    let alice = h.employee("Alice", 40);
    h.ingest("2025-01", &[("Alice", 10.0)]);
    let invoice = h
        .engine
        .generate_invoices(&month("2025-01"), &[alice.id])
        .unwrap()
        .remove(0);
    let original = invoice.artifact_path().unwrap().to_path_buf();

    h.engine
        .update_employee(alice.id, EmployeeDraft::new("Alice", dollars(90)))
        .unwrap();
    std::fs::remove_file(&original).unwrap();

    let path = h.engine.invoice_pdf(invoice.id()).unwrap();

    assert!(path.is_file());
    assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    let stored = h.engine.get_invoice(invoice.id()).unwrap();
    assert_eq!(stored.invoice_number(), invoice.invoice_number());
    assert_eq!(stored.amount(), dollars(400));
    assert_eq!(stored.artifact_path(), Some(path.as_path()));
}

#[test]
fn existing_pdf_is_returned_as_is() {
    let h = Harness::new();
    let alice = h.employee("Alice", 40);
    h.ingest("2025-01", &[("Alice", 10.0)]);
    let invoice = h
        .engine
        .generate_invoices(&month("2025-01"), &[alice.id])
        .unwrap()
        .remove(0);

    let path = h.engine.invoice_pdf(invoice.id()).unwrap();
    assert_eq!(Some(path.as_path()), invoice.artifact_path());
}

#[test]
fn unknown_invoice_pdf_is_not_found() {
    let h = Harness::new();
    let err = h
        .engine
        .invoice_pdf(hourbill_core::InvoiceId::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[test]
fn sweep_repairs_only_missing_artifacts() {
    let h = Harness::new();
    let alice = h.employee("Alice", 40);
    let bob = h.employee("Bob", 50);
    h.ingest("2025-01", &[("Alice", 10.0), ("Bob", 2.0)]);
    let invoices = h
        .engine
        .generate_invoices(&month("2025-01"), &[alice.id, bob.id])
        .unwrap();
    std::fs::remove_file(invoices[1].artifact_path().unwrap()).unwrap();

    let report = h.engine.regenerate_missing().unwrap();

    assert_eq!(
        report,
        RegenerationReport {
            regenerated: 1,
            missing_before: 1,
            total: 2,
        }
    );
    assert_eq!(h.pdf_count(), 2);
    assert_eq!(h.engine.regenerate_missing().unwrap().missing_before, 0);
}

#[test]
fn generation_repairs_missing_artifact_of_existing_invoice() {
    let h = Harness::new();
    let alice = h.employee("Alice", 40);
    h.ingest("2025-01", &[("Alice", 10.0)]);
    let first = h
        .engine
        .generate_invoices(&month("2025-01"), &[alice.id])
        .unwrap()
        .remove(0);
    std::fs::remove_file(first.artifact_path().unwrap()).unwrap();

    let again = h
        .engine
        .generate_invoices(&month("2025-01"), &[alice.id])
        .unwrap()
        .remove(0);

    assert_eq!(again.invoice_number(), first.invoice_number());
    assert!(again.artifact_path().unwrap().is_file());
}

#[test]
fn pdf_repair_overlapping_a_send_keeps_the_invoice_sent() {
    let h = Harness::new();
    let alice = h.employee("Alice", 40);
    h.ingest("2025-01", &[("Alice", 10.0)]);
    let invoice = h
        .engine
        .generate_invoices(&month("2025-01"), &[alice.id])
        .unwrap()
        .remove(0);
    h.engine.approve(&[invoice.id()]).unwrap();
    std::fs::remove_file(invoice.artifact_path().unwrap()).unwrap();

    let renderer = Arc::new(GatedRenderer::new());
    let repairing = h.engine_with(renderer.clone());
    renderer.arm();
    let request = SendRequest::new(vec![invoice.id()]).to(vec!["ap@globex.test".into()]);

    let (first_send, repaired) = std::thread::scope(|scope| {
        let repair = scope.spawn(|| repairing.invoice_pdf(invoice.id()));
        // The repair has read the approved, unsent invoice and is now rendering.
        renderer.entered.wait();
        let sent = h.engine.send(&request);
        renderer.release.wait();
        (sent, repair.join().unwrap())
    });

    assert_eq!(first_send.unwrap().sent_count, 1);
    assert!(repaired.unwrap().is_file());
    assert_eq!(
        h.engine.get_invoice(invoice.id()).unwrap().state(),
        DeliveryState::Sent
    );

    let again = h.engine.send(&request).unwrap();
    assert_eq!(again.sent_count, 0);
    assert_eq!(h.mailer.sent().len(), 1);
}
