mod common;

use common::{Harness, dollars, month};
use hourbill_engine::{EngineError, SendRequest};
use hourbill_invoicing::{EmployeeDraft, UNASSIGNED_COMPANY};

/// Alice and Bob at Globex, Carol unassigned; all sent for `month_key`.
fn sent_month(h: &Harness, month_key: &str, hours: f64) {
    let ids: Vec<_> = ["Alice", "Bob", "Carol"]
        .iter()
        .map(|name| {
            h.engine
                .list_employees()
                .unwrap()
                .into_iter()
                .find(|e| e.name == *name)
                .unwrap()
                .id
        })
        .collect();
    h.ingest(
        month_key,
        &[("Alice", hours), ("Bob", hours), ("Carol", hours)],
    );
    let invoice_ids: Vec<_> = h
        .engine
        .generate_invoices(&month(month_key), &ids)
        .unwrap()
        .iter()
        .map(|i| i.id())
        .collect();
    h.engine.approve(&invoice_ids).unwrap();
    h.engine
        .send(&SendRequest::new(invoice_ids).to(vec!["ap@globex.test".into()]))
        .unwrap();
}

fn staffed() -> Harness {
    let h = Harness::new();
    for name in ["Alice", "Bob"] {
        h.engine
            .register_employee(EmployeeDraft::new(name, dollars(10)).with_company("Globex"))
            .unwrap();
    }
    h.employee("Carol", 10);
    h
}

#[test]
fn nothing_sent_means_no_totals() {
    let h = staffed();
    h.ingest("2025-01", &[("Alice", 10.0)]);

    let totals = h.engine.company_totals(None).unwrap();
    assert!(totals.month_key.is_none());
    assert!(totals.totals.is_empty());
    assert!(h.engine.earnings_series().unwrap().is_empty());
}

#[test]
fn totals_default_to_latest_sent_month() {
    let h = staffed();
    sent_month(&h, "2025-01", 1.0);
    sent_month(&h, "2025-02", 2.0);

    let totals = h.engine.company_totals(None).unwrap();

    assert_eq!(totals.month_key, Some(month("2025-02")));
    assert_eq!(totals.totals.len(), 2);
    assert_eq!(totals.totals[0].company, "Globex");
    assert_eq!(totals.totals[0].total_amount, dollars(40));
    assert_eq!(totals.totals[0].invoice_count, 2);
    assert_eq!(totals.totals[1].company, UNASSIGNED_COMPANY);
    assert_eq!(totals.totals[1].total_amount, dollars(20));
    assert!(totals.totals.iter().all(|t| !t.paid));

    let january = h.engine.company_totals(Some(&month("2025-01"))).unwrap();
    assert_eq!(january.totals[0].total_amount, dollars(20));
}

#[test]
fn unsent_invoices_are_ignored() {
    let h = staffed();
    sent_month(&h, "2025-01", 1.0);
    let alice = h.engine.list_employees().unwrap().remove(0);
    h.ingest("2025-03", &[("Alice", 8.0)]);
    h.engine.generate_invoices(&month("2025-03"), &[alice.id]).unwrap();

    let totals = h.engine.company_totals(None).unwrap();
    assert_eq!(totals.month_key, Some(month("2025-01")));
}

#[test]
fn paid_marker_is_reflected_and_reversible() {
    let h = staffed();
    sent_month(&h, "2025-01", 1.0);

    let marker = h.engine.mark_paid("  Globex ", &month("2025-01"), true).unwrap();
    assert_eq!(marker.company, "Globex");
    assert!(marker.paid_at.is_some());
    h.engine.mark_paid("Globex", &month("2025-01"), true).unwrap();

    let totals = h.engine.company_totals(None).unwrap();
    assert!(totals.totals.iter().any(|t| t.company == "Globex" && t.paid));
    assert!(totals.totals.iter().any(|t| t.company == UNASSIGNED_COMPANY && !t.paid));

    let cleared = h.engine.mark_paid("Globex", &month("2025-01"), false).unwrap();
    assert!(cleared.paid_at.is_none());
    assert!(h.engine.company_totals(None).unwrap().totals.iter().all(|t| !t.paid));
}

#[test]
fn blank_company_label_is_rejected() {
    let h = Harness::new();
    let err = h.engine.mark_paid("   ", &month("2025-01"), true).unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn earnings_are_chronological() {
    let h = staffed();
    sent_month(&h, "2025-02", 2.0);
    sent_month(&h, "2024-12", 1.0);

    let series = h.engine.earnings_series().unwrap();

    let months: Vec<_> = series.iter().map(|e| e.month_key.as_str().to_string()).collect();
    assert_eq!(months, vec!["2024-12", "2025-02"]);
    assert_eq!(series[0].total_amount, dollars(30));
    assert_eq!(series[1].total_amount, dollars(60));
}
