#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use hourbill_core::{EmployeeId, InvoiceId, Money, MonthKey, VendorId};
use hourbill_engine::{EngineSettings, InvoiceEngine, TimesheetReceipt};
use hourbill_infra::documents::{DocumentRenderer, PdfRenderer};
use hourbill_infra::ledger::{Constraint, InMemoryLedgerStore, LedgerError, LedgerResult, LedgerStore};
use hourbill_infra::mail::RecordingMailer;
use hourbill_invoicing::{
    CompanyPayment, Employee, EmployeeDraft, EmployeeMonth, Invoice, SentInvoiceRow, TimesheetBatch,
    TimesheetRow, Vendor, VendorDraft,
};

pub type TestEngine = InvoiceEngine<Arc<InMemoryLedgerStore>, PdfRenderer, Arc<RecordingMailer>>;

/// Engine wired to an in-memory ledger, the real PDF renderer writing into a
/// temp dir, and a mailer that records instead of sending.
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<InMemoryLedgerStore>,
    pub mailer: Arc<RecordingMailer>,
    pub engine: TestEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    pub fn with_settings(configure: impl FnOnce(&mut EngineSettings)) -> Self {
        hourbill_observability::init_test();
        let dir = tempfile::tempdir().unwrap();
        let mut settings = EngineSettings::new(dir.path().join("invoices"));
        configure(&mut settings);

        let store = InMemoryLedgerStore::arc();
        let mailer = Arc::new(RecordingMailer::new());
        let engine = InvoiceEngine::new(
            store.clone(),
            PdfRenderer::default(),
            mailer.clone(),
            settings,
        );
        Self {
            dir,
            store,
            mailer,
            engine,
        }
    }

    /// Second engine over the same ledger, mailer and settings.
    pub fn engine_with<R: DocumentRenderer>(
        &self,
        renderer: R,
    ) -> InvoiceEngine<Arc<InMemoryLedgerStore>, R, Arc<RecordingMailer>> {
        InvoiceEngine::new(
            self.store.clone(),
            renderer,
            self.mailer.clone(),
            self.engine.settings().clone(),
        )
    }

    pub fn employee(&self, name: &str, rate: u64) -> Employee {
        self.engine
            .register_employee(EmployeeDraft::new(name, dollars(rate)))
            .unwrap()
    }

    pub fn employee_billed_to(&self, name: &str, rate: u64, vendor: VendorId) -> Employee {
        self.engine
            .register_employee(
                EmployeeDraft::new(name, dollars(rate))
                    .with_company(format!("{name} Co"))
                    .with_preferred_vendor(vendor),
            )
            .unwrap()
    }

    pub fn vendor(&self, name: &str, emails: &str) -> Vendor {
        self.engine
            .register_vendor(VendorDraft::new(name, emails))
            .unwrap()
    }

    pub fn ingest(&self, month_key: &str, rows: &[(&str, f64)]) -> TimesheetReceipt {
        self.engine.ingest_timesheet(&batch(month_key, rows)).unwrap()
    }

    /// Number of PDF files currently in the artifact directory.
    pub fn pdf_count(&self) -> usize {
        pdf_count_in(&self.engine.settings().invoice_dir)
    }
}

pub fn pdf_count_in(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "pdf"))
            .count(),
        Err(_) => 0,
    }
}

pub fn month(raw: &str) -> MonthKey {
    MonthKey::parse(raw).unwrap()
}

pub fn dollars(amount: u64) -> Money {
    Money::from_major(amount).unwrap()
}

pub fn batch(month_key: &str, rows: &[(&str, f64)]) -> TimesheetBatch {
    TimesheetBatch::new(
        month(month_key),
        rows.iter()
            .map(|(name, hours)| TimesheetRow::new(*name, *hours))
            .collect(),
    )
}

/// In-memory ledger with scripted write faults.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    pub inner: InMemoryLedgerStore,
    /// Invoice inserts still to be rejected as invoice-number collisions.
    pub number_collisions: AtomicUsize,
    pub invoice_inserts: AtomicUsize,
    pub fail_mark_sent: AtomicBool,
}

impl LedgerStore for ScriptedStore {
    fn insert_employee(&self, employee: Employee) -> LedgerResult<Employee> {
        self.inner.insert_employee(employee)
    }

    fn update_employee(&self, employee: &Employee) -> LedgerResult<()> {
        self.inner.update_employee(employee)
    }

    fn delete_employee(&self, id: EmployeeId) -> LedgerResult<Option<Vec<Invoice>>> {
        self.inner.delete_employee(id)
    }

    fn get_employee(&self, id: EmployeeId) -> LedgerResult<Option<Employee>> {
        self.inner.get_employee(id)
    }

    fn find_employee_by_name(&self, name: &str) -> LedgerResult<Option<Employee>> {
        self.inner.find_employee_by_name(name)
    }

    fn list_employees(&self) -> LedgerResult<Vec<Employee>> {
        self.inner.list_employees()
    }

    fn insert_vendor(&self, vendor: Vendor) -> LedgerResult<Vendor> {
        self.inner.insert_vendor(vendor)
    }

    fn get_vendor(&self, id: VendorId) -> LedgerResult<Option<Vendor>> {
        self.inner.get_vendor(id)
    }

    fn list_vendors(&self) -> LedgerResult<Vec<Vendor>> {
        self.inner.list_vendors()
    }

    fn delete_vendor(&self, id: VendorId) -> LedgerResult<bool> {
        self.inner.delete_vendor(id)
    }

    fn get_employee_month(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<EmployeeMonth>> {
        self.inner.get_employee_month(employee_id, month_key)
    }

    fn accumulate_hours(
        &self,
        month_key: &MonthKey,
        entries: &[(EmployeeId, f64)],
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<EmployeeMonth>> {
        self.inner.accumulate_hours(month_key, entries, at)
    }

    fn insert_invoice(&self, invoice: Invoice) -> LedgerResult<Invoice> {
        self.invoice_inserts.fetch_add(1, Ordering::SeqCst);
        let collide = self
            .number_collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collide {
            return Err(LedgerError::unique(
                Constraint::InvoiceNumber,
                format!("invoice number {} already issued", invoice.invoice_number()),
            ));
        }
        self.inner.insert_invoice(invoice)
    }

    fn get_invoice(&self, id: InvoiceId) -> LedgerResult<Option<Invoice>> {
        self.inner.get_invoice(id)
    }

    fn find_invoice(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<Invoice>> {
        self.inner.find_invoice(employee_id, month_key)
    }

    fn list_invoices(&self) -> LedgerResult<Vec<Invoice>> {
        self.inner.list_invoices()
    }

    fn attach_artifact(&self, id: InvoiceId, path: &Path) -> LedgerResult<Invoice> {
        self.inner.attach_artifact(id, path)
    }

    fn approve_invoices(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        self.inner.approve_invoices(ids)
    }

    fn mark_invoices_sent(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        if self.fail_mark_sent.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage("disk full".to_string()));
        }
        self.inner.mark_invoices_sent(ids)
    }

    fn sent_invoice_rows(&self) -> LedgerResult<Vec<SentInvoiceRow>> {
        self.inner.sent_invoice_rows()
    }

    fn upsert_company_payment(&self, payment: CompanyPayment) -> LedgerResult<CompanyPayment> {
        self.inner.upsert_company_payment(payment)
    }

    fn company_payments(&self, month_key: &MonthKey) -> LedgerResult<Vec<CompanyPayment>> {
        self.inner.company_payments(month_key)
    }
}

pub type ScriptedEngine = InvoiceEngine<Arc<ScriptedStore>, PdfRenderer, Arc<RecordingMailer>>;

/// Engine over a [`ScriptedStore`], rendering into `dir`.
pub fn scripted_engine(dir: &TempDir) -> (Arc<ScriptedStore>, Arc<RecordingMailer>, ScriptedEngine) {
    hourbill_observability::init_test();
    let store = Arc::new(ScriptedStore::default());
    let mailer = Arc::new(RecordingMailer::new());
    let engine = InvoiceEngine::new(
        store.clone(),
        PdfRenderer::default(),
        mailer.clone(),
        EngineSettings::new(dir.path().join("invoices")),
    );
    (store, mailer, engine)
}
