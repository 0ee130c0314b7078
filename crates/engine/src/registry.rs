//! Employee and vendor registration.

use chrono::Utc;
use tracing::{info, instrument, warn};

use hourbill_core::{EmployeeId, MonthKey, VendorId};
use hourbill_infra::documents::DocumentRenderer;
use hourbill_infra::ledger::LedgerStore;
use hourbill_infra::mail::MailDispatcher;
use hourbill_invoicing::{Employee, EmployeeDraft, Vendor, VendorDraft};

use crate::{EngineError, EngineResult, InvoiceEngine};

impl<S, R, M> InvoiceEngine<S, R, M>
where
    S: LedgerStore,
    R: DocumentRenderer,
    M: MailDispatcher,
{
    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    pub fn register_employee(&self, draft: EmployeeDraft) -> EngineResult<Employee> {
        self.ensure_vendor(draft.preferred_vendor_id)?;
        let employee = Employee::register(EmployeeId::new(), draft, Utc::now())?;
        let employee = self.store.insert_employee(employee)?;
        info!(employee_id = %employee.id, "employee registered");
        Ok(employee)
    }

    /// Replace an employee's editable fields. Existing invoices keep the rate
    /// they were generated with.
    #[instrument(skip(self, draft), fields(employee_id = %id), err)]
    pub fn update_employee(&self, id: EmployeeId, draft: EmployeeDraft) -> EngineResult<Employee> {
        let mut employee = self.get_employee(id)?;
        self.ensure_vendor(draft.preferred_vendor_id)?;
        employee.apply_update(draft)?;
        self.store.update_employee(&employee)?;
        self.get_employee(id)
    }

    /// Delete an employee together with its month totals and invoices.
    ///
    /// Artifact files of the removed invoices are deleted best-effort.
    #[instrument(skip(self), fields(employee_id = %id), err)]
    pub fn delete_employee(&self, id: EmployeeId) -> EngineResult<()> {
        let removed = self
            .store
            .delete_employee(id)?
            .ok_or_else(|| EngineError::not_found(format!("employee {id}")))?;

        for invoice in &removed {
            if let Some(path) = invoice.artifact_path() {
                match std::fs::remove_file(path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = %path.display(), error = %e, "artifact not removed"),
                }
            }
        }
        info!(invoices_removed = removed.len(), "employee deleted");
        Ok(())
    }

    pub fn get_employee(&self, id: EmployeeId) -> EngineResult<Employee> {
        self.store
            .get_employee(id)?
            .ok_or_else(|| EngineError::not_found(format!("employee {id}")))
    }

    /// All employees ordered by name.
    pub fn list_employees(&self) -> EngineResult<Vec<Employee>> {
        Ok(self.store.list_employees()?)
    }

    /// Hours accumulated for `month_key`; 0 when nothing was ingested.
    pub fn monthly_hours(&self, id: EmployeeId, month_key: &MonthKey) -> EngineResult<f64> {
        self.get_employee(id)?;
        Ok(self
            .store
            .get_employee_month(id, month_key)?
            .map(|m| m.hours)
            .unwrap_or(0.0))
    }

    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    pub fn register_vendor(&self, draft: VendorDraft) -> EngineResult<Vendor> {
        let vendor = Vendor::register(VendorId::new(), draft, Utc::now())?;
        let vendor = self.store.insert_vendor(vendor)?;
        info!(vendor_id = %vendor.id, "vendor registered");
        Ok(vendor)
    }

    pub fn get_vendor(&self, id: VendorId) -> EngineResult<Vendor> {
        self.store
            .get_vendor(id)?
            .ok_or_else(|| EngineError::not_found(format!("vendor {id}")))
    }

    pub fn list_vendors(&self) -> EngineResult<Vec<Vendor>> {
        Ok(self.store.list_vendors()?)
    }

    /// Delete a vendor; employees that preferred it fall back to no vendor.
    #[instrument(skip(self), fields(vendor_id = %id), err)]
    pub fn delete_vendor(&self, id: VendorId) -> EngineResult<()> {
        if !self.store.delete_vendor(id)? {
            return Err(EngineError::not_found(format!("vendor {id}")));
        }
        Ok(())
    }

    fn ensure_vendor(&self, vendor_id: Option<VendorId>) -> EngineResult<()> {
        if let Some(id) = vendor_id {
            self.get_vendor(id)?;
        }
        Ok(())
    }
}
