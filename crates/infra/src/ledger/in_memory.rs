//! In-memory ledger store for tests/dev.
//!
//! All tables live behind one `RwLock`, so every trait call is a single
//! critical section and multi-row writes are trivially all-or-nothing.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use hourbill_core::{EmployeeId, InvoiceId, MonthKey, VendorId};
use hourbill_invoicing::{
    CompanyPayment, Employee, EmployeeMonth, Invoice, SentInvoiceRow, Vendor,
};

use super::r#trait::{Constraint, LedgerError, LedgerResult, LedgerStore};

#[derive(Debug, Default)]
struct LedgerState {
    employees: HashMap<EmployeeId, Employee>,
    vendors: HashMap<VendorId, Vendor>,
    months: HashMap<(EmployeeId, MonthKey), EmployeeMonth>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<(String, MonthKey), CompanyPayment>,
}

impl LedgerState {
    fn employee_name_taken(&self, name: &str, except: Option<EmployeeId>) -> bool {
        self.employees
            .values()
            .any(|e| e.name == name && Some(e.id) != except)
    }

    fn invoice_for(&self, employee_id: EmployeeId, month_key: &MonthKey) -> Option<&Invoice> {
        self.invoices
            .values()
            .find(|i| i.employee_id() == employee_id && i.month_key() == month_key)
    }

    /// Apply `change` to copies of the listed invoices and commit only if every
    /// one of them exists and accepts it.
    fn update_invoices<F>(&mut self, ids: &[InvoiceId], mut change: F) -> LedgerResult<Vec<Invoice>>
    where
        F: FnMut(&mut Invoice) -> LedgerResult<()>,
    {
        let mut staged: Vec<Invoice> = Vec::with_capacity(ids.len());
        for id in ids {
            if staged.iter().any(|i| i.id() == *id) {
                continue;
            }
            let mut invoice = self
                .invoices
                .get(id)
                .cloned()
                .ok_or_else(|| LedgerError::not_found("invoice", id))?;
            change(&mut invoice)?;
            staged.push(invoice);
        }
        for invoice in &staged {
            self.invoices.insert(invoice.id(), invoice.clone());
        }
        Ok(staged)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn insert_employee(&self, employee: Employee) -> LedgerResult<Employee> {
        let mut state = self.write()?;
        if state.employee_name_taken(&employee.name, None) {
            return Err(LedgerError::unique(
                Constraint::EmployeeName,
                format!("employee '{}' already exists", employee.name),
            ));
        }
        state.employees.insert(employee.id, employee.clone());
        Ok(employee)
    }

    fn update_employee(&self, employee: &Employee) -> LedgerResult<()> {
        let mut state = self.write()?;
        if state.employee_name_taken(&employee.name, Some(employee.id)) {
            return Err(LedgerError::unique(
                Constraint::EmployeeName,
                format!("employee '{}' already exists", employee.name),
            ));
        }
        let stored = state
            .employees
            .get_mut(&employee.id)
            .ok_or_else(|| LedgerError::not_found("employee", employee.id))?;
        *stored = Employee {
            lifetime_hours: stored.lifetime_hours,
            ..employee.clone()
        };
        Ok(())
    }

    fn delete_employee(&self, id: EmployeeId) -> LedgerResult<Option<Vec<Invoice>>> {
        let mut state = self.write()?;
        if state.employees.remove(&id).is_none() {
            return Ok(None);
        }
        state.months.retain(|(employee_id, _), _| *employee_id != id);

        let doomed: Vec<InvoiceId> = state
            .invoices
            .values()
            .filter(|i| i.employee_id() == id)
            .map(|i| i.id())
            .collect();
        let removed: Vec<Invoice> = doomed
            .into_iter()
            .filter_map(|invoice_id| state.invoices.remove(&invoice_id))
            .collect();
        Ok(Some(removed))
    }

    fn get_employee(&self, id: EmployeeId) -> LedgerResult<Option<Employee>> {
        Ok(self.read()?.employees.get(&id).cloned())
    }

    fn find_employee_by_name(&self, name: &str) -> LedgerResult<Option<Employee>> {
        let name = name.trim();
        Ok(self
            .read()?
            .employees
            .values()
            .find(|e| e.name == name)
            .cloned())
    }

    fn list_employees(&self) -> LedgerResult<Vec<Employee>> {
        let mut employees: Vec<Employee> = self.read()?.employees.values().cloned().collect();
        employees.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(employees)
    }

    fn insert_vendor(&self, vendor: Vendor) -> LedgerResult<Vendor> {
        let mut state = self.write()?;
        if state.vendors.values().any(|v| v.name == vendor.name) {
            return Err(LedgerError::unique(
                Constraint::VendorName,
                format!("vendor '{}' already exists", vendor.name),
            ));
        }
        state.vendors.insert(vendor.id, vendor.clone());
        Ok(vendor)
    }

    fn get_vendor(&self, id: VendorId) -> LedgerResult<Option<Vendor>> {
        Ok(self.read()?.vendors.get(&id).cloned())
    }

    fn list_vendors(&self) -> LedgerResult<Vec<Vendor>> {
        let mut vendors: Vec<Vendor> = self.read()?.vendors.values().cloned().collect();
        vendors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(vendors)
    }

    fn delete_vendor(&self, id: VendorId) -> LedgerResult<bool> {
        let mut state = self.write()?;
        if state.vendors.remove(&id).is_none() {
            return Ok(false);
        }
        for employee in state.employees.values_mut() {
            if employee.preferred_vendor_id == Some(id) {
                employee.preferred_vendor_id = None;
            }
        }
        Ok(true)
    }

    fn get_employee_month(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<EmployeeMonth>> {
        Ok(self
            .read()?
            .months
            .get(&(employee_id, month_key.clone()))
            .cloned())
    }

    fn accumulate_hours(
        &self,
        month_key: &MonthKey,
        entries: &[(EmployeeId, f64)],
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<EmployeeMonth>> {
        let mut state = self.write()?;

        // Stage on copies; commit only once every entry has been applied.
        let mut employees: HashMap<EmployeeId, Employee> = HashMap::new();
        let mut months: HashMap<EmployeeId, EmployeeMonth> = HashMap::new();
        let mut snapshots = Vec::with_capacity(entries.len());

        for (employee_id, hours) in entries {
            let employee = match employees.entry(*employee_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let stored = state
                        .employees
                        .get(employee_id)
                        .cloned()
                        .ok_or_else(|| LedgerError::not_found("employee", employee_id))?;
                    slot.insert(stored)
                }
            };
            employee.add_lifetime_hours(*hours)?;

            let month = months.entry(*employee_id).or_insert_with(|| {
                state
                    .months
                    .get(&(*employee_id, month_key.clone()))
                    .cloned()
                    .unwrap_or_else(|| EmployeeMonth::start(*employee_id, month_key.clone(), at))
            });
            month.accumulate(*hours, at)?;
            snapshots.push(month.clone());
        }

        for (id, employee) in employees {
            state.employees.insert(id, employee);
        }
        for (id, month) in months {
            state.months.insert((id, month_key.clone()), month);
        }
        Ok(snapshots)
    }

    fn insert_invoice(&self, invoice: Invoice) -> LedgerResult<Invoice> {
        let mut state = self.write()?;
        if !state.employees.contains_key(&invoice.employee_id()) {
            return Err(LedgerError::not_found("employee", invoice.employee_id()));
        }
        if let Some(existing) = state.invoice_for(invoice.employee_id(), invoice.month_key()) {
            return Err(LedgerError::unique(
                Constraint::InvoiceEmployeeMonth,
                format!(
                    "invoice {} already covers {}",
                    existing.invoice_number(),
                    invoice.month_key()
                ),
            ));
        }
        if state
            .invoices
            .values()
            .any(|i| i.invoice_number() == invoice.invoice_number())
        {
            return Err(LedgerError::unique(
                Constraint::InvoiceNumber,
                format!("invoice number {} already issued", invoice.invoice_number()),
            ));
        }
        state.invoices.insert(invoice.id(), invoice.clone());
        Ok(invoice)
    }

    fn get_invoice(&self, id: InvoiceId) -> LedgerResult<Option<Invoice>> {
        Ok(self.read()?.invoices.get(&id).cloned())
    }

    fn find_invoice(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<Invoice>> {
        Ok(self.read()?.invoice_for(employee_id, month_key).cloned())
    }

    fn list_invoices(&self) -> LedgerResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self.read()?.invoices.values().cloned().collect();
        invoices.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(invoices)
    }

    fn attach_artifact(&self, id: InvoiceId, path: &Path) -> LedgerResult<Invoice> {
        let mut state = self.write()?;
        let invoice = state
            .invoices
            .get_mut(&id)
            .ok_or_else(|| LedgerError::not_found("invoice", id))?;
        invoice.attach_artifact(path.to_path_buf());
        Ok(invoice.clone())
    }

    fn approve_invoices(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        self.write()?.update_invoices(ids, |invoice| {
            invoice.approve();
            Ok(())
        })
    }

    fn mark_invoices_sent(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        self.write()?.update_invoices(ids, |invoice| {
            invoice.mark_sent()?;
            Ok(())
        })
    }

    fn sent_invoice_rows(&self) -> LedgerResult<Vec<SentInvoiceRow>> {
        let state = self.read()?;
        Ok(state
            .invoices
            .values()
            .filter(|i| i.is_sent())
            .map(|i| SentInvoiceRow {
                invoice_id: i.id(),
                month_key: i.month_key().clone(),
                company: state
                    .employees
                    .get(&i.employee_id())
                    .and_then(|e| e.company.clone()),
                amount: i.amount(),
            })
            .collect())
    }

    fn upsert_company_payment(&self, payment: CompanyPayment) -> LedgerResult<CompanyPayment> {
        let mut state = self.write()?;
        state.payments.insert(
            (payment.company.clone(), payment.month_key.clone()),
            payment.clone(),
        );
        Ok(payment)
    }

    fn company_payments(&self, month_key: &MonthKey) -> LedgerResult<Vec<CompanyPayment>> {
        let mut payments: Vec<CompanyPayment> = self
            .read()?
            .payments
            .values()
            .filter(|p| &p.month_key == month_key)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.company.cmp(&b.company));
        Ok(payments)
    }
}
