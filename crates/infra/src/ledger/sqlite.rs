//! SQLite-backed ledger store.
//!
//! One connection behind a `Mutex`; multi-row writes run in an `IMMEDIATE`
//! transaction. Uniqueness lives in the schema, and `UNIQUE` failures are
//! mapped back to [`Constraint`] so callers see the same errors as with the
//! in-memory store.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params};

use hourbill_core::{EmployeeId, InvoiceId, Money, MonthKey, VendorId};
use hourbill_invoicing::{
    CompanyPayment, Employee, EmployeeMonth, Invoice, InvoiceNumber, InvoiceRecord, SentInvoiceRow,
    Vendor,
};

use super::r#trait::{Constraint, LedgerError, LedgerResult, LedgerStore};

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS vendors (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        emails TEXT NOT NULL,
        created_at TEXT NOT NULL,
        CONSTRAINT uq_vendor_name UNIQUE (name)
    );",
    "CREATE TABLE IF NOT EXISTS employees (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        hourly_rate INTEGER NOT NULL,
        email TEXT,
        company TEXT,
        start_date TEXT,
        preferred_vendor_id TEXT REFERENCES vendors(id) ON DELETE SET NULL,
        lifetime_hours REAL NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        CONSTRAINT uq_employee_name UNIQUE (name)
    );",
    "CREATE TABLE IF NOT EXISTS employee_months (
        employee_id TEXT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        month_key TEXT NOT NULL,
        hours REAL NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL,
        CONSTRAINT uq_employee_month UNIQUE (employee_id, month_key)
    );",
    "CREATE TABLE IF NOT EXISTS invoices (
        id TEXT PRIMARY KEY,
        employee_id TEXT NOT NULL REFERENCES employees(id) ON DELETE CASCADE,
        month_key TEXT NOT NULL,
        hours REAL NOT NULL,
        rate INTEGER NOT NULL,
        amount INTEGER NOT NULL,
        invoice_number TEXT NOT NULL,
        artifact_path TEXT,
        approved INTEGER NOT NULL DEFAULT 0,
        sent INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        CONSTRAINT uq_invoice_employee_month UNIQUE (employee_id, month_key),
        CONSTRAINT uq_invoice_number UNIQUE (invoice_number)
    );",
    "CREATE TABLE IF NOT EXISTS company_payments (
        company TEXT NOT NULL,
        month_key TEXT NOT NULL,
        paid INTEGER NOT NULL DEFAULT 0,
        paid_at TEXT,
        PRIMARY KEY (company, month_key)
    );",
    "CREATE INDEX IF NOT EXISTS idx_invoices_sent ON invoices(sent);",
];

const EMPLOYEE_COLUMNS: &str = "id, name, hourly_rate, email, company, start_date, \
     preferred_vendor_id, lifetime_hours, created_at";
const VENDOR_COLUMNS: &str = "id, name, emails, created_at";
const MONTH_COLUMNS: &str = "employee_id, month_key, hours, updated_at";
const INVOICE_COLUMNS: &str = "id, employee_id, month_key, hours, rate, amount, invoice_number, \
     artifact_path, approved, sent, created_at";

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
            if failure.code == ErrorCode::ConstraintViolation {
                if let Some(constraint) = constraint_for(message) {
                    return LedgerError::unique(constraint, message.clone());
                }
            }
        }
        LedgerError::Storage(err.to_string())
    }
}

/// Map SQLite's `UNIQUE constraint failed: <table>.<columns>` message.
fn constraint_for(message: &str) -> Option<Constraint> {
    let columns = message.strip_prefix("UNIQUE constraint failed: ")?;
    match columns {
        "employees.name" => Some(Constraint::EmployeeName),
        "vendors.name" => Some(Constraint::VendorName),
        "employee_months.employee_id, employee_months.month_key" => {
            Some(Constraint::EmployeeMonth)
        }
        "invoices.employee_id, invoices.month_key" => Some(Constraint::InvoiceEmployeeMonth),
        "invoices.invoice_number" => Some(Constraint::InvoiceNumber),
        _ => None,
    }
}

#[derive(Debug)]
pub struct SqliteLedgerStore {
    conn: Mutex<Connection>,
}

impl SqliteLedgerStore {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Storage(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        tracing::debug!(path = %path.display(), "ledger database opened");
        Self::init(conn)
    }

    /// Private database that disappears with the store.
    pub fn open_in_memory() -> LedgerResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> LedgerResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt)?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Storage("ledger connection lock poisoned".to_string()))
    }
}

impl LedgerStore for SqliteLedgerStore {
    fn insert_employee(&self, employee: Employee) -> LedgerResult<Employee> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO employees ({EMPLOYEE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                employee.id.to_string(),
                employee.name,
                cents(employee.hourly_rate)?,
                employee.email,
                employee.company,
                employee.start_date,
                employee.preferred_vendor_id.map(|v| v.to_string()),
                employee.lifetime_hours,
                employee.created_at,
            ],
        )?;
        Ok(employee)
    }

    fn update_employee(&self, employee: &Employee) -> LedgerResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE employees SET name = ?2, hourly_rate = ?3, email = ?4, company = ?5, \
             start_date = ?6, preferred_vendor_id = ?7 WHERE id = ?1",
            params![
                employee.id.to_string(),
                employee.name,
                cents(employee.hourly_rate)?,
                employee.email,
                employee.company,
                employee.start_date,
                employee.preferred_vendor_id.map(|v| v.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("employee", employee.id));
        }
        Ok(())
    }

    fn delete_employee(&self, id: EmployeeId) -> LedgerResult<Option<Vec<Invoice>>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if select_employee(&tx, id)?.is_none() {
            return Ok(None);
        }
        let removed = select_invoices(
            &tx,
            "WHERE employee_id = ?1 ORDER BY created_at DESC, id DESC",
            [id.to_string()],
        )?;
        let key = id.to_string();
        tx.execute("DELETE FROM invoices WHERE employee_id = ?1", [&key])?;
        tx.execute("DELETE FROM employee_months WHERE employee_id = ?1", [&key])?;
        tx.execute("DELETE FROM employees WHERE id = ?1", [&key])?;
        tx.commit()?;
        Ok(Some(removed))
    }

    fn get_employee(&self, id: EmployeeId) -> LedgerResult<Option<Employee>> {
        Ok(select_employee(&*self.conn()?, id)?)
    }

    fn find_employee_by_name(&self, name: &str) -> LedgerResult<Option<Employee>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE name = ?1"),
                [name.trim()],
                employee_from_row,
            )
            .optional()?)
    }

    fn list_employees(&self) -> LedgerResult<Vec<Employee>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY name"))?;
        let rows = stmt.query_map([], employee_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn insert_vendor(&self, vendor: Vendor) -> LedgerResult<Vendor> {
        let conn = self.conn()?;
        conn.execute(
            &format!("INSERT INTO vendors ({VENDOR_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
            params![
                vendor.id.to_string(),
                vendor.name,
                vendor.joined_emails(),
                vendor.created_at,
            ],
        )?;
        Ok(vendor)
    }

    fn get_vendor(&self, id: VendorId) -> LedgerResult<Option<Vendor>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!("SELECT {VENDOR_COLUMNS} FROM vendors WHERE id = ?1"),
                [id.to_string()],
                vendor_from_row,
            )
            .optional()?)
    }

    fn list_vendors(&self) -> LedgerResult<Vec<Vendor>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {VENDOR_COLUMNS} FROM vendors ORDER BY name"))?;
        let rows = stmt.query_map([], vendor_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete_vendor(&self, id: VendorId) -> LedgerResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let key = id.to_string();
        tx.execute(
            "UPDATE employees SET preferred_vendor_id = NULL WHERE preferred_vendor_id = ?1",
            [&key],
        )?;
        let removed = tx.execute("DELETE FROM vendors WHERE id = ?1", [&key])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn get_employee_month(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<EmployeeMonth>> {
        Ok(select_month(&*self.conn()?, employee_id, month_key)?)
    }

    fn accumulate_hours(
        &self,
        month_key: &MonthKey,
        entries: &[(EmployeeId, f64)],
        at: DateTime<Utc>,
    ) -> LedgerResult<Vec<EmployeeMonth>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut employees: HashMap<EmployeeId, Employee> = HashMap::new();
        let mut months: HashMap<EmployeeId, EmployeeMonth> = HashMap::new();
        let mut snapshots = Vec::with_capacity(entries.len());

        for (employee_id, hours) in entries {
            let employee = match employees.entry(*employee_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let stored = select_employee(&tx, *employee_id)?
                        .ok_or_else(|| LedgerError::not_found("employee", employee_id))?;
                    slot.insert(stored)
                }
            };
            employee.add_lifetime_hours(*hours)?;

            let month = match months.entry(*employee_id) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let stored = select_month(&tx, *employee_id, month_key)?.unwrap_or_else(
                        || EmployeeMonth::start(*employee_id, month_key.clone(), at),
                    );
                    slot.insert(stored)
                }
            };
            month.accumulate(*hours, at)?;
            snapshots.push(month.clone());
        }

        for employee in employees.values() {
            tx.execute(
                "UPDATE employees SET lifetime_hours = ?2 WHERE id = ?1",
                params![employee.id.to_string(), employee.lifetime_hours],
            )?;
        }
        for month in months.values() {
            tx.execute(
                &format!(
                    "INSERT INTO employee_months ({MONTH_COLUMNS}) VALUES (?1, ?2, ?3, ?4) \
                     ON CONFLICT (employee_id, month_key) \
                     DO UPDATE SET hours = excluded.hours, updated_at = excluded.updated_at"
                ),
                params![
                    month.employee_id.to_string(),
                    month.month_key.as_str(),
                    month.hours,
                    month.updated_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(snapshots)
    }

    fn insert_invoice(&self, invoice: Invoice) -> LedgerResult<Invoice> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if select_employee(&tx, invoice.employee_id())?.is_none() {
            return Err(LedgerError::not_found("employee", invoice.employee_id()));
        }
        let record = invoice.to_record();
        tx.execute(
            &format!(
                "INSERT INTO invoices ({INVOICE_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                record.id.to_string(),
                record.employee_id.to_string(),
                record.month_key.as_str(),
                record.hours,
                cents(record.rate)?,
                cents(record.amount)?,
                record.invoice_number.as_str(),
                record.artifact_path.as_deref().map(path_text),
                record.approved,
                record.sent,
                record.created_at,
            ],
        )?;
        tx.commit()?;
        Ok(invoice)
    }

    fn get_invoice(&self, id: InvoiceId) -> LedgerResult<Option<Invoice>> {
        Ok(select_invoice(&*self.conn()?, id)?)
    }

    fn find_invoice(
        &self,
        employee_id: EmployeeId,
        month_key: &MonthKey,
    ) -> LedgerResult<Option<Invoice>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {INVOICE_COLUMNS} FROM invoices WHERE employee_id = ?1 AND month_key = ?2"
                ),
                params![employee_id.to_string(), month_key.as_str()],
                invoice_from_row,
            )
            .optional()?)
    }

    fn list_invoices(&self) -> LedgerResult<Vec<Invoice>> {
        Ok(select_invoices(
            &*self.conn()?,
            "ORDER BY created_at DESC, id DESC",
            [],
        )?)
    }

    fn attach_artifact(&self, id: InvoiceId, path: &Path) -> LedgerResult<Invoice> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE invoices SET artifact_path = ?2 WHERE id = ?1",
            params![id.to_string(), path_text(path)],
        )?;
        if changed == 0 {
            return Err(LedgerError::not_found("invoice", id));
        }
        select_invoice(&conn, id)?.ok_or_else(|| LedgerError::not_found("invoice", id))
    }

    fn approve_invoices(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut approved = Vec::with_capacity(ids.len());
        for id in distinct(ids) {
            let changed = tx.execute(
                "UPDATE invoices SET approved = 1 WHERE id = ?1",
                [id.to_string()],
            )?;
            if changed == 0 {
                return Err(LedgerError::not_found("invoice", id));
            }
            approved.push(
                select_invoice(&tx, id)?.ok_or_else(|| LedgerError::not_found("invoice", id))?,
            );
        }
        tx.commit()?;
        Ok(approved)
    }

    fn mark_invoices_sent(&self, ids: &[InvoiceId]) -> LedgerResult<Vec<Invoice>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut sent = Vec::with_capacity(ids.len());
        for id in distinct(ids) {
            let mut invoice =
                select_invoice(&tx, id)?.ok_or_else(|| LedgerError::not_found("invoice", id))?;
            if invoice.mark_sent()? {
                tx.execute("UPDATE invoices SET sent = 1 WHERE id = ?1", [id.to_string()])?;
            }
            sent.push(invoice);
        }
        tx.commit()?;
        Ok(sent)
    }

    fn sent_invoice_rows(&self) -> LedgerResult<Vec<SentInvoiceRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT i.id, i.month_key, e.company, i.amount FROM invoices i \
             LEFT JOIN employees e ON e.id = i.employee_id WHERE i.sent = 1",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SentInvoiceRow {
                invoice_id: parsed_at(row, 0)?,
                month_key: parsed_at(row, 1)?,
                company: row.get(2)?,
                amount: money_at(row, 3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn upsert_company_payment(&self, payment: CompanyPayment) -> LedgerResult<CompanyPayment> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO company_payments (company, month_key, paid, paid_at) \
             VALUES (?1, ?2, ?3, ?4) ON CONFLICT (company, month_key) \
             DO UPDATE SET paid = excluded.paid, paid_at = excluded.paid_at",
            params![
                payment.company,
                payment.month_key.as_str(),
                payment.paid,
                payment.paid_at,
            ],
        )?;
        Ok(payment)
    }

    fn company_payments(&self, month_key: &MonthKey) -> LedgerResult<Vec<CompanyPayment>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT company, month_key, paid, paid_at FROM company_payments \
             WHERE month_key = ?1 ORDER BY company",
        )?;
        let rows = stmt.query_map([month_key.as_str()], |row| {
            Ok(CompanyPayment {
                company: row.get(0)?,
                month_key: parsed_at(row, 1)?,
                paid: row.get(2)?,
                paid_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn select_employee(conn: &Connection, id: EmployeeId) -> rusqlite::Result<Option<Employee>> {
    conn.query_row(
        &format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?1"),
        [id.to_string()],
        employee_from_row,
    )
    .optional()
}

fn select_month(
    conn: &Connection,
    employee_id: EmployeeId,
    month_key: &MonthKey,
) -> rusqlite::Result<Option<EmployeeMonth>> {
    conn.query_row(
        &format!(
            "SELECT {MONTH_COLUMNS} FROM employee_months WHERE employee_id = ?1 AND month_key = ?2"
        ),
        params![employee_id.to_string(), month_key.as_str()],
        |row| {
            Ok(EmployeeMonth {
                employee_id: parsed_at(row, 0)?,
                month_key: parsed_at(row, 1)?,
                hours: row.get(2)?,
                updated_at: row.get(3)?,
            })
        },
    )
    .optional()
}

fn select_invoice(conn: &Connection, id: InvoiceId) -> rusqlite::Result<Option<Invoice>> {
    conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"),
        [id.to_string()],
        invoice_from_row,
    )
    .optional()
}

fn select_invoices<P: rusqlite::Params>(
    conn: &Connection,
    tail: &str,
    params: P,
) -> rusqlite::Result<Vec<Invoice>> {
    let mut stmt = conn.prepare(&format!("SELECT {INVOICE_COLUMNS} FROM invoices {tail}"))?;
    let rows = stmt.query_map(params, invoice_from_row)?;
    rows.collect()
}

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: parsed_at(row, 0)?,
        name: row.get(1)?,
        hourly_rate: money_at(row, 2)?,
        email: row.get(3)?,
        company: row.get(4)?,
        start_date: row.get(5)?,
        preferred_vendor_id: optional_parsed_at(row, 6)?,
        lifetime_hours: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn vendor_from_row(row: &Row<'_>) -> rusqlite::Result<Vendor> {
    let joined: String = row.get(2)?;
    Ok(Vendor {
        id: parsed_at(row, 0)?,
        name: row.get(1)?,
        emails: joined
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect(),
        created_at: row.get(3)?,
    })
}

fn invoice_from_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
    let artifact_path: Option<String> = row.get(7)?;
    Ok(Invoice::from(InvoiceRecord {
        id: parsed_at(row, 0)?,
        employee_id: parsed_at(row, 1)?,
        month_key: parsed_at(row, 2)?,
        hours: row.get(3)?,
        rate: money_at(row, 4)?,
        amount: money_at(row, 5)?,
        invoice_number: InvoiceNumber::from_stored(row.get::<_, String>(6)?),
        artifact_path: artifact_path.map(PathBuf::from),
        approved: row.get(8)?,
        sent: row.get(9)?,
        created_at: row.get(10)?,
    }))
}

fn parsed_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn optional_parsed_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

fn money_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Money> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw)
        .map(Money::from_cents)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

fn cents(money: Money) -> rusqlite::Result<i64> {
    i64::try_from(money.cents()).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn distinct(ids: &[InvoiceId]) -> Vec<InvoiceId> {
    let mut out: Vec<InvoiceId> = Vec::with_capacity(ids.len());
    for id in ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    out
}
