//! Bill database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Bill, BillItem, BillStatus, BillType};

const BILL_COLUMNS: &str = "id, patient_id, bill_type, status, items, \
     discount_percent, original_total, staff_id, created_at, updated_at";

impl Database {
    /// Next `BILL-<n>` id.
    pub fn next_bill_id(&self) -> DbResult<String> {
        self.next_id("bills", "BILL-")
    }

    /// Next `BILL-DEP-<n>` deposit bill id.
    pub fn next_deposit_bill_id(&self) -> DbResult<String> {
        self.next_id("bills", "BILL-DEP-")
    }

    /// Insert a new bill.
    pub fn insert_bill(&self, bill: &Bill) -> DbResult<()> {
        let items_json = serde_json::to_string(&bill.items)?;

        self.conn.execute(
            r#"
            INSERT INTO bills (
                id, patient_id, bill_type, status, items,
                discount_percent, original_total, staff_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                bill.id,
                bill.patient_id,
                bill_type_to_string(&bill.bill_type),
                bill_status_to_string(&bill.status),
                items_json,
                bill.discount_percent,
                bill.original_total,
                bill.staff_id,
                bill.created_at,
                bill.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing bill (full replace by id).
    pub fn update_bill(&self, bill: &Bill) -> DbResult<bool> {
        let items_json = serde_json::to_string(&bill.items)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE bills SET
                bill_type = ?2,
                status = ?3,
                items = ?4,
                discount_percent = ?5,
                original_total = ?6,
                staff_id = ?7,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                bill.id,
                bill_type_to_string(&bill.bill_type),
                bill_status_to_string(&bill.status),
                items_json,
                bill.discount_percent,
                bill.original_total,
                bill.staff_id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a bill by id.
    pub fn get_bill(&self, id: &str) -> DbResult<Option<Bill>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM bills WHERE id = ?", BILL_COLUMNS),
                [id],
                bill_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a bill, erroring if missing.
    pub fn require_bill(&self, id: &str) -> DbResult<Bill> {
        self.get_bill(id)?
            .ok_or_else(|| DbError::NotFound(format!("bill {}", id)))
    }

    /// List all bills for a patient, newest first.
    pub fn list_bills_for_patient(&self, patient_id: &str) -> DbResult<Vec<Bill>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bills WHERE patient_id = ? ORDER BY created_at DESC",
            BILL_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], bill_row)?;

        let mut bills = Vec::new();
        for row in rows {
            bills.push(row?.try_into()?);
        }
        Ok(bills)
    }

    /// List bills by status.
    pub fn list_bills_by_status(&self, status: &BillStatus) -> DbResult<Vec<Bill>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM bills WHERE status = ? ORDER BY created_at DESC",
            BILL_COLUMNS
        ))?;
        let rows = stmt.query_map([bill_status_to_string(status)], bill_row)?;

        let mut bills = Vec::new();
        for row in rows {
            bills.push(row?.try_into()?);
        }
        Ok(bills)
    }
}

/// Intermediate row struct for database mapping.
struct BillRow {
    id: String,
    patient_id: String,
    bill_type: String,
    status: String,
    items: String,
    discount_percent: Option<i64>,
    original_total: Option<i64>,
    staff_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn bill_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BillRow> {
    Ok(BillRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        bill_type: row.get(2)?,
        status: row.get(3)?,
        items: row.get(4)?,
        discount_percent: row.get(5)?,
        original_total: row.get(6)?,
        staff_id: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl TryFrom<BillRow> for Bill {
    type Error = DbError;

    fn try_from(row: BillRow) -> Result<Self, Self::Error> {
        let items: Vec<BillItem> = serde_json::from_str(&row.items)?;
        Ok(Bill {
            id: row.id,
            patient_id: row.patient_id,
            bill_type: string_to_bill_type(&row.bill_type)?,
            status: string_to_bill_status(&row.status)?,
            items,
            discount_percent: row.discount_percent,
            original_total: row.original_total,
            staff_id: row.staff_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn bill_type_to_string(bill_type: &BillType) -> &'static str {
    match bill_type {
        BillType::Consultation => "consultation",
        BillType::Pharmacy => "pharmacy",
        BillType::Laboratory => "laboratory",
        BillType::Medication => "medication",
        BillType::Deposit => "deposit",
        BillType::Vaccination => "vaccination",
        BillType::Other => "other",
    }
}

fn string_to_bill_type(s: &str) -> Result<BillType, DbError> {
    match s {
        "consultation" => Ok(BillType::Consultation),
        "pharmacy" => Ok(BillType::Pharmacy),
        "laboratory" => Ok(BillType::Laboratory),
        "medication" => Ok(BillType::Medication),
        "deposit" => Ok(BillType::Deposit),
        "vaccination" => Ok(BillType::Vaccination),
        "other" => Ok(BillType::Other),
        _ => Err(DbError::Constraint(format!("Unknown bill type: {}", s))),
    }
}

pub(crate) fn bill_status_to_string(status: &BillStatus) -> &'static str {
    match status {
        BillStatus::Pending => "pending",
        BillStatus::Paid => "paid",
        BillStatus::Cancelled => "cancelled",
        BillStatus::HmoPending => "hmo_pending",
        BillStatus::Billed => "billed",
        BillStatus::Dispensed => "dispensed",
    }
}

fn string_to_bill_status(s: &str) -> Result<BillStatus, DbError> {
    match s {
        "pending" => Ok(BillStatus::Pending),
        "paid" => Ok(BillStatus::Paid),
        "cancelled" => Ok(BillStatus::Cancelled),
        "hmo_pending" => Ok(BillStatus::HmoPending),
        "billed" => Ok(BillStatus::Billed),
        "dispensed" => Ok(BillStatus::Dispensed),
        _ => Err(DbError::Constraint(format!("Unknown bill status: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientType};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("P-1".into(), "Ada".into(), PatientType::Cash);
        db.insert_patient(&patient).unwrap();
        db
    }

    fn make_bill(db: &Database, bill_type: BillType, status: BillStatus) -> Bill {
        let bill = Bill::new(
            db.next_bill_id().unwrap(),
            "P-1".into(),
            bill_type,
            status,
            vec![BillItem::new("Consultation".into(), 1, 2000)],
        );
        db.insert_bill(&bill).unwrap();
        bill
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let bill = make_bill(&db, BillType::Consultation, BillStatus::Pending);

        let retrieved = db.get_bill(&bill.id).unwrap().unwrap();
        assert_eq!(retrieved.patient_id, "P-1");
        assert_eq!(retrieved.bill_type, BillType::Consultation);
        assert_eq!(retrieved.total(), 2000);
    }

    #[test]
    fn test_deposit_ids_do_not_collide_with_plain_bills() {
        let db = setup_db();
        let bill = make_bill(&db, BillType::Consultation, BillStatus::Pending);
        assert_eq!(bill.id, "BILL-1");

        let dep_id = db.next_deposit_bill_id().unwrap();
        assert_eq!(dep_id, "BILL-DEP-1");
    }

    #[test]
    fn test_list_by_status() {
        let db = setup_db();
        make_bill(&db, BillType::Pharmacy, BillStatus::Pending);
        make_bill(&db, BillType::Laboratory, BillStatus::Paid);
        make_bill(&db, BillType::Pharmacy, BillStatus::HmoPending);

        assert_eq!(db.list_bills_by_status(&BillStatus::Pending).unwrap().len(), 1);
        assert_eq!(db.list_bills_by_status(&BillStatus::Paid).unwrap().len(), 1);
        assert_eq!(
            db.list_bills_by_status(&BillStatus::HmoPending).unwrap().len(),
            1
        );
    }

    #[test]
    fn test_update_bill() {
        let db = setup_db();
        let mut bill = make_bill(&db, BillType::Pharmacy, BillStatus::Pending);

        bill.status = BillStatus::Paid;
        for item in &mut bill.items {
            item.paid = true;
        }
        db.update_bill(&bill).unwrap();

        let retrieved = db.get_bill(&bill.id).unwrap().unwrap();
        assert_eq!(retrieved.status, BillStatus::Paid);
        assert!(retrieved.items.iter().all(|i| i.paid));
    }
}
