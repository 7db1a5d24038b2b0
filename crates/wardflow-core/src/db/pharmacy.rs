//! Prescription database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Prescription, PrescriptionItem, PrescriptionStatus};

const PRES_COLUMNS: &str =
    "id, patient_id, visit_id, status, items, injectables_split, bill_id, created_at, updated_at";

impl Database {
    /// Next `PRES-<n>` id.
    pub fn next_prescription_id(&self) -> DbResult<String> {
        self.next_id("prescriptions", "PRES-")
    }

    /// Insert a new prescription.
    pub fn insert_prescription(&self, prescription: &Prescription) -> DbResult<()> {
        let items_json = serde_json::to_string(&prescription.items)?;

        self.conn.execute(
            r#"
            INSERT INTO prescriptions (
                id, patient_id, visit_id, status, items, injectables_split,
                bill_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                prescription.id,
                prescription.patient_id,
                prescription.visit_id,
                prescription_status_to_string(&prescription.status),
                items_json,
                prescription.injectables_split,
                prescription.bill_id,
                prescription.created_at,
                prescription.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing prescription (full replace by id).
    pub fn update_prescription(&self, prescription: &Prescription) -> DbResult<bool> {
        let items_json = serde_json::to_string(&prescription.items)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE prescriptions SET
                status = ?2,
                items = ?3,
                injectables_split = ?4,
                bill_id = ?5,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                prescription.id,
                prescription_status_to_string(&prescription.status),
                items_json,
                prescription.injectables_split,
                prescription.bill_id,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a prescription by id.
    pub fn get_prescription(&self, id: &str) -> DbResult<Option<Prescription>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM prescriptions WHERE id = ?", PRES_COLUMNS),
                [id],
                prescription_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a prescription, erroring if missing.
    pub fn require_prescription(&self, id: &str) -> DbResult<Prescription> {
        self.get_prescription(id)?
            .ok_or_else(|| DbError::NotFound(format!("prescription {}", id)))
    }

    /// List prescriptions by status.
    pub fn list_prescriptions_by_status(
        &self,
        status: &PrescriptionStatus,
    ) -> DbResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM prescriptions WHERE status = ? ORDER BY created_at",
            PRES_COLUMNS
        ))?;
        let rows = stmt.query_map([prescription_status_to_string(status)], prescription_row)?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(row?.try_into()?);
        }
        Ok(prescriptions)
    }

    /// List all prescriptions for a patient, newest first.
    pub fn list_prescriptions_for_patient(&self, patient_id: &str) -> DbResult<Vec<Prescription>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM prescriptions WHERE patient_id = ? ORDER BY created_at DESC",
            PRES_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], prescription_row)?;

        let mut prescriptions = Vec::new();
        for row in rows {
            prescriptions.push(row?.try_into()?);
        }
        Ok(prescriptions)
    }
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    id: String,
    patient_id: String,
    visit_id: String,
    status: String,
    items: String,
    injectables_split: bool,
    bill_id: Option<String>,
    created_at: String,
    updated_at: String,
}

fn prescription_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrescriptionRow> {
    Ok(PrescriptionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        visit_id: row.get(2)?,
        status: row.get(3)?,
        items: row.get(4)?,
        injectables_split: row.get(5)?,
        bill_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        let items: Vec<PrescriptionItem> = serde_json::from_str(&row.items)?;
        Ok(Prescription {
            id: row.id,
            patient_id: row.patient_id,
            visit_id: row.visit_id,
            status: string_to_prescription_status(&row.status)?,
            items,
            injectables_split: row.injectables_split,
            bill_id: row.bill_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn prescription_status_to_string(status: &PrescriptionStatus) -> &'static str {
    match status {
        PrescriptionStatus::Pending => "pending",
        PrescriptionStatus::Billed => "billed",
        PrescriptionStatus::HmoPending => "hmo_pending",
        PrescriptionStatus::Paid => "paid",
        PrescriptionStatus::HmoApproved => "hmo_approved",
        PrescriptionStatus::Dispensed => "dispensed",
    }
}

fn string_to_prescription_status(s: &str) -> Result<PrescriptionStatus, DbError> {
    match s {
        "pending" => Ok(PrescriptionStatus::Pending),
        "billed" => Ok(PrescriptionStatus::Billed),
        "hmo_pending" => Ok(PrescriptionStatus::HmoPending),
        "paid" => Ok(PrescriptionStatus::Paid),
        "hmo_approved" => Ok(PrescriptionStatus::HmoApproved),
        "dispensed" => Ok(PrescriptionStatus::Dispensed),
        _ => Err(DbError::Constraint(format!(
            "Unknown prescription status: {}",
            s
        ))),
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

    fn make_prescription(db: &Database) -> Prescription {
        let prescription = Prescription::new(
            db.next_prescription_id().unwrap(),
            "P-1".into(),
            "visit-1".into(),
            vec![PrescriptionItem::new(
                "MED-1".into(),
                "Paracetamol".into(),
                2,
                500,
            )],
        );
        db.insert_prescription(&prescription).unwrap();
        prescription
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let prescription = make_prescription(&db);

        let retrieved = db.get_prescription(&prescription.id).unwrap().unwrap();
        assert_eq!(retrieved.id, "PRES-1");
        assert_eq!(retrieved.status, PrescriptionStatus::Pending);
        assert!(!retrieved.injectables_split);
    }

    #[test]
    fn test_update_records_split() {
        let db = setup_db();
        let mut prescription = make_prescription(&db);

        prescription.injectables_split = true;
        prescription.status = PrescriptionStatus::Billed;
        db.update_prescription(&prescription).unwrap();

        let retrieved = db.get_prescription(&prescription.id).unwrap().unwrap();
        assert!(retrieved.injectables_split);
        assert_eq!(retrieved.status, PrescriptionStatus::Billed);
    }

    #[test]
    fn test_require_missing_prescription() {
        let db = setup_db();
        let result = db.require_prescription("PRES-99");
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }
}
