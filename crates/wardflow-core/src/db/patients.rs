//! Patient database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Patient, PatientType, Visit};
use crate::workflow::WorkflowState;

const PATIENT_COLUMNS: &str = "id, name, gender, date_of_birth, phone, address, \
     patient_type, provider_id, is_staff, balance, visits, created_at, updated_at";

impl Database {
    /// Next `P-<n>` patient id.
    pub fn next_patient_id(&self) -> DbResult<String> {
        self.next_id("patients", "P-")
    }

    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        let visits_json = serde_json::to_string(&patient.visits)?;
        let (type_str, provider_id) = patient_type_columns(&patient.patient_type);

        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, name, gender, date_of_birth, phone, address,
                patient_type, provider_id, is_staff, balance, visits,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                patient.id,
                patient.name,
                patient.gender,
                patient.date_of_birth,
                patient.phone,
                patient.address,
                type_str,
                provider_id,
                patient.is_staff,
                patient.balance,
                visits_json,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient (full replace by id).
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let visits_json = serde_json::to_string(&patient.visits)?;
        let (type_str, provider_id) = patient_type_columns(&patient.patient_type);

        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                gender = ?3,
                date_of_birth = ?4,
                phone = ?5,
                address = ?6,
                patient_type = ?7,
                provider_id = ?8,
                is_staff = ?9,
                balance = ?10,
                visits = ?11,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.name,
                patient.gender,
                patient.date_of_birth,
                patient.phone,
                patient.address,
                type_str,
                provider_id,
                patient.is_staff,
                patient.balance,
                visits_json,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by id.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
                [id],
                patient_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a patient, erroring if missing.
    pub fn require_patient(&self, id: &str) -> DbResult<Patient> {
        self.get_patient(id)?
            .ok_or_else(|| DbError::NotFound(format!("patient {}", id)))
    }

    /// List all patients, ordered by name.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients ORDER BY name",
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map([], patient_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Search patients by name.
    ///
    /// Substring match, then ranked by Jaro-Winkler similarity so close
    /// misspellings still surface near the top.
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let pattern = format!("%{}%", query);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE name LIKE ?1 ORDER BY name",
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map([pattern], patient_row)?;

        let mut patients: Vec<Patient> = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }

        let query_lower = query.to_lowercase();
        patients.sort_by(|a, b| {
            let sa = strsim::jaro_winkler(&a.name.to_lowercase(), &query_lower);
            let sb = strsim::jaro_winkler(&b.name.to_lowercase(), &query_lower);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        patients.truncate(limit);
        Ok(patients)
    }

    /// Patients whose current visit is in the given routing state.
    ///
    /// This is the department-queue query every station page runs.
    pub fn list_patients_with_workflow(&self, state: &WorkflowState) -> DbResult<Vec<Patient>> {
        let all = self.list_patients()?;
        Ok(all
            .into_iter()
            .filter(|p| p.current_visit().map(|v| &v.workflow) == Some(state))
            .collect())
    }

    /// Delete a patient; bills, lab requests, prescriptions, and claims
    /// cascade at the schema level.
    pub fn delete_patient(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM patients WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn patient_type_columns(patient_type: &PatientType) -> (&'static str, Option<&str>) {
    match patient_type {
        PatientType::Cash => ("cash", None),
        PatientType::Hmo { provider_id } => ("hmo", Some(provider_id)),
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    id: String,
    name: String,
    gender: Option<String>,
    date_of_birth: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    patient_type: String,
    provider_id: Option<String>,
    is_staff: bool,
    balance: i64,
    visits: String,
    created_at: String,
    updated_at: String,
}

fn patient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        id: row.get(0)?,
        name: row.get(1)?,
        gender: row.get(2)?,
        date_of_birth: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        patient_type: row.get(6)?,
        provider_id: row.get(7)?,
        is_staff: row.get(8)?,
        balance: row.get(9)?,
        visits: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let visits: Vec<Visit> = serde_json::from_str(&row.visits)?;
        let patient_type = match row.patient_type.as_str() {
            "cash" => PatientType::Cash,
            "hmo" => PatientType::Hmo {
                provider_id: row.provider_id.ok_or_else(|| {
                    DbError::Constraint(format!("HMO patient {} has no provider", row.id))
                })?,
            },
            other => {
                return Err(DbError::Constraint(format!(
                    "Unknown patient type: {}",
                    other
                )))
            }
        };

        Ok(Patient {
            id: row.id,
            name: row.name,
            gender: row.gender,
            date_of_birth: row.date_of_birth,
            phone: row.phone,
            address: row.address,
            patient_type,
            is_staff: row.is_staff,
            balance: row.balance,
            visits,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::Department;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_patient(db: &Database, name: &str, patient_type: PatientType) -> Patient {
        let patient = Patient::new(db.next_patient_id().unwrap(), name.into(), patient_type);
        db.insert_patient(&patient).unwrap();
        patient
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let mut patient = Patient::new("P-1".into(), "Ada Obi".into(), PatientType::Cash);
        patient.phone = Some("08031234567".into());
        patient.visits.push(Visit::new("Malaria".into()));

        db.insert_patient(&patient).unwrap();

        let retrieved = db.get_patient("P-1").unwrap().unwrap();
        assert_eq!(retrieved.name, "Ada Obi");
        assert_eq!(retrieved.phone, Some("08031234567".into()));
        assert_eq!(retrieved.visits.len(), 1);
        assert_eq!(retrieved.visits[0].diagnosis, "Malaria");
    }

    #[test]
    fn test_sequential_ids() {
        let db = setup_db();
        let p1 = new_patient(&db, "Ada", PatientType::Cash);
        let p2 = new_patient(&db, "Bola", PatientType::Cash);
        assert_eq!(p1.id, "P-1");
        assert_eq!(p2.id, "P-2");

        // Deleting the newest patient must not recycle its id onto a live row scheme
        db.delete_patient(&p2.id).unwrap();
        let p3 = new_patient(&db, "Chidi", PatientType::Cash);
        assert_eq!(p3.id, "P-2"); // max suffix among remaining rows is 1
    }

    #[test]
    fn test_hmo_round_trip() {
        let db = setup_db();
        let patient = new_patient(
            &db,
            "Bola Ade",
            PatientType::Hmo {
                provider_id: "PROV-1".into(),
            },
        );
        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.patient_type.provider_id(), Some("PROV-1"));
    }

    #[test]
    fn test_update_preserves_visits() {
        let db = setup_db();
        let mut patient = new_patient(&db, "Ada", PatientType::Cash);
        patient.visits.push(Visit::new("Typhoid".into()));
        patient.balance = 5000;
        db.update_patient(&patient).unwrap();

        let retrieved = db.get_patient(&patient.id).unwrap().unwrap();
        assert_eq!(retrieved.balance, 5000);
        assert_eq!(retrieved.visits.len(), 1);
    }

    #[test]
    fn test_search_ranks_close_matches_first() {
        let db = setup_db();
        new_patient(&db, "Adaeze Obi", PatientType::Cash);
        new_patient(&db, "Ada Obi", PatientType::Cash);
        new_patient(&db, "Luna Eze", PatientType::Cash);

        let results = db.search_patients("Ada Obi", 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "Ada Obi");
    }

    #[test]
    fn test_department_queue() {
        let db = setup_db();
        let mut with_lab = new_patient(&db, "Ada", PatientType::Cash);
        with_lab.visits.push(Visit::new("Malaria".into()));
        with_lab.visits.last_mut().unwrap().workflow =
            WorkflowState::With(Department::Laboratory);
        db.update_patient(&with_lab).unwrap();

        let mut pending = new_patient(&db, "Bola", PatientType::Cash);
        pending.visits.push(Visit::new("Cough".into()));
        db.update_patient(&pending).unwrap();

        let queue = db
            .list_patients_with_workflow(&WorkflowState::With(Department::Laboratory))
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].name, "Ada");

        let doctor_queue = db.list_patients_with_workflow(&WorkflowState::Pending).unwrap();
        assert_eq!(doctor_queue.len(), 1);
        assert_eq!(doctor_queue[0].name, "Bola");
    }
}
