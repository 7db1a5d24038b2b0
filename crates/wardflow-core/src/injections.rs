//! Injection room.
//!
//! Works off the injection record the pharmacy split onto the visit. Each
//! shot is administered individually, gated on its own payment, and the
//! session closes only when everything on the record has been given.

use thiserror::Error;

use crate::db::{Database, DbError, StockKind};
use crate::models::{Injection, Patient, PaymentStatus};
use crate::workflow::{self, Department, VisitTransition, WorkflowError, WorkflowState};

/// Injection room errors.
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Patient {0} has no injections on the current visit")]
    NoInjections(String),

    #[error("No injection of {1} found for patient {0}")]
    InjectionNotFound(String, String),

    #[error("Injection of {0} is not paid for")]
    NotPaid(String),

    #[error("Injection of {0} was already administered")]
    AlreadyAdministered(String),

    #[error("Patient {0} still has injections outstanding")]
    Outstanding(String),
}

pub type InjectionResult<T> = Result<T, InjectionError>;

/// The injection room station.
pub struct InjectionRoom<'a> {
    db: &'a Database,
}

impl<'a> InjectionRoom<'a> {
    /// Create a new station over the database.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Patients currently waiting in the injection room.
    pub fn injection_queue(&self) -> InjectionResult<Vec<Patient>> {
        Ok(self
            .db
            .list_patients_with_workflow(&WorkflowState::With(Department::InjectionRoom))?)
    }

    /// Administer one paid injection and commit it.
    ///
    /// Stock comes off the shelf in the same transaction as the record
    /// update; once saved the administration is irreversible.
    pub fn administer(
        &self,
        patient_id: &str,
        medicine_id: &str,
        staff_id: &str,
    ) -> InjectionResult<Injection> {
        let tx = self.db.begin()?;

        let patient = self.db.require_patient(patient_id)?;
        let mut injection_data = patient
            .current_visit()
            .and_then(|v| v.injection_data.clone())
            .ok_or_else(|| InjectionError::NoInjections(patient_id.to_string()))?;

        let injection = injection_data
            .injections
            .iter_mut()
            .find(|i| i.medicine_id == medicine_id)
            .ok_or_else(|| {
                InjectionError::InjectionNotFound(patient_id.to_string(), medicine_id.to_string())
            })?;

        if injection.payment_status != PaymentStatus::Paid {
            return Err(InjectionError::NotPaid(injection.name.clone()));
        }
        if injection.administered {
            return Err(InjectionError::AlreadyAdministered(injection.name.clone()));
        }

        self.db
            .decrement_stock(StockKind::Medicine, medicine_id, injection.quantity)?;

        injection.administered = true;
        injection.saved = true;
        let given = injection.clone();

        let note = format!("{} administered by {}", given.name, staff_id);
        let transition = VisitTransition {
            injection_data: Some(injection_data),
            append_note: Some(note),
            ..Default::default()
        };
        let updated = workflow::advance_visit(&patient, transition)?;
        self.db.update_patient(&updated)?;

        tx.commit().map_err(DbError::from)?;
        log::info!(
            "injection {} given to {} by {}",
            given.name,
            patient_id,
            staff_id
        );
        Ok(given)
    }

    /// Close the session and send the patient back to the doctor's queue.
    pub fn complete_session(&self, patient_id: &str, staff_id: &str) -> InjectionResult<()> {
        let patient = self.db.require_patient(patient_id)?;
        let mut injection_data = patient
            .current_visit()
            .and_then(|v| v.injection_data.clone())
            .ok_or_else(|| InjectionError::NoInjections(patient_id.to_string()))?;

        if !injection_data.all_administered() {
            return Err(InjectionError::Outstanding(patient_id.to_string()));
        }
        injection_data.completed = true;

        let transition = VisitTransition {
            workflow: Some(WorkflowState::Pending),
            injection_data: Some(injection_data),
            append_note: Some(format!("Injection session completed by {}", staff_id)),
            ..Default::default()
        };
        let updated = workflow::advance_visit(&patient, transition)?;
        self.db.update_patient(&updated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InjectionData, Medicine, PatientType, Visit};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut ceftriaxone = Medicine::new("MED-2".into(), "Ceftriaxone".into(), 1500, 5);
        ceftriaxone.injectable = true;
        db.upsert_medicine(&ceftriaxone).unwrap();

        let mut patient = Patient::new("P-1".into(), "Ada".into(), PatientType::Cash);
        let mut visit = Visit::new("Typhoid".into());
        visit.workflow = WorkflowState::With(Department::InjectionRoom);
        visit.injection_data = Some(InjectionData {
            injections: vec![Injection {
                medicine_id: "MED-2".into(),
                name: "Ceftriaxone".into(),
                quantity: 1,
                unit_price: 1500,
                payment_status: PaymentStatus::Paid,
                administered: false,
                saved: false,
                bill_id: Some("BILL-1".into()),
            }],
            completed: false,
        });
        patient.visits.push(visit);
        db.insert_patient(&patient).unwrap();
        db
    }

    #[test]
    fn test_queue_lists_waiting_patients() {
        let db = setup_db();
        let room = InjectionRoom::new(&db);

        let queue = room.injection_queue().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].id, "P-1");
    }

    #[test]
    fn test_administer_decrements_stock_and_saves() {
        let db = setup_db();
        let room = InjectionRoom::new(&db);

        let given = room.administer("P-1", "MED-2", "STAFF-1").unwrap();
        assert!(given.administered);
        assert!(given.saved);
        assert_eq!(db.require_medicine("MED-2").unwrap().stock, 4);

        let patient = db.require_patient("P-1").unwrap();
        let data = patient.current_visit().unwrap().injection_data.as_ref().unwrap();
        assert!(data.all_administered());
    }

    #[test]
    fn test_administer_twice_fails() {
        let db = setup_db();
        let room = InjectionRoom::new(&db);
        room.administer("P-1", "MED-2", "STAFF-1").unwrap();

        let again = room.administer("P-1", "MED-2", "STAFF-1");
        assert!(matches!(again, Err(InjectionError::AlreadyAdministered(_))));
        assert_eq!(db.require_medicine("MED-2").unwrap().stock, 4);
    }

    #[test]
    fn test_unpaid_injection_is_refused() {
        let db = setup_db();
        let mut patient = db.require_patient("P-1").unwrap();
        patient.visits.last_mut().unwrap().injection_data.as_mut().unwrap().injections[0]
            .payment_status = PaymentStatus::Pending;
        db.update_patient(&patient).unwrap();

        let room = InjectionRoom::new(&db);
        let result = room.administer("P-1", "MED-2", "STAFF-1");
        assert!(matches!(result, Err(InjectionError::NotPaid(_))));
        assert_eq!(db.require_medicine("MED-2").unwrap().stock, 5);
    }

    #[test]
    fn test_complete_session_requeues_patient() {
        let db = setup_db();
        let room = InjectionRoom::new(&db);

        assert!(matches!(
            room.complete_session("P-1", "STAFF-1"),
            Err(InjectionError::Outstanding(_))
        ));

        room.administer("P-1", "MED-2", "STAFF-1").unwrap();
        room.complete_session("P-1", "STAFF-1").unwrap();

        let patient = db.require_patient("P-1").unwrap();
        let visit = patient.current_visit().unwrap();
        assert_eq!(visit.workflow, WorkflowState::Pending);
        assert!(visit.injection_data.as_ref().unwrap().completed);
    }
}
