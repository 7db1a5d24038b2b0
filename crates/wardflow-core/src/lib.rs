//! Wardflow Core Library
//!
//! Local-first hospital information system core: registration, consultations,
//! laboratory, pharmacy, injections, vaccinations, billing, and HMO claims.
//!
//! # Architecture
//!
//! ```text
//!                      Registration / Vitals
//!                               │
//!                       Doctor (visit Pending)
//!              ┌────────────────┼────────────────┐
//!              ▼                ▼                ▼
//!         Laboratory        Pharmacy        Vaccination
//!              │                │
//!              │         split injectables
//!              │                ├──────────────► Injection Room
//!              ▼                ▼                      │
//!       ┌─── Cash Point (cash) / HMO Desk (claims) ───┘
//!       │
//!       ▼
//!   pay_bill / process_claim
//!       │  syncs payment into lab tests, prescriptions,
//!       │  injections and routes the visit onward
//!       ▼
//!   back to Doctor (Pending) ... Completed
//! ```
//!
//! # Core Principle
//!
//! **Department ownership is explicit state.** A visit's routing lives in
//! [`workflow::WorkflowState`], never encoded in clinical text; every hop
//! goes through [`workflow::advance_visit`].
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer
//! - [`models`]: Domain types (Patient, Bill, Prescription, HmoClaim, ...)
//! - [`workflow`]: Visit routing state machine
//! - [`billing`]: Cash point ledger
//! - [`lab`]: Laboratory bench
//! - [`pharmacy`]: Pharmacy desk
//! - [`injections`]: Injection room
//! - [`vaccination`]: Vaccination station
//! - [`claims`]: HMO claims desk

pub mod billing;
pub mod claims;
pub mod db;
pub mod injections;
pub mod lab;
pub mod models;
pub mod pharmacy;
pub mod vaccination;
pub mod workflow;

// Re-export commonly used types
pub use billing::{BillingError, BillingLedger};
pub use claims::{ClaimDecision, ClaimError, ClaimsDesk};
pub use db::Database;
pub use injections::{InjectionError, InjectionRoom};
pub use lab::{LabBench, LabError};
pub use models::{
    Bill, BillItem, BillStatus, BillType, HmoClaim, LabRequest, LabTestItem, Medicine, Patient,
    PatientType, Prescription, PrescriptionItem, Vaccine, Visit,
};
pub use pharmacy::{DispenseError, PharmacyDesk};
pub use vaccination::VaccinationError;
pub use workflow::{Department, VisitTransition, WorkflowError, WorkflowState};

use std::sync::{Arc, Mutex};

// =========================================================================
// Crate-level Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum HospitalError {
    #[error(transparent)]
    Db(#[from] db::DbError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Lab(#[from] LabError),

    #[error(transparent)]
    Pharmacy(#[from] DispenseError),

    #[error(transparent)]
    Injection(#[from] InjectionError),

    #[error(transparent)]
    Vaccination(#[from] VaccinationError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for HospitalError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        HospitalError::LockPoisoned(e.to_string())
    }
}

pub type HospitalResult<T> = Result<T, HospitalError>;

// =========================================================================
// Factory Functions
// =========================================================================

/// Open or create a hospital database at the given path.
pub fn open_hospital<P: AsRef<std::path::Path>>(path: P) -> HospitalResult<Hospital> {
    let db = Database::open(path)?;
    Ok(Hospital {
        db: Arc::new(Mutex::new(db)),
    })
}

/// Create a hospital over an in-memory database.
pub fn open_hospital_in_memory() -> HospitalResult<Hospital> {
    let db = Database::open_in_memory()?;
    Ok(Hospital {
        db: Arc::new(Mutex::new(db)),
    })
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe entry point over the whole system.
///
/// Single-writer by construction: every call takes the database lock, so
/// the per-call transactions inside the services never interleave.
pub struct Hospital {
    db: Arc<Mutex<Database>>,
}

impl Hospital {
    // =====================================================================
    // Patient Registry
    // =====================================================================

    /// Register a new patient.
    pub fn register_patient(
        &self,
        name: String,
        patient_type: PatientType,
    ) -> HospitalResult<Patient> {
        let db = self.db.lock()?;
        let patient = Patient::new(db.next_patient_id()?, name, patient_type);
        db.insert_patient(&patient)?;
        Ok(patient)
    }

    /// Full replace of a patient record.
    pub fn update_patient(&self, patient: &Patient) -> HospitalResult<()> {
        let db = self.db.lock()?;
        db.update_patient(patient)?;
        Ok(())
    }

    /// Get a patient by id.
    pub fn get_patient(&self, id: &str) -> HospitalResult<Option<Patient>> {
        let db = self.db.lock()?;
        Ok(db.get_patient(id)?)
    }

    /// Search patients by name.
    pub fn search_patients(&self, query: &str, limit: usize) -> HospitalResult<Vec<Patient>> {
        let db = self.db.lock()?;
        Ok(db.search_patients(query, limit)?)
    }

    /// Delete a patient and everything hanging off them.
    pub fn delete_patient(&self, id: &str) -> HospitalResult<bool> {
        let db = self.db.lock()?;
        Ok(db.delete_patient(id)?)
    }

    /// Open a new encounter for a patient.
    pub fn record_visit(&self, patient_id: &str, diagnosis: String) -> HospitalResult<Visit> {
        let db = self.db.lock()?;
        let mut patient = db.require_patient(patient_id)?;
        let visit = Visit::new(diagnosis);
        patient.visits.push(visit.clone());
        patient.touch();
        db.update_patient(&patient)?;
        Ok(visit)
    }

    /// Apply a workflow transition to a patient's current visit.
    pub fn advance_visit(
        &self,
        patient_id: &str,
        transition: VisitTransition,
    ) -> HospitalResult<Patient> {
        let db = self.db.lock()?;
        let patient = db.require_patient(patient_id)?;
        let updated = workflow::advance_visit(&patient, transition)?;
        db.update_patient(&updated)?;
        Ok(updated)
    }

    /// Patients whose current visit sits in the given state.
    pub fn patients_in_state(&self, state: &WorkflowState) -> HospitalResult<Vec<Patient>> {
        let db = self.db.lock()?;
        Ok(db.list_patients_with_workflow(state)?)
    }

    // =====================================================================
    // Billing
    // =====================================================================

    /// Insert a bill.
    pub fn add_bill(&self, bill: &Bill) -> HospitalResult<()> {
        let db = self.db.lock()?;
        BillingLedger::new(&db).add_bill(bill)?;
        Ok(())
    }

    /// Settle a pending bill at the cash point.
    pub fn pay_bill(&self, bill_id: &str, staff_id: &str) -> HospitalResult<Bill> {
        let db = self.db.lock()?;
        Ok(BillingLedger::new(&db).pay_bill(bill_id, staff_id)?)
    }

    /// Record a retainership deposit.
    pub fn create_deposit_bill(
        &self,
        patient_id: &str,
        amount: i64,
        staff_id: &str,
    ) -> HospitalResult<Bill> {
        let db = self.db.lock()?;
        Ok(BillingLedger::new(&db).create_deposit_bill(patient_id, amount, staff_id)?)
    }

    /// Apply a staff discount to a bill.
    pub fn apply_staff_discount(&self, bill_id: &str, percent: i64) -> HospitalResult<Bill> {
        let db = self.db.lock()?;
        Ok(BillingLedger::new(&db).apply_staff_discount(bill_id, percent)?)
    }

    /// Bills waiting at the cash point.
    pub fn pending_bills(&self) -> HospitalResult<Vec<Bill>> {
        let db = self.db.lock()?;
        Ok(BillingLedger::new(&db).pending_bills()?)
    }

    // =====================================================================
    // Laboratory
    // =====================================================================

    /// Raise a lab request against the current visit.
    pub fn add_lab_request(
        &self,
        patient_id: &str,
        test_type_ids: &[String],
    ) -> HospitalResult<LabRequest> {
        let db = self.db.lock()?;
        Ok(LabBench::new(&db).add_request(patient_id, test_type_ids)?)
    }

    /// Bill a pending request and send the patient to pay.
    pub fn send_lab_request_to_cash_point(&self, request_id: &str) -> HospitalResult<Bill> {
        let db = self.db.lock()?;
        Ok(LabBench::new(&db).send_to_cash_point(request_id)?)
    }

    /// Start bench work on a fully paid request.
    pub fn start_lab_tests(&self, request_id: &str) -> HospitalResult<LabRequest> {
        let db = self.db.lock()?;
        Ok(LabBench::new(&db).start_tests(request_id)?)
    }

    /// Record a free-text result for one test.
    pub fn record_lab_result(
        &self,
        request_id: &str,
        test_id: &str,
        result: &str,
    ) -> HospitalResult<()> {
        let db = self.db.lock()?;
        LabBench::new(&db).record_result(request_id, test_id, result)?;
        Ok(())
    }

    /// Record per-parameter values for one test.
    pub fn record_lab_parameter_results(
        &self,
        request_id: &str,
        test_id: &str,
        values: &[(String, String)],
    ) -> HospitalResult<()> {
        let db = self.db.lock()?;
        LabBench::new(&db).record_parameter_results(request_id, test_id, values)?;
        Ok(())
    }

    /// Complete a request and push results back into the visit.
    pub fn complete_lab_request(&self, request_id: &str) -> HospitalResult<LabRequest> {
        let db = self.db.lock()?;
        Ok(LabBench::new(&db).complete_request(request_id)?)
    }

    // =====================================================================
    // Pharmacy
    // =====================================================================

    /// Write a prescription against the current visit.
    pub fn create_prescription(
        &self,
        patient_id: &str,
        orders: &[(String, i64)],
    ) -> HospitalResult<Prescription> {
        let db = self.db.lock()?;
        Ok(PharmacyDesk::new(&db).create_prescription(patient_id, orders)?)
    }

    /// Replace a prescription's items while still editable.
    pub fn update_prescription(
        &self,
        prescription_id: &str,
        items: Vec<PrescriptionItem>,
    ) -> HospitalResult<Prescription> {
        let db = self.db.lock()?;
        Ok(PharmacyDesk::new(&db).update_prescription(prescription_id, items)?)
    }

    /// Send a prescription to billing, splitting out injectables.
    pub fn send_prescription_to_billing(
        &self,
        prescription_id: &str,
    ) -> HospitalResult<Prescription> {
        let db = self.db.lock()?;
        Ok(PharmacyDesk::new(&db).send_to_billing(prescription_id)?)
    }

    /// Dispense a paid prescription.
    pub fn dispense_prescription(&self, prescription_id: &str) -> HospitalResult<Prescription> {
        let db = self.db.lock()?;
        Ok(PharmacyDesk::new(&db).dispense(prescription_id)?)
    }

    // =====================================================================
    // Injection Room
    // =====================================================================

    /// Patients waiting in the injection room.
    pub fn injection_queue(&self) -> HospitalResult<Vec<Patient>> {
        let db = self.db.lock()?;
        Ok(InjectionRoom::new(&db).injection_queue()?)
    }

    /// Administer one paid injection.
    pub fn administer_injection(
        &self,
        patient_id: &str,
        medicine_id: &str,
        staff_id: &str,
    ) -> HospitalResult<models::Injection> {
        let db = self.db.lock()?;
        Ok(InjectionRoom::new(&db).administer(patient_id, medicine_id, staff_id)?)
    }

    /// Close an injection session.
    pub fn complete_injection_session(
        &self,
        patient_id: &str,
        staff_id: &str,
    ) -> HospitalResult<()> {
        let db = self.db.lock()?;
        InjectionRoom::new(&db).complete_session(patient_id, staff_id)?;
        Ok(())
    }

    // =====================================================================
    // Vaccination
    // =====================================================================

    /// Record an administered vaccine dose.
    pub fn record_vaccination(
        &self,
        patient_id: &str,
        vaccine_id: &str,
        dose_label: &str,
        staff_id: &str,
    ) -> HospitalResult<(models::VaccinationRecord, Bill)> {
        let db = self.db.lock()?;
        Ok(vaccination::record_vaccination(
            &db, patient_id, vaccine_id, dose_label, staff_id,
        )?)
    }

    // =====================================================================
    // HMO Claims
    // =====================================================================

    /// Sweep for claimable records; returns the number of claims inserted.
    pub fn refresh_claims(&self) -> HospitalResult<usize> {
        let db = self.db.lock()?;
        Ok(ClaimsDesk::new(&db).refresh_claims()?)
    }

    /// Approve or reject a pending claim.
    pub fn process_claim(
        &self,
        claim_id: &str,
        decision: ClaimDecision,
        staff_id: &str,
    ) -> HospitalResult<HmoClaim> {
        let db = self.db.lock()?;
        Ok(ClaimsDesk::new(&db).process_claim(claim_id, decision, staff_id)?)
    }

    /// Claims in a given state.
    pub fn claims_by_status(
        &self,
        status: &models::ClaimStatus,
    ) -> HospitalResult<Vec<HmoClaim>> {
        let db = self.db.lock()?;
        Ok(db.list_claims_by_status(status)?)
    }

    // =====================================================================
    // Catalog & Directory
    // =====================================================================

    /// Add or update a medicine.
    pub fn upsert_medicine(&self, medicine: &Medicine) -> HospitalResult<()> {
        let db = self.db.lock()?;
        db.upsert_medicine(medicine)?;
        Ok(())
    }

    /// Search active medicines by name.
    pub fn search_medicines(&self, query: &str, limit: usize) -> HospitalResult<Vec<Medicine>> {
        let db = self.db.lock()?;
        Ok(db.search_medicines(query, limit)?)
    }

    /// Add or update a vaccine.
    pub fn upsert_vaccine(&self, vaccine: &Vaccine) -> HospitalResult<()> {
        let db = self.db.lock()?;
        db.upsert_vaccine(vaccine)?;
        Ok(())
    }

    /// Add or update a lab test type.
    pub fn upsert_lab_test_type(&self, test_type: &models::LabTestType) -> HospitalResult<()> {
        let db = self.db.lock()?;
        db.upsert_lab_test_type(test_type)?;
        Ok(())
    }

    /// Add or update a staff member.
    pub fn upsert_staff(&self, staff: &models::Staff) -> HospitalResult<()> {
        let db = self.db.lock()?;
        db.upsert_staff(staff)?;
        Ok(())
    }

    /// Add or update an HMO provider.
    pub fn upsert_hmo_provider(&self, provider: &models::HmoProvider) -> HospitalResult<()> {
        let db = self.db.lock()?;
        db.upsert_hmo_provider(provider)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_round_trip() {
        let hospital = open_hospital_in_memory().unwrap();

        let patient = hospital
            .register_patient("Ada Obi".into(), PatientType::Cash)
            .unwrap();
        assert_eq!(patient.id, "P-1");

        hospital
            .record_visit(&patient.id, "Malaria".into())
            .unwrap();

        let queued = hospital
            .patients_in_state(&WorkflowState::Pending)
            .unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].id, "P-1");
    }

    #[test]
    fn test_facade_is_send_and_shareable() {
        let hospital = std::sync::Arc::new(open_hospital_in_memory().unwrap());
        let clone = hospital.clone();
        let handle = std::thread::spawn(move || {
            clone
                .register_patient("Bola".into(), PatientType::Cash)
                .unwrap()
        });
        let patient = handle.join().unwrap();
        assert!(hospital.get_patient(&patient.id).unwrap().is_some());
    }
}
