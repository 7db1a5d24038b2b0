//! Patient and visit models.

use serde::{Deserialize, Serialize};

use super::billing::PaymentStatus;
use super::lab::LabTestItem;
use crate::workflow::WorkflowState;

/// How a patient settles bills.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PatientType {
    /// Pays at the cash point.
    Cash,
    /// Covered by an HMO provider; payment gated on claim approval.
    Hmo { provider_id: String },
}

impl PatientType {
    /// The covering provider, if any.
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            PatientType::Cash => None,
            PatientType::Hmo { provider_id } => Some(provider_id),
        }
    }
}

/// A registered patient and their ordered visit history.
///
/// The last element of `visits` is always the current encounter; visits are
/// append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// `P-<n>` identifier
    pub id: String,
    pub name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub patient_type: PatientType,
    /// Staff members get percentage discounts on bills
    pub is_staff: bool,
    /// Retainership credit in integer Naira
    pub balance: i64,
    pub visits: Vec<Visit>,
    pub created_at: String,
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(id: String, name: String, patient_type: PatientType) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            name,
            gender: None,
            date_of_birth: None,
            phone: None,
            address: None,
            patient_type,
            is_staff: false,
            balance: 0,
            visits: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// The current encounter, if any.
    pub fn current_visit(&self) -> Option<&Visit> {
        self.visits.last()
    }

    /// True for HMO-covered patients.
    pub fn is_hmo(&self) -> bool {
        matches!(self.patient_type, PatientType::Hmo { .. })
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// One clinical encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub visit_id: String,
    pub date: String,
    pub complaint: Option<String>,
    /// Clinical diagnosis text only; routing lives in `workflow`
    pub diagnosis: String,
    pub workflow: WorkflowState,
    /// Accumulated notes; appended to, never overwritten
    pub notes: String,
    pub vitals: Option<Vitals>,
    /// Injection workflow scoped to this visit
    pub injection_data: Option<InjectionData>,
    /// Copied lab results once the request completes
    pub lab_summary: Option<LabSummary>,
    /// Vaccinations administered during this visit
    pub vaccinations: Vec<VaccinationRecord>,
    pub updated_at: String,
}

impl Visit {
    /// Create a new visit in the doctor's queue.
    pub fn new(diagnosis: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            visit_id: uuid::Uuid::new_v4().to_string(),
            date: now.clone(),
            complaint: None,
            diagnosis,
            workflow: WorkflowState::Pending,
            notes: String::new(),
            vitals: None,
            injection_data: None,
            lab_summary: None,
            vaccinations: Vec::new(),
            updated_at: now,
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Vital signs recorded at triage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vitals {
    pub temperature_c: Option<f64>,
    pub pulse_bpm: Option<u32>,
    pub blood_pressure: Option<String>,
    pub weight_kg: Option<f64>,
}

/// Per-visit injection workflow record.
///
/// Ephemeral: lives and dies with the visit, rebuilt from bills when absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct InjectionData {
    pub injections: Vec<Injection>,
    pub completed: bool,
}

impl InjectionData {
    /// True once every injection has been administered.
    pub fn all_administered(&self) -> bool {
        !self.injections.is_empty() && self.injections.iter().all(|i| i.administered)
    }
}

/// A single injectable order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Injection {
    pub medicine_id: String,
    pub name: String,
    pub quantity: i64,
    /// Integer Naira
    pub unit_price: i64,
    pub payment_status: PaymentStatus,
    pub administered: bool,
    /// Commit gate: once saved, the record is irreversible
    pub saved: bool,
    /// Weak back-reference; lookup only, no ownership
    pub bill_id: Option<String>,
}

/// Lab results copied onto the visit at completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabSummary {
    pub request_id: String,
    pub tests: Vec<LabTestItem>,
}

/// A vaccination administered during a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaccinationRecord {
    pub vaccine_id: String,
    pub vaccine_name: String,
    pub dose_label: String,
    pub administered_by: String,
    pub administered_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("P-1".into(), "Ada Obi".into(), PatientType::Cash);
        assert_eq!(patient.id, "P-1");
        assert_eq!(patient.balance, 0);
        assert!(!patient.is_hmo());
        assert!(patient.current_visit().is_none());
    }

    #[test]
    fn test_hmo_provider_id() {
        let patient = Patient::new(
            "P-2".into(),
            "Bola Ade".into(),
            PatientType::Hmo {
                provider_id: "HMO-PROV-1".into(),
            },
        );
        assert!(patient.is_hmo());
        assert_eq!(patient.patient_type.provider_id(), Some("HMO-PROV-1"));
    }

    #[test]
    fn test_new_visit_starts_pending() {
        let visit = Visit::new("Malaria".into());
        assert_eq!(visit.workflow, WorkflowState::Pending);
        assert_eq!(visit.visit_id.len(), 36); // UUID format
        assert!(visit.notes.is_empty());
    }

    #[test]
    fn test_all_administered() {
        let mut data = InjectionData::default();
        assert!(!data.all_administered()); // empty is not done

        data.injections.push(Injection {
            medicine_id: "MED-1".into(),
            name: "Ceftriaxone".into(),
            quantity: 1,
            unit_price: 1500,
            payment_status: PaymentStatus::Paid,
            administered: false,
            saved: false,
            bill_id: None,
        });
        assert!(!data.all_administered());

        data.injections[0].administered = true;
        assert!(data.all_administered());
    }
}
