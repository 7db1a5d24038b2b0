//! Patient workflow routing.
//!
//! Which department currently owns a patient is tracked on the *current*
//! visit (the last element of `patient.visits`). The legacy system encoded
//! this by prefixing the free-text diagnosis with `"With <Department>: "`;
//! here the routing state is an explicit enum and the diagnosis stays
//! clinical text. The prefix convention survives only as an import/export
//! codec for legacy records.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Patient, Visit};

/// Workflow errors.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Patient {0} has no visits")]
    NoVisits(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// A department station a patient can be routed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Department {
    Vitals,
    Doctor,
    Pharmacy,
    Laboratory,
    InjectionRoom,
    Vaccination,
    CashPoint,
    Hmo,
}

impl Department {
    /// Display label, matching the legacy `"With <label>: ..."` strings.
    pub fn label(&self) -> &'static str {
        match self {
            Department::Vitals => "Vitals",
            Department::Doctor => "Doctor",
            Department::Pharmacy => "Pharmacy",
            Department::Laboratory => "Laboratory",
            Department::InjectionRoom => "Injection Room",
            Department::Vaccination => "Vaccination",
            Department::CashPoint => "Cash Point",
            Department::Hmo => "HMO",
        }
    }

    /// Parse a legacy department label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Vitals" => Some(Department::Vitals),
            "Doctor" => Some(Department::Doctor),
            "Pharmacy" => Some(Department::Pharmacy),
            "Laboratory" => Some(Department::Laboratory),
            "Injection Room" => Some(Department::InjectionRoom),
            "Vaccination" => Some(Department::Vaccination),
            "Cash Point" => Some(Department::CashPoint),
            "HMO" => Some(Department::Hmo),
            _ => None,
        }
    }
}

/// Routing state of a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkflowState {
    /// Waiting in the doctor's queue.
    Pending,
    /// Encounter cancelled.
    Cancelled,
    /// Encounter finished.
    Completed,
    /// Owned by a department station.
    With(Department),
}

impl WorkflowState {
    /// True if the visit is owned by the given department.
    pub fn is_with(&self, dept: Department) -> bool {
        matches!(self, WorkflowState::With(d) if *d == dept)
    }
}

/// Parse a legacy diagnosis string into routing state and clinical text.
///
/// Splits on the *first* `": "` only, so clinical notes that themselves
/// contain `": "` (e.g. "suspected TB: follow up") survive intact. A string
/// with no recognized prefix is treated as bare clinical text in the
/// `Pending` state.
pub fn parse_legacy_tag(diagnosis: &str) -> (WorkflowState, String) {
    match diagnosis {
        "Pending" => return (WorkflowState::Pending, String::new()),
        "Cancelled" => return (WorkflowState::Cancelled, String::new()),
        "Completed" => return (WorkflowState::Completed, String::new()),
        _ => {}
    }

    if let Some(rest) = diagnosis.strip_prefix("With ") {
        if let Some((label, tail)) = rest.split_once(": ") {
            if let Some(dept) = Department::from_label(label) {
                return (WorkflowState::With(dept), tail.to_string());
            }
            log::warn!("unrecognized department label in legacy tag: {:?}", label);
        }
    }

    (WorkflowState::Pending, diagnosis.to_string())
}

/// Render routing state and clinical text back into the legacy encoding.
pub fn format_legacy_tag(state: &WorkflowState, diagnosis: &str) -> String {
    match state {
        WorkflowState::Pending if diagnosis.is_empty() => "Pending".to_string(),
        WorkflowState::Pending => diagnosis.to_string(),
        WorkflowState::Cancelled => "Cancelled".to_string(),
        WorkflowState::Completed => "Completed".to_string(),
        WorkflowState::With(dept) => format!("With {}: {}", dept.label(), diagnosis),
    }
}

/// A mutation to apply to the current visit.
///
/// Every field except `workflow` is optional; unspecified fields are
/// preserved. Notes are appended, never overwritten.
#[derive(Debug, Clone, Default)]
pub struct VisitTransition {
    /// New routing state, if changing.
    pub workflow: Option<WorkflowState>,
    /// Replacement clinical diagnosis text.
    pub diagnosis: Option<String>,
    /// Note appended to the visit's notes.
    pub append_note: Option<String>,
    /// Replacement for the visit's embedded injection record.
    pub injection_data: Option<crate::models::InjectionData>,
    /// Replacement for the visit's embedded lab summary.
    pub lab_summary: Option<crate::models::LabSummary>,
}

impl VisitTransition {
    /// Transition that only moves the visit to a new routing state.
    pub fn to_state(state: WorkflowState) -> Self {
        Self {
            workflow: Some(state),
            ..Default::default()
        }
    }

    /// Transition that hands the visit to a department.
    pub fn to_department(dept: Department) -> Self {
        Self::to_state(WorkflowState::With(dept))
    }

    /// Attach a note to append.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.append_note = Some(note.into());
        self
    }
}

/// Apply a transition to the patient's current visit.
///
/// This is the single place visit-workflow mutations happen. Operates only
/// on the last visit, preserves all fields not named by the transition, and
/// returns a new `Patient` value.
pub fn advance_visit(
    patient: &Patient,
    transition: VisitTransition,
) -> Result<Patient, WorkflowError> {
    let mut updated = patient.clone();
    let visit = updated
        .visits
        .last_mut()
        .ok_or_else(|| WorkflowError::NoVisits(patient.id.clone()))?;

    if let Some(state) = transition.workflow {
        log::info!(
            "patient {} visit {}: {:?} -> {:?}",
            patient.id,
            visit.visit_id,
            visit.workflow,
            state
        );
        visit.workflow = state;
    }
    if let Some(diagnosis) = transition.diagnosis {
        visit.diagnosis = diagnosis;
    }
    if let Some(note) = transition.append_note {
        append_note(visit, &note);
    }
    if let Some(data) = transition.injection_data {
        visit.injection_data = Some(data);
    }
    if let Some(summary) = transition.lab_summary {
        visit.lab_summary = Some(summary);
    }

    visit.touch();
    updated.touch();
    Ok(updated)
}

fn append_note(visit: &mut Visit, note: &str) {
    if visit.notes.is_empty() {
        visit.notes = note.to_string();
    } else {
        visit.notes.push('\n');
        visit.notes.push_str(note);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientType, Visit};

    fn patient_with_visit() -> Patient {
        let mut patient = Patient::new("P-1".into(), "Ada Obi".into(), PatientType::Cash);
        patient.visits.push(Visit::new("Headache".into()));
        patient
    }

    #[test]
    fn test_parse_bare_sentinels() {
        assert_eq!(parse_legacy_tag("Pending"), (WorkflowState::Pending, String::new()));
        assert_eq!(parse_legacy_tag("Cancelled"), (WorkflowState::Cancelled, String::new()));
        assert_eq!(parse_legacy_tag("Completed"), (WorkflowState::Completed, String::new()));
    }

    #[test]
    fn test_parse_department_prefix() {
        let (state, text) = parse_legacy_tag("With Pharmacy: Malaria");
        assert_eq!(state, WorkflowState::With(Department::Pharmacy));
        assert_eq!(text, "Malaria");
    }

    #[test]
    fn test_parse_multi_colon_diagnosis_survives() {
        let (state, text) = parse_legacy_tag("With Laboratory: suspected TB: follow up");
        assert_eq!(state, WorkflowState::With(Department::Laboratory));
        assert_eq!(text, "suspected TB: follow up");
    }

    #[test]
    fn test_parse_unprefixed_text_is_pending() {
        let (state, text) = parse_legacy_tag("Acute malaria");
        assert_eq!(state, WorkflowState::Pending);
        assert_eq!(text, "Acute malaria");
    }

    #[test]
    fn test_format_round_trip() {
        let original = "With Injection Room: Typhoid fever";
        let (state, text) = parse_legacy_tag(original);
        assert_eq!(format_legacy_tag(&state, &text), original);
    }

    #[test]
    fn test_advance_preserves_diagnosis_across_hops() {
        let patient = patient_with_visit();

        let patient = advance_visit(
            &patient,
            VisitTransition::to_department(Department::Laboratory),
        )
        .unwrap();
        let patient =
            advance_visit(&patient, VisitTransition::to_department(Department::Pharmacy)).unwrap();
        let patient = advance_visit(
            &patient,
            VisitTransition::to_department(Department::Laboratory),
        )
        .unwrap();

        let visit = patient.visits.last().unwrap();
        assert_eq!(visit.diagnosis, "Headache");
        assert!(visit.workflow.is_with(Department::Laboratory));
    }

    #[test]
    fn test_advance_appends_notes() {
        let patient = patient_with_visit();
        let patient = advance_visit(
            &patient,
            VisitTransition::to_state(WorkflowState::Pending).with_note("first"),
        )
        .unwrap();
        let patient = advance_visit(
            &patient,
            VisitTransition::to_state(WorkflowState::Pending).with_note("second"),
        )
        .unwrap();

        assert_eq!(patient.visits.last().unwrap().notes, "first\nsecond");
    }

    #[test]
    fn test_advance_without_visits_fails() {
        let patient = Patient::new("P-2".into(), "Empty".into(), PatientType::Cash);
        let result = advance_visit(&patient, VisitTransition::to_department(Department::Doctor));
        assert!(matches!(result, Err(WorkflowError::NoVisits(_))));
    }

    #[test]
    fn test_advance_only_touches_last_visit() {
        let mut patient = patient_with_visit();
        patient.visits.push(Visit::new("Follow-up".into()));

        let patient = advance_visit(
            &patient,
            VisitTransition::to_department(Department::CashPoint),
        )
        .unwrap();

        assert_eq!(patient.visits[0].workflow, WorkflowState::Pending);
        assert!(patient.visits[1].workflow.is_with(Department::CashPoint));
    }
}
