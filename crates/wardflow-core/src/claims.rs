//! HMO claims reconciliation.
//!
//! Claims shadow line items that already exist in bills, lab requests, and
//! injection records. Three operations cover the whole lifecycle:
//!
//! - [`ClaimsDesk::generate_claim_items`]: pure projection from the
//!   authoritative source record.
//! - [`ClaimsDesk::refresh_claims`]: idempotent sweep inserting claims for
//!   claimable state not yet shadowed.
//! - [`ClaimsDesk::process_claim`]: approval/rejection fan-out back into the
//!   source record and the visit's routing state.

use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{
    BillStatus, BillType, ClaimItem, ClaimStatus, HmoClaim, LabStatus, PaymentStatus,
    PrescriptionStatus, SourceDepartment,
};
use crate::workflow::{self, Department, VisitTransition, WorkflowError, WorkflowState};

/// Claim processing errors.
#[derive(Error, Debug)]
pub enum ClaimError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Claim {0} is not pending")]
    NotPending(String),

    #[error("Patient {0} is not HMO-covered")]
    NotHmoPatient(String),
}

pub type ClaimResult<T> = Result<T, ClaimError>;

/// HMO desk decision on a claim.
#[derive(Debug, Clone)]
pub enum ClaimDecision {
    Approve { code: String },
    Reject { reason: String },
}

/// HMO claims desk.
pub struct ClaimsDesk<'a> {
    db: &'a Database,
}

impl<'a> ClaimsDesk<'a> {
    /// Create a new claims desk.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Project a source record's line items into claim items.
    ///
    /// Pure derivation: claim items are never created independently, only
    /// regenerated from the bill or lab request they mirror.
    pub fn generate_claim_items(
        &self,
        department: SourceDepartment,
        source_id: &str,
    ) -> ClaimResult<Vec<ClaimItem>> {
        let items = match department {
            SourceDepartment::Doctor
            | SourceDepartment::Pharmacy
            | SourceDepartment::InjectionRoom => {
                let bill = self.db.require_bill(source_id)?;
                bill.items
                    .iter()
                    .map(|item| ClaimItem {
                        description: item.description.clone(),
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                        source_department: department,
                        source_id: source_id.to_string(),
                    })
                    .collect()
            }
            SourceDepartment::Laboratory => {
                let request = self.db.require_lab_request(source_id)?;
                request
                    .tests
                    .iter()
                    .map(|test| ClaimItem {
                        description: test.name.clone(),
                        quantity: 1,
                        unit_price: test.price,
                        source_department: department,
                        source_id: source_id.to_string(),
                    })
                    .collect()
            }
        };
        Ok(items)
    }

    /// Insert a claim for a source record unless one already shadows it.
    ///
    /// Returns the new claim, or `None` if the source was already claimed.
    pub fn ensure_claim(
        &self,
        patient_id: &str,
        department: SourceDepartment,
        source_id: &str,
    ) -> ClaimResult<Option<HmoClaim>> {
        if self.db.claim_exists_for_source(department, source_id)? {
            return Ok(None);
        }

        let patient = self.db.require_patient(patient_id)?;
        let provider_id = patient
            .patient_type
            .provider_id()
            .ok_or_else(|| ClaimError::NotHmoPatient(patient_id.to_string()))?
            .to_string();

        let items = self.generate_claim_items(department, source_id)?;
        let claim = HmoClaim::new(
            patient_id.to_string(),
            provider_id,
            department,
            source_id.to_string(),
            items,
        );
        self.db.insert_claim(&claim)?;
        log::debug!(
            "claim {} created for {} {}",
            claim.id,
            department.code(),
            source_id
        );
        Ok(Some(claim))
    }

    /// Reconciliation sweep: insert claims for claimable state not yet
    /// shadowed. Idempotent by construction (deterministic claim ids plus
    /// the source uniqueness constraint); returns the number inserted.
    pub fn refresh_claims(&self) -> ClaimResult<usize> {
        let mut inserted = 0;

        for patient in self.db.list_patients()? {
            if !patient.is_hmo() {
                continue;
            }

            for bill in self.db.list_bills_for_patient(&patient.id)? {
                let claimable = match (bill.bill_type, bill.status) {
                    (BillType::Consultation, BillStatus::Paid) => Some(SourceDepartment::Doctor),
                    (BillType::Pharmacy, BillStatus::HmoPending) => Some(SourceDepartment::Pharmacy),
                    (BillType::Medication, BillStatus::HmoPending) => {
                        Some(SourceDepartment::InjectionRoom)
                    }
                    _ => None,
                };
                if let Some(department) = claimable {
                    if self.ensure_claim(&patient.id, department, &bill.id)?.is_some() {
                        inserted += 1;
                    }
                }
            }

            for request in self.db.list_lab_requests_for_patient(&patient.id)? {
                if request.status == LabStatus::Billed && !request.all_paid() {
                    if self
                        .ensure_claim(&patient.id, SourceDepartment::Laboratory, &request.id)?
                        .is_some()
                    {
                        inserted += 1;
                    }
                }
            }
        }

        if inserted > 0 {
            log::info!("claim refresh inserted {} claim(s)", inserted);
        }
        Ok(inserted)
    }

    /// Apply the HMO desk's decision to a pending claim, fanning the outcome
    /// back into the source record and the patient's visit.
    pub fn process_claim(
        &self,
        claim_id: &str,
        decision: ClaimDecision,
        staff_id: &str,
    ) -> ClaimResult<HmoClaim> {
        let tx = self.db.begin()?;

        let mut claim = self.db.require_claim(claim_id)?;
        if claim.status != ClaimStatus::Pending {
            return Err(ClaimError::NotPending(claim_id.to_string()));
        }

        match &decision {
            ClaimDecision::Approve { code } => {
                claim.status = ClaimStatus::Completed;
                claim.approval_code = Some(code.clone());
            }
            ClaimDecision::Reject { reason } => {
                claim.status = ClaimStatus::Rejected;
                claim.rejection_reason = Some(reason.clone());
            }
        }
        claim.touch();
        self.db.update_claim(&claim)?;

        match &decision {
            ClaimDecision::Approve { code } => self.apply_approval(&claim, code)?,
            ClaimDecision::Reject { reason } => self.apply_rejection(&claim, reason)?,
        }

        log::info!(
            "claim {} {} by {}",
            claim.id,
            match decision {
                ClaimDecision::Approve { .. } => "approved",
                ClaimDecision::Reject { .. } => "rejected",
            },
            staff_id
        );
        tx.commit().map_err(DbError::from)?;
        Ok(claim)
    }

    fn apply_approval(&self, claim: &HmoClaim, code: &str) -> ClaimResult<()> {
        let note = format!("HMO claim approved ({})", code);

        match claim.source_department {
            SourceDepartment::Doctor => {
                // Consultation bills are already paid when claimed; nothing
                // to unblock downstream.
            }
            SourceDepartment::Pharmacy => {
                self.mark_bill_paid(&claim.source_id)?;

                for mut prescription in
                    self.db.list_prescriptions_for_patient(&claim.patient_id)?
                {
                    if prescription.bill_id.as_deref() != Some(claim.source_id.as_str()) {
                        continue;
                    }
                    prescription.status = PrescriptionStatus::HmoApproved;
                    for item in &mut prescription.items {
                        if !item.injectable {
                            item.payment_status = PaymentStatus::Paid;
                        }
                    }
                    prescription.touch();
                    self.db.update_prescription(&prescription)?;
                }

                self.route_visit(claim, Department::Pharmacy, &note)?;
            }
            SourceDepartment::Laboratory => {
                let mut request = self.db.require_lab_request(&claim.source_id)?;
                for test in &mut request.tests {
                    test.payment_status = PaymentStatus::Paid;
                }
                request.touch();
                self.db.update_lab_request(&request)?;

                self.route_visit(claim, Department::Laboratory, &note)?;
            }
            SourceDepartment::InjectionRoom => {
                self.mark_bill_paid(&claim.source_id)?;

                let patient = self.db.require_patient(&claim.patient_id)?;
                let mut injection_data = patient
                    .current_visit()
                    .and_then(|v| v.injection_data.clone())
                    .unwrap_or_default();
                for injection in &mut injection_data.injections {
                    if injection.bill_id.as_deref() == Some(claim.source_id.as_str()) {
                        injection.payment_status = PaymentStatus::Paid;
                    }
                }

                let transition = VisitTransition {
                    workflow: Some(WorkflowState::With(Department::InjectionRoom)),
                    injection_data: Some(injection_data),
                    append_note: Some(note),
                    ..Default::default()
                };
                let updated = workflow::advance_visit(&patient, transition)?;
                self.db.update_patient(&updated)?;
            }
        }
        Ok(())
    }

    fn apply_rejection(&self, claim: &HmoClaim, reason: &str) -> ClaimResult<()> {
        let note = format!("HMO claim rejected: {}", reason);

        match claim.source_department {
            SourceDepartment::Doctor => {
                // The consultation was already paid; the rejection is only
                // recorded on the claim itself.
            }
            SourceDepartment::Pharmacy => {
                self.mark_bill_cancelled(&claim.source_id)?;

                for mut prescription in
                    self.db.list_prescriptions_for_patient(&claim.patient_id)?
                {
                    if prescription.bill_id.as_deref() != Some(claim.source_id.as_str()) {
                        continue;
                    }
                    prescription.status = PrescriptionStatus::Pending;
                    prescription.touch();
                    self.db.update_prescription(&prescription)?;
                }

                self.route_visit(claim, Department::Pharmacy, &note)?;
            }
            SourceDepartment::Laboratory => {
                let mut request = self.db.require_lab_request(&claim.source_id)?;
                request.status = LabStatus::Pending;
                request.touch();
                self.db.update_lab_request(&request)?;

                self.route_visit(claim, Department::Laboratory, &note)?;
            }
            SourceDepartment::InjectionRoom => {
                self.mark_bill_cancelled(&claim.source_id)?;
                self.route_visit(claim, Department::InjectionRoom, &note)?;
            }
        }
        Ok(())
    }

    /// Hand the patient's visit back to a department with a note attached.
    fn route_visit(&self, claim: &HmoClaim, dept: Department, note: &str) -> ClaimResult<()> {
        let patient = self.db.require_patient(&claim.patient_id)?;
        let updated = workflow::advance_visit(
            &patient,
            VisitTransition::to_department(dept).with_note(note),
        )?;
        self.db.update_patient(&updated)?;
        Ok(())
    }

    fn mark_bill_paid(&self, bill_id: &str) -> ClaimResult<()> {
        let mut bill = self.db.require_bill(bill_id)?;
        bill.status = BillStatus::Paid;
        for item in &mut bill.items {
            item.paid = true;
        }
        bill.touch();
        self.db.update_bill(&bill)?;
        Ok(())
    }

    fn mark_bill_cancelled(&self, bill_id: &str) -> ClaimResult<()> {
        let mut bill = self.db.require_bill(bill_id)?;
        bill.status = BillStatus::Cancelled;
        bill.touch();
        self.db.update_bill(&bill)?;
        Ok(())
    }
}
