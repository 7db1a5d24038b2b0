//! Billing ledger.
//!
//! Bills are the money side of every encounter: consultations, pharmacy
//! orders, lab work, injections, vaccinations, and retainership deposits.
//! Paying a bill is the hinge of the cash workflow, so [`BillingLedger::pay_bill`]
//! also syncs per-item payment state into the records the bill was raised
//! for and hands the visit to the department that was waiting on payment.

use thiserror::Error;

use crate::claims::{ClaimError, ClaimsDesk};
use crate::db::{Database, DbError};
use crate::models::{
    Bill, BillItem, BillStatus, BillType, LabStatus, PaymentStatus, PrescriptionStatus,
    SourceDepartment,
};
use crate::workflow::{self, Department, VisitTransition, WorkflowError, WorkflowState};

/// Billing errors.
#[derive(Error, Debug)]
pub enum BillingError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("Bill {0} is not payable in status {1}")]
    NotPayable(String, String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type BillingResult<T> = Result<T, BillingError>;

/// The cash point's view of the system.
pub struct BillingLedger<'a> {
    db: &'a Database,
}

impl<'a> BillingLedger<'a> {
    /// Create a new ledger over the database.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert a bill.
    ///
    /// A consultation bill recorded as already paid for an HMO patient gets
    /// its claim raised here, in the same call, so the claim desk never has
    /// to chase it.
    pub fn add_bill(&self, bill: &Bill) -> BillingResult<()> {
        if bill.items.is_empty() {
            return Err(BillingError::InvalidInput(format!(
                "bill {} has no items",
                bill.id
            )));
        }
        self.db.insert_bill(bill)?;
        log::info!(
            "bill {} ({:?}) added for {}: {} naira",
            bill.id,
            bill.bill_type,
            bill.patient_id,
            bill.total()
        );

        if bill.bill_type == BillType::Consultation && bill.status == BillStatus::Paid {
            let patient = self.db.require_patient(&bill.patient_id)?;
            if patient.is_hmo() {
                ClaimsDesk::new(self.db).ensure_claim(
                    &bill.patient_id,
                    SourceDepartment::Doctor,
                    &bill.id,
                )?;
            }
        }
        Ok(())
    }

    /// Full replace of a bill by id.
    pub fn update_bill(&self, bill: &Bill) -> BillingResult<()> {
        if !self.db.update_bill(bill)? {
            return Err(DbError::NotFound(format!("bill {}", bill.id)).into());
        }
        Ok(())
    }

    /// Settle a pending bill at the cash point.
    ///
    /// Marks the bill and its items paid, syncs payment state into the
    /// prescription / lab request / injection record the bill was raised
    /// for, and routes the visit to the department waiting on payment.
    /// All inside one transaction.
    pub fn pay_bill(&self, bill_id: &str, staff_id: &str) -> BillingResult<Bill> {
        let tx = self.db.begin()?;

        let mut bill = self.db.require_bill(bill_id)?;
        if bill.status != BillStatus::Pending {
            return Err(BillingError::NotPayable(
                bill_id.to_string(),
                format!("{:?}", bill.status),
            ));
        }

        bill.status = BillStatus::Paid;
        for item in &mut bill.items {
            item.paid = true;
        }
        bill.staff_id = Some(staff_id.to_string());
        bill.touch();
        self.db.update_bill(&bill)?;
        log::info!(
            "bill {} paid ({} naira) by {}",
            bill.id,
            bill.discounted_total(),
            staff_id
        );

        match bill.bill_type {
            BillType::Pharmacy => self.sync_prescription_payment(&bill)?,
            BillType::Laboratory => self.sync_lab_payment(&bill)?,
            BillType::Medication => self.sync_injection_payment(&bill)?,
            _ => {}
        }

        tx.commit().map_err(DbError::from)?;
        Ok(bill)
    }

    /// Record a retainership deposit: one paid `Deposit` bill plus the
    /// matching balance credit, atomically.
    pub fn create_deposit_bill(
        &self,
        patient_id: &str,
        amount: i64,
        staff_id: &str,
    ) -> BillingResult<Bill> {
        if amount <= 0 {
            return Err(BillingError::InvalidInput(format!(
                "deposit amount must be positive, got {}",
                amount
            )));
        }

        let tx = self.db.begin()?;

        let mut patient = self.db.require_patient(patient_id)?;

        let mut bill = Bill::new(
            self.db.next_deposit_bill_id()?,
            patient_id.to_string(),
            BillType::Deposit,
            BillStatus::Paid,
            vec![BillItem::new("Account deposit".to_string(), 1, amount)],
        );
        bill.items[0].paid = true;
        bill.staff_id = Some(staff_id.to_string());
        self.db.insert_bill(&bill)?;

        patient.balance += amount;
        patient.touch();
        self.db.update_patient(&patient)?;

        tx.commit().map_err(DbError::from)?;
        log::info!(
            "deposit {} of {} naira credited to {} (balance {})",
            bill.id,
            amount,
            patient_id,
            patient.balance
        );
        Ok(bill)
    }

    /// Apply a staff discount to a bill.
    ///
    /// Records the percentage and the pre-discount total; the payable amount
    /// is always derived via `Bill::discounted_total`, never stored.
    pub fn apply_staff_discount(&self, bill_id: &str, percent: i64) -> BillingResult<Bill> {
        if !(0..=100).contains(&percent) {
            return Err(BillingError::InvalidInput(format!(
                "discount percent out of range: {}",
                percent
            )));
        }

        let mut bill = self.db.require_bill(bill_id)?;
        let patient = self.db.require_patient(&bill.patient_id)?;
        if !patient.is_staff {
            return Err(BillingError::InvalidInput(format!(
                "patient {} is not staff",
                patient.id
            )));
        }

        bill.original_total = Some(bill.total());
        bill.discount_percent = Some(percent);
        bill.touch();
        self.db.update_bill(&bill)?;
        Ok(bill)
    }

    /// Pending bills awaiting the cash point, oldest first.
    pub fn pending_bills(&self) -> BillingResult<Vec<Bill>> {
        Ok(self.db.list_bills_by_status(&BillStatus::Pending)?)
    }

    fn sync_prescription_payment(&self, bill: &Bill) -> BillingResult<()> {
        for mut prescription in self.db.list_prescriptions_for_patient(&bill.patient_id)? {
            if prescription.bill_id.as_deref() != Some(bill.id.as_str()) {
                continue;
            }
            prescription.status = PrescriptionStatus::Paid;
            for item in &mut prescription.items {
                if !item.injectable {
                    item.payment_status = PaymentStatus::Paid;
                }
            }
            prescription.touch();
            self.db.update_prescription(&prescription)?;
        }
        self.route_current_visit(&bill.patient_id, Department::Pharmacy)
    }

    fn sync_lab_payment(&self, bill: &Bill) -> BillingResult<()> {
        // The laboratory bill carries one line item per requested test,
        // matched back by test name against the patient's billed requests.
        for mut request in self.db.list_lab_requests_for_patient(&bill.patient_id)? {
            if request.status != LabStatus::Billed {
                continue;
            }
            let mut changed = false;
            for test in &mut request.tests {
                if bill.items.iter().any(|i| i.description == test.name) {
                    test.payment_status = PaymentStatus::Paid;
                    changed = true;
                }
            }
            if changed {
                request.touch();
                self.db.update_lab_request(&request)?;
            }
        }
        self.route_current_visit(&bill.patient_id, Department::Laboratory)
    }

    fn sync_injection_payment(&self, bill: &Bill) -> BillingResult<()> {
        let patient = self.db.require_patient(&bill.patient_id)?;
        let mut injection_data = patient
            .current_visit()
            .and_then(|v| v.injection_data.clone())
            .unwrap_or_default();
        for injection in &mut injection_data.injections {
            if injection.bill_id.as_deref() == Some(bill.id.as_str()) {
                injection.payment_status = PaymentStatus::Paid;
            }
        }

        let transition = VisitTransition {
            workflow: Some(WorkflowState::With(Department::InjectionRoom)),
            injection_data: Some(injection_data),
            ..Default::default()
        };
        let updated = workflow::advance_visit(&patient, transition)?;
        self.db.update_patient(&updated)?;
        Ok(())
    }

    fn route_current_visit(&self, patient_id: &str, dept: Department) -> BillingResult<()> {
        let patient = self.db.require_patient(patient_id)?;
        if patient.current_visit().is_none() {
            // Walk-in sale with no open encounter; nothing to route.
            return Ok(());
        }
        let updated = workflow::advance_visit(&patient, VisitTransition::to_department(dept))?;
        self.db.update_patient(&updated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabRequest, LabTestItem, Patient, PatientType, Visit};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let mut patient = Patient::new("P-1".into(), "Ada".into(), PatientType::Cash);
        patient.visits.push(Visit::new("Malaria".into()));
        db.insert_patient(&patient).unwrap();
        db
    }

    #[test]
    fn test_add_bill_rejects_empty() {
        let db = setup_db();
        let ledger = BillingLedger::new(&db);
        let bill = Bill::new(
            db.next_bill_id().unwrap(),
            "P-1".into(),
            BillType::Other,
            BillStatus::Pending,
            vec![],
        );
        assert!(matches!(
            ledger.add_bill(&bill),
            Err(BillingError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_paid_hmo_consultation_raises_claim() {
        let db = setup_db();
        let mut hmo = Patient::new(
            "P-2".into(),
            "Bola".into(),
            PatientType::Hmo {
                provider_id: "PROV-1".into(),
            },
        );
        hmo.visits.push(Visit::new("Checkup".into()));
        db.insert_patient(&hmo).unwrap();

        let ledger = BillingLedger::new(&db);
        let bill = Bill::new(
            db.next_bill_id().unwrap(),
            "P-2".into(),
            BillType::Consultation,
            BillStatus::Paid,
            vec![BillItem::new("Consultation".into(), 1, 2000)],
        );
        ledger.add_bill(&bill).unwrap();

        assert_eq!(db.count_claims().unwrap(), 1);
        // Re-adding the same source never duplicates
        assert!(db
            .claim_exists_for_source(SourceDepartment::Doctor, &bill.id)
            .unwrap());
    }

    #[test]
    fn test_pay_bill_requires_pending() {
        let db = setup_db();
        let ledger = BillingLedger::new(&db);
        let bill = Bill::new(
            db.next_bill_id().unwrap(),
            "P-1".into(),
            BillType::Other,
            BillStatus::Paid,
            vec![BillItem::new("Sundry".into(), 1, 100)],
        );
        ledger.add_bill(&bill).unwrap();

        let result = ledger.pay_bill(&bill.id, "STAFF-1");
        assert!(matches!(result, Err(BillingError::NotPayable(_, _))));
    }

    #[test]
    fn test_pay_lab_bill_syncs_tests_and_routes_visit() {
        let db = setup_db();
        let mut request = LabRequest::new(
            db.next_lab_request_id().unwrap(),
            "P-1".into(),
            "visit-1".into(),
            vec![
                LabTestItem::new("LT-1".into(), "Widal".into(), 1500),
                LabTestItem::new("LT-2".into(), "FBC".into(), 2500),
            ],
        );
        request.status = LabStatus::Billed;
        db.insert_lab_request(&request).unwrap();

        let ledger = BillingLedger::new(&db);
        let bill = Bill::new(
            db.next_bill_id().unwrap(),
            "P-1".into(),
            BillType::Laboratory,
            BillStatus::Pending,
            vec![
                BillItem::new("Widal".into(), 1, 1500),
                BillItem::new("FBC".into(), 1, 2500),
            ],
        );
        ledger.add_bill(&bill).unwrap();
        ledger.pay_bill(&bill.id, "STAFF-1").unwrap();

        let request = db.require_lab_request(&request.id).unwrap();
        assert!(request.all_paid());

        let patient = db.require_patient("P-1").unwrap();
        assert!(patient
            .current_visit()
            .unwrap()
            .workflow
            .is_with(Department::Laboratory));
    }

    #[test]
    fn test_deposit_is_atomic_and_credits_balance() {
        let db = setup_db();
        let ledger = BillingLedger::new(&db);

        let bill = ledger.create_deposit_bill("P-1", 10_000, "STAFF-1").unwrap();
        assert!(bill.id.starts_with("BILL-DEP-"));
        assert_eq!(bill.status, BillStatus::Paid);
        assert_eq!(bill.total(), 10_000);

        let patient = db.require_patient("P-1").unwrap();
        assert_eq!(patient.balance, 10_000);
    }

    #[test]
    fn test_deposit_for_missing_patient_leaves_no_bill() {
        let db = setup_db();
        let ledger = BillingLedger::new(&db);

        let result = ledger.create_deposit_bill("P-99", 5_000, "STAFF-1");
        assert!(result.is_err());
        assert!(db.list_bills_by_status(&BillStatus::Paid).unwrap().is_empty());
    }

    #[test]
    fn test_deposit_rejects_non_positive() {
        let db = setup_db();
        let ledger = BillingLedger::new(&db);
        assert!(ledger.create_deposit_bill("P-1", 0, "STAFF-1").is_err());
        assert!(ledger.create_deposit_bill("P-1", -50, "STAFF-1").is_err());
    }

    #[test]
    fn test_staff_discount() {
        let db = setup_db();
        let mut staff_patient = Patient::new("P-3".into(), "Ngozi".into(), PatientType::Cash);
        staff_patient.is_staff = true;
        db.insert_patient(&staff_patient).unwrap();

        let ledger = BillingLedger::new(&db);
        let bill = Bill::new(
            db.next_bill_id().unwrap(),
            "P-3".into(),
            BillType::Pharmacy,
            BillStatus::Pending,
            vec![BillItem::new("Paracetamol".into(), 2, 500)],
        );
        ledger.add_bill(&bill).unwrap();

        let discounted = ledger.apply_staff_discount(&bill.id, 20).unwrap();
        assert_eq!(discounted.original_total, Some(1000));
        assert_eq!(discounted.discounted_total(), 800);
    }

    #[test]
    fn test_staff_discount_rejected_for_non_staff() {
        let db = setup_db();
        let ledger = BillingLedger::new(&db);
        let bill = Bill::new(
            db.next_bill_id().unwrap(),
            "P-1".into(),
            BillType::Pharmacy,
            BillStatus::Pending,
            vec![BillItem::new("Paracetamol".into(), 1, 500)],
        );
        ledger.add_bill(&bill).unwrap();

        assert!(ledger.apply_staff_discount(&bill.id, 20).is_err());
    }
}
