//! Pharmacy desk.
//!
//! Prescriptions are editable until sent to billing. Billing splits the
//! order in two: oral items stay on a `Pharmacy` bill for the counter,
//! injectables move onto the visit as an injection record with their own
//! `Medication` bill for the injection room. The split is irreversible.
//! Dispensing is all-or-nothing against stock.

use thiserror::Error;

use crate::claims::{ClaimError, ClaimsDesk};
use crate::db::{Database, DbError, StockKind};
use crate::models::{
    Bill, BillItem, BillStatus, BillType, Injection, InjectionData, PaymentStatus, Prescription,
    PrescriptionItem, PrescriptionStatus, SourceDepartment,
};
use crate::workflow::{self, Department, VisitTransition, WorkflowError, WorkflowState};

/// Pharmacy errors.
#[derive(Error, Debug)]
pub enum DispenseError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("Prescription {0} can no longer be edited")]
    NotEditable(String),

    #[error("Prescription {0} is in status {1}, expected {2}")]
    WrongStatus(String, String, String),

    #[error("Insufficient stock of {name}: need {needed}")]
    InsufficientStock { name: String, needed: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type PharmacyResult<T> = Result<T, DispenseError>;

/// The pharmacy counter.
pub struct PharmacyDesk<'a> {
    db: &'a Database,
}

impl<'a> PharmacyDesk<'a> {
    /// Create a new desk over the database.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Write a prescription against the patient's current visit.
    ///
    /// Prices and injectability come from the medicine catalog, not the
    /// caller.
    pub fn create_prescription(
        &self,
        patient_id: &str,
        orders: &[(String, i64)],
    ) -> PharmacyResult<Prescription> {
        if orders.is_empty() {
            return Err(DispenseError::InvalidInput(
                "prescription has no items".to_string(),
            ));
        }

        let patient = self.db.require_patient(patient_id)?;
        let visit_id = patient
            .current_visit()
            .map(|v| v.visit_id.clone())
            .ok_or(WorkflowError::NoVisits(patient_id.to_string()))?;

        let mut items = Vec::with_capacity(orders.len());
        for (medicine_id, quantity) in orders {
            if *quantity <= 0 {
                return Err(DispenseError::InvalidInput(format!(
                    "quantity for {} must be positive",
                    medicine_id
                )));
            }
            let medicine = self.db.require_medicine(medicine_id)?;
            let mut item = PrescriptionItem::new(
                medicine.id,
                medicine.name,
                *quantity,
                medicine.price,
            );
            item.injectable = medicine.injectable;
            items.push(item);
        }

        let prescription = Prescription::new(
            self.db.next_prescription_id()?,
            patient_id.to_string(),
            visit_id,
            items,
        );
        self.db.insert_prescription(&prescription)?;
        log::info!(
            "prescription {} written for {} ({} item(s))",
            prescription.id,
            patient_id,
            prescription.items.len()
        );
        Ok(prescription)
    }

    /// Replace a prescription's items while it is still editable.
    pub fn update_prescription(
        &self,
        prescription_id: &str,
        items: Vec<PrescriptionItem>,
    ) -> PharmacyResult<Prescription> {
        let mut prescription = self.db.require_prescription(prescription_id)?;
        if !prescription.editable() {
            return Err(DispenseError::NotEditable(prescription_id.to_string()));
        }
        prescription.items = items;
        prescription.touch();
        self.db.update_prescription(&prescription)?;
        Ok(prescription)
    }

    /// Send a pending prescription to billing.
    ///
    /// Oral items go on a `Pharmacy` bill; injectables are split out onto
    /// the visit as an injection record with a `Medication` bill of their
    /// own. Cash patients head to the cash point; HMO patients head to the
    /// HMO desk with claims already raised.
    pub fn send_to_billing(&self, prescription_id: &str) -> PharmacyResult<Prescription> {
        let tx = self.db.begin()?;

        let mut prescription = self.db.require_prescription(prescription_id)?;
        if prescription.status != PrescriptionStatus::Pending {
            return Err(DispenseError::WrongStatus(
                prescription_id.to_string(),
                format!("{:?}", prescription.status),
                "Pending".to_string(),
            ));
        }

        let patient = self.db.require_patient(&prescription.patient_id)?;
        let is_hmo = patient.is_hmo();
        let bill_status = if is_hmo {
            BillStatus::HmoPending
        } else {
            BillStatus::Pending
        };

        let pharmacy_bill = self.raise_oral_bill(&prescription, bill_status)?;
        let medication_bill = self.raise_injectable_bill(&prescription, bill_status)?;

        if let Some(bill) = &medication_bill {
            prescription.injectables_split = true;
            self.attach_injections_to_visit(&prescription, bill)?;
        }

        prescription.bill_id = pharmacy_bill.as_ref().map(|b| b.id.clone());
        prescription.status = if is_hmo {
            PrescriptionStatus::HmoPending
        } else {
            PrescriptionStatus::Billed
        };
        prescription.touch();
        self.db.update_prescription(&prescription)?;

        if is_hmo {
            let desk = ClaimsDesk::new(self.db);
            if let Some(bill) = &pharmacy_bill {
                desk.ensure_claim(&prescription.patient_id, SourceDepartment::Pharmacy, &bill.id)?;
            }
            if let Some(bill) = &medication_bill {
                desk.ensure_claim(
                    &prescription.patient_id,
                    SourceDepartment::InjectionRoom,
                    &bill.id,
                )?;
            }
        }

        let dept = if is_hmo {
            Department::Hmo
        } else {
            Department::CashPoint
        };
        let patient = self.db.require_patient(&prescription.patient_id)?;
        let updated = workflow::advance_visit(&patient, VisitTransition::to_department(dept))?;
        self.db.update_patient(&updated)?;

        tx.commit().map_err(DbError::from)?;
        Ok(prescription)
    }

    /// Hand over the paid oral items.
    ///
    /// All-or-nothing: stock is checked and decremented for every item (and
    /// its consumable) inside one transaction; the first shortage aborts the
    /// whole dispense with stock untouched.
    pub fn dispense(&self, prescription_id: &str) -> PharmacyResult<Prescription> {
        let tx = self.db.begin()?;

        let mut prescription = self.db.require_prescription(prescription_id)?;
        match prescription.status {
            PrescriptionStatus::Paid | PrescriptionStatus::HmoApproved => {}
            other => {
                return Err(DispenseError::WrongStatus(
                    prescription_id.to_string(),
                    format!("{:?}", other),
                    "Paid or HmoApproved".to_string(),
                ));
            }
        }

        for item in &mut prescription.items {
            if item.injectable {
                continue;
            }
            self.take_stock(StockKind::Medicine, &item.medicine_id, &item.name, item.quantity)?;
            if let Some(consumable_id) = &item.consumable_id {
                self.take_stock(StockKind::Consumable, consumable_id, consumable_id, item.quantity)?;
            }
            item.dispensed = true;
        }

        prescription.status = PrescriptionStatus::Dispensed;
        prescription.touch();
        self.db.update_prescription(&prescription)?;

        if let Some(bill_id) = &prescription.bill_id {
            let mut bill = self.db.require_bill(bill_id)?;
            bill.status = BillStatus::Dispensed;
            for item in &mut bill.items {
                item.dispensed = true;
            }
            bill.touch();
            self.db.update_bill(&bill)?;
        }

        self.finish_visit_if_done(&prescription)?;

        tx.commit().map_err(DbError::from)?;
        log::info!("prescription {} dispensed", prescription.id);
        Ok(prescription)
    }

    /// Prescriptions cleared for the counter.
    pub fn dispensable(&self) -> PharmacyResult<Vec<Prescription>> {
        let mut ready = self
            .db
            .list_prescriptions_by_status(&PrescriptionStatus::Paid)?;
        ready.extend(
            self.db
                .list_prescriptions_by_status(&PrescriptionStatus::HmoApproved)?,
        );
        Ok(ready)
    }

    fn raise_oral_bill(
        &self,
        prescription: &Prescription,
        status: BillStatus,
    ) -> PharmacyResult<Option<Bill>> {
        let items: Vec<BillItem> = prescription
            .oral_items()
            .map(|i| BillItem::new(i.name.clone(), i.quantity, i.unit_price))
            .collect();
        if items.is_empty() {
            return Ok(None);
        }
        let bill = Bill::new(
            self.db.next_bill_id()?,
            prescription.patient_id.clone(),
            BillType::Pharmacy,
            status,
            items,
        );
        self.db.insert_bill(&bill)?;
        Ok(Some(bill))
    }

    fn raise_injectable_bill(
        &self,
        prescription: &Prescription,
        status: BillStatus,
    ) -> PharmacyResult<Option<Bill>> {
        let items: Vec<BillItem> = prescription
            .injectable_items()
            .map(|i| BillItem::new(i.name.clone(), i.quantity, i.unit_price))
            .collect();
        if items.is_empty() {
            return Ok(None);
        }
        let bill = Bill::new(
            self.db.next_bill_id()?,
            prescription.patient_id.clone(),
            BillType::Medication,
            status,
            items,
        );
        self.db.insert_bill(&bill)?;
        Ok(Some(bill))
    }

    fn attach_injections_to_visit(
        &self,
        prescription: &Prescription,
        medication_bill: &Bill,
    ) -> PharmacyResult<()> {
        let injections = prescription
            .injectable_items()
            .map(|i| Injection {
                medicine_id: i.medicine_id.clone(),
                name: i.name.clone(),
                quantity: i.quantity,
                unit_price: i.unit_price,
                payment_status: PaymentStatus::Pending,
                administered: false,
                saved: false,
                bill_id: Some(medication_bill.id.clone()),
            })
            .collect();

        let patient = self.db.require_patient(&prescription.patient_id)?;
        let transition = VisitTransition {
            injection_data: Some(InjectionData {
                injections,
                completed: false,
            }),
            ..Default::default()
        };
        let updated = workflow::advance_visit(&patient, transition)?;
        self.db.update_patient(&updated)?;
        Ok(())
    }

    fn take_stock(
        &self,
        kind: StockKind,
        id: &str,
        name: &str,
        quantity: i64,
    ) -> PharmacyResult<()> {
        match self.db.decrement_stock(kind, id, quantity) {
            Ok(()) => Ok(()),
            Err(DbError::Constraint(_)) => Err(DispenseError::InsufficientStock {
                name: name.to_string(),
                needed: quantity,
            }),
            Err(e) => Err(e.into()),
        }
    }

    // The counter is the last stop for oral-only orders; orders with
    // injectables stay open until the injection room finishes.
    fn finish_visit_if_done(&self, prescription: &Prescription) -> PharmacyResult<()> {
        let patient = self.db.require_patient(&prescription.patient_id)?;
        let Some(visit) = patient.current_visit() else {
            return Ok(());
        };

        let injections_outstanding = visit
            .injection_data
            .as_ref()
            .is_some_and(|d| !d.completed && !d.injections.is_empty());

        let transition = if injections_outstanding {
            VisitTransition::default().with_note(format!("Dispensed {}", prescription.id))
        } else {
            VisitTransition::to_state(WorkflowState::Completed)
                .with_note(format!("Dispensed {}", prescription.id))
        };
        let updated = workflow::advance_visit(&patient, transition)?;
        self.db.update_patient(&updated)?;
        Ok(())
    }
}
