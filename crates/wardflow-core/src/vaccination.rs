//! Vaccination station.

use thiserror::Error;

use crate::db::{Database, DbError, StockKind};
use crate::models::{Bill, BillItem, BillStatus, BillType, VaccinationRecord};
use crate::workflow::{self, VisitTransition, WorkflowError};

/// Vaccination errors.
#[derive(Error, Debug)]
pub enum VaccinationError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Vaccine {0} is out of stock")]
    OutOfStock(String),
}

pub type VaccinationResult<T> = Result<T, VaccinationError>;

/// Record an administered dose: one unit off the vaccine shelf, a record on
/// the current visit, and a vaccination bill, all in one transaction. HMO
/// patients are covered at the point of care so their bill is raised paid;
/// cash patients settle theirs at the cash point.
pub fn record_vaccination(
    db: &Database,
    patient_id: &str,
    vaccine_id: &str,
    dose_label: &str,
    staff_id: &str,
) -> VaccinationResult<(VaccinationRecord, Bill)> {
    let tx = db.begin()?;

    let patient = db.require_patient(patient_id)?;
    let vaccine = db.require_vaccine(vaccine_id)?;

    match db.decrement_stock(StockKind::Vaccine, vaccine_id, 1) {
        Ok(()) => {}
        Err(DbError::Constraint(_)) => {
            return Err(VaccinationError::OutOfStock(vaccine.name));
        }
        Err(e) => return Err(e.into()),
    }

    let record = VaccinationRecord {
        vaccine_id: vaccine.id.clone(),
        vaccine_name: vaccine.name.clone(),
        dose_label: dose_label.to_string(),
        administered_by: staff_id.to_string(),
        administered_at: chrono::Utc::now().to_rfc3339(),
    };

    let status = if patient.is_hmo() {
        BillStatus::Paid
    } else {
        BillStatus::Pending
    };
    let mut bill = Bill::new(
        db.next_bill_id()?,
        patient_id.to_string(),
        BillType::Vaccination,
        status,
        vec![BillItem::new(
            format!("{} ({})", vaccine.name, dose_label),
            1,
            vaccine.price,
        )],
    );
    if status == BillStatus::Paid {
        bill.items[0].paid = true;
    }
    db.insert_bill(&bill)?;

    let mut updated = workflow::advance_visit(
        &patient,
        VisitTransition::default().with_note(format!(
            "{} {} given by {}",
            record.vaccine_name, record.dose_label, staff_id
        )),
    )?;
    if let Some(visit) = updated.visits.last_mut() {
        visit.vaccinations.push(record.clone());
    }
    db.update_patient(&updated)?;

    tx.commit().map_err(DbError::from)?;
    log::info!(
        "vaccination {} ({}) recorded for {} by {}",
        record.vaccine_name,
        record.dose_label,
        patient_id,
        staff_id
    );
    Ok((record, bill))
}
