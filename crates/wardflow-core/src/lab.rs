//! Laboratory workflow.
//!
//! A request moves `Pending -> Billed -> InProgress -> Completed`. Cash
//! patients detour through the cash point; HMO patients go straight to the
//! claims desk. Completion copies the results onto the visit and hands the
//! patient back to the doctor's queue.

use thiserror::Error;

use crate::claims::{ClaimError, ClaimsDesk};
use crate::db::{Database, DbError};
use crate::models::{
    Bill, BillItem, BillStatus, BillType, LabRequest, LabStatus, LabSummary, LabTestItem,
    ParameterResult, SourceDepartment,
};
use crate::workflow::{self, Department, VisitTransition, WorkflowError, WorkflowState};

/// Laboratory errors.
#[derive(Error, Debug)]
pub enum LabError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Claim(#[from] ClaimError),

    #[error("Request {0} is in status {1}, expected {2}")]
    WrongStatus(String, String, String),

    #[error("Request {0} has unpaid tests")]
    UnpaidTests(String),

    #[error("Test {0} not found on request {1}")]
    TestNotFound(String, String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type LabResult<T> = Result<T, LabError>;

/// The laboratory bench.
pub struct LabBench<'a> {
    db: &'a Database,
}

impl<'a> LabBench<'a> {
    /// Create a new bench over the database.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Raise a lab request for the patient's current visit.
    ///
    /// Tests are priced from the lab-test catalog. Cash patients wait for
    /// `send_to_cash_point`; HMO patients skip the cash point entirely: the
    /// request is billed to the provider, a claim goes up immediately, and
    /// the visit moves to the HMO desk.
    pub fn add_request(&self, patient_id: &str, test_type_ids: &[String]) -> LabResult<LabRequest> {
        if test_type_ids.is_empty() {
            return Err(LabError::InvalidInput("no tests requested".to_string()));
        }

        let patient = self.db.require_patient(patient_id)?;
        let visit_id = patient
            .current_visit()
            .map(|v| v.visit_id.clone())
            .ok_or(WorkflowError::NoVisits(patient_id.to_string()))?;

        let mut tests = Vec::with_capacity(test_type_ids.len());
        for type_id in test_type_ids {
            let test_type = self.db.require_lab_test_type(type_id)?;
            tests.push(LabTestItem::new(
                test_type.id,
                test_type.name,
                test_type.price,
            ));
        }

        let mut request = LabRequest::new(
            self.db.next_lab_request_id()?,
            patient_id.to_string(),
            visit_id,
            tests,
        );

        if patient.is_hmo() {
            request.status = LabStatus::Billed;
            self.db.insert_lab_request(&request)?;

            ClaimsDesk::new(self.db).ensure_claim(
                patient_id,
                SourceDepartment::Laboratory,
                &request.id,
            )?;
            let updated =
                workflow::advance_visit(&patient, VisitTransition::to_department(Department::Hmo))?;
            self.db.update_patient(&updated)?;
        } else {
            self.db.insert_lab_request(&request)?;
        }

        log::info!(
            "lab request {} raised for {} ({} test(s))",
            request.id,
            patient_id,
            request.tests.len()
        );
        Ok(request)
    }

    /// Cash path: raise the laboratory bill and send the patient to pay.
    pub fn send_to_cash_point(&self, request_id: &str) -> LabResult<Bill> {
        let tx = self.db.begin()?;

        let mut request = self.db.require_lab_request(request_id)?;
        if request.status != LabStatus::Pending {
            return Err(LabError::WrongStatus(
                request_id.to_string(),
                format!("{:?}", request.status),
                "Pending".to_string(),
            ));
        }

        let items = request
            .tests
            .iter()
            .map(|t| BillItem::new(t.name.clone(), 1, t.price))
            .collect();
        let bill = Bill::new(
            self.db.next_bill_id()?,
            request.patient_id.clone(),
            BillType::Laboratory,
            BillStatus::Pending,
            items,
        );
        self.db.insert_bill(&bill)?;

        request.status = LabStatus::Billed;
        request.touch();
        self.db.update_lab_request(&request)?;

        let patient = self.db.require_patient(&request.patient_id)?;
        let updated =
            workflow::advance_visit(&patient, VisitTransition::to_department(Department::CashPoint))?;
        self.db.update_patient(&updated)?;

        tx.commit().map_err(DbError::from)?;
        Ok(bill)
    }

    /// Begin bench work. Every test must be paid first.
    pub fn start_tests(&self, request_id: &str) -> LabResult<LabRequest> {
        let mut request = self.db.require_lab_request(request_id)?;
        if request.status != LabStatus::Billed {
            return Err(LabError::WrongStatus(
                request_id.to_string(),
                format!("{:?}", request.status),
                "Billed".to_string(),
            ));
        }
        if !request.all_paid() {
            return Err(LabError::UnpaidTests(request_id.to_string()));
        }

        request.status = LabStatus::InProgress;
        request.touch();
        self.db.update_lab_request(&request)?;
        Ok(request)
    }

    /// Record a free-text result for one test.
    pub fn record_result(&self, request_id: &str, test_id: &str, result: &str) -> LabResult<()> {
        let mut request = self.db.require_lab_request(request_id)?;
        let test = find_test(&mut request, request_id, test_id)?;
        test.result = Some(result.to_string());
        request.touch();
        self.db.update_lab_request(&request)?;
        Ok(())
    }

    /// Record per-parameter values for one test.
    ///
    /// Units and normal ranges come from the test-type catalog; each value
    /// gets an abnormality flag from `is_abnormal_value`.
    pub fn record_parameter_results(
        &self,
        request_id: &str,
        test_id: &str,
        values: &[(String, String)],
    ) -> LabResult<()> {
        let test_type = self.db.require_lab_test_type(test_id)?;

        let mut request = self.db.require_lab_request(request_id)?;
        let test = find_test(&mut request, request_id, test_id)?;

        let mut results = Vec::with_capacity(values.len());
        for (name, value) in values {
            let parameter = test_type.parameters.iter().find(|p| &p.name == name);
            let unit = parameter.map(|p| p.unit.clone()).unwrap_or_default();
            let normal_range = parameter.map(|p| p.normal_range.clone()).unwrap_or_default();
            let abnormal = is_abnormal_value(value, &normal_range);
            results.push(ParameterResult {
                name: name.clone(),
                value: value.clone(),
                unit,
                normal_range,
                abnormal,
            });
        }
        test.parameter_results = results;
        test.result = Some("See parameters".to_string());

        request.touch();
        self.db.update_lab_request(&request)?;
        Ok(())
    }

    /// Finish the request and cascade results back into the visit.
    ///
    /// The visit gets a `lab_summary` copy of the results, and if it was
    /// still parked with the laboratory or the HMO desk it returns to the
    /// doctor's queue.
    pub fn complete_request(&self, request_id: &str) -> LabResult<LabRequest> {
        let tx = self.db.begin()?;

        let mut request = self.db.require_lab_request(request_id)?;
        if request.status != LabStatus::InProgress {
            return Err(LabError::WrongStatus(
                request_id.to_string(),
                format!("{:?}", request.status),
                "InProgress".to_string(),
            ));
        }
        if !request.all_resulted() {
            return Err(LabError::InvalidInput(format!(
                "request {} has tests without results",
                request_id
            )));
        }

        request.status = LabStatus::Completed;
        request.touch();
        self.db.update_lab_request(&request)?;

        let patient = self.db.require_patient(&request.patient_id)?;
        let back_to_doctor = patient.current_visit().is_some_and(|v| {
            v.workflow.is_with(Department::Laboratory) || v.workflow.is_with(Department::Hmo)
        });

        let transition = VisitTransition {
            workflow: back_to_doctor.then_some(WorkflowState::Pending),
            lab_summary: Some(LabSummary {
                request_id: request.id.clone(),
                tests: request.tests.clone(),
            }),
            append_note: Some(format!("Lab results ready ({})", request.id)),
            ..Default::default()
        };
        let updated = workflow::advance_visit(&patient, transition)?;
        self.db.update_patient(&updated)?;

        tx.commit().map_err(DbError::from)?;
        log::info!("lab request {} completed", request.id);
        Ok(request)
    }

    /// Requests waiting on the bench, oldest first.
    pub fn worklist(&self) -> LabResult<Vec<LabRequest>> {
        let mut requests = self.db.list_lab_requests_by_status(&LabStatus::Billed)?;
        requests.extend(self.db.list_lab_requests_by_status(&LabStatus::InProgress)?);
        Ok(requests)
    }
}

fn find_test<'r>(
    request: &'r mut LabRequest,
    request_id: &str,
    test_id: &str,
) -> LabResult<&'r mut LabTestItem> {
    request
        .tests
        .iter_mut()
        .find(|t| t.test_id == test_id)
        .ok_or_else(|| LabError::TestNotFound(test_id.to_string(), request_id.to_string()))
}

/// Decide whether a measured value falls outside its normal range.
///
/// Understands `"a-b"` ranges and one-sided `"<x"` / `">x"` bounds. Anything
/// unparseable on either side (qualitative values like "Positive", ranges
/// with commas) is treated as not abnormal; flagging is advisory, the
/// clinician reads the actual numbers.
pub fn is_abnormal_value(value: &str, normal_range: &str) -> bool {
    let Ok(value) = value.trim().parse::<f64>() else {
        return false;
    };
    let range = normal_range.trim();

    if let Some(upper) = range.strip_prefix('<') {
        return match upper.trim().parse::<f64>() {
            Ok(upper) => value >= upper,
            Err(_) => false,
        };
    }
    if let Some(lower) = range.strip_prefix('>') {
        return match lower.trim().parse::<f64>() {
            Ok(lower) => value <= lower,
            Err(_) => false,
        };
    }
    if let Some((low, high)) = range.split_once('-') {
        if let (Ok(low), Ok(high)) = (low.trim().parse::<f64>(), high.trim().parse::<f64>()) {
            return value < low || value > high;
        }
    }
    false
}
