//! Laboratory models.

use serde::{Deserialize, Serialize};

use super::billing::PaymentStatus;

/// Lab request lifecycle.
///
/// `Pending -> Billed -> InProgress -> Completed`; the HMO path can bounce
/// `Billed -> Pending` on claim rejection, or skip `InProgress` gating when
/// a claim approval marks the tests paid directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LabStatus {
    Pending,
    Billed,
    InProgress,
    Completed,
}

/// A laboratory work order for one visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabRequest {
    /// `LAB-REQ-<n>` identifier
    pub id: String,
    pub patient_id: String,
    pub visit_id: String,
    pub status: LabStatus,
    pub tests: Vec<LabTestItem>,
    pub created_at: String,
    pub updated_at: String,
}

impl LabRequest {
    /// Create a pending request.
    pub fn new(id: String, patient_id: String, visit_id: String, tests: Vec<LabTestItem>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            patient_id,
            visit_id,
            status: LabStatus::Pending,
            tests,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// True once every test has been paid for.
    pub fn all_paid(&self) -> bool {
        !self.tests.is_empty()
            && self
                .tests
                .iter()
                .all(|t| t.payment_status == PaymentStatus::Paid)
    }

    /// True once every test carries a result.
    pub fn all_resulted(&self) -> bool {
        !self.tests.is_empty() && self.tests.iter().all(|t| t.has_result())
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// One ordered test with its own payment tracking and result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabTestItem {
    /// Catalog id of the test type
    pub test_id: String,
    pub name: String,
    /// Integer Naira
    pub price: i64,
    pub payment_status: PaymentStatus,
    /// Single free-text result, for tests without structured parameters
    pub result: Option<String>,
    /// Per-analyte results, for panel tests
    pub parameter_results: Vec<ParameterResult>,
}

impl LabTestItem {
    /// Create an unpaid, unresulted test item.
    pub fn new(test_id: String, name: String, price: i64) -> Self {
        Self {
            test_id,
            name,
            price,
            payment_status: PaymentStatus::Pending,
            result: None,
            parameter_results: Vec::new(),
        }
    }

    /// True if either form of result has been entered.
    pub fn has_result(&self) -> bool {
        self.result.is_some() || !self.parameter_results.is_empty()
    }
}

/// A single analyte result with its abnormal flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterResult {
    pub name: String,
    pub value: String,
    pub unit: String,
    /// Reference range as printed on the report, e.g. "4.0-11.0" or "<5"
    pub normal_range: String,
    pub abnormal: bool,
}
