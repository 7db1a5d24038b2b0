//! HMO claim models.
//!
//! Claims are derived records: every claim item mirrors a line item that
//! already exists in a bill, lab request, or injection record. The claim id
//! is a deterministic function of the source, so at most one claim can ever
//! exist per `(source_department, source_id)` pair.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which authoritative record a claim mirrors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SourceDepartment {
    /// Consultation bill
    Doctor,
    /// Prescription / pharmacy bill
    Pharmacy,
    /// Lab request
    Laboratory,
    /// Injection record
    InjectionRoom,
}

impl SourceDepartment {
    /// Short code used in claim ids and the database.
    pub fn code(&self) -> &'static str {
        match self {
            SourceDepartment::Doctor => "DOC",
            SourceDepartment::Pharmacy => "PHA",
            SourceDepartment::Laboratory => "LAB",
            SourceDepartment::InjectionRoom => "INJ",
        }
    }

    /// Parse a stored code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "DOC" => Some(SourceDepartment::Doctor),
            "PHA" => Some(SourceDepartment::Pharmacy),
            "LAB" => Some(SourceDepartment::Laboratory),
            "INJ" => Some(SourceDepartment::InjectionRoom),
            _ => None,
        }
    }
}

/// Claim lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimStatus {
    Pending,
    Completed,
    Rejected,
}

/// A claim submitted to an HMO provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HmoClaim {
    /// `HMO-<dept>-<digest>` deterministic identifier
    pub id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub source_department: SourceDepartment,
    pub source_id: String,
    pub status: ClaimStatus,
    pub items: Vec<ClaimItem>,
    /// Approval code supplied by the HMO desk
    pub approval_code: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl HmoClaim {
    /// Create a pending claim for a source record.
    pub fn new(
        patient_id: String,
        provider_id: String,
        source_department: SourceDepartment,
        source_id: String,
        items: Vec<ClaimItem>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: claim_id(source_department, &source_id),
            patient_id,
            provider_id,
            source_department,
            source_id,
            status: ClaimStatus::Pending,
            items,
            approval_code: None,
            rejection_reason: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Claimed amount: sum of quantity x unit price, integer Naira.
    pub fn total(&self) -> i64 {
        self.items.iter().map(|i| i.quantity * i.unit_price).sum()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// A claim line item, copied verbatim from its source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimItem {
    pub description: String,
    pub quantity: i64,
    /// Copied from the source; no rounding or conversion
    pub unit_price: i64,
    /// Back-reference to the record the item was projected from
    pub source_department: SourceDepartment,
    pub source_id: String,
}

/// Deterministic claim id for a source record.
///
/// SHA-256 of `<dept code>:<source id>`, truncated to 12 hex chars. The same
/// source always maps to the same id, which is what makes the reconciliation
/// sweep idempotent.
pub fn claim_id(department: SourceDepartment, source_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(department.code().as_bytes());
    hasher.update(b":");
    hasher.update(source_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("HMO-{}-{}", department.code(), &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_id_deterministic() {
        let a = claim_id(SourceDepartment::Laboratory, "LAB-REQ-7");
        let b = claim_id(SourceDepartment::Laboratory, "LAB-REQ-7");
        assert_eq!(a, b);
        assert!(a.starts_with("HMO-LAB-"));
    }

    #[test]
    fn test_claim_id_distinguishes_departments() {
        let lab = claim_id(SourceDepartment::Laboratory, "X-1");
        let pha = claim_id(SourceDepartment::Pharmacy, "X-1");
        assert_ne!(lab, pha);
    }

    #[test]
    fn test_claim_total_copies_source_amounts() {
        let claim = HmoClaim::new(
            "P-1".into(),
            "HMO-PROV-1".into(),
            SourceDepartment::Pharmacy,
            "BILL-3".into(),
            vec![
                ClaimItem {
                    description: "Paracetamol".into(),
                    quantity: 2,
                    unit_price: 500,
                    source_department: SourceDepartment::Pharmacy,
                    source_id: "BILL-3".into(),
                },
                ClaimItem {
                    description: "Amoxicillin".into(),
                    quantity: 1,
                    unit_price: 1200,
                    source_department: SourceDepartment::Pharmacy,
                    source_id: "BILL-3".into(),
                },
            ],
        );
        assert_eq!(claim.total(), 2200);
        assert_eq!(claim.status, ClaimStatus::Pending);
    }

    #[test]
    fn test_source_department_code_round_trip() {
        for dept in [
            SourceDepartment::Doctor,
            SourceDepartment::Pharmacy,
            SourceDepartment::Laboratory,
            SourceDepartment::InjectionRoom,
        ] {
            assert_eq!(SourceDepartment::from_code(dept.code()), Some(dept));
        }
        assert_eq!(SourceDepartment::from_code("XYZ"), None);
    }
}
