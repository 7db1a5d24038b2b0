//! Pharmacy prescription models.

use serde::{Deserialize, Serialize};

use super::billing::PaymentStatus;

/// Prescription lifecycle.
///
/// Cash path: `Pending -> Billed -> Paid -> Dispensed`.
/// HMO path: `Pending -> HmoPending -> HmoApproved -> Dispensed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PrescriptionStatus {
    Pending,
    Billed,
    HmoPending,
    Paid,
    HmoApproved,
    Dispensed,
}

/// A doctor's prescription for one visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    /// `PRES-<n>` identifier
    pub id: String,
    pub patient_id: String,
    pub visit_id: String,
    pub status: PrescriptionStatus,
    pub items: Vec<PrescriptionItem>,
    /// Set once injectables have been split out; the split is irreversible
    pub injectables_split: bool,
    /// Weak back-reference to the pharmacy bill raised for the oral items
    pub bill_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Prescription {
    /// Create a pending prescription.
    pub fn new(
        id: String,
        patient_id: String,
        visit_id: String,
        items: Vec<PrescriptionItem>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            patient_id,
            visit_id,
            status: PrescriptionStatus::Pending,
            items,
            injectables_split: false,
            bill_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// True if editing is still allowed.
    pub fn editable(&self) -> bool {
        !self.injectables_split && self.status == PrescriptionStatus::Pending
    }

    /// Non-injectable items (stay on the pharmacy bill).
    pub fn oral_items(&self) -> impl Iterator<Item = &PrescriptionItem> {
        self.items.iter().filter(|i| !i.injectable)
    }

    /// Injectable items (extracted to the injection room at billing time).
    pub fn injectable_items(&self) -> impl Iterator<Item = &PrescriptionItem> {
        self.items.iter().filter(|i| i.injectable)
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// One prescribed medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionItem {
    pub medicine_id: String,
    pub name: String,
    pub quantity: i64,
    /// Integer Naira
    pub unit_price: i64,
    pub injectable: bool,
    /// Consumable used during administration, if any
    pub consumable_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub dispensed: bool,
}

impl PrescriptionItem {
    /// Create an unpaid, undispensed item.
    pub fn new(medicine_id: String, name: String, quantity: i64, unit_price: i64) -> Self {
        Self {
            medicine_id,
            name,
            quantity,
            unit_price,
            injectable: false,
            consumable_id: None,
            payment_status: PaymentStatus::Pending,
            dispensed: false,
        }
    }
}
