//! Billing models.

use serde::{Deserialize, Serialize};

/// Payment state tracked per line item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
}

/// Bill lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BillStatus {
    Pending,
    Paid,
    Cancelled,
    /// Awaiting HMO claim decision
    HmoPending,
    Billed,
    Dispensed,
}

/// What the bill is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BillType {
    Consultation,
    Pharmacy,
    Laboratory,
    Medication,
    Deposit,
    Vaccination,
    Other,
}

/// A billing unit for one encounter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bill {
    /// `BILL-<n>` or `BILL-DEP-<n>` identifier
    pub id: String,
    pub patient_id: String,
    pub bill_type: BillType,
    pub status: BillStatus,
    pub items: Vec<BillItem>,
    /// Staff discount percentage, if applied
    pub discount_percent: Option<i64>,
    /// Pre-discount total, recorded when a discount is applied
    pub original_total: Option<i64>,
    /// Staff member who raised the bill
    pub staff_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A single bill line item. Amounts are integer Naira.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BillItem {
    pub description: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub dispensed: bool,
    pub paid: bool,
}

impl BillItem {
    /// Create an undispensed, unpaid item.
    pub fn new(description: String, quantity: i64, unit_price: i64) -> Self {
        Self {
            description,
            quantity,
            unit_price,
            dispensed: false,
            paid: false,
        }
    }
}

impl Bill {
    /// Create a new bill.
    pub fn new(
        id: String,
        patient_id: String,
        bill_type: BillType,
        status: BillStatus,
        items: Vec<BillItem>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id,
            patient_id,
            bill_type,
            status,
            items,
            discount_percent: None,
            original_total: None,
            staff_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Undiscounted total: sum of quantity x unit price.
    pub fn total(&self) -> i64 {
        calculate_total(&self.items)
    }

    /// Payable amount after any staff discount.
    ///
    /// The discount is derived at read time, never stored on the total.
    pub fn discounted_total(&self) -> i64 {
        let total = self.total();
        match self.discount_percent {
            Some(percent) => total - total * percent / 100,
            None => total,
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Sum of quantity x unit price over the items, order-independent.
pub fn calculate_total(items: &[BillItem]) -> i64 {
    items.iter().map(|i| i.quantity * i.unit_price).sum()
}
