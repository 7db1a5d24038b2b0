//! Catalog and directory models.
//!
//! Stock-bearing items (medicines, consumables, vaccines) share a shape:
//! integer Naira price, integer stock, soft delete via `active`.

use serde::{Deserialize, Serialize};

/// A dispensable medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Medicine {
    pub id: String,
    pub name: String,
    /// Integer Naira
    pub price: i64,
    pub stock: i64,
    pub injectable: bool,
    pub active: bool,
}

impl Medicine {
    /// Create an active medicine.
    pub fn new(id: String, name: String, price: i64, stock: i64) -> Self {
        Self {
            id,
            name,
            price,
            stock,
            injectable: false,
            active: true,
        }
    }
}

/// A consumable used during administration (syringes, swabs, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Consumable {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub stock: i64,
    pub active: bool,
}

/// A vaccine dose in stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vaccine {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub stock: i64,
    pub active: bool,
}

/// A test type offered by the laboratory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabTestType {
    pub id: String,
    pub name: String,
    pub price: i64,
    /// Analytes reported for panel tests; empty for free-text results
    pub parameters: Vec<LabParameter>,
    pub active: bool,
}

/// One analyte of a panel test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LabParameter {
    pub name: String,
    pub unit: String,
    /// Reference range, e.g. "4.0-11.0", "<5.0", ">1.5", or "Negative"
    pub normal_range: String,
}

/// A staff member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Staff {
    /// `STAFF-<n>` identifier
    pub id: String,
    pub name: String,
    pub role: String,
    pub active: bool,
}

/// An HMO provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HmoProvider {
    pub id: String,
    pub name: String,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_medicine_is_active() {
        let med = Medicine::new("MED-1".into(), "Paracetamol 500mg".into(), 500, 100);
        assert!(med.active);
        assert!(!med.injectable);
        assert_eq!(med.stock, 100);
    }
}
