//! Stock conservation across multi-item dispensing.

use wardflow_core::db::Database;
use wardflow_core::models::{Medicine, Patient, PatientType, PaymentStatus, PrescriptionStatus, Visit};
use wardflow_core::pharmacy::{DispenseError, PharmacyDesk};

fn setup_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    let mut patient = Patient::new("P-1".into(), "Ada".into(), PatientType::Cash);
    patient.visits.push(Visit::new("Malaria".into()));
    db.insert_patient(&patient).unwrap();

    db.upsert_medicine(&Medicine::new("MED-1".into(), "Paracetamol".into(), 500, 10))
        .unwrap();
    db.upsert_medicine(&Medicine::new("MED-2".into(), "Amoxicillin".into(), 1200, 3))
        .unwrap();
    db
}

fn paid_prescription(db: &Database, orders: &[(String, i64)]) -> String {
    let desk = PharmacyDesk::new(db);
    let prescription = desk.create_prescription("P-1", orders).unwrap();
    desk.send_to_billing(&prescription.id).unwrap();

    let mut prescription = db.require_prescription(&prescription.id).unwrap();
    prescription.status = PrescriptionStatus::Paid;
    for item in &mut prescription.items {
        item.payment_status = PaymentStatus::Paid;
    }
    db.update_prescription(&prescription).unwrap();
    prescription.id
}

#[test]
fn test_full_dispense_decrements_every_item() {
    let db = setup_db();
    let id = paid_prescription(&db, &[("MED-1".into(), 4), ("MED-2".into(), 2)]);

    PharmacyDesk::new(&db).dispense(&id).unwrap();

    assert_eq!(db.require_medicine("MED-1").unwrap().stock, 6);
    assert_eq!(db.require_medicine("MED-2").unwrap().stock, 1);
}

#[test]
fn test_shortage_on_later_item_undoes_earlier_decrements() {
    let db = setup_db();
    // First item fits (4 of 10), second does not (5 of 3)
    let id = paid_prescription(&db, &[("MED-1".into(), 4), ("MED-2".into(), 5)]);

    let result = PharmacyDesk::new(&db).dispense(&id);
    assert!(matches!(
        result,
        Err(DispenseError::InsufficientStock { needed: 5, .. })
    ));

    // The decrement that already succeeded was rolled back with the rest
    assert_eq!(db.require_medicine("MED-1").unwrap().stock, 10);
    assert_eq!(db.require_medicine("MED-2").unwrap().stock, 3);

    let prescription = db.require_prescription(&id).unwrap();
    assert_eq!(prescription.status, PrescriptionStatus::Paid);
    assert!(prescription.items.iter().all(|i| !i.dispensed));
}
