//! Catalog database operations: medicines, consumables, vaccines, lab test
//! types, and their stock levels.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Consumable, LabParameter, LabTestType, Medicine, Vaccine};

/// Which stock-bearing table an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockKind {
    Medicine,
    Consumable,
    Vaccine,
}

impl StockKind {
    fn table(&self) -> &'static str {
        match self {
            StockKind::Medicine => "medicines",
            StockKind::Consumable => "consumables",
            StockKind::Vaccine => "vaccines",
        }
    }
}

impl Database {
    // =========================================================================
    // Medicines
    // =========================================================================

    /// Insert or update a medicine.
    pub fn upsert_medicine(&self, medicine: &Medicine) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO medicines (id, name, price, stock, injectable, active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock = excluded.stock,
                injectable = excluded.injectable,
                active = excluded.active
            "#,
            params![
                medicine.id,
                medicine.name,
                medicine.price,
                medicine.stock,
                medicine.injectable,
                medicine.active,
            ],
        )?;
        Ok(())
    }

    /// Get a medicine by id.
    pub fn get_medicine(&self, id: &str) -> DbResult<Option<Medicine>> {
        self.conn
            .query_row(
                "SELECT id, name, price, stock, injectable, active FROM medicines WHERE id = ?",
                [id],
                |row| {
                    Ok(Medicine {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        price: row.get(2)?,
                        stock: row.get(3)?,
                        injectable: row.get(4)?,
                        active: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a medicine, erroring if missing.
    pub fn require_medicine(&self, id: &str) -> DbResult<Medicine> {
        self.get_medicine(id)?
            .ok_or_else(|| DbError::NotFound(format!("medicine {}", id)))
    }

    /// Search active medicines by name, ranked by Jaro-Winkler similarity.
    pub fn search_medicines(&self, query: &str, limit: usize) -> DbResult<Vec<Medicine>> {
        let pattern = format!("%{}%", query);
        let mut stmt = self.conn.prepare(
            "SELECT id, name, price, stock, injectable, active
             FROM medicines WHERE active = 1 AND name LIKE ? ORDER BY name",
        )?;
        let rows = stmt.query_map([pattern], |row| {
            Ok(Medicine {
                id: row.get(0)?,
                name: row.get(1)?,
                price: row.get(2)?,
                stock: row.get(3)?,
                injectable: row.get(4)?,
                active: row.get(5)?,
            })
        })?;

        let mut medicines = rows.collect::<Result<Vec<_>, _>>()?;
        let query_lower = query.to_lowercase();
        medicines.sort_by(|a, b| {
            let sa = strsim::jaro_winkler(&a.name.to_lowercase(), &query_lower);
            let sb = strsim::jaro_winkler(&b.name.to_lowercase(), &query_lower);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        medicines.truncate(limit);
        Ok(medicines)
    }

    /// Soft-delete a medicine.
    pub fn deactivate_medicine(&self, id: &str) -> DbResult<bool> {
        let rows = self
            .conn
            .execute("UPDATE medicines SET active = 0 WHERE id = ?", [id])?;
        Ok(rows > 0)
    }

    // =========================================================================
    // Consumables / Vaccines
    // =========================================================================

    /// Insert or update a consumable.
    pub fn upsert_consumable(&self, consumable: &Consumable) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO consumables (id, name, price, stock, active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock = excluded.stock,
                active = excluded.active
            "#,
            params![
                consumable.id,
                consumable.name,
                consumable.price,
                consumable.stock,
                consumable.active,
            ],
        )?;
        Ok(())
    }

    /// Get a consumable by id.
    pub fn get_consumable(&self, id: &str) -> DbResult<Option<Consumable>> {
        self.conn
            .query_row(
                "SELECT id, name, price, stock, active FROM consumables WHERE id = ?",
                [id],
                |row| {
                    Ok(Consumable {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        price: row.get(2)?,
                        stock: row.get(3)?,
                        active: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Insert or update a vaccine.
    pub fn upsert_vaccine(&self, vaccine: &Vaccine) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO vaccines (id, name, price, stock, active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                stock = excluded.stock,
                active = excluded.active
            "#,
            params![
                vaccine.id,
                vaccine.name,
                vaccine.price,
                vaccine.stock,
                vaccine.active,
            ],
        )?;
        Ok(())
    }

    /// Get a vaccine by id.
    pub fn get_vaccine(&self, id: &str) -> DbResult<Option<Vaccine>> {
        self.conn
            .query_row(
                "SELECT id, name, price, stock, active FROM vaccines WHERE id = ?",
                [id],
                |row| {
                    Ok(Vaccine {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        price: row.get(2)?,
                        stock: row.get(3)?,
                        active: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a vaccine, erroring if missing.
    pub fn require_vaccine(&self, id: &str) -> DbResult<Vaccine> {
        self.get_vaccine(id)?
            .ok_or_else(|| DbError::NotFound(format!("vaccine {}", id)))
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Decrement stock, failing without change if fewer than `quantity`
    /// units remain.
    pub fn decrement_stock(&self, kind: StockKind, id: &str, quantity: i64) -> DbResult<()> {
        let sql = format!(
            "UPDATE {} SET stock = stock - ?1 WHERE id = ?2 AND stock >= ?1",
            kind.table()
        );
        let rows = self.conn.execute(&sql, params![quantity, id])?;
        if rows == 0 {
            return Err(DbError::Constraint(format!(
                "insufficient stock for {} (need {})",
                id, quantity
            )));
        }
        Ok(())
    }

    /// Increment stock (restock or reversal).
    pub fn increment_stock(&self, kind: StockKind, id: &str, quantity: i64) -> DbResult<()> {
        let sql = format!("UPDATE {} SET stock = stock + ?1 WHERE id = ?2", kind.table());
        let rows = self.conn.execute(&sql, params![quantity, id])?;
        if rows == 0 {
            return Err(DbError::NotFound(format!("{} {}", kind.table(), id)));
        }
        Ok(())
    }

    // =========================================================================
    // Lab test types
    // =========================================================================

    /// Insert or update a lab test type.
    pub fn upsert_lab_test_type(&self, test_type: &LabTestType) -> DbResult<()> {
        let parameters_json = serde_json::to_string(&test_type.parameters)?;
        self.conn.execute(
            r#"
            INSERT INTO lab_test_types (id, name, price, parameters, active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                parameters = excluded.parameters,
                active = excluded.active
            "#,
            params![
                test_type.id,
                test_type.name,
                test_type.price,
                parameters_json,
                test_type.active,
            ],
        )?;
        Ok(())
    }

    /// Get a lab test type by id.
    pub fn get_lab_test_type(&self, id: &str) -> DbResult<Option<LabTestType>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, price, parameters, active FROM lab_test_types WHERE id = ?",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(id, name, price, parameters, active)| {
            let parameters: Vec<LabParameter> = serde_json::from_str(&parameters)?;
            Ok(LabTestType {
                id,
                name,
                price,
                parameters,
                active,
            })
        })
        .transpose()
    }

    /// Get a lab test type, erroring if missing.
    pub fn require_lab_test_type(&self, id: &str) -> DbResult<LabTestType> {
        self.get_lab_test_type(id)?
            .ok_or_else(|| DbError::NotFound(format!("lab test type {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get_medicine() {
        let db = setup_db();
        let med = Medicine::new("MED-1".into(), "Paracetamol 500mg".into(), 500, 100);
        db.upsert_medicine(&med).unwrap();

        let retrieved = db.get_medicine("MED-1").unwrap().unwrap();
        assert_eq!(retrieved.name, "Paracetamol 500mg");
        assert_eq!(retrieved.stock, 100);
    }

    #[test]
    fn test_decrement_stock_guard() {
        let db = setup_db();
        db.upsert_medicine(&Medicine::new("MED-1".into(), "Amoxicillin".into(), 1200, 10))
            .unwrap();

        db.decrement_stock(StockKind::Medicine, "MED-1", 4).unwrap();
        assert_eq!(db.get_medicine("MED-1").unwrap().unwrap().stock, 6);

        // Asking for more than remains must fail without change
        let result = db.decrement_stock(StockKind::Medicine, "MED-1", 50);
        assert!(matches!(result, Err(DbError::Constraint(_))));
        assert_eq!(db.get_medicine("MED-1").unwrap().unwrap().stock, 6);
    }

    #[test]
    fn test_increment_stock() {
        let db = setup_db();
        db.upsert_vaccine(&Vaccine {
            id: "VAC-1".into(),
            name: "Hepatitis B".into(),
            price: 3000,
            stock: 5,
            active: true,
        })
        .unwrap();

        db.increment_stock(StockKind::Vaccine, "VAC-1", 10).unwrap();
        assert_eq!(db.get_vaccine("VAC-1").unwrap().unwrap().stock, 15);
    }

    #[test]
    fn test_search_excludes_inactive() {
        let db = setup_db();
        db.upsert_medicine(&Medicine::new("MED-1".into(), "Paracetamol".into(), 500, 10))
            .unwrap();
        let mut retired = Medicine::new("MED-2".into(), "Paracetamol Syrup".into(), 800, 0);
        retired.active = false;
        db.upsert_medicine(&retired).unwrap();

        let results = db.search_medicines("Paracetamol", 10).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "MED-1");
    }

    #[test]
    fn test_lab_test_type_parameters_round_trip() {
        let db = setup_db();
        let test_type = LabTestType {
            id: "LT-1".into(),
            name: "Full Blood Count".into(),
            price: 5000,
            parameters: vec![LabParameter {
                name: "WBC".into(),
                unit: "x10^9/L".into(),
                normal_range: "4.0-11.0".into(),
            }],
            active: true,
        };
        db.upsert_lab_test_type(&test_type).unwrap();

        let retrieved = db.require_lab_test_type("LT-1").unwrap();
        assert_eq!(retrieved.parameters.len(), 1);
        assert_eq!(retrieved.parameters[0].normal_range, "4.0-11.0");
    }
}
