//! HMO claim database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{ClaimItem, ClaimStatus, HmoClaim, SourceDepartment};

const CLAIM_COLUMNS: &str = "id, patient_id, provider_id, source_department, source_id, \
     status, items, approval_code, rejection_reason, created_at, updated_at";

impl Database {
    /// Insert a new claim. Fails on a duplicate `(source_department,
    /// source_id)` pair; callers check `claim_exists_for_source` first.
    pub fn insert_claim(&self, claim: &HmoClaim) -> DbResult<()> {
        let items_json = serde_json::to_string(&claim.items)?;

        self.conn.execute(
            r#"
            INSERT INTO hmo_claims (
                id, patient_id, provider_id, source_department, source_id,
                status, items, approval_code, rejection_reason, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                claim.id,
                claim.patient_id,
                claim.provider_id,
                claim.source_department.code(),
                claim.source_id,
                claim_status_to_string(&claim.status),
                items_json,
                claim.approval_code,
                claim.rejection_reason,
                claim.created_at,
                claim.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing claim (full replace by id).
    pub fn update_claim(&self, claim: &HmoClaim) -> DbResult<bool> {
        let items_json = serde_json::to_string(&claim.items)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE hmo_claims SET
                status = ?2,
                items = ?3,
                approval_code = ?4,
                rejection_reason = ?5,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                claim.id,
                claim_status_to_string(&claim.status),
                items_json,
                claim.approval_code,
                claim.rejection_reason,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a claim by id.
    pub fn get_claim(&self, id: &str) -> DbResult<Option<HmoClaim>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM hmo_claims WHERE id = ?", CLAIM_COLUMNS),
                [id],
                claim_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a claim, erroring if missing.
    pub fn require_claim(&self, id: &str) -> DbResult<HmoClaim> {
        self.get_claim(id)?
            .ok_or_else(|| DbError::NotFound(format!("claim {}", id)))
    }

    /// True if a claim already shadows the given source record.
    pub fn claim_exists_for_source(
        &self,
        department: SourceDepartment,
        source_id: &str,
    ) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM hmo_claims WHERE source_department = ? AND source_id = ?",
            params![department.code(), source_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List claims by status.
    pub fn list_claims_by_status(&self, status: &ClaimStatus) -> DbResult<Vec<HmoClaim>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM hmo_claims WHERE status = ? ORDER BY created_at",
            CLAIM_COLUMNS
        ))?;
        let rows = stmt.query_map([claim_status_to_string(status)], claim_row)?;

        let mut claims = Vec::new();
        for row in rows {
            claims.push(row?.try_into()?);
        }
        Ok(claims)
    }

    /// List all claims.
    pub fn list_claims(&self) -> DbResult<Vec<HmoClaim>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM hmo_claims ORDER BY created_at",
            CLAIM_COLUMNS
        ))?;
        let rows = stmt.query_map([], claim_row)?;

        let mut claims = Vec::new();
        for row in rows {
            claims.push(row?.try_into()?);
        }
        Ok(claims)
    }

    /// Number of stored claims.
    pub fn count_claims(&self) -> DbResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM hmo_claims", [], |row| row.get(0))?)
    }
}

/// Intermediate row struct for database mapping.
struct ClaimRow {
    id: String,
    patient_id: String,
    provider_id: String,
    source_department: String,
    source_id: String,
    status: String,
    items: String,
    approval_code: Option<String>,
    rejection_reason: Option<String>,
    created_at: String,
    updated_at: String,
}

fn claim_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClaimRow> {
    Ok(ClaimRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        provider_id: row.get(2)?,
        source_department: row.get(3)?,
        source_id: row.get(4)?,
        status: row.get(5)?,
        items: row.get(6)?,
        approval_code: row.get(7)?,
        rejection_reason: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl TryFrom<ClaimRow> for HmoClaim {
    type Error = DbError;

    fn try_from(row: ClaimRow) -> Result<Self, Self::Error> {
        let items: Vec<ClaimItem> = serde_json::from_str(&row.items)?;
        let source_department =
            SourceDepartment::from_code(&row.source_department).ok_or_else(|| {
                DbError::Constraint(format!(
                    "Unknown source department: {}",
                    row.source_department
                ))
            })?;

        Ok(HmoClaim {
            id: row.id,
            patient_id: row.patient_id,
            provider_id: row.provider_id,
            source_department,
            source_id: row.source_id,
            status: string_to_claim_status(&row.status)?,
            items,
            approval_code: row.approval_code,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn claim_status_to_string(status: &ClaimStatus) -> &'static str {
    match status {
        ClaimStatus::Pending => "pending",
        ClaimStatus::Completed => "completed",
        ClaimStatus::Rejected => "rejected",
    }
}

fn string_to_claim_status(s: &str) -> Result<ClaimStatus, DbError> {
    match s {
        "pending" => Ok(ClaimStatus::Pending),
        "completed" => Ok(ClaimStatus::Completed),
        "rejected" => Ok(ClaimStatus::Rejected),
        _ => Err(DbError::Constraint(format!("Unknown claim status: {}", s))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientType};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new(
            "P-1".into(),
            "Ada".into(),
            PatientType::Hmo {
                provider_id: "PROV-1".into(),
            },
        );
        db.insert_patient(&patient).unwrap();
        db
    }

    fn make_claim(source_id: &str) -> HmoClaim {
        HmoClaim::new(
            "P-1".into(),
            "PROV-1".into(),
            SourceDepartment::Laboratory,
            source_id.into(),
            vec![ClaimItem {
                description: "Malaria Parasite".into(),
                quantity: 1,
                unit_price: 2000,
                source_department: SourceDepartment::Laboratory,
                source_id: source_id.into(),
            }],
        )
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let claim = make_claim("LAB-REQ-1");
        db.insert_claim(&claim).unwrap();

        let retrieved = db.get_claim(&claim.id).unwrap().unwrap();
        assert_eq!(retrieved.source_id, "LAB-REQ-1");
        assert_eq!(retrieved.status, ClaimStatus::Pending);
        assert_eq!(retrieved.total(), 2000);
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let db = setup_db();
        db.insert_claim(&make_claim("LAB-REQ-1")).unwrap();

        assert!(db
            .claim_exists_for_source(SourceDepartment::Laboratory, "LAB-REQ-1")
            .unwrap());
        assert!(db.insert_claim(&make_claim("LAB-REQ-1")).is_err());
        assert_eq!(db.count_claims().unwrap(), 1);
    }

    #[test]
    fn test_update_claim_decision() {
        let db = setup_db();
        let mut claim = make_claim("LAB-REQ-1");
        db.insert_claim(&claim).unwrap();

        claim.status = ClaimStatus::Completed;
        claim.approval_code = Some("APV-123".into());
        db.update_claim(&claim).unwrap();

        let retrieved = db.get_claim(&claim.id).unwrap().unwrap();
        assert_eq!(retrieved.status, ClaimStatus::Completed);
        assert_eq!(retrieved.approval_code, Some("APV-123".into()));
    }
}
