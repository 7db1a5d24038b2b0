//! Lab request database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{LabRequest, LabStatus, LabTestItem};

const LAB_COLUMNS: &str = "id, patient_id, visit_id, status, tests, created_at, updated_at";

impl Database {
    /// Next `LAB-REQ-<n>` id.
    pub fn next_lab_request_id(&self) -> DbResult<String> {
        self.next_id("lab_requests", "LAB-REQ-")
    }

    /// Insert a new lab request.
    pub fn insert_lab_request(&self, request: &LabRequest) -> DbResult<()> {
        let tests_json = serde_json::to_string(&request.tests)?;

        self.conn.execute(
            r#"
            INSERT INTO lab_requests (
                id, patient_id, visit_id, status, tests, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                request.id,
                request.patient_id,
                request.visit_id,
                lab_status_to_string(&request.status),
                tests_json,
                request.created_at,
                request.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing lab request (full replace by id).
    pub fn update_lab_request(&self, request: &LabRequest) -> DbResult<bool> {
        let tests_json = serde_json::to_string(&request.tests)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE lab_requests SET
                status = ?2,
                tests = ?3,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![
                request.id,
                lab_status_to_string(&request.status),
                tests_json,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a lab request by id.
    pub fn get_lab_request(&self, id: &str) -> DbResult<Option<LabRequest>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM lab_requests WHERE id = ?", LAB_COLUMNS),
                [id],
                lab_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Get a lab request, erroring if missing.
    pub fn require_lab_request(&self, id: &str) -> DbResult<LabRequest> {
        self.get_lab_request(id)?
            .ok_or_else(|| DbError::NotFound(format!("lab request {}", id)))
    }

    /// List lab requests by status.
    pub fn list_lab_requests_by_status(&self, status: &LabStatus) -> DbResult<Vec<LabRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM lab_requests WHERE status = ? ORDER BY created_at",
            LAB_COLUMNS
        ))?;
        let rows = stmt.query_map([lab_status_to_string(status)], lab_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }

    /// List all lab requests for a patient, newest first.
    pub fn list_lab_requests_for_patient(&self, patient_id: &str) -> DbResult<Vec<LabRequest>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM lab_requests WHERE patient_id = ? ORDER BY created_at DESC",
            LAB_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], lab_row)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?.try_into()?);
        }
        Ok(requests)
    }
}

/// Intermediate row struct for database mapping.
struct LabRow {
    id: String,
    patient_id: String,
    visit_id: String,
    status: String,
    tests: String,
    created_at: String,
    updated_at: String,
}

fn lab_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LabRow> {
    Ok(LabRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        visit_id: row.get(2)?,
        status: row.get(3)?,
        tests: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

impl TryFrom<LabRow> for LabRequest {
    type Error = DbError;

    fn try_from(row: LabRow) -> Result<Self, Self::Error> {
        let tests: Vec<LabTestItem> = serde_json::from_str(&row.tests)?;
        Ok(LabRequest {
            id: row.id,
            patient_id: row.patient_id,
            visit_id: row.visit_id,
            status: string_to_lab_status(&row.status)?,
            tests,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn lab_status_to_string(status: &LabStatus) -> &'static str {
    match status {
        LabStatus::Pending => "pending",
        LabStatus::Billed => "billed",
        LabStatus::InProgress => "in_progress",
        LabStatus::Completed => "completed",
    }
}

fn string_to_lab_status(s: &str) -> Result<LabStatus, DbError> {
    match s {
        "pending" => Ok(LabStatus::Pending),
        "billed" => Ok(LabStatus::Billed),
        "in_progress" => Ok(LabStatus::InProgress),
        "completed" => Ok(LabStatus::Completed),
        _ => Err(DbError::Constraint(format!("Unknown lab status: {}", s))),
    }
}
