//! Staff and HMO provider directory operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{HmoProvider, Staff};

impl Database {
    /// Next `STAFF-<n>` id.
    pub fn next_staff_id(&self) -> DbResult<String> {
        self.next_id("staff", "STAFF-")
    }

    /// Insert or update a staff member.
    pub fn upsert_staff(&self, staff: &Staff) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO staff (id, name, role, active)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                role = excluded.role,
                active = excluded.active
            "#,
            params![staff.id, staff.name, staff.role, staff.active],
        )?;
        Ok(())
    }

    /// Get a staff member by id.
    pub fn get_staff(&self, id: &str) -> DbResult<Option<Staff>> {
        self.conn
            .query_row(
                "SELECT id, name, role, active FROM staff WHERE id = ?",
                [id],
                |row| {
                    Ok(Staff {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        role: row.get(2)?,
                        active: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// List active staff.
    pub fn list_staff(&self) -> DbResult<Vec<Staff>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, role, active FROM staff WHERE active = 1 ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Staff {
                id: row.get(0)?,
                name: row.get(1)?,
                role: row.get(2)?,
                active: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Insert or update an HMO provider.
    pub fn upsert_hmo_provider(&self, provider: &HmoProvider) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO hmo_providers (id, name, active)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                active = excluded.active
            "#,
            params![provider.id, provider.name, provider.active],
        )?;
        Ok(())
    }

    /// Get an HMO provider by id.
    pub fn get_hmo_provider(&self, id: &str) -> DbResult<Option<HmoProvider>> {
        self.conn
            .query_row(
                "SELECT id, name, active FROM hmo_providers WHERE id = ?",
                [id],
                |row| {
                    Ok(HmoProvider {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        active: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get an HMO provider, erroring if missing.
    pub fn require_hmo_provider(&self, id: &str) -> DbResult<HmoProvider> {
        self.get_hmo_provider(id)?
            .ok_or_else(|| DbError::NotFound(format!("HMO provider {}", id)))
    }
}
