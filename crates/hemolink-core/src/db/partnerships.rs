//! Partnership request table operations.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{PartnershipRequest, RequestStatus};

const REQUEST_COLUMNS: &str = "id, organization_name, appointment_id, event_date, status, \
     decline_reason, cancellation_reason, decided_by, decided_at, created_at";

/// Intermediate row struct for database mapping.
struct RequestRow {
    id: String,
    organization_name: String,
    appointment_id: Option<String>,
    event_date: String,
    status: String,
    decline_reason: Option<String>,
    cancellation_reason: Option<String>,
    decided_by: Option<String>,
    decided_at: Option<String>,
    created_at: String,
}

fn map_request_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RequestRow> {
    Ok(RequestRow {
        id: row.get(0)?,
        organization_name: row.get(1)?,
        appointment_id: row.get(2)?,
        event_date: row.get(3)?,
        status: row.get(4)?,
        decline_reason: row.get(5)?,
        cancellation_reason: row.get(6)?,
        decided_by: row.get(7)?,
        decided_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl TryFrom<RequestRow> for PartnershipRequest {
    type Error = DbError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let status = RequestStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown status: {}", row.status)))?;
        Ok(PartnershipRequest {
            id: row.id,
            organization_name: row.organization_name,
            appointment_id: row.appointment_id,
            event_date: row.event_date,
            status,
            decline_reason: row.decline_reason,
            cancellation_reason: row.cancellation_reason,
            decided_by: row.decided_by,
            decided_at: row.decided_at,
            created_at: row.created_at,
        })
    }
}

/// Insert a partnership request.
pub fn insert_partnership_request(conn: &Connection, request: &PartnershipRequest) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO partnership_requests (
            id, organization_name, appointment_id, event_date, status,
            decline_reason, cancellation_reason, decided_by, decided_at, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            request.id,
            request.organization_name,
            request.appointment_id,
            request.event_date,
            request.status.as_str(),
            request.decline_reason,
            request.cancellation_reason,
            request.decided_by,
            request.decided_at,
            request.created_at,
        ],
    )?;
    Ok(())
}

/// Get a partnership request by id.
pub fn get_partnership_request(
    conn: &Connection,
    id: &str,
) -> DbResult<Option<PartnershipRequest>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM partnership_requests WHERE id = ?",
            REQUEST_COLUMNS
        ),
        [id],
        map_request_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Persist a request's status fields after a transition.
pub fn update_partnership_request(conn: &Connection, request: &PartnershipRequest) -> DbResult<bool> {
    let rows_affected = conn.execute(
        r#"
        UPDATE partnership_requests SET
            status = ?2,
            decline_reason = ?3,
            cancellation_reason = ?4,
            decided_by = ?5,
            decided_at = ?6
        WHERE id = ?1
        "#,
        params![
            request.id,
            request.status.as_str(),
            request.decline_reason,
            request.cancellation_reason,
            request.decided_by,
            request.decided_at,
        ],
    )?;
    Ok(rows_affected > 0)
}

impl Database {
    /// List requests, newest first, optionally filtered by status.
    pub fn list_partnership_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> DbResult<Vec<PartnershipRequest>> {
        let mut requests = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {} FROM partnership_requests WHERE status = ? ORDER BY created_at DESC",
                    REQUEST_COLUMNS
                ))?;
                let rows = stmt.query_map([status.as_str()], map_request_row)?;
                for row in rows {
                    requests.push(row?.try_into()?);
                }
            }
            None => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {} FROM partnership_requests ORDER BY created_at DESC",
                    REQUEST_COLUMNS
                ))?;
                let rows = stmt.query_map([], map_request_row)?;
                for row in rows {
                    requests.push(row?.try_into()?);
                }
            }
        }
        Ok(requests)
    }
}
