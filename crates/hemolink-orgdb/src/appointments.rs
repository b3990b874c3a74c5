//! Appointment display mirror.
//!
//! The organization's calendar UI reads its display status from here; the
//! regional center updates it when a partnership request is decided or an
//! approved drive is cancelled.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{OrgDatabase, OrgDbResult};

/// Display state of one appointment in the organization's calendar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentDisplay {
    pub appointment_id: String,
    pub display_status: String,
    pub updated_at: String,
}

impl OrgDatabase {
    /// Set the display status for an appointment, creating the row if needed.
    pub fn set_appointment_display_status(
        &self,
        appointment_id: &str,
        display_status: &str,
    ) -> OrgDbResult<()> {
        self.conn().execute(
            r#"
            INSERT INTO appointments (appointment_id, display_status, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(appointment_id) DO UPDATE SET
                display_status = excluded.display_status,
                updated_at = datetime('now')
            "#,
            params![appointment_id, display_status],
        )?;
        Ok(())
    }

    /// Get the display state for an appointment.
    pub fn get_appointment_display(
        &self,
        appointment_id: &str,
    ) -> OrgDbResult<Option<AppointmentDisplay>> {
        self.conn()
            .query_row(
                r#"
                SELECT appointment_id, display_status, updated_at
                FROM appointments
                WHERE appointment_id = ?
                "#,
                [appointment_id],
                |row| {
                    Ok(AppointmentDisplay {
                        appointment_id: row.get(0)?,
                        display_status: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}
