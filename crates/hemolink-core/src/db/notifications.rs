//! Notification table operations, including the existence queries the
//! rule engine's dedup windows rely on.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{Notification, NotificationStatus, Priority};

const NOTIFICATION_COLUMNS: &str = "id, notification_type, title, description, \
     related_entity_type, related_entity_id, status, priority, created_at, read_at";

/// Intermediate row struct for database mapping.
struct NotificationRow {
    id: String,
    notification_type: String,
    title: String,
    description: String,
    related_entity_type: Option<String>,
    related_entity_id: Option<String>,
    status: String,
    priority: String,
    created_at: String,
    read_at: Option<String>,
}

fn map_notification_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        notification_type: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        related_entity_type: row.get(4)?,
        related_entity_id: row.get(5)?,
        status: row.get(6)?,
        priority: row.get(7)?,
        created_at: row.get(8)?,
        read_at: row.get(9)?,
    })
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DbError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let status = NotificationStatus::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown status: {}", row.status)))?;
        let priority = Priority::parse(&row.priority)
            .ok_or_else(|| DbError::Constraint(format!("Unknown priority: {}", row.priority)))?;
        Ok(Notification {
            id: row.id,
            notification_type: row.notification_type,
            title: row.title,
            description: row.description,
            related_entity_type: row.related_entity_type,
            related_entity_id: row.related_entity_id,
            status,
            priority,
            created_at: row.created_at,
            read_at: row.read_at,
        })
    }
}

/// Insert a notification.
pub fn insert_notification(conn: &Connection, notification: &Notification) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO notifications (
            id, notification_type, title, description, related_entity_type,
            related_entity_id, status, priority, created_at, read_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            notification.id,
            notification.notification_type,
            notification.title,
            notification.description,
            notification.related_entity_type,
            notification.related_entity_id,
            notification.status.as_str(),
            notification.priority.as_str(),
            notification.created_at,
            notification.read_at,
        ],
    )?;
    Ok(())
}

/// Whether any notification of this type exists for the entity, ever.
///
/// The once-only expiry warnings use this window.
pub fn exists_notification(
    conn: &Connection,
    notification_type: &str,
    related_entity_id: &str,
) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications
         WHERE notification_type = ?1 AND related_entity_id = ?2",
        params![notification_type, related_entity_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether a notification of this type exists for the entity on a calendar
/// day (`day` is `YYYY-MM-DD`). Per-day dedup windows use this.
pub fn exists_notification_on_day(
    conn: &Connection,
    notification_type: &str,
    related_entity_id: &str,
    day: &str,
) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM notifications
         WHERE notification_type = ?1 AND related_entity_id = ?2
           AND substr(created_at, 1, 10) = ?3",
        params![notification_type, related_entity_id, day],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Database {
    /// Insert a notification.
    pub fn insert_notification(&self, notification: &Notification) -> DbResult<()> {
        insert_notification(self.conn(), notification)
    }

    /// Get a notification by id.
    pub fn get_notification(&self, id: &str) -> DbResult<Option<Notification>> {
        self.conn()
            .query_row(
                &format!("SELECT {} FROM notifications WHERE id = ?", NOTIFICATION_COLUMNS),
                [id],
                map_notification_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List notifications, newest first, optionally filtered by status.
    pub fn list_notifications(
        &self,
        status: Option<NotificationStatus>,
    ) -> DbResult<Vec<Notification>> {
        let mut notifications = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {} FROM notifications WHERE status = ? ORDER BY created_at DESC",
                    NOTIFICATION_COLUMNS
                ))?;
                let rows = stmt.query_map([status.as_str()], map_notification_row)?;
                for row in rows {
                    notifications.push(row?.try_into()?);
                }
            }
            None => {
                let mut stmt = self.conn().prepare(&format!(
                    "SELECT {} FROM notifications ORDER BY created_at DESC",
                    NOTIFICATION_COLUMNS
                ))?;
                let rows = stmt.query_map([], map_notification_row)?;
                for row in rows {
                    notifications.push(row?.try_into()?);
                }
            }
        }
        Ok(notifications)
    }

    /// Mark a notification read, stamping `read_at`.
    pub fn mark_notification_read(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn().execute(
            "UPDATE notifications SET status = 'read', read_at = ?2 WHERE id = ?1",
            params![id, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Archive a notification.
    pub fn archive_notification(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn()
            .execute("UPDATE notifications SET status = 'archived' WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BloodCategory;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();
        let n = Notification::stock_low(BloodCategory::Plasma, 3);
        db.insert_notification(&n).unwrap();

        let retrieved = db.get_notification(&n.id).unwrap().unwrap();
        assert_eq!(retrieved.notification_type, "stock_low");
        assert_eq!(retrieved.priority, Priority::Urgent);
        assert_eq!(retrieved.status, NotificationStatus::Unread);
    }

    #[test]
    fn test_exists_windows() {
        let db = setup_db();
        let n = Notification::expiring_soon("SN-1", BloodCategory::RedBloodCell, 7);
        let today = &n.created_at[..10].to_string();
        db.insert_notification(&n).unwrap();

        assert!(exists_notification(db.conn(), "expiring_soon", "SN-1").unwrap());
        assert!(!exists_notification(db.conn(), "expiring_soon", "SN-2").unwrap());
        assert!(!exists_notification(db.conn(), "expiring_urgent", "SN-1").unwrap());

        assert!(exists_notification_on_day(db.conn(), "expiring_soon", "SN-1", today).unwrap());
        assert!(
            !exists_notification_on_day(db.conn(), "expiring_soon", "SN-1", "1999-01-01").unwrap()
        );
    }

    #[test]
    fn test_mark_read_and_archive() {
        let db = setup_db();
        let n = Notification::stock_out(BloodCategory::Platelet);
        db.insert_notification(&n).unwrap();

        assert!(db.mark_notification_read(&n.id).unwrap());
        let read = db.get_notification(&n.id).unwrap().unwrap();
        assert_eq!(read.status, NotificationStatus::Read);
        assert!(read.read_at.is_some());

        assert!(db.archive_notification(&n.id).unwrap());
        let archived = db.get_notification(&n.id).unwrap().unwrap();
        assert_eq!(archived.status, NotificationStatus::Archived);

        assert!(db.list_notifications(Some(NotificationStatus::Unread)).unwrap().is_empty());
    }
}
