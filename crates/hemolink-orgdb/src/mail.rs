//! Mail records delivered to the partner organization.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{OrgDatabase, OrgDbError, OrgDbResult};

/// Category of a mail record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MailCategory {
    /// Outcome of a partnership request (approved or declined).
    Decision,
    /// Cancellation of a previously approved blood drive.
    Cancellation,
}

impl MailCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailCategory::Decision => "decision",
            MailCategory::Cancellation => "cancellation",
        }
    }

    pub fn parse(s: &str) -> OrgDbResult<Self> {
        match s {
            "decision" => Ok(MailCategory::Decision),
            "cancellation" => Ok(MailCategory::Cancellation),
            _ => Err(OrgDbError::Constraint(format!(
                "Unknown mail category: {}",
                s
            ))),
        }
    }
}

/// A mail record addressed to the organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MailRecord {
    pub id: String,
    pub recipient_org: String,
    pub subject: String,
    pub body: String,
    pub category: MailCategory,
    /// Partnership request this notice refers to, when applicable.
    pub related_request_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl MailRecord {
    fn new(
        recipient_org: &str,
        subject: String,
        body: String,
        category: MailCategory,
        related_request_id: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recipient_org: recipient_org.to_string(),
            subject,
            body,
            category,
            related_request_id: Some(related_request_id.to_string()),
            is_read: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Compose the decision notice for an approved or declined request.
    ///
    /// A decline carries the reason verbatim.
    pub fn decision_notice(
        recipient_org: &str,
        request_id: &str,
        approved: bool,
        decline_reason: Option<&str>,
        event_date: &str,
    ) -> Self {
        let (subject, body) = if approved {
            (
                format!("Partnership request approved — {}", recipient_org),
                format!(
                    "Your blood drive request for {} has been approved by the \
                     regional blood center. The appointment will appear as \
                     confirmed once scheduling completes.",
                    event_date
                ),
            )
        } else {
            let reason = decline_reason.unwrap_or("No reason provided");
            (
                format!("Partnership request declined — {}", recipient_org),
                format!(
                    "Your blood drive request for {} has been declined by the \
                     regional blood center.\n\nReason: {}",
                    event_date, reason
                ),
            )
        };
        Self::new(
            recipient_org,
            subject,
            body,
            MailCategory::Decision,
            request_id,
        )
    }

    /// Compose the cancellation notice for a previously approved drive.
    ///
    /// Worded distinctly from a decline: the drive existed and is being
    /// called off, not refused.
    pub fn cancellation_notice(
        recipient_org: &str,
        request_id: &str,
        reason: &str,
        event_date: &str,
    ) -> Self {
        let subject = format!("Blood drive cancelled — {}", recipient_org);
        let body = format!(
            "The approved blood drive scheduled for {} has been cancelled by \
             the regional blood center.\n\nReason: {}\n\nPlease contact the \
             center to reschedule.",
            event_date, reason
        );
        Self::new(
            recipient_org,
            subject,
            body,
            MailCategory::Cancellation,
            request_id,
        )
    }
}

impl OrgDatabase {
    /// Insert a mail record.
    pub fn insert_mail_record(&self, record: &MailRecord) -> OrgDbResult<()> {
        self.conn().execute(
            r#"
            INSERT INTO mail_records (
                id, recipient_org, subject, body, category,
                related_request_id, is_read, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.recipient_org,
                record.subject,
                record.body,
                record.category.as_str(),
                record.related_request_id,
                record.is_read as i64,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a mail record by id.
    pub fn get_mail_record(&self, id: &str) -> OrgDbResult<Option<MailRecord>> {
        self.conn()
            .query_row(
                r#"
                SELECT id, recipient_org, subject, body, category,
                       related_request_id, is_read, created_at
                FROM mail_records
                WHERE id = ?
                "#,
                [id],
                map_mail_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List mail for an organization, newest first.
    pub fn list_mail_records(&self, recipient_org: &str) -> OrgDbResult<Vec<MailRecord>> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, recipient_org, subject, body, category,
                   related_request_id, is_read, created_at
            FROM mail_records
            WHERE recipient_org = ?
            ORDER BY created_at DESC
            "#,
        )?;

        let rows = stmt.query_map([recipient_org], map_mail_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Mark a mail record as read.
    pub fn mark_mail_read(&self, id: &str) -> OrgDbResult<bool> {
        let rows_affected = self
            .conn()
            .execute("UPDATE mail_records SET is_read = 1 WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct MailRow {
    id: String,
    recipient_org: String,
    subject: String,
    body: String,
    category: String,
    related_request_id: Option<String>,
    is_read: i64,
    created_at: String,
}

fn map_mail_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MailRow> {
    Ok(MailRow {
        id: row.get(0)?,
        recipient_org: row.get(1)?,
        subject: row.get(2)?,
        body: row.get(3)?,
        category: row.get(4)?,
        related_request_id: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl TryFrom<MailRow> for MailRecord {
    type Error = OrgDbError;

    fn try_from(row: MailRow) -> Result<Self, Self::Error> {
        Ok(MailRecord {
            id: row.id,
            recipient_org: row.recipient_org,
            subject: row.subject,
            body: row.body,
            category: MailCategory::parse(&row.category)?,
            related_request_id: row.related_request_id,
            is_read: row.is_read != 0,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> OrgDatabase {
        OrgDatabase::open_in_memory().unwrap()
    }

    #[test]
    fn test_decision_notice_declined_carries_reason_verbatim() {
        let record = MailRecord::decision_notice(
            "Northern Lifeline",
            "req-7",
            false,
            Some("Venue does not meet cold-chain requirements"),
            "2026-09-01",
        );

        assert_eq!(record.category, MailCategory::Decision);
        assert!(record.subject.contains("declined"));
        assert!(record
            .body
            .contains("Venue does not meet cold-chain requirements"));
    }

    #[test]
    fn test_cancellation_worded_distinctly_from_decline() {
        let decline = MailRecord::decision_notice(
            "Org", "req-1", false, Some("full calendar"), "2026-09-01",
        );
        let cancel =
            MailRecord::cancellation_notice("Org", "req-1", "storm warning", "2026-09-01");

        assert_ne!(decline.subject, cancel.subject);
        assert!(cancel.subject.contains("cancelled"));
        assert!(cancel.body.contains("storm warning"));
        assert!(!cancel.body.contains("declined"));
    }

    #[test]
    fn test_insert_and_list() {
        let db = setup_db();

        let r1 = MailRecord::decision_notice("Org A", "req-1", true, None, "2026-09-01");
        let r2 = MailRecord::cancellation_notice("Org A", "req-2", "flooding", "2026-09-08");
        let other = MailRecord::decision_notice("Org B", "req-3", true, None, "2026-09-15");

        db.insert_mail_record(&r1).unwrap();
        db.insert_mail_record(&r2).unwrap();
        db.insert_mail_record(&other).unwrap();

        let records = db.list_mail_records("Org A").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.recipient_org == "Org A"));
    }

    #[test]
    fn test_mark_read() {
        let db = setup_db();

        let record = MailRecord::decision_notice("Org", "req-1", true, None, "2026-09-01");
        db.insert_mail_record(&record).unwrap();

        assert!(db.mark_mail_read(&record.id).unwrap());
        let retrieved = db.get_mail_record(&record.id).unwrap().unwrap();
        assert!(retrieved.is_read);

        // Unknown id is a no-op
        assert!(!db.mark_mail_read("missing").unwrap());
    }
}
