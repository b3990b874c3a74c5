//! SQLite schema for the organization database.

/// Complete schema for one partner organization's database.
pub const ORG_SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Mail Records
-- ============================================================================

CREATE TABLE IF NOT EXISTS mail_records (
    id TEXT PRIMARY KEY,
    recipient_org TEXT NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('decision', 'cancellation')),
    related_request_id TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_mail_recipient ON mail_records(recipient_org);
CREATE INDEX IF NOT EXISTS idx_mail_request ON mail_records(related_request_id);

-- ============================================================================
-- Appointment Display Mirror
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    appointment_id TEXT PRIMARY KEY,
    display_status TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
