//! SQLite schema definition for the center database.

/// Complete center database schema.
///
/// The four unit tables share the blood attributes; a unit lives in exactly
/// one of them at a time, and `serial_id` is the primary key within each, so
/// the delete-then-insert transfer pattern is always protected by a unique
/// constraint inside its transaction.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Blood Unit Lifecycle Tables
-- ============================================================================

CREATE TABLE IF NOT EXISTS blood_stock (
    serial_id TEXT PRIMARY KEY,
    blood_type TEXT NOT NULL,
    rh_factor TEXT NOT NULL,
    result_blood_type TEXT,
    volume_ml INTEGER NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('Red Blood Cell', 'Plasma', 'Platelet')),
    source TEXT NOT NULL CHECK (source IN ('Walk-In', 'Mobile')),
    collection_date TEXT NOT NULL,
    expiration_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Stored',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_stock_category ON blood_stock(category);
CREATE INDEX IF NOT EXISTS idx_stock_expiration ON blood_stock(expiration_date);

CREATE TABLE IF NOT EXISTS non_conforming (
    serial_id TEXT PRIMARY KEY,
    blood_type TEXT NOT NULL,
    rh_factor TEXT NOT NULL,
    result_blood_type TEXT,
    volume_ml INTEGER NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('Red Blood Cell', 'Plasma', 'Platelet')),
    source TEXT NOT NULL CHECK (source IN ('Walk-In', 'Mobile')),
    collection_date TEXT NOT NULL,
    expiration_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Non-Conforming',
    reason TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_non_conforming_expiration ON non_conforming(expiration_date);

CREATE TABLE IF NOT EXISTS released_blood (
    serial_id TEXT PRIMARY KEY,
    blood_type TEXT NOT NULL,
    rh_factor TEXT NOT NULL,
    result_blood_type TEXT,
    volume_ml INTEGER NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('Red Blood Cell', 'Plasma', 'Platelet')),
    source TEXT NOT NULL CHECK (source IN ('Walk-In', 'Mobile')),
    collection_date TEXT NOT NULL,
    expiration_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Released',
    recipient_name TEXT NOT NULL,
    facility_name TEXT NOT NULL,
    released_by TEXT NOT NULL,
    release_date TEXT NOT NULL,
    release_time TEXT NOT NULL,
    remarks TEXT,
    rb_invoice_id TEXT REFERENCES blood_invoices(invoice_id),
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_released_invoice ON released_blood(rb_invoice_id);

CREATE TABLE IF NOT EXISTS discarded_blood (
    serial_id TEXT PRIMARY KEY,
    blood_type TEXT NOT NULL,
    rh_factor TEXT NOT NULL,
    result_blood_type TEXT,
    volume_ml INTEGER NOT NULL,
    category TEXT NOT NULL CHECK (category IN ('Red Blood Cell', 'Plasma', 'Platelet')),
    source TEXT NOT NULL CHECK (source IN ('Walk-In', 'Mobile')),
    collection_date TEXT NOT NULL,
    expiration_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Discarded',
    responsible_personnel TEXT NOT NULL,
    reason_for_discarding TEXT NOT NULL,
    authorized_by TEXT NOT NULL,
    date_of_discard TEXT NOT NULL,
    time_of_discard TEXT NOT NULL,
    method_of_disposal TEXT NOT NULL,
    remarks TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Append-only transition audit log
CREATE TABLE IF NOT EXISTS blood_stock_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    serial_id TEXT NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('ADDED', 'RELEASED', 'DISCARDED', 'NON-CONFORMING')),
    category TEXT NOT NULL,
    result_blood_type TEXT,
    acted_by TEXT NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_history_serial ON blood_stock_history(serial_id);
CREATE INDEX IF NOT EXISTS idx_history_action ON blood_stock_history(action);

CREATE TABLE IF NOT EXISTS blood_invoices (
    invoice_id TEXT PRIMARY KEY,
    facility_name TEXT NOT NULL,
    unit_count INTEGER NOT NULL,
    issued_by TEXT NOT NULL,
    issued_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Donor Registry
-- ============================================================================

CREATE TABLE IF NOT EXISTS donor_records (
    donor_id TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    middle_name TEXT,
    birth_date TEXT,
    sex TEXT,
    contact_number TEXT,
    email TEXT,
    address TEXT,
    blood_type TEXT,
    rh_factor TEXT,
    result_blood_type TEXT,
    donation_count INTEGER NOT NULL DEFAULT 0,
    donation_dates TEXT NOT NULL DEFAULT '[]',    -- JSON array of {date}
    last_donation_date TEXT,
    source_organization TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    modified_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Supports the duplicate rule: case-insensitive trimmed name equality
CREATE INDEX IF NOT EXISTS idx_donors_name
    ON donor_records(lower(trim(first_name)), lower(trim(last_name)));

-- Staging area for incoming sync requests from partner organizations
CREATE TABLE IF NOT EXISTS temp_donor_records (
    id TEXT PRIMARY KEY,
    donor_id TEXT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    middle_name TEXT,
    birth_date TEXT,
    sex TEXT,
    contact_number TEXT,
    email TEXT,
    address TEXT,
    blood_type TEXT,
    rh_factor TEXT,
    source_organization TEXT,
    source_user_id TEXT NOT NULL,
    source_user_name TEXT NOT NULL,
    sync_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (sync_status IN ('pending', 'approved', 'rejected')),
    sync_requested_at TEXT NOT NULL,
    sync_approved_at TEXT,
    sync_approved_by TEXT,
    rejection_reason TEXT
);

CREATE INDEX IF NOT EXISTS idx_temp_donors_status ON temp_donor_records(sync_status);

-- ============================================================================
-- Notifications
-- ============================================================================

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    notification_type TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    related_entity_type TEXT,
    related_entity_id TEXT,
    status TEXT NOT NULL DEFAULT 'unread'
        CHECK (status IN ('unread', 'read', 'archived')),
    priority TEXT NOT NULL DEFAULT 'normal'
        CHECK (priority IN ('low', 'normal', 'high', 'urgent', 'critical')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    read_at TEXT
);

-- Supports the per-window dedup queries
CREATE INDEX IF NOT EXISTS idx_notifications_dedup
    ON notifications(notification_type, related_entity_id);

-- ============================================================================
-- Partnership Requests
-- ============================================================================

CREATE TABLE IF NOT EXISTS partnership_requests (
    id TEXT PRIMARY KEY,
    organization_name TEXT NOT NULL,
    appointment_id TEXT,
    event_date TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'approved', 'declined', 'confirmed', 'scheduled', 'cancelled')),
    decline_reason TEXT,
    cancellation_reason TEXT,
    decided_by TEXT,
    decided_at TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_partnership_status ON partnership_requests(status);

-- ============================================================================
-- Access Control
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    full_name TEXT NOT NULL,
    role TEXT NOT NULL
        CHECK (role IN ('Admin', 'Non-Conforming Staff', 'Inventory Staff', 'Scheduler')),
    is_active INTEGER NOT NULL DEFAULT 0,
    activation_token TEXT,
    last_login TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS user_permissions (
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    screen TEXT NOT NULL,
    can_view INTEGER NOT NULL DEFAULT 0,
    can_create INTEGER NOT NULL DEFAULT 0,
    can_edit INTEGER NOT NULL DEFAULT 0,
    can_delete INTEGER NOT NULL DEFAULT 0,
    is_visible INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, screen)
);

CREATE TABLE IF NOT EXISTS password_reset_codes (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL,
    code TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    used INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_reset_codes_email ON password_reset_codes(email);

-- Append-only login/logout audit
CREATE TABLE IF NOT EXISTS auth_audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    event TEXT NOT NULL CHECK (event IN ('login', 'logout')),
    occurred_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        // Re-running the provisioner must be a no-op
        conn.execute_batch(SCHEMA).unwrap();
    }

    #[test]
    fn test_category_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO blood_stock (serial_id, blood_type, rh_factor, volume_ml, category, source, collection_date, expiration_date)
             VALUES ('SN-1', 'A', '+', 450, 'Whole Blood', 'Walk-In', '2026-08-01', '2026-09-05')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_history_action_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO blood_stock_history (serial_id, action, category, acted_by)
             VALUES ('SN-1', 'MOVED', 'Plasma', 'tester')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO blood_stock_history (serial_id, action, category, acted_by)
             VALUES ('SN-1', 'ADDED', 'Plasma', 'tester')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_duplicate_serial_rejected_within_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let insert = "INSERT INTO blood_stock (serial_id, blood_type, rh_factor, volume_ml, category, source, collection_date, expiration_date)
             VALUES ('SN-1', 'A', '+', 450, 'Plasma', 'Walk-In', '2026-08-01', '2027-08-01')";
        conn.execute(insert, []).unwrap();
        assert!(conn.execute(insert, []).is_err());
    }
}
