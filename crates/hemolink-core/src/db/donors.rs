//! Donor registry operations: the authoritative `donor_records` table and
//! the `temp_donor_records` staging area.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{DonationEvent, DonorRecord, StagedDonorRecord, SyncStatus};

const DONOR_COLUMNS: &str = "donor_id, first_name, last_name, middle_name, birth_date, sex, \
     contact_number, email, address, blood_type, rh_factor, result_blood_type, \
     donation_count, donation_dates, last_donation_date, source_organization, \
     created_at, modified_at";

const TEMP_COLUMNS: &str = "id, donor_id, first_name, last_name, middle_name, birth_date, sex, \
     contact_number, email, address, blood_type, rh_factor, source_organization, \
     source_user_id, source_user_name, sync_status, sync_requested_at, \
     sync_approved_at, sync_approved_by, rejection_reason";

/// Intermediate row struct for donor mapping.
struct DonorRow {
    donor_id: String,
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
    birth_date: Option<String>,
    sex: Option<String>,
    contact_number: Option<String>,
    email: Option<String>,
    address: Option<String>,
    blood_type: Option<String>,
    rh_factor: Option<String>,
    result_blood_type: Option<String>,
    donation_count: i64,
    donation_dates: String,
    last_donation_date: Option<String>,
    source_organization: Option<String>,
    created_at: String,
    modified_at: String,
}

fn map_donor_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DonorRow> {
    Ok(DonorRow {
        donor_id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        middle_name: row.get(3)?,
        birth_date: row.get(4)?,
        sex: row.get(5)?,
        contact_number: row.get(6)?,
        email: row.get(7)?,
        address: row.get(8)?,
        blood_type: row.get(9)?,
        rh_factor: row.get(10)?,
        result_blood_type: row.get(11)?,
        donation_count: row.get(12)?,
        donation_dates: row.get(13)?,
        last_donation_date: row.get(14)?,
        source_organization: row.get(15)?,
        created_at: row.get(16)?,
        modified_at: row.get(17)?,
    })
}

impl TryFrom<DonorRow> for DonorRecord {
    type Error = DbError;

    fn try_from(row: DonorRow) -> Result<Self, Self::Error> {
        let donation_dates: Vec<DonationEvent> = serde_json::from_str(&row.donation_dates)?;
        Ok(DonorRecord {
            donor_id: row.donor_id,
            first_name: row.first_name,
            last_name: row.last_name,
            middle_name: row.middle_name,
            birth_date: row.birth_date,
            sex: row.sex,
            contact_number: row.contact_number,
            email: row.email,
            address: row.address,
            blood_type: row.blood_type,
            rh_factor: row.rh_factor,
            result_blood_type: row.result_blood_type,
            donation_count: row.donation_count,
            donation_dates,
            last_donation_date: row.last_donation_date,
            source_organization: row.source_organization,
            created_at: row.created_at,
            modified_at: row.modified_at,
        })
    }
}

/// Insert a new donor.
pub fn insert_donor(conn: &Connection, donor: &DonorRecord) -> DbResult<()> {
    let donation_dates_json = serde_json::to_string(&donor.donation_dates)?;
    conn.execute(
        r#"
        INSERT INTO donor_records (
            donor_id, first_name, last_name, middle_name, birth_date, sex,
            contact_number, email, address, blood_type, rh_factor,
            result_blood_type, donation_count, donation_dates,
            last_donation_date, source_organization, created_at, modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
        params![
            donor.donor_id,
            donor.first_name,
            donor.last_name,
            donor.middle_name,
            donor.birth_date,
            donor.sex,
            donor.contact_number,
            donor.email,
            donor.address,
            donor.blood_type,
            donor.rh_factor,
            donor.result_blood_type,
            donor.donation_count,
            donation_dates_json,
            donor.last_donation_date,
            donor.source_organization,
            donor.created_at,
            donor.modified_at,
        ],
    )?;
    Ok(())
}

/// Update an existing donor in full.
pub fn update_donor(conn: &Connection, donor: &DonorRecord) -> DbResult<bool> {
    let donation_dates_json = serde_json::to_string(&donor.donation_dates)?;
    let rows_affected = conn.execute(
        r#"
        UPDATE donor_records SET
            first_name = ?2,
            last_name = ?3,
            middle_name = ?4,
            birth_date = ?5,
            sex = ?6,
            contact_number = ?7,
            email = ?8,
            address = ?9,
            blood_type = ?10,
            rh_factor = ?11,
            result_blood_type = ?12,
            donation_count = ?13,
            donation_dates = ?14,
            last_donation_date = ?15,
            source_organization = ?16,
            modified_at = ?17
        WHERE donor_id = ?1
        "#,
        params![
            donor.donor_id,
            donor.first_name,
            donor.last_name,
            donor.middle_name,
            donor.birth_date,
            donor.sex,
            donor.contact_number,
            donor.email,
            donor.address,
            donor.blood_type,
            donor.rh_factor,
            donor.result_blood_type,
            donor.donation_count,
            donation_dates_json,
            donor.last_donation_date,
            donor.source_organization,
            donor.modified_at,
        ],
    )?;
    Ok(rows_affected > 0)
}

/// Get a donor by id.
pub fn get_donor(conn: &Connection, donor_id: &str) -> DbResult<Option<DonorRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM donor_records WHERE donor_id = ?", DONOR_COLUMNS),
        [donor_id],
        map_donor_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Find the authoritative duplicate for a submission under the identity rule:
/// donor-id equality OR case-insensitive trimmed first+last name equality.
///
/// A donor-id match wins over a name match; among name matches the oldest
/// row is the one that survives and absorbs the donation.
pub fn find_duplicate(
    conn: &Connection,
    donor_id: Option<&str>,
    first_name: &str,
    last_name: &str,
) -> DbResult<Option<DonorRecord>> {
    conn.query_row(
        &format!(
            r#"
            SELECT {} FROM donor_records
            WHERE donor_id = ?1
               OR (lower(trim(first_name)) = lower(trim(?2))
                   AND lower(trim(last_name)) = lower(trim(?3)))
            ORDER BY CASE WHEN donor_id = ?1 THEN 0 ELSE 1 END, created_at ASC
            LIMIT 1
            "#,
            DONOR_COLUMNS
        ),
        params![donor_id, first_name, last_name],
        map_donor_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Allocate the next sequential donor id, format `DNR-####-ON`.
pub fn next_donor_id(conn: &Connection) -> DbResult<String> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(CAST(substr(donor_id, 5, length(donor_id) - 7) AS INTEGER)), 0)
         FROM donor_records WHERE donor_id LIKE 'DNR-%-ON'",
        [],
        |row| row.get(0),
    )?;
    Ok(format!("DNR-{:04}-ON", max + 1))
}

// ============================================================================
// Staging area
// ============================================================================

/// Intermediate row struct for staged-record mapping.
struct TempDonorRow {
    id: String,
    donor_id: Option<String>,
    first_name: String,
    last_name: String,
    middle_name: Option<String>,
    birth_date: Option<String>,
    sex: Option<String>,
    contact_number: Option<String>,
    email: Option<String>,
    address: Option<String>,
    blood_type: Option<String>,
    rh_factor: Option<String>,
    source_organization: Option<String>,
    source_user_id: String,
    source_user_name: String,
    sync_status: String,
    sync_requested_at: String,
    sync_approved_at: Option<String>,
    sync_approved_by: Option<String>,
    rejection_reason: Option<String>,
}

fn map_temp_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TempDonorRow> {
    Ok(TempDonorRow {
        id: row.get(0)?,
        donor_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        middle_name: row.get(4)?,
        birth_date: row.get(5)?,
        sex: row.get(6)?,
        contact_number: row.get(7)?,
        email: row.get(8)?,
        address: row.get(9)?,
        blood_type: row.get(10)?,
        rh_factor: row.get(11)?,
        source_organization: row.get(12)?,
        source_user_id: row.get(13)?,
        source_user_name: row.get(14)?,
        sync_status: row.get(15)?,
        sync_requested_at: row.get(16)?,
        sync_approved_at: row.get(17)?,
        sync_approved_by: row.get(18)?,
        rejection_reason: row.get(19)?,
    })
}

impl TryFrom<TempDonorRow> for StagedDonorRecord {
    type Error = DbError;

    fn try_from(row: TempDonorRow) -> Result<Self, Self::Error> {
        let sync_status = SyncStatus::parse(&row.sync_status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown sync status: {}", row.sync_status)))?;
        Ok(StagedDonorRecord {
            id: row.id,
            donor_id: row.donor_id,
            first_name: row.first_name,
            last_name: row.last_name,
            middle_name: row.middle_name,
            birth_date: row.birth_date,
            sex: row.sex,
            contact_number: row.contact_number,
            email: row.email,
            address: row.address,
            blood_type: row.blood_type,
            rh_factor: row.rh_factor,
            source_organization: row.source_organization,
            source_user_id: row.source_user_id,
            source_user_name: row.source_user_name,
            sync_status,
            sync_requested_at: row.sync_requested_at,
            sync_approved_at: row.sync_approved_at,
            sync_approved_by: row.sync_approved_by,
            rejection_reason: row.rejection_reason,
        })
    }
}

/// Insert a staged record.
pub fn insert_temp_donor(conn: &Connection, staged: &StagedDonorRecord) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO temp_donor_records (
            id, donor_id, first_name, last_name, middle_name, birth_date, sex,
            contact_number, email, address, blood_type, rh_factor,
            source_organization, source_user_id, source_user_name,
            sync_status, sync_requested_at, sync_approved_at,
            sync_approved_by, rejection_reason
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
        "#,
        params![
            staged.id,
            staged.donor_id,
            staged.first_name,
            staged.last_name,
            staged.middle_name,
            staged.birth_date,
            staged.sex,
            staged.contact_number,
            staged.email,
            staged.address,
            staged.blood_type,
            staged.rh_factor,
            staged.source_organization,
            staged.source_user_id,
            staged.source_user_name,
            staged.sync_status.as_str(),
            staged.sync_requested_at,
            staged.sync_approved_at,
            staged.sync_approved_by,
            staged.rejection_reason,
        ],
    )?;
    Ok(())
}

/// Get a staged record by id.
pub fn get_temp_donor(conn: &Connection, id: &str) -> DbResult<Option<StagedDonorRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM temp_donor_records WHERE id = ?", TEMP_COLUMNS),
        [id],
        map_temp_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// List staged records still awaiting review, oldest submission first.
pub fn list_pending_temp_donors(conn: &Connection) -> DbResult<Vec<StagedDonorRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM temp_donor_records WHERE sync_status = 'pending' ORDER BY sync_requested_at",
        TEMP_COLUMNS
    ))?;
    let rows = stmt.query_map([], map_temp_row)?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row?.try_into()?);
    }
    Ok(records)
}

/// Mark a staged record approved.
pub fn mark_temp_approved(
    conn: &Connection,
    id: &str,
    approved_by: &str,
    approved_at: &str,
) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE temp_donor_records SET sync_status = 'approved', sync_approved_at = ?2, sync_approved_by = ?3
         WHERE id = ?1",
        params![id, approved_at, approved_by],
    )?;
    Ok(rows_affected > 0)
}

/// Mark a staged record rejected with its reason.
pub fn mark_temp_rejected(conn: &Connection, id: &str, reason: &str) -> DbResult<bool> {
    let rows_affected = conn.execute(
        "UPDATE temp_donor_records SET sync_status = 'rejected', rejection_reason = ?2 WHERE id = ?1",
        params![id, reason],
    )?;
    Ok(rows_affected > 0)
}

/// Purge approved staged records. Returns the number removed.
pub fn delete_approved_temp_donors(conn: &Connection) -> DbResult<usize> {
    let rows = conn.execute(
        "DELETE FROM temp_donor_records WHERE sync_status = 'approved'",
        [],
    )?;
    Ok(rows)
}

impl Database {
    /// List all donors, by name.
    pub fn list_donors(&self) -> DbResult<Vec<DonorRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM donor_records ORDER BY last_name, first_name",
            DONOR_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_donor_row)?;

        let mut donors = Vec::new();
        for row in rows {
            donors.push(row?.try_into()?);
        }
        Ok(donors)
    }

    /// Search donors by name prefix (either name part).
    pub fn search_donors(&self, query: &str, limit: usize) -> DbResult<Vec<DonorRecord>> {
        let pattern = format!("{}%", query);
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM donor_records
             WHERE first_name LIKE ?1 OR last_name LIKE ?1
             ORDER BY last_name, first_name
             LIMIT ?2",
            DONOR_COLUMNS
        ))?;
        let rows = stmt.query_map(params![pattern, limit as i64], map_donor_row)?;

        let mut donors = Vec::new();
        for row in rows {
            donors.push(row?.try_into()?);
        }
        Ok(donors)
    }

    /// List staged records by review state.
    pub fn list_temp_donors_by_status(&self, status: SyncStatus) -> DbResult<Vec<StagedDonorRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {} FROM temp_donor_records WHERE sync_status = ? ORDER BY sync_requested_at",
            TEMP_COLUMNS
        ))?;
        let rows = stmt.query_map([status.as_str()], map_temp_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }
}
