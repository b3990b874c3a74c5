//! Blood-unit table operations.
//!
//! Row-level operations take a `&Connection` so the batch workflows can run
//! them inside one transaction; `Database` methods wrap the common reads.

use rusqlite::{params, Connection, OptionalExtension};

use super::{map_serial_conflict, Database, DbError, DbResult};
use crate::models::bloodtype::derive_result_blood_type;
use crate::models::{
    BloodCategory, BloodUnit, CollectionSource, DisposalDetails, DiscardedUnit, HistoryAction,
    HistoryEvent, ReleaseDetails, ReleasedUnit,
};

const UNIT_COLUMNS: &str = "serial_id, blood_type, rh_factor, result_blood_type, volume_ml, \
     category, source, collection_date, expiration_date, status";

/// Intermediate row struct for database mapping.
struct UnitRow {
    serial_id: String,
    blood_type: String,
    rh_factor: String,
    result_blood_type: Option<String>,
    volume_ml: i64,
    category: String,
    source: String,
    collection_date: String,
    expiration_date: String,
    status: String,
    created_at: String,
    updated_at: String,
}

fn map_unit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnitRow> {
    Ok(UnitRow {
        serial_id: row.get(0)?,
        blood_type: row.get(1)?,
        rh_factor: row.get(2)?,
        result_blood_type: row.get(3)?,
        volume_ml: row.get(4)?,
        category: row.get(5)?,
        source: row.get(6)?,
        collection_date: row.get(7)?,
        expiration_date: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl TryFrom<UnitRow> for BloodUnit {
    type Error = DbError;

    fn try_from(row: UnitRow) -> Result<Self, Self::Error> {
        let category = BloodCategory::parse(&row.category)
            .ok_or_else(|| DbError::Constraint(format!("Unknown category: {}", row.category)))?;
        let source = CollectionSource::parse(&row.source)
            .ok_or_else(|| DbError::Constraint(format!("Unknown source: {}", row.source)))?;
        Ok(BloodUnit {
            serial_id: row.serial_id,
            blood_type: row.blood_type,
            rh_factor: row.rh_factor,
            result_blood_type: row.result_blood_type,
            volume_ml: row.volume_ml,
            category,
            source,
            collection_date: row.collection_date,
            expiration_date: row.expiration_date,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ============================================================================
// blood_stock
// ============================================================================

/// Insert a unit into `blood_stock`.
pub fn insert_stock_unit(conn: &Connection, unit: &BloodUnit) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO blood_stock (
            serial_id, blood_type, rh_factor, result_blood_type, volume_ml,
            category, source, collection_date, expiration_date, status,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            unit.serial_id,
            unit.blood_type,
            unit.rh_factor,
            unit.result_blood_type,
            unit.volume_ml,
            unit.category.as_str(),
            unit.source.as_str(),
            unit.collection_date,
            unit.expiration_date,
            unit.status,
            unit.created_at,
            unit.updated_at,
        ],
    )
    .map_err(|e| map_serial_conflict(e, &unit.serial_id))?;
    Ok(())
}

/// Get a stored unit by serial id.
pub fn get_stock_unit(conn: &Connection, serial_id: &str) -> DbResult<Option<BloodUnit>> {
    conn.query_row(
        &format!(
            "SELECT {}, created_at, updated_at FROM blood_stock WHERE serial_id = ?",
            UNIT_COLUMNS
        ),
        [serial_id],
        map_unit_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Delete a stored unit. Returns whether a row was removed.
pub fn delete_stock_unit(conn: &Connection, serial_id: &str) -> DbResult<bool> {
    let rows = conn.execute("DELETE FROM blood_stock WHERE serial_id = ?", [serial_id])?;
    Ok(rows > 0)
}

fn list_units(conn: &Connection, table: &str) -> DbResult<Vec<BloodUnit>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, created_at, updated_at FROM {} ORDER BY serial_id",
        UNIT_COLUMNS, table
    ))?;
    let rows = stmt.query_map([], map_unit_row)?;

    let mut units = Vec::new();
    for row in rows {
        units.push(row?.try_into()?);
    }
    Ok(units)
}

/// Count currently-stored units for a category.
pub fn count_stored_by_category(conn: &Connection, category: BloodCategory) -> DbResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM blood_stock WHERE category = ?",
        [category.as_str()],
        |row| row.get(0),
    )?;
    Ok(count)
}

// ============================================================================
// non_conforming
// ============================================================================

/// Whether a serial id already exists in `non_conforming`.
pub fn exists_in_non_conforming(conn: &Connection, serial_id: &str) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM non_conforming WHERE serial_id = ?",
        [serial_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert a unit into `non_conforming` with its status updated.
pub fn insert_non_conforming_unit(
    conn: &Connection,
    unit: &BloodUnit,
    reason: Option<&str>,
) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO non_conforming (
            serial_id, blood_type, rh_factor, result_blood_type, volume_ml,
            category, source, collection_date, expiration_date, status,
            reason, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'Non-Conforming', ?10, ?11, datetime('now'))
        "#,
        params![
            unit.serial_id,
            unit.blood_type,
            unit.rh_factor,
            unit.result_blood_type,
            unit.volume_ml,
            unit.category.as_str(),
            unit.source.as_str(),
            unit.collection_date,
            unit.expiration_date,
            reason,
            unit.created_at,
        ],
    )
    .map_err(|e| map_serial_conflict(e, &unit.serial_id))?;
    Ok(())
}

/// Get a non-conforming unit by serial id.
pub fn get_non_conforming_unit(conn: &Connection, serial_id: &str) -> DbResult<Option<BloodUnit>> {
    conn.query_row(
        &format!(
            "SELECT {}, created_at, updated_at FROM non_conforming WHERE serial_id = ?",
            UNIT_COLUMNS
        ),
        [serial_id],
        map_unit_row,
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// Delete a non-conforming unit. Returns whether a row was removed.
pub fn delete_non_conforming_unit(conn: &Connection, serial_id: &str) -> DbResult<bool> {
    let rows = conn.execute(
        "DELETE FROM non_conforming WHERE serial_id = ?",
        [serial_id],
    )?;
    Ok(rows > 0)
}

// ============================================================================
// released_blood / discarded_blood
// ============================================================================

/// Insert a unit into `released_blood` with recipient/facility metadata.
pub fn insert_released_unit(
    conn: &Connection,
    unit: &BloodUnit,
    details: &ReleaseDetails,
    invoice_id: Option<&str>,
) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO released_blood (
            serial_id, blood_type, rh_factor, result_blood_type, volume_ml,
            category, source, collection_date, expiration_date, status,
            recipient_name, facility_name, released_by, release_date,
            release_time, remarks, rb_invoice_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'Released', ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
        params![
            unit.serial_id,
            unit.blood_type,
            unit.rh_factor,
            unit.result_blood_type,
            unit.volume_ml,
            unit.category.as_str(),
            unit.source.as_str(),
            unit.collection_date,
            unit.expiration_date,
            details.recipient_name,
            details.facility_name,
            details.released_by,
            details.release_date,
            details.release_time,
            details.remarks,
            invoice_id,
        ],
    )
    .map_err(|e| map_serial_conflict(e, &unit.serial_id))?;
    Ok(())
}

/// Insert a unit into `discarded_blood` with disposal metadata.
pub fn insert_discarded_unit(
    conn: &Connection,
    unit: &BloodUnit,
    details: &DisposalDetails,
) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO discarded_blood (
            serial_id, blood_type, rh_factor, result_blood_type, volume_ml,
            category, source, collection_date, expiration_date, status,
            responsible_personnel, reason_for_discarding, authorized_by,
            date_of_discard, time_of_discard, method_of_disposal, remarks
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'Discarded', ?10, ?11, ?12, ?13, ?14, ?15, ?16)
        "#,
        params![
            unit.serial_id,
            unit.blood_type,
            unit.rh_factor,
            unit.result_blood_type,
            unit.volume_ml,
            unit.category.as_str(),
            unit.source.as_str(),
            unit.collection_date,
            unit.expiration_date,
            details.responsible_personnel,
            details.reason_for_discarding,
            details.authorized_by,
            details.date_of_discard,
            details.time_of_discard,
            details.method_of_disposal,
            details.remarks,
        ],
    )
    .map_err(|e| map_serial_conflict(e, &unit.serial_id))?;
    Ok(())
}

// ============================================================================
// History
// ============================================================================

/// Append one transition row to the audit log.
pub fn append_history(
    conn: &Connection,
    serial_id: &str,
    action: HistoryAction,
    category: BloodCategory,
    result_blood_type: Option<&str>,
    acted_by: &str,
) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO blood_stock_history (serial_id, action, category, result_blood_type, acted_by)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            serial_id,
            action.as_str(),
            category.as_str(),
            result_blood_type,
            acted_by,
        ],
    )?;
    Ok(())
}

fn history_has_serial(conn: &Connection, serial_id: &str) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM blood_stock_history WHERE serial_id = ?",
        [serial_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Database {
    /// List all stored units.
    pub fn list_blood_stock(&self) -> DbResult<Vec<BloodUnit>> {
        list_units(self.conn(), "blood_stock")
    }

    /// List stored units of one category.
    pub fn list_blood_stock_by_category(&self, category: BloodCategory) -> DbResult<Vec<BloodUnit>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {}, created_at, updated_at FROM blood_stock WHERE category = ? ORDER BY serial_id",
            UNIT_COLUMNS
        ))?;
        let rows = stmt.query_map([category.as_str()], map_unit_row)?;

        let mut units = Vec::new();
        for row in rows {
            units.push(row?.try_into()?);
        }
        Ok(units)
    }

    /// List all non-conforming units.
    pub fn list_non_conforming(&self) -> DbResult<Vec<BloodUnit>> {
        list_units(self.conn(), "non_conforming")
    }

    /// Count currently-stored units for a category.
    pub fn count_stored_by_category(&self, category: BloodCategory) -> DbResult<i64> {
        count_stored_by_category(self.conn(), category)
    }

    /// List released units with their release metadata.
    pub fn list_released(&self) -> DbResult<Vec<ReleasedUnit>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {}, created_at, created_at, recipient_name, facility_name, released_by, \
             release_date, release_time, remarks, rb_invoice_id \
             FROM released_blood ORDER BY serial_id",
            UNIT_COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| {
            let unit = map_unit_row(row)?;
            let details = ReleaseDetails {
                recipient_name: row.get(12)?,
                facility_name: row.get(13)?,
                released_by: row.get(14)?,
                release_date: row.get(15)?,
                release_time: row.get(16)?,
                remarks: row.get(17)?,
            };
            let invoice_id: Option<String> = row.get(18)?;
            Ok((unit, details, invoice_id))
        })?;

        let mut units = Vec::new();
        for row in rows {
            let (unit, details, invoice_id) = row?;
            units.push(ReleasedUnit {
                unit: unit.try_into()?,
                details,
                invoice_id,
            });
        }
        Ok(units)
    }

    /// List discarded units with their disposal metadata.
    pub fn list_discarded(&self) -> DbResult<Vec<DiscardedUnit>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {}, created_at, created_at, responsible_personnel, reason_for_discarding, \
             authorized_by, date_of_discard, time_of_discard, method_of_disposal, remarks \
             FROM discarded_blood ORDER BY serial_id",
            UNIT_COLUMNS
        ))?;
        let rows = stmt.query_map([], |row| {
            let unit = map_unit_row(row)?;
            let details = DisposalDetails {
                responsible_personnel: row.get(12)?,
                reason_for_discarding: row.get(13)?,
                authorized_by: row.get(14)?,
                date_of_discard: row.get(15)?,
                time_of_discard: row.get(16)?,
                method_of_disposal: row.get(17)?,
                remarks: row.get(18)?,
            };
            Ok((unit, details))
        })?;

        let mut units = Vec::new();
        for row in rows {
            let (unit, details) = row?;
            units.push(DiscardedUnit {
                unit: unit.try_into()?,
                details,
            });
        }
        Ok(units)
    }

    /// List the audit log for one serial id, oldest first.
    pub fn list_history_for_serial(&self, serial_id: &str) -> DbResult<Vec<HistoryEvent>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, serial_id, action, category, result_blood_type, acted_by, recorded_at
             FROM blood_stock_history WHERE serial_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map([serial_id], map_history_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row??);
        }
        Ok(events)
    }

    /// Count history rows for an action recorded at or after `since`.
    pub fn count_history_since(&self, action: HistoryAction, since: &str) -> DbResult<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM blood_stock_history WHERE action = ? AND recorded_at >= ?",
            params![action.as_str(), since],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// One-time backfill of the audit log from current table contents.
    ///
    /// Serials that already have any history row are skipped, so re-running
    /// is a no-op. Returns the number of rows inserted.
    pub fn backfill_stock_history(&mut self) -> DbResult<usize> {
        let sources: [(&str, HistoryAction); 4] = [
            ("blood_stock", HistoryAction::Added),
            ("non_conforming", HistoryAction::NonConforming),
            ("released_blood", HistoryAction::Released),
            ("discarded_blood", HistoryAction::Discarded),
        ];

        let tx = self.transaction()?;
        let mut inserted = 0;
        for (table, action) in sources {
            let rows: Vec<(String, String, Option<String>)> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT serial_id, category, result_blood_type FROM {}",
                    table
                ))?;
                let mapped = stmt.query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
                mapped.collect::<Result<_, _>>()?
            };

            for (serial_id, category, result_blood_type) in rows {
                if history_has_serial(&tx, &serial_id)? {
                    continue;
                }
                let category = BloodCategory::parse(&category).ok_or_else(|| {
                    DbError::Constraint(format!("Unknown category: {}", category))
                })?;
                append_history(
                    &tx,
                    &serial_id,
                    action,
                    category,
                    result_blood_type.as_deref(),
                    "backfill",
                )?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Fill missing `result_blood_type` values across all tables that carry
    /// one. Only null/empty values are touched, so re-running is a no-op.
    /// Returns the number of rows updated.
    pub fn backfill_result_blood_type(&mut self) -> DbResult<usize> {
        let tables = [
            ("blood_stock", "serial_id"),
            ("non_conforming", "serial_id"),
            ("released_blood", "serial_id"),
            ("discarded_blood", "serial_id"),
            ("donor_records", "donor_id"),
        ];

        let tx = self.transaction()?;
        let mut updated = 0;
        for (table, key) in tables {
            let rows: Vec<(String, String, String)> = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {key}, blood_type, rh_factor FROM {table} \
                     WHERE (result_blood_type IS NULL OR result_blood_type = '') \
                       AND blood_type IS NOT NULL AND blood_type != '' \
                       AND rh_factor IS NOT NULL",
                ))?;
                let mapped = stmt.query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?;
                mapped.collect::<Result<_, _>>()?
            };

            for (id, blood_type, rh_factor) in rows {
                if let Some(result) = derive_result_blood_type(&blood_type, &rh_factor) {
                    tx.execute(
                        &format!("UPDATE {table} SET result_blood_type = ?1 WHERE {key} = ?2"),
                        params![result, id],
                    )?;
                    updated += 1;
                }
            }
        }
        tx.commit()?;
        Ok(updated)
    }
}

type HistoryRowResult = Result<HistoryEvent, DbError>;

fn map_history_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryRowResult> {
    let action_str: String = row.get(2)?;
    let category_str: String = row.get(3)?;
    Ok((|| {
        let action = HistoryAction::parse(&action_str)
            .ok_or_else(|| DbError::Constraint(format!("Unknown action: {}", action_str)))?;
        let category = BloodCategory::parse(&category_str)
            .ok_or_else(|| DbError::Constraint(format!("Unknown category: {}", category_str)))?;
        Ok(HistoryEvent {
            id: row.get(0)?,
            serial_id: row.get(1)?,
            action,
            category,
            result_blood_type: row.get(4)?,
            acted_by: row.get(5)?,
            recorded_at: row.get(6)?,
        })
    })())
}
