//! Blood-unit lifecycle workflows.
//!
//! Every batch operation runs inside one transaction: either all serials
//! move or none do. Moving a unit is delete-from-source + insert-into-
//! destination because each lifecycle table carries a different attribute
//! set.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::info;

use crate::db::{self, Database, DbError};
use crate::models::{
    BloodCategory, BloodUnit, DiscardRequest, DisposalDetails, HistoryAction, Notification,
    ReleaseDetails, ReleaseRequest, UnitIntake,
};

/// Inventory workflow errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("Database error: {0}")]
    Db(DbError),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Serial id already exists: {serial_id}")]
    DuplicateSerial { serial_id: String },

    #[error("Serial id not found: {serial_id}")]
    SerialNotFound { serial_id: String },
}

impl From<DbError> for InventoryError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::DuplicateSerial { serial_id } => InventoryError::DuplicateSerial { serial_id },
            other => InventoryError::Db(other),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

/// Result of an add batch.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub added: usize,
    pub serial_ids: Vec<String>,
}

/// Result of a transfer batch.
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub transferred: usize,
}

/// Step-one discard lookup: which serials resolve on this screen.
#[derive(Debug, Clone)]
pub struct CandidateLookup {
    pub found: Vec<BloodUnit>,
    pub missing: Vec<String>,
}

/// Result of a discard batch.
#[derive(Debug, Clone)]
pub struct DiscardOutcome {
    pub discarded: usize,
    pub notification: Notification,
}

/// Result of a release batch.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub released: usize,
    pub invoice_id: Option<String>,
    pub notification: Notification,
}

/// Inventory workflow over the center database.
pub struct InventoryWorkflow<'a> {
    db: &'a mut Database,
}

impl<'a> InventoryWorkflow<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Add units to `blood_stock`.
    ///
    /// Required fields are checked before any database call; expiration is
    /// derived from the collection timestamp and the component shelf life.
    pub fn add_units(&mut self, intakes: &[UnitIntake], acting_user: &str) -> InventoryResult<AddOutcome> {
        let mut validated = Vec::with_capacity(intakes.len());
        for intake in intakes {
            let collection = validate_intake(intake)?;
            validated.push((intake, collection));
        }

        let tx = self.db.transaction()?;
        let mut serial_ids = Vec::with_capacity(validated.len());
        for (intake, collection) in validated {
            let unit = BloodUnit::from_intake(intake, collection);
            db::stock::insert_stock_unit(&tx, &unit)?;
            db::stock::append_history(
                &tx,
                &unit.serial_id,
                HistoryAction::Added,
                unit.category,
                unit.result_blood_type.as_deref(),
                acting_user,
            )?;
            serial_ids.push(unit.serial_id);
        }
        tx.commit().map_err(DbError::from)?;

        info!(added = serial_ids.len(), "blood units added to stock");
        Ok(AddOutcome {
            added: serial_ids.len(),
            serial_ids,
        })
    }

    /// Move units from `blood_stock` into `non_conforming`.
    ///
    /// Fails the whole batch if any serial is missing from stock or already
    /// present in `non_conforming`.
    pub fn transfer_to_non_conforming(
        &mut self,
        serial_ids: &[String],
        reason: Option<&str>,
        acting_user: &str,
    ) -> InventoryResult<TransferOutcome> {
        if serial_ids.is_empty() {
            return Err(InventoryError::Validation {
                field: "serial_ids",
                reason: "at least one serial id is required".into(),
            });
        }

        let tx = self.db.transaction()?;
        for serial_id in serial_ids {
            let unit = db::stock::get_stock_unit(&tx, serial_id)?.ok_or_else(|| {
                InventoryError::SerialNotFound {
                    serial_id: serial_id.clone(),
                }
            })?;
            if db::stock::exists_in_non_conforming(&tx, serial_id)? {
                return Err(InventoryError::DuplicateSerial {
                    serial_id: serial_id.clone(),
                });
            }
            db::stock::delete_stock_unit(&tx, serial_id)?;
            db::stock::insert_non_conforming_unit(&tx, &unit, reason)?;
            db::stock::append_history(
                &tx,
                serial_id,
                HistoryAction::NonConforming,
                unit.category,
                unit.result_blood_type.as_deref(),
                acting_user,
            )?;
        }
        tx.commit().map_err(DbError::from)?;

        info!(transferred = serial_ids.len(), "units moved to non-conforming");
        Ok(TransferOutcome {
            transferred: serial_ids.len(),
        })
    }

    /// Step one of the discard workflow: resolve serials against the two
    /// source tables, restricted to the screen's component category.
    pub fn find_discard_candidates(
        &self,
        serial_ids: &[String],
        category: BloodCategory,
    ) -> InventoryResult<CandidateLookup> {
        let conn = self.db.conn();
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for serial_id in serial_ids {
            let unit = match db::stock::get_stock_unit(conn, serial_id)? {
                Some(unit) => Some(unit),
                None => db::stock::get_non_conforming_unit(conn, serial_id)?,
            };
            match unit {
                Some(unit) if unit.category == category => found.push(unit),
                _ => missing.push(serial_id.clone()),
            }
        }
        Ok(CandidateLookup { found, missing })
    }

    /// Step two of the discard workflow: move the units into
    /// `discarded_blood` with their disposal metadata.
    pub fn discard_units(
        &mut self,
        request: &DiscardRequest,
        acting_user: &str,
    ) -> InventoryResult<DiscardOutcome> {
        validate_disposal(&request.details)?;
        if request.serial_ids.is_empty() {
            return Err(InventoryError::Validation {
                field: "serial_ids",
                reason: "at least one serial id is required".into(),
            });
        }

        let tx = self.db.transaction()?;
        for serial_id in &request.serial_ids {
            let unit = take_from_source(&tx, serial_id)?;
            db::stock::insert_discarded_unit(&tx, &unit, &request.details)?;
            db::stock::append_history(
                &tx,
                serial_id,
                HistoryAction::Discarded,
                unit.category,
                unit.result_blood_type.as_deref(),
                acting_user,
            )?;
        }
        let notification = Notification::blood_discarded(request.serial_ids.len(), request.category);
        db::notifications::insert_notification(&tx, &notification)?;
        tx.commit().map_err(DbError::from)?;

        info!(
            discarded = request.serial_ids.len(),
            category = request.category.as_str(),
            "units discarded"
        );
        Ok(DiscardOutcome {
            discarded: request.serial_ids.len(),
            notification,
        })
    }

    /// Move stored units into `released_blood`, optionally issuing an
    /// invoice linked through `rb_invoice_id`.
    pub fn release_units(
        &mut self,
        request: &ReleaseRequest,
        acting_user: &str,
    ) -> InventoryResult<ReleaseOutcome> {
        validate_release(&request.details)?;
        if request.serial_ids.is_empty() {
            return Err(InventoryError::Validation {
                field: "serial_ids",
                reason: "at least one serial id is required".into(),
            });
        }

        let tx = self.db.transaction()?;
        let invoice_id = if request.create_invoice {
            let invoice = crate::models::BloodInvoice::new(
                request.details.facility_name.clone(),
                request.serial_ids.len() as i64,
                acting_user.to_string(),
            );
            db::invoices::insert_invoice(&tx, &invoice)?;
            Some(invoice.invoice_id)
        } else {
            None
        };

        for serial_id in &request.serial_ids {
            let unit = db::stock::get_stock_unit(&tx, serial_id)?.ok_or_else(|| {
                InventoryError::SerialNotFound {
                    serial_id: serial_id.clone(),
                }
            })?;
            db::stock::delete_stock_unit(&tx, serial_id)?;
            db::stock::insert_released_unit(&tx, &unit, &request.details, invoice_id.as_deref())?;
            db::stock::append_history(
                &tx,
                serial_id,
                HistoryAction::Released,
                unit.category,
                unit.result_blood_type.as_deref(),
                acting_user,
            )?;
        }
        let notification = Notification::blood_released(
            request.serial_ids.len(),
            request.category,
            &request.details.facility_name,
        );
        db::notifications::insert_notification(&tx, &notification)?;
        tx.commit().map_err(DbError::from)?;

        info!(
            released = request.serial_ids.len(),
            category = request.category.as_str(),
            "units released"
        );
        Ok(ReleaseOutcome {
            released: request.serial_ids.len(),
            invoice_id,
            notification,
        })
    }
}

/// Locate a unit in `blood_stock` or `non_conforming` and remove it there.
fn take_from_source(
    conn: &rusqlite::Connection,
    serial_id: &str,
) -> InventoryResult<BloodUnit> {
    if let Some(unit) = db::stock::get_stock_unit(conn, serial_id)? {
        db::stock::delete_stock_unit(conn, serial_id)?;
        return Ok(unit);
    }
    if let Some(unit) = db::stock::get_non_conforming_unit(conn, serial_id)? {
        db::stock::delete_non_conforming_unit(conn, serial_id)?;
        return Ok(unit);
    }
    Err(InventoryError::SerialNotFound {
        serial_id: serial_id.to_string(),
    })
}

fn validate_intake(intake: &UnitIntake) -> InventoryResult<DateTime<Utc>> {
    if intake.serial_id.trim().is_empty() {
        return Err(InventoryError::Validation {
            field: "serial_id",
            reason: "serial id is required".into(),
        });
    }
    if intake.volume_ml <= 0 {
        return Err(InventoryError::Validation {
            field: "volume_ml",
            reason: "volume must be positive".into(),
        });
    }
    let collection: DateTime<Utc> = intake
        .collection_date
        .parse()
        .map_err(|_| InventoryError::Validation {
            field: "collection_date",
            reason: format!("not a valid timestamp: {}", intake.collection_date),
        })?;
    Ok(collection)
}

fn validate_disposal(details: &DisposalDetails) -> InventoryResult<()> {
    let required: [(&'static str, &str); 6] = [
        ("responsible_personnel", &details.responsible_personnel),
        ("reason_for_discarding", &details.reason_for_discarding),
        ("authorized_by", &details.authorized_by),
        ("date_of_discard", &details.date_of_discard),
        ("time_of_discard", &details.time_of_discard),
        ("method_of_disposal", &details.method_of_disposal),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(InventoryError::Validation {
                field,
                reason: "field is required".into(),
            });
        }
    }
    Ok(())
}

fn validate_release(details: &ReleaseDetails) -> InventoryResult<()> {
    let required: [(&'static str, &str); 5] = [
        ("recipient_name", &details.recipient_name),
        ("facility_name", &details.facility_name),
        ("released_by", &details.released_by),
        ("release_date", &details.release_date),
        ("release_time", &details.release_time),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(InventoryError::Validation {
                field,
                reason: "field is required".into(),
            });
        }
    }
    Ok(())
}
