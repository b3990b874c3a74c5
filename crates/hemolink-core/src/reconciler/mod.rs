//! Donor-sync reconciliation.
//!
//! Partner organizations submit donor batches into `temp_donor_records`;
//! a center admin approves or rejects them. Approval moves each staged
//! record into the master table — or, when the record matches an existing
//! donor, accumulates a donation event on the surviving row instead.
//!
//! The duplicate rule is deliberate: donor-id equality OR case-insensitive
//! trimmed first+last name equality. It trades false-positive merges on
//! common names for not requiring a stable cross-organization identifier,
//! and must not be tightened or loosened here.

use chrono::Utc;
use strsim::jaro_winkler;
use thiserror::Error;
use tracing::info;

use crate::db::{self, Database, DbError};
use crate::models::{
    DonorRecord, DonorSubmission, Notification, StagedDonorRecord, SyncStatus,
};

/// Similarity floor for the advisory duplicate listing.
const SIMILARITY_THRESHOLD: f64 = 0.80;

/// Sync reconciliation errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Staged record not found: {0}")]
    NotFound(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Result of an approval batch.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    /// Donors inserted fresh into the master table.
    pub new_records: Vec<DonorRecord>,
    /// Existing donors that absorbed a donation event.
    pub merged_records: Vec<DonorRecord>,
    pub total_processed: usize,
}

/// An existing donor ranked against a staged record.
///
/// Advisory only: shown on the review screen so a reviewer can spot near
/// misses the exact rule will not merge. Never feeds the merge decision.
#[derive(Debug, Clone)]
pub struct SimilarDonor {
    pub donor: DonorRecord,
    pub score: f64,
}

/// Reconciler over the center database.
pub struct SyncReconciler<'a> {
    db: &'a mut Database,
}

impl<'a> SyncReconciler<'a> {
    pub fn new(db: &'a mut Database) -> Self {
        Self { db }
    }

    /// Stage a batch of donor submissions. Pure append: no matching against
    /// existing donors happens at submission time.
    pub fn request_sync(
        &mut self,
        submissions: &[DonorSubmission],
        organization: &str,
        user_id: &str,
        user_name: &str,
    ) -> SyncResult<Vec<StagedDonorRecord>> {
        for submission in submissions {
            if submission.first_name.trim().is_empty() {
                return Err(SyncError::Validation {
                    field: "first_name",
                    reason: "first name is required".into(),
                });
            }
            if submission.last_name.trim().is_empty() {
                return Err(SyncError::Validation {
                    field: "last_name",
                    reason: "last name is required".into(),
                });
            }
        }

        let tx = self.db.transaction()?;
        let mut staged = Vec::with_capacity(submissions.len());
        for submission in submissions {
            let record =
                StagedDonorRecord::from_submission(submission, organization, user_id, user_name);
            db::donors::insert_temp_donor(&tx, &record)?;
            staged.push(record);
        }
        tx.commit().map_err(DbError::from)?;

        info!(
            staged = staged.len(),
            organization, "donor sync batch staged"
        );
        Ok(staged)
    }

    /// Approve every pending staged record in one transaction.
    ///
    /// Per record: find a duplicate under the identity rule; merge a
    /// donation event onto the surviving donor, or insert a fresh master
    /// row with a newly allocated sequential id. The staged record is
    /// marked approved either way. A second call with nothing pending is a
    /// no-op returning zero counts.
    pub fn approve_all(&mut self, approved_by: &str) -> SyncResult<ApprovalOutcome> {
        let tx = self.db.transaction()?;
        let pending = db::donors::list_pending_temp_donors(&tx)?;

        let mut new_records = Vec::new();
        let mut merged_records = Vec::new();
        for staged in &pending {
            let now = Utc::now().to_rfc3339();
            let duplicate = db::donors::find_duplicate(
                &tx,
                staged.donor_id.as_deref(),
                &staged.first_name,
                &staged.last_name,
            )?;

            match duplicate {
                Some(mut donor) => {
                    donor.record_donation(&now);
                    db::donors::update_donor(&tx, &donor)?;
                    merged_records.push(donor);
                }
                None => {
                    let donor_id = db::donors::next_donor_id(&tx)?;
                    let donor = DonorRecord::from_staged(staged, donor_id, &now);
                    db::donors::insert_donor(&tx, &donor)?;
                    new_records.push(donor);
                }
            }
            db::donors::mark_temp_approved(&tx, &staged.id, approved_by, &now)?;
        }

        if !pending.is_empty() {
            let notification =
                Notification::donor_sync_processed(new_records.len(), merged_records.len());
            db::notifications::insert_notification(&tx, &notification)?;
        }
        tx.commit().map_err(DbError::from)?;

        info!(
            new = new_records.len(),
            merged = merged_records.len(),
            approved_by,
            "donor sync batch approved"
        );
        Ok(ApprovalOutcome {
            total_processed: pending.len(),
            new_records,
            merged_records,
        })
    }

    /// Reject one staged record with a mandatory reason. Independent per
    /// record, not batched. Rejecting an already-settled record is a no-op
    /// returning the record unchanged.
    pub fn decline(&mut self, id: &str, reason: &str) -> SyncResult<StagedDonorRecord> {
        if reason.trim().is_empty() {
            return Err(SyncError::Validation {
                field: "reason",
                reason: "a rejection reason is required".into(),
            });
        }

        let conn = self.db.conn();
        let staged = db::donors::get_temp_donor(conn, id)?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        if staged.sync_status != SyncStatus::Pending {
            return Ok(staged);
        }

        db::donors::mark_temp_rejected(conn, id, reason)?;
        let updated = db::donors::get_temp_donor(conn, id)?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;
        Ok(updated)
    }

    /// Purge approved staged records. Explicit maintenance, never automatic.
    pub fn cleanup_approved(&mut self) -> SyncResult<usize> {
        let removed = db::donors::delete_approved_temp_donors(self.db.conn())?;
        info!(removed, "approved staged donor records purged");
        Ok(removed)
    }

    /// Rank existing donors by name similarity to a staged record.
    pub fn similar_donors(
        &self,
        staged: &StagedDonorRecord,
        limit: usize,
    ) -> SyncResult<Vec<SimilarDonor>> {
        let target = staged.full_name().to_lowercase();
        let mut scored: Vec<SimilarDonor> = self
            .db
            .list_donors()?
            .into_iter()
            .map(|donor| {
                let name = format!(
                    "{} {}",
                    donor.first_name.trim(),
                    donor.last_name.trim()
                )
                .to_lowercase();
                let score = jaro_winkler(&target, &name);
                SimilarDonor { donor, score }
            })
            .filter(|s| s.score >= SIMILARITY_THRESHOLD)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }
}
