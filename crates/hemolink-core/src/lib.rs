//! Hemolink Core Library
//!
//! Blood-bank inventory and partner-organization donor sync for a regional
//! blood center.
//!
//! # Unit lifecycle
//!
//! ```text
//!                 ┌──────────────┐
//!   intake ──────▶│  blood_stock │────────────┐
//!                 └──────┬───────┘            │
//!            quality     │                    │ release
//!            failure     ▼                    ▼
//!            ┌────────────────┐       ┌────────────────┐
//!            │ non_conforming │       │ released_blood │──▶ blood_invoices
//!            └───────┬────────┘       └────────────────┘
//!                    │ disposal
//!                    ▼
//!            ┌─────────────────┐
//!            │ discarded_blood │
//!            └─────────────────┘
//!
//! Every move is delete-from-source + insert-into-destination inside one
//! transaction, appended to blood_stock_history.
//! ```
//!
//! # Donor sync
//!
//! ```text
//! Organization batch ──▶ temp_donor_records (staging, pending)
//!                                 │
//!                          Admin review queue
//!                 approve ────────┴──────── reject (reason retained)
//!                    │
//!     duplicate? donor id OR case-insensitive trimmed first+last name
//!       yes ─▶ existing donor absorbs a donation event
//!       no  ─▶ new donor_records row (DNR-####-ON)
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite layer for the center database
//! - [`models`]: Domain types (BloodUnit, DonorRecord, Notification, ...)
//! - [`inventory`]: Unit lifecycle workflows
//! - [`reconciler`]: Donor-sync reconciliation
//! - [`alerts`]: Expiration and stock-level notification rules
//! - [`partnership`]: Partnership requests and cross-database notices
//! - [`access`]: Accounts, permissions, login audit
//! - [`export`]: Weekly summary and invoice exports

pub mod access;
pub mod alerts;
pub mod db;
pub mod export;
pub mod inventory;
pub mod models;
pub mod partnership;
pub mod reconciler;

// Re-export commonly used types
pub use access::{AccessControl, AccessError, ActivationOutcome};
pub use alerts::{AlertEngine, AlertError, ScanOutcome, LOW_STOCK_THRESHOLD};
pub use db::{Database, DbError};
pub use export::{InvoiceExporter, SummaryExporter, WeeklySummary};
pub use inventory::{
    AddOutcome, CandidateLookup, DiscardOutcome, InventoryError, InventoryWorkflow,
    ReleaseOutcome, TransferOutcome,
};
pub use models::{
    BloodCategory, BloodUnit, CollectionSource, DiscardRequest, DonorRecord, DonorSubmission,
    HistoryEvent, Notification, NotificationStatus, PartnershipRequest, Priority, ReleaseRequest,
    RequestStatus, Role, StagedDonorRecord, SyncStatus, UnitIntake, UserAccount,
};
pub use partnership::{
    DecisionOutcome, NoticeDelivery, PartnershipError, PartnershipWorkflow,
};
pub use reconciler::{ApprovalOutcome, SimilarDonor, SyncError, SyncReconciler};

use std::sync::{Mutex, MutexGuard};

use hemolink_orgdb::{OrgDatabase, OrgDbError};

// =========================================================================
// Facade Error Type
// =========================================================================

/// Union error for the request/response facade. Everything here is
/// recoverable at the bridge boundary; nothing crashes the process.
#[derive(Debug, thiserror::Error)]
pub enum BloodBankError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Alert(#[from] AlertError),

    #[error(transparent)]
    Partnership(#[from] PartnershipError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("Organization database error: {0}")]
    OrgDb(#[from] OrgDbError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for BloodBankError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        BloodBankError::LockPoisoned(e.to_string())
    }
}

pub type BloodBankResult<T> = Result<T, BloodBankError>;

// =========================================================================
// Main Service Object
// =========================================================================

/// Request/response facade over the center and organization databases.
///
/// Constructed once at process start and shared by reference; the
/// presentation bridge calls these operations and renders the structured
/// results. Both databases sit behind their own mutex — writes to the two
/// are never atomic with each other.
pub struct BloodBank {
    center: Mutex<Database>,
    org: Mutex<OrgDatabase>,
}

impl BloodBank {
    /// Open (or create) both databases at the given paths.
    pub fn open(center_path: &str, org_path: &str) -> BloodBankResult<Self> {
        Ok(Self {
            center: Mutex::new(Database::open(center_path)?),
            org: Mutex::new(OrgDatabase::open(org_path)?),
        })
    }

    /// In-memory pair (for testing).
    pub fn open_in_memory() -> BloodBankResult<Self> {
        Ok(Self {
            center: Mutex::new(Database::open_in_memory()?),
            org: Mutex::new(OrgDatabase::open_in_memory()?),
        })
    }

    fn center(&self) -> BloodBankResult<MutexGuard<'_, Database>> {
        Ok(self.center.lock()?)
    }

    // =====================================================================
    // Blood-Unit Store
    // =====================================================================

    /// Add units to stock.
    pub fn add_blood_stock(
        &self,
        intakes: &[UnitIntake],
        acting_user: &str,
    ) -> BloodBankResult<AddOutcome> {
        let mut db = self.center()?;
        Ok(InventoryWorkflow::new(&mut db).add_units(intakes, acting_user)?)
    }

    /// Move units into non-conforming.
    pub fn transfer_to_non_conforming(
        &self,
        serial_ids: &[String],
        reason: Option<&str>,
        acting_user: &str,
    ) -> BloodBankResult<TransferOutcome> {
        let mut db = self.center()?;
        Ok(InventoryWorkflow::new(&mut db).transfer_to_non_conforming(
            serial_ids,
            reason,
            acting_user,
        )?)
    }

    /// Step one of the discard flow: resolve serials on the given screen.
    pub fn find_discard_candidates(
        &self,
        serial_ids: &[String],
        category: BloodCategory,
    ) -> BloodBankResult<CandidateLookup> {
        let mut db = self.center()?;
        Ok(InventoryWorkflow::new(&mut db).find_discard_candidates(serial_ids, category)?)
    }

    /// Step two of the discard flow: confirm with disposal metadata.
    pub fn discard_stock(
        &self,
        request: &DiscardRequest,
        acting_user: &str,
    ) -> BloodBankResult<DiscardOutcome> {
        let mut db = self.center()?;
        Ok(InventoryWorkflow::new(&mut db).discard_units(request, acting_user)?)
    }

    /// Release stored units, optionally issuing an invoice.
    pub fn release_stock(
        &self,
        request: &ReleaseRequest,
        acting_user: &str,
    ) -> BloodBankResult<ReleaseOutcome> {
        let mut db = self.center()?;
        Ok(InventoryWorkflow::new(&mut db).release_units(request, acting_user)?)
    }

    /// List stored units.
    pub fn list_blood_stock(&self) -> BloodBankResult<Vec<BloodUnit>> {
        Ok(self.center()?.list_blood_stock()?)
    }

    /// List non-conforming units.
    pub fn list_non_conforming(&self) -> BloodBankResult<Vec<BloodUnit>> {
        Ok(self.center()?.list_non_conforming()?)
    }

    /// List released units with their release metadata.
    pub fn list_released(&self) -> BloodBankResult<Vec<models::ReleasedUnit>> {
        Ok(self.center()?.list_released()?)
    }

    /// List discarded units with their disposal metadata.
    pub fn list_discarded(&self) -> BloodBankResult<Vec<models::DiscardedUnit>> {
        Ok(self.center()?.list_discarded()?)
    }

    /// Audit trail for one serial id.
    pub fn stock_history(&self, serial_id: &str) -> BloodBankResult<Vec<HistoryEvent>> {
        Ok(self.center()?.list_history_for_serial(serial_id)?)
    }

    /// One-time audit-log backfill from current table contents.
    pub fn backfill_stock_history(&self) -> BloodBankResult<usize> {
        Ok(self.center()?.backfill_stock_history()?)
    }

    /// Fill missing derived blood-type values across all tables.
    pub fn backfill_result_blood_type(&self) -> BloodBankResult<usize> {
        Ok(self.center()?.backfill_result_blood_type()?)
    }

    // =====================================================================
    // Donor Registry
    // =====================================================================

    /// Walk-in registration: allocate the next donor id and record the
    /// first donation.
    pub fn register_donor(&self, submission: &DonorSubmission) -> BloodBankResult<DonorRecord> {
        if submission.first_name.trim().is_empty() {
            return Err(SyncError::Validation {
                field: "first_name",
                reason: "first name is required".into(),
            }
            .into());
        }
        if submission.last_name.trim().is_empty() {
            return Err(SyncError::Validation {
                field: "last_name",
                reason: "last name is required".into(),
            }
            .into());
        }

        let db = self.center()?;
        let now = chrono::Utc::now().to_rfc3339();
        let donor_id = db::donors::next_donor_id(db.conn()).map_err(SyncError::Db)?;
        let donor = DonorRecord::from_submission(submission, donor_id, &now);
        db::donors::insert_donor(db.conn(), &donor).map_err(SyncError::Db)?;
        Ok(donor)
    }

    /// Record an additional donation for an existing donor.
    pub fn record_walk_in_donation(&self, donor_id: &str) -> BloodBankResult<DonorRecord> {
        let db = self.center()?;
        let mut donor = db::donors::get_donor(db.conn(), donor_id)
            .map_err(SyncError::Db)?
            .ok_or_else(|| SyncError::NotFound(donor_id.to_string()))?;
        donor.record_donation(&chrono::Utc::now().to_rfc3339());
        db::donors::update_donor(db.conn(), &donor).map_err(SyncError::Db)?;
        Ok(donor)
    }

    /// List all donors.
    pub fn list_donors(&self) -> BloodBankResult<Vec<DonorRecord>> {
        Ok(self.center()?.list_donors()?)
    }

    /// Search donors by name prefix.
    pub fn search_donors(&self, query: &str, limit: usize) -> BloodBankResult<Vec<DonorRecord>> {
        Ok(self.center()?.search_donors(query, limit)?)
    }

    // =====================================================================
    // Sync Reconciler
    // =====================================================================

    /// Stage a donor batch from a partner organization.
    pub fn request_donor_sync(
        &self,
        donors: &[DonorSubmission],
        organization: &str,
        user_id: &str,
        user_name: &str,
    ) -> BloodBankResult<Vec<StagedDonorRecord>> {
        let mut db = self.center()?;
        Ok(SyncReconciler::new(&mut db).request_sync(donors, organization, user_id, user_name)?)
    }

    /// Approve all pending staged records in one atomic batch.
    pub fn approve_donor_sync(&self, approved_by: &str) -> BloodBankResult<ApprovalOutcome> {
        let mut db = self.center()?;
        Ok(SyncReconciler::new(&mut db).approve_all(approved_by)?)
    }

    /// Reject one staged record with a mandatory reason.
    pub fn decline_sync_request(
        &self,
        id: &str,
        reason: &str,
    ) -> BloodBankResult<StagedDonorRecord> {
        let mut db = self.center()?;
        Ok(SyncReconciler::new(&mut db).decline(id, reason)?)
    }

    /// Purge approved staged records.
    pub fn cleanup_sync_records(&self) -> BloodBankResult<usize> {
        let mut db = self.center()?;
        Ok(SyncReconciler::new(&mut db).cleanup_approved()?)
    }

    /// Staged records awaiting review.
    pub fn pending_sync_requests(&self) -> BloodBankResult<Vec<StagedDonorRecord>> {
        Ok(self.center()?.list_temp_donors_by_status(SyncStatus::Pending)?)
    }

    /// Advisory similarity ranking for the review screen.
    pub fn similar_donors(
        &self,
        staged_id: &str,
        limit: usize,
    ) -> BloodBankResult<Vec<SimilarDonor>> {
        let mut db = self.center()?;
        let staged = db::donors::get_temp_donor(db.conn(), staged_id)
            .map_err(SyncError::Db)?
            .ok_or_else(|| SyncError::NotFound(staged_id.to_string()))?;
        Ok(SyncReconciler::new(&mut db).similar_donors(&staged, limit)?)
    }

    // =====================================================================
    // Notification Center
    // =====================================================================

    /// Run the expiration rule scan.
    pub fn check_and_create_expiration_notifications(&self) -> BloodBankResult<ScanOutcome> {
        let db = self.center()?;
        Ok(AlertEngine::new(&db).check_expiration_notifications()?)
    }

    /// Run the stock-level rule scan.
    pub fn check_and_create_stock_level_notifications(&self) -> BloodBankResult<ScanOutcome> {
        let db = self.center()?;
        Ok(AlertEngine::new(&db).check_stock_level_notifications()?)
    }

    /// List notifications, optionally by status.
    pub fn list_notifications(
        &self,
        status: Option<NotificationStatus>,
    ) -> BloodBankResult<Vec<Notification>> {
        Ok(self.center()?.list_notifications(status)?)
    }

    /// Mark one notification read.
    pub fn mark_notification_read(&self, id: &str) -> BloodBankResult<bool> {
        Ok(self.center()?.mark_notification_read(id)?)
    }

    /// Archive one notification.
    pub fn archive_notification(&self, id: &str) -> BloodBankResult<bool> {
        Ok(self.center()?.archive_notification(id)?)
    }

    // =====================================================================
    // Partnership Workflow
    // =====================================================================

    /// Record a new partnership request.
    pub fn submit_partnership_request(
        &self,
        organization_name: &str,
        appointment_id: Option<&str>,
        event_date: &str,
    ) -> BloodBankResult<PartnershipRequest> {
        let center = self.center()?;
        let org = self.org.lock()?;
        Ok(PartnershipWorkflow::new(&center, &org).submit_request(
            organization_name,
            appointment_id,
            event_date,
        )?)
    }

    /// Apply a review decision or calendar advancement to a request.
    pub fn update_partnership_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        actor: &str,
        reason: Option<&str>,
    ) -> BloodBankResult<DecisionOutcome> {
        let center = self.center()?;
        let org = self.org.lock()?;
        Ok(PartnershipWorkflow::new(&center, &org).update_status(id, status, actor, reason)?)
    }

    /// Cancel an approved or confirmed drive.
    pub fn cancel_partnership_request(
        &self,
        id: &str,
        actor: &str,
        reason: &str,
    ) -> BloodBankResult<DecisionOutcome> {
        let center = self.center()?;
        let org = self.org.lock()?;
        Ok(PartnershipWorkflow::new(&center, &org).cancel_request(id, actor, reason)?)
    }

    /// List partnership requests, optionally by status.
    pub fn list_partnership_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> BloodBankResult<Vec<PartnershipRequest>> {
        Ok(self.center()?.list_partnership_requests(status)?)
    }

    // =====================================================================
    // Access Control
    // =====================================================================

    /// Register an inactive account awaiting admin activation.
    pub fn register_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
    ) -> BloodBankResult<UserAccount> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).register(email, password, full_name, role)?)
    }

    /// Activate an account.
    pub fn activate_user(&self, user_id: &str) -> BloodBankResult<ActivationOutcome> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).activate(user_id)?)
    }

    /// Reject (delete) a registration.
    pub fn reject_registration(&self, user_id: &str) -> BloodBankResult<()> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).reject(user_id)?)
    }

    /// Log a user in.
    pub fn login(&self, email: &str, password: &str) -> BloodBankResult<UserAccount> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).login(email, password)?)
    }

    /// Log a user out.
    pub fn logout(&self, user_id: &str) -> BloodBankResult<()> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).logout(user_id)?)
    }

    /// Issue a password reset code.
    pub fn request_password_reset(
        &self,
        email: &str,
    ) -> BloodBankResult<crate::models::ResetCode> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).request_password_reset(email)?)
    }

    /// Consume a reset code and set a new password.
    pub fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> BloodBankResult<()> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).reset_password(email, code, new_password)?)
    }

    /// Change a role, regenerating the permission set from its template.
    pub fn change_user_role(&self, user_id: &str, role: Role) -> BloodBankResult<UserAccount> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).change_role(user_id, role)?)
    }

    /// A user's permission flags.
    pub fn user_permissions(
        &self,
        user_id: &str,
    ) -> BloodBankResult<Vec<crate::models::ScreenPermission>> {
        let mut db = self.center()?;
        Ok(AccessControl::new(&mut db).permissions(user_id)?)
    }

    // =====================================================================
    // Export
    // =====================================================================

    /// Trailing-seven-day inventory summary.
    pub fn weekly_summary(&self) -> BloodBankResult<WeeklySummary> {
        let db = self.center()?;
        Ok(SummaryExporter::new(&db).weekly_summary()?)
    }

    /// All invoices, batched for accounting.
    pub fn export_invoices(&self) -> BloodBankResult<export::InvoiceBatchExport> {
        let db = self.center()?;
        Ok(InvoiceExporter::new(&db).export_all()?)
    }
}
