//! Partnership and appointment workflow.
//!
//! Decisions update the center database first, then cross-post to the
//! partner organization's database through its own connection: the
//! appointment display status and a templated mail record. There is no
//! distributed transaction between the two — an org-side failure after the
//! center write is reported as a delivery failure and logged, and never
//! rolls back the center-side transition.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};

use hemolink_orgdb::{MailRecord, OrgDatabase, OrgDbError};

use crate::db::{self, Database, DbError};
use crate::models::{Notification, PartnershipRequest, RequestStatus};

/// Partnership workflow errors.
#[derive(Error, Debug)]
pub enum PartnershipError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Partnership request not found: {0}")]
    NotFound(String),

    #[error("Illegal transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RequestStatus, to: RequestStatus },
}

pub type PartnershipResult<T> = Result<T, PartnershipError>;

/// Whether the org-side notice reached the organization database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeDelivery {
    Delivered,
    /// The center-side transition stands, but the organization never saw
    /// the notice. Carries the org-database error text.
    Failed(String),
    /// No notice was due (no-op transition, or a calendar-only update).
    NotAttempted,
}

/// A decided request plus the fate of its cross-database notice.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub request: PartnershipRequest,
    pub delivery: NoticeDelivery,
}

/// Workflow over the center database and one organization database.
pub struct PartnershipWorkflow<'a> {
    center: &'a Database,
    org: &'a OrgDatabase,
}

impl<'a> PartnershipWorkflow<'a> {
    pub fn new(center: &'a Database, org: &'a OrgDatabase) -> Self {
        Self { center, org }
    }

    /// Record a new request from an organization.
    pub fn submit_request(
        &self,
        organization_name: &str,
        appointment_id: Option<&str>,
        event_date: &str,
    ) -> PartnershipResult<PartnershipRequest> {
        if organization_name.trim().is_empty() {
            return Err(PartnershipError::Validation {
                field: "organization_name",
                reason: "organization name is required".into(),
            });
        }
        if event_date.trim().is_empty() {
            return Err(PartnershipError::Validation {
                field: "event_date",
                reason: "event date is required".into(),
            });
        }

        let request = PartnershipRequest::new(
            organization_name.to_string(),
            appointment_id.map(|s| s.to_string()),
            event_date.to_string(),
        );
        db::partnerships::insert_partnership_request(self.center.conn(), &request)?;
        Ok(request)
    }

    /// Apply a review decision or calendar advancement.
    ///
    /// `Declined` requires a reason, stored verbatim. Re-applying the
    /// current status is a no-op success. Cancellation is a separate
    /// transition with its own wording; see [`Self::cancel_request`].
    pub fn update_status(
        &self,
        id: &str,
        to: RequestStatus,
        actor: &str,
        reason: Option<&str>,
    ) -> PartnershipResult<DecisionOutcome> {
        let mut request = db::partnerships::get_partnership_request(self.center.conn(), id)?
            .ok_or_else(|| PartnershipError::NotFound(id.to_string()))?;

        if request.status == to {
            return Ok(DecisionOutcome {
                request,
                delivery: NoticeDelivery::NotAttempted,
            });
        }
        if to == RequestStatus::Cancelled {
            return Err(PartnershipError::Validation {
                field: "status",
                reason: "cancellation has its own transition with a mandatory reason".into(),
            });
        }
        if !request.status.can_transition(to) {
            return Err(PartnershipError::InvalidTransition {
                from: request.status,
                to,
            });
        }

        if to == RequestStatus::Declined {
            let reason = reason.map(str::trim).filter(|r| !r.is_empty()).ok_or(
                PartnershipError::Validation {
                    field: "reason",
                    reason: "a decline reason is required".into(),
                },
            )?;
            request.decline_reason = Some(reason.to_string());
        }

        let from = request.status;
        request.status = to;
        if matches!(to, RequestStatus::Approved | RequestStatus::Declined) {
            request.decided_by = Some(actor.to_string());
            request.decided_at = Some(Utc::now().to_rfc3339());
        }
        db::partnerships::update_partnership_request(self.center.conn(), &request)?;

        let notification = Notification::partnership_update(
            &request.organization_name,
            &request.id,
            to.as_str(),
        );
        db::notifications::insert_notification(self.center.conn(), &notification)?;
        info!(request_id = %request.id, from = from.as_str(), to = to.as_str(), "partnership request updated");

        // Decisions carry mail; calendar advancements only refresh the display.
        let delivery = match to {
            RequestStatus::Approved => self.deliver(
                &request,
                "Approved",
                Some(MailRecord::decision_notice(
                    &request.organization_name,
                    &request.id,
                    true,
                    None,
                    &request.event_date,
                )),
            ),
            RequestStatus::Declined => self.deliver(
                &request,
                "Declined",
                Some(MailRecord::decision_notice(
                    &request.organization_name,
                    &request.id,
                    false,
                    request.decline_reason.as_deref(),
                    &request.event_date,
                )),
            ),
            RequestStatus::Confirmed => self.deliver(&request, "Confirmed", None),
            RequestStatus::Scheduled => self.deliver(&request, "Scheduled", None),
            _ => NoticeDelivery::NotAttempted,
        };

        Ok(DecisionOutcome { request, delivery })
    }

    /// Cancel a previously approved or confirmed drive.
    ///
    /// Not modeled as re-entering `declined`: the drive existed and is
    /// being called off. Requires its own reason and produces its own,
    /// distinctly worded, cross-database notice.
    pub fn cancel_request(
        &self,
        id: &str,
        actor: &str,
        reason: &str,
    ) -> PartnershipResult<DecisionOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(PartnershipError::Validation {
                field: "reason",
                reason: "a cancellation reason is required".into(),
            });
        }

        let mut request = db::partnerships::get_partnership_request(self.center.conn(), id)?
            .ok_or_else(|| PartnershipError::NotFound(id.to_string()))?;

        if request.status == RequestStatus::Cancelled {
            return Ok(DecisionOutcome {
                request,
                delivery: NoticeDelivery::NotAttempted,
            });
        }
        if !request.status.can_transition(RequestStatus::Cancelled) {
            return Err(PartnershipError::InvalidTransition {
                from: request.status,
                to: RequestStatus::Cancelled,
            });
        }

        request.status = RequestStatus::Cancelled;
        request.cancellation_reason = Some(reason.to_string());
        request.decided_by = Some(actor.to_string());
        request.decided_at = Some(Utc::now().to_rfc3339());
        db::partnerships::update_partnership_request(self.center.conn(), &request)?;

        let notification = Notification::partnership_update(
            &request.organization_name,
            &request.id,
            "cancelled",
        );
        db::notifications::insert_notification(self.center.conn(), &notification)?;
        info!(request_id = %request.id, "partnership drive cancelled");

        let mail = MailRecord::cancellation_notice(
            &request.organization_name,
            &request.id,
            reason,
            &request.event_date,
        );
        let delivery = self.deliver(&request, "Cancelled", Some(mail));

        Ok(DecisionOutcome { request, delivery })
    }

    /// Write the org-side effects: appointment display status and, for
    /// decisions and cancellations, the mail record.
    fn deliver(
        &self,
        request: &PartnershipRequest,
        display_status: &str,
        mail: Option<MailRecord>,
    ) -> NoticeDelivery {
        let result: Result<(), OrgDbError> = (|| {
            if let Some(appointment_id) = &request.appointment_id {
                self.org
                    .set_appointment_display_status(appointment_id, display_status)?;
            }
            if let Some(mail) = &mail {
                self.org.insert_mail_record(mail)?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => NoticeDelivery::Delivered,
            Err(e) => {
                error!(
                    request_id = %request.id,
                    organization = %request.organization_name,
                    error = %e,
                    "organization-side notice failed after center write"
                );
                NoticeDelivery::Failed(e.to_string())
            }
        }
    }
}
