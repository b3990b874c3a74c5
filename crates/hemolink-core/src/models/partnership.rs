//! Partnership request model and its status machine.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Status of a partnership request.
///
/// Transitions are one-directional; there is no re-open path. `Confirmed`
/// and `Scheduled` are advanced by the external calendar integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Declined,
    Confirmed,
    Scheduled,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Declined => "declined",
            RequestStatus::Confirmed => "confirmed",
            RequestStatus::Scheduled => "scheduled",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "declined" => Some(RequestStatus::Declined),
            "confirmed" => Some(RequestStatus::Confirmed),
            "scheduled" => Some(RequestStatus::Scheduled),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition(&self, to: RequestStatus) -> bool {
        use RequestStatus::*;
        matches!(
            (self, to),
            (Pending, Approved)
                | (Pending, Declined)
                | (Approved, Confirmed)
                | (Approved, Scheduled)
                | (Approved, Cancelled)
                | (Confirmed, Scheduled)
                | (Confirmed, Cancelled)
        )
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        use RequestStatus::*;
        matches!(self, Declined | Scheduled | Cancelled)
    }
}

/// An organization's request to host a blood drive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnershipRequest {
    pub id: String,
    pub organization_name: String,
    /// Appointment in the organization's calendar system.
    pub appointment_id: Option<String>,
    pub event_date: String,
    pub status: RequestStatus,
    pub decline_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub decided_by: Option<String>,
    pub decided_at: Option<String>,
    pub created_at: String,
}

impl PartnershipRequest {
    pub fn new(organization_name: String, appointment_id: Option<String>, event_date: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            organization_name,
            appointment_id,
            event_date,
            status: RequestStatus::Pending,
            decline_reason: None,
            cancellation_reason: None,
            decided_by: None,
            decided_at: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_matrix() {
        use RequestStatus::*;

        assert!(Pending.can_transition(Approved));
        assert!(Pending.can_transition(Declined));
        assert!(Approved.can_transition(Confirmed));
        assert!(Approved.can_transition(Scheduled));
        assert!(Approved.can_transition(Cancelled));
        assert!(Confirmed.can_transition(Cancelled));

        // No re-open, no skipping review
        assert!(!Declined.can_transition(Approved));
        assert!(!Declined.can_transition(Pending));
        assert!(!Cancelled.can_transition(Approved));
        assert!(!Pending.can_transition(Confirmed));
        assert!(!Pending.can_transition(Cancelled));
        assert!(!Scheduled.can_transition(Cancelled));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RequestStatus::Declined.is_terminal());
        assert!(RequestStatus::Cancelled.is_terminal());
        assert!(RequestStatus::Scheduled.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(!RequestStatus::Approved.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Declined,
            RequestStatus::Confirmed,
            RequestStatus::Scheduled,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(RequestStatus::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn test_new_request_is_pending() {
        let req = PartnershipRequest::new(
            "Northern Lifeline".into(),
            Some("appt-1".into()),
            "2026-09-01".into(),
        );
        assert_eq!(req.status, RequestStatus::Pending);
        assert!(req.decline_reason.is_none());
    }
}
