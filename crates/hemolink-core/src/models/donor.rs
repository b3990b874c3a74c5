//! Donor models: the authoritative registry and the staged sync queue.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::bloodtype::derive_result_blood_type;

/// One donation event in a donor's history.
///
/// Stored as a JSON array in the `donation_dates` column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DonationEvent {
    pub date: String,
}

/// A person's master donation profile, authoritative only in the regional
/// center's `donor_records` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DonorRecord {
    /// Center-allocated id, format `DNR-####-ON`, sequential.
    pub donor_id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: Option<String>,
    pub sex: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub rh_factor: Option<String>,
    pub result_blood_type: Option<String>,
    pub donation_count: i64,
    /// Ordered donation history, oldest first.
    pub donation_dates: Vec<DonationEvent>,
    pub last_donation_date: Option<String>,
    pub source_organization: Option<String>,
    pub created_at: String,
    pub modified_at: String,
}

impl DonorRecord {
    /// Create a new donor with a first donation recorded now.
    pub fn new(donor_id: String, first_name: String, last_name: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            donor_id,
            first_name,
            last_name,
            middle_name: None,
            birth_date: None,
            sex: None,
            contact_number: None,
            email: None,
            address: None,
            blood_type: None,
            rh_factor: None,
            result_blood_type: None,
            donation_count: 1,
            donation_dates: vec![DonationEvent { date: now.clone() }],
            last_donation_date: Some(now.clone()),
            source_organization: None,
            created_at: now.clone(),
            modified_at: now,
        }
    }

    /// Build a master record from an approved staged submission.
    pub fn from_staged(staged: &StagedDonorRecord, donor_id: String, now: &str) -> Self {
        Self {
            donor_id,
            first_name: staged.first_name.clone(),
            last_name: staged.last_name.clone(),
            middle_name: staged.middle_name.clone(),
            birth_date: staged.birth_date.clone(),
            sex: staged.sex.clone(),
            contact_number: staged.contact_number.clone(),
            email: staged.email.clone(),
            address: staged.address.clone(),
            blood_type: staged.blood_type.clone(),
            rh_factor: staged.rh_factor.clone(),
            result_blood_type: match (&staged.blood_type, &staged.rh_factor) {
                (Some(bt), Some(rh)) => derive_result_blood_type(bt, rh),
                _ => None,
            },
            donation_count: 1,
            donation_dates: vec![DonationEvent {
                date: now.to_string(),
            }],
            last_donation_date: Some(now.to_string()),
            source_organization: staged.source_organization.clone(),
            created_at: now.to_string(),
            modified_at: now.to_string(),
        }
    }

    /// Build a master record from a walk-in registration.
    pub fn from_submission(submission: &DonorSubmission, donor_id: String, now: &str) -> Self {
        Self {
            donor_id,
            first_name: submission.first_name.clone(),
            last_name: submission.last_name.clone(),
            middle_name: submission.middle_name.clone(),
            birth_date: submission.birth_date.clone(),
            sex: submission.sex.clone(),
            contact_number: submission.contact_number.clone(),
            email: submission.email.clone(),
            address: submission.address.clone(),
            blood_type: submission.blood_type.clone(),
            rh_factor: submission.rh_factor.clone(),
            result_blood_type: match (&submission.blood_type, &submission.rh_factor) {
                (Some(bt), Some(rh)) => derive_result_blood_type(bt, rh),
                _ => None,
            },
            donation_count: 1,
            donation_dates: vec![DonationEvent {
                date: now.to_string(),
            }],
            last_donation_date: Some(now.to_string()),
            source_organization: None,
            created_at: now.to_string(),
            modified_at: now.to_string(),
        }
    }

    /// Whether this donor matches a submitted name under the duplicate rule:
    /// case-insensitive equality after trimming, both name parts.
    pub fn matches_name(&self, first_name: &str, last_name: &str) -> bool {
        fn canon(s: &str) -> String {
            s.trim().to_lowercase()
        }
        canon(&self.first_name) == canon(first_name) && canon(&self.last_name) == canon(last_name)
    }

    /// Record an additional donation at `now` on this donor.
    pub fn record_donation(&mut self, now: &str) {
        self.donation_dates.push(DonationEvent {
            date: now.to_string(),
        });
        self.donation_count += 1;
        self.last_donation_date = Some(now.to_string());
        self.modified_at = now.to_string();
    }
}

/// Review state of a staged donor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    Approved,
    Rejected,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Approved => "approved",
            SyncStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SyncStatus::Pending),
            "approved" => Some(SyncStatus::Approved),
            "rejected" => Some(SyncStatus::Rejected),
            _ => None,
        }
    }
}

/// Donor fields as submitted by a partner organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DonorSubmission {
    /// The submitting organization's idea of the donor id, if it has one.
    /// Used only for duplicate matching, never copied into a new master row.
    pub donor_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: Option<String>,
    pub sex: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub rh_factor: Option<String>,
}

/// A staged, organization-submitted donor record awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StagedDonorRecord {
    pub id: String,
    pub donor_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    pub birth_date: Option<String>,
    pub sex: Option<String>,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub rh_factor: Option<String>,
    pub source_organization: Option<String>,
    pub source_user_id: String,
    pub source_user_name: String,
    pub sync_status: SyncStatus,
    pub sync_requested_at: String,
    pub sync_approved_at: Option<String>,
    pub sync_approved_by: Option<String>,
    pub rejection_reason: Option<String>,
}

impl StagedDonorRecord {
    /// Stage a submission from a partner organization.
    pub fn from_submission(
        submission: &DonorSubmission,
        organization: &str,
        user_id: &str,
        user_name: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            donor_id: submission.donor_id.clone(),
            first_name: submission.first_name.clone(),
            last_name: submission.last_name.clone(),
            middle_name: submission.middle_name.clone(),
            birth_date: submission.birth_date.clone(),
            sex: submission.sex.clone(),
            contact_number: submission.contact_number.clone(),
            email: submission.email.clone(),
            address: submission.address.clone(),
            blood_type: submission.blood_type.clone(),
            rh_factor: submission.rh_factor.clone(),
            source_organization: Some(organization.to_string()),
            source_user_id: user_id.to_string(),
            source_user_name: user_name.to_string(),
            sync_status: SyncStatus::Pending,
            sync_requested_at: Utc::now().to_rfc3339(),
            sync_approved_at: None,
            sync_approved_by: None,
            rejection_reason: None,
        }
    }

    /// Full name as submitted, for display and similarity ranking.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}
