//! Blood-unit models and lifecycle metadata.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::bloodtype::derive_result_blood_type;

/// Component category of a collected unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BloodCategory {
    RedBloodCell,
    Plasma,
    Platelet,
}

/// Shelf life of red blood cells, in days.
pub const RBC_SHELF_LIFE_DAYS: i64 = 35;
/// Shelf life of platelets, in days.
pub const PLATELET_SHELF_LIFE_DAYS: i64 = 5;
/// Shelf life of frozen plasma, in days.
pub const PLASMA_SHELF_LIFE_DAYS: i64 = 365;

impl BloodCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BloodCategory::RedBloodCell => "Red Blood Cell",
            BloodCategory::Plasma => "Plasma",
            BloodCategory::Platelet => "Platelet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Red Blood Cell" => Some(BloodCategory::RedBloodCell),
            "Plasma" => Some(BloodCategory::Plasma),
            "Platelet" => Some(BloodCategory::Platelet),
            _ => None,
        }
    }

    /// Days from collection to automatic expiry for this component.
    pub fn shelf_life_days(&self) -> i64 {
        match self {
            BloodCategory::RedBloodCell => RBC_SHELF_LIFE_DAYS,
            BloodCategory::Platelet => PLATELET_SHELF_LIFE_DAYS,
            BloodCategory::Plasma => PLASMA_SHELF_LIFE_DAYS,
        }
    }

    pub fn all() -> [BloodCategory; 3] {
        [
            BloodCategory::RedBloodCell,
            BloodCategory::Plasma,
            BloodCategory::Platelet,
        ]
    }
}

/// Where the unit was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionSource {
    WalkIn,
    Mobile,
}

impl CollectionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionSource::WalkIn => "Walk-In",
            CollectionSource::Mobile => "Mobile",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Walk-In" => Some(CollectionSource::WalkIn),
            "Mobile" => Some(CollectionSource::Mobile),
            _ => None,
        }
    }
}

/// Compute the expiration timestamp for a unit collected at `collection`.
pub fn compute_expiration(collection: DateTime<Utc>, category: BloodCategory) -> DateTime<Utc> {
    collection + Duration::days(category.shelf_life_days())
}

/// Caller-supplied fields for a unit being added to stock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitIntake {
    pub serial_id: String,
    pub blood_type: String,
    pub rh_factor: String,
    pub volume_ml: i64,
    pub category: BloodCategory,
    pub source: CollectionSource,
    /// RFC 3339 collection timestamp.
    pub collection_date: String,
}

/// One physical collected unit.
///
/// A unit lives in exactly one of the four lifecycle tables at a time; the
/// `status` field mirrors the table currently holding it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodUnit {
    pub serial_id: String,
    pub blood_type: String,
    pub rh_factor: String,
    /// Derived combined type, e.g. "AB+"; None when the sign is unrecognized.
    pub result_blood_type: Option<String>,
    pub volume_ml: i64,
    pub category: BloodCategory,
    pub source: CollectionSource,
    pub collection_date: String,
    pub expiration_date: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl BloodUnit {
    /// Build a stored unit from intake fields, deriving expiration and the
    /// combined blood type.
    pub fn from_intake(intake: &UnitIntake, collection: DateTime<Utc>) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            serial_id: intake.serial_id.clone(),
            blood_type: intake.blood_type.clone(),
            rh_factor: intake.rh_factor.clone(),
            result_blood_type: derive_result_blood_type(&intake.blood_type, &intake.rh_factor),
            volume_ml: intake.volume_ml,
            category: intake.category,
            source: intake.source,
            collection_date: intake.collection_date.clone(),
            expiration_date: compute_expiration(collection, intake.category).to_rfc3339(),
            status: "Stored".to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Disposal metadata attached when a unit is discarded.
///
/// All fields except remarks are mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisposalDetails {
    pub responsible_personnel: String,
    pub reason_for_discarding: String,
    pub authorized_by: String,
    pub date_of_discard: String,
    pub time_of_discard: String,
    pub method_of_disposal: String,
    pub remarks: Option<String>,
}

/// Recipient/facility metadata attached when a unit is released.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseDetails {
    pub recipient_name: String,
    pub facility_name: String,
    pub released_by: String,
    pub release_date: String,
    pub release_time: String,
    pub remarks: Option<String>,
}

/// Confirmed discard batch: the serials selected in step one plus the
/// disposal metadata gathered in step two.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscardRequest {
    pub serial_ids: Vec<String>,
    /// Component type of the screen the batch was selected on.
    pub category: BloodCategory,
    pub details: DisposalDetails,
}

/// Release batch with recipient metadata and optional invoicing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseRequest {
    pub serial_ids: Vec<String>,
    pub category: BloodCategory,
    pub details: ReleaseDetails,
    pub create_invoice: bool,
}

/// A unit in `released_blood`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleasedUnit {
    pub unit: BloodUnit,
    pub details: ReleaseDetails,
    pub invoice_id: Option<String>,
}

/// A unit in `discarded_blood`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscardedUnit {
    pub unit: BloodUnit,
    pub details: DisposalDetails,
}

/// Lifecycle transition recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryAction {
    Added,
    Released,
    Discarded,
    NonConforming,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Added => "ADDED",
            HistoryAction::Released => "RELEASED",
            HistoryAction::Discarded => "DISCARDED",
            HistoryAction::NonConforming => "NON-CONFORMING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADDED" => Some(HistoryAction::Added),
            "RELEASED" => Some(HistoryAction::Released),
            "DISCARDED" => Some(HistoryAction::Discarded),
            "NON-CONFORMING" => Some(HistoryAction::NonConforming),
            _ => None,
        }
    }
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEvent {
    pub id: i64,
    pub serial_id: String,
    pub action: HistoryAction,
    pub category: BloodCategory,
    pub result_blood_type: Option<String>,
    pub acted_by: String,
    pub recorded_at: String,
}

/// An invoice covering one release batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BloodInvoice {
    pub invoice_id: String,
    pub facility_name: String,
    pub unit_count: i64,
    pub issued_by: String,
    pub issued_at: String,
}

impl BloodInvoice {
    pub fn new(facility_name: String, unit_count: i64, issued_by: String) -> Self {
        Self {
            invoice_id: uuid::Uuid::new_v4().to_string(),
            facility_name,
            unit_count,
            issued_by,
            issued_at: Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intake(category: BloodCategory) -> UnitIntake {
        UnitIntake {
            serial_id: "SN-0001".into(),
            blood_type: "A".into(),
            rh_factor: "positive".into(),
            volume_ml: 450,
            category,
            source: CollectionSource::WalkIn,
            collection_date: "2026-08-01T08:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_shelf_life_per_category() {
        assert_eq!(BloodCategory::RedBloodCell.shelf_life_days(), 35);
        assert_eq!(BloodCategory::Platelet.shelf_life_days(), 5);
        assert_eq!(BloodCategory::Plasma.shelf_life_days(), 365);
    }

    #[test]
    fn test_compute_expiration() {
        let collection: DateTime<Utc> = "2026-08-01T08:00:00+00:00".parse().unwrap();

        let rbc = compute_expiration(collection, BloodCategory::RedBloodCell);
        assert_eq!(rbc.to_rfc3339(), "2026-09-05T08:00:00+00:00");

        let platelet = compute_expiration(collection, BloodCategory::Platelet);
        assert_eq!(platelet.to_rfc3339(), "2026-08-06T08:00:00+00:00");
    }

    #[test]
    fn test_from_intake_derives_fields() {
        let collection: DateTime<Utc> = "2026-08-01T08:00:00+00:00".parse().unwrap();
        let unit = BloodUnit::from_intake(&intake(BloodCategory::RedBloodCell), collection);

        assert_eq!(unit.status, "Stored");
        assert_eq!(unit.result_blood_type, Some("A+".into()));
        assert_eq!(unit.expiration_date, "2026-09-05T08:00:00+00:00");
    }

    #[test]
    fn test_unrecognized_sign_leaves_result_empty() {
        let mut i = intake(BloodCategory::Plasma);
        i.rh_factor = "unknown".into();
        let collection: DateTime<Utc> = "2026-08-01T08:00:00+00:00".parse().unwrap();
        let unit = BloodUnit::from_intake(&i, collection);
        assert_eq!(unit.result_blood_type, None);
    }

    #[test]
    fn test_category_round_trip() {
        for category in BloodCategory::all() {
            assert_eq!(BloodCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(BloodCategory::parse("Whole Blood"), None);
    }

    #[test]
    fn test_history_action_round_trip() {
        for action in [
            HistoryAction::Added,
            HistoryAction::Released,
            HistoryAction::Discarded,
            HistoryAction::NonConforming,
        ] {
            assert_eq!(HistoryAction::parse(action.as_str()), Some(action));
        }
    }
}
