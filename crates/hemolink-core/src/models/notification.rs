//! Notification models and the constructors the rule engine emits.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::stock::BloodCategory;

/// Notification priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
            Priority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "normal" => Some(Priority::Normal),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

/// Read state of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStatus {
    Unread,
    Read,
    Archived,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Unread => "unread",
            NotificationStatus::Read => "read",
            NotificationStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(NotificationStatus::Unread),
            "read" => Some(NotificationStatus::Read),
            "archived" => Some(NotificationStatus::Archived),
            _ => None,
        }
    }
}

/// A fact surfaced to users; not a command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    pub notification_type: String,
    pub title: String,
    pub description: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<String>,
    pub status: NotificationStatus,
    pub priority: Priority,
    pub created_at: String,
    pub read_at: Option<String>,
}

impl Notification {
    pub fn new(
        notification_type: &str,
        title: String,
        description: String,
        priority: Priority,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            notification_type: notification_type.to_string(),
            title,
            description,
            related_entity_type: None,
            related_entity_id: None,
            status: NotificationStatus::Unread,
            priority,
            created_at: Utc::now().to_rfc3339(),
            read_at: None,
        }
    }

    /// Attach the entity this notification refers to.
    pub fn related(mut self, entity_type: &str, entity_id: &str) -> Self {
        self.related_entity_type = Some(entity_type.to_string());
        self.related_entity_id = Some(entity_id.to_string());
        self
    }

    /// A unit crossing its early-warning threshold.
    pub fn expiring_soon(serial_id: &str, category: BloodCategory, days_left: i64) -> Self {
        Self::new(
            "expiring_soon",
            format!("{} unit expiring soon", category.as_str()),
            format!(
                "Unit {} expires in {} day{}.",
                serial_id,
                days_left,
                if days_left == 1 { "" } else { "s" }
            ),
            Priority::Normal,
        )
        .related("blood_unit", serial_id)
    }

    /// A unit inside its final-days window.
    pub fn expiring_urgent(serial_id: &str, category: BloodCategory, days_left: i64) -> Self {
        Self::new(
            "expiring_urgent",
            format!("{} unit expiring", category.as_str()),
            format!(
                "Unit {} expires in {} day{}.",
                serial_id,
                days_left,
                if days_left == 1 { "" } else { "s" }
            ),
            Priority::Urgent,
        )
        .related("blood_unit", serial_id)
    }

    /// A unit past its expiration date.
    pub fn stock_expired(serial_id: &str, category: BloodCategory) -> Self {
        Self::new(
            "stock_expired",
            format!("{} unit expired", category.as_str()),
            format!("Unit {} has passed its expiration date.", serial_id),
            Priority::Critical,
        )
        .related("blood_unit", serial_id)
    }

    /// No stored units remain for a category.
    pub fn stock_out(category: BloodCategory) -> Self {
        Self::new(
            "stock_out",
            format!("{} stock depleted", category.as_str()),
            format!("No {} units remain in storage.", category.as_str()),
            Priority::High,
        )
        .related("category", category.as_str())
    }

    /// Stored count at or below the low-stock threshold.
    pub fn stock_low(category: BloodCategory, count: i64) -> Self {
        Self::new(
            "stock_low",
            format!("{} stock low", category.as_str()),
            format!(
                "Only {} {} unit{} remain in storage.",
                count,
                category.as_str(),
                if count == 1 { "" } else { "s" }
            ),
            Priority::Urgent,
        )
        .related("category", category.as_str())
    }

    /// Confirmation emitted after a discard batch.
    pub fn blood_discarded(count: usize, category: BloodCategory) -> Self {
        Self::new(
            "blood_discarded",
            "Blood units discarded".to_string(),
            format!("{} {} unit(s) discarded.", count, category.as_str()),
            Priority::Normal,
        )
        .related("category", category.as_str())
    }

    /// Confirmation emitted after a release batch.
    pub fn blood_released(count: usize, category: BloodCategory, facility: &str) -> Self {
        Self::new(
            "blood_released",
            "Blood units released".to_string(),
            format!(
                "{} {} unit(s) released to {}.",
                count,
                category.as_str(),
                facility
            ),
            Priority::Normal,
        )
        .related("category", category.as_str())
    }

    /// Summary emitted after a donor sync batch is approved.
    pub fn donor_sync_processed(new_count: usize, merged_count: usize) -> Self {
        Self::new(
            "donor_sync_processed",
            "Donor sync processed".to_string(),
            format!(
                "{} new donor(s) added, {} merged into existing records.",
                new_count, merged_count
            ),
            Priority::Normal,
        )
    }

    /// Center-side record of a partnership decision.
    pub fn partnership_update(organization: &str, request_id: &str, status: &str) -> Self {
        Self::new(
            "partnership_update",
            format!("Partnership request {}", status),
            format!(
                "Request from {} is now {}.",
                organization, status
            ),
            Priority::Normal,
        )
        .related("partnership_request", request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_defaults() {
        let n = Notification::new("test", "T".into(), "D".into(), Priority::Low);
        assert_eq!(n.status, NotificationStatus::Unread);
        assert!(n.read_at.is_none());
        assert_eq!(n.id.len(), 36);
    }

    #[test]
    fn test_rule_constructors_set_relations() {
        let n = Notification::expiring_urgent("SN-1", BloodCategory::RedBloodCell, 3);
        assert_eq!(n.notification_type, "expiring_urgent");
        assert_eq!(n.related_entity_id.as_deref(), Some("SN-1"));
        assert_eq!(n.priority, Priority::Urgent);
        assert!(n.description.contains("3 days"));

        let n = Notification::stock_low(BloodCategory::Plasma, 1);
        assert_eq!(n.related_entity_id.as_deref(), Some("Plasma"));
        assert!(n.description.contains("1 Plasma unit remain"));
    }

    #[test]
    fn test_priority_round_trip() {
        for p in [
            Priority::Low,
            Priority::Normal,
            Priority::High,
            Priority::Urgent,
            Priority::Critical,
        ] {
            assert_eq!(Priority::parse(p.as_str()), Some(p));
        }
        assert_eq!(Priority::parse("severe"), None);
    }
}
