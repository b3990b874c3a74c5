//! Weekly inventory summary.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use super::escape_csv;
use crate::db::{Database, DbResult};
use crate::models::{BloodCategory, HistoryAction};

/// Stored-unit count for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Transition count for one audit-log action over the period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionCount {
    pub action: String,
    pub count: i64,
}

/// Inventory summary over the trailing seven days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub generated_at: String,
    pub period_start: String,
    pub stored: Vec<CategoryCount>,
    pub non_conforming_count: i64,
    pub transitions: Vec<TransitionCount>,
}

impl WeeklySummary {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format: one section for stock levels, one for
    /// transitions.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str("section,name,count\n");
        for c in &self.stored {
            csv.push_str(&format!("stored,{},{}\n", escape_csv(&c.category), c.count));
        }
        csv.push_str(&format!("non_conforming,all,{}\n", self.non_conforming_count));
        for t in &self.transitions {
            csv.push_str(&format!(
                "transition,{},{}\n",
                escape_csv(&t.action),
                t.count
            ));
        }
        csv
    }
}

/// Summary exporter.
pub struct SummaryExporter<'a> {
    db: &'a Database,
}

impl<'a> SummaryExporter<'a> {
    /// Create a new summary exporter.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Build the trailing-seven-day summary.
    pub fn weekly_summary(&self) -> DbResult<WeeklySummary> {
        let now = Utc::now();
        let period_start = (now - Duration::days(7)).to_rfc3339();

        let mut stored = Vec::new();
        for category in BloodCategory::all() {
            stored.push(CategoryCount {
                category: category.as_str().to_string(),
                count: self.db.count_stored_by_category(category)?,
            });
        }

        let mut transitions = Vec::new();
        for action in [
            HistoryAction::Added,
            HistoryAction::Released,
            HistoryAction::Discarded,
            HistoryAction::NonConforming,
        ] {
            transitions.push(TransitionCount {
                action: action.as_str().to_string(),
                count: self.db.count_history_since(action, &period_start)?,
            });
        }

        Ok(WeeklySummary {
            generated_at: now.to_rfc3339(),
            period_start,
            stored,
            non_conforming_count: self.db.list_non_conforming()?.len() as i64,
            transitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::stock::{append_history, insert_stock_unit};
    use crate::models::{BloodUnit, CollectionSource, UnitIntake};
    use chrono::DateTime;

    fn make_unit(serial: &str, category: BloodCategory) -> BloodUnit {
        let collection: DateTime<Utc> = "2026-08-01T08:00:00+00:00".parse().unwrap();
        BloodUnit::from_intake(
            &UnitIntake {
                serial_id: serial.into(),
                blood_type: "A".into(),
                rh_factor: "+".into(),
                volume_ml: 450,
                category,
                source: CollectionSource::WalkIn,
                collection_date: "2026-08-01T08:00:00+00:00".into(),
            },
            collection,
        )
    }

    #[test]
    fn test_weekly_summary_counts() {
        let db = Database::open_in_memory().unwrap();
        insert_stock_unit(db.conn(), &make_unit("SN-1", BloodCategory::Plasma)).unwrap();
        insert_stock_unit(db.conn(), &make_unit("SN-2", BloodCategory::Plasma)).unwrap();
        append_history(
            db.conn(),
            "SN-1",
            HistoryAction::Added,
            BloodCategory::Plasma,
            Some("A+"),
            "tech-1",
        )
        .unwrap();

        let summary = SummaryExporter::new(&db).weekly_summary().unwrap();
        let plasma = summary
            .stored
            .iter()
            .find(|c| c.category == "Plasma")
            .unwrap();
        assert_eq!(plasma.count, 2);

        let added = summary
            .transitions
            .iter()
            .find(|t| t.action == "ADDED")
            .unwrap();
        assert_eq!(added.count, 1);
    }

    #[test]
    fn test_summary_serializes() {
        let db = Database::open_in_memory().unwrap();
        let summary = SummaryExporter::new(&db).weekly_summary().unwrap();

        let json = summary.to_json().unwrap();
        assert!(json.contains("Red Blood Cell"));

        let csv = summary.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        // Header + 3 categories + non_conforming + 4 transitions
        assert_eq!(lines.len(), 9);
        assert!(lines[0].contains("section"));
    }
}
