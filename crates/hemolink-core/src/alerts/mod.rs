//! Rule-based notification generation.
//!
//! Two independent rule families, each idempotent per unique serial or
//! category per time window. Both scans are read-then-conditionally-write
//! and safe to re-invoke from a timer or on dashboard load.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::warn;

use crate::db::{self, Database, DbError};
use crate::models::{BloodCategory, BloodUnit, Notification};

/// Stored-count threshold at or below which a category is low.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Alert engine errors.
#[derive(Error, Debug)]
pub enum AlertError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

pub type AlertResult<T> = Result<T, AlertError>;

/// Result of one scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub notifications_created: usize,
    pub notifications: Vec<Notification>,
}

/// Which expiry alert a unit qualifies for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExpiryAlert {
    Soon,
    Urgent,
    Expired,
}

/// Dedup window for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    /// At most one such notification per serial, ever.
    OnceEver,
    /// At most one per serial per calendar day.
    PerDay,
}

/// Days from `today` until the expiration timestamp's calendar date.
fn days_until(expiration: &str, today: NaiveDate) -> Option<i64> {
    let parsed: DateTime<Utc> = expiration.parse().ok()?;
    Some((parsed.date_naive() - today).num_days())
}

/// Component-specific expiry thresholds.
fn expiry_rule(category: BloodCategory, days: i64) -> Option<(ExpiryAlert, Window)> {
    if days <= 0 {
        return Some((ExpiryAlert::Expired, Window::PerDay));
    }
    match category {
        BloodCategory::RedBloodCell => {
            if days == 7 {
                Some((ExpiryAlert::Soon, Window::OnceEver))
            } else if (1..=5).contains(&days) {
                Some((ExpiryAlert::Urgent, Window::PerDay))
            } else {
                None
            }
        }
        BloodCategory::Plasma => {
            if (8..=30).contains(&days) && days % 7 == 0 {
                Some((ExpiryAlert::Soon, Window::PerDay))
            } else if (1..=7).contains(&days) {
                Some((ExpiryAlert::Urgent, Window::PerDay))
            } else {
                None
            }
        }
        BloodCategory::Platelet => {
            if days == 4 {
                Some((ExpiryAlert::Soon, Window::OnceEver))
            } else if (1..=3).contains(&days) {
                Some((ExpiryAlert::Urgent, Window::PerDay))
            } else {
                None
            }
        }
    }
}

/// Rule engine over the center database.
pub struct AlertEngine<'a> {
    db: &'a Database,
}

impl<'a> AlertEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Scan stored and non-conforming stock against the expiry thresholds.
    pub fn check_expiration_notifications(&self) -> AlertResult<ScanOutcome> {
        let today = Utc::now().date_naive();
        let day = today.format("%Y-%m-%d").to_string();

        let mut units = self.db.list_blood_stock()?;
        units.extend(self.db.list_non_conforming()?);

        let mut created = Vec::new();
        for unit in &units {
            let Some(days) = days_until(&unit.expiration_date, today) else {
                warn!(
                    serial_id = %unit.serial_id,
                    expiration = %unit.expiration_date,
                    "unparseable expiration date skipped by expiry scan"
                );
                continue;
            };
            let Some((alert, window)) = expiry_rule(unit.category, days) else {
                continue;
            };
            if let Some(notification) = self.build_expiry_alert(unit, alert, window, days, &day)? {
                self.db.insert_notification(&notification)?;
                created.push(notification);
            }
        }

        Ok(ScanOutcome {
            notifications_created: created.len(),
            notifications: created,
        })
    }

    fn build_expiry_alert(
        &self,
        unit: &BloodUnit,
        alert: ExpiryAlert,
        window: Window,
        days: i64,
        day: &str,
    ) -> AlertResult<Option<Notification>> {
        let notification = match alert {
            ExpiryAlert::Soon => Notification::expiring_soon(&unit.serial_id, unit.category, days),
            ExpiryAlert::Urgent => {
                Notification::expiring_urgent(&unit.serial_id, unit.category, days)
            }
            ExpiryAlert::Expired => Notification::stock_expired(&unit.serial_id, unit.category),
        };

        let conn = self.db.conn();
        let duplicate = match window {
            Window::OnceEver => db::notifications::exists_notification(
                conn,
                &notification.notification_type,
                &unit.serial_id,
            )?,
            Window::PerDay => db::notifications::exists_notification_on_day(
                conn,
                &notification.notification_type,
                &unit.serial_id,
                day,
            )?,
        };

        Ok(if duplicate { None } else { Some(notification) })
    }

    /// Count stored units per category and alert on depletion or low stock.
    /// At most one notification per category per calendar day.
    pub fn check_stock_level_notifications(&self) -> AlertResult<ScanOutcome> {
        let day = Utc::now().date_naive().format("%Y-%m-%d").to_string();

        let mut created = Vec::new();
        for category in BloodCategory::all() {
            let count = self.db.count_stored_by_category(category)?;
            let notification = if count == 0 {
                Notification::stock_out(category)
            } else if count <= LOW_STOCK_THRESHOLD {
                Notification::stock_low(category, count)
            } else {
                continue;
            };

            let duplicate = db::notifications::exists_notification_on_day(
                self.db.conn(),
                &notification.notification_type,
                category.as_str(),
                &day,
            )?;
            if !duplicate {
                self.db.insert_notification(&notification)?;
                created.push(notification);
            }
        }

        Ok(ScanOutcome {
            notifications_created: created.len(),
            notifications: created,
        })
    }
}
