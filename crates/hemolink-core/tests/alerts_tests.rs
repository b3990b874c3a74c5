//! Notification rule engine tests: thresholds and dedup windows.

use chrono::{Duration, Utc};

use hemolink_core::{BloodBank, BloodCategory, CollectionSource, UnitIntake};

/// An intake whose derived expiration lands `days_left` days from today.
fn intake_expiring_in(serial: &str, category: BloodCategory, days_left: i64) -> UnitIntake {
    let collection = Utc::now() - Duration::days(category.shelf_life_days() - days_left);
    UnitIntake {
        serial_id: serial.into(),
        blood_type: "O".into(),
        rh_factor: "+".into(),
        volume_ml: 450,
        category,
        source: CollectionSource::Mobile,
        collection_date: collection.to_rfc3339(),
    }
}

#[test]
fn expiration_scan_is_idempotent_within_a_day() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[
            // RBC exactly at the one-time warning threshold
            intake_expiring_in("SN-RBC7", BloodCategory::RedBloodCell, 7),
            // RBC inside the urgent window
            intake_expiring_in("SN-RBC3", BloodCategory::RedBloodCell, 3),
            // Platelet inside the urgent window
            intake_expiring_in("SN-PLT2", BloodCategory::Platelet, 2),
            // Plasma past expiry
            intake_expiring_in("SN-PLS0", BloodCategory::Plasma, -1),
            // RBC far from any threshold
            intake_expiring_in("SN-FAR", BloodCategory::RedBloodCell, 20),
        ],
        "tech-1",
    )
    .unwrap();

    let first = bank.check_and_create_expiration_notifications().unwrap();
    assert_eq!(first.notifications_created, 4);

    let types: Vec<&str> = first
        .notifications
        .iter()
        .map(|n| n.notification_type.as_str())
        .collect();
    assert!(types.contains(&"expiring_soon"));
    assert!(types.contains(&"expiring_urgent"));
    assert!(types.contains(&"stock_expired"));

    // Same day, unchanged stock: every dedup branch suppresses a repeat
    let second = bank.check_and_create_expiration_notifications().unwrap();
    assert_eq!(second.notifications_created, 0);

    let third = bank.check_and_create_expiration_notifications().unwrap();
    assert_eq!(third.notifications_created, 0);
}

#[test]
fn plasma_early_warnings_fire_on_multiples_of_seven() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[
            intake_expiring_in("SN-P14", BloodCategory::Plasma, 14),
            intake_expiring_in("SN-P20", BloodCategory::Plasma, 20),
            intake_expiring_in("SN-P28", BloodCategory::Plasma, 28),
        ],
        "tech-1",
    )
    .unwrap();

    let outcome = bank.check_and_create_expiration_notifications().unwrap();
    assert_eq!(outcome.notifications_created, 2);

    let serials: Vec<&str> = outcome
        .notifications
        .iter()
        .filter_map(|n| n.related_entity_id.as_deref())
        .collect();
    assert!(serials.contains(&"SN-P14"));
    assert!(serials.contains(&"SN-P28"));
    assert!(!serials.contains(&"SN-P20"));
}

#[test]
fn non_conforming_units_are_scanned_too() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[intake_expiring_in("SN-NC", BloodCategory::Platelet, 2)],
        "tech-1",
    )
    .unwrap();
    bank.transfer_to_non_conforming(&["SN-NC".into()], Some("clotting"), "qc-1")
        .unwrap();

    let outcome = bank.check_and_create_expiration_notifications().unwrap();
    assert!(outcome
        .notifications
        .iter()
        .any(|n| n.related_entity_id.as_deref() == Some("SN-NC")));
}

#[test]
fn stock_level_rules_classify_and_dedup_per_day() {
    let bank = BloodBank::open_in_memory().unwrap();
    // Plasma at 3 stored units: low. RBC and platelet at zero: out.
    bank.add_blood_stock(
        &[
            intake_expiring_in("SN-1", BloodCategory::Plasma, 100),
            intake_expiring_in("SN-2", BloodCategory::Plasma, 100),
            intake_expiring_in("SN-3", BloodCategory::Plasma, 100),
        ],
        "tech-1",
    )
    .unwrap();

    let first = bank.check_and_create_stock_level_notifications().unwrap();
    assert_eq!(first.notifications_created, 3);

    let low = first
        .notifications
        .iter()
        .find(|n| n.notification_type == "stock_low")
        .unwrap();
    assert_eq!(low.related_entity_id.as_deref(), Some("Plasma"));

    let outs: Vec<&str> = first
        .notifications
        .iter()
        .filter(|n| n.notification_type == "stock_out")
        .filter_map(|n| n.related_entity_id.as_deref())
        .collect();
    assert_eq!(outs.len(), 2);
    assert!(outs.contains(&"Red Blood Cell"));
    assert!(outs.contains(&"Platelet"));

    // Category stuck at the same count: exactly one notification per day
    let second = bank.check_and_create_stock_level_notifications().unwrap();
    assert_eq!(second.notifications_created, 0);
}

#[test]
fn healthy_stock_levels_stay_quiet() {
    let bank = BloodBank::open_in_memory().unwrap();
    let intakes: Vec<UnitIntake> = (0..11)
        .map(|i| intake_expiring_in(&format!("SN-{}", i), BloodCategory::Plasma, 100))
        .collect();
    bank.add_blood_stock(&intakes, "tech-1").unwrap();

    let outcome = bank.check_and_create_stock_level_notifications().unwrap();
    // Plasma is above threshold; only the two empty categories alert
    assert_eq!(outcome.notifications_created, 2);
    assert!(outcome
        .notifications
        .iter()
        .all(|n| n.notification_type == "stock_out"));
}

#[test]
fn mixed_scans_do_not_interfere() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[intake_expiring_in("SN-1", BloodCategory::RedBloodCell, 3)],
        "tech-1",
    )
    .unwrap();

    let expiry = bank.check_and_create_expiration_notifications().unwrap();
    assert_eq!(expiry.notifications_created, 1);

    // Stock-level scan still fires independently for the same category
    let levels = bank.check_and_create_stock_level_notifications().unwrap();
    assert_eq!(levels.notifications_created, 3);

    // And both remain idempotent afterwards
    assert_eq!(
        bank.check_and_create_expiration_notifications()
            .unwrap()
            .notifications_created,
        0
    );
    assert_eq!(
        bank.check_and_create_stock_level_notifications()
            .unwrap()
            .notifications_created,
        0
    );
}
