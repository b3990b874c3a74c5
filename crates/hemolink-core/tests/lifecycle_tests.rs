//! End-to-end blood-unit lifecycle tests through the facade.

use chrono::{Duration, Utc};

use hemolink_core::{
    BloodBank, BloodBankError, BloodCategory, CollectionSource, DiscardRequest, InventoryError,
    ReleaseRequest, UnitIntake,
};
use hemolink_core::models::{DisposalDetails, HistoryAction, ReleaseDetails};

fn intake(serial: &str, category: BloodCategory) -> UnitIntake {
    UnitIntake {
        serial_id: serial.into(),
        blood_type: "A".into(),
        rh_factor: "Positive".into(),
        volume_ml: 450,
        category,
        source: CollectionSource::WalkIn,
        collection_date: (Utc::now() - Duration::days(1)).to_rfc3339(),
    }
}

fn disposal() -> DisposalDetails {
    DisposalDetails {
        responsible_personnel: "tech-1".into(),
        reason_for_discarding: "Failed visual inspection".into(),
        authorized_by: "supervisor".into(),
        date_of_discard: "2026-08-07".into(),
        time_of_discard: "09:00".into(),
        method_of_disposal: "Incineration".into(),
        remarks: None,
    }
}

fn release_details() -> ReleaseDetails {
    ReleaseDetails {
        recipient_name: "J. Cruz".into(),
        facility_name: "City General Hospital".into(),
        released_by: "tech-2".into(),
        release_date: "2026-08-07".into(),
        release_time: "10:30".into(),
        remarks: Some("Emergency requisition".into()),
    }
}

#[test]
fn transfer_round_trip_preserves_attributes() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(&[intake("SN-100", BloodCategory::RedBloodCell)], "tech-1")
        .unwrap();

    let before = bank.list_blood_stock().unwrap();
    assert_eq!(before.len(), 1);

    bank.transfer_to_non_conforming(&["SN-100".into()], Some("hemolysis"), "qc-1")
        .unwrap();

    // Gone from stock, present in non-conforming with identical blood attributes
    assert!(bank.list_blood_stock().unwrap().is_empty());
    let after = bank.list_non_conforming().unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].serial_id, before[0].serial_id);
    assert_eq!(after[0].blood_type, before[0].blood_type);
    assert_eq!(after[0].result_blood_type, Some("A+".into()));
    assert_eq!(after[0].expiration_date, before[0].expiration_date);
    assert_eq!(after[0].status, "Non-Conforming");

    let history = bank.stock_history("SN-100").unwrap();
    let actions: Vec<HistoryAction> = history.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![HistoryAction::Added, HistoryAction::NonConforming]);
}

#[test]
fn transfer_of_missing_serial_rolls_back_whole_batch() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[
            intake("SN-1", BloodCategory::Plasma),
            intake("SN-2", BloodCategory::Plasma),
        ],
        "tech-1",
    )
    .unwrap();

    let err = bank
        .transfer_to_non_conforming(
            &["SN-1".into(), "SN-404".into(), "SN-2".into()],
            None,
            "qc-1",
        )
        .unwrap_err();
    match err {
        BloodBankError::Inventory(InventoryError::SerialNotFound { serial_id }) => {
            assert_eq!(serial_id, "SN-404")
        }
        other => panic!("expected SerialNotFound, got {:?}", other),
    }

    // SN-1 was processed before the failure but must not have moved
    assert_eq!(bank.list_blood_stock().unwrap().len(), 2);
    assert!(bank.list_non_conforming().unwrap().is_empty());
}

#[test]
fn atomic_batch_discard_identifies_missing_serial() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[
            intake("SN-A", BloodCategory::RedBloodCell),
            intake("SN-C", BloodCategory::RedBloodCell),
        ],
        "tech-1",
    )
    .unwrap();

    let err = bank
        .discard_stock(
            &DiscardRequest {
                serial_ids: vec!["SN-A".into(), "SN-B".into(), "SN-C".into()],
                category: BloodCategory::RedBloodCell,
                details: disposal(),
            },
            "tech-1",
        )
        .unwrap_err();
    match err {
        BloodBankError::Inventory(InventoryError::SerialNotFound { serial_id }) => {
            assert_eq!(serial_id, "SN-B")
        }
        other => panic!("expected SerialNotFound for SN-B, got {:?}", other),
    }

    // A and C stay untouched in their original table
    let remaining = bank.list_blood_stock().unwrap();
    assert_eq!(remaining.len(), 2);
}

#[test]
fn discard_pulls_from_both_source_tables_and_notifies() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[
            intake("SN-1", BloodCategory::Platelet),
            intake("SN-2", BloodCategory::Platelet),
        ],
        "tech-1",
    )
    .unwrap();
    bank.transfer_to_non_conforming(&["SN-2".into()], None, "qc-1")
        .unwrap();

    let lookup = bank
        .find_discard_candidates(
            &["SN-1".into(), "SN-2".into()],
            BloodCategory::Platelet,
        )
        .unwrap();
    assert_eq!(lookup.found.len(), 2);
    assert!(lookup.missing.is_empty());

    let outcome = bank
        .discard_stock(
            &DiscardRequest {
                serial_ids: vec!["SN-1".into(), "SN-2".into()],
                category: BloodCategory::Platelet,
                details: disposal(),
            },
            "tech-1",
        )
        .unwrap();
    assert_eq!(outcome.discarded, 2);

    assert!(bank.list_blood_stock().unwrap().is_empty());
    assert!(bank.list_non_conforming().unwrap().is_empty());

    let discarded = bank.list_discarded().unwrap();
    assert_eq!(discarded.len(), 2);
    assert_eq!(discarded[0].details.method_of_disposal, "Incineration");

    // One discard confirmation naming count and component
    let notifications = bank.list_notifications(None).unwrap();
    let discard_note = notifications
        .iter()
        .find(|n| n.notification_type == "blood_discarded")
        .unwrap();
    assert!(discard_note.description.contains("2 Platelet"));
}

#[test]
fn release_with_invoice_links_and_notifies() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[
            intake("SN-1", BloodCategory::RedBloodCell),
            intake("SN-2", BloodCategory::RedBloodCell),
        ],
        "tech-2",
    )
    .unwrap();

    let outcome = bank
        .release_stock(
            &ReleaseRequest {
                serial_ids: vec!["SN-1".into(), "SN-2".into()],
                category: BloodCategory::RedBloodCell,
                details: release_details(),
                create_invoice: true,
            },
            "tech-2",
        )
        .unwrap();
    assert_eq!(outcome.released, 2);
    let invoice_id = outcome.invoice_id.expect("invoice requested");

    let batch = bank.export_invoices().unwrap();
    assert_eq!(batch.invoices.len(), 1);
    assert_eq!(batch.invoices[0].invoice_id, invoice_id);
    assert_eq!(batch.invoices[0].unit_count, 2);

    let released = bank.list_released().unwrap();
    assert_eq!(released.len(), 2);
    assert!(released.iter().all(|r| r.invoice_id.as_deref() == Some(invoice_id.as_str())));

    let history = bank.stock_history("SN-1").unwrap();
    assert_eq!(history.last().unwrap().action, HistoryAction::Released);

    let notifications = bank.list_notifications(None).unwrap();
    assert!(notifications
        .iter()
        .any(|n| n.notification_type == "blood_released"
            && n.description.contains("City General Hospital")));
}

#[test]
fn release_without_invoice() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(&[intake("SN-1", BloodCategory::Plasma)], "tech-1")
        .unwrap();

    let outcome = bank
        .release_stock(
            &ReleaseRequest {
                serial_ids: vec!["SN-1".into()],
                category: BloodCategory::Plasma,
                details: release_details(),
                create_invoice: false,
            },
            "tech-1",
        )
        .unwrap();
    assert!(outcome.invoice_id.is_none());
    assert!(bank.export_invoices().unwrap().invoices.is_empty());
}

#[test]
fn duplicate_serial_on_add_names_the_offender() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(&[intake("SN-DUP", BloodCategory::Plasma)], "tech-1")
        .unwrap();

    let err = bank
        .add_blood_stock(&[intake("SN-DUP", BloodCategory::Plasma)], "tech-1")
        .unwrap_err();
    match err {
        BloodBankError::Inventory(InventoryError::DuplicateSerial { serial_id }) => {
            assert_eq!(serial_id, "SN-DUP")
        }
        other => panic!("expected DuplicateSerial, got {:?}", other),
    }
}

#[test]
fn weekly_summary_reflects_transitions() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.add_blood_stock(
        &[
            intake("SN-1", BloodCategory::Plasma),
            intake("SN-2", BloodCategory::Plasma),
        ],
        "tech-1",
    )
    .unwrap();
    bank.transfer_to_non_conforming(&["SN-2".into()], None, "qc-1")
        .unwrap();

    let summary = bank.weekly_summary().unwrap();
    let plasma = summary
        .stored
        .iter()
        .find(|c| c.category == "Plasma")
        .unwrap();
    assert_eq!(plasma.count, 1);
    assert_eq!(summary.non_conforming_count, 1);

    let added = summary
        .transitions
        .iter()
        .find(|t| t.action == "ADDED")
        .unwrap();
    assert_eq!(added.count, 2);
}
