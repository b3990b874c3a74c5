//! Donor-sync reconciliation tests through the facade.

use hemolink_core::{BloodBank, BloodBankError, DonorSubmission, SyncError, SyncStatus};

fn submission(first: &str, last: &str) -> DonorSubmission {
    DonorSubmission {
        donor_id: None,
        first_name: first.into(),
        last_name: last.into(),
        middle_name: None,
        birth_date: None,
        sex: None,
        contact_number: None,
        email: None,
        address: None,
        blood_type: Some("O".into()),
        rh_factor: Some("positive".into()),
    }
}

#[test]
fn duplicate_donor_merges_instead_of_inserting() {
    let bank = BloodBank::open_in_memory().unwrap();

    // Existing walk-in donor
    let existing = bank.register_donor(&submission("Juan", "Dela Cruz")).unwrap();
    assert_eq!(existing.donation_count, 1);

    // Case/whitespace variant arrives from a partner organization
    bank.request_donor_sync(
        &[submission("juan", " Dela Cruz ")],
        "Northern Lifeline",
        "user-1",
        "Coordinator",
    )
    .unwrap();

    let outcome = bank.approve_donor_sync("admin").unwrap();
    assert_eq!(outcome.total_processed, 1);
    assert_eq!(outcome.merged_records.len(), 1);
    assert!(outcome.new_records.is_empty());

    // No second row; the surviving donor accumulated the donation
    let donors = bank.list_donors().unwrap();
    assert_eq!(donors.len(), 1);
    assert_eq!(donors[0].donor_id, existing.donor_id);
    assert_eq!(donors[0].donation_count, 2);
    assert_eq!(donors[0].donation_dates.len(), 2);
    assert!(donors[0].last_donation_date.is_some());
}

#[test]
fn unmatched_submission_becomes_exactly_one_new_donor() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.register_donor(&submission("Juan", "Dela Cruz")).unwrap();

    bank.request_donor_sync(
        &[submission("Maria", "Santos")],
        "Northern Lifeline",
        "user-1",
        "Coordinator",
    )
    .unwrap();

    let outcome = bank.approve_donor_sync("admin").unwrap();
    assert_eq!(outcome.new_records.len(), 1);
    assert!(outcome.merged_records.is_empty());

    let donors = bank.list_donors().unwrap();
    assert_eq!(donors.len(), 2);
    let maria = donors.iter().find(|d| d.first_name == "Maria").unwrap();
    assert_eq!(maria.donation_count, 1);
    assert_eq!(maria.donation_dates.len(), 1);
    assert_eq!(maria.source_organization.as_deref(), Some("Northern Lifeline"));
}

#[test]
fn new_donors_get_sequential_center_ids() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.request_donor_sync(
        &[
            submission("Ana", "Reyes"),
            submission("Pedro", "Santos"),
            submission("Liza", "Garcia"),
        ],
        "Org",
        "user-1",
        "Coordinator",
    )
    .unwrap();

    let outcome = bank.approve_donor_sync("admin").unwrap();
    let mut ids: Vec<String> = outcome
        .new_records
        .iter()
        .map(|d| d.donor_id.clone())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["DNR-0001-ON", "DNR-0002-ON", "DNR-0003-ON"]);
}

#[test]
fn mixed_batch_reports_both_counts() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.register_donor(&submission("Juan", "Dela Cruz")).unwrap();

    bank.request_donor_sync(
        &[
            submission("JUAN", "dela cruz"),
            submission("Maria", "Santos"),
            submission("Pedro", "Reyes"),
        ],
        "Org",
        "user-1",
        "Coordinator",
    )
    .unwrap();

    let outcome = bank.approve_donor_sync("admin").unwrap();
    assert_eq!(outcome.total_processed, 3);
    assert_eq!(outcome.merged_records.len(), 1);
    assert_eq!(outcome.new_records.len(), 2);

    // Every staged record is now approved and stamped
    assert!(bank.pending_sync_requests().unwrap().is_empty());
}

#[test]
fn reapproving_with_nothing_pending_is_a_noop() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.request_donor_sync(&[submission("Ana", "Reyes")], "Org", "u", "n")
        .unwrap();
    bank.approve_donor_sync("admin").unwrap();

    let second = bank.approve_donor_sync("admin").unwrap();
    assert_eq!(second.total_processed, 0);
    assert!(second.new_records.is_empty());
    assert!(second.merged_records.is_empty());
    assert_eq!(bank.list_donors().unwrap().len(), 1);
}

#[test]
fn decline_requires_reason_and_keeps_master_untouched() {
    let bank = BloodBank::open_in_memory().unwrap();
    let staged = bank
        .request_donor_sync(&[submission("Ana", "Reyes")], "Org", "u", "n")
        .unwrap();

    let err = bank.decline_sync_request(&staged[0].id, "").unwrap_err();
    assert!(matches!(
        err,
        BloodBankError::Sync(SyncError::Validation { field: "reason", .. })
    ));

    let rejected = bank
        .decline_sync_request(&staged[0].id, "Incomplete screening data")
        .unwrap();
    assert_eq!(rejected.sync_status, SyncStatus::Rejected);
    assert!(bank.list_donors().unwrap().is_empty());
}

#[test]
fn cleanup_purges_only_approved_records() {
    let bank = BloodBank::open_in_memory().unwrap();
    let staged = bank
        .request_donor_sync(
            &[submission("Ana", "Reyes"), submission("Pedro", "Santos")],
            "Org",
            "u",
            "n",
        )
        .unwrap();
    bank.decline_sync_request(&staged[0].id, "duplicate submission")
        .unwrap();
    bank.approve_donor_sync("admin").unwrap();

    let removed = bank.cleanup_sync_records().unwrap();
    assert_eq!(removed, 1);

    // The rejected record is retained with its reason
    let err = bank.similar_donors(&staged[1].id, 5).unwrap_err();
    assert!(matches!(err, BloodBankError::Sync(SyncError::NotFound(_))));
    let survivors = bank.similar_donors(&staged[0].id, 5);
    assert!(survivors.is_ok());
}

#[test]
fn approval_emits_summary_notification() {
    let bank = BloodBank::open_in_memory().unwrap();
    bank.request_donor_sync(&[submission("Ana", "Reyes")], "Org", "u", "n")
        .unwrap();
    bank.approve_donor_sync("admin").unwrap();

    let notifications = bank.list_notifications(None).unwrap();
    assert!(notifications
        .iter()
        .any(|n| n.notification_type == "donor_sync_processed"));
}

#[test]
fn walk_in_donation_accumulates_on_existing_donor() {
    let bank = BloodBank::open_in_memory().unwrap();
    let donor = bank.register_donor(&submission("Ana", "Reyes")).unwrap();

    let updated = bank.record_walk_in_donation(&donor.donor_id).unwrap();
    assert_eq!(updated.donation_count, 2);

    let listed = bank.list_donors().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].donation_count, 2);
}
