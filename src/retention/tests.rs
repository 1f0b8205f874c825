//! Unit tests for retention scanning and purging.

use chrono::NaiveDateTime;
use rstest::rstest;

use super::*;
use crate::backup::name::TIMESTAMP_FORMAT;
use crate::test_support::{ScriptedGateway, snapshot};

fn timestamp(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).expect("test timestamp should parse")
}

fn auto_snapshot(id: &str, droplet_name: &str, taken_at: &str) -> Snapshot {
    snapshot(id, &format!("{droplet_name}--auto-backup--{taken_at}"))
}

#[rstest]
fn partition_selects_only_entries_strictly_before_cutoff() {
    let cutoff = timestamp("2024-06-01 00:00:00");
    let snapshots = vec![
        auto_snapshot("s-1", "web-1", "2024-05-20 08:00:00"),
        auto_snapshot("s-2", "web-1", "2024-06-10 08:00:00"),
        auto_snapshot("s-3", "web-2", "2024-06-20 08:00:00"),
    ];

    let scan = partition_snapshots(snapshots, cutoff);

    let ids: Vec<&str> = scan.expired.iter().map(|snap| snap.id.as_str()).collect();
    assert_eq!(ids, ["s-1"]);
    assert!(scan.skipped.is_empty());
}

#[rstest]
fn partition_keeps_a_snapshot_timestamped_exactly_at_cutoff() {
    let cutoff = timestamp("2024-06-01 00:00:00");
    let snapshots = vec![
        auto_snapshot("s-1", "web-1", "2024-06-01 00:00:00"),
        auto_snapshot("s-2", "web-1", "2024-05-31 23:59:59"),
    ];

    let scan = partition_snapshots(snapshots, cutoff);

    let ids: Vec<&str> = scan.expired.iter().map(|snap| snap.id.as_str()).collect();
    assert_eq!(ids, ["s-2"], "only the strictly earlier snapshot expires");
}

#[rstest]
#[case("manual-before-migration")]
#[case("web-1 2001-01-01 00:00:00")]
fn partition_never_selects_names_without_the_marker(#[case] name: &str) {
    let cutoff = timestamp("2024-06-01 00:00:00");

    let scan = partition_snapshots(vec![snapshot("s-1", name)], cutoff);

    assert!(scan.expired.is_empty());
    assert!(scan.skipped.is_empty());
}

#[rstest]
fn partition_fails_closed_on_malformed_suffixes() {
    let cutoff = timestamp("2024-06-01 00:00:00");
    let snapshots = vec![
        snapshot("s-1", "web-1--auto-backup--not-a-date"),
        auto_snapshot("s-2", "web-1", "2024-05-20 08:00:00"),
    ];

    let scan = partition_snapshots(snapshots, cutoff);

    let expired_ids: Vec<&str> = scan.expired.iter().map(|snap| snap.id.as_str()).collect();
    assert_eq!(expired_ids, ["s-2"]);
    let skipped_ids: Vec<&str> = scan.skipped.iter().map(|skip| skip.id.as_str()).collect();
    assert_eq!(skipped_ids, ["s-1"]);
}

#[rstest]
fn partition_preserves_listing_order() {
    let cutoff = timestamp("2024-06-01 00:00:00");
    let snapshots = vec![
        auto_snapshot("s-3", "web-3", "2024-01-03 00:00:00"),
        auto_snapshot("s-1", "web-1", "2024-01-01 00:00:00"),
        auto_snapshot("s-2", "web-2", "2024-01-02 00:00:00"),
    ];

    let scan = partition_snapshots(snapshots, cutoff);

    let ids: Vec<&str> = scan.expired.iter().map(|snap| snap.id.as_str()).collect();
    assert_eq!(ids, ["s-3", "s-1", "s-2"]);
}

#[tokio::test]
async fn find_expired_scans_provider_snapshots() {
    let gateway = ScriptedGateway::new();
    gateway.push_snapshot(auto_snapshot("s-old", "web-1", "2000-01-01 00:00:00"));
    gateway.push_snapshot(auto_snapshot("s-new", "web-1", "9999-01-01 00:00:00"));
    let scanner = RetentionScanner::new(gateway);

    let scan = scanner.find_expired(30).await.expect("scan should run");

    let ids: Vec<&str> = scan.expired.iter().map(|snap| snap.id.as_str()).collect();
    assert_eq!(ids, ["s-old"]);
}

#[tokio::test]
async fn find_expired_with_zero_days_selects_past_snapshots() {
    let gateway = ScriptedGateway::new();
    gateway.push_snapshot(auto_snapshot("s-old", "web-1", "2000-01-01 00:00:00"));
    let scanner = RetentionScanner::new(gateway);

    let scan = scanner.find_expired(0).await.expect("scan should run");

    assert_eq!(scan.expired.len(), 1);
}

#[tokio::test]
async fn find_expired_surfaces_listing_failures() {
    let gateway = ScriptedGateway::new();
    gateway.fail_listing();
    let scanner = RetentionScanner::new(gateway);

    let err = scanner
        .find_expired(7)
        .await
        .expect_err("listing failure should abort the scan");

    assert!(matches!(err, RetentionError::List(_)));
}

#[tokio::test]
async fn purge_of_empty_set_is_a_no_op() {
    let gateway = ScriptedGateway::new();
    let purger = Purger::new(gateway.clone());

    let report = purger.purge(Vec::new()).await;

    assert_eq!(report, PurgeReport::NothingToDelete);
    assert_eq!(gateway.delete_calls(), 0);
}

#[tokio::test]
async fn purge_continues_past_rejected_deletes() {
    let gateway = ScriptedGateway::new();
    gateway.reject_delete("s-1");
    let purger = Purger::new(gateway.clone());
    let doomed = vec![
        snapshot("s-1", "web-1--auto-backup--2024-01-01 00:00:00"),
        snapshot("s-2", "web-2--auto-backup--2024-01-02 00:00:00"),
    ];

    let report = purger.purge(doomed).await;

    let PurgeReport::Completed(outcomes) = report else {
        panic!("expected completed report, got {report:?}");
    };
    assert_eq!(outcomes.len(), 2);
    let succeeded: Vec<bool> = outcomes
        .iter()
        .map(PurgeOutcome::succeeded)
        .collect();
    assert_eq!(succeeded, [false, true]);
    assert_eq!(gateway.delete_calls(), 2);
}
