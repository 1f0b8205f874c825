//! Behavioural scenarios for retention scanning and purging driven
//! through the public API.

use dropsnap::test_support::{GatewayCall, ScriptedGateway, snapshot};
use dropsnap::{PurgeReport, Purger, RetentionScanner};

#[tokio::test]
async fn scan_and_purge_deletes_only_expired_auto_backups() {
    let gateway = ScriptedGateway::new();
    gateway.push_snapshot(snapshot("s-1", "web-1--auto-backup--2019-05-01 10:00:00"));
    gateway.push_snapshot(snapshot("s-2", "web-2--auto-backup--9999-01-01 00:00:00"));
    gateway.push_snapshot(snapshot("s-3", "manual-image"));
    gateway.push_snapshot(snapshot("s-4", "web-3--auto-backup--yesterday"));

    let scan = RetentionScanner::new(gateway.clone())
        .find_expired(7)
        .await
        .unwrap_or_else(|err| panic!("scan should resolve: {err}"));

    let expired: Vec<&str> = scan
        .expired
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(expired, ["s-1"]);
    let skipped: Vec<&str> = scan
        .skipped
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(skipped, ["s-4"], "malformed suffix should fail closed");

    let report = Purger::new(gateway.clone()).purge(scan.expired).await;
    let PurgeReport::Completed(outcomes) = report else {
        panic!("expected completed purge, got {report:?}");
    };
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes.iter().all(dropsnap::PurgeOutcome::succeeded));
    assert_eq!(gateway.delete_calls(), 1);
    assert!(
        gateway
            .calls()
            .iter()
            .any(|call| matches!(call, GatewayCall::DeleteSnapshot(id) if id == "s-1")),
        "delete should target the expired snapshot"
    );
}

#[tokio::test]
async fn purge_continues_after_a_rejected_delete() {
    let gateway = ScriptedGateway::new();
    gateway.push_snapshot(snapshot("s-1", "web-1--auto-backup--2019-05-01 10:00:00"));
    gateway.push_snapshot(snapshot("s-2", "web-2--auto-backup--2019-06-01 10:00:00"));
    gateway.reject_delete("s-1");

    let scan = RetentionScanner::new(gateway.clone())
        .find_expired(30)
        .await
        .unwrap_or_else(|err| panic!("scan should resolve: {err}"));
    let report = Purger::new(gateway.clone()).purge(scan.expired).await;

    let PurgeReport::Completed(outcomes) = report else {
        panic!("expected completed purge, got {report:?}");
    };
    let results: Vec<(&str, bool)> = outcomes
        .iter()
        .map(|outcome| (outcome.id.as_str(), outcome.succeeded()))
        .collect();
    assert_eq!(results, [("s-1", false), ("s-2", true)]);
    assert_eq!(gateway.delete_calls(), 2);
}

#[tokio::test]
async fn zero_day_window_selects_every_past_auto_backup() {
    let gateway = ScriptedGateway::new();
    gateway.push_snapshot(snapshot("s-1", "web-1--auto-backup--2020-01-01 00:00:00"));

    let scan = RetentionScanner::new(gateway.clone())
        .find_expired(0)
        .await
        .unwrap_or_else(|err| panic!("scan should resolve: {err}"));

    assert_eq!(scan.expired.len(), 1);
}

#[tokio::test]
async fn purging_an_empty_set_issues_no_deletes() {
    let gateway = ScriptedGateway::new();

    let report = Purger::new(gateway.clone()).purge(Vec::new()).await;

    assert_eq!(report, PurgeReport::NothingToDelete);
    assert_eq!(gateway.delete_calls(), 0);
}
