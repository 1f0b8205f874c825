//! Snapshot retention scanning and purging.
//!
//! The scanner lists every snapshot, parses the timestamp embedded after
//! the `--auto-backup--` marker, and partitions qualifying snapshots into
//! keep and expired sets relative to a retention age. The purger deletes
//! an expired set one snapshot at a time, isolating per-item failures.

use chrono::{Duration, Local, NaiveDateTime};
use thiserror::Error;

use crate::backup::name::{BACKUP_MARKER, parse_backup_timestamp};
use crate::gateway::{ProviderGateway, Snapshot, SnapshotId};

/// Result of a retention scan.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetentionScan {
    /// Cutoff the scan compared embedded timestamps against.
    pub cutoff: NaiveDateTime,
    /// Snapshots strictly older than the cutoff, in provider listing
    /// order.
    pub expired: Vec<Snapshot>,
    /// Marker-bearing snapshots whose timestamp suffix failed to parse.
    /// These fail closed out of the expired set and are surfaced so
    /// callers can warn about them.
    pub skipped: Vec<SkippedSnapshot>,
}

/// A snapshot excluded from retention because its name did not parse.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SkippedSnapshot {
    /// Provider-assigned identifier.
    pub id: SnapshotId,
    /// Name carrying the marker but no parseable timestamp.
    pub name: String,
}

/// Errors raised while scanning snapshots for retention.
#[derive(Debug, Error)]
pub enum RetentionError<E>
where
    E: std::error::Error + 'static,
{
    /// Listing snapshots failed.
    #[error("failed to list snapshots: {0}")]
    List(#[source] E),
    /// The retention window is too large for clock arithmetic.
    #[error("retention window of {days} days is out of range")]
    WindowOutOfRange {
        /// Requested window in days.
        days: u32,
    },
}

/// Scans provider snapshots for entries older than a retention window.
#[derive(Clone, Debug)]
pub struct RetentionScanner<G> {
    gateway: G,
}

impl<G: ProviderGateway> RetentionScanner<G> {
    /// Creates a scanner over the given gateway.
    #[must_use]
    pub const fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Lists all snapshots and returns those whose embedded timestamp is
    /// strictly earlier than now minus `retention_days`.
    ///
    /// A window of zero days is valid and selects every qualifying
    /// snapshot not created in the current instant. Snapshots without the
    /// marker are never selected.
    ///
    /// # Errors
    ///
    /// Returns [`RetentionError::List`] when the provider listing fails
    /// and [`RetentionError::WindowOutOfRange`] when the window cannot be
    /// represented.
    pub async fn find_expired(
        &self,
        retention_days: u32,
    ) -> Result<RetentionScan, RetentionError<G::Error>> {
        let window = Duration::try_days(i64::from(retention_days))
            .ok_or(RetentionError::WindowOutOfRange {
                days: retention_days,
            })?;
        let cutoff = Local::now()
            .naive_local()
            .checked_sub_signed(window)
            .ok_or(RetentionError::WindowOutOfRange {
                days: retention_days,
            })?;
        let snapshots = self
            .gateway
            .list_snapshots()
            .await
            .map_err(RetentionError::List)?;
        Ok(partition_snapshots(snapshots, cutoff))
    }
}

/// Partitions `snapshots` into expired and skipped sets relative to
/// `cutoff`.
///
/// Only names carrying the `--auto-backup--` marker are considered. A
/// snapshot is expired when its embedded timestamp is strictly earlier
/// than `cutoff`; one timestamped exactly at the cutoff is kept. Malformed
/// suffixes fail closed into the skipped set instead of aborting the scan.
#[must_use]
pub fn partition_snapshots(snapshots: Vec<Snapshot>, cutoff: NaiveDateTime) -> RetentionScan {
    let mut expired = Vec::new();
    let mut skipped = Vec::new();
    for snapshot in snapshots {
        if !snapshot.name.contains(BACKUP_MARKER) {
            continue;
        }
        match parse_backup_timestamp(&snapshot.name) {
            Some(taken_at) if taken_at < cutoff => expired.push(snapshot),
            Some(_) => {}
            None => skipped.push(SkippedSnapshot {
                id: snapshot.id,
                name: snapshot.name,
            }),
        }
    }
    RetentionScan {
        cutoff,
        expired,
        skipped,
    }
}

/// Per-snapshot purge result.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PurgeOutcome {
    /// Snapshot the delete targeted.
    pub id: SnapshotId,
    /// Snapshot name at deletion time.
    pub name: String,
    /// Failure detail, absent when the delete was accepted.
    pub error: Option<String>,
}

impl PurgeOutcome {
    /// Reports whether the provider accepted the delete.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of purging a set of snapshots.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PurgeReport {
    /// The input set was empty; no delete call was made.
    NothingToDelete,
    /// One result per snapshot, in input order.
    Completed(Vec<PurgeOutcome>),
}

/// Deletes expired snapshots one by one, isolating failures.
#[derive(Clone, Debug)]
pub struct Purger<G> {
    gateway: G,
}

impl<G: ProviderGateway> Purger<G> {
    /// Creates a purger over the given gateway.
    #[must_use]
    pub const fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Deletes each snapshot and records success or failure independently.
    ///
    /// A rejected or failed delete never stops the remaining deletes. An
    /// empty input is reported as [`PurgeReport::NothingToDelete`] and
    /// issues no provider call.
    pub async fn purge(&self, snapshots: Vec<Snapshot>) -> PurgeReport {
        if snapshots.is_empty() {
            return PurgeReport::NothingToDelete;
        }

        let mut outcomes = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let error = match self.gateway.delete_snapshot(&snapshot.id).await {
                Ok(true) => None,
                Ok(false) => Some(String::from("delete request rejected")),
                Err(err) => Some(format!("delete request failed: {err}")),
            };
            outcomes.push(PurgeOutcome {
                id: snapshot.id,
                name: snapshot.name,
                error,
            });
        }
        PurgeReport::Completed(outcomes)
    }
}

#[cfg(test)]
mod tests;
