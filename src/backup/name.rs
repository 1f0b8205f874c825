//! Snapshot naming scheme shared by the backup and retention engines.
//!
//! Every snapshot created by this tool is named
//! `<droplet-name>--auto-backup--<timestamp>` with the timestamp in local
//! time. The embedded timestamp is the sole retention key; names without
//! the marker are never touched by automated retention.

use chrono::NaiveDateTime;

/// Marker embedded in every snapshot name created by this tool.
pub const BACKUP_MARKER: &str = "--auto-backup--";

/// Timestamp layout embedded after the marker.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Builds the snapshot name for `droplet_name` taken at `taken_at`.
#[must_use]
pub fn snapshot_name(droplet_name: &str, taken_at: NaiveDateTime) -> String {
    format!(
        "{droplet_name}{BACKUP_MARKER}{}",
        taken_at.format(TIMESTAMP_FORMAT)
    )
}

/// Extracts the creation timestamp embedded in `snapshot_name`.
///
/// Returns `None` when the marker is absent or the suffix does not parse
/// as a `YYYY-MM-DD HH:MM:SS` timestamp.
#[must_use]
pub fn parse_backup_timestamp(snapshot_name: &str) -> Option<NaiveDateTime> {
    let (_, suffix) = snapshot_name.split_once(BACKUP_MARKER)?;
    NaiveDateTime::parse_from_str(suffix, TIMESTAMP_FORMAT).ok()
}
