//! Offline backup orchestration: power off, snapshot, power back on.
//!
//! A single backup drives a droplet through power-off → snapshot →
//! wait-for-completion → power-on, tracking the provider's asynchronous
//! snapshot action to a terminal state. Batch backups fan this out over a
//! tag: every snapshot request is issued before any wait begins so the
//! fleet powers down roughly together, then each action is waited out
//! concurrently. Per-droplet failures are folded into outcomes and never
//! abort the run.

use std::time::Duration;

use chrono::Local;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::sleep;

use crate::gateway::{ActionHandle, ActionStatus, Droplet, DropletId, ProviderGateway};

pub mod name;

const ACTION_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Per-droplet result of one backup attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackupOutcome {
    /// Droplet the backup targeted.
    pub droplet_id: DropletId,
    /// Display name of the droplet at the time of the backup.
    pub droplet_name: String,
    /// Name the snapshot was requested under. The embedded timestamp
    /// reflects when the request was issued.
    pub snapshot_name: String,
    /// Failure detail, absent when the backup succeeded.
    pub error: Option<BackupError>,
}

impl BackupOutcome {
    /// Reports whether the snapshot completed and power-on was accepted.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Failure detail attached to a [`BackupOutcome`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BackupError {
    /// The snapshot did not complete: the request was rejected, polling
    /// failed, or the action reached a failed terminal state. When the
    /// subsequent power-on also failed the message carries a note.
    #[error("snapshot failed: {message}")]
    Snapshot {
        /// Human-readable description of the failure.
        message: String,
    },
    /// The snapshot completed but the droplet could not be powered back on.
    #[error("power-on failed: {message}")]
    PowerOn {
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Result of a tag-driven batch backup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BatchOutcome {
    /// No droplet carried the requested tag; nothing was attempted.
    NoMatches,
    /// One outcome per matched droplet, in provider listing order. Present
    /// even for droplets whose backup failed.
    Completed(Vec<BackupOutcome>),
}

/// Errors that abort a backup run before per-droplet isolation applies.
#[derive(Debug, Error)]
pub enum BackupRunError<E>
where
    E: std::error::Error + 'static,
{
    /// Listing droplets failed; no backup was attempted.
    #[error("failed to list droplets: {0}")]
    List(#[source] E),
    /// The requested droplet does not exist.
    #[error("droplet {droplet_id} not found")]
    DropletNotFound {
        /// Identifier that failed to resolve.
        droplet_id: DropletId,
    },
    /// A wait task was cancelled or panicked.
    #[error("backup wait task aborted: {message}")]
    WaitTask {
        /// Join error reported by the runtime.
        message: String,
    },
}

/// A snapshot request that has been issued but not yet waited on.
#[derive(Clone, Debug)]
struct PendingBackup {
    droplet_id: DropletId,
    droplet_name: String,
    snapshot_name: String,
    action: Result<ActionHandle, String>,
}

/// Drives droplets through the power-off → snapshot → power-on cycle.
#[derive(Clone, Debug)]
pub struct BackupOrchestrator<G> {
    gateway: G,
    poll_interval: Duration,
}

impl<G> BackupOrchestrator<G>
where
    G: ProviderGateway + Clone + Send + Sync + 'static,
{
    /// Creates an orchestrator polling actions every three seconds.
    #[must_use]
    pub const fn new(gateway: G) -> Self {
        Self {
            gateway,
            poll_interval: ACTION_POLL_INTERVAL,
        }
    }

    /// Overrides the action polling interval.
    ///
    /// This is primarily used by tests to keep polling scenarios fast.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Backs up a single droplet and returns its outcome.
    ///
    /// Power-on is always attempted, even when the snapshot failed, so the
    /// droplet is never left powered off by a failed backup. Failures are
    /// reported in the outcome rather than returned as errors.
    pub async fn backup_droplet(&self, droplet: &Droplet) -> BackupOutcome {
        let pending = self.start_backup(droplet).await;
        self.finish_backup(pending).await
    }

    /// Resolves a droplet by identifier and backs it up.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRunError::List`] when listing droplets fails and
    /// [`BackupRunError::DropletNotFound`] when no droplet has the given
    /// identifier. Backup failures are reported in the outcome.
    pub async fn backup_by_id(
        &self,
        droplet_id: &DropletId,
    ) -> Result<BackupOutcome, BackupRunError<G::Error>> {
        let droplets = self
            .gateway
            .list_droplets(None)
            .await
            .map_err(BackupRunError::List)?;
        let droplet = droplets
            .into_iter()
            .find(|candidate| candidate.id == *droplet_id)
            .ok_or_else(|| BackupRunError::DropletNotFound {
                droplet_id: droplet_id.clone(),
            })?;
        Ok(self.backup_droplet(&droplet).await)
    }

    /// Backs up every droplet carrying `tag`.
    ///
    /// Phase one issues the power-off + snapshot request for every matched
    /// droplet before any wait begins. Phase two waits each action out and
    /// powers its droplet back on, one task per droplet, so total latency
    /// tracks the slowest snapshot rather than the sum. Outcomes preserve
    /// the order droplets were matched in, and none is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BackupRunError::List`] when resolving the tag fails and
    /// [`BackupRunError::WaitTask`] when a wait task is aborted by the
    /// runtime. Per-droplet failures are reported in the outcomes.
    pub async fn backup_all(&self, tag: &str) -> Result<BatchOutcome, BackupRunError<G::Error>> {
        let droplets = self
            .gateway
            .list_droplets(Some(tag))
            .await
            .map_err(BackupRunError::List)?;
        if droplets.is_empty() {
            return Ok(BatchOutcome::NoMatches);
        }

        let mut pendings = Vec::with_capacity(droplets.len());
        for droplet in &droplets {
            pendings.push(self.start_backup(droplet).await);
        }

        let mut tasks = JoinSet::new();
        for (index, pending) in pendings.into_iter().enumerate() {
            let worker = self.clone();
            tasks.spawn(async move { (index, worker.finish_backup(pending).await) });
        }

        let mut indexed = Vec::with_capacity(droplets.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(pair) => indexed.push(pair),
                Err(err) => {
                    return Err(BackupRunError::WaitTask {
                        message: err.to_string(),
                    });
                }
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        Ok(BatchOutcome::Completed(
            indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        ))
    }

    /// Issues the combined power-off + snapshot request for one droplet.
    ///
    /// The timestamp is captured once here so the embedded name reflects
    /// when the request was issued, not when the snapshot completed.
    async fn start_backup(&self, droplet: &Droplet) -> PendingBackup {
        let taken_at = Local::now().naive_local();
        let snapshot_name = name::snapshot_name(&droplet.name, taken_at);
        let action = self
            .gateway
            .create_snapshot(&droplet.id, &snapshot_name, true)
            .await;
        PendingBackup {
            droplet_id: droplet.id.clone(),
            droplet_name: droplet.name.clone(),
            snapshot_name,
            action: action.map_err(|err| err.to_string()),
        }
    }

    /// Waits out the snapshot action and powers the droplet back on.
    async fn finish_backup(&self, pending: PendingBackup) -> BackupOutcome {
        let snapshot_error = match &pending.action {
            Ok(action) => self.wait_for_action(action).await,
            Err(message) => Some(format!("snapshot request rejected: {message}")),
        };

        // Attempted regardless of the snapshot outcome: a failed backup
        // must not leave the droplet powered off.
        let power_on_error = match self.gateway.power_on(&pending.droplet_id).await {
            Ok(true) => None,
            Ok(false) => Some(String::from("power-on request rejected")),
            Err(err) => Some(format!("power-on request failed: {err}")),
        };

        BackupOutcome {
            droplet_id: pending.droplet_id,
            droplet_name: pending.droplet_name,
            snapshot_name: pending.snapshot_name,
            error: fold_errors(snapshot_error, power_on_error),
        }
    }

    /// Polls until the action reaches a terminal state.
    ///
    /// The wait uses a fixed interval and is bounded only by the provider's
    /// own action lifetime; no local timeout applies.
    async fn wait_for_action(&self, action: &ActionHandle) -> Option<String> {
        loop {
            match self.gateway.action_status(action).await {
                Ok(ActionStatus::Completed) => return None,
                Ok(ActionStatus::Errored) => {
                    return Some(format!("snapshot action {} reported failure", action.id));
                }
                Ok(ActionStatus::InProgress) => sleep(self.poll_interval).await,
                Err(err) => {
                    return Some(format!("polling action {} failed: {err}", action.id));
                }
            }
        }
    }
}

fn fold_errors(
    snapshot_error: Option<String>,
    power_on_error: Option<String>,
) -> Option<BackupError> {
    match (snapshot_error, power_on_error) {
        (None, None) => None,
        (Some(message), None) => Some(BackupError::Snapshot { message }),
        (None, Some(message)) => Some(BackupError::PowerOn { message }),
        (Some(snapshot), Some(power_on)) => Some(BackupError::Snapshot {
            message: format!("{snapshot} (power-on also failed: {power_on})"),
        }),
    }
}
