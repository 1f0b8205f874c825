//! Core library for the dropsnap droplet backup tool.
//!
//! The crate exposes a provider gateway abstraction for droplet and
//! snapshot operations and a DigitalOcean implementation that powers the
//! backup lifecycle (power off → snapshot → wait → power on) together
//! with retention scanning and purging of aged auto-backup snapshots.

pub mod backup;
pub mod config;
pub mod digitalocean;
pub mod gateway;
pub mod retention;
pub mod test_support;
pub mod token_store;

pub use backup::name::{BACKUP_MARKER, TIMESTAMP_FORMAT, parse_backup_timestamp, snapshot_name};
pub use backup::{BackupError, BackupOrchestrator, BackupOutcome, BackupRunError, BatchOutcome};
pub use config::{ConfigError, DropsnapConfig};
pub use digitalocean::{DoGateway, DoGatewayError};
pub use gateway::{
    ActionHandle, ActionId, ActionStatus, Droplet, DropletId, GatewayFuture, ProviderGateway,
    Snapshot, SnapshotId, Tag,
};
pub use retention::{
    PurgeOutcome, PurgeReport, Purger, RetentionError, RetentionScan, RetentionScanner,
    SkippedSnapshot, partition_snapshots,
};
pub use token_store::{TokenSource, TokenStore, TokenStoreError};
