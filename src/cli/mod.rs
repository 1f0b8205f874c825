//! Command-line interface definitions for the `dropsnap` binary.
//!
//! This module centralises the clap parser structures so both the main
//! binary and the build script can reuse them when generating the manual
//! page.

use clap::Parser;

/// Top-level CLI for the `dropsnap` binary.
#[derive(Debug, Parser)]
#[command(
    name = "dropsnap",
    about = "Offline snapshots of DigitalOcean droplets with retention",
    version,
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Store the API token for later runs.
    Init(InitCommand),
    /// List all droplets.
    List,
    /// List all droplet snapshots.
    ListSnapshots,
    /// List droplets carrying the backup tag.
    ListTagged(TagFilterArgs),
    /// List all tags known to the provider.
    ListTags,
    /// Apply the backup tag to a droplet.
    Tag(TagTargetArgs),
    /// Remove the backup tag from a droplet.
    Untag(TagTargetArgs),
    /// Power off, snapshot, and restart one droplet.
    Backup(BackupArgs),
    /// Power off, snapshot, and restart every droplet carrying the backup
    /// tag.
    BackupAll(TagFilterArgs),
    /// List auto-backup snapshots older than the given age.
    ListOlderThan(AgeArgs),
    /// Delete auto-backup snapshots older than the given age.
    PurgeOlderThan(AgeArgs),
}

/// Arguments for the `dropsnap init` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct InitCommand {
    /// Token value; when omitted the token is read from standard input.
    #[arg(long, value_name = "TOKEN", env = "DROPSNAP_INIT_TOKEN")]
    pub(crate) token: Option<String>,
}

/// Tag selection shared by listing and batch subcommands.
#[derive(Debug, Parser)]
pub(crate) struct TagFilterArgs {
    /// Tag selecting droplets; defaults to the configured tag name.
    #[arg(long, value_name = "TAG")]
    pub(crate) tag_name: Option<String>,
}

/// Arguments for the `dropsnap tag` and `dropsnap untag` subcommands.
#[derive(Debug, Parser)]
pub(crate) struct TagTargetArgs {
    /// Droplet identifier to tag or untag.
    #[arg(value_name = "DROPLET_ID")]
    pub(crate) droplet_id: String,
    /// Tag to apply or remove; defaults to the configured tag name.
    #[arg(long, value_name = "TAG")]
    pub(crate) tag_name: Option<String>,
}

/// Arguments for the `dropsnap backup` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct BackupArgs {
    /// Droplet identifier to back up.
    #[arg(value_name = "DROPLET_ID")]
    pub(crate) droplet_id: String,
}

/// Arguments for the retention subcommands.
#[derive(Debug, Parser)]
pub(crate) struct AgeArgs {
    /// Age threshold in days; 0 selects every auto-backup snapshot.
    #[arg(value_name = "DAYS")]
    pub(crate) days: u32,
}
