//! Binary entry point for the dropsnap CLI.

use std::io::{self, BufRead, Write};
use std::process;

use clap::Parser;
use thiserror::Error;

use dropsnap::{
    BackupOrchestrator, BackupOutcome, BackupRunError, BatchOutcome, ConfigError, DoGateway,
    DoGatewayError, Droplet, DropletId, DropsnapConfig, ProviderGateway, PurgeOutcome, PurgeReport,
    Purger, RetentionError, RetentionScan, RetentionScanner, TokenSource, TokenStore,
    TokenStoreError,
};

mod cli;

use cli::{AgeArgs, BackupArgs, Cli, InitCommand, TagFilterArgs, TagTargetArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("credential error: {0}")]
    Token(#[from] TokenStoreError),
    #[error("provider error: {0}")]
    Gateway(#[from] DoGatewayError),
    #[error("backup error: {0}")]
    Backup(#[from] BackupRunError<DoGatewayError>),
    #[error("retention error: {0}")]
    Retention(#[from] RetentionError<DoGatewayError>),
    #[error("input error: {0}")]
    Input(String),
}

#[tokio::main]
async fn main() {
    let parsed = Cli::parse();
    let exit_code = match dispatch(parsed).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(parsed: Cli) -> Result<i32, CliError> {
    match parsed {
        Cli::Init(args) => init_command(&args),
        Cli::List => list_command().await,
        Cli::ListSnapshots => list_snapshots_command().await,
        Cli::ListTagged(args) => list_tagged_command(args).await,
        Cli::ListTags => list_tags_command().await,
        Cli::Tag(args) => tag_command(args, true).await,
        Cli::Untag(args) => tag_command(args, false).await,
        Cli::Backup(args) => backup_command(args).await,
        Cli::BackupAll(args) => backup_all_command(args).await,
        Cli::ListOlderThan(args) => list_older_than_command(&args).await,
        Cli::PurgeOlderThan(args) => purge_older_than_command(&args).await,
    }
}

/// Ready-to-use provider gateway plus the configured default tag.
struct Context {
    gateway: DoGateway,
    tag_name: String,
}

impl Context {
    /// Loads configuration and the API token, then builds the gateway.
    ///
    /// A missing or unusable token is fatal here; no provider call is
    /// attempted without a credential.
    fn build() -> Result<Self, CliError> {
        let config = DropsnapConfig::load_without_cli_args()?;
        config.validate()?;
        let token = match config.token {
            Some(token) => token,
            None => TokenStore::new().load()?,
        };
        let gateway = DoGateway::new(token)?.with_base_url(config.api_url);
        Ok(Self {
            gateway,
            tag_name: config.tag_name,
        })
    }

    fn resolve_tag(&self, override_tag: Option<String>) -> String {
        override_tag.unwrap_or_else(|| self.tag_name.clone())
    }
}

fn init_command(args: &InitCommand) -> Result<i32, CliError> {
    let token = match &args.token {
        Some(token) => token.clone(),
        None => prompt_for_token()?,
    };
    let path = TokenStore::new().save(&token)?;
    emit(&format!("API token saved to {path}"));
    Ok(0)
}

fn prompt_for_token() -> Result<String, CliError> {
    write!(io::stderr(), "DigitalOcean API token: ").ok();
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| CliError::Input(format!("failed to read token from stdin: {err}")))?;
    Ok(line.trim().to_owned())
}

async fn list_command() -> Result<i32, CliError> {
    let context = Context::build()?;
    let droplets = context.gateway.list_droplets(None).await?;
    if droplets.is_empty() {
        emit("no droplets found");
        return Ok(0);
    }
    for droplet in &droplets {
        emit(&render_droplet(droplet));
    }
    Ok(0)
}

async fn list_snapshots_command() -> Result<i32, CliError> {
    let context = Context::build()?;
    let snapshots = context.gateway.list_snapshots().await?;
    if snapshots.is_empty() {
        emit("no snapshots found");
        return Ok(0);
    }
    for snapshot in &snapshots {
        emit(&format!(
            "{}\t{}\t{}",
            snapshot.id, snapshot.name, snapshot.created_at
        ));
    }
    Ok(0)
}

async fn list_tagged_command(args: TagFilterArgs) -> Result<i32, CliError> {
    let context = Context::build()?;
    let tag = context.resolve_tag(args.tag_name);
    let droplets = context.gateway.list_droplets(Some(&tag)).await?;
    if droplets.is_empty() {
        emit(&format!("no droplets carry tag `{tag}`"));
        return Ok(0);
    }
    for droplet in &droplets {
        emit(&render_droplet(droplet));
    }
    Ok(0)
}

async fn list_tags_command() -> Result<i32, CliError> {
    let context = Context::build()?;
    let tags = context.gateway.list_tags().await?;
    if tags.is_empty() {
        emit("no tags found");
        return Ok(0);
    }
    for tag in &tags {
        emit(&format!("{}\t{} droplet(s)", tag.name, tag.droplet_count));
    }
    Ok(0)
}

async fn tag_command(args: TagTargetArgs, apply: bool) -> Result<i32, CliError> {
    let context = Context::build()?;
    let tag = context.resolve_tag(args.tag_name);
    let droplet_id = DropletId::from(args.droplet_id);
    let targets = [droplet_id.clone()];
    if apply {
        context.gateway.create_tag(&tag).await?;
        context.gateway.tag_droplets(&tag, &targets).await?;
        emit(&format!("tagged droplet {droplet_id} with `{tag}`"));
    } else {
        context.gateway.untag_droplets(&tag, &targets).await?;
        emit(&format!("removed `{tag}` from droplet {droplet_id}"));
    }
    Ok(0)
}

async fn backup_command(args: BackupArgs) -> Result<i32, CliError> {
    let context = Context::build()?;
    let orchestrator = BackupOrchestrator::new(context.gateway);
    let outcome = orchestrator
        .backup_by_id(&DropletId::from(args.droplet_id))
        .await?;
    emit(&render_backup_outcome(&outcome));
    Ok(i32::from(!outcome.succeeded()))
}

async fn backup_all_command(args: TagFilterArgs) -> Result<i32, CliError> {
    let context = Context::build()?;
    let tag = context.resolve_tag(args.tag_name);
    let orchestrator = BackupOrchestrator::new(context.gateway);
    match orchestrator.backup_all(&tag).await? {
        BatchOutcome::NoMatches => {
            emit(&format!("no droplets carry tag `{tag}`; nothing to back up"));
            Ok(0)
        }
        BatchOutcome::Completed(outcomes) => {
            for outcome in &outcomes {
                emit(&render_backup_outcome(outcome));
            }
            Ok(batch_exit_code(&outcomes))
        }
    }
}

async fn list_older_than_command(args: &AgeArgs) -> Result<i32, CliError> {
    let context = Context::build()?;
    let scanner = RetentionScanner::new(context.gateway);
    let scan = scanner.find_expired(args.days).await?;
    warn_skipped(&scan);
    if scan.expired.is_empty() {
        emit(&format!(
            "no auto-backup snapshots older than {} day(s)",
            args.days
        ));
        return Ok(0);
    }
    for snapshot in &scan.expired {
        emit(&format!("{}\t{}", snapshot.id, snapshot.name));
    }
    Ok(0)
}

async fn purge_older_than_command(args: &AgeArgs) -> Result<i32, CliError> {
    let context = Context::build()?;
    let scanner = RetentionScanner::new(context.gateway.clone());
    let scan = scanner.find_expired(args.days).await?;
    warn_skipped(&scan);
    let purger = Purger::new(context.gateway);
    match purger.purge(scan.expired).await {
        PurgeReport::NothingToDelete => {
            emit(&format!(
                "no auto-backup snapshots older than {} day(s); nothing to delete",
                args.days
            ));
            Ok(0)
        }
        PurgeReport::Completed(outcomes) => {
            for outcome in &outcomes {
                emit(&render_purge_outcome(outcome));
            }
            Ok(purge_exit_code(&outcomes))
        }
    }
}

fn render_droplet(droplet: &Droplet) -> String {
    format!(
        "{}\t{}\t{}\t[{}]",
        droplet.id,
        droplet.name,
        droplet.status,
        droplet.tags.join(", ")
    )
}

fn render_backup_outcome(outcome: &BackupOutcome) -> String {
    outcome.error.as_ref().map_or_else(
        || {
            format!(
                "backed up {} ({}) as {}",
                outcome.droplet_name, outcome.droplet_id, outcome.snapshot_name
            )
        },
        |error| {
            format!(
                "backup of {} ({}) failed: {error}",
                outcome.droplet_name, outcome.droplet_id
            )
        },
    )
}

fn render_purge_outcome(outcome: &PurgeOutcome) -> String {
    outcome.error.as_ref().map_or_else(
        || format!("deleted {} ({})", outcome.name, outcome.id),
        |error| format!("failed to delete {} ({}): {error}", outcome.name, outcome.id),
    )
}

fn batch_exit_code(outcomes: &[BackupOutcome]) -> i32 {
    i32::from(!outcomes.iter().all(BackupOutcome::succeeded))
}

fn purge_exit_code(outcomes: &[PurgeOutcome]) -> i32 {
    i32::from(!outcomes.iter().all(PurgeOutcome::succeeded))
}

fn warn_skipped(scan: &RetentionScan) {
    for skipped in &scan.skipped {
        writeln!(
            io::stderr(),
            "warning: skipping {} ({}): marker present but timestamp did not parse",
            skipped.name,
            skipped.id
        )
        .ok();
    }
}

fn emit(line: &str) {
    writeln!(io::stdout(), "{line}").ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropsnap::{BackupError, Droplet, DropletId, SnapshotId};

    fn outcome(error: Option<BackupError>) -> BackupOutcome {
        BackupOutcome {
            droplet_id: DropletId::from("3164444"),
            droplet_name: String::from("web-1"),
            snapshot_name: String::from("web-1--auto-backup--2026-08-26 03:00:00"),
            error,
        }
    }

    #[test]
    fn render_backup_outcome_reports_success() {
        let rendered = render_backup_outcome(&outcome(None));

        assert_eq!(
            rendered,
            "backed up web-1 (3164444) as web-1--auto-backup--2026-08-26 03:00:00"
        );
    }

    #[test]
    fn render_backup_outcome_reports_failure() {
        let rendered = render_backup_outcome(&outcome(Some(BackupError::PowerOn {
            message: String::from("power-on request rejected"),
        })));

        assert_eq!(
            rendered,
            "backup of web-1 (3164444) failed: power-on failed: power-on request rejected"
        );
    }

    #[test]
    fn render_droplet_joins_tags() {
        let droplet = Droplet {
            id: DropletId::from("42"),
            name: String::from("db-1"),
            status: String::from("active"),
            tags: vec![String::from("auto-backup"), String::from("prod")],
        };

        assert_eq!(render_droplet(&droplet), "42\tdb-1\tactive\t[auto-backup, prod]");
    }

    #[test]
    fn batch_exit_code_is_one_when_any_backup_failed() {
        let outcomes = vec![
            outcome(None),
            outcome(Some(BackupError::Snapshot {
                message: String::from("snapshot action a-1 reported failure"),
            })),
        ];

        assert_eq!(batch_exit_code(&outcomes), 1);
    }

    #[test]
    fn batch_exit_code_is_zero_when_all_backups_succeeded() {
        assert_eq!(batch_exit_code(&[outcome(None)]), 0);
    }

    #[test]
    fn purge_exit_code_tracks_failures() {
        let ok = PurgeOutcome {
            id: SnapshotId::from("s-1"),
            name: String::from("web-1--auto-backup--2020-01-01 00:00:00"),
            error: None,
        };
        let failed = PurgeOutcome {
            id: SnapshotId::from("s-2"),
            name: String::from("web-2--auto-backup--2020-01-01 00:00:00"),
            error: Some(String::from("delete request rejected")),
        };

        assert_eq!(purge_exit_code(&[ok.clone()]), 0);
        assert_eq!(purge_exit_code(&[ok, failed]), 1);
    }

    #[test]
    fn write_error_writes_cli_error() {
        let mut buf = Vec::new();
        let err = CliError::Input(String::from("failed to read token from stdin: closed"));
        write_error(&mut buf, &err);

        let rendered = String::from_utf8(buf).expect("utf8");
        assert!(
            rendered.contains("input error: failed to read token from stdin: closed"),
            "rendered: {rendered}"
        );
    }
}
