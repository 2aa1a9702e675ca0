//! Operator maintenance commands (`admitdesk-maint`).
//!
//! Every command loads the same configuration as the server and works on
//! the configured storage backend directly. Reports are printed to stdout
//! as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{RecalculateResponse, Subject};
use crate::service::{
    ImportOptions, MaintenanceService, RemoteClient, ResultService, SyncTarget, Syncer,
    import_sheet,
};
use crate::storage::create_storage;

/// Maintenance tool for admitdesk data.
#[derive(Debug, Parser)]
#[command(name = "admitdesk-maint", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Maintenance commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Re-rank results by marks.
    FixRanks {
        /// Only rank published results.
        #[arg(long)]
        published_only: bool,
    },

    /// Remove published results that share a base roll number.
    DedupeResults,

    /// Delete every result whose roll number starts with a prefix.
    PurgePrefix {
        #[arg(long, default_value = "GK")]
        prefix: String,
    },

    /// Raise roll counters to the highest issued roll numbers.
    ReseedCounters,

    /// Compare stored ranks of the best results with their marks.
    VerifyRanks {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Publish every stored result.
    PublishAll,

    /// Import a plain-text result sheet.
    ImportResults {
        /// Sheet to read.
        #[arg(long)]
        file: PathBuf,

        /// Roll-number prefix; defaults to the canonical result prefix.
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long, default_value = "Computer")]
        subject: Subject,

        /// Exam date, `YYYY-MM-DD`.
        #[arg(long)]
        exam_date: NaiveDate,
    },

    /// Replace local data with another instance's records.
    SyncFrom {
        /// Base URL of the source instance.
        #[arg(long, env = "ADMITDESK_SYNC_SOURCE")]
        source: String,

        /// Sync a single collection.
        #[arg(long, value_enum)]
        only: Option<SyncTarget>,

        /// Directory the local backup is written to.
        #[arg(long, default_value = "backups")]
        backup_dir: PathBuf,
    },

    /// Push published results to another instance and publish them there.
    PushResults {
        /// Base URL of the target instance.
        #[arg(long, env = "ADMITDESK_PUSH_TARGET")]
        target: String,
    },
}

/// Load configuration and storage, then run one command.
///
/// # Errors
///
/// Returns an error if configuration or storage cannot be initialized or the
/// command fails.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    crate::init_logging(&config);

    let storage = create_storage(&config.storage).await?;
    let results = Arc::new(ResultService::new(storage.clone(), config.results.clone()));
    let maintenance = Arc::new(MaintenanceService::new(
        storage.clone(),
        results.clone(),
        config.allocation.clone(),
    ));

    info!(command = ?cli.command, "Running maintenance command");
    match cli.command {
        Command::FixRanks { published_only } => {
            let report: RecalculateResponse = results.recalculate_ranks(published_only).await?;
            print_report(&report)
        }
        Command::DedupeResults => print_report(&maintenance.dedupe().await?),
        Command::PurgePrefix { prefix } => {
            let deleted = maintenance.purge_prefix(&prefix).await?;
            print_report(&serde_json::json!({ "prefix": prefix, "deleted": deleted }))
        }
        Command::ReseedCounters => print_report(&maintenance.reseed_counters().await?),
        Command::VerifyRanks { top } => print_report(&maintenance.verify_ranks(top).await?),
        Command::PublishAll => {
            let published = results.publish_all().await?;
            print_report(&serde_json::json!({ "modifiedCount": published }))
        }
        Command::ImportResults {
            file,
            prefix,
            subject,
            exam_date,
        } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let options = ImportOptions {
                prefix: prefix.unwrap_or_else(|| config.results.canonical_prefix.clone()),
                subject,
                exam_date,
            };
            print_report(&import_sheet(&results, &text, &options).await?)
        }
        Command::SyncFrom {
            source,
            only,
            backup_dir,
        } => {
            let remote = RemoteClient::new(&source)?;
            let syncer = Syncer::new(storage, results, maintenance);
            print_report(&syncer.sync_from(&remote, only, &backup_dir).await?)
        }
        Command::PushResults { target } => {
            let remote = RemoteClient::new(&target)?;
            let syncer = Syncer::new(storage, results, maintenance);
            print_report(&syncer.push_results(&remote).await?)
        }
    }
}

fn print_report<T: Serialize>(report: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
