//! Command-line front end for the cvwiz core.
//!
//! # Responsibility
//! - Import an extracted profile JSON file into a profile store.
//! - Inspect and prune the audit log.
//! - Keep stdout machine-readable: every command prints JSON or a single token.

use clap::{Parser, Subcommand};
use cvwiz_core::{
    default_log_level, init_logging, open_db, AuditAction, AuditRecorder, BatchImporter,
    CoreConfig, RequestContext, RetentionPolicy, SqliteAuditRepository,
};
use log::info;
use serde_json::Value;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "cvwiz")]
#[command(about = "Profile store import and audit tooling")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "CVWIZ_LOG_LEVEL")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, env = "CVWIZ_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import an extracted profile JSON file atomically
    Import {
        /// SQLite database file
        #[arg(long, env = "CVWIZ_DB")]
        db: PathBuf,

        /// Owner of the imported records
        #[arg(long)]
        user: String,

        /// Correlation id recorded in the audit entry
        #[arg(long)]
        request_id: Option<String>,

        /// Profile JSON file
        profile: PathBuf,
    },
    /// Audit log queries and retention
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
    /// Print core health and version
    Ping,
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Most recent entries, newest first
    Recent {
        #[arg(long, env = "CVWIZ_DB")]
        db: PathBuf,

        /// Maximum entries (1-500)
        #[arg(long)]
        limit: Option<u32>,

        /// Only these actions, e.g. IMPORT
        #[arg(long = "action")]
        actions: Vec<String>,
    },
    /// Totals per action and entity type
    Stats {
        #[arg(long, env = "CVWIZ_DB")]
        db: PathBuf,
    },
    /// Delete entries older than the retention horizon
    Cleanup {
        #[arg(long, env = "CVWIZ_DB")]
        db: PathBuf,

        /// Horizon in days, clamped to 30-365; defaults to the configured value
        #[arg(long)]
        days: Option<u32>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> CliResult {
    let config = CoreConfig::from_env()?;
    match command {
        Command::Import {
            db,
            user,
            request_id,
            profile,
        } => import(&config, db, &user, request_id, profile),
        Command::Audit { command } => audit(&config, command),
        Command::Ping => {
            println!("cvwiz_core ping={}", cvwiz_core::ping());
            println!("cvwiz_core version={}", cvwiz_core::core_version());
            Ok(())
        }
    }
}

fn import(
    config: &CoreConfig,
    db: PathBuf,
    user: &str,
    request_id: Option<String>,
    profile: PathBuf,
) -> CliResult {
    let text = std::fs::read_to_string(&profile)
        .map_err(|err| format!("cannot read `{}`: {err}", profile.display()))?;
    let value: Value = serde_json::from_str(&text)?;

    let mut ctx = RequestContext::system().with_actor(user);
    if let Some(request_id) = request_id {
        ctx.request_id = request_id;
    }

    let mut conn = open_db(db)?;
    let result = BatchImporter::from_config(config).import_value(&mut conn, user, &value, &ctx)?;
    info!(
        "event=cli_import module=cli status=ok request_id={} skills={} dropped={}",
        ctx.request_id, result.counts.skills, result.counts.dropped
    );
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn audit(config: &CoreConfig, command: AuditCommand) -> CliResult {
    match command {
        AuditCommand::Recent { db, limit, actions } => {
            let actions = actions
                .iter()
                .map(|raw| {
                    AuditAction::parse(raw).ok_or_else(|| format!("unknown audit action `{raw}`"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let conn = open_db(db)?;
            let recorder = AuditRecorder::new(SqliteAuditRepository::new(&conn));
            let entries = recorder.recent(limit, &actions)?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        AuditCommand::Stats { db } => {
            let conn = open_db(db)?;
            let recorder = AuditRecorder::new(SqliteAuditRepository::new(&conn));
            println!("{}", serde_json::to_string_pretty(&recorder.stats()?)?);
        }
        AuditCommand::Cleanup { db, days } => {
            let policy = RetentionPolicy::new(days.unwrap_or(config.audit_retention_days));
            let conn = open_db(db)?;
            let recorder = AuditRecorder::new(SqliteAuditRepository::new(&conn));
            let report = policy.run_if_due(&recorder, None, cvwiz_core::model::now_epoch_ms())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
