//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `timetree_core` linkage.
//! - Resolve one instant end to end and print its node id.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use timetree_core::db::{open_db, open_db_in_memory};
use timetree_core::{InstantRequest, Resolution, TimeTreeService, TimeTreeSettings, TimezoneId};

#[derive(Parser)]
#[command(name = "timetree", version, allow_negative_numbers = true)]
#[command(about = "Find or create the time tree instant for an epoch timestamp", long_about = None)]
struct Cli {
    /// Milliseconds since the Unix epoch.
    epoch_millis: i64,

    /// Tree level to resolve (year .. millisecond). Defaults to
    /// TIMETREE_DEFAULT_RESOLUTION, then day.
    #[arg(long, short)]
    resolution: Option<Resolution>,

    /// IANA timezone name. Defaults to TIMETREE_DEFAULT_TIMEZONE, then UTC.
    #[arg(long, short)]
    timezone: Option<TimezoneId>,

    /// SQLite database file; in-memory when omitted.
    #[arg(long, env = "TIMETREE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when omitted.
    #[arg(long, env = "TIMETREE_LOG_DIR")]
    log_dir: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = TimeTreeSettings::from_env().context("invalid TIMETREE_* settings")?;
    if let Some(log_dir) = &cli.log_dir {
        timetree_core::init_logging(&settings.log_level, log_dir).map_err(anyhow::Error::msg)?;
    }

    let conn = match &cli.db_path {
        Some(path) => {
            open_db(path).with_context(|| format!("failed to open {}", path.display()))?
        }
        None => open_db_in_memory().context("failed to open in-memory database")?,
    };

    let mut request = InstantRequest::new(cli.epoch_millis);
    request.spec.resolution = cli.resolution;
    request.spec.timezone = cli.timezone;

    let service = TimeTreeService::new(&conn, settings);
    let node = service.get_or_create_instant(&request)?;
    info!(
        "event=cli_instant module=cli status=ok node={node} version={}",
        timetree_core::core_version()
    );
    println!("{node}");
    Ok(())
}
