//! Prune command

use anyhow::{bail, Result};
use chrono::Utc;
use logroll_writer::{run_retention, OsFileSystem};
use std::path::Path;

use crate::cli::PruneArgs;
use crate::output;
use crate::settings::Settings;

pub fn execute(config: Option<&Path>, args: PruneArgs) -> Result<()> {
    let settings = Settings::for_prune(config, args.path.as_deref(), &args.rotation)?;
    let report = run_retention(&OsFileSystem, &settings.path, &settings.rotation, Utc::now());

    output::print_prune_report(&report);

    if !report.errors.is_empty() {
        bail!("{} retention step(s) failed", report.errors.len());
    }
    Ok(())
}
