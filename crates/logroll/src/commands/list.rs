//! List command

use anyhow::{Context, Result};
use logroll_writer::{list_backups, OsFileSystem};
use std::path::Path;

use crate::output;
use crate::settings::Settings;

pub fn execute(config: Option<&Path>, path: Option<&Path>) -> Result<()> {
    let settings = Settings::for_list(config, path)?;
    let backups = list_backups(&OsFileSystem, &settings.path)
        .with_context(|| format!("Failed to list backups of {}", settings.path.display()))?;

    output::print_backups(&backups);
    Ok(())
}
