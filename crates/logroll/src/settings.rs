//! Merge the config file with command-line overrides

use anyhow::{bail, Context, Result};
use logroll_core::{AsyncOptions, LogrollConfig, RotationConfig, RotationOptions, WriterConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::cli::{RotationArgs, WriteArgs};

/// Effective settings for one command
#[derive(Debug)]
pub struct Settings {
    pub path: PathBuf,
    pub rotation: RotationOptions,
    pub writer: AsyncOptions,
}

impl Settings {
    pub fn for_write(config: Option<&Path>, args: &WriteArgs) -> Result<Self> {
        let mut file = load_config(config)?;
        apply_rotation(&mut file.rotation, &args.rotation);
        apply_writer(&mut file.writer, args);
        Self::build(file, args.path.as_deref())
    }

    pub fn for_prune(config: Option<&Path>, path: Option<&Path>, rotation: &RotationArgs) -> Result<Self> {
        let mut file = load_config(config)?;
        apply_rotation(&mut file.rotation, rotation);
        Self::build(file, path)
    }

    pub fn for_list(config: Option<&Path>, path: Option<&Path>) -> Result<Self> {
        Self::build(load_config(config)?, path)
    }

    fn build(file: LogrollConfig, path: Option<&Path>) -> Result<Self> {
        let path = match (path, file.path) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(p)) => p,
            (None, None) => bail!("No log path given (pass one or set `path` in the config file)"),
        };

        Ok(Self {
            path,
            rotation: file.rotation.into_options()?,
            writer: file.writer.into_options()?,
        })
    }
}

fn load_config(explicit: Option<&Path>) -> Result<LogrollConfig> {
    if let Some(path) = explicit {
        let config = LogrollConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        return Ok(config);
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    match LogrollConfig::find(&cwd)? {
        Some((config, path)) => {
            debug!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(LogrollConfig::default()),
    }
}

fn apply_rotation(config: &mut RotationConfig, args: &RotationArgs) {
    if args.max_size.is_some() {
        config.max_size = args.max_size;
    }
    if args.max_age.is_some() {
        config.max_age = args.max_age;
    }
    if args.max_backups.is_some() {
        config.max_backups = args.max_backups;
    }
    if args.compress {
        config.compress = Some(true);
    }
    if let Some(pattern) = &args.time_format {
        config.time_format = Some(pattern.clone());
    }
}

fn apply_writer(config: &mut WriterConfig, args: &WriteArgs) {
    if args.queue_capacity.is_some() {
        config.queue_capacity = args.queue_capacity;
    }
    if args.flush_threshold.is_some() {
        config.flush_threshold = args.flush_threshold;
    }
    if args.flush_interval_ms.is_some() {
        config.flush_interval_ms = args.flush_interval_ms;
    }
    if args.drop_on_full {
        config.drop_on_full = Some(true);
    }
}
