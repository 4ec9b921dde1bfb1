//! Writer options and configuration file parsing for logroll
//!
//! Options are immutable once built. They can be assembled in code with the
//! builders, or loaded from a config file in one of these formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use chrono::format::{Item, StrftimeItems};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};

/// Size strings such as "512", "64K", "10MB", "1 GiB"
static SIZE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)\s*(\d+)\s*(b|k|kb|kib|m|mb|mib|g|gb|gib)?\s*$").expect("Invalid size regex")
});

/// Parse a human-readable byte size into bytes
pub fn parse_size(input: &str) -> Result<u64> {
    let caps = SIZE_REGEX
        .captures(input)
        .ok_or_else(|| Error::config(format!("Invalid size '{}'", input)))?;

    let value: u64 = caps[1]
        .parse()
        .map_err(|_| Error::config(format!("Invalid size '{}'", input)))?;

    let multiplier = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        None => 1,
        Some(unit) => match unit.as_str() {
            "b" => 1,
            "k" | "kb" | "kib" => 1024,
            "m" | "mb" | "mib" => 1024 * 1024,
            _ => 1024 * 1024 * 1024,
        },
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| Error::config(format!("Size '{}' is too large", input)))
}

/// Check that a strftime pattern only contains items chrono understands
pub fn validate_time_format(pattern: &str) -> Result<()> {
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(Error::InvalidTimeFormat(pattern.to_string()));
    }
    Ok(())
}

/// Check that a base path names a file (not a directory)
pub fn validate_base_path(path: &Path) -> Result<()> {
    let has_name = path
        .file_name()
        .map(|n| !n.to_string_lossy().is_empty())
        .unwrap_or(false);

    if !has_name || path.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR) {
        return Err(Error::InvalidPath(path.to_path_buf()));
    }
    Ok(())
}

/// Rotation policy of a roller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RotationOptions {
    max_size_bytes: u64,
    max_age_days: u64,
    max_backups: usize,
    compress: bool,
    time_format: String,
}

impl RotationOptions {
    pub fn builder() -> RotationOptionsBuilder {
        RotationOptionsBuilder::default()
    }

    /// Maximum active file size before a roll (0 = unlimited)
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Maximum backup age in days (0 = never expire)
    pub fn max_age_days(&self) -> u64 {
        self.max_age_days
    }

    /// Maximum number of backups to keep (0 = unlimited)
    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Whether backups are gzip-compressed
    pub fn compress(&self) -> bool {
        self.compress
    }

    /// strftime suffix appended to the base path for the active file
    pub fn time_format(&self) -> &str {
        &self.time_format
    }
}

/// Builder for [`RotationOptions`]
#[derive(Debug, Clone, Default)]
pub struct RotationOptionsBuilder {
    options: RotationOptions,
}

impl RotationOptionsBuilder {
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.options.max_size_bytes = bytes;
        self
    }

    pub fn max_age(mut self, days: u64) -> Self {
        self.options.max_age_days = days;
        self
    }

    pub fn max_backups(mut self, count: usize) -> Self {
        self.options.max_backups = count;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.options.compress = compress;
        self
    }

    pub fn time_format<S: Into<String>>(mut self, pattern: S) -> Self {
        self.options.time_format = pattern.into();
        self
    }

    pub fn build(self) -> Result<RotationOptions> {
        validate_time_format(&self.options.time_format)?;
        Ok(self.options)
    }
}

/// Buffering and queueing behaviour of the async writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncOptions {
    queue_capacity: usize,
    flush_threshold_bytes: usize,
    flush_interval: Duration,
    drop_on_full: bool,
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            flush_threshold_bytes: DEFAULT_FLUSH_THRESHOLD,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            drop_on_full: false,
        }
    }
}

impl AsyncOptions {
    pub fn builder() -> AsyncOptionsBuilder {
        AsyncOptionsBuilder::default()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn flush_threshold_bytes(&self) -> usize {
        self.flush_threshold_bytes
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Reject writes on a full queue instead of blocking
    pub fn drop_on_full(&self) -> bool {
        self.drop_on_full
    }
}

/// Builder for [`AsyncOptions`]
#[derive(Debug, Clone, Default)]
pub struct AsyncOptionsBuilder {
    options: AsyncOptions,
}

impl AsyncOptionsBuilder {
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.options.queue_capacity = capacity;
        self
    }

    pub fn flush_threshold(mut self, bytes: usize) -> Self {
        self.options.flush_threshold_bytes = bytes;
        self
    }

    pub fn flush_interval_ms(mut self, ms: u64) -> Self {
        self.options.flush_interval = Duration::from_millis(ms);
        self
    }

    pub fn drop_on_full(mut self, drop: bool) -> Self {
        self.options.drop_on_full = drop;
        self
    }

    pub fn build(self) -> Result<AsyncOptions> {
        if self.options.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be greater than zero"));
        }
        if self.options.flush_threshold_bytes == 0 {
            return Err(Error::config("flush_threshold must be greater than zero"));
        }
        if self.options.flush_interval.is_zero() {
            return Err(Error::config("flush_interval_ms must be greater than zero"));
        }
        Ok(self.options)
    }
}

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// A byte size written either as a number or as a string like "10MB"
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Bytes(u64),
    Text(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<SizeValue> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(SizeValue::Bytes(n)) => Ok(Some(n)),
        Some(SizeValue::Text(s)) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// `[rotation]` section of a config file
#[derive(Debug, Deserialize, Default)]
pub struct RotationConfig {
    #[serde(default, deserialize_with = "deserialize_size")]
    pub max_size: Option<u64>,
    pub max_age: Option<u64>,
    pub max_backups: Option<usize>,
    pub compress: Option<bool>,
    pub time_format: Option<String>,
}

impl RotationConfig {
    pub fn into_options(self) -> Result<RotationOptions> {
        let mut builder = RotationOptions::builder()
            .max_size(self.max_size.unwrap_or(0))
            .max_age(self.max_age.unwrap_or(0))
            .max_backups(self.max_backups.unwrap_or(0))
            .compress(self.compress.unwrap_or(false));
        if let Some(pattern) = self.time_format {
            builder = builder.time_format(pattern);
        }
        builder.build()
    }
}

/// `[writer]` section of a config file
#[derive(Debug, Deserialize, Default)]
pub struct WriterConfig {
    pub queue_capacity: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub flush_threshold: Option<u64>,
    pub flush_interval_ms: Option<u64>,
    pub drop_on_full: Option<bool>,
}

impl WriterConfig {
    pub fn into_options(self) -> Result<AsyncOptions> {
        let mut builder = AsyncOptions::builder();
        if let Some(capacity) = self.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }
        if let Some(threshold) = self.flush_threshold {
            let threshold = usize::try_from(threshold)
                .map_err(|_| Error::config("flush_threshold is too large"))?;
            builder = builder.flush_threshold(threshold);
        }
        if let Some(ms) = self.flush_interval_ms {
            builder = builder.flush_interval_ms(ms);
        }
        if let Some(drop) = self.drop_on_full {
            builder = builder.drop_on_full(drop);
        }
        builder.build()
    }
}

/// Configuration file structure (logroll.toml/yaml/json)
#[derive(Debug, Deserialize, Default)]
pub struct LogrollConfig {
    /// Base path of the active log file
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub rotation: RotationConfig,
    #[serde(default)]
    pub writer: WriterConfig,
}

impl LogrollConfig {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Find and load a config file from a directory, if one exists
    pub fn find(dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok(Some((config, path)));
            }
        }
        Ok(None)
    }
}
