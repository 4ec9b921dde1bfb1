//! File roller: owns the active log file and decides when to roll it

use chrono::{DateTime, Utc};
use logroll_core::{validate_base_path, Error, Result, RotationOptions};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::fs::{FileSystem, OsFileSystem};
use crate::housekeeping::{free_backup_path, Housekeeper, Job};
use crate::sink::Sink;

struct ActiveFile {
    path: PathBuf,
    file: Box<dyn Write + Send>,
    size: u64,
}

/// Appends to a single active file, rolling it on size or time.
///
/// The active file is `base` followed by the expansion of the time format.
/// Rolled files are renamed to `<base>-bk-<timestamp>` and pruned or
/// compressed on a background housekeeping thread.
///
/// Not synchronized: wrap it in an [`crate::AsyncWriter`] to share it.
pub struct Roller {
    base: PathBuf,
    options: RotationOptions,
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    active: Option<ActiveFile>,
    housekeeper: Option<Housekeeper>,
    /// Time encoded in the newest backup name this roller picked
    last_backup: Option<DateTime<Utc>>,
    closed: bool,
}

impl Roller {
    /// Create a roller writing to the real file system.
    /// The first file is opened on the first write.
    pub fn new(base: impl Into<PathBuf>, options: RotationOptions) -> Result<Self> {
        let base = base.into();
        validate_base_path(&base)?;

        Ok(Self {
            base,
            options,
            fs: Arc::new(OsFileSystem),
            clock: Arc::new(SystemClock),
            active: None,
            housekeeper: None,
            last_backup: None,
            closed: false,
        })
    }

    /// Use a different file system implementation
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    /// Use a different time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append `buf` to the active file, rolling first when due.
    ///
    /// A crossed time boundary is checked first. The size limit is then
    /// checked against whichever file is active, so a fresh file never rolls
    /// again and an oversized record lands whole in it.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }

        let now = self.clock.now();
        if self.active.is_none() || self.crossed_time_boundary(now) {
            self.roll_at(now)?;
        }
        if self.exceeds_size(buf.len() as u64) {
            self.roll_at(now)?;
        }

        let active = match self.active.as_mut() {
            Some(active) => active,
            None => return Err(Error::Closed),
        };
        active.file.write_all(buf)?;
        active.size += buf.len() as u64;

        Ok(buf.len())
    }

    /// Close the active file (if any) and open a new one
    pub fn roll(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        let now = self.clock.now();
        self.roll_at(now)
    }

    /// Flush and close the active file, then wait for housekeeping to finish.
    /// Calling it again does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut errors = Vec::new();
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.file.flush() {
                errors.push(e.into());
            }
        }
        if let Some(mut housekeeper) = self.housekeeper.take() {
            housekeeper.shutdown();
        }

        Error::aggregate(errors)
    }

    /// Path of the open file, if one is open
    pub fn active_path(&self) -> Option<&Path> {
        self.active.as_ref().map(|a| a.path.as_path())
    }

    /// Size of the open file in bytes
    pub fn current_size(&self) -> u64 {
        self.active.as_ref().map(|a| a.size).unwrap_or(0)
    }

    /// Base path the active and backup names derive from
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Active file path for the time bucket containing `now`
    fn path_at(&self, now: DateTime<Utc>) -> PathBuf {
        let pattern = self.options.time_format();
        if pattern.is_empty() {
            return self.base.clone();
        }
        let mut name = OsString::from(self.base.as_os_str());
        name.push(now.format(pattern).to_string());
        PathBuf::from(name)
    }

    fn crossed_time_boundary(&self, now: DateTime<Utc>) -> bool {
        if self.options.time_format().is_empty() {
            return false;
        }
        match &self.active {
            Some(active) => active.path != self.path_at(now),
            None => false,
        }
    }

    fn exceeds_size(&self, incoming: u64) -> bool {
        let limit = self.options.max_size_bytes();
        match &self.active {
            Some(active) if limit > 0 && active.size > 0 => {
                active.size.saturating_add(incoming) > limit
            }
            _ => false,
        }
    }

    fn roll_at(&mut self, now: DateTime<Utc>) -> Result<()> {
        let next = self.path_at(now);
        let mut flushed = Ok(());

        if let Some(mut old) = self.active.take() {
            if let Err(e) = old.file.flush() {
                warn!("Failed to flush {} before rolling: {}", old.path.display(), e);
                flushed = Err(Error::IoError(e));
            }
            drop(old.file);
            debug!(
                "Rolling log file: {} ({} bytes)",
                old.path.display(),
                old.size
            );

            let backup = self.next_backup_path(now);
            if old.path == next {
                // Reopening the same path: the backup must exist before the
                // new file does.
                match self.fs.rename(&old.path, &backup) {
                    Ok(()) => self.submit(Job::Retain)?,
                    Err(e) => warn!("Failed to archive {}: {}", old.path.display(), e),
                }
            } else {
                self.submit(Job::Archive {
                    path: old.path,
                    backup,
                })?;
            }
        }

        self.open(next)?;
        flushed
    }

    /// Backup names strictly increase in roll order, whichever thread
    /// performs the rename.
    fn next_backup_path(&mut self, now: DateTime<Utc>) -> PathBuf {
        let at = match self.last_backup {
            Some(last) if now <= last => last + chrono::Duration::nanoseconds(1),
            _ => now,
        };
        let (backup, at) = free_backup_path(self.fs.as_ref(), &self.base, at);
        self.last_backup = Some(at);
        backup
    }

    fn open(&mut self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                self.fs.create_dir_all(parent)?;
            }
        }

        let file = self.fs.open_append(&path)?;
        let size = self.fs.stat(&path)?.len;

        self.active = Some(ActiveFile { path, file, size });
        Ok(())
    }

    fn submit(&mut self, job: Job) -> Result<()> {
        if self.housekeeper.is_none() {
            self.housekeeper = Some(Housekeeper::spawn(
                self.fs.clone(),
                self.clock.clone(),
                self.base.clone(),
                self.options.clone(),
            )?);
        }
        if let Some(housekeeper) = &self.housekeeper {
            housekeeper.submit(job);
        }
        Ok(())
    }
}

impl Sink for Roller {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Roller::write(self, buf)
    }

    fn close(&mut self) -> Result<()> {
        Roller::close(self)
    }
}

impl Drop for Roller {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close {}: {}", self.base.display(), e);
        }
    }
}
