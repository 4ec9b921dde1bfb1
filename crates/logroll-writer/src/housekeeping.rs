//! Post-roll housekeeping: rename, retention and compression
//!
//! Runs on its own thread per roller so a slow compression never stalls the
//! write path. Failures are logged and swallowed; nothing waits on them.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use logroll_core::{Error, Result, RotationOptions, HOUSEKEEPING_THREAD_NAME};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::compress::compress_file;
use crate::fs::FileSystem;
use crate::retention::{backup_path, list_backups, plan_retention};

/// Work handed over by the roller
#[derive(Debug)]
pub(crate) enum Job {
    /// Rename a closed active file to the backup name the roller picked,
    /// then apply retention
    Archive { path: PathBuf, backup: PathBuf },
    /// The backup already exists; apply retention
    Retain,
}

/// Outcome of one retention pass
#[derive(Debug, Default, Clone)]
pub struct RetentionReport {
    pub removed: Vec<PathBuf>,
    pub compressed: Vec<PathBuf>,
    /// Non-fatal failures
    pub errors: Vec<String>,
}

/// Scan the backups of `base`, delete what the policy evicts and compress
/// the rest if enabled.
pub fn run_retention(
    fs: &dyn FileSystem,
    base: &Path,
    options: &RotationOptions,
    now: DateTime<Utc>,
) -> RetentionReport {
    let mut report = RetentionReport::default();

    let backups = match list_backups(fs, base) {
        Ok(backups) => backups,
        Err(e) => {
            report
                .errors
                .push(format!("Failed to list backups of {}: {}", base.display(), e));
            return report;
        }
    };

    let plan = plan_retention(backups, options, now);

    for file in plan.remove {
        match fs.remove(&file.path) {
            Ok(()) => {
                info!(path = %file.path.display(), "Removed expired log backup");
                report.removed.push(file.path);
            }
            Err(e) => report
                .errors
                .push(format!("Failed to remove {}: {}", file.path.display(), e)),
        }
    }

    for file in plan.compress {
        match compress_file(fs, &file.path) {
            Ok(dst) => {
                debug!(path = %dst.display(), "Compressed log backup");
                report.compressed.push(dst);
            }
            Err(e) => report
                .errors
                .push(format!("Failed to compress {}: {}", file.path.display(), e)),
        }
    }

    report
}

/// Pick a backup name at or after `rolled_at` that is not taken on disk.
/// Returns the name and the time it encodes.
pub(crate) fn free_backup_path(
    fs: &dyn FileSystem,
    base: &Path,
    rolled_at: DateTime<Utc>,
) -> (PathBuf, DateTime<Utc>) {
    let mut at = rolled_at;
    loop {
        let candidate = backup_path(base, at);
        if fs.stat(&candidate).is_err() {
            return (candidate, at);
        }
        at += chrono::Duration::nanoseconds(1);
    }
}

/// Everything a housekeeping pass needs, owned by the worker thread
struct Context {
    fs: Arc<dyn FileSystem>,
    clock: Arc<dyn Clock>,
    base: PathBuf,
    options: RotationOptions,
}

impl Context {
    fn handle(&self, job: Job) {
        if let Job::Archive { path, backup } = job {
            if let Err(e) = self.fs.rename(&path, &backup) {
                warn!("Failed to archive {}: {}", path.display(), e);
                return;
            }
            debug!("Archived {} as {}", path.display(), backup.display());
        }

        let report = run_retention(self.fs.as_ref(), &self.base, &self.options, self.clock.now());
        for error in report.errors {
            warn!("{}", error);
        }
    }
}

/// Handle to the housekeeping thread of one roller
pub(crate) struct Housekeeper {
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl Housekeeper {
    pub(crate) fn spawn(
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        base: PathBuf,
        options: RotationOptions,
    ) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let context = Context {
            fs,
            clock,
            base,
            options,
        };

        let handle = std::thread::Builder::new()
            .name(HOUSEKEEPING_THREAD_NAME.to_string())
            .spawn(move || run(context, rx))
            .map_err(Error::IoError)?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn submit(&self, job: Job) {
        let sent = self.tx.as_ref().map(|tx| tx.send(job).is_ok()).unwrap_or(false);
        if !sent {
            warn!("Housekeeping thread is gone, skipping post-roll work");
        }
    }

    /// Let queued jobs finish, then stop the thread
    pub(crate) fn shutdown(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Housekeeping thread panicked");
            }
        }
    }
}

impl Drop for Housekeeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(context: Context, rx: Receiver<Job>) {
    for job in rx {
        context.handle(job);
    }
}
