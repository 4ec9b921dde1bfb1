//! Backup naming and retention filters
//!
//! The filters are pure: they classify a listing of backups and never touch
//! the file system. Listings are expected newest first, which is the order
//! [`list_backups`] returns.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use logroll_core::{RotationOptions, BACKUP_MARKER, BACKUP_TIME_FORMAT, COMPRESS_SUFFIX};
use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

/// A rotated log file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileInfo {
    pub path: PathBuf,
    pub name: String,
    /// Roll time encoded in the backup name
    pub timestamp: DateTime<Utc>,
    pub is_compressed: bool,
}

impl LogFileInfo {
    /// Name without the compression suffix, shared by a backup and its `.gz`
    pub fn logical_name(&self) -> &str {
        self.name.strip_suffix(COMPRESS_SUFFIX).unwrap_or(&self.name)
    }
}

/// What a retention pass should do
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionPlan {
    pub remove: Vec<LogFileInfo>,
    pub compress: Vec<LogFileInfo>,
}

/// Backup path for a file rolled at `at`: `<base>-bk-YYYYMMDD-HHMMSS.fffffffff`
pub fn backup_path(base: &Path, at: DateTime<Utc>) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(BACKUP_MARKER);
    name.push(at.format(BACKUP_TIME_FORMAT).to_string());
    PathBuf::from(name)
}

/// Decode a backup file name belonging to `base_name`.
/// Returns the roll time and whether the file is compressed.
pub fn parse_backup_name(base_name: &str, file_name: &str) -> Option<(DateTime<Utc>, bool)> {
    let stamp = file_name.strip_prefix(base_name)?.strip_prefix(BACKUP_MARKER)?;
    let (stamp, compressed) = match stamp.strip_suffix(COMPRESS_SUFFIX) {
        Some(s) => (s, true),
        None => (stamp, false),
    };

    let naive = NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%S%.f").ok()?;
    Some((Utc.from_utc_datetime(&naive), compressed))
}

/// Scan the directory of `base` for its backups, newest first
pub fn list_backups(fs: &dyn FileSystem, base: &Path) -> io::Result<Vec<LogFileInfo>> {
    let base_name = match base.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => return Ok(vec![]),
    };
    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let entries = match fs.read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(e),
    };

    let mut backups: Vec<LogFileInfo> = entries
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_string_lossy().into_owned();
            let (timestamp, is_compressed) = parse_backup_name(&base_name, &name)?;
            Some(LogFileInfo {
                path,
                name,
                timestamp,
                is_compressed,
            })
        })
        .collect();

    backups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.name.cmp(&a.name)));
    Ok(backups)
}

/// Keep at most `max_backups` logical backups.
///
/// A backup and its compressed copy count once. After the limit is exceeded
/// every later file is removed, whether or not its logical name was seen.
pub fn filter_by_max_backups(
    files: Vec<LogFileInfo>,
    max_backups: usize,
) -> (Vec<LogFileInfo>, Vec<LogFileInfo>) {
    if max_backups == 0 || files.len() <= max_backups {
        return (files, vec![]);
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut exceeded = false;
    let mut remaining = Vec::new();
    let mut remove = Vec::new();

    for file in files {
        if !exceeded {
            seen.insert(file.logical_name().to_string());
            exceeded = seen.len() > max_backups;
        }
        if exceeded {
            remove.push(file);
        } else {
            remaining.push(file);
        }
    }

    (remaining, remove)
}

/// Remove backups rolled strictly before `now - max_age_days`
pub fn filter_by_max_age(
    files: Vec<LogFileInfo>,
    max_age_days: u64,
    now: DateTime<Utc>,
) -> (Vec<LogFileInfo>, Vec<LogFileInfo>) {
    if max_age_days == 0 {
        return (files, vec![]);
    }

    let days = i64::try_from(max_age_days).unwrap_or(i64::MAX);
    let cutoff = Duration::try_days(days)
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    files.into_iter().partition(|f| f.timestamp >= cutoff)
}

/// Backups still waiting to be compressed
pub fn filter_by_compress_ext(files: &[LogFileInfo], compress: bool) -> Vec<LogFileInfo> {
    if !compress {
        return vec![];
    }
    files.iter().filter(|f| !f.is_compressed).cloned().collect()
}

/// Combine the filters: a backup is removed if either the count or the age
/// rule evicts it, and whatever survives is considered for compression.
pub fn plan_retention(
    files: Vec<LogFileInfo>,
    options: &RotationOptions,
    now: DateTime<Utc>,
) -> RetentionPlan {
    let (remaining, mut remove) = filter_by_max_backups(files, options.max_backups());
    let (remaining, expired) = filter_by_max_age(remaining, options.max_age_days(), now);
    remove.extend(expired);

    RetentionPlan {
        compress: filter_by_compress_ext(&remaining, options.compress()),
        remove,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
    }

    fn backup(ts: DateTime<Utc>, compressed: bool) -> LogFileInfo {
        let mut name = format!("app.log-bk-{}", ts.format(BACKUP_TIME_FORMAT));
        if compressed {
            name.push_str(COMPRESS_SUFFIX);
        }
        LogFileInfo {
            path: PathBuf::from("/logs").join(&name),
            name,
            timestamp: ts,
            is_compressed: compressed,
        }
    }

    /// Backups one hour apart, newest first
    fn hourly(n: u32) -> Vec<LogFileInfo> {
        (0..n).rev().map(|h| backup(at(10, h), false)).collect()
    }

    #[test]
    fn test_backup_path_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = backup_path(Path::new("/var/log/app.log"), ts);
        assert_eq!(
            path,
            PathBuf::from("/var/log/app.log-bk-20240102-030405.000000000")
        );
    }

    #[test]
    fn test_parse_backup_name() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
            + Duration::nanoseconds(123_456_789);
        let name = format!("app.log-bk-{}", ts.format(BACKUP_TIME_FORMAT));

        assert_eq!(parse_backup_name("app.log", &name), Some((ts, false)));
        assert_eq!(
            parse_backup_name("app.log", &format!("{}.gz", name)),
            Some((ts, true))
        );
        assert_eq!(parse_backup_name("other.log", &name), None);
        assert_eq!(parse_backup_name("app.log", "app.log"), None);
        assert_eq!(parse_backup_name("app.log", "app.log-bk-garbage"), None);
        assert_eq!(parse_backup_name("app.log", "app.log.20240102"), None);
    }

    #[test]
    fn test_logical_name_strips_suffix() {
        let plain = backup(at(1, 0), false);
        let gz = backup(at(1, 0), true);
        assert_eq!(plain.logical_name(), gz.logical_name());
    }

    #[test]
    fn test_max_backups_zero_is_noop() {
        let (remaining, remove) = filter_by_max_backups(hourly(5), 0);
        assert_eq!(remaining.len(), 5);
        assert!(remove.is_empty());
    }

    #[test]
    fn test_max_backups_within_limit() {
        let (remaining, remove) = filter_by_max_backups(hourly(3), 3);
        assert_eq!(remaining.len(), 3);
        assert!(remove.is_empty());
    }

    #[test]
    fn test_max_backups_keeps_newest() {
        let files = hourly(5);
        let (remaining, remove) = filter_by_max_backups(files.clone(), 2);
        assert_eq!(remaining, files[..2].to_vec());
        assert_eq!(remove, files[2..].to_vec());
    }

    #[test]
    fn test_max_backups_counts_compressed_copy_once() {
        let files = vec![
            backup(at(10, 3), false),
            backup(at(10, 2), false),
            backup(at(10, 2), true),
            backup(at(10, 1), true),
        ];
        let (remaining, remove) = filter_by_max_backups(files.clone(), 2);
        assert_eq!(remaining, files[..3].to_vec());
        assert_eq!(remove, files[3..].to_vec());
    }

    #[test]
    fn test_max_backups_removes_everything_after_limit() {
        // A copy of an already-counted backup that sorts after the eviction
        // point is still removed.
        let files = vec![
            backup(at(10, 3), false),
            backup(at(10, 2), false),
            backup(at(10, 3), true),
        ];
        let (remaining, remove) = filter_by_max_backups(files.clone(), 1);
        assert_eq!(remaining, files[..1].to_vec());
        assert_eq!(remove.len(), 2);
    }

    #[test]
    fn test_max_age_zero_is_noop() {
        let (remaining, remove) = filter_by_max_age(hourly(4), 0, at(30, 0));
        assert_eq!(remaining.len(), 4);
        assert!(remove.is_empty());
    }

    #[test]
    fn test_max_age_removes_strictly_older() {
        let now = at(10, 12);
        let cutoff = at(9, 12);
        let files = vec![
            backup(at(10, 6), false),
            backup(cutoff, false),
            backup(cutoff - Duration::seconds(1), false),
            backup(at(8, 0), true),
        ];

        let (remaining, remove) = filter_by_max_age(files.clone(), 1, now);
        assert_eq!(remaining, files[..2].to_vec());
        assert_eq!(remove, files[2..].to_vec());
    }

    #[test]
    fn test_max_age_huge_value_keeps_everything() {
        let (remaining, remove) = filter_by_max_age(hourly(3), u64::MAX, at(10, 12));
        assert_eq!(remaining.len(), 3);
        assert!(remove.is_empty());
    }

    #[test]
    fn test_compress_filter() {
        let files = vec![backup(at(10, 2), false), backup(at(10, 1), true)];
        assert!(filter_by_compress_ext(&files, false).is_empty());
        assert_eq!(filter_by_compress_ext(&files, true), files[..1].to_vec());
    }

    #[test]
    fn test_plan_is_union_of_age_and_count() {
        let options = RotationOptions::builder()
            .max_backups(3)
            .max_age(1)
            .compress(true)
            .build()
            .unwrap();
        let now = at(10, 12);
        let files = vec![
            backup(at(10, 11), false),
            backup(at(10, 10), true),
            // Too old, although within the count
            backup(at(8, 0), false),
            // Over the count
            backup(at(7, 0), false),
        ];

        let plan = plan_retention(files.clone(), &options, now);
        assert_eq!(plan.remove.len(), 2);
        assert!(plan.remove.contains(&files[2]));
        assert!(plan.remove.contains(&files[3]));
        assert_eq!(plan.compress, vec![files[0].clone()]);
    }

    #[test]
    fn test_plan_with_no_limits_does_nothing() {
        let options = RotationOptions::default();
        let plan = plan_retention(hourly(10), &options, at(30, 0));
        assert_eq!(plan, RetentionPlan::default());
    }
}
