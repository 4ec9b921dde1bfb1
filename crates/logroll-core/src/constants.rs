//! Constants and default values for logroll

/// Marker between the base path and the roll timestamp of a backup
pub const BACKUP_MARKER: &str = "-bk-";

/// chrono format of the roll timestamp in backup names
pub const BACKUP_TIME_FORMAT: &str = "%Y%m%d-%H%M%S%.9f";

/// Suffix carried by compressed backups
pub const COMPRESS_SUFFIX: &str = ".gz";

/// Default write queue capacity (entries)
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default flush threshold (32KB)
pub const DEFAULT_FLUSH_THRESHOLD: usize = 32 * 1024;

/// Default periodic flush interval in milliseconds
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 200;

/// Config file names searched for when none is given (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "logroll.toml",
    "logroll.yaml",
    "logroll.yml",
    "logroll.json",
];

/// Thread name of the background flush worker
pub const FLUSH_THREAD_NAME: &str = "logroll-flush";

/// Thread name of the housekeeping worker
pub const HOUSEKEEPING_THREAD_NAME: &str = "logroll-housekeeping";
