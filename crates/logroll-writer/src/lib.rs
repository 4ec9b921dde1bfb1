//! logroll writer - rolling log files, retention and async buffering
//!
//! The pieces compose as decorators over [`Sink`]:
//! - [`Roller`] appends to the active file and rolls it on size or time
//! - [`AsyncWriter`] queues writes and hands them to a single flush worker
//! - [`retention`] decides which backups to delete or compress after a roll

mod async_writer;
mod clock;
mod compress;
mod fs;
mod housekeeping;
#[cfg(test)]
pub mod mock;
pub mod retention;
mod roller;
mod sink;

pub use async_writer::{AsyncWriter, DropObserver, WriterState};
pub use clock::{Clock, SystemClock};
pub use compress::compress_file;
pub use fs::{FileStat, FileSystem, OsFileSystem};
pub use housekeeping::{run_retention, RetentionReport};
pub use retention::{list_backups, LogFileInfo};
pub use roller::Roller;
pub use sink::Sink;
