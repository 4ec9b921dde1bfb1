//! File system capability used by the roller and housekeeping
//!
//! Every file operation goes through [`FileSystem`] so tests can swap in an
//! in-memory or faulting implementation.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Metadata the roller needs about a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub len: u64,
}

/// File system operations
pub trait FileSystem: Send + Sync {
    /// Create a directory and its parents. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Open a file for appending, creating it if missing
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// Open a file for reading
    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Create (or truncate) a file for writing
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn stat(&self, path: &Path) -> io::Result<FileStat>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// List the regular files directly inside a directory
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// The real operating system file system
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        match fs::create_dir_all(path) {
            // Another roller may have created it between the check and the mkdir
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
            other => other,
        }
    }

    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Box::new(file))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(fs::File::open(path)?))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(fs::File::create(path)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let meta = fs::metadata(path)?;
        Ok(FileStat { len: meta.len() })
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn read_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}
