//! Mock implementations for testing

use chrono::{DateTime, Duration, Utc};
use crossbeam_channel::{Receiver, Sender};
use logroll_core::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::clock::Clock;
use crate::fs::{FileStat, FileSystem};
use crate::sink::Sink;

type Contents = Arc<Mutex<Vec<u8>>>;

/// In-memory file system with switchable faults.
/// Cloning creates a new handle to the same underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    files: Arc<Mutex<HashMap<PathBuf, Contents>>>,
    dirs: Arc<Mutex<HashSet<PathBuf>>>,
    fail_mkdir: Arc<AtomicBool>,
    fail_open: Arc<AtomicBool>,
    fail_rename: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    fail_flush: Arc<AtomicBool>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file directly (for test setup)
    pub fn add_file(&self, path: &Path, data: &[u8]) {
        self.files
            .lock()
            .insert(path.to_path_buf(), Arc::new(Mutex::new(data.to_vec())));
    }

    /// Contents of a file, if it exists
    pub fn read(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.lock().get(path).map(|c| c.lock().clone())
    }

    /// Sorted names of the files directly inside `dir`
    pub fn file_names(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .lock()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }

    pub fn has_dir(&self, dir: &Path) -> bool {
        self.dirs.lock().contains(dir)
    }

    pub fn fail_mkdir(&self, fail: bool) {
        self.fail_mkdir.store(fail, Ordering::SeqCst);
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rename(&self, fail: bool) {
        self.fail_rename.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }

    fn injected(what: &str) -> io::Error {
        io::Error::new(io::ErrorKind::Other, format!("injected {} failure", what))
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )
    }

    fn handle(&self, contents: Contents) -> Box<dyn Write + Send> {
        Box::new(MemoryFile {
            contents,
            fail: self.fail_writes.clone(),
            fail_flush: self.fail_flush.clone(),
        })
    }
}

struct MemoryFile {
    contents: Contents,
    fail: Arc<AtomicBool>,
    fail_flush: Arc<AtomicBool>,
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MemoryFs::injected("write"));
        }
        self.contents.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(MemoryFs::injected("flush"));
        }
        Ok(())
    }
}

impl FileSystem for MemoryFs {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.fail_mkdir.load(Ordering::SeqCst) {
            return Err(Self::injected("mkdir"));
        }
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    fn open_append(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Self::injected("open"));
        }
        let contents = self
            .files
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        Ok(self.handle(contents))
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        let data = self.read(path).ok_or_else(|| Self::not_found(path))?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(Self::injected("open"));
        }
        let contents = Contents::default();
        self.files.lock().insert(path.to_path_buf(), contents.clone());
        Ok(self.handle(contents))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_rename.load(Ordering::SeqCst) {
            return Err(Self::injected("rename"));
        }
        let mut files = self.files.lock();
        let contents = files.remove(from).ok_or_else(|| Self::not_found(from))?;
        files.insert(to.to_path_buf(), contents);
        Ok(())
    }

    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let files = self.files.lock();
        let contents = files.get(path).ok_or_else(|| Self::not_found(path))?;
        let len = contents.lock().len() as u64;
        Ok(FileStat { len })
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn read_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .files
            .lock()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .cloned()
            .collect())
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Sink that records every write call
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    data: Arc<Mutex<Vec<u8>>>,
    writes: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    close_delay: Option<std::time::Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose writes always fail
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail.store(true, Ordering::SeqCst);
        sink
    }

    /// A sink whose close sleeps before returning
    pub fn slow_close(delay: std::time::Duration) -> Self {
        Self {
            close_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn data(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    /// Number of write calls that reached the sink
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Sink for RecordingSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::IoError(MemoryFs::injected("sink write")));
        }
        self.data.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(delay) = self.close_delay {
            std::thread::sleep(delay);
        }
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink whose writes block until the test opens the gate.
///
/// Each write announces itself on `entered` before waiting, so a test can
/// tell when the flush worker is parked inside the sink. Dropping the gate
/// sender releases every pending and future write.
pub struct GatedSink {
    inner: RecordingSink,
    entered: Sender<()>,
    gate: Receiver<()>,
}

impl GatedSink {
    /// Returns the sink, a receiver of write announcements and the gate sender
    pub fn new(inner: RecordingSink) -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let sink = Self {
            inner,
            entered: entered_tx,
            gate: gate_rx,
        };
        (sink, entered_rx, gate_tx)
    }
}

impl Sink for GatedSink {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let _ = self.entered.send(());
        let _ = self.gate.recv();
        self.inner.write(buf)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
