//! Async buffering writer
//!
//! Producers enqueue copies of their buffers on a bounded queue. A single
//! flush worker thread owns the wrapped sink, batches entries into a pending
//! buffer and writes them through on size, on a timer, or on request.

use crossbeam_channel::{bounded, select, tick, Receiver, Sender, TrySendError};
use logroll_core::{AsyncOptions, Error, Result, FLUSH_THREAD_NAME};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

use crate::sink::Sink;

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const CLOSED: u8 = 2;

/// Lifecycle of an [`AsyncWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting writes
    Running,
    /// Close requested; the final flush is in progress
    Draining,
    /// Terminal
    Closed,
}

/// Notified every time a write is dropped because the queue is full
pub trait DropObserver: Send + Sync {
    /// `total` is the number of writes dropped so far, this one included
    fn on_drop(&self, total: u64);
}

/// Control messages; each carries a private reply channel
enum Control {
    Sync(Sender<Result<()>>),
    Close(Sender<Result<()>>),
}

/// Queueing front end for any [`Sink`].
///
/// After [`close`](Self::close), `write` and `sync` fail with
/// [`Error::Closed`] and further `close` calls return `Ok(())`.
pub struct AsyncWriter {
    data_tx: Sender<Vec<u8>>,
    control_tx: Sender<Control>,
    state: AtomicU8,
    /// Held shared by producers from the state check through the enqueue,
    /// exclusively by `close` while it leaves Running
    admission: RwLock<()>,
    dropped: AtomicU64,
    drop_on_full: bool,
    observer: Option<Arc<dyn DropObserver>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncWriter {
    /// Start the flush worker for `sink`
    pub fn new<S: Sink + 'static>(sink: S, options: AsyncOptions) -> Result<Self> {
        let (data_tx, data_rx) = bounded(options.queue_capacity());
        let (control_tx, control_rx) = crossbeam_channel::unbounded();

        let worker = FlushWorker {
            sink,
            pending: Vec::with_capacity(options.flush_threshold_bytes()),
            threshold: options.flush_threshold_bytes(),
            deferred: Vec::new(),
        };
        let interval = options.flush_interval();

        let handle = std::thread::Builder::new()
            .name(FLUSH_THREAD_NAME.to_string())
            .spawn(move || worker.run(data_rx, control_rx, interval))
            .map_err(Error::IoError)?;

        Ok(Self {
            data_tx,
            control_tx,
            state: AtomicU8::new(RUNNING),
            admission: RwLock::new(()),
            dropped: AtomicU64::new(0),
            drop_on_full: options.drop_on_full(),
            observer: None,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Report dropped writes to an external collector
    pub fn with_drop_observer(mut self, observer: Arc<dyn DropObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Copy `buf` onto the queue.
    ///
    /// Blocks while the queue is full, unless the writer drops on full, in
    /// which case it fails with [`Error::QueueFull`] right away.
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        let _admitted = self.admission.read();
        if self.state() != WriterState::Running {
            return Err(Error::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        let entry = buf.to_vec();
        if !self.drop_on_full {
            self.data_tx.send(entry).map_err(|_| Error::Closed)?;
            return Ok(buf.len());
        }

        match self.data_tx.try_send(entry) {
            Ok(()) => Ok(buf.len()),
            Err(TrySendError::Full(_)) => {
                let total = self.dropped.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(observer) = &self.observer {
                    observer.on_drop(total);
                }
                Err(Error::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => Err(Error::Closed),
        }
    }

    /// Write everything buffered or queued so far through to the sink and
    /// wait for it. Returns every error seen since the previous sync.
    pub fn sync(&self) -> Result<()> {
        if self.state() != WriterState::Running {
            return Err(Error::Closed);
        }
        let (reply_tx, reply_rx) = bounded(1);
        self.control_tx
            .send(Control::Sync(reply_tx))
            .map_err(|_| Error::Closed)?;
        reply_rx.recv().map_err(|_| Error::Closed)?
    }

    /// Final sync, then close the sink and stop the worker
    pub fn close(&self) -> Result<()> {
        {
            // Waits out producers already past the state check, so the
            // final drain sees every acknowledged entry
            let _exclusive = self.admission.write();
            if self
                .state
                .compare_exchange(RUNNING, DRAINING, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Ok(());
            }
        }

        let (reply_tx, reply_rx) = bounded(1);
        let result = match self.control_tx.send(Control::Close(reply_tx)) {
            Ok(()) => reply_rx.recv().unwrap_or(Err(Error::Closed)),
            Err(_) => Err(Error::Closed),
        };

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("Flush worker panicked");
            }
        }
        self.state.store(CLOSED, Ordering::SeqCst);
        debug!("Async writer closed");

        result
    }

    /// Current lifecycle state
    pub fn state(&self) -> WriterState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => WriterState::Running,
            DRAINING => WriterState::Draining,
            _ => WriterState::Closed,
        }
    }

    /// Number of writes rejected because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl Sink for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        AsyncWriter::write(self, buf)
    }

    fn close(&mut self) -> Result<()> {
        AsyncWriter::close(self)
    }
}

impl Drop for AsyncWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close async writer: {}", e);
        }
    }
}

/// State owned by the flush thread
struct FlushWorker<S> {
    sink: S,
    pending: Vec<u8>,
    threshold: usize,
    /// Errors from background flushes, reported by the next sync or close
    deferred: Vec<Error>,
}

impl<S: Sink> FlushWorker<S> {
    fn run(mut self, data_rx: Receiver<Vec<u8>>, control_rx: Receiver<Control>, interval: Duration) {
        let ticker = tick(interval);

        loop {
            select! {
                recv(data_rx) -> entry => match entry {
                    Ok(entry) => self.accept(entry),
                    Err(_) => {
                        self.abandon(&data_rx);
                        return;
                    }
                },
                recv(control_rx) -> msg => match msg {
                    Ok(Control::Sync(reply)) => {
                        let result = self.sync(&data_rx);
                        let _ = reply.send(result);
                    }
                    Ok(Control::Close(reply)) => {
                        let result = self.shutdown(&data_rx);
                        let _ = reply.send(result);
                        return;
                    }
                    Err(_) => {
                        self.abandon(&data_rx);
                        return;
                    }
                },
                recv(ticker) -> _ => self.flush_pending(),
            }
        }
    }

    /// Buffer an entry, writing through when the threshold is reached.
    /// An entry at or over the threshold bypasses the buffer.
    fn accept(&mut self, entry: Vec<u8>) {
        if entry.len() >= self.threshold {
            self.flush_pending();
            self.write_through(&entry);
            return;
        }

        self.pending.extend_from_slice(&entry);
        if self.pending.len() >= self.threshold {
            self.flush_pending();
        }
    }

    fn flush_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        self.write_through(&pending);
        self.pending = pending;
        self.pending.clear();
    }

    fn write_through(&mut self, buf: &[u8]) {
        if let Err(e) = self.sink.write(buf) {
            warn!("Failed to write {} bytes: {}", buf.len(), e);
            self.deferred.push(e);
        }
    }

    /// Flush the entries queued when the sync arrived, then the buffer.
    /// Entries enqueued after this point belong to a later flush.
    fn sync(&mut self, data_rx: &Receiver<Vec<u8>>) -> Result<()> {
        let backlog = data_rx.len();
        for _ in 0..backlog {
            match data_rx.try_recv() {
                Ok(entry) => self.accept(entry),
                Err(_) => break,
            }
        }
        self.flush_pending();
        Error::aggregate(std::mem::take(&mut self.deferred))
    }

    /// Drain the whole queue, flush, and close the sink
    fn shutdown(&mut self, data_rx: &Receiver<Vec<u8>>) -> Result<()> {
        while let Ok(entry) = data_rx.try_recv() {
            self.accept(entry);
        }
        self.flush_pending();

        let mut errors = std::mem::take(&mut self.deferred);
        if let Err(e) = self.sink.close() {
            errors.push(e);
        }
        Error::aggregate(errors)
    }

    /// The writer went away without closing; flush what is left
    fn abandon(&mut self, data_rx: &Receiver<Vec<u8>>) {
        if let Err(e) = self.shutdown(data_rx) {
            warn!("Failed to flush abandoned writer: {}", e);
        }
    }
}
