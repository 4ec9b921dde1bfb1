//! Write command: copy stdin into a rolling log file

use anyhow::{Context, Result};
use chrono::Utc;
use logroll_writer::{AsyncWriter, DropObserver, Roller};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};

use crate::cli::WriteArgs;
use crate::settings::Settings;

/// Warns on the first dropped line and then on every thousandth
struct WarnOnDrop;

impl DropObserver for WarnOnDrop {
    fn on_drop(&self, total: u64) {
        if total == 1 || total % 1000 == 0 {
            warn!(dropped = total, "Write queue full, dropping lines");
        }
    }
}

pub async fn execute(config: Option<&Path>, args: WriteArgs) -> Result<()> {
    let settings = Settings::for_write(config, &args)?;
    debug!(
        path = %settings.path.display(),
        max_size = settings.rotation.max_size_bytes(),
        max_backups = settings.rotation.max_backups(),
        "Starting writer"
    );

    let roller = Roller::new(&settings.path, settings.rotation)
        .with_context(|| format!("Invalid log path {}", settings.path.display()))?;
    let writer = AsyncWriter::new(roller, settings.writer)?.with_drop_observer(Arc::new(WarnOnDrop));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut stdin = BufReader::new(tokio::io::stdin());

    // Kept across iterations: a cancelled read_until leaves its partial line here
    let mut line = Vec::new();
    let result = loop {
        tokio::select! {
            read = stdin.read_until(b'\n', &mut line) => match read {
                Ok(0) => break Ok(()),
                Ok(_) => {
                    if let Err(e) = write_line(&writer, &line, args.timestamp) {
                        break Err(e);
                    }
                    line.clear();
                }
                Err(e) => break Err(anyhow::Error::new(e).context("Failed to read stdin")),
            },
            _ = sigterm.recv() => {
                info!("Received SIGTERM, closing");
                break Ok(());
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, closing");
                break Ok(());
            }
        }
    };

    // A final line without a trailing newline, or one cut short by a signal
    if result.is_ok() && !line.is_empty() {
        write_line(&writer, &line, args.timestamp)?;
    }

    let dropped = writer.dropped();
    let closed = tokio::task::block_in_place(|| writer.close());
    if dropped > 0 {
        warn!("Dropped {} line(s) while the queue was full", dropped);
    }

    result?;
    closed.context("Failed to flush log file")?;
    Ok(())
}

fn write_line(writer: &AsyncWriter, line: &[u8], timestamp: bool) -> Result<()> {
    let entry = if timestamp {
        let mut entry = Utc::now()
            .format("%Y-%m-%dT%H:%M:%S%.3fZ ")
            .to_string()
            .into_bytes();
        entry.extend_from_slice(line);
        entry
    } else {
        line.to_vec()
    };

    // Blocking mode may wait for room on the queue
    match tokio::task::block_in_place(|| writer.write(&entry)) {
        Ok(_) => Ok(()),
        Err(e) if e.is_queue_full() => Ok(()),
        Err(e) => Err(e.into()),
    }
}
