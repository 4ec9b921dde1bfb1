//! Terminal and JSON output

use chrono::{DateTime, Utc};
use colored::Colorize;
use logroll_writer::{FileSystem, LogFileInfo, OsFileSystem, RetentionReport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "file")]
    name: String,
    #[tabled(rename = "rolled at (UTC)")]
    rolled_at: String,
    #[tabled(rename = "size")]
    size: String,
    #[tabled(rename = "gz")]
    compressed: String,
}

#[derive(Serialize)]
struct BackupJson {
    path: PathBuf,
    name: String,
    rolled_at: DateTime<Utc>,
    size_bytes: Option<u64>,
    compressed: bool,
}

#[derive(Serialize)]
struct PruneJson<'a> {
    removed: &'a [PathBuf],
    compressed: &'a [PathBuf],
    errors: &'a [String],
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

/// Print backups, newest first
pub fn print_backups(backups: &[LogFileInfo]) {
    let fs = OsFileSystem;
    let size_of = |info: &LogFileInfo| fs.stat(&info.path).ok().map(|s| s.len);

    if is_json_mode() {
        let rows: Vec<BackupJson> = backups
            .iter()
            .map(|b| BackupJson {
                path: b.path.clone(),
                name: b.name.clone(),
                rolled_at: b.timestamp,
                size_bytes: size_of(b),
                compressed: b.is_compressed,
            })
            .collect();
        print_json(&rows);
        return;
    }

    if backups.is_empty() {
        print_info("No backups found");
        return;
    }

    let rows: Vec<BackupRow> = backups
        .iter()
        .enumerate()
        .map(|(i, b)| BackupRow {
            index: i + 1,
            name: b.name.clone(),
            rolled_at: b.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            size: size_of(b).map(format_bytes).unwrap_or_else(|| "-".to_string()),
            compressed: if b.is_compressed {
                "yes".green().to_string()
            } else {
                "no".dimmed().to_string()
            },
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(0)).with(Alignment::right()))
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();

    println!("{}", table);
}

pub fn print_prune_report(report: &RetentionReport) {
    if is_json_mode() {
        print_json(&PruneJson {
            removed: &report.removed,
            compressed: &report.compressed,
            errors: &report.errors,
        });
        return;
    }

    for path in &report.removed {
        print_success(&format!("Removed {}", path.display()));
    }
    for path in &report.compressed {
        print_success(&format!("Compressed {}", path.display()));
    }
    for error in &report.errors {
        print_error(error);
    }
    if report.removed.is_empty() && report.compressed.is_empty() && report.errors.is_empty() {
        print_info("Nothing to prune");
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1}G", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1}M", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.0}K", bytes as f64 / 1024.0)
    } else {
        format!("{}B", bytes)
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}
