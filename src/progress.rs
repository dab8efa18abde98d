//! Progress reporting for inventory runs
//!
//! A spinner that polls [`RunStatus`] snapshots, plus the header and summary
//! printed around a run.

use crate::status::{RunPhase, RunStatus, StatusHandle};
use crate::walker::types::{RunOutcome, RunReport};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Spinner that follows a run's status
pub struct ProgressReporter {
    bar: ProgressBar,
    stop: Arc<AtomicBool>,
}

impl ProgressReporter {
    /// Start a spinner refreshed from `status` (must run inside a tokio runtime)
    pub fn watch(status: StatusHandle) -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .map(|s| s.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        let stop = Arc::new(AtomicBool::new(false));
        let poll_bar = bar.clone();
        let poll_stop = Arc::clone(&stop);
        tokio::spawn(async move {
            while !poll_stop.load(Ordering::SeqCst) {
                poll_bar.set_message(status_line(&status.snapshot()));
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        });

        Self { bar, stop }
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.stop.store(true, Ordering::SeqCst);
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.bar.finish_and_clear();
    }
}

fn phase_label(phase: RunPhase) -> &'static str {
    match phase {
        RunPhase::Starting => "Starting",
        RunPhase::Discovering => "Discovering shares",
        RunPhase::Scanning => "Scanning",
        RunPhase::Completed => "Completed",
        RunPhase::NothingToDo => "Nothing to do",
        RunPhase::Cancelled => "Cancelled",
        RunPhase::Failed => "Failed",
    }
}

/// One-line summary of a status snapshot
pub fn status_line(status: &RunStatus) -> String {
    format!(
        "{} | Shares: {}/{} | Dirs: {} | Files: {} | Size: {} | Batches: {} sent, {} failed | Errors: {}",
        phase_label(status.phase),
        status.namespaces_done(),
        status.namespaces.len(),
        format_number(status.directories_visited),
        format_number(status.files_processed),
        format_size(status.bytes_processed, BINARY),
        format_number(status.batches_sent),
        format_number(status.batches_failed),
        format_number(status.error_count),
    )
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Print a summary of the run report
pub fn print_summary(report: &RunReport, duration: Duration) {
    let title = match report.status {
        RunOutcome::Completed => style("Inventory Complete").green().bold(),
        RunOutcome::NothingToDo => style("Nothing To Do").green().bold(),
        RunOutcome::Cancelled => style("Inventory Cancelled").yellow().bold(),
        RunOutcome::Failed => style("Inventory Failed").red().bold(),
    };
    let duration_secs = duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        report.total_files_processed as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Execution:").bold(), report.execution_id);
    println!("  {} {}", style("Shares:").bold(), report.total_shares_scanned);
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(report.total_files_processed)
    );
    println!(
        "  {} {} ({:.2} GB)",
        style("Total Size:").bold(),
        format_size(report.total_bytes_processed, BINARY),
        report.total_gb_processed
    );
    println!(
        "  {} {} sent, {} failed ({} records lost)",
        style("Batches:").bold(),
        format_number(report.total_batches_sent),
        format_number(report.total_batches_failed),
        format_number(report.total_records_lost)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if let Some(message) = &report.message {
        println!("  {} {}", style("Message:").yellow().bold(), message);
    }
    if report.total_errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").yellow().bold(),
            format_number(report.total_errors)
        );
        for line in report.error_sample().iter().take(5) {
            println!("    {}", style(line).dim());
        }
    }
    for share in &report.share_results {
        println!(
            "  {} {} files, {} dirs, {} waves [{}]",
            style(format!("{}:", share.file_share)).cyan(),
            format_number(share.files_processed),
            format_number(share.directories_processed),
            share.waves_completed,
            share.status
        );
    }
    println!();
}

/// Print a header at the start of a run
pub fn print_header(account: &str, execution_id: &str, sink: &str) {
    println!();
    println!(
        "{} {}",
        style("share-inventory").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Account:").bold(), account);
    println!("  {} {}", style("Execution:").bold(), execution_id);
    println!("  {} {}", style("Sink:").bold(), sink);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }

    #[test]
    fn test_status_line() {
        let status = StatusHandle::new("exec", "acct");
        status.set_namespaces(&["a".to_string()]);
        status.set_phase(RunPhase::Scanning);
        status.update_namespace("a", |p| p.counters.files_processed = 12_345);

        let line = status_line(&status.snapshot());
        assert!(line.starts_with("Scanning | Shares: 0/1"));
        assert!(line.contains("Files: 12,345"));
    }
}
