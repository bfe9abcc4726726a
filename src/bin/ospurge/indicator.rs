// Progress reporting for the CLI binary.
//
// Reads PurgeStatistics from the stats channel, keeps a live progress line
// with indicatif and prints the dry-run inventory and the final summary once
// the channel closes.

use std::collections::BTreeMap;
use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use ospurge_rs::PurgeStatistics;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Summary returned by [`show_indicator`] after the stats channel closes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndicatorSummary {
    pub total_delete_count: u64,
    pub total_absent_count: u64,
    pub total_skip_count: u64,
    pub total_error_count: u64,
    pub total_listed_count: u64,
}

/// Resources a dry run would delete, keyed by kind order then kind name.
pub type DryRunInventory = BTreeMap<(i32, String), Vec<String>>;

/// How often (in seconds) to refresh the progress display.
const REFRESH_INTERVAL: f32 = 1.0;

/// Spawn a background task that reads purge statistics from the channel
/// and displays progress using indicatif.
///
/// The task runs until `stats_receiver` is closed (all senders dropped).
/// Returns a `JoinHandle` that should be awaited after the pipeline finishes.
pub fn show_indicator(
    stats_receiver: Receiver<PurgeStatistics>,
    show_progress: bool,
    show_result: bool,
    dry_run: bool,
) -> JoinHandle<IndicatorSummary> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut summary = IndicatorSummary::default();
        let mut inventory = DryRunInventory::new();

        loop {
            let period = Instant::now();
            loop {
                while let Ok(stats) = stats_receiver.try_recv() {
                    record_statistics(&mut summary, &mut inventory, stats);
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    let elapsed = start_time.elapsed();

                    info!(
                        message = "purge summary",
                        deleted = summary.total_delete_count,
                        absent = summary.total_absent_count,
                        skipped = summary.total_skip_count,
                        error = summary.total_error_count,
                        listed = summary.total_listed_count,
                        duration_sec = elapsed.as_secs_f64(),
                    );

                    if show_result {
                        progress_text.finish_and_clear();

                        let mut stdout = io::stdout().lock();
                        if dry_run {
                            let _ = write!(stdout, "{}", format_dry_run_inventory(&inventory));
                        }
                        let _ = writeln!(
                            stdout,
                            "{},  duration {}",
                            format_summary(&summary, dry_run),
                            HumanDuration(elapsed)
                        );
                        let _ = stdout.flush();
                    }

                    return summary;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            if show_progress {
                progress_text.set_message(format_summary(&summary, dry_run));
            }
        }
    })
}

fn record_statistics(
    summary: &mut IndicatorSummary,
    inventory: &mut DryRunInventory,
    stats: PurgeStatistics,
) {
    match stats {
        PurgeStatistics::DeleteComplete { .. } => summary.total_delete_count += 1,
        PurgeStatistics::DeleteAbsent { .. } => summary.total_absent_count += 1,
        PurgeStatistics::DeleteSkip { .. } => summary.total_skip_count += 1,
        PurgeStatistics::DeleteError { .. } => summary.total_error_count += 1,
        PurgeStatistics::DryRunListed {
            order,
            kind,
            description,
        } => {
            summary.total_listed_count += 1;
            inventory.entry((order, kind)).or_default().push(description);
        }
    }
}

fn format_summary(summary: &IndicatorSummary, dry_run: bool) -> String {
    if dry_run {
        return format!(
            "would delete {} resources,  skipped {} resources",
            HumanCount(summary.total_listed_count),
            HumanCount(summary.total_skip_count),
        );
    }

    format!(
        "deleted {} resources,  already absent {},  skipped {} resources,  error {} resources",
        HumanCount(summary.total_delete_count),
        HumanCount(summary.total_absent_count),
        HumanCount(summary.total_skip_count),
        HumanCount(summary.total_error_count),
    )
}

/// Render the dry-run inventory grouped by kind, in purge order.
pub fn format_dry_run_inventory(inventory: &DryRunInventory) -> String {
    let mut text = String::new();
    for ((_, kind), descriptions) in inventory {
        text.push_str(&format!("* Resources type: {kind}\n"));
        for description in descriptions {
            text.push_str(&format!("{description}\n"));
        }
        text.push('\n');
    }
    text
}
