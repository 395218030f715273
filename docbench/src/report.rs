//! Progress reporting and result output: periodic throughput lines while a
//! run is live, then a summary table plus CSV and JSON export.

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::{RunCounters, RunStats};

// ────────────────────────────────────────────────────────────────────────────────
// Progress reporter
// ────────────────────────────────────────────────────────────────────────────────

/// Spawn the progress thread. It prints one throughput line per interval and
/// polls `done` every 250ms, so shutdown never waits a full interval.
pub(crate) fn spawn_reporter(
    counters: Arc<RunCounters>,
    done: Arc<AtomicBool>,
    interval: Duration,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("docbench-reporter".to_string())
        .spawn(move || {
            println!("Benchmark started.");
            let mut last_total = 0u64;
            let mut last_tick = Instant::now();
            while !done.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(250));
                let elapsed = last_tick.elapsed();
                if elapsed >= interval {
                    let total = counters.attempts();
                    let rate = ((total - last_total) as f64 / elapsed.as_secs_f64()) as u64;
                    println!("{:>10} ops/sec; total operations: {}", rate, total);
                    last_total = total;
                    last_tick = Instant::now();
                }
            }
        })
}

// ────────────────────────────────────────────────────────────────────────────────
// Terminal output
// ────────────────────────────────────────────────────────────────────────────────

/// Print the end-of-run summary table.
pub fn print_summary(stats: &RunStats) {
    println!(
        "\n{}",
        format!("━━━ {} ({}) ━━━", stats.store, stats.phase).bold().cyan()
    );

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);

    table.set_header(vec!["Metric", "Value"]);

    let failed_cell = if stats.failed > 0 {
        Cell::new(format_count(stats.failed)).fg(Color::Red)
    } else {
        Cell::new("0")
    };

    table.add_row(vec![
        Cell::new("Completed ops"),
        Cell::new(format_count(stats.completed)),
    ]);
    table.add_row(vec![Cell::new("Failed ops"), failed_cell]);
    table.add_row(vec![
        Cell::new("Elapsed"),
        Cell::new(format!("{:.2}s", stats.elapsed_secs)),
    ]);
    table.add_row(vec![
        Cell::new("Throughput"),
        Cell::new(format_throughput(stats.throughput)).fg(Color::Green),
    ]);
    table.add_row(vec![
        Cell::new("p50 (μs)"),
        Cell::new(format!("{:.1}", stats.p50_us)),
    ]);
    table.add_row(vec![
        Cell::new("p95 (μs)"),
        Cell::new(format!("{:.1}", stats.p95_us)),
    ]);
    table.add_row(vec![
        Cell::new("p99 (μs)"),
        Cell::new(format!("{:.1}", stats.p99_us)),
    ]);
    table.add_row(vec![
        Cell::new("p99.9 (μs)"),
        Cell::new(format!("{:.1}", stats.p999_us)),
    ]);
    table.add_row(vec![
        Cell::new("Max (μs)"),
        Cell::new(format!("{:.1}", stats.max_us)),
    ]);
    table.add_row(vec![
        Cell::new("Mean (μs)"),
        Cell::new(format!("{:.1}", stats.mean_us)),
    ]);
    table.add_row(vec![
        Cell::new("Docs created"),
        Cell::new(format_count(stats.created.max(0) as u64)),
    ]);
    table.add_row(vec![
        Cell::new("Docs live"),
        Cell::new(format_count(stats.live.max(0) as u64)),
    ]);

    println!("{table}");
}

// ────────────────────────────────────────────────────────────────────────────────
// CSV export
// ────────────────────────────────────────────────────────────────────────────────

pub fn export_csv(stats: &RunStats, path: &Path) -> std::io::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "store",
        "phase",
        "completed",
        "failed",
        "elapsed_secs",
        "throughput_ops_sec",
        "p50_us",
        "p95_us",
        "p99_us",
        "p999_us",
        "max_us",
        "mean_us",
        "created",
        "live",
    ])?;

    wtr.write_record([
        &stats.store,
        &stats.phase,
        &stats.completed.to_string(),
        &stats.failed.to_string(),
        &format!("{:.6}", stats.elapsed_secs),
        &format!("{:.2}", stats.throughput),
        &format!("{:.2}", stats.p50_us),
        &format!("{:.2}", stats.p95_us),
        &format!("{:.2}", stats.p99_us),
        &format!("{:.2}", stats.p999_us),
        &format!("{:.2}", stats.max_us),
        &format!("{:.2}", stats.mean_us),
        &stats.created.to_string(),
        &stats.live.to_string(),
    ])?;

    wtr.flush()?;
    println!("  CSV exported to {}", path.display());
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────────
// JSON export
// ────────────────────────────────────────────────────────────────────────────────

pub fn export_json(stats: &RunStats, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(stats)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    std::fs::write(path, json)?;
    println!("  JSON exported to {}", path.display());
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────────
// Formatting helpers
// ────────────────────────────────────────────────────────────────────────────────

fn format_throughput(t: f64) -> String {
    if t >= 1_000_000.0 {
        format!("{:.2}M ops/sec", t / 1_000_000.0)
    } else if t >= 1_000.0 {
        format!("{:.1}K ops/sec", t / 1_000.0)
    } else {
        format!("{:.0} ops/sec", t)
    }
}

fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}
