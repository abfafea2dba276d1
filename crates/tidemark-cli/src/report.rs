//! Human-readable run summary

use colored::Colorize;
use tidemark_core::{BatchKind, BatchReport, RunReport, RunStatus, Watermark};

/// Print the per-batch counts, newly queued paths and the outcome.
pub fn print_report(report: &RunReport) {
    let window = Watermark::new(report.watermark_start, report.watermark_end);
    println!();
    if report.dry_run {
        println!("{} Dry run over {}", "=>".blue().bold(), window.to_string().cyan());
    } else {
        println!("{} Sync over {}", "=>".blue().bold(), window.to_string().cyan());
    }

    for batch in report.all_batches() {
        print_batch(batch, report.dry_run);
    }

    let queued = report.newly_queued();
    if !queued.is_empty() {
        println!();
        println!("{} Queued for retry:", "RETRY".yellow().bold());
        for path in &queued {
            println!("   {} {}", "-".yellow(), path.display());
        }
    }

    println!();
    match &report.status {
        RunStatus::Completed if report.dry_run => {
            println!("{} Nothing was uploaded or saved.", "DRY RUN".blue().bold());
        }
        RunStatus::Completed => {
            println!(
                "{} Next run starts at {} ({} ms).",
                "OK".green().bold(),
                report.started_at.with_timezone(&chrono::Local).to_rfc3339().cyan(),
                report.elapsed_ms
            );
        }
        RunStatus::Cancelled => {
            println!(
                "{} Run cancelled; the watermark was not moved.",
                "CANCELLED".yellow().bold()
            );
        }
        RunStatus::Aborted { reason } => {
            println!("{} {reason}", "ABORTED".red().bold());
            println!("The watermark was not moved.");
        }
    }
}

fn print_batch(batch: &BatchReport, dry_run: bool) {
    let label = match batch.kind {
        BatchKind::Extension => format!(".{}", batch.label),
        BatchKind::RetryReplay => batch.label.clone(),
    };

    if batch.candidates.is_empty() {
        println!("   {:<8} {}", label.bold(), "no new files".dimmed());
        return;
    }
    if dry_run || !batch.submitted {
        println!("   {:<8} {} file(s) would be uploaded", label.bold(), batch.candidates.len());
        for path in &batch.candidates {
            println!("            {}", path.display().to_string().dimmed());
        }
        return;
    }
    if batch.cancelled {
        println!(
            "   {:<8} {} file(s) submitted, {}",
            label.bold(),
            batch.candidates.len(),
            "cancelled".yellow()
        );
        return;
    }

    let failed = if batch.failed.is_empty() {
        "0 failed".normal()
    } else {
        format!("{} failed", batch.failed.len()).red()
    };
    println!(
        "   {:<8} {} accepted, {} matched, {} already present, {}",
        label.bold(),
        batch.accepted.len().to_string().green(),
        batch.matched.len(),
        batch.duplicates.len(),
        failed
    );
    for rejection in &batch.failed {
        println!(
            "            {} {} ({})",
            "!".red(),
            rejection.path.display(),
            rejection.reason.dimmed()
        );
    }
}

/// Print the report as pretty JSON.
pub fn print_json(report: &RunReport) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
