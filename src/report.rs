//! Human-readable rendering of estimates, progress and reports.
//!
//! Everything here returns plain text lines; printing is the caller's job.

use mediamig_migrate::audit::ReconciliationReport;
use mediamig_migrate::engine::{ItemOutcome, MigrationReport, NO_EXTENSION, RunStatus, TransferKind};
use mediamig_migrate::{EstimateReport, PlanItem, Totals};
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
/// Entries listed per section of an audit before summarizing the rest.
const AUDIT_LIST_LIMIT: usize = 20;

pub fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

/// `1h 2m 3s`, `2m 3s` or `3s`. Negative input counts as zero.
pub fn human_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (hours, minutes, seconds) = (total / 3600, total % 3600 / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m {seconds}s"),
        _ => format!("{hours}h {minutes}m {seconds}s"),
    }
}

fn totals_line(label: &str, totals: &Totals) -> String {
    format!("  {label:<12} {:>6} files  {:>12}", totals.files, human_size(totals.bytes))
}

pub fn estimate(report: &EstimateReport) -> Vec<String> {
    let mut lines = vec![
        "Estimate".to_string(),
        totals_line("RAW", &report.raw),
        totals_line("JPEG", &report.jpeg),
        totals_line("Video", &report.video),
        totals_line("Other", &report.other),
    ];
    if report.unsupported.files > 0 {
        lines.push(totals_line("Unsupported", &report.unsupported));
    }
    lines.push(totals_line("Total", &report.total));
    let extensions: Vec<String> = report
        .extensions
        .iter()
        .map(|(ext, count)| format!("{}: {count}", if ext.is_empty() { NO_EXTENSION } else { ext }))
        .collect();
    if !extensions.is_empty() {
        lines.push(format!("  Extensions   {}", extensions.join(", ")));
    }
    lines.push(format!("  Estimated time: {}", human_duration(report.total_seconds)));
    lines
}

fn outcome(outcome: &ItemOutcome) -> String {
    match outcome {
        ItemOutcome::Skipped(reason) => format!("skipped ({reason})"),
        ItemOutcome::Transferred(transfer) => match transfer.kind {
            TransferKind::Converted => format!(
                "converted ({} -> {})",
                human_size(transfer.bytes_read),
                human_size(transfer.bytes_written)
            ),
            TransferKind::Copied => format!("copied ({})", human_size(transfer.bytes_written)),
        },
        ItemOutcome::Failed(failure) => format!("FAILED: {failure}"),
    }
}

pub fn progress(
    finished: usize,
    total: usize,
    item: &PlanItem,
    result: &ItemOutcome,
    elapsed: Duration,
    remaining: Option<Duration>,
) -> String {
    let remaining = remaining.map_or_else(|| "?".to_string(), |r| human_duration(r.as_secs_f64()));
    format!(
        "[{finished}/{total}] {} -> {}: {} | elapsed {} | remaining {remaining}",
        item.source.name,
        item.destination_name,
        outcome(result),
        human_duration(elapsed.as_secs_f64()),
    )
}

pub fn migration(report: &MigrationReport) -> Vec<String> {
    let counts = &report.counts;
    let mut lines = vec![
        format!("Migration {}: {} -> {}", report.status, report.source, report.destination),
        format!("  Converted:        {}", counts.converted),
        format!("  JPEG copied:      {}", counts.jpeg_copied),
        format!("  Video copied:     {}", counts.video_copied),
        format!("  Already present:  {}", counts.already_present),
        format!("  Unsupported:      {}", counts.unsupported),
        format!("  Duplicate names:  {}", counts.duplicates),
        format!("  Failed:           {}", counts.failed),
        format!("  Time:             {}", human_duration(report.elapsed.as_secs_f64())),
    ];
    if report.status == RunStatus::Partial {
        lines.push(format!("  Not processed:    {}", report.planned.saturating_sub(counts.total())));
    }
    match &report.sizes {
        Some(sizes) => {
            lines.push(format!("  Original size:    {}", human_size(sizes.original_size)));
            lines.push(format!("  Final size:       {}", human_size(sizes.final_size)));
            lines.push(format!("  Saved:            {:.1}%", sizes.saved_percent));
        },
        None => lines.push("  Sizes:            unavailable".to_string()),
    }
    if !report.unsupported_extensions.is_empty() {
        let extensions: Vec<&str> = report.unsupported_extensions.iter().map(String::as_str).collect();
        lines.push(format!("  Unsupported extensions: {}", extensions.join(", ")));
    }
    if !report.failures.is_empty() {
        lines.push("Failures:".to_string());
        lines.extend(
            report
                .failures
                .iter()
                .map(|f| format!("  {} [{}] {}: {}", f.name, f.extension, f.stage, f.message)),
        );
    }
    lines
}

fn limited(lines: &mut Vec<String>, entries: Vec<String>) {
    let hidden = entries.len().saturating_sub(AUDIT_LIST_LIMIT);
    lines.extend(entries.into_iter().take(AUDIT_LIST_LIMIT).map(|entry| format!("  {entry}")));
    if hidden > 0 {
        lines.push(format!("  ... and {hidden} more"));
    }
}

pub fn audit(report: &ReconciliationReport) -> Vec<String> {
    let mut lines = vec![
        format!("Source files: {}", report.source_count),
        format!("OK:           {}", report.ok_count),
        format!("Skipped:      {}", report.skipped),
        format!("Missing:      {}", report.missing.len()),
        format!("Unexpected:   {}", report.unexpected.len()),
    ];
    if !report.missing.is_empty() {
        lines.push("Missing:".to_string());
        limited(
            &mut lines,
            report.missing.iter().map(|m| format!("{} -> {}", m.source, m.expected_destination)).collect(),
        );
    }
    if !report.unexpected.is_empty() {
        lines.push("Unexpected:".to_string());
        limited(&mut lines, report.unexpected.clone());
    }
    if report.is_clean() {
        lines.push("Everything accounted for.".to_string());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediamig_migrate::audit::Missing;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0.00 MB")]
    #[case(1024 * 1024, "1.00 MB")]
    #[case(20 * 1024 * 1024 + 512 * 1024, "20.50 MB")]
    fn test_human_size(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(human_size(bytes), expected);
    }

    #[rstest]
    #[case(-3.0, "0s")]
    #[case(59.9, "59s")]
    #[case(61.0, "1m 1s")]
    #[case(3600.0, "1h 0m 0s")]
    #[case(3725.0, "1h 2m 5s")]
    fn test_human_duration(#[case] seconds: f64, #[case] expected: &str) {
        assert_eq!(human_duration(seconds), expected);
    }

    #[test]
    fn test_audit_truncates_long_lists() {
        let report = ReconciliationReport {
            source_count: 25,
            missing: (0..25)
                .map(|i| Missing { source: format!("{i}.dng"), expected_destination: format!("{i}.jpg") })
                .collect(),
            ..ReconciliationReport::default()
        };
        let lines = audit(&report);
        assert!(lines.contains(&"  0.dng -> 0.jpg".to_string()));
        assert!(lines.contains(&"  19.dng -> 19.jpg".to_string()));
        assert!(!lines.contains(&"  20.dng -> 20.jpg".to_string()));
        assert!(lines.contains(&"  ... and 5 more".to_string()));
    }

    #[test]
    fn test_clean_audit() {
        let report = ReconciliationReport { source_count: 2, ok_count: 2, ..ReconciliationReport::default() };
        assert_eq!(audit(&report).last().unwrap(), "Everything accounted for.");
    }
}
