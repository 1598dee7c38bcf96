//! Aggregating item outcomes into a final report.

use crate::classify::Category;
use crate::engine::item::{ItemOutcome, Stage, TransferKind};
use crate::plan::{PlanItem, SkipReason};
use derive_more::Display;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

/// Placeholder used in reports for files without an extension.
pub const NO_EXTENSION: &str = "(none)";

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum RunStatus {
    /// Every planned item reached a terminal state.
    #[display("complete")]
    Complete,
    /// The run was cancelled or halted before every item was dispatched.
    #[display("partial")]
    Partial,
}

/// How many items ended in each terminal state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub converted: usize,
    pub jpeg_copied: usize,
    pub video_copied: usize,
    pub already_present: usize,
    pub unsupported: usize,
    pub duplicates: usize,
    pub failed: usize,
}
impl Counts {
    pub fn total(&self) -> usize {
        self.converted
            + self.jpeg_copied
            + self.video_copied
            + self.already_present
            + self.unsupported
            + self.duplicates
            + self.failed
    }
}

/// One failed item, as shown to the operator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureRecord {
    /// 1-based position in the plan.
    pub index: usize,
    pub name: String,
    pub extension: String,
    pub stage: Stage,
    pub message: String,
}

/// Source and destination folder totals after a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeReport {
    pub original_size: u64,
    pub final_size: u64,
    /// Negative when the destination ended up larger than the source.
    pub saved_bytes: i64,
    /// `0.0` when the source was empty.
    pub saved_percent: f64,
}
impl SizeReport {
    pub fn new(original_size: u64, final_size: u64) -> Self {
        let saved_bytes = original_size as i64 - final_size as i64;
        let saved_percent = match original_size {
            0 => 0.0,
            original => saved_bytes as f64 / original as f64 * 100.0,
        };
        Self { original_size, final_size, saved_bytes, saved_percent }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MigrationReport {
    pub source: String,
    pub destination: String,
    pub status: RunStatus,
    /// Items planned, whether or not they were dispatched.
    pub planned: usize,
    pub counts: Counts,
    pub failures: Vec<FailureRecord>,
    /// Lower-cased extensions of files skipped as unsupported.
    pub unsupported_extensions: BTreeSet<String>,
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
    /// `None` if the folders could not be re-listed after the run.
    pub sizes: Option<SizeReport>,
}
impl MigrationReport {
    /// True if every planned item was processed and none failed.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Complete && self.counts.failed == 0
    }
}

/// Running tally while the engine works through a plan.
#[derive(Debug)]
pub struct MigrationRun {
    source: String,
    destination: String,
    planned: usize,
    started: Instant,
    counts: Counts,
    failures: Vec<FailureRecord>,
    unsupported_extensions: BTreeSet<String>,
    bytes_read: u64,
    bytes_written: u64,
}
impl MigrationRun {
    pub fn new(source: impl Into<String>, destination: impl Into<String>, planned: usize) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            planned,
            started: Instant::now(),
            counts: Counts::default(),
            failures: Vec::new(),
            unsupported_extensions: BTreeSet::new(),
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Tally `outcome` for the item at 1-based plan position `index`.
    pub fn record(&mut self, index: usize, item: &PlanItem, outcome: &ItemOutcome) {
        let extension = Category::extension(&item.source.name).unwrap_or_else(|| NO_EXTENSION.to_string());
        match outcome {
            ItemOutcome::Skipped(SkipReason::AlreadyPresent) => self.counts.already_present += 1,
            ItemOutcome::Skipped(SkipReason::DuplicateDestination) => self.counts.duplicates += 1,
            ItemOutcome::Skipped(SkipReason::Unsupported) => {
                self.counts.unsupported += 1;
                self.unsupported_extensions.insert(extension);
            },
            ItemOutcome::Transferred(transfer) => {
                match (transfer.kind, item.category) {
                    (TransferKind::Converted, _) => self.counts.converted += 1,
                    (TransferKind::Copied, Category::Video) => self.counts.video_copied += 1,
                    (TransferKind::Copied, _) => self.counts.jpeg_copied += 1,
                }
                self.bytes_read += transfer.bytes_read;
                self.bytes_written += transfer.bytes_written;
            },
            ItemOutcome::Failed(failure) => {
                self.counts.failed += 1;
                self.failures.push(FailureRecord {
                    index,
                    name: item.source.name.clone(),
                    extension,
                    stage: failure.stage,
                    message: failure.message.clone(),
                });
            },
        }
    }

    pub fn finished(&self) -> usize {
        self.counts.total()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Average time per finished item times the items still to go.
    ///
    /// `None` until the first item finishes.
    pub fn remaining(&self) -> Option<Duration> {
        let finished = self.finished();
        if finished == 0 {
            return None;
        }
        let left = self.planned.saturating_sub(finished);
        Some(self.elapsed().div_f64(finished as f64).mul_f64(left as f64))
    }

    /// Failures come out in plan order, whatever order they finished in.
    pub fn finish(mut self, status: RunStatus, sizes: Option<SizeReport>) -> MigrationReport {
        let elapsed = self.elapsed();
        self.failures.sort_by_key(|failure| failure.index);
        MigrationReport {
            source: self.source,
            destination: self.destination,
            status,
            planned: self.planned,
            counts: self.counts,
            failures: self.failures,
            unsupported_extensions: self.unsupported_extensions,
            bytes_read: self.bytes_read,
            bytes_written: self.bytes_written,
            elapsed,
            sizes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::item::{Failure, Transfer};
    use crate::plan::{Policy, plan};
    use mediamig_storage::RemoteEntry;
    use rstest::rstest;

    fn item(name: &str) -> PlanItem {
        let entries = [RemoteEntry::file(format!("/src/{name}"), 100)];
        plan(&entries, &Policy { convert_other: false }).unwrap().remove(0)
    }

    #[rstest]
    #[case(20 * 1024 * 1024, 3 * 1024 * 1024, 85.0)]
    #[case(100, 100, 0.0)]
    #[case(100, 150, -50.0)]
    #[case(0, 0, 0.0)]
    fn test_size_report(#[case] original: u64, #[case] final_size: u64, #[case] percent: f64) {
        let sizes = SizeReport::new(original, final_size);
        assert_eq!(sizes.saved_bytes, original as i64 - final_size as i64);
        assert!((sizes.saved_percent - percent).abs() < 1e-9);
    }

    #[test]
    fn test_record_counts_by_outcome() {
        let mut run = MigrationRun::new("/src", "/src-jpg", 5);
        let converted = Transfer { kind: TransferKind::Converted, bytes_read: 100, bytes_written: 20 };
        let copied = Transfer { kind: TransferKind::Copied, bytes_read: 100, bytes_written: 100 };
        run.record(1, &item("a.dng"), &ItemOutcome::Transferred(converted));
        run.record(2, &item("b.mov"), &ItemOutcome::Transferred(copied));
        run.record(3, &item("c.jpg"), &ItemOutcome::Skipped(SkipReason::AlreadyPresent));
        run.record(4, &item("d.PNG"), &ItemOutcome::Skipped(SkipReason::Unsupported));
        run.record(
            5,
            &item("e.cr2"),
            &ItemOutcome::Failed(Failure { stage: Stage::Decode, message: "bad".to_string(), fatal: false }),
        );

        let report = run.finish(RunStatus::Complete, None);
        assert_eq!(report.counts.converted, 1);
        assert_eq!(report.counts.video_copied, 1);
        assert_eq!(report.counts.already_present, 1);
        assert_eq!(report.counts.unsupported, 1);
        assert_eq!(report.counts.failed, 1);
        assert_eq!(report.counts.total(), 5);
        assert_eq!(report.bytes_read, 200);
        assert_eq!(report.bytes_written, 120);
        assert_eq!(report.unsupported_extensions, BTreeSet::from(["png".to_string()]));
        assert_eq!(report.failures[0].name, "e.cr2");
        assert_eq!(report.failures[0].extension, "cr2");
        assert!(!report.is_success());
    }

    #[test]
    fn test_failures_in_plan_order() {
        let failed = |message: &str| {
            ItemOutcome::Failed(Failure { stage: Stage::Copy, message: message.to_string(), fatal: false })
        };
        let mut run = MigrationRun::new("/src", "/dst", 3);
        run.record(3, &item("c.jpg"), &failed("late"));
        run.record(1, &item("a.jpg"), &failed("early"));
        let report = run.finish(RunStatus::Complete, None);
        let names: Vec<_> = report.failures.iter().map(|f| (f.index, f.name.as_str())).collect();
        assert_eq!(names, vec![(1, "a.jpg"), (3, "c.jpg")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_uses_average() {
        let mut run = MigrationRun::new("/src", "/dst", 4);
        assert_eq!(run.remaining(), None);
        tokio::time::advance(Duration::from_secs(10)).await;
        run.record(1, &item("a.jpg"), &ItemOutcome::Skipped(SkipReason::AlreadyPresent));
        assert_eq!(run.remaining(), Some(Duration::from_secs(30)));
    }
}
