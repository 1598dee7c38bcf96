//! Pre-scan size and duration estimate.
//!
//! The numbers here are advisory. They feed a human-facing report and the
//! progress display, never a decision.

use crate::classify::Category;
use crate::error::Result;
use crate::plan::{Action, Policy, action_for, ensure_flat};
use mediamig_storage::RemoteEntry;
use std::collections::BTreeMap;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Empirically calibrated throughput figures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimateFactors {
    /// Seconds per MB of RAW input to convert.
    pub dng_seconds_per_mb: f64,
    /// Seconds per MB of other convertible input (PNG, WebP, ...).
    pub png_seconds_per_mb: f64,
    /// Seconds per JPEG copied.
    pub jpeg_copy_seconds: f64,
    /// Seconds per video copied.
    pub video_copy_seconds: f64,
    /// Extra fraction added on top of the sum, e.g. `0.05` for 5%.
    pub overhead_ratio: f64,
}
impl Default for EstimateFactors {
    fn default() -> Self {
        Self {
            dng_seconds_per_mb: 0.20,
            png_seconds_per_mb: 1.50,
            jpeg_copy_seconds: 0.05,
            video_copy_seconds: 0.30,
            overhead_ratio: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Totals {
    pub files: usize,
    pub bytes: u64,
}
impl Totals {
    fn add(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }

    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }
}

/// Estimated seconds per kind of work, before overhead.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Breakdown {
    pub raw: f64,
    pub other: f64,
    pub jpeg: f64,
    pub video: f64,
}
impl Breakdown {
    pub fn sum(&self) -> f64 {
        self.raw + self.other + self.jpeg + self.video
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EstimateReport {
    pub raw: Totals,
    pub jpeg: Totals,
    pub video: Totals,
    /// Other files that will be converted.
    pub other: Totals,
    /// Other files that will be skipped.
    pub unsupported: Totals,
    /// File count per lower-cased extension (`""` for none).
    pub extensions: BTreeMap<String, usize>,
    pub total: Totals,
    pub seconds: Breakdown,
    /// [`Breakdown::sum`] plus overhead.
    pub total_seconds: f64,
}

/// Sum up a flat folder listing and estimate how long migrating it takes.
///
/// Returns [`Subfolders`](crate::error::ErrorKind::Subfolders) if the listing
/// contains any folder.
pub fn estimate(entries: &[RemoteEntry], policy: &Policy, factors: &EstimateFactors) -> Result<EstimateReport> {
    ensure_flat(entries)?;
    let mut report = EstimateReport::default();
    for entry in entries {
        let category = Category::from_name(&entry.name);
        let totals = match (category, action_for(category, policy)) {
            (Category::RawImage, _) => &mut report.raw,
            (Category::AlreadyJpeg, _) => &mut report.jpeg,
            (Category::Video, _) => &mut report.video,
            (Category::Other, Action::ConvertToJpeg) => &mut report.other,
            (Category::Other, _) => &mut report.unsupported,
        };
        totals.add(entry.size);
        report.total.add(entry.size);
        *report.extensions.entry(Category::extension(&entry.name).unwrap_or_default()).or_default() += 1;
    }
    report.seconds = Breakdown {
        raw: report.raw.megabytes() * factors.dng_seconds_per_mb,
        other: report.other.megabytes() * factors.png_seconds_per_mb,
        jpeg: report.jpeg.files as f64 * factors.jpeg_copy_seconds,
        video: report.video.files as f64 * factors.video_copy_seconds,
    };
    report.total_seconds = report.seconds.sum() * (1.0 + factors.overhead_ratio);
    Ok(report)
}
