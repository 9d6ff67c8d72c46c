//! High-level processing helpers that run detection over many science frames.

use crate::detector::{DetectionReport, Detector};
use log::{info, warn};
use skydiff_core::{sort_by_snr, DetectionStatistics, Event, Image};

/// One science image plus the name it is reported under.
#[derive(Debug, Clone)]
pub struct ScienceFrame {
    /// Source identifier, usually a file path.
    pub source: String,
    /// Pixel data, WCS and metadata.
    pub image: Image,
}

impl ScienceFrame {
    /// Creates a frame.
    pub fn new(source: impl Into<String>, image: Image) -> Self {
        Self {
            source: source.into(),
            image,
        }
    }
}

/// A frame that could not be loaded or processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFailure {
    /// Source identifier of the failed frame.
    pub source: String,
    /// Human-readable error.
    pub message: String,
}

impl FrameFailure {
    /// Creates a failure record.
    pub fn new(source: impl Into<String>, message: impl ToString) -> Self {
        Self {
            source: source.into(),
            message: message.to_string(),
        }
    }
}

/// Aggregated outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// All events, ordered by descending SNR across frames.
    pub events: Vec<Event>,
    /// Frames that completed detection.
    pub frames_processed: usize,
    /// Frames that failed, in input order.
    pub failures: Vec<FrameFailure>,
    /// Counts summed over processed frames.
    pub statistics: DetectionStatistics,
}

/// Runs detection on every frame against one reference image.
///
/// Events are tagged with the frame's filter and source. A frame that fails
/// to load or to process is recorded and the batch continues.
pub fn detect_batch<I>(detector: &Detector, reference: &Image, frames: I) -> BatchReport
where
    I: IntoIterator<Item = Result<ScienceFrame, FrameFailure>>,
{
    detect_batch_with(detector, reference, frames, |_, _| {})
}

/// Same as [`detect_batch`], calling `inspect` with each frame's full report.
pub fn detect_batch_with<I, F>(
    detector: &Detector,
    reference: &Image,
    frames: I,
    mut inspect: F,
) -> BatchReport
where
    I: IntoIterator<Item = Result<ScienceFrame, FrameFailure>>,
    F: FnMut(&ScienceFrame, &DetectionReport),
{
    let mut batch = BatchReport::default();

    for frame in frames {
        let frame = match frame {
            Ok(frame) => frame,
            Err(failure) => {
                warn!("Failed to load {}: {}", failure.source, failure.message);
                batch.failures.push(failure);
                continue;
            }
        };

        match detector.detect_with_report(reference, &frame.image) {
            Ok(report) => {
                inspect(&frame, &report);
                info!("{}: {} events", frame.source, report.events.len());
                batch.frames_processed += 1;
                batch.statistics.merge(&report.statistics);
                let filter = frame.image.metadata.filter.clone();
                batch.events.extend(
                    report
                        .events
                        .into_iter()
                        .map(|event| event.with_tags(filter.clone(), Some(frame.source.clone()))),
                );
            }
            Err(err) => {
                warn!("Failed to process {}: {err}", frame.source);
                batch.failures.push(FrameFailure::new(frame.source, err));
            }
        }
    }

    sort_by_snr(&mut batch.events);
    batch
}
