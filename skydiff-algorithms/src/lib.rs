//! skydiff-algorithms: Difference imaging and transient detection.
//!
//! This crate provides the detection pipeline stages:
//! - **Difference** - science minus reference, validity and significance masks
//! - **Statistics** - sigma-clipped noise estimation
//! - **Labeling** - two-pass union-find connected components
//! - **Filters** - per-region rejection rules
//! - **Detector** - the end-to-end pipeline, sequential or parallel
//!
#![warn(missing_docs)]

mod detector;
mod difference;
mod filter;
mod labeling;
mod measure;
mod processing;
pub mod statistics;

pub use detector::{detect, DetectionReport, Detector};
pub use difference::{check_shapes, difference_image, finite_values, significance_mask};
pub use filter::{
    Border, FiniteFlux, FiniteSnr, FilterPipeline, MinArea, MinSnr, MinValidArea, RegionFilter,
};
pub use labeling::{label_regions, LabelMap, RegionBounds};
pub use measure::measure_region;
pub use processing::{detect_batch, detect_batch_with, BatchReport, FrameFailure, ScienceFrame};
pub use statistics::sigma_clipped_stats;

// Re-export core detection types
pub use skydiff_core::detection::{DetectionConfig, DetectionStatistics, DetectionStatus};
