//! Region filter pipeline.
//!
//! Each stage inspects a [`CandidateRegion`] and either lets it through or
//! names the reason it is discarded. Stages run in order and the first
//! rejection wins.

use skydiff_core::{CandidateRegion, DetectionConfig, SkipReason};

/// A single predicate over candidate regions.
pub trait RegionFilter: Send + Sync {
    /// Stage name, used in logs.
    fn name(&self) -> &'static str;

    /// Checks one region.
    ///
    /// # Errors
    /// Returns the [`SkipReason`] when the region must be discarded.
    fn check(&self, region: &CandidateRegion) -> Result<(), SkipReason>;
}

/// Rejects regions with too few pixels.
#[derive(Debug, Clone, Copy)]
pub struct MinArea {
    /// Smallest accepted pixel count.
    pub min_area: usize,
}

impl RegionFilter for MinArea {
    fn name(&self) -> &'static str {
        "MinArea"
    }

    fn check(&self, region: &CandidateRegion) -> Result<(), SkipReason> {
        if region.area < self.min_area {
            return Err(SkipReason::BelowMinArea {
                area: region.area,
                min_area: self.min_area,
            });
        }
        Ok(())
    }
}

/// Rejects regions with too few finite pixels.
#[derive(Debug, Clone, Copy)]
pub struct MinValidArea {
    /// Smallest accepted finite pixel count.
    pub min_area: usize,
}

impl RegionFilter for MinValidArea {
    fn name(&self) -> &'static str {
        "MinValidArea"
    }

    fn check(&self, region: &CandidateRegion) -> Result<(), SkipReason> {
        if region.valid_area < self.min_area {
            return Err(SkipReason::InsufficientValidArea {
                valid_area: region.valid_area,
                min_area: self.min_area,
            });
        }
        Ok(())
    }
}

/// Rejects regions whose flux is not finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiniteFlux;

impl RegionFilter for FiniteFlux {
    fn name(&self) -> &'static str {
        "FiniteFlux"
    }

    fn check(&self, region: &CandidateRegion) -> Result<(), SkipReason> {
        if region.flux.is_finite() {
            Ok(())
        } else {
            Err(SkipReason::InvalidFlux(region.flux))
        }
    }
}

/// Rejects regions whose SNR is not finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiniteSnr;

impl RegionFilter for FiniteSnr {
    fn name(&self) -> &'static str {
        "FiniteSnr"
    }

    fn check(&self, region: &CandidateRegion) -> Result<(), SkipReason> {
        if region.snr.is_finite() {
            Ok(())
        } else {
            Err(SkipReason::InvalidSnr(region.snr))
        }
    }
}

/// Rejects regions below the SNR floor.
#[derive(Debug, Clone, Copy)]
pub struct MinSnr {
    /// Smallest accepted SNR.
    pub min_snr: f64,
}

impl RegionFilter for MinSnr {
    fn name(&self) -> &'static str {
        "MinSnr"
    }

    fn check(&self, region: &CandidateRegion) -> Result<(), SkipReason> {
        if region.snr < self.min_snr {
            return Err(SkipReason::BelowMinSnr {
                snr: region.snr,
                min_snr: self.min_snr,
            });
        }
        Ok(())
    }
}

/// Rejects regions whose centroid falls in the edge margin.
#[derive(Debug, Clone, Copy)]
pub struct Border {
    /// Image rows.
    pub rows: usize,
    /// Image columns.
    pub cols: usize,
    /// Margin width in pixels.
    pub border_size: usize,
}

impl RegionFilter for Border {
    fn name(&self) -> &'static str {
        "Border"
    }

    fn check(&self, region: &CandidateRegion) -> Result<(), SkipReason> {
        let centroid = region.centroid;
        if centroid.is_near_edge(self.rows, self.cols, self.border_size) {
            return Err(SkipReason::BorderArtifact {
                row: centroid.row,
                col: centroid.col,
            });
        }
        Ok(())
    }
}

/// Ordered list of filter stages.
pub struct FilterPipeline {
    stages: Vec<Box<dyn RegionFilter>>,
}

impl FilterPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage<F: RegionFilter + 'static>(mut self, stage: F) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Standard detection pipeline for an image of `shape` (rows, cols):
    /// area, valid area, flux, SNR validity, SNR floor, border.
    #[must_use]
    pub fn standard(config: &DetectionConfig, shape: (usize, usize)) -> Self {
        Self::new()
            .with_stage(MinArea {
                min_area: config.min_area,
            })
            .with_stage(MinValidArea {
                min_area: config.min_area,
            })
            .with_stage(FiniteFlux)
            .with_stage(FiniteSnr)
            .with_stage(MinSnr {
                min_snr: config.min_snr,
            })
            .with_stage(Border {
                rows: shape.0,
                cols: shape.1,
                border_size: config.border_size,
            })
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage in order, stopping at the first rejection.
    ///
    /// # Errors
    /// Returns the first stage's [`SkipReason`].
    pub fn evaluate(&self, region: &CandidateRegion) -> Result<(), SkipReason> {
        self.stages.iter().try_for_each(|stage| stage.check(region))
    }
}

impl Default for FilterPipeline {
    fn default() -> Self {
        Self::new()
    }
}
