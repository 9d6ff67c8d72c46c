//! Detection configuration and run statistics.

use crate::error::{Error, Result, SkipReason};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pixel neighbourhood used when grouping significant pixels into regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// Orthogonal neighbours only.
    #[default]
    Four,
    /// Orthogonal and diagonal neighbours.
    Eight,
}

/// Central value used as the clipping reference in sigma clipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ClipCenter {
    /// Clip around the median.
    #[default]
    Median,
    /// Clip around the mean.
    Mean,
}

/// Parameters of the sigma-clipped noise estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SigmaClipConfig {
    /// Values farther than `sigma` standard deviations from the center are rejected.
    pub sigma: f64,
    /// Upper bound on clipping passes.
    pub max_iterations: usize,
    /// Clipping center.
    pub center: ClipCenter,
}

impl Default for SigmaClipConfig {
    fn default() -> Self {
        Self {
            sigma: 3.0,
            max_iterations: 5,
            center: ClipCenter::Median,
        }
    }
}

impl SigmaClipConfig {
    /// Validates the clipping parameters.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for a non-positive `sigma` or zero
    /// `max_iterations`.
    pub fn validate(&self) -> Result<()> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(Error::ConfigError(format!(
                "sigma_clip.sigma must be positive, got {}",
                self.sigma
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::ConfigError(
                "sigma_clip.max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for transient detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionConfig {
    /// Significance threshold in units of the noise deviation.
    pub threshold_multiplier: f64,
    /// Minimum region area, applied to both raw and valid pixel counts.
    pub min_area: usize,
    /// Minimum signal-to-noise ratio.
    pub min_snr: f64,
    /// Width (pixels) of the edge margin in which centroids are rejected.
    pub border_size: usize,
    /// Region labeling neighbourhood.
    pub connectivity: Connectivity,
    /// Noise estimate parameters.
    pub sigma_clip: SigmaClipConfig,
    /// Fixed noise deviation used instead of the estimated one.
    pub noise_override: Option<f64>,
    /// Evaluate regions on the rayon thread pool.
    pub parallel: bool,
    /// Hand the difference image back in the detection report.
    pub keep_difference: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold_multiplier: 5.0,
            min_area: 10,
            min_snr: 10.0,
            border_size: 100,
            connectivity: Connectivity::Four,
            sigma_clip: SigmaClipConfig::default(),
            noise_override: None,
            parallel: false,
            keep_difference: false,
        }
    }
}

impl DetectionConfig {
    /// Creates a new detection configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the threshold multiplier.
    #[must_use]
    pub fn with_threshold_multiplier(mut self, multiplier: f64) -> Self {
        self.threshold_multiplier = multiplier;
        self
    }

    /// Sets the minimum region area.
    #[must_use]
    pub fn with_min_area(mut self, min_area: usize) -> Self {
        self.min_area = min_area;
        self
    }

    /// Sets the minimum SNR.
    #[must_use]
    pub fn with_min_snr(mut self, min_snr: f64) -> Self {
        self.min_snr = min_snr;
        self
    }

    /// Sets the border margin.
    #[must_use]
    pub fn with_border_size(mut self, border_size: usize) -> Self {
        self.border_size = border_size;
        self
    }

    /// Sets the labeling connectivity.
    #[must_use]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Sets the sigma clipping parameters.
    #[must_use]
    pub fn with_sigma_clip(mut self, sigma_clip: SigmaClipConfig) -> Self {
        self.sigma_clip = sigma_clip;
        self
    }

    /// Uses a fixed noise deviation instead of estimating it.
    #[must_use]
    pub fn with_noise_override(mut self, deviation: f64) -> Self {
        self.noise_override = Some(deviation);
        self
    }

    /// Sets whether regions are evaluated in parallel.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets whether the difference image is returned in the report.
    #[must_use]
    pub fn with_keep_difference(mut self, keep: bool) -> Self {
        self.keep_difference = keep;
        self
    }

    /// Checks that every numeric parameter is usable.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold_multiplier.is_finite() || self.threshold_multiplier < 0.0 {
            return Err(Error::ConfigError(format!(
                "threshold_multiplier must be finite and non-negative, got {}",
                self.threshold_multiplier
            )));
        }
        if !self.min_snr.is_finite() {
            return Err(Error::ConfigError(format!(
                "min_snr must be finite, got {}",
                self.min_snr
            )));
        }
        self.sigma_clip.validate()?;
        if let Some(deviation) = self.noise_override {
            if !deviation.is_finite() || deviation <= 0.0 {
                return Err(Error::ConfigError(format!(
                    "noise_override must be positive, got {deviation}"
                )));
            }
        }
        Ok(())
    }
}

/// How a detection call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DetectionStatus {
    /// Regions were labeled and filtered.
    #[default]
    Completed,
    /// The difference image had no finite pixel.
    AllPixelsInvalid,
    /// The noise deviation was zero or not finite.
    DegenerateNoise,
}

/// Per-reason counts of discarded regions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkipCounts {
    pub below_min_area: usize,
    pub insufficient_valid_area: usize,
    pub invalid_flux: usize,
    pub invalid_snr: usize,
    pub below_min_snr: usize,
    pub border_artifact: usize,
}

impl SkipCounts {
    /// Counts one discarded region.
    pub fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::BelowMinArea { .. } => self.below_min_area += 1,
            SkipReason::InsufficientValidArea { .. } => self.insufficient_valid_area += 1,
            SkipReason::InvalidFlux(_) => self.invalid_flux += 1,
            SkipReason::InvalidSnr(_) => self.invalid_snr += 1,
            SkipReason::BelowMinSnr { .. } => self.below_min_snr += 1,
            SkipReason::BorderArtifact { .. } => self.border_artifact += 1,
        }
    }

    /// Total number of discarded regions.
    #[must_use]
    pub fn total(&self) -> usize {
        self.below_min_area
            + self.insufficient_valid_area
            + self.invalid_flux
            + self.invalid_snr
            + self.below_min_snr
            + self.border_artifact
    }

    /// Adds another set of counts to this one.
    pub fn merge(&mut self, other: &SkipCounts) {
        self.below_min_area += other.below_min_area;
        self.insufficient_valid_area += other.insufficient_valid_area;
        self.invalid_flux += other.invalid_flux;
        self.invalid_snr += other.invalid_snr;
        self.below_min_snr += other.below_min_snr;
        self.border_artifact += other.border_artifact;
    }
}

/// Statistics from detection.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionStatistics {
    /// Number of finite difference pixels.
    pub valid_pixels: usize,
    /// Number of pixels above the significance threshold.
    pub significant_pixels: usize,
    /// Number of labeled regions.
    pub regions_labeled: usize,
    /// Number of events emitted.
    pub events_found: usize,
    /// Discarded regions by reason.
    pub skipped: SkipCounts,
}

impl DetectionStatistics {
    /// Accumulates the statistics of another detection call.
    pub fn merge(&mut self, other: &DetectionStatistics) {
        self.valid_pixels += other.valid_pixels;
        self.significant_pixels += other.significant_pixels;
        self.regions_labeled += other.regions_labeled;
        self.events_found += other.events_found;
        self.skipped.merge(&other.skipped);
    }
}
