//! Noise estimates and candidate regions.
#![allow(clippy::cast_precision_loss)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Sub-pixel position in the image grid, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelPosition {
    /// Row (y) coordinate.
    pub row: f64,
    /// Column (x) coordinate.
    pub col: f64,
}

impl PixelPosition {
    /// Creates a new pixel position.
    #[inline]
    #[must_use]
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    /// Returns true if the position lies within `margin` pixels of any edge
    /// of a `rows` x `cols` grid.
    #[must_use]
    pub fn is_near_edge(&self, rows: usize, cols: usize, margin: usize) -> bool {
        let margin = margin as f64;
        self.row < margin
            || self.row > rows as f64 - margin
            || self.col < margin
            || self.col > cols as f64 - margin
    }
}

/// Robust noise statistics of a difference image.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoiseEstimate {
    /// Clipped mean.
    pub mean: f64,
    /// Clipped median.
    pub median: f64,
    /// Clipped standard deviation.
    pub deviation: f64,
}

impl NoiseEstimate {
    /// Creates a new noise estimate.
    #[must_use]
    pub fn new(mean: f64, median: f64, deviation: f64) -> Self {
        Self {
            mean,
            median,
            deviation,
        }
    }

    /// Returns true if the deviation can serve as a noise scale.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.deviation.is_finite() && self.deviation > 0.0
    }

    /// Significance threshold for the given multiplier.
    #[must_use]
    pub fn threshold(&self, multiplier: f64) -> f64 {
        self.deviation * multiplier
    }
}

/// A connected region of significant difference pixels.
///
/// The centroid is the unit-weight mass center of every region pixel, while
/// flux and SNR only use pixels with a finite difference value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidateRegion {
    /// Label id in the label map (1-based).
    pub label: u32,
    /// Number of pixels in the region.
    pub area: usize,
    /// Number of region pixels with a finite difference value.
    pub valid_area: usize,
    /// Mass center of all region pixels.
    pub centroid: PixelPosition,
    /// Sum of finite difference values.
    pub flux: f64,
    /// Flux over the expected noise of `valid_area` independent pixels.
    pub snr: f64,
}

impl CandidateRegion {
    /// Builds a region from its accumulated pixel sums.
    ///
    /// `row_sum` and `col_sum` are sums of pixel indices over all `area`
    /// pixels; `deviation` is the per-pixel noise.
    #[must_use]
    pub fn from_sums(
        label: u32,
        area: usize,
        valid_area: usize,
        row_sum: f64,
        col_sum: f64,
        flux: f64,
        deviation: f64,
    ) -> Self {
        let centroid = if area > 0 {
            PixelPosition::new(row_sum / area as f64, col_sum / area as f64)
        } else {
            PixelPosition::new(f64::NAN, f64::NAN)
        };
        let snr = flux / (deviation * (valid_area as f64).sqrt());
        Self {
            label,
            area,
            valid_area,
            centroid,
            flux,
            snr,
        }
    }
}
