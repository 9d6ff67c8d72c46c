//! Transient detector.
//!
//! Difference image, robust noise estimate, significance mask, region
//! labeling, per-region filtering and ranking by SNR.

use crate::difference::{check_shapes, difference_image, finite_values, significance_mask};
use crate::filter::FilterPipeline;
use crate::labeling::{label_regions, RegionBounds};
use crate::measure::measure_region;
use crate::statistics::sigma_clipped_stats;
use log::{debug, info, trace, warn};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use skydiff_core::{
    sort_by_snr, DetectionConfig, DetectionStatistics, DetectionStatus, Error, Event, Image,
    NoiseEstimate, Result, SkipReason, SkyProjection,
};

/// Outcome of one detection call.
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    /// Events ordered by descending SNR.
    pub events: Vec<Event>,
    /// How the call ended.
    pub status: DetectionStatus,
    /// Noise estimate used for thresholding.
    pub noise: Option<NoiseEstimate>,
    /// Absolute significance threshold.
    pub threshold: Option<f64>,
    /// Pixel, region and skip counts.
    pub statistics: DetectionStatistics,
    /// Difference image, when requested in the configuration.
    pub difference: Option<Array2<f64>>,
}

/// Transient detector over pairs of aligned images.
#[derive(Debug, Clone, Default)]
pub struct Detector {
    config: DetectionConfig,
}

impl Detector {
    /// Creates a detector after validating the configuration.
    ///
    /// # Errors
    /// Returns a configuration error for unusable parameters.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Detects transients in `science` relative to `reference`.
    ///
    /// # Errors
    /// Fails on mismatched or empty images, or when `science` has no usable
    /// coordinate transform. Per-region problems never fail the call.
    pub fn detect(&self, reference: &Image, science: &Image) -> Result<Vec<Event>> {
        self.detect_with_report(reference, science)
            .map(|report| report.events)
    }

    /// Same as [`Detector::detect`], returning the full report.
    ///
    /// # Errors
    /// See [`Detector::detect`].
    pub fn detect_with_report(&self, reference: &Image, science: &Image) -> Result<DetectionReport> {
        let reference_view = reference.data.view();
        let science_view = science.data.view();
        check_shapes(&reference_view, &science_view)?;
        let wcs = science.require_wcs()?;
        self.detect_arrays(&reference_view, &science_view, wcs)
    }

    /// Runs detection on raw arrays with any sky projection.
    ///
    /// # Errors
    /// Fails on mismatched or empty arrays, and with
    /// [`Error::MissingTransform`] when the projection is not usable.
    pub fn detect_arrays<P>(
        &self,
        reference: &ArrayView2<f64>,
        science: &ArrayView2<f64>,
        projection: &P,
    ) -> Result<DetectionReport>
    where
        P: SkyProjection + ?Sized,
    {
        let config = &self.config;
        let difference = difference_image(reference, science)?;
        if !projection.is_valid() {
            return Err(Error::MissingTransform);
        }
        let mut report = DetectionReport::default();

        let estimate = {
            let finite = finite_values(&difference.view());
            report.statistics.valid_pixels = finite.len();
            sigma_clipped_stats(&finite, &config.sigma_clip)
        };
        let Some(estimate) = estimate else {
            warn!("All pixels are invalid in the difference image");
            report.status = DetectionStatus::AllPixelsInvalid;
            return Ok(self.finish(report, difference));
        };

        let noise = match config.noise_override {
            Some(deviation) => NoiseEstimate::new(estimate.mean, estimate.median, deviation),
            None => estimate,
        };
        report.noise = Some(noise);
        info!(
            "Mean: {}, Median: {}, Deviation: {}",
            noise.mean, noise.median, noise.deviation
        );

        if !noise.is_usable() {
            warn!(
                "Noise deviation {} is degenerate, no region can be scored",
                noise.deviation
            );
            report.status = DetectionStatus::DegenerateNoise;
            return Ok(self.finish(report, difference));
        }

        let threshold = noise.threshold(config.threshold_multiplier);
        report.threshold = Some(threshold);
        info!("Threshold: {threshold}");

        let label_map = {
            let mask = significance_mask(&difference.view(), threshold);
            report.statistics.significant_pixels = mask.iter().filter(|&&m| m).count();
            label_regions(&mask.view(), config.connectivity)
        };
        report.statistics.regions_labeled = label_map.len();

        let pipeline = FilterPipeline::standard(config, difference.dim());
        let difference_view = difference.view();
        let labels_view = label_map.labels.view();
        let evaluate = |bounds: &RegionBounds| -> std::result::Result<Event, SkipReason> {
            let region = measure_region(&difference_view, &labels_view, bounds, noise.deviation);
            pipeline.evaluate(&region)?;
            let (ra, dec) = projection.pixel_to_sky(region.centroid.col, region.centroid.row);
            Ok(Event::from_region(&region, ra, dec))
        };

        let outcomes: Vec<_> = if config.parallel {
            label_map.regions.par_iter().map(evaluate).collect()
        } else {
            label_map.regions.iter().map(evaluate).collect()
        };

        for (bounds, outcome) in label_map.regions.iter().zip(outcomes) {
            match outcome {
                Ok(event) => {
                    debug!(
                        "Event found at ({:.2}, {:.2}) with flux {} and SNR {}",
                        event.centroid.row, event.centroid.col, event.flux, event.snr
                    );
                    report.events.push(event);
                }
                Err(reason) => {
                    if matches!(reason, SkipReason::BorderArtifact { .. }) {
                        trace!("Skipping region {}: {reason}", bounds.label);
                    } else {
                        debug!("Skipping region {}: {reason}", bounds.label);
                    }
                    report.statistics.skipped.record(&reason);
                }
            }
        }

        sort_by_snr(&mut report.events);
        report.statistics.events_found = report.events.len();
        info!("Found {} events", report.events.len());

        Ok(self.finish(report, difference))
    }

    fn finish(&self, mut report: DetectionReport, difference: Array2<f64>) -> DetectionReport {
        if self.config.keep_difference {
            report.difference = Some(difference);
        }
        report
    }
}

/// Detects transients with the given configuration.
///
/// # Errors
/// Fails on an invalid configuration or a structural input problem.
pub fn detect(reference: &Image, science: &Image, config: &DetectionConfig) -> Result<Vec<Event>> {
    Detector::new(config.clone())?.detect(reference, science)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use skydiff_core::Wcs;

    fn wcs() -> Wcs {
        Wcs::from_scale_rotation((100.5, 100.5), (150.0, 2.0), 1.0, 0.0)
    }

    fn block_scene(size: usize, row: usize, col: usize, half: usize, value: f64) -> (Image, Image) {
        let reference = Array2::<f64>::zeros((size, size));
        let mut science = reference.clone();
        for r in row - half..=row + half {
            for c in col - half..=col + half {
                science[[r, c]] = value;
            }
        }
        (
            Image::new(reference).with_wcs(wcs()),
            Image::new(science).with_wcs(wcs()),
        )
    }

    #[test]
    fn test_block_with_preset_noise() {
        let (reference, science) = block_scene(200, 100, 100, 2, 1000.0);
        let detector = Detector::new(DetectionConfig::new().with_noise_override(1.0)).unwrap();

        let report = detector.detect_with_report(&reference, &science).unwrap();
        assert_eq!(report.status, DetectionStatus::Completed);
        assert_eq!(report.events.len(), 1);

        let event = &report.events[0];
        assert_eq!(event.area, 25);
        assert!((event.flux - 25_000.0).abs() < 1e-9);
        assert!((event.snr - 5000.0).abs() < 1e-9);
        assert!((event.centroid.row - 100.0).abs() < 1e-12);
        assert!((event.centroid.col - 100.0).abs() < 1e-12);
        assert!(report.difference.is_none());
    }

    #[test]
    fn test_zero_noise_is_degenerate() {
        let (reference, science) = block_scene(200, 100, 100, 2, 1000.0);
        let detector = Detector::default();

        let report = detector.detect_with_report(&reference, &science).unwrap();
        assert_eq!(report.status, DetectionStatus::DegenerateNoise);
        assert!(report.events.is_empty());
    }

    #[test]
    fn test_all_nan_difference() {
        let reference = Image::new(Array2::from_elem((20, 20), f64::NAN)).with_wcs(wcs());
        let science = Image::new(Array2::zeros((20, 20))).with_wcs(wcs());
        let detector = Detector::new(DetectionConfig::new().with_keep_difference(true)).unwrap();

        let report = detector.detect_with_report(&reference, &science).unwrap();
        assert_eq!(report.status, DetectionStatus::AllPixelsInvalid);
        assert!(report.events.is_empty());
        assert!(report.noise.is_none());
        assert_eq!(report.statistics.valid_pixels, 0);
        assert!(report.difference.is_some());
    }

    #[test]
    fn test_structural_errors() {
        let detector = Detector::default();
        let reference = Image::new(Array2::zeros((10, 10))).with_wcs(wcs());
        let science = Image::new(Array2::zeros((10, 11))).with_wcs(wcs());
        assert!(matches!(
            detector.detect(&reference, &science),
            Err(Error::ShapeMismatch { .. })
        ));

        let science = Image::new(Array2::zeros((10, 10)));
        assert_eq!(
            detector.detect(&reference, &science),
            Err(Error::MissingTransform)
        );

        let empty = Image::new(Array2::zeros((0, 0))).with_wcs(wcs());
        assert_eq!(detector.detect(&empty, &empty), Err(Error::EmptyImage));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DetectionConfig::new().with_threshold_multiplier(-2.0);
        assert!(matches!(Detector::new(config), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_detect_arrays_uses_projection() {
        struct Identity;
        impl SkyProjection for Identity {
            fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
                (x, y)
            }
        }

        let (reference, science) = block_scene(60, 30, 20, 2, 50.0);
        let detector = Detector::new(
            DetectionConfig::new()
                .with_noise_override(1.0)
                .with_border_size(5),
        )
        .unwrap();

        let report = detector
            .detect_arrays(&reference.data.view(), &science.data.view(), &Identity)
            .unwrap();
        assert_eq!(report.events.len(), 1);
        assert!((report.events[0].ra - 20.0).abs() < 1e-12);
        assert!((report.events[0].dec - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_detect_arrays_rejects_singular_wcs() {
        let (reference, science) = block_scene(200, 100, 100, 2, 1000.0);
        let detector = Detector::new(DetectionConfig::new().with_noise_override(1.0)).unwrap();
        let singular = Wcs::from_scale_rotation((100.5, 100.5), (150.0, 2.0), 0.0, 0.0);
        assert!(!singular.is_valid());

        let result = detector.detect_arrays(&reference.data.view(), &science.data.view(), &singular);
        assert!(matches!(result, Err(Error::MissingTransform)));

        let science = Image::new(science.data).with_wcs(singular);
        assert_eq!(
            detector.detect(&reference, &science),
            Err(Error::MissingTransform)
        );
    }
}
