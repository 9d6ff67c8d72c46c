//! Per-region photometry and geometry.
#![allow(clippy::cast_precision_loss)]

use crate::labeling::RegionBounds;
use ndarray::ArrayView2;
use skydiff_core::CandidateRegion;

/// Measures one labeled region of the difference image.
///
/// Scans the region's bounding box in raster order, so repeated calls give
/// bit-identical sums regardless of which thread runs them. The centroid
/// uses every pixel carrying the label; flux only the finite ones.
#[must_use]
pub fn measure_region(
    difference: &ArrayView2<f64>,
    labels: &ArrayView2<u32>,
    bounds: &RegionBounds,
    deviation: f64,
) -> CandidateRegion {
    let mut area = 0usize;
    let mut valid_area = 0usize;
    let mut row_sum = 0.0;
    let mut col_sum = 0.0;
    let mut flux = 0.0;

    for row in bounds.row_min..=bounds.row_max {
        for col in bounds.col_min..=bounds.col_max {
            if labels[[row, col]] != bounds.label {
                continue;
            }
            area += 1;
            row_sum += row as f64;
            col_sum += col as f64;

            let value = difference[[row, col]];
            if value.is_finite() {
                valid_area += 1;
                flux += value;
            }
        }
    }

    CandidateRegion::from_sums(
        bounds.label,
        area,
        valid_area,
        row_sum,
        col_sum,
        flux,
        deviation,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labeling::label_regions;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};
    use skydiff_core::Connectivity;

    #[test]
    fn test_measure_block() {
        let mut diff = Array2::<f64>::zeros((10, 10));
        for row in 3..6 {
            for col in 4..8 {
                diff[[row, col]] = 2.0;
            }
        }
        let mask = diff.mapv(|v| v > 1.0);
        let map = label_regions(&mask.view(), Connectivity::Four);
        assert_eq!(map.len(), 1);

        let region = measure_region(&diff.view(), &map.labels.view(), &map.regions[0], 0.5);
        assert_eq!(region.area, 12);
        assert_eq!(region.valid_area, 12);
        assert_abs_diff_eq!(region.centroid.row, 4.0);
        assert_abs_diff_eq!(region.centroid.col, 5.5);
        assert_abs_diff_eq!(region.flux, 24.0);
        assert_abs_diff_eq!(region.snr, 24.0 / (0.5 * 12f64.sqrt()), epsilon = 1e-12);
    }

    #[test]
    fn test_centroid_counts_non_finite_pixels_flux_does_not() {
        // The label map may include pixels whose difference is not finite;
        // they still pull the centroid but add nothing to flux or valid area.
        let diff = array![[4.0, 4.0, f64::NAN, 0.0]];
        let labels = array![[1u32, 1, 1, 0]];
        let bounds = RegionBounds {
            label: 1,
            area: 3,
            row_min: 0,
            row_max: 0,
            col_min: 0,
            col_max: 2,
        };

        let region = measure_region(&diff.view(), &labels.view(), &bounds, 1.0);
        assert_eq!(region.area, 3);
        assert_eq!(region.valid_area, 2);
        assert_abs_diff_eq!(region.centroid.col, 1.0);
        assert_abs_diff_eq!(region.flux, 8.0);
        assert_abs_diff_eq!(region.snr, 8.0 / 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_bounding_box_ignores_other_labels() {
        let diff = array![[1.0, 9.0], [1.0, 1.0]];
        let labels = array![[1u32, 2], [1, 1]];
        let bounds = RegionBounds {
            label: 1,
            area: 3,
            row_min: 0,
            row_max: 1,
            col_min: 0,
            col_max: 1,
        };
        let region = measure_region(&diff.view(), &labels.view(), &bounds, 1.0);
        assert_eq!(region.area, 3);
        assert_abs_diff_eq!(region.flux, 3.0);
    }
}
