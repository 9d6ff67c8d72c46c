//! Difference image construction and thresholding.

use ndarray::{Array2, ArrayView2, Zip};
use skydiff_core::{Error, Result};

/// Checks that both images are non-empty and share a shape.
///
/// # Errors
/// Returns [`Error::EmptyImage`] or [`Error::ShapeMismatch`].
pub fn check_shapes(reference: &ArrayView2<f64>, science: &ArrayView2<f64>) -> Result<()> {
    if reference.is_empty() || science.is_empty() {
        return Err(Error::EmptyImage);
    }
    if reference.dim() != science.dim() {
        return Err(Error::ShapeMismatch {
            reference: reference.dim(),
            science: science.dim(),
        });
    }
    Ok(())
}

/// Computes `science - reference` pixel by pixel.
///
/// Non-finite pixels in either input stay non-finite in the result.
///
/// # Errors
/// Returns a structural error when the shapes differ or are empty.
pub fn difference_image(
    reference: &ArrayView2<f64>,
    science: &ArrayView2<f64>,
) -> Result<Array2<f64>> {
    check_shapes(reference, science)?;
    Ok(Zip::from(science)
        .and(reference)
        .map_collect(|&sci, &base| sci - base))
}

/// Collects the finite values of an image.
#[must_use]
pub fn finite_values(image: &ArrayView2<f64>) -> Vec<f64> {
    image.iter().copied().filter(|v| v.is_finite()).collect()
}

/// Marks pixels whose magnitude exceeds `threshold`, in either direction.
#[must_use]
pub fn significance_mask(difference: &ArrayView2<f64>, threshold: f64) -> Array2<bool> {
    difference.mapv(|d| d > threshold || d < -threshold)
}
