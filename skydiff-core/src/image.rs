//! Image type: pixel grid, coordinate transform and observation metadata.

use crate::error::{Error, Result};
use crate::wcs::Wcs;
use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Observation metadata carried alongside the pixels.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageMetadata {
    /// Exposure time in seconds.
    pub exposure_time: Option<f64>,
    /// Filter identifier (e.g. `ZTF_r`).
    pub filter: Option<String>,
    /// Observation timestamp as written in the file (`DATE-OBS`).
    pub date_obs: Option<String>,
    /// Physical unit of the pixel values.
    pub unit: Option<String>,
}

/// A 2-D image indexed `[row, column]`.
#[derive(Debug, Clone)]
pub struct Image {
    /// Pixel values; NaN marks pixels without coverage.
    pub data: Array2<f64>,
    /// Pixel to sky transform, if known.
    pub wcs: Option<Wcs>,
    /// Observation metadata.
    pub metadata: ImageMetadata,
}

impl Image {
    /// Creates an image without coordinate transform or metadata.
    #[must_use]
    pub fn new(data: Array2<f64>) -> Self {
        Self {
            data,
            wcs: None,
            metadata: ImageMetadata::default(),
        }
    }

    /// Attaches a coordinate transform.
    #[must_use]
    pub fn with_wcs(mut self, wcs: Wcs) -> Self {
        self.wcs = Some(wcs);
        self
    }

    /// Attaches metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ImageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Returns true if the image has no pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of non-finite pixels.
    #[must_use]
    pub fn non_finite_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_finite()).count()
    }

    /// Returns the coordinate transform or [`Error::MissingTransform`].
    ///
    /// # Errors
    /// Fails when no transform is attached or the attached one is singular.
    pub fn require_wcs(&self) -> Result<&Wcs> {
        match &self.wcs {
            Some(wcs) if wcs.is_valid() => Ok(wcs),
            _ => Err(Error::MissingTransform),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_shape_and_counts() {
        let mut data = Array2::<f64>::zeros((3, 4));
        data[[1, 2]] = f64::NAN;
        data[[2, 3]] = f64::INFINITY;
        let image = Image::new(data);

        assert_eq!(image.shape(), (3, 4));
        assert!(!image.is_empty());
        assert_eq!(image.non_finite_count(), 2);
    }

    #[test]
    fn test_require_wcs() {
        let image = Image::new(Array2::zeros((2, 2)));
        assert_eq!(image.require_wcs(), Err(Error::MissingTransform));

        let wcs = Wcs::from_scale_rotation((1.0, 1.0), (10.0, 20.0), 1.0, 0.0);
        let image = image.with_wcs(wcs.clone());
        assert_eq!(image.require_wcs(), Ok(&wcs));
    }

    #[test]
    fn test_metadata_attached() {
        let metadata = ImageMetadata {
            exposure_time: Some(30.0),
            filter: Some("ZTF_r".to_string()),
            ..ImageMetadata::default()
        };
        let image = Image::new(Array2::zeros((1, 1))).with_metadata(metadata);
        assert_eq!(image.metadata.filter.as_deref(), Some("ZTF_r"));
        assert!(image.metadata.unit.is_none());
    }
}
