//! World Coordinate System (WCS) projection.
//!
//! Pixel positions passed to and returned from this module are 0-based
//! (`x` = column, `y` = row). `crpix` keeps the FITS 1-based convention, so
//! the reference pixel sits at `(crpix.0 - 1, crpix.1 - 1)` in 0-based terms.

/// Mapping from pixel positions to sky coordinates.
pub trait SkyProjection: Send + Sync {
    /// Converts a 0-based pixel position (`x` = column, `y` = row) to
    /// (right ascension, declination) in degrees.
    fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64);

    /// Returns false when the projection cannot place pixels on the sky.
    fn is_valid(&self) -> bool {
        true
    }
}

/// Gnomonic (TAN) world coordinate system.
///
/// 1. Pixel to intermediate: `(xi, eta) = CD x (x - CRPIX1, y - CRPIX2)`
/// 2. Intermediate to sky: de-project from the tangent plane at `CRVAL`
#[derive(Debug, Clone, PartialEq)]
pub struct Wcs {
    /// Reference pixel (CRPIX1, CRPIX2), 1-based.
    pub crpix: (f64, f64),
    /// Reference sky coordinates in degrees (CRVAL1 = RA, CRVAL2 = Dec).
    pub crval: (f64, f64),
    /// Linear transform from pixel offset to intermediate coordinates (degrees).
    /// `[[CD1_1, CD1_2], [CD2_1, CD2_2]]`
    pub cd: [[f64; 2]; 2],
}

impl Wcs {
    /// Creates a new WCS.
    #[must_use]
    pub fn new(crpix: (f64, f64), crval: (f64, f64), cd: [[f64; 2]; 2]) -> Self {
        Self { crpix, crval, cd }
    }

    /// Creates a WCS from a pixel scale (arcsec/pixel) and a position angle
    /// (degrees, North through East).
    #[must_use]
    pub fn from_scale_rotation(
        crpix: (f64, f64),
        crval: (f64, f64),
        pixel_scale: f64,
        rotation: f64,
    ) -> Self {
        let scale_deg = pixel_scale / 3600.0;
        let (sin_r, cos_r) = rotation.to_radians().sin_cos();
        let cd = [
            [-scale_deg * cos_r, scale_deg * sin_r],
            [scale_deg * sin_r, scale_deg * cos_r],
        ];
        Self::new(crpix, crval, cd)
    }

    /// Determinant of the CD matrix.
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0]
    }

    /// Returns true if every parameter is finite and the CD matrix is invertible.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let finite = [self.crpix.0, self.crpix.1, self.crval.0, self.crval.1]
            .iter()
            .chain(self.cd.iter().flatten())
            .all(|v| v.is_finite());
        finite && self.determinant().abs() > 1e-20
    }

    /// Average pixel scale in arcseconds per pixel.
    #[must_use]
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let scale_x = (self.cd[0][0].powi(2) + self.cd[1][0].powi(2)).sqrt();
        let scale_y = (self.cd[0][1].powi(2) + self.cd[1][1].powi(2)).sqrt();
        (scale_x + scale_y) / 2.0 * 3600.0
    }

    /// Converts a 0-based pixel position to (RA, Dec) in degrees.
    #[must_use]
    pub fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x + 1.0 - self.crpix.0;
        let dy = y + 1.0 - self.crpix.1;

        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();

        let ra0 = self.crval.0.to_radians();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();

        let denom = cos_dec0 - eta * sin_dec0;
        let ra = ra0 + xi.atan2(denom);
        let dec = (sin_dec0 + eta * cos_dec0).atan2(xi.hypot(denom));

        (ra.to_degrees().rem_euclid(360.0), dec.to_degrees())
    }

    /// Converts (RA, Dec) in degrees to a 0-based pixel position.
    ///
    /// Returns `None` for points on the far hemisphere or a singular CD matrix.
    #[must_use]
    pub fn sky_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        let (sin_dec, cos_dec) = dec.to_radians().sin_cos();
        let (sin_dec0, cos_dec0) = self.crval.1.to_radians().sin_cos();
        let (sin_dra, cos_dra) = (ra - self.crval.0).to_radians().sin_cos();

        let d = sin_dec * sin_dec0 + cos_dec * cos_dec0 * cos_dra;
        if d <= 0.0 {
            return None;
        }

        let xi = (cos_dec * sin_dra / d).to_degrees();
        let eta = ((sin_dec * cos_dec0 - cos_dec * sin_dec0 * cos_dra) / d).to_degrees();

        let det = self.determinant();
        if det.abs() <= 1e-20 {
            return None;
        }
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;

        Some((self.crpix.0 - 1.0 + dx, self.crpix.1 - 1.0 + dy))
    }
}

impl SkyProjection for Wcs {
    fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        Wcs::pixel_to_sky(self, x, y)
    }

    fn is_valid(&self) -> bool {
        Wcs::is_valid(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_wcs() -> Wcs {
        Wcs::from_scale_rotation((1024.5, 1536.5), (280.25, 42.5), 1.01, 12.0)
    }

    #[test]
    fn test_reference_pixel_maps_to_crval() {
        let wcs = sample_wcs();
        let (ra, dec) = wcs.pixel_to_sky(1023.5, 1535.5);
        assert_abs_diff_eq!(ra, 280.25, epsilon = 1e-10);
        assert_abs_diff_eq!(dec, 42.5, epsilon = 1e-10);
    }

    #[test]
    fn test_sky_to_pixel_inverts_pixel_to_sky() {
        let wcs = sample_wcs();
        for &(x, y) in &[(0.0, 0.0), (100.25, 2000.5), (2047.0, 3071.0)] {
            let (ra, dec) = wcs.pixel_to_sky(x, y);
            let (px, py) = wcs.sky_to_pixel(ra, dec).unwrap();
            assert_abs_diff_eq!(px, x, epsilon = 1e-6);
            assert_abs_diff_eq!(py, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_ra_wraps_into_range() {
        let wcs = Wcs::from_scale_rotation((1.0, 1.0), (0.0, 0.0), 3600.0, 0.0);
        // RA grows towards -x, so one pixel to the right lands just below 360.
        let (ra, dec) = wcs.pixel_to_sky(1.0, 0.0);
        assert!(ra > 358.0 && ra < 360.0, "ra = {ra}");
        assert_abs_diff_eq!(dec, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pixel_scale_and_validity() {
        let wcs = sample_wcs();
        assert_abs_diff_eq!(wcs.pixel_scale_arcsec(), 1.01, epsilon = 1e-9);
        assert!(wcs.is_valid());

        let singular = Wcs::new((1.0, 1.0), (0.0, 0.0), [[0.0, 0.0], [0.0, 0.0]]);
        assert!(!singular.is_valid());
        assert!(singular.sky_to_pixel(0.0, 0.0).is_none());
    }
}
