//! Header keyword decoding.
//!
//! Turns the celestial WCS keywords and a handful of observation keywords
//! into [`Wcs`] and [`ImageMetadata`], and writes them back. Keyword access
//! goes through [`HeaderKeys`] so decoding does not depend on cfitsio.

use crate::Result;
use fitsio::hdu::FitsHdu;
use fitsio::FitsFile;
use log::warn;
use skydiff_core::{ImageMetadata, Wcs};

/// Read access to header keywords.
pub trait HeaderKeys {
    /// Numeric value of `key`, integers included.
    fn float(&mut self, key: &str) -> Option<f64>;

    /// String value of `key`, trailing blanks removed.
    fn text(&mut self, key: &str) -> Option<String>;

    /// Returns true if `key` is present.
    fn contains(&mut self, key: &str) -> bool {
        self.float(key).is_some() || self.text(key).is_some()
    }
}

/// Keywords of one HDU of an open FITS file.
pub struct HduKeys<'a> {
    fptr: &'a mut FitsFile,
    hdu: &'a FitsHdu,
}

impl<'a> HduKeys<'a> {
    /// Wraps an HDU of `fptr`.
    pub fn new(fptr: &'a mut FitsFile, hdu: &'a FitsHdu) -> Self {
        Self { fptr, hdu }
    }
}

impl HeaderKeys for HduKeys<'_> {
    fn float(&mut self, key: &str) -> Option<f64> {
        self.hdu.read_key::<f64>(self.fptr, key).ok()
    }

    fn text(&mut self, key: &str) -> Option<String> {
        self.hdu
            .read_key::<String>(self.fptr, key)
            .ok()
            .map(|value| value.trim_end().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Projection {
    Tan,
    /// TAN core with distortion terms (`-TAN-SIP`, `TPV`).
    DistortedTan,
    Other,
}

/// Classifies a `CTYPEn` value such as `RA---TAN` or `DEC--TAN-SIP`.
fn projection(ctype: &str) -> Projection {
    let code = ctype.get(5..8).unwrap_or("");
    let suffix = ctype.get(8..).unwrap_or("").trim_end();
    match (code, suffix) {
        ("TAN", "") => Projection::Tan,
        ("TAN", _) | ("TPV", "") => Projection::DistortedTan,
        _ => Projection::Other,
    }
}

/// Decodes a gnomonic WCS.
///
/// Distorted TAN variants are decoded from their linear part. Returns
/// `None` when the celestial keywords are absent, singular, or describe a
/// projection other than TAN.
pub fn decode_wcs(keys: &mut impl HeaderKeys) -> Option<Wcs> {
    let mut distorted = Vec::new();
    for axis in ["CTYPE1", "CTYPE2"] {
        let Some(ctype) = keys.text(axis) else {
            continue;
        };
        match projection(&ctype) {
            Projection::Tan => {}
            Projection::DistortedTan => distorted.push(ctype),
            Projection::Other => {
                warn!("Unsupported projection {axis} = '{ctype}', ignoring WCS");
                return None;
            }
        }
    }

    let crpix = (keys.float("CRPIX1")?, keys.float("CRPIX2")?);
    let crval = (keys.float("CRVAL1")?, keys.float("CRVAL2")?);
    let cd = cd_matrix(keys)?;
    let wcs = Wcs::new(crpix, crval, cd);
    if !wcs.is_valid() {
        return None;
    }
    if !distorted.is_empty() {
        warn!(
            "Projection {} carries distortion terms, using the linear TAN part only",
            distorted.join(" / ")
        );
    }
    Some(wcs)
}

fn cd_matrix(keys: &mut impl HeaderKeys) -> Option<[[f64; 2]; 2]> {
    let cd_keys = [["CD1_1", "CD1_2"], ["CD2_1", "CD2_2"]];
    if cd_keys.iter().flatten().any(|k| keys.contains(k)) {
        let mut cd = [[0.0; 2]; 2];
        for (i, row) in cd_keys.iter().enumerate() {
            for (j, key) in row.iter().enumerate() {
                cd[i][j] = keys.float(key).unwrap_or(0.0);
            }
        }
        return Some(cd);
    }

    let cdelt = [keys.float("CDELT1")?, keys.float("CDELT2")?];
    let pc_keys = [["PC1_1", "PC1_2"], ["PC2_1", "PC2_2"]];
    if pc_keys.iter().flatten().any(|k| keys.contains(k)) {
        let mut cd = [[0.0; 2]; 2];
        for (i, row) in pc_keys.iter().enumerate() {
            for (j, key) in row.iter().enumerate() {
                let identity = if i == j { 1.0 } else { 0.0 };
                cd[i][j] = cdelt[i] * keys.float(key).unwrap_or(identity);
            }
        }
        return Some(cd);
    }

    let (sin_r, cos_r) = keys
        .float("CROTA2")
        .unwrap_or(0.0)
        .to_radians()
        .sin_cos();
    Some([
        [cdelt[0] * cos_r, -cdelt[1] * sin_r],
        [cdelt[0] * sin_r, cdelt[1] * cos_r],
    ])
}

/// Decodes exposure time, filter, observation date and unit.
pub fn decode_metadata(keys: &mut impl HeaderKeys) -> ImageMetadata {
    ImageMetadata {
        exposure_time: keys.float("EXPTIME"),
        filter: keys.text("FILTER"),
        date_obs: keys.text("DATE-OBS"),
        unit: keys.text("BUNIT"),
    }
}

/// Writes TAN WCS keywords to `hdu`.
///
/// # Errors
/// Returns an error if cfitsio rejects a keyword.
pub fn write_wcs(fptr: &mut FitsFile, hdu: &FitsHdu, wcs: &Wcs) -> Result<()> {
    hdu.write_key(fptr, "CTYPE1", "RA---TAN")?;
    hdu.write_key(fptr, "CTYPE2", "DEC--TAN")?;
    let values = [
        ("CRPIX1", wcs.crpix.0),
        ("CRPIX2", wcs.crpix.1),
        ("CRVAL1", wcs.crval.0),
        ("CRVAL2", wcs.crval.1),
        ("CD1_1", wcs.cd[0][0]),
        ("CD1_2", wcs.cd[0][1]),
        ("CD2_1", wcs.cd[1][0]),
        ("CD2_2", wcs.cd[1][1]),
    ];
    for (key, value) in values {
        hdu.write_key(fptr, key, value)?;
    }
    Ok(())
}

/// Writes the metadata keywords that are set.
///
/// # Errors
/// Returns an error if cfitsio rejects a keyword.
pub fn write_metadata(fptr: &mut FitsFile, hdu: &FitsHdu, metadata: &ImageMetadata) -> Result<()> {
    if let Some(exposure) = metadata.exposure_time.filter(|v| v.is_finite()) {
        hdu.write_key(fptr, "EXPTIME", exposure)?;
    }
    let text_fields = [
        ("FILTER", &metadata.filter),
        ("DATE-OBS", &metadata.date_obs),
        ("BUNIT", &metadata.unit),
    ];
    for (key, value) in text_fields {
        if let Some(value) = value {
            hdu.write_key(fptr, key, value.as_str())?;
        }
    }
    Ok(())
}
