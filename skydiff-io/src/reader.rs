//! FITS image reader.
//!
//! Reads the primary HDU through cfitsio. cfitsio applies `BSCALE`/`BZERO`
//! while converting samples to `f64`; integer samples equal to `BLANK` are
//! turned into NaN here.

use crate::header::{decode_metadata, decode_wcs, HduKeys};
use crate::{Error, Result};
use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::images::ImageType;
use fitsio::FitsFile;
use log::debug;
use ndarray::Array2;
use skydiff_core::Image;
use std::path::{Path, PathBuf};

/// Sample type of the primary data unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitpix {
    /// 8-bit integer.
    U8,
    /// 16-bit integer.
    I16,
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// IEEE single precision.
    F32,
    /// IEEE double precision.
    F64,
}

impl Bitpix {
    /// Maps the cfitsio image type, which folds `BZERO` offsets into
    /// unsigned variants, back to the stored sample width.
    #[must_use]
    pub fn from_image_type(image_type: &ImageType) -> Self {
        match image_type {
            ImageType::UnsignedByte | ImageType::Byte => Self::U8,
            ImageType::Short | ImageType::UnsignedShort => Self::I16,
            ImageType::Long | ImageType::UnsignedLong => Self::I32,
            ImageType::LongLong => Self::I64,
            ImageType::Float => Self::F32,
            ImageType::Double => Self::F64,
        }
    }

    /// The `BITPIX` keyword value.
    #[must_use]
    pub fn value(self) -> i64 {
        match self {
            Self::U8 => 8,
            Self::I16 => 16,
            Self::I32 => 32,
            Self::I64 => 64,
            Self::F32 => -32,
            Self::F64 => -64,
        }
    }

    /// Bytes per sample.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Returns true for integer sample types.
    #[must_use]
    pub fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64)
    }
}

/// Size in bytes of a `rows x cols` data unit.
///
/// # Errors
/// Returns [`Error::InvalidFormat`] when the size does not fit in `usize`.
pub fn data_size(rows: usize, cols: usize, bitpix: Bitpix) -> Result<usize> {
    rows.checked_mul(cols)
        .and_then(|count| count.checked_mul(bitpix.size()))
        .ok_or_else(|| {
            Error::InvalidFormat(format!(
                "image of {rows}x{cols} {}-bit samples is too large",
                bitpix.value().abs()
            ))
        })
}

/// Reader for the primary image of a FITS file.
pub struct FitsImageReader {
    fptr: FitsFile,
    hdu: FitsHdu,
    path: PathBuf,
    shape: (usize, usize),
    bitpix: Bitpix,
}

impl FitsImageReader {
    /// Opens a FITS file and inspects its primary HDU.
    ///
    /// # Errors
    /// Returns an error if cfitsio cannot open the file or the primary HDU is
    /// not a 2-D image.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut fptr = FitsFile::open(&path)?;
        let hdu = fptr.primary_hdu()?;

        let (shape, bitpix) = match &hdu.info {
            HduInfo::ImageInfo { shape, image_type } => {
                (shape.clone(), Bitpix::from_image_type(image_type))
            }
            _ => {
                return Err(Error::Unsupported(
                    "primary HDU is not an image".to_string(),
                ))
            }
        };
        // cfitsio reports axes slowest first: [NAXIS2, NAXIS1].
        let [rows, cols] = shape[..] else {
            return Err(Error::Unsupported(format!(
                "NAXIS = {}, only 2-D images are supported",
                shape.len()
            )));
        };

        Ok(Self {
            fptr,
            hdu,
            path,
            shape: (rows, cols),
            bitpix,
        })
    }

    /// Image shape as (rows, cols) = (`NAXIS2`, `NAXIS1`).
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Sample type of the data unit.
    #[must_use]
    pub fn bitpix(&self) -> Bitpix {
        self.bitpix
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Physical value that marks undefined integer samples.
    fn blank_value(&mut self) -> Option<f64> {
        if !self.bitpix.is_integer() {
            return None;
        }
        let blank = self.hdu.read_key::<i64>(&mut self.fptr, "BLANK").ok()?;
        let bscale = self
            .hdu
            .read_key::<f64>(&mut self.fptr, "BSCALE")
            .unwrap_or(1.0);
        let bzero = self
            .hdu
            .read_key::<f64>(&mut self.fptr, "BZERO")
            .unwrap_or(0.0);
        #[allow(clippy::cast_precision_loss)]
        let raw = blank as f64;
        Some(raw * bscale + bzero)
    }

    /// Reads the primary data unit as physical values.
    ///
    /// # Errors
    /// Returns an error if the data unit is larger than the file or cfitsio
    /// fails to read it.
    #[allow(clippy::float_cmp)]
    pub fn read_data(&mut self) -> Result<Array2<f64>> {
        let (rows, cols) = self.shape;
        let expected = data_size(rows, cols, self.bitpix)?;
        let file_len = std::fs::metadata(&self.path)?.len();
        if !u64::try_from(expected).is_ok_and(|len| len <= file_len) {
            return Err(Error::InvalidFormat(format!(
                "data unit of {expected} bytes exceeds file size {file_len} (file: {})",
                self.path.display()
            )));
        }

        debug!(
            "Reading {rows}x{cols} image, BITPIX={} from {}",
            self.bitpix.value(),
            self.path.display()
        );
        let mut values: Vec<f64> = self.hdu.read_image(&mut self.fptr)?;
        if let Some(blank) = self.blank_value() {
            for value in values.iter_mut().filter(|v| **v == blank) {
                *value = f64::NAN;
            }
        }

        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| Error::InvalidFormat(e.to_string()))
    }

    /// Reads pixel data, WCS and metadata into an [`Image`].
    ///
    /// # Errors
    /// See [`FitsImageReader::read_data`].
    pub fn read_image(&mut self) -> Result<Image> {
        let data = self.read_data()?;
        let mut keys = HduKeys::new(&mut self.fptr, &self.hdu);
        let mut image = Image::new(data).with_metadata(decode_metadata(&mut keys));
        image.wcs = decode_wcs(&mut keys);
        Ok(image)
    }
}

/// Reads the primary image of a FITS file.
///
/// # Errors
/// Returns an error if the file cannot be read or decoded.
pub fn read_fits<P: AsRef<Path>>(path: P) -> Result<Image> {
    FitsImageReader::open(path)?.read_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BLOCK: usize = 2880;

    fn card(key: &str, value: &str) -> String {
        let text = if value.starts_with('\'') {
            format!("{key:<8}= {value}")
        } else {
            format!("{key:<8}= {value:>20}")
        };
        format!("{text:<80}")
    }

    /// Writes a primary HDU from raw cards and big-endian data.
    fn fits_file(cards: &[(&str, &str)], data: &[u8]) -> NamedTempFile {
        let mut header: String = std::iter::once(card("SIMPLE", "T"))
            .chain(cards.iter().map(|(k, v)| card(k, v)))
            .collect();
        header.push_str(&format!("{:<80}", "END"));

        let mut bytes = header.into_bytes();
        bytes.resize(bytes.len().div_ceil(BLOCK) * BLOCK, b' ');
        bytes.extend_from_slice(data);
        bytes.resize(bytes.len().div_ceil(BLOCK) * BLOCK, 0);

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_int16_with_scaling_and_blank() {
        let samples: [i16; 6] = [0, 1, -1, 100, -32768, 7];
        let data: Vec<u8> = samples.iter().flat_map(|v| v.to_be_bytes()).collect();
        let file = fits_file(
            &[
                ("BITPIX", "16"),
                ("NAXIS", "2"),
                ("NAXIS1", "3"),
                ("NAXIS2", "2"),
                ("BZERO", "10.0"),
                ("BSCALE", "0.5"),
                ("BLANK", "-32768"),
            ],
            &data,
        );

        let mut reader = FitsImageReader::open(file.path()).unwrap();
        assert_eq!(reader.shape(), (2, 3));
        assert_eq!(reader.bitpix(), Bitpix::I16);
        let image = reader.read_data().unwrap();
        assert_eq!(image[[0, 0]], 10.0);
        assert_eq!(image[[0, 1]], 10.5);
        assert_eq!(image[[0, 2]], 9.5);
        assert_eq!(image[[1, 0]], 60.0);
        assert!(image[[1, 1]].is_nan());
        assert_eq!(image[[1, 2]], 13.5);
    }

    #[test]
    fn test_read_float32_image_with_metadata() {
        let samples: [f32; 4] = [1.5, f32::NAN, -2.0, 3.25];
        let data: Vec<u8> = samples.iter().flat_map(|v| v.to_be_bytes()).collect();
        let file = fits_file(
            &[
                ("BITPIX", "-32"),
                ("NAXIS", "2"),
                ("NAXIS1", "2"),
                ("NAXIS2", "2"),
                ("EXPTIME", "30.0"),
                ("FILTER", "'i       '"),
            ],
            &data,
        );

        let image = read_fits(file.path()).unwrap();
        assert_eq!(image.shape(), (2, 2));
        assert_eq!(image.data[[0, 0]], 1.5);
        assert!(image.data[[0, 1]].is_nan());
        assert_eq!(image.data[[1, 1]], 3.25);
        assert_eq!(image.metadata.exposure_time, Some(30.0));
        assert_eq!(image.metadata.filter.as_deref(), Some("i"));
        assert!(image.wcs.is_none());
    }

    #[test]
    fn test_read_sip_wcs_from_file() {
        let data = vec![0u8; 4 * 4 * 4];
        let file = fits_file(
            &[
                ("BITPIX", "-32"),
                ("NAXIS", "2"),
                ("NAXIS1", "4"),
                ("NAXIS2", "4"),
                ("CTYPE1", "'RA---TAN-SIP'"),
                ("CTYPE2", "'DEC--TAN-SIP'"),
                ("CRPIX1", "2.0"),
                ("CRPIX2", "2.0"),
                ("CRVAL1", "150.0"),
                ("CRVAL2", "2.0"),
                ("CD1_1", "-0.0002"),
                ("CD2_2", "0.0002"),
                ("A_ORDER", "2"),
            ],
            &data,
        );

        let image = read_fits(file.path()).unwrap();
        let wcs = image.wcs.unwrap();
        assert_eq!(wcs.crval, (150.0, 2.0));
        assert_eq!(wcs.cd, [[-0.0002, 0.0], [0.0, 0.0002]]);
    }

    #[test]
    fn test_rejects_cube() {
        let file = fits_file(
            &[
                ("BITPIX", "8"),
                ("NAXIS", "3"),
                ("NAXIS1", "2"),
                ("NAXIS2", "2"),
                ("NAXIS3", "2"),
            ],
            &[0u8; 8],
        );
        assert!(matches!(
            FitsImageReader::open(file.path()),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_truncated_data_is_an_error() {
        let file = fits_file(
            &[
                ("BITPIX", "-64"),
                ("NAXIS", "2"),
                ("NAXIS1", "100"),
                ("NAXIS2", "100"),
            ],
            &[],
        );
        assert!(read_fits(file.path()).is_err());
    }

    #[test]
    fn test_oversized_axes_are_an_error() {
        let huge = (1u64 << 32).to_string();
        let file = fits_file(
            &[
                ("BITPIX", "-64"),
                ("NAXIS", "2"),
                ("NAXIS1", &huge),
                ("NAXIS2", &huge),
            ],
            &[],
        );
        assert!(read_fits(file.path()).is_err());
    }

    #[test]
    fn test_data_size_overflow() {
        assert_eq!(data_size(2, 3, Bitpix::F64).unwrap(), 48);
        assert!(matches!(
            data_size(1 << 32, 1 << 32, Bitpix::F64),
            Err(Error::InvalidFormat(_))
        ));
        assert!(matches!(
            data_size(usize::MAX / 2, 1, Bitpix::I16),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_rejects_non_fits() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 2880]).unwrap();
        file.flush().unwrap();
        assert!(FitsImageReader::open(file.path()).is_err());
    }

    #[test]
    fn test_bitpix_mapping() {
        assert_eq!(Bitpix::from_image_type(&ImageType::UnsignedShort), Bitpix::I16);
        assert_eq!(Bitpix::from_image_type(&ImageType::Double).value(), -64);
        assert_eq!(Bitpix::F32.size(), 4);
        assert!(Bitpix::I32.is_integer());
        assert!(!Bitpix::F64.is_integer());
    }
}
