//! File writers for images and detected events.

use crate::header::{write_metadata, write_wcs};
use crate::{Error, Result};
use fitsio::images::{ImageDescription, ImageType};
use fitsio::FitsFile;
use skydiff_core::{Event, Image};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writer for 2-D `f64` FITS images (`BITPIX = -64`).
pub struct FitsImageWriter {
    path: PathBuf,
}

impl FitsImageWriter {
    /// Creates a writer for `path`. An existing file is replaced on write.
    ///
    /// # Errors
    /// Returns an error if the parent directory does not exist.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("directory {} does not exist", parent.display()),
                )));
            }
        }
        Ok(Self { path })
    }

    /// Writes `image` as the primary HDU, including its WCS and metadata.
    ///
    /// # Errors
    /// Returns an error on an empty image or when cfitsio fails.
    pub fn write_image(&mut self, image: &Image) -> Result<()> {
        if image.is_empty() {
            return Err(Error::CoreError(skydiff_core::Error::EmptyImage));
        }
        let (rows, cols) = image.shape();
        let description = ImageDescription {
            data_type: ImageType::Double,
            dimensions: &[rows, cols], // [NAXIS2, NAXIS1]
        };

        let mut fptr = FitsFile::create(&self.path)
            .with_custom_primary(&description)
            .overwrite()
            .open()?;
        let hdu = fptr.primary_hdu()?;

        let values: Vec<f64> = image.data.iter().copied().collect();
        hdu.write_image(&mut fptr, &values)?;
        if let Some(wcs) = &image.wcs {
            write_wcs(&mut fptr, &hdu, wcs)?;
        }
        write_metadata(&mut fptr, &hdu, &image.metadata)?;
        Ok(())
    }
}

/// Output format for event files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    /// Comma-separated values with a header row.
    Csv,
    /// JSON array of event objects.
    #[cfg(feature = "serde")]
    Json,
}

impl EventFormat {
    /// Picks a format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            #[cfg(feature = "serde")]
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Writer for detected events.
pub struct EventFileWriter {
    writer: BufWriter<File>,
}

impl EventFileWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Writes events in the given format.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write(&mut self, events: &[Event], format: EventFormat) -> Result<()> {
        match format {
            EventFormat::Csv => self.write_events_csv(events),
            #[cfg(feature = "serde")]
            EventFormat::Json => self.write_events_json(events),
        }
    }

    /// Writes events as CSV.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_events_csv(&mut self, events: &[Event]) -> Result<()> {
        writeln!(self.writer, "ra,dec,row,col,flux,snr,area,filter,source")?;

        for e in events {
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{},{}",
                e.ra,
                e.dec,
                e.centroid.row,
                e.centroid.col,
                e.flux,
                e.snr,
                e.area,
                csv_field(e.filter.as_deref()),
                csv_field(e.source.as_deref())
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes events as a JSON array.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    #[cfg(feature = "serde")]
    pub fn write_events_json(&mut self, events: &[Event]) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, events)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

fn csv_field(value: Option<&str>) -> String {
    match value {
        None => String::new(),
        Some(v) if v.contains([',', '"', '\n']) => format!("\"{}\"", v.replace('"', "\"\"")),
        Some(v) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_fits;
    use approx::assert_relative_eq;
    use ndarray::array;
    use skydiff_core::{ImageMetadata, PixelPosition, Wcs};
    use tempfile::NamedTempFile;

    fn event(snr: f64, source: Option<&str>) -> Event {
        Event {
            centroid: PixelPosition::new(12.5, 40.0),
            ra: 150.25,
            dec: -2.5,
            flux: 900.0,
            snr,
            area: 25,
            filter: Some("r".to_string()),
            source: source.map(str::to_string),
        }
    }

    #[test]
    fn test_write_image_reads_back() {
        let file = NamedTempFile::new().unwrap();
        let wcs = Wcs::from_scale_rotation((2.0, 1.5), (210.0, 54.0), 0.25, 30.0);
        let metadata = ImageMetadata {
            exposure_time: Some(60.0),
            filter: Some("z".to_string()),
            date_obs: None,
            unit: Some("adu".to_string()),
        };
        let image = Image::new(array![[1.0, -2.5, f64::NAN], [4.0, 5.0, 1e-30]])
            .with_wcs(wcs.clone())
            .with_metadata(metadata.clone());

        FitsImageWriter::create(file.path())
            .unwrap()
            .write_image(&image)
            .unwrap();

        let bytes = std::fs::read(file.path()).unwrap();
        assert_eq!(bytes.len() % 2880, 0);

        let back = read_fits(file.path()).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.data[[0, 1]], -2.5);
        assert!(back.data[[0, 2]].is_nan());
        assert_eq!(back.data[[1, 2]], 1e-30);
        assert_eq!(back.metadata, metadata);

        // cfitsio writes doubles with 15 significant digits.
        let back_wcs = back.wcs.unwrap();
        assert_eq!(back_wcs.crpix, wcs.crpix);
        assert_eq!(back_wcs.crval, wcs.crval);
        for (a, b) in back_wcs.cd.iter().flatten().zip(wcs.cd.iter().flatten()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-13);
        }
    }

    #[test]
    fn test_write_image_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diff.fits");
        std::fs::write(&path, b"stale").unwrap();

        let mut writer = FitsImageWriter::create(&path).unwrap();
        writer.write_image(&Image::new(array![[7.0, 8.0]])).unwrap();

        let back = read_fits(&path).unwrap();
        assert_eq!(back.data, array![[7.0, 8.0]]);
        assert!(back.wcs.is_none());
    }

    #[test]
    fn test_write_image_rejects_missing_directory() {
        assert!(FitsImageWriter::create("/definitely/not/here/diff.fits").is_err());
    }

    #[test]
    fn test_write_events_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventFileWriter::create(file.path()).unwrap();

        let events = vec![event(50.0, Some("night1/a.fits")), event(20.0, None)];
        writer.write(&events, EventFormat::Csv).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "ra,dec,row,col,flux,snr,area,filter,source");
        assert_eq!(lines[1], "150.25,-2.5,12.5,40,900,50,25,r,night1/a.fits");
        assert_eq!(lines[2], "150.25,-2.5,12.5,40,900,20,25,r,");
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field(None), "");
        assert_eq!(csv_field(Some("a,b")), "\"a,b\"");
        assert_eq!(csv_field(Some("say \"hi\"")), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            EventFormat::from_path(Path::new("out/events.CSV")),
            Some(EventFormat::Csv)
        );
        assert_eq!(EventFormat::from_path(Path::new("events.txt")), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_write_events_json() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = EventFileWriter::create(file.path()).unwrap();
        writer
            .write(&[event(50.0, Some("a.fits"))], EventFormat::Json)
            .unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let parsed: Vec<Event> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, vec![event(50.0, Some("a.fits"))]);
    }
}
