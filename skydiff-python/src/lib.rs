//! skydiff-python: PyO3 Python bindings for skydiff.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args,
    clippy::too_many_arguments,
    clippy::elidable_lifetime_names
)]
//!
//! This crate provides Python bindings using PyO3 and numpy
//! for efficient data exchange with Python.

use numpy::{PyArray2, PyReadonlyArray2, PyReadonlyArrayDyn};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use skydiff_algorithms::{DetectionReport, Detector};
use skydiff_core::{
    ClipCenter, Connectivity, DetectionConfig, DetectionStatus, Event, Image, SigmaClipConfig,
    Wcs,
};
use skydiff_io::{FitsImageWriter, FitsImageReader};

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(format!("{context}: {err}"))
}

/// Python wrapper for Event.
#[pyclass(name = "Event")]
#[derive(Clone)]
pub struct PyEvent {
    inner: Event,
}

#[pymethods]
impl PyEvent {
    /// Centroid row (0-based pixel).
    #[getter]
    fn row(&self) -> f64 {
        self.inner.centroid.row
    }

    /// Centroid column (0-based pixel).
    #[getter]
    fn col(&self) -> f64 {
        self.inner.centroid.col
    }

    #[getter]
    fn ra(&self) -> f64 {
        self.inner.ra
    }

    #[getter]
    fn dec(&self) -> f64 {
        self.inner.dec
    }

    #[getter]
    fn flux(&self) -> f64 {
        self.inner.flux
    }

    #[getter]
    fn snr(&self) -> f64 {
        self.inner.snr
    }

    #[getter]
    fn area(&self) -> usize {
        self.inner.area
    }

    #[getter]
    fn filter(&self) -> Option<String> {
        self.inner.filter.clone()
    }

    #[getter]
    fn source(&self) -> Option<String> {
        self.inner.source.clone()
    }

    /// Event as a plain dict.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        dict.set_item("ra", self.inner.ra)?;
        dict.set_item("dec", self.inner.dec)?;
        dict.set_item("row", self.inner.centroid.row)?;
        dict.set_item("col", self.inner.centroid.col)?;
        dict.set_item("flux", self.inner.flux)?;
        dict.set_item("snr", self.inner.snr)?;
        dict.set_item("area", self.inner.area)?;
        dict.set_item("filter", self.inner.filter.clone())?;
        dict.set_item("source", self.inner.source.clone())?;
        Ok(dict)
    }

    fn __repr__(&self) -> String {
        format!(
            "Event(ra={:.6}, dec={:.6}, row={:.2}, col={:.2}, flux={:.2}, snr={:.2}, area={})",
            self.inner.ra,
            self.inner.dec,
            self.inner.centroid.row,
            self.inner.centroid.col,
            self.inner.flux,
            self.inner.snr,
            self.inner.area
        )
    }
}

/// Python wrapper for Wcs.
#[pyclass(name = "Wcs")]
#[derive(Clone)]
pub struct PyWcs {
    inner: Wcs,
}

#[pymethods]
impl PyWcs {
    #[new]
    #[pyo3(signature = (crpix, crval, cd))]
    fn new(crpix: (f64, f64), crval: (f64, f64), cd: [[f64; 2]; 2]) -> PyResult<Self> {
        let inner = Wcs::new(crpix, crval, cd);
        if !inner.is_valid() {
            return Err(value_error("Wcs", "CD matrix is singular or not finite"));
        }
        Ok(Self { inner })
    }

    /// WCS from a pixel scale (arcsec/pixel) and position angle (degrees).
    #[staticmethod]
    #[pyo3(signature = (crpix, crval, pixel_scale, rotation=0.0))]
    fn from_scale_rotation(
        crpix: (f64, f64),
        crval: (f64, f64),
        pixel_scale: f64,
        rotation: f64,
    ) -> PyResult<Self> {
        let inner = Wcs::from_scale_rotation(crpix, crval, pixel_scale, rotation);
        if !inner.is_valid() {
            return Err(value_error(
                "Wcs.from_scale_rotation",
                "pixel_scale and rotation must give a finite, invertible transform",
            ));
        }
        Ok(Self { inner })
    }

    #[getter]
    fn crpix(&self) -> (f64, f64) {
        self.inner.crpix
    }

    #[getter]
    fn crval(&self) -> (f64, f64) {
        self.inner.crval
    }

    #[getter]
    fn cd(&self) -> [[f64; 2]; 2] {
        self.inner.cd
    }

    #[getter]
    fn pixel_scale_arcsec(&self) -> f64 {
        self.inner.pixel_scale_arcsec()
    }

    /// 0-based pixel (x = column, y = row) to (ra, dec) in degrees.
    fn pixel_to_sky(&self, x: f64, y: f64) -> (f64, f64) {
        self.inner.pixel_to_sky(x, y)
    }

    /// (ra, dec) in degrees to 0-based pixel (x, y), or None behind the tangent plane.
    fn sky_to_pixel(&self, ra: f64, dec: f64) -> Option<(f64, f64)> {
        self.inner.sky_to_pixel(ra, dec)
    }

    fn __repr__(&self) -> String {
        format!(
            "Wcs(crpix=({}, {}), crval=({}, {}), scale={:.4}\"/px)",
            self.inner.crpix.0,
            self.inner.crpix.1,
            self.inner.crval.0,
            self.inner.crval.1,
            self.inner.pixel_scale_arcsec()
        )
    }
}

/// Python wrapper for DetectionConfig.
#[pyclass(name = "DetectionConfig")]
#[derive(Clone)]
pub struct PyDetectionConfig {
    inner: DetectionConfig,
}

#[pymethods]
impl PyDetectionConfig {
    #[new]
    #[pyo3(signature = (
        threshold_multiplier=5.0,
        min_area=10,
        min_snr=10.0,
        border_size=100,
        connectivity=4,
        sigma=3.0,
        max_iterations=5,
        clip_center="median",
        noise_override=None,
        parallel=false,
        keep_difference=false
    ))]
    fn new(
        threshold_multiplier: f64,
        min_area: usize,
        min_snr: f64,
        border_size: usize,
        connectivity: u8,
        sigma: f64,
        max_iterations: usize,
        clip_center: &str,
        noise_override: Option<f64>,
        parallel: bool,
        keep_difference: bool,
    ) -> PyResult<Self> {
        let connectivity = match connectivity {
            4 => Connectivity::Four,
            8 => Connectivity::Eight,
            other => {
                return Err(value_error(
                    "DetectionConfig",
                    format!("connectivity must be 4 or 8, got {other}"),
                ))
            }
        };
        let center = match clip_center.to_lowercase().as_str() {
            "median" => ClipCenter::Median,
            "mean" => ClipCenter::Mean,
            other => {
                return Err(value_error(
                    "DetectionConfig",
                    format!("clip_center must be 'median' or 'mean', got '{other}'"),
                ))
            }
        };

        let inner = DetectionConfig {
            threshold_multiplier,
            min_area,
            min_snr,
            border_size,
            connectivity,
            sigma_clip: SigmaClipConfig {
                sigma,
                max_iterations,
                center,
            },
            noise_override,
            parallel,
            keep_difference,
        };
        inner
            .validate()
            .map_err(|e| value_error("DetectionConfig", e))?;
        Ok(Self { inner })
    }

    #[staticmethod]
    fn default() -> Self {
        Self {
            inner: DetectionConfig::default(),
        }
    }

    #[getter]
    fn threshold_multiplier(&self) -> f64 {
        self.inner.threshold_multiplier
    }

    #[getter]
    fn min_area(&self) -> usize {
        self.inner.min_area
    }

    #[getter]
    fn min_snr(&self) -> f64 {
        self.inner.min_snr
    }

    #[getter]
    fn border_size(&self) -> usize {
        self.inner.border_size
    }

    #[getter]
    fn connectivity(&self) -> u8 {
        match self.inner.connectivity {
            Connectivity::Four => 4,
            Connectivity::Eight => 8,
        }
    }

    #[getter]
    fn noise_override(&self) -> Option<f64> {
        self.inner.noise_override
    }

    #[getter]
    fn parallel(&self) -> bool {
        self.inner.parallel
    }
}

fn status_name(status: DetectionStatus) -> &'static str {
    match status {
        DetectionStatus::Completed => "completed",
        DetectionStatus::AllPixelsInvalid => "all_pixels_invalid",
        DetectionStatus::DegenerateNoise => "degenerate_noise",
    }
}

fn run_detection(
    py: Python<'_>,
    reference: PyReadonlyArray2<f64>,
    science: PyReadonlyArray2<f64>,
    wcs: &PyWcs,
    config: Option<PyDetectionConfig>,
) -> PyResult<DetectionReport> {
    if !wcs.inner.is_valid() {
        return Err(value_error("detect", "wcs is singular or not finite"));
    }
    let config = config.map(|c| c.inner).unwrap_or_default();
    let detector = Detector::new(config).map_err(|e| value_error("detect", e))?;
    let reference = reference.as_array().to_owned();
    let science = science.as_array().to_owned();
    let wcs = wcs.inner.clone();

    py.allow_threads(move || detector.detect_arrays(&reference.view(), &science.view(), &wcs))
        .map_err(|e| value_error("detect", e))
}

/// Detect transients in `science` relative to `reference`.
///
/// Returns events ordered by descending SNR.
#[pyfunction]
#[pyo3(signature = (reference, science, wcs, config=None))]
fn detect(
    py: Python<'_>,
    reference: PyReadonlyArray2<f64>,
    science: PyReadonlyArray2<f64>,
    wcs: PyWcs,
    config: Option<PyDetectionConfig>,
) -> PyResult<Vec<PyEvent>> {
    let report = run_detection(py, reference, science, &wcs, config)?;
    Ok(report
        .events
        .into_iter()
        .map(|inner| PyEvent { inner })
        .collect())
}

/// Detect transients and return the full report as a dict.
///
/// Keys: events, status, mean, median, deviation, threshold, statistics and,
/// when `config.keep_difference` is set, difference.
#[pyfunction]
#[pyo3(signature = (reference, science, wcs, config=None))]
fn detect_report<'py>(
    py: Python<'py>,
    reference: PyReadonlyArray2<f64>,
    science: PyReadonlyArray2<f64>,
    wcs: PyWcs,
    config: Option<PyDetectionConfig>,
) -> PyResult<Bound<'py, PyDict>> {
    let report = run_detection(py, reference, science, &wcs, config)?;

    let dict = PyDict::new(py);
    let events: Vec<PyEvent> = report
        .events
        .into_iter()
        .map(|inner| PyEvent { inner })
        .collect();
    dict.set_item("events", events)?;
    dict.set_item("status", status_name(report.status))?;
    dict.set_item("mean", report.noise.map(|n| n.mean))?;
    dict.set_item("median", report.noise.map(|n| n.median))?;
    dict.set_item("deviation", report.noise.map(|n| n.deviation))?;
    dict.set_item("threshold", report.threshold)?;

    let stats = PyDict::new(py);
    let s = &report.statistics;
    stats.set_item("valid_pixels", s.valid_pixels)?;
    stats.set_item("significant_pixels", s.significant_pixels)?;
    stats.set_item("regions_labeled", s.regions_labeled)?;
    stats.set_item("events_found", s.events_found)?;
    stats.set_item("skipped", s.skipped.total())?;
    dict.set_item("statistics", stats)?;

    if let Some(difference) = report.difference {
        dict.set_item("difference", PyArray2::from_owned_array(py, difference))?;
    }
    Ok(dict)
}

/// Compute `science - reference`.
#[pyfunction]
fn difference_image<'py>(
    py: Python<'py>,
    reference: PyReadonlyArray2<f64>,
    science: PyReadonlyArray2<f64>,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let difference =
        skydiff_algorithms::difference_image(&reference.as_array(), &science.as_array())
            .map_err(|e| value_error("difference_image", e))?;
    Ok(PyArray2::from_owned_array(py, difference))
}

/// Sigma-clipped (mean, median, std) of the finite values of an array.
#[pyfunction]
#[pyo3(signature = (values, sigma=3.0, max_iterations=5))]
fn sigma_clipped_stats(
    values: PyReadonlyArrayDyn<f64>,
    sigma: f64,
    max_iterations: usize,
) -> PyResult<(f64, f64, f64)> {
    let finite: Vec<f64> = values
        .as_array()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    let config = SigmaClipConfig {
        sigma,
        max_iterations,
        ..SigmaClipConfig::default()
    };
    config
        .validate()
        .map_err(|e| value_error("sigma_clipped_stats", e))?;
    let noise = skydiff_algorithms::sigma_clipped_stats(&finite, &config)
        .ok_or_else(|| value_error("sigma_clipped_stats", "no finite values"))?;
    Ok((noise.mean, noise.median, noise.deviation))
}

/// Read the primary image of a FITS file.
///
/// Returns a dict with data, wcs (Wcs or None), exposure_time, filter,
/// date_obs and unit.
#[pyfunction]
fn read_fits<'py>(py: Python<'py>, path: &str) -> PyResult<Bound<'py, PyDict>> {
    let mut reader =
        FitsImageReader::open(path).map_err(|e| io_error(&format!("read_fits: open {path}"), e))?;
    let image = reader
        .read_image()
        .map_err(|e| value_error(&format!("read_fits: {path}"), e))?;

    let dict = PyDict::new(py);
    dict.set_item("data", PyArray2::from_owned_array(py, image.data))?;
    dict.set_item("wcs", image.wcs.map(|inner| PyWcs { inner }))?;
    dict.set_item("exposure_time", image.metadata.exposure_time)?;
    dict.set_item("filter", image.metadata.filter)?;
    dict.set_item("date_obs", image.metadata.date_obs)?;
    dict.set_item("unit", image.metadata.unit)?;
    Ok(dict)
}

/// Write a 2-D float64 array as a FITS primary image.
#[pyfunction]
#[pyo3(signature = (path, data, wcs=None))]
fn write_fits(path: &str, data: PyReadonlyArray2<f64>, wcs: Option<PyWcs>) -> PyResult<()> {
    let mut image = Image::new(data.as_array().to_owned());
    image.wcs = wcs.map(|w| w.inner);

    let mut writer = FitsImageWriter::create(path)
        .map_err(|e| io_error(&format!("write_fits: create {path}"), e))?;
    writer
        .write_image(&image)
        .map_err(|e| io_error(&format!("write_fits: {path}"), e))
}

/// Python module for skydiff.
#[pymodule]
fn skydiff(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyEvent>()?;
    m.add_class::<PyWcs>()?;
    m.add_class::<PyDetectionConfig>()?;
    m.add_function(wrap_pyfunction!(detect, m)?)?;
    m.add_function(wrap_pyfunction!(detect_report, m)?)?;
    m.add_function(wrap_pyfunction!(difference_image, m)?)?;
    m.add_function(wrap_pyfunction!(sigma_clipped_stats, m)?)?;
    m.add_function(wrap_pyfunction!(read_fits, m)?)?;
    m.add_function(wrap_pyfunction!(write_fits, m)?)?;
    Ok(())
}
