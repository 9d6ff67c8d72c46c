//! Error types for skydiff-core.

use thiserror::Error;

/// Result type alias for skydiff operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural errors that abort a single detection call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Reference and science images do not share a pixel grid.
    #[error("image shape mismatch: reference {reference:?}, science {science:?}")]
    ShapeMismatch {
        reference: (usize, usize),
        science: (usize, usize),
    },

    /// An input image has no pixels.
    #[error("image has no pixels")]
    EmptyImage,

    /// The science image carries no coordinate transform.
    #[error("science image has no coordinate transform")]
    MissingTransform,

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Reason a candidate region was discarded.
///
/// These never propagate out of detection; they are counted and logged.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SkipReason {
    /// Raw pixel count below the minimum area.
    #[error("area too small ({area} < {min_area})")]
    BelowMinArea { area: usize, min_area: usize },

    /// Finite pixel count below the minimum area.
    #[error("not enough valid pixels ({valid_area} < {min_area})")]
    InsufficientValidArea { valid_area: usize, min_area: usize },

    /// Summed flux is NaN or infinite.
    #[error("invalid flux ({0})")]
    InvalidFlux(f64),

    /// Signal-to-noise ratio is NaN or infinite.
    #[error("invalid SNR ({0})")]
    InvalidSnr(f64),

    /// Signal-to-noise ratio below the minimum.
    #[error("SNR too low ({snr} < {min_snr})")]
    BelowMinSnr { snr: f64, min_snr: f64 },

    /// Centroid lies inside the border margin.
    #[error("centroid in the border ({row:.2}, {col:.2})")]
    BorderArtifact { row: f64, col: f64 },
}
