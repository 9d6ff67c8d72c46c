//! skydiff-core: Core types for transient detection by image differencing.
//!
//! This crate provides the data model shared by the detector, the FITS
//! readers and the bindings: images with their coordinate transform,
//! detection configuration, candidate regions, events and the error
//! taxonomy.
//!

pub mod detection;
pub mod error;
pub mod event;
pub mod image;
pub mod region;
pub mod wcs;

pub use detection::{
    ClipCenter, Connectivity, DetectionConfig, DetectionStatistics, DetectionStatus,
    SigmaClipConfig, SkipCounts,
};
pub use error::{Error, Result, SkipReason};
pub use event::{sort_by_snr, Event};
pub use image::{Image, ImageMetadata};
pub use region::{CandidateRegion, NoiseEstimate, PixelPosition};
pub use wcs::{SkyProjection, Wcs};
