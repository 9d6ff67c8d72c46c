//! skydiff-io: FITS I/O for skydiff.
//!
//! This crate reads primary FITS images through cfitsio, decodes their
//! world coordinate system and metadata, and writes difference images and
//! event catalogs.
//!

mod error;
pub mod header;
mod reader;
pub mod scanner;
mod writer;

pub use error::{Error, Result};
pub use header::{decode_metadata, decode_wcs, HduKeys, HeaderKeys};
pub use reader::{data_size, read_fits, Bitpix, FitsImageReader};
pub use scanner::discover_fits_files;
pub use writer::{EventFileWriter, EventFormat, FitsImageWriter};
