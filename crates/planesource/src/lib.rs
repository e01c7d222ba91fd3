//! # planesource
//!
//! Addressing and retrieval layer for PlaneCache.
//!
//! ## Architecture
//! - **Axis space**: mixed-radix bijection between N-dimensional positions and
//!   flat raster indices (first axis varies fastest)
//! - **Source**: capability that fetches the decoded object for a position
//! - **Adapters**: raw bytes and pixel buffers over any [`PlaneReader`]
//!
//! A `Source` is not assumed safe for concurrent use; every fetch takes
//! `&mut self`.

#![warn(missing_docs)]

mod axis;
mod error;
mod source;

pub use axis::{position_to_raster, raster_to_position, total_count, Position};
pub use error::{Error, Result, SourceError};
pub use source::{
    ByteSource, Image, ImageFactory, PixelData, PixelFactory, PixelSource, PixelType,
    PlaneReader, Source, SyntheticReader,
};
