//! Source capability and adapters over plane readers
//!
//! A [`Source`] turns a position into a decoded object. Concrete format
//! decoders sit behind the [`PlaneReader`] trait; the adapters here map a
//! position to a plane number through the raster layout and shape the bytes
//! into the object type the cache stores.

mod bytes;
mod pixels;
mod synthetic;

use std::fmt;
use std::io;
use std::str::FromStr;

use crate::axis::Position;
use crate::error::SourceError;

pub use bytes::ByteSource;
pub use pixels::{Image, ImageFactory, PixelData, PixelFactory, PixelSource};
pub use synthetic::SyntheticReader;

/// Provider of decoded objects addressed by position
pub trait Source: Send {
    /// Object type handed to the cache
    type Object;

    /// Total number of addressable objects, fixed for the dataset's lifetime
    fn count(&self) -> usize;

    /// Fetch the object at `pos` within an axis space of `lengths`
    fn get(&mut self, lengths: &[usize], pos: &[usize]) -> Result<Self::Object, SourceError>;

    /// Fetch several objects in order
    ///
    /// Stops at the first failure; no partial results are returned.
    fn get_many(
        &mut self,
        lengths: &[usize],
        positions: &[Position],
    ) -> Result<Vec<Self::Object>, SourceError> {
        positions.iter().map(|pos| self.get(lengths, pos)).collect()
    }

    /// Human-readable name for consoles and logs
    fn describe(&self) -> String;
}

/// Element type of decoded pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelType {
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    Uint8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    Uint16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    Uint32,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
}

impl PixelType {
    /// Bytes occupied by one pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelType::Int8 | PixelType::Uint8 => 1,
            PixelType::Int16 | PixelType::Uint16 => 2,
            PixelType::Int32 | PixelType::Uint32 | PixelType::Float => 4,
            PixelType::Double => 8,
        }
    }

    /// Canonical lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            PixelType::Int8 => "int8",
            PixelType::Uint8 => "uint8",
            PixelType::Int16 => "int16",
            PixelType::Uint16 => "uint16",
            PixelType::Int32 => "int32",
            PixelType::Uint32 => "uint32",
            PixelType::Float => "float",
            PixelType::Double => "double",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int8" => Ok(PixelType::Int8),
            "uint8" => Ok(PixelType::Uint8),
            "int16" => Ok(PixelType::Int16),
            "uint16" => Ok(PixelType::Uint16),
            "int32" => Ok(PixelType::Int32),
            "uint32" => Ok(PixelType::Uint32),
            "float" => Ok(PixelType::Float),
            "double" => Ok(PixelType::Double),
            other => Err(format!("unknown pixel type '{}'", other)),
        }
    }
}

/// Format decoder collaborator: reads raw planes by plane number
pub trait PlaneReader: Send {
    /// Number of planes in the dataset
    fn plane_count(&self) -> usize;

    /// Plane width and height in pixels
    fn dimensions(&self) -> (usize, usize);

    /// Element type of the plane bytes
    fn pixel_type(&self) -> PixelType;

    /// Byte order of multi-byte pixels
    fn is_little_endian(&self) -> bool {
        true
    }

    /// Read the raw bytes of plane `plane`
    fn open_bytes(&mut self, plane: usize) -> io::Result<Vec<u8>>;

    /// Short name of the reader's format
    fn format_name(&self) -> &str;
}

/// Plane number of `pos`, reported as a source failure when out of range
fn plane_index(lengths: &[usize], pos: &[usize]) -> Result<usize, SourceError> {
    crate::axis::position_to_raster(lengths, pos)
        .map_err(|e| SourceError::with_cause(format!("cannot address {:?}", pos), e))
}
