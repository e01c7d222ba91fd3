//! Typed pixel buffers built through an injected factory

use tracing::debug;

use super::{plane_index, PixelType, PlaneReader, Source};
use crate::error::SourceError;

/// Decoded pixels, one variant per supported element type
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Signed 8-bit pixels
    Int8(Vec<i8>),
    /// Unsigned 8-bit pixels
    Uint8(Vec<u8>),
    /// Signed 16-bit pixels
    Int16(Vec<i16>),
    /// Unsigned 16-bit pixels
    Uint16(Vec<u16>),
    /// Signed 32-bit pixels
    Int32(Vec<i32>),
    /// Unsigned 32-bit pixels
    Uint32(Vec<u32>),
    /// 32-bit float pixels
    Float(Vec<f32>),
    /// 64-bit float pixels
    Double(Vec<f64>),
}

macro_rules! decode_as {
    ($bytes:expr, $ty:ty, $little:expr) => {
        $bytes
            .chunks_exact(std::mem::size_of::<$ty>())
            .map(|chunk| {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(chunk);
                if $little {
                    <$ty>::from_le_bytes(raw)
                } else {
                    <$ty>::from_be_bytes(raw)
                }
            })
            .collect()
    };
}

impl PixelData {
    /// Decode raw plane bytes as `pixel_type`
    ///
    /// # Errors
    /// * `SourceError` - byte count is not a whole number of pixels
    pub fn decode(
        pixel_type: PixelType,
        bytes: &[u8],
        little_endian: bool,
    ) -> Result<Self, SourceError> {
        let bpp = pixel_type.bytes_per_pixel();
        if bytes.len() % bpp != 0 {
            return Err(SourceError::new(format!(
                "{} bytes is not a whole number of {} pixels",
                bytes.len(),
                pixel_type
            )));
        }

        Ok(match pixel_type {
            PixelType::Int8 => PixelData::Int8(bytes.iter().map(|&b| b as i8).collect()),
            PixelType::Uint8 => PixelData::Uint8(bytes.to_vec()),
            PixelType::Int16 => PixelData::Int16(decode_as!(bytes, i16, little_endian)),
            PixelType::Uint16 => PixelData::Uint16(decode_as!(bytes, u16, little_endian)),
            PixelType::Int32 => PixelData::Int32(decode_as!(bytes, i32, little_endian)),
            PixelType::Uint32 => PixelData::Uint32(decode_as!(bytes, u32, little_endian)),
            PixelType::Float => PixelData::Float(decode_as!(bytes, f32, little_endian)),
            PixelType::Double => PixelData::Double(decode_as!(bytes, f64, little_endian)),
        })
    }

    /// Element type of this buffer
    pub fn pixel_type(&self) -> PixelType {
        match self {
            PixelData::Int8(_) => PixelType::Int8,
            PixelData::Uint8(_) => PixelType::Uint8,
            PixelData::Int16(_) => PixelType::Int16,
            PixelData::Uint16(_) => PixelType::Uint16,
            PixelData::Int32(_) => PixelType::Int32,
            PixelData::Uint32(_) => PixelType::Uint32,
            PixelData::Float(_) => PixelType::Float,
            PixelData::Double(_) => PixelType::Double,
        }
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        match self {
            PixelData::Int8(v) => v.len(),
            PixelData::Uint8(v) => v.len(),
            PixelData::Int16(v) => v.len(),
            PixelData::Uint16(v) => v.len(),
            PixelData::Int32(v) => v.len(),
            PixelData::Uint32(v) => v.len(),
            PixelData::Float(v) => v.len(),
            PixelData::Double(v) => v.len(),
        }
    }

    /// Check if the buffer holds no pixels
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Capability that turns decoded pixels into a toolkit-specific buffer
///
/// Passed to [`PixelSource`] at construction so that caches with different
/// buffer types can coexist.
pub trait PixelFactory: Send {
    /// Buffer type produced
    type Output;

    /// Build a buffer for a `width` x `height` plane
    fn build(&self, width: usize, height: usize, data: PixelData) -> Self::Output;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// A decoded plane
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// Row-major pixel values
    pub data: PixelData,
}

/// Stock factory producing [`Image`] values
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFactory;

impl PixelFactory for ImageFactory {
    type Output = Image;

    fn build(&self, width: usize, height: usize, data: PixelData) -> Image {
        Image {
            width,
            height,
            data,
        }
    }

    fn name(&self) -> &str {
        "image"
    }
}

/// Source decoding planes into buffers built by a [`PixelFactory`]
pub struct PixelSource<R, F> {
    reader: R,
    factory: F,
}

impl<R: PlaneReader, F: PixelFactory> PixelSource<R, F> {
    /// Wrap a plane reader with the factory used to build buffers
    pub fn new(reader: R, factory: F) -> Self {
        Self { reader, factory }
    }

    /// Borrow the underlying reader
    pub fn reader(&self) -> &R {
        &self.reader
    }
}

impl<R: PlaneReader> PixelSource<R, ImageFactory> {
    /// Source producing plain [`Image`] values
    pub fn images(reader: R) -> Self {
        Self::new(reader, ImageFactory)
    }
}

impl<R: PlaneReader, F: PixelFactory> Source for PixelSource<R, F> {
    type Object = F::Output;

    fn count(&self) -> usize {
        self.reader.plane_count()
    }

    fn get(&mut self, lengths: &[usize], pos: &[usize]) -> Result<F::Output, SourceError> {
        let plane = plane_index(lengths, pos)?;
        let bytes = self
            .reader
            .open_bytes(plane)
            .map_err(|e| SourceError::with_cause(format!("failed to read plane {}", plane), e))?;

        let (width, height) = self.reader.dimensions();
        let expected = width * height * self.reader.pixel_type().bytes_per_pixel();
        if bytes.len() != expected {
            return Err(SourceError::new(format!(
                "plane {} has {} bytes, expected {}",
                plane,
                bytes.len(),
                expected
            )));
        }

        let data = PixelData::decode(
            self.reader.pixel_type(),
            &bytes,
            self.reader.is_little_endian(),
        )?;
        debug!(plane, pixel_type = %data.pixel_type(), "Decoded plane");
        Ok(self.factory.build(width, height, data))
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.factory.name(), self.reader.format_name())
    }
}
