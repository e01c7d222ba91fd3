//! Synthetic dataset generating deterministic planes
//!
//! Pixel `i` of plane `p` holds `p + i`, truncated to the element type and
//! written little-endian.

use std::io;

use super::{PixelType, PlaneReader};

/// Plane reader that fabricates pixel data instead of decoding a file
#[derive(Debug, Clone)]
pub struct SyntheticReader {
    planes: usize,
    width: usize,
    height: usize,
    pixel_type: PixelType,
    opened: usize,
}

impl SyntheticReader {
    /// Create a dataset of `planes` planes of `width` x `height` pixels
    pub fn new(planes: usize, width: usize, height: usize, pixel_type: PixelType) -> Self {
        Self {
            planes,
            width,
            height,
            pixel_type,
            opened: 0,
        }
    }

    /// Number of successful `open_bytes` calls so far
    pub fn planes_opened(&self) -> usize {
        self.opened
    }

    fn encode(&self, value: usize, out: &mut Vec<u8>) {
        match self.pixel_type {
            PixelType::Int8 | PixelType::Uint8 => out.push(value as u8),
            PixelType::Int16 | PixelType::Uint16 => {
                out.extend_from_slice(&(value as u16).to_le_bytes())
            }
            PixelType::Int32 | PixelType::Uint32 => {
                out.extend_from_slice(&(value as u32).to_le_bytes())
            }
            PixelType::Float => out.extend_from_slice(&(value as f32).to_le_bytes()),
            PixelType::Double => out.extend_from_slice(&(value as f64).to_le_bytes()),
        }
    }
}

impl PlaneReader for SyntheticReader {
    fn plane_count(&self) -> usize {
        self.planes
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    fn open_bytes(&mut self, plane: usize) -> io::Result<Vec<u8>> {
        if plane >= self.planes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("plane {} out of range ({} planes)", plane, self.planes),
            ));
        }

        let pixels = self.width * self.height;
        let mut out = Vec::with_capacity(pixels * self.pixel_type.bytes_per_pixel());
        for i in 0..pixels {
            self.encode(plane + i, &mut out);
        }
        self.opened += 1;
        Ok(out)
    }

    fn format_name(&self) -> &str {
        "synthetic"
    }
}
