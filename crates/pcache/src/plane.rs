//! Console object type and the synthetic dataset behind it

use std::fmt;
use std::str::FromStr;

use planecache::{Source, SourceError};
use planesource::{ByteSource, Image, PixelData, PixelSource, PixelType, SyntheticReader};

/// Which adapter the console reads planes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Raw plane bytes
    Bytes,
    /// Decoded images
    Image,
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bytes" => Ok(SourceKind::Bytes),
            "image" => Ok(SourceKind::Image),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

/// Object stored by the console's cache
#[derive(Debug, Clone, PartialEq)]
pub enum Plane {
    /// Undecoded bytes
    Raw(Vec<u8>),
    /// Decoded image
    Image(Image),
}

impl From<Vec<u8>> for Plane {
    fn from(bytes: Vec<u8>) -> Self {
        Plane::Raw(bytes)
    }
}

impl From<Image> for Plane {
    fn from(image: Image) -> Self {
        Plane::Image(image)
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Raw(bytes) => write!(f, "{} raw bytes", bytes.len()),
            Plane::Image(image) => {
                write!(f, "{}x{} {} image", image.width, image.height, image.data.pixel_type())?;
                if let PixelData::Uint8(pixels) = &image.data {
                    if let Some(first) = pixels.first() {
                        write!(f, ", first pixel {}", first)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Adapts any source whose objects convert into [`Plane`]
pub struct PlaneSource<S>(pub S);

impl<S> Source for PlaneSource<S>
where
    S: Source,
    S::Object: Into<Plane>,
{
    type Object = Plane;

    fn count(&self) -> usize {
        self.0.count()
    }

    fn get(&mut self, lengths: &[usize], pos: &[usize]) -> Result<Plane, SourceError> {
        self.0.get(lengths, pos).map(Into::into)
    }

    fn describe(&self) -> String {
        self.0.describe()
    }
}

/// Shape of the synthetic dataset the console serves
#[derive(Debug, Clone, Copy)]
pub struct Dataset {
    /// Number of planes
    pub planes: usize,
    /// Plane width
    pub width: usize,
    /// Plane height
    pub height: usize,
    /// Pixel element type
    pub pixel_type: PixelType,
}

impl Dataset {
    fn reader(&self) -> SyntheticReader {
        SyntheticReader::new(self.planes, self.width, self.height, self.pixel_type)
    }

    /// Boxed source of the requested kind over a fresh reader
    pub fn source(&self, kind: SourceKind) -> Box<dyn Source<Object = Plane>> {
        match kind {
            SourceKind::Bytes => Box::new(PlaneSource(ByteSource::new(self.reader()))),
            SourceKind::Image => Box::new(PlaneSource(PixelSource::images(self.reader()))),
        }
    }
}
