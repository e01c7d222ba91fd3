//! Raw byte buffer adapter

use tracing::debug;

use super::{plane_index, PlaneReader, Source};
use crate::error::SourceError;

/// Source yielding the undecoded bytes of each plane
pub struct ByteSource<R> {
    reader: R,
}

impl<R: PlaneReader> ByteSource<R> {
    /// Wrap a plane reader
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Borrow the underlying reader
    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Unwrap the underlying reader
    pub fn into_reader(self) -> R {
        self.reader
    }
}

impl<R: PlaneReader> Source for ByteSource<R> {
    type Object = Vec<u8>;

    fn count(&self) -> usize {
        self.reader.plane_count()
    }

    fn get(&mut self, lengths: &[usize], pos: &[usize]) -> Result<Vec<u8>, SourceError> {
        let plane = plane_index(lengths, pos)?;
        debug!(plane, "Reading raw plane");
        self.reader
            .open_bytes(plane)
            .map_err(|e| SourceError::with_cause(format!("failed to read plane {}", plane), e))
    }

    fn describe(&self) -> String {
        format!("bytes ({})", self.reader.format_name())
    }
}
