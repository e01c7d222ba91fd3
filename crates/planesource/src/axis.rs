//! Axis space: mapping between N-dimensional positions and raster indices
//!
//! Raster layout is mixed-radix with the first axis varying fastest:
//! ```text
//! index = pos[0] + len[0] * (pos[1] + len[1] * (pos[2] + ...))
//! ```

use std::fmt;
use std::ops::Deref;

use crate::error::{Error, Result};

/// A coordinate tuple, one value per axis
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Position(Vec<usize>);

impl Position {
    /// Create a position from its coordinates
    pub fn new(coords: Vec<usize>) -> Self {
        Self(coords)
    }

    /// The all-zero position for `axes` axes
    pub fn origin(axes: usize) -> Self {
        Self(vec![0; axes])
    }

    /// Coordinates as a slice
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Consume into the coordinate vector
    pub fn into_inner(self) -> Vec<usize> {
        self.0
    }
}

impl Deref for Position {
    type Target = [usize];

    fn deref(&self) -> &[usize] {
        &self.0
    }
}

impl From<Vec<usize>> for Position {
    fn from(coords: Vec<usize>) -> Self {
        Self(coords)
    }
}

impl From<&[usize]> for Position {
    fn from(coords: &[usize]) -> Self {
        Self(coords.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Position {
    fn from(coords: [usize; N]) -> Self {
        Self(coords.to_vec())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

/// Total number of addressable positions (product of lengths)
pub fn total_count(lengths: &[usize]) -> usize {
    lengths.iter().product()
}

/// Convert a position to its raster index
///
/// # Errors
/// * `Error::InvalidAxis` - arity differs from `lengths` or a coordinate is
///   out of range
pub fn position_to_raster(lengths: &[usize], pos: &[usize]) -> Result<usize> {
    if pos.len() != lengths.len() {
        return Err(Error::InvalidAxis(format!(
            "position has {} coordinates but {} axes are defined",
            pos.len(),
            lengths.len()
        )));
    }

    let mut index = 0;
    let mut stride = 1;
    for (axis, (&value, &len)) in pos.iter().zip(lengths).enumerate() {
        if value >= len {
            return Err(Error::InvalidAxis(format!(
                "coordinate {} out of range for axis {} (length {})",
                value, axis, len
            )));
        }
        index += value * stride;
        stride *= len;
    }
    Ok(index)
}

/// Convert a raster index back to its position
///
/// # Errors
/// * `Error::InvalidAxis` - `index` is not below the total count
pub fn raster_to_position(lengths: &[usize], index: usize) -> Result<Position> {
    let total = total_count(lengths);
    if index >= total {
        return Err(Error::InvalidAxis(format!(
            "raster index {} out of range (total {})",
            index, total
        )));
    }

    let mut rest = index;
    let coords = lengths
        .iter()
        .map(|&len| {
            let value = rest % len;
            rest /= len;
            value
        })
        .collect();
    Ok(Position(coords))
}
