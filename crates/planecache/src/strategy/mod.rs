//! Neighborhood selection strategies
//!
//! A strategy owns the per-axis settings and turns a focal position into the
//! ordered load list: every position that should be resident, in the order
//! it should be fetched.
//!
//! ## Walking one axis
//! Every axis walk starts at offset 0 and then follows the axis [`Order`]:
//! ```text
//! Centered:  0, +1, -1, +2, -2, ...
//! Forward:   0, +1 .. +forward, -1 .. -backward
//! Backward:  0, -1 .. -backward, +1 .. +forward
//! ```
//! Coordinates wrap modulo the axis length. A position reached twice (reach
//! at least as long as the axis) is listed once.
//!
//! ## Axis traversal
//! Axes are serviced in descending priority. Among equal priorities the next
//! axis is the first one after the axis serviced last, cyclically, so with
//! priorities `[0, 1, 0, 1]` the order is `1, 3, 0, 2`.

mod crosshair;
mod rectangle;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use ahash::RandomState;
use planesource::{position_to_raster, Error, Position, Result};
use serde::{Deserialize, Serialize};

pub use crosshair::CrosshairStrategy;
pub use rectangle::RectangleStrategy;

/// Direction preference when walking an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Alternate forward and backward neighbors, nearest first
    #[default]
    Centered,
    /// All forward neighbors, then all backward neighbors
    Forward,
    /// All backward neighbors, then all forward neighbors
    Backward,
}

impl Order {
    /// Lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            Order::Centered => "centered",
            Order::Forward => "forward",
            Order::Backward => "backward",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "centered" | "c" => Ok(Order::Centered),
            "forward" | "f" => Ok(Order::Forward),
            "backward" | "b" => Ok(Order::Backward),
            other => Err(format!("unknown order '{}'", other)),
        }
    }
}

/// The concrete strategy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Per-axis line segments through the focal position
    #[default]
    Crosshair,
    /// Full hyper-rectangle around the focal position
    Rectangle,
}

impl StrategyKind {
    /// Lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Crosshair => "crosshair",
            StrategyKind::Rectangle => "rectangle",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crosshair" => Ok(StrategyKind::Crosshair),
            "rectangle" => Ok(StrategyKind::Rectangle),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// One dimension of the address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Axis {
    /// Extent of the axis (at least 1)
    pub length: usize,
    /// Higher values are serviced first
    pub priority: i32,
    /// Neighbors kept resident in the increasing direction
    pub forward: usize,
    /// Neighbors kept resident in the decreasing direction
    pub backward: usize,
    /// Walk direction preference
    pub order: Order,
}

impl Axis {
    /// Axis of `length` with no reach, priority 0 and centered order
    pub fn new(length: usize) -> Self {
        Self {
            length,
            priority: 0,
            forward: 0,
            backward: 0,
            order: Order::Centered,
        }
    }

    /// Builder-style reach setter
    pub fn with_range(mut self, forward: usize, backward: usize) -> Self {
        self.forward = forward;
        self.backward = backward;
        self
    }

    /// Builder-style priority setter
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Builder-style order setter
    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    /// Forward and backward reach, each capped at `length - 1`
    ///
    /// Any step past the cap wraps onto a coordinate already reached.
    pub fn effective_range(&self) -> (usize, usize) {
        let span = self.length.saturating_sub(1);
        (self.forward.min(span), self.backward.min(span))
    }

    /// Signed offsets from the focal coordinate, in walk order, starting at 0
    pub fn offsets(&self) -> Vec<isize> {
        let (forward, backward) = self.effective_range();
        let mut offsets = Vec::with_capacity(forward + backward + 1);
        let forward = forward as isize;
        let backward = backward as isize;
        offsets.push(0);

        match self.order {
            Order::Centered => {
                for d in 1..=forward.max(backward) {
                    if d <= forward {
                        offsets.push(d);
                    }
                    if d <= backward {
                        offsets.push(-d);
                    }
                }
            }
            Order::Forward => {
                offsets.extend(1..=forward);
                offsets.extend((1..=backward).map(|d| -d));
            }
            Order::Backward => {
                offsets.extend((1..=backward).map(|d| -d));
                offsets.extend(1..=forward);
            }
        }
        offsets
    }

    /// Coordinate reached from `focal` by `offset`, wrapping at the boundaries
    pub fn wrap(&self, focal: usize, offset: isize) -> usize {
        (focal as isize + offset).rem_euclid(self.length as isize) as usize
    }
}

/// Axis settings shared by every strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyCore {
    axes: Vec<Axis>,
    lengths: Vec<usize>,
}

impl StrategyCore {
    /// Core with default settings for each of `lengths`
    pub fn new(lengths: &[usize]) -> Result<Self> {
        Self::from_axes(lengths.iter().map(|&len| Axis::new(len)).collect())
    }

    /// Core from fully specified axes
    ///
    /// # Errors
    /// * `Error::InvalidAxis` - no axes, or an axis of length 0
    pub fn from_axes(axes: Vec<Axis>) -> Result<Self> {
        if axes.is_empty() {
            return Err(Error::InvalidAxis("at least one axis is required".to_string()));
        }
        if let Some(axis) = axes.iter().position(|a| a.length == 0) {
            return Err(Error::InvalidAxis(format!("axis {} has length 0", axis)));
        }
        let lengths = axes.iter().map(|a| a.length).collect();
        Ok(Self { axes, lengths })
    }

    /// Axis lengths
    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    /// All axes
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// One axis
    pub fn axis(&self, axis: usize) -> Result<&Axis> {
        let count = self.axes.len();
        self.axes
            .get(axis)
            .ok_or_else(|| Error::InvalidAxis(format!("axis {} out of range ({} axes)", axis, count)))
    }

    fn axis_mut(&mut self, axis: usize) -> Result<&mut Axis> {
        let count = self.axes.len();
        self.axes
            .get_mut(axis)
            .ok_or_else(|| Error::InvalidAxis(format!("axis {} out of range ({} axes)", axis, count)))
    }

    /// Axis indices in the order they are serviced
    pub fn traversal_order(&self) -> Vec<usize> {
        let n = self.axes.len();
        let mut remaining: Vec<usize> = (0..n).collect();
        let mut order = Vec::with_capacity(n);
        // Search from axis 0 for the first pick
        let mut current = n - 1;

        while let Some(best) = remaining.iter().map(|&a| self.axes[a].priority).max() {
            let slot = remaining
                .iter()
                .enumerate()
                .filter(|&(_, &a)| self.axes[a].priority == best)
                .min_by_key(|&(_, &a)| (a + n - current - 1) % n)
                .map(|(slot, _)| slot)
                .unwrap_or(0);
            current = remaining.remove(slot);
            order.push(current);
        }
        order
    }

    /// Check `pos` against the axis count and lengths
    ///
    /// # Errors
    /// * `Error::DimensionMismatch` - wrong number of coordinates
    /// * `Error::InvalidAxis` - a coordinate is out of range
    pub fn check_position(&self, pos: &[usize]) -> Result<()> {
        if pos.len() != self.axes.len() {
            return Err(Error::DimensionMismatch {
                expected: self.axes.len(),
                actual: pos.len(),
            });
        }
        position_to_raster(&self.lengths, pos).map(|_| ())
    }

    /// Short summary of every axis, e.g. `5(+1/-1 p0 centered) x 4(...)`
    pub fn summary(&self) -> String {
        self.axes
            .iter()
            .map(|a| format!("{}(+{}/-{} p{} {})", a.length, a.forward, a.backward, a.priority, a.order))
            .collect::<Vec<_>>()
            .join(" x ")
    }
}

/// Ordered, duplicate-free load list under construction
pub(crate) struct LoadList<'a> {
    lengths: &'a [usize],
    seen: HashSet<usize, RandomState>,
    positions: Vec<Position>,
}

impl<'a> LoadList<'a> {
    pub(crate) fn new(lengths: &'a [usize]) -> Self {
        Self {
            lengths,
            seen: HashSet::with_hasher(RandomState::new()),
            positions: Vec::new(),
        }
    }

    /// Append `coords` unless it is already listed
    pub(crate) fn push(&mut self, coords: Vec<usize>) {
        let Ok(index) = position_to_raster(self.lengths, &coords) else {
            return;
        };
        if self.seen.insert(index) {
            self.positions.push(Position::new(coords));
        }
    }

    pub(crate) fn into_positions(self) -> Vec<Position> {
        self.positions
    }
}

/// Capability computing the working set around a focal position
pub trait Strategy: Send {
    /// Shared axis settings
    fn core(&self) -> &StrategyCore;

    /// Mutable shared axis settings
    fn core_mut(&mut self) -> &mut StrategyCore;

    /// Which variant this is
    fn kind(&self) -> StrategyKind;

    /// Ordered positions for an already validated focal position
    fn select(&self, pos: &[usize]) -> Vec<Position>;

    /// Every position that should be resident around `pos`, in load order
    ///
    /// The focal position is always the first entry.
    fn load_list(&self, pos: &[usize]) -> Result<Vec<Position>> {
        self.core().check_position(pos)?;
        Ok(self.select(pos))
    }

    /// Axis lengths
    fn lengths(&self) -> &[usize] {
        self.core().lengths()
    }

    /// Priority of `axis`
    fn priority(&self, axis: usize) -> Result<i32> {
        Ok(self.core().axis(axis)?.priority)
    }

    /// Set the priority of `axis`; returns whether it changed
    fn set_priority(&mut self, axis: usize, priority: i32) -> Result<bool> {
        let axis = self.core_mut().axis_mut(axis)?;
        let changed = axis.priority != priority;
        axis.priority = priority;
        Ok(changed)
    }

    /// Forward and backward reach of `axis`
    fn range(&self, axis: usize) -> Result<(usize, usize)> {
        let axis = self.core().axis(axis)?;
        Ok((axis.forward, axis.backward))
    }

    /// Set the reach of `axis`; returns whether it changed
    fn set_range(&mut self, axis: usize, forward: usize, backward: usize) -> Result<bool> {
        let axis = self.core_mut().axis_mut(axis)?;
        let changed = (axis.forward, axis.backward) != (forward, backward);
        axis.forward = forward;
        axis.backward = backward;
        Ok(changed)
    }

    /// Walk order of `axis`
    fn order(&self, axis: usize) -> Result<Order> {
        Ok(self.core().axis(axis)?.order)
    }

    /// Set the walk order of `axis`; returns whether it changed
    fn set_order(&mut self, axis: usize, order: Order) -> Result<bool> {
        let axis = self.core_mut().axis_mut(axis)?;
        let changed = axis.order != order;
        axis.order = order;
        Ok(changed)
    }

    /// Human-readable name and settings
    fn describe(&self) -> String {
        format!("{} {}", self.kind(), self.core().summary())
    }

    /// Upper bound on the load list length, ignoring wraparound overlap
    fn max_load(&self) -> usize;
}

/// Build a boxed strategy of `kind` over `axes`
pub fn build_strategy(kind: StrategyKind, axes: Vec<Axis>) -> Result<Box<dyn Strategy>> {
    Ok(match kind {
        StrategyKind::Crosshair => Box::new(CrosshairStrategy::from_axes(axes)?),
        StrategyKind::Rectangle => Box::new(RectangleStrategy::from_axes(axes)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_centered() {
        let axis = Axis::new(10).with_range(3, 1);
        assert_eq!(axis.offsets(), vec![0, 1, -1, 2, 3]);
    }

    #[test]
    fn test_offsets_forward() {
        let axis = Axis::new(10).with_range(2, 2).with_order(Order::Forward);
        assert_eq!(axis.offsets(), vec![0, 1, 2, -1, -2]);
    }

    #[test]
    fn test_offsets_backward() {
        let axis = Axis::new(10).with_range(1, 2).with_order(Order::Backward);
        assert_eq!(axis.offsets(), vec![0, -1, -2, 1]);
    }

    #[test]
    fn test_offsets_capped_at_axis_length() {
        let axis = Axis::new(5).with_range(usize::MAX, 0);
        assert_eq!(axis.effective_range(), (4, 0));
        assert_eq!(axis.offsets(), vec![0, 1, 2, 3, 4]);

        let axis = Axis::new(3).with_range(1_000_000_000, usize::MAX);
        assert_eq!(axis.offsets(), vec![0, 1, -1, 2, -2]);

        assert_eq!(Axis::new(1).with_range(7, 7).offsets(), vec![0]);
    }

    #[test]
    fn test_wrap() {
        let axis = Axis::new(5);
        assert_eq!(axis.wrap(0, -1), 4);
        assert_eq!(axis.wrap(4, 1), 0);
        assert_eq!(axis.wrap(2, 7), 4);
    }

    #[test]
    fn test_traversal_order_by_priority() {
        let core = StrategyCore::from_axes(vec![
            Axis::new(3).with_priority(0),
            Axis::new(3).with_priority(5),
            Axis::new(3).with_priority(-1),
        ])
        .unwrap();
        assert_eq!(core.traversal_order(), vec![1, 0, 2]);
    }

    #[test]
    fn test_traversal_order_ties_cyclic() {
        let core = StrategyCore::from_axes(vec![
            Axis::new(3).with_priority(0),
            Axis::new(3).with_priority(1),
            Axis::new(3).with_priority(0),
            Axis::new(3).with_priority(1),
        ])
        .unwrap();
        assert_eq!(core.traversal_order(), vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_traversal_order_all_equal() {
        let core = StrategyCore::new(&[2, 2, 2]).unwrap();
        assert_eq!(core.traversal_order(), vec![0, 1, 2]);
    }

    #[test]
    fn test_check_position() {
        let core = StrategyCore::new(&[5, 5]).unwrap();
        assert!(core.check_position(&[4, 0]).is_ok());
        assert!(matches!(
            core.check_position(&[1]),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(core.check_position(&[5, 0]), Err(Error::InvalidAxis(_))));
    }

    #[test]
    fn test_zero_length_axis_rejected() {
        assert!(StrategyCore::new(&[3, 0]).is_err());
        assert!(StrategyCore::new(&[]).is_err());
    }

    #[test]
    fn test_load_list_dedups() {
        let lengths = [2];
        let mut list = LoadList::new(&lengths);
        list.push(vec![0]);
        list.push(vec![1]);
        list.push(vec![0]);
        assert_eq!(list.into_positions().len(), 2);
    }

    #[test]
    fn test_setters_report_change() {
        let mut strategy = CrosshairStrategy::new(&[4, 4]).unwrap();
        assert!(strategy.set_priority(1, 3).unwrap());
        assert!(!strategy.set_priority(1, 3).unwrap());
        assert!(strategy.set_range(0, 1, 2).unwrap());
        assert_eq!(strategy.range(0).unwrap(), (1, 2));
        assert!(strategy.set_order(0, Order::Backward).unwrap());
        assert_eq!(strategy.order(0).unwrap(), Order::Backward);
        assert!(matches!(strategy.set_priority(2, 0), Err(Error::InvalidAxis(_))));
    }

    #[test]
    fn test_build_strategy() {
        let strategy = build_strategy(StrategyKind::Rectangle, vec![Axis::new(3), Axis::new(2)]).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::Rectangle);
        assert_eq!(strategy.lengths(), &[3, 2]);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("Forward".parse::<Order>().unwrap(), Order::Forward);
        assert_eq!("rectangle".parse::<StrategyKind>().unwrap(), StrategyKind::Rectangle);
        assert!("diagonal".parse::<StrategyKind>().is_err());
    }
}
