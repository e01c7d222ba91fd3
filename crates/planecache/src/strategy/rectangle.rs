//! Rectangle strategy: the full hyper-rectangle around the focal position

use planesource::{Position, Result};

use super::{Axis, LoadList, Strategy, StrategyCore, StrategyKind};

/// Keeps every position inside the per-axis reach of the focal position
///
/// Enumeration is an odometer over the per-axis walks: the first axis in
/// traversal order turns fastest and carries into the next one.
#[derive(Debug, Clone)]
pub struct RectangleStrategy {
    core: StrategyCore,
}

impl RectangleStrategy {
    /// Strategy over `lengths` with default axis settings
    pub fn new(lengths: &[usize]) -> Result<Self> {
        Ok(Self {
            core: StrategyCore::new(lengths)?,
        })
    }

    /// Strategy over fully specified axes
    pub fn from_axes(axes: Vec<Axis>) -> Result<Self> {
        Ok(Self {
            core: StrategyCore::from_axes(axes)?,
        })
    }
}

impl Strategy for RectangleStrategy {
    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Rectangle
    }

    fn select(&self, pos: &[usize]) -> Vec<Position> {
        let axes = self.core.axes();
        let order = self.core.traversal_order();
        let offsets: Vec<Vec<isize>> = axes.iter().map(Axis::offsets).collect();
        let mut digits = vec![0usize; axes.len()];
        let mut list = LoadList::new(self.core.lengths());

        loop {
            list.push(
                axes.iter()
                    .enumerate()
                    .map(|(a, axis)| axis.wrap(pos[a], offsets[a][digits[a]]))
                    .collect(),
            );

            let mut rolled_over = true;
            for &a in &order {
                digits[a] += 1;
                if digits[a] < offsets[a].len() {
                    rolled_over = false;
                    break;
                }
                digits[a] = 0;
            }
            if rolled_over {
                break;
            }
        }
        list.into_positions()
    }

    fn max_load(&self) -> usize {
        self.core
            .axes()
            .iter()
            .map(|a| a.forward.saturating_add(a.backward).saturating_add(1))
            .fold(1, usize::saturating_mul)
    }
}
