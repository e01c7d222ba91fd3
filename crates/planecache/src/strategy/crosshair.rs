//! Crosshair strategy: one line segment per axis through the focal position

use planesource::{Position, Result};

use super::{Axis, LoadList, Strategy, StrategyCore, StrategyKind};

/// Keeps the focal position plus, for each axis independently, the positions
/// reached by varying only that axis within its reach
#[derive(Debug, Clone)]
pub struct CrosshairStrategy {
    core: StrategyCore,
}

impl CrosshairStrategy {
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

impl Strategy for CrosshairStrategy {
    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut StrategyCore {
        &mut self.core
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Crosshair
    }

    fn select(&self, pos: &[usize]) -> Vec<Position> {
        let axes = self.core.axes();
        let mut list = LoadList::new(self.core.lengths());
        list.push(pos.to_vec());

        for a in self.core.traversal_order() {
            let axis = &axes[a];
            for offset in axis.offsets().into_iter().skip(1) {
                let mut coords = pos.to_vec();
                coords[a] = axis.wrap(pos[a], offset);
                list.push(coords);
            }
        }
        list.into_positions()
    }

    fn max_load(&self) -> usize {
        self.core
            .axes()
            .iter()
            .map(|a| a.forward.saturating_add(a.backward))
            .fold(1, usize::saturating_add)
    }
}
