//! JSON configuration for strategies
//!
//! ```json
//! {
//!   "strategy": "rectangle",
//!   "axes": [
//!     { "name": "Z", "length": 20, "forward": 2, "backward": 2 },
//!     { "name": "C", "length": 3, "priority": 1, "order": "forward" }
//!   ]
//! }
//! ```

use std::fs;
use std::path::Path;

use planesource::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::strategy::{build_strategy, Axis, Order, Strategy, StrategyKind};

/// Settings of one axis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Display name, e.g. `Z`, `C` or `T`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Extent of the axis
    pub length: usize,
    /// Traversal priority
    #[serde(default)]
    pub priority: i32,
    /// Forward reach
    #[serde(default)]
    pub forward: usize,
    /// Backward reach
    #[serde(default)]
    pub backward: usize,
    /// Walk order
    #[serde(default)]
    pub order: Order,
}

impl From<&AxisConfig> for Axis {
    fn from(config: &AxisConfig) -> Self {
        Axis::new(config.length)
            .with_priority(config.priority)
            .with_range(config.forward, config.backward)
            .with_order(config.order)
    }
}

/// Strategy kind plus per-axis settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Which strategy to build
    #[serde(default)]
    pub strategy: StrategyKind,
    /// One entry per axis, first axis varying fastest in raster order
    pub axes: Vec<AxisConfig>,
}

impl CacheConfig {
    /// Config with default axis settings for `lengths`
    pub fn with_lengths(strategy: StrategyKind, lengths: &[usize]) -> Self {
        Self {
            strategy,
            axes: lengths
                .iter()
                .map(|&length| AxisConfig {
                    name: None,
                    length,
                    priority: 0,
                    forward: 0,
                    backward: 0,
                    order: Order::Centered,
                })
                .collect(),
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Check that there is at least one axis and no axis is empty
    pub fn validate(&self) -> Result<()> {
        if self.axes.is_empty() {
            return Err(Error::Config("at least one axis is required".to_string()));
        }
        for (i, axis) in self.axes.iter().enumerate() {
            if axis.length == 0 {
                let name = axis.name.clone().unwrap_or_else(|| i.to_string());
                return Err(Error::Config(format!("axis {} has length 0", name)));
            }
        }
        Ok(())
    }

    /// Axis lengths
    pub fn lengths(&self) -> Vec<usize> {
        self.axes.iter().map(|a| a.length).collect()
    }

    /// Axis names, defaulting to the axis number
    pub fn axis_names(&self) -> Vec<String> {
        self.axes
            .iter()
            .enumerate()
            .map(|(i, a)| a.name.clone().unwrap_or_else(|| i.to_string()))
            .collect()
    }

    /// Build the configured strategy
    pub fn build_strategy(&self) -> Result<Box<dyn Strategy>> {
        self.validate()?;
        build_strategy(self.strategy, self.axes.iter().map(Axis::from).collect())
    }
}
