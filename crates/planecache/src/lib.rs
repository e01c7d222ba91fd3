//! # planecache
//!
//! Multi-dimensional prefetching cache for decoded image planes.
//!
//! ## Architecture
//! - **Strategy**: computes the working set around a focal position
//!   (crosshair or rectangle neighborhood, per-axis priority/reach/order)
//! - **Cache**: keeps exactly the working set resident, fetching from a
//!   [`Source`] and evicting everything else
//! - **CacheUpdater**: cancellable background prefetch of the working set
//! - **EventChannel**: broadcasts state transitions to listeners
//!
//! ```ignore
//! use planecache::{Cache, CrosshairStrategy, Strategy};
//! use planesource::{ByteSource, PixelType, SyntheticReader};
//!
//! let mut strategy = CrosshairStrategy::new(&[10, 3])?;
//! strategy.set_range(0, 2, 2)?;
//! let source = ByteSource::new(SyntheticReader::new(30, 64, 64, PixelType::Uint8));
//! let cache = Cache::new(strategy, source);
//! let plane = cache.get_object(&[4, 1])?;
//! ```

#![warn(missing_docs)]

mod cache;
mod config;
mod event;
mod stats;
mod strategy;
mod updater;

pub use cache::Cache;
pub use config::{AxisConfig, CacheConfig};
pub use event::{CacheEvent, CacheListener, EventChannel};
pub use stats::CacheStats;
pub use strategy::{
    build_strategy, Axis, CrosshairStrategy, Order, RectangleStrategy, Strategy, StrategyCore,
    StrategyKind,
};
pub use updater::CacheUpdater;

pub use planesource::{Error, Position, Result, Source, SourceError};
