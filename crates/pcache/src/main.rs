//! PlaneCache console - drive a prefetching plane cache interactively

mod command;
mod plane;
mod session;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use planecache::{CacheConfig, StrategyKind};
use planesource::{total_count, PixelType};
use tracing::info;

use crate::command::Command;
use crate::plane::{Dataset, SourceKind};
use crate::session::{build_cache, Session};

const DEFAULT_AXIS_NAMES: [&str; 3] = ["Z", "C", "T"];

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Axis lengths, first axis varying fastest
    #[arg(short, long, value_delimiter = ',', default_value = "5,4,3")]
    sizes: Vec<usize>,

    /// Strategy: crosshair or rectangle
    #[arg(short = 'g', long, default_value = "crosshair")]
    strategy: StrategyKind,

    /// Forward and backward reach on every axis
    #[arg(short, long, default_value_t = 1)]
    range: usize,

    /// JSON strategy config; overrides sizes, strategy and range
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plane width in pixels
    #[arg(long, default_value_t = 64)]
    width: usize,

    /// Plane height in pixels
    #[arg(long, default_value_t = 64)]
    height: usize,

    /// Pixel type of the synthetic dataset
    #[arg(long, default_value = "uint8")]
    pixel_type: PixelType,

    /// Source adapter: bytes or image
    #[arg(long, default_value = "image")]
    source: SourceKind,

    /// Start the background updater right away
    #[arg(long)]
    prefetch: bool,
}

impl Args {
    fn cache_config(&self) -> Result<CacheConfig> {
        if let Some(path) = &self.config {
            info!("Loading strategy config from {}", path.display());
            return Ok(CacheConfig::load(path)?);
        }

        let mut config = CacheConfig::with_lengths(self.strategy, &self.sizes);
        for (i, axis) in config.axes.iter_mut().enumerate() {
            axis.name = DEFAULT_AXIS_NAMES.get(i).map(|n| n.to_string());
            axis.forward = self.range;
            axis.backward = self.range;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Logs go to stderr so they don't interleave with console output
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.cache_config()?;

    let dataset = Dataset {
        planes: total_count(&config.lengths()),
        width: args.width,
        height: args.height,
        pixel_type: args.pixel_type,
    };

    info!("Starting PlaneCache console v{}", env!("CARGO_PKG_VERSION"));
    info!("Axes: {:?} ({} planes)", config.lengths(), dataset.planes);
    info!(
        "Planes: {}x{} {}",
        dataset.width, dataset.height, dataset.pixel_type
    );

    let cache = build_cache(&config, dataset, args.source)?;
    info!("Cache ready: {}", cache.describe());

    println!("PlaneCache console. Type 'help' for commands.");
    println!("  {}", cache.describe());

    let mut session = Session::new(cache, config.axis_names(), dataset, io::stdout())
        .with_prompt("> ");
    if args.prefetch {
        session.execute(Command::Prefetch)?;
    }
    session.run(io::stdin().lock())
}
