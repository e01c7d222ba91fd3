//! Console session: executes commands against a cache

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use planecache::{Cache, CacheConfig, CacheEvent, CacheListener, CacheUpdater, Position};
use planesource::raster_to_position;
use tracing::{info, warn};

use crate::command::{parse_command, AxisRef, Command, HELP};
use crate::plane::{Dataset, Plane, SourceKind};

/// Whether the session should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Events collected by the console listener, printed between commands
struct EventLog {
    enabled: AtomicBool,
    pending: Mutex<Vec<CacheEvent>>,
}

/// Build the console cache from a config and populate it around the origin
pub fn build_cache(
    config: &CacheConfig,
    dataset: Dataset,
    kind: SourceKind,
) -> Result<Cache<Plane>> {
    let cache = Cache::empty();
    cache.set_boxed_strategy(config.build_strategy()?)?;
    cache.set_boxed_source(dataset.source(kind))?;
    Ok(cache)
}

pub struct Session<W: Write> {
    cache: Cache<Plane>,
    dataset: Dataset,
    names: Vec<String>,
    updater: Option<CacheUpdater>,
    events: Arc<EventLog>,
    prompt: Option<String>,
    out: W,
}

impl<W: Write> Session<W> {
    pub fn new(cache: Cache<Plane>, names: Vec<String>, dataset: Dataset, out: W) -> Self {
        let events = Arc::new(EventLog {
            enabled: AtomicBool::new(true),
            pending: Mutex::new(Vec::new()),
        });
        let sink = Arc::clone(&events);
        let listener: Arc<dyn CacheListener> = Arc::new(move |event: &CacheEvent| {
            if sink.enabled.load(Ordering::Relaxed) {
                sink.pending.lock().push(*event);
            }
        });
        cache.subscribe(listener);

        Self {
            cache,
            dataset,
            names,
            updater: None,
            events,
            prompt: None,
            out,
        }
    }

    /// Print `prompt` before reading each line
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = Some(prompt.to_string());
        self
    }

    /// Read and execute commands until `quit` or end of input
    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        self.print_prompt()?;
        for line in input.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                let flow = match parse_command(&line) {
                    Ok(cmd) => match self.execute(cmd) {
                        Ok(flow) => flow,
                        Err(e) => {
                            warn!("Command '{}' failed: {:#}", line.trim(), e);
                            writeln!(self.out, "error: {:#}", e)?;
                            Flow::Continue
                        }
                    },
                    Err(msg) => {
                        writeln!(self.out, "{}", msg)?;
                        Flow::Continue
                    }
                };
                self.print_events()?;
                if flow == Flow::Quit {
                    break;
                }
            }
            self.print_prompt()?;
        }
        self.stop_updater();
        self.out.flush()?;
        Ok(())
    }

    /// Execute one command
    pub fn execute(&mut self, cmd: Command) -> Result<Flow> {
        match cmd {
            Command::Help => writeln!(self.out, "{}", HELP)?,
            Command::Info => self.print_info()?,
            Command::Get(coords) => {
                let plane = self.cache.get_object(&coords)?;
                writeln!(self.out, "{} -> {}", Position::new(coords), plane)?;
            }
            Command::List => {
                let list = self.cache.load_list()?;
                let focal = self.cache.current_position();
                writeln!(self.out, "{} positions around {}", list.len(), focal)?;
                for pos in list {
                    writeln!(self.out, "  {}", pos)?;
                }
            }
            Command::Resident => {
                let lengths = self.lengths()?;
                let indices = self.cache.resident_indices();
                writeln!(self.out, "{} resident", indices.len())?;
                for index in indices {
                    writeln!(self.out, "  {} {}", index, raster_to_position(&lengths, index)?)?;
                }
            }
            Command::Priority(axis, priority) => {
                let axis = self.resolve_axis(&axis)?;
                self.cache.set_priority(axis, priority)?;
                writeln!(self.out, "{} priority {}", self.axis_name(axis), priority)?;
            }
            Command::Range(axis, forward, backward) => {
                let axis = self.resolve_axis(&axis)?;
                let backward = backward.unwrap_or(forward);
                self.cache.set_range(axis, forward, backward)?;
                let name = self.axis_name(axis);
                writeln!(self.out, "{} range +{}/-{}", name, forward, backward)?;
            }
            Command::Order(axis, order) => {
                let axis = self.resolve_axis(&axis)?;
                self.cache.set_order(axis, order)?;
                writeln!(self.out, "{} order {}", self.axis_name(axis), order)?;
            }
            Command::Strategy(kind) => {
                let axes = self.cache.axes()?;
                let strategy = planecache::build_strategy(kind, axes)?;
                self.paused(|cache| cache.set_boxed_strategy(strategy))?;
                writeln!(self.out, "strategy {}", kind)?;
            }
            Command::Source(kind) => {
                let source = self.dataset.source(kind);
                self.paused(|cache| cache.set_boxed_source(source))?;
                writeln!(self.out, "source {}", self.cache.describe())?;
            }
            Command::Events(on) => {
                self.events.enabled.store(on, Ordering::Relaxed);
                writeln!(self.out, "events {}", if on { "on" } else { "off" })?;
            }
            Command::Prefetch => {
                if self.updater_running() {
                    writeln!(self.out, "updater already running")?;
                } else {
                    self.updater = Some(CacheUpdater::start(&self.cache)?);
                    writeln!(self.out, "updater started")?;
                }
            }
            Command::Stop => {
                let was_running = self.stop_updater();
                let state = if was_running { "stopped" } else { "not running" };
                writeln!(self.out, "updater {}", state)?;
            }
            Command::Reset => {
                self.cache.reset();
                writeln!(self.out, "cache emptied")?;
            }
            Command::Stats => self.print_stats()?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Stop the session and hand back the output
    pub fn into_output(mut self) -> W {
        self.stop_updater();
        self.out
    }

    fn print_prompt(&mut self) -> Result<()> {
        if let Some(prompt) = &self.prompt {
            write!(self.out, "{}", prompt)?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn print_events(&mut self) -> Result<()> {
        let events: Vec<CacheEvent> = std::mem::take(&mut *self.events.pending.lock());
        if events.is_empty() {
            return Ok(());
        }
        let lengths = self.lengths().unwrap_or_default();
        for event in events {
            match event.index().map(|i| raster_to_position(&lengths, i)) {
                Some(Ok(pos)) => writeln!(self.out, "  event {} {}", event, pos)?,
                _ => writeln!(self.out, "  event {}", event)?,
            }
        }
        Ok(())
    }

    fn print_info(&mut self) -> Result<()> {
        writeln!(self.out, "cache: {}", self.cache.describe())?;
        writeln!(self.out, "position: {}", self.cache.current_position())?;
        for (i, axis) in self.cache.axes()?.iter().enumerate() {
            writeln!(
                self.out,
                "  {:<4} length {:<4} priority {:<3} range +{}/-{} {}",
                self.axis_name(i),
                axis.length,
                axis.priority,
                axis.forward,
                axis.backward,
                axis.order
            )?;
        }
        writeln!(
            self.out,
            "resident: {} of {}",
            self.cache.resident_count(),
            self.cache.source_count()
        )?;
        let updater = if self.updater_running() { "running" } else { "stopped" };
        writeln!(self.out, "updater: {}", updater)?;
        Ok(())
    }

    fn print_stats(&mut self) -> Result<()> {
        let stats = self.cache.stats();
        writeln!(
            self.out,
            "hits {}  misses {}  hit ratio {:.1}%",
            stats.hits(),
            stats.misses(),
            stats.hit_ratio() * 100.0
        )?;
        writeln!(
            self.out,
            "loads {}  drops {}  source errors {}",
            stats.loads(),
            stats.drops(),
            stats.source_errors()
        )?;
        Ok(())
    }

    fn lengths(&self) -> Result<Vec<usize>> {
        Ok(self.cache.axes()?.iter().map(|a| a.length).collect())
    }

    fn axis_name(&self, axis: usize) -> String {
        self.names
            .get(axis)
            .cloned()
            .unwrap_or_else(|| axis.to_string())
    }

    fn resolve_axis(&self, axis: &AxisRef) -> Result<usize> {
        match axis {
            AxisRef::Index(i) => Ok(*i),
            AxisRef::Name(name) => self
                .names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(name))
                .ok_or_else(|| anyhow!("unknown axis '{}'", name)),
        }
    }

    fn updater_running(&self) -> bool {
        self.updater.as_ref().is_some_and(|u| u.is_running())
    }

    /// Returns whether an updater was running
    fn stop_updater(&mut self) -> bool {
        match self.updater.take() {
            Some(mut updater) => {
                let running = updater.is_running();
                updater.quit();
                running
            }
            None => false,
        }
    }

    /// Run `f` with the updater stopped, restarting it afterwards
    fn paused<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&Cache<Plane>) -> planecache::Result<()>,
    {
        let was_running = self.stop_updater();
        let result = f(&self.cache);
        if was_running {
            info!("Restarting cache updater");
            self.updater = Some(CacheUpdater::start(&self.cache)?);
        }
        Ok(result?)
    }
}
