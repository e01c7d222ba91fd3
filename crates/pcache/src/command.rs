//! Console command parser

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while1};
use nom::character::complete::{alpha1, char, digit1, multispace0, multispace1};
use nom::combinator::{all_consuming, map, map_res, not, opt, recognize, value};
use nom::multi::many1;
use nom::sequence::{pair, preceded, terminated, tuple};
use nom::IResult;
use planecache::{Order, StrategyKind};

use crate::plane::SourceKind;

/// Axis given by number or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AxisRef {
    Index(usize),
    Name(String),
}

/// One console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Info,
    Get(Vec<usize>),
    List,
    Resident,
    Priority(AxisRef, i32),
    /// Forward reach, then backward reach (defaults to forward)
    Range(AxisRef, usize, Option<usize>),
    Order(AxisRef, Order),
    Strategy(StrategyKind),
    Source(SourceKind),
    Events(bool),
    Prefetch,
    Stop,
    Reset,
    Stats,
    Quit,
}

pub const HELP: &str = "\
Commands:
  get <c0> <c1> ...            fetch the plane at a position (alias: pos)
  list                         load list around the current position
  resident                     positions currently in the cache
  priority <axis> <value>      set axis priority
  range <axis> <fwd> [<back>]  set axis reach
  order <axis> centered|forward|backward
  strategy crosshair|rectangle
  source bytes|image
  events on|off                print cache events
  prefetch                     start the background updater
  stop                         stop the background updater
  reset                        empty the cache
  info                         cache settings
  stats                        hit/miss counters
  help                         this text
  quit                         exit
Axes are given by number or by name.";

/// Parse one input line
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if line == "?" {
        return Ok(Command::Help);
    }
    match all_consuming(terminated(command, multispace0))(line) {
        Ok((_, cmd)) => Ok(cmd),
        Err(_) => Err(format!("cannot parse '{}', type 'help' for commands", line)),
    }
}

fn command(input: &str) -> IResult<&str, Command> {
    let (rest, name) = alpha1(input)?;
    match name.to_ascii_lowercase().as_str() {
        "help" | "h" => Ok((rest, Command::Help)),
        "info" | "i" => Ok((rest, Command::Info)),
        "get" | "pos" | "p" => map(many1(arg(unsigned)), Command::Get)(rest),
        "list" | "l" => Ok((rest, Command::List)),
        "resident" => Ok((rest, Command::Resident)),
        "priority" => map(pair(arg(axis_ref), arg(signed)), |(axis, p)| {
            Command::Priority(axis, p)
        })(rest),
        "range" => map(
            tuple((arg(axis_ref), arg(unsigned), opt(arg(unsigned)))),
            |(axis, fwd, back)| Command::Range(axis, fwd, back),
        )(rest),
        "order" => map(pair(arg(axis_ref), arg(order)), |(axis, o)| {
            Command::Order(axis, o)
        })(rest),
        "strategy" => map(arg(strategy_kind), Command::Strategy)(rest),
        "source" => map(arg(source_kind), Command::Source)(rest),
        "events" => map(arg(on_off), Command::Events)(rest),
        "prefetch" => Ok((rest, Command::Prefetch)),
        "stop" => Ok((rest, Command::Stop)),
        "reset" => Ok((rest, Command::Reset)),
        "stats" => Ok((rest, Command::Stats)),
        "quit" | "q" | "exit" => Ok((rest, Command::Quit)),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn arg<'a, O>(
    parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, O> {
    preceded(multispace1, parser)
}

fn unsigned(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

fn signed(input: &str) -> IResult<&str, i32> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i32>)(input)
}

fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn axis_ref(input: &str) -> IResult<&str, AxisRef> {
    alt((
        map(terminated(unsigned, not(word)), AxisRef::Index),
        map(word, |s: &str| AxisRef::Name(s.to_string())),
    ))(input)
}

fn order(input: &str) -> IResult<&str, Order> {
    map_res(alpha1, str::parse::<Order>)(input)
}

fn strategy_kind(input: &str) -> IResult<&str, StrategyKind> {
    map_res(alpha1, str::parse::<StrategyKind>)(input)
}

fn source_kind(input: &str) -> IResult<&str, SourceKind> {
    map_res(alpha1, str::parse::<SourceKind>)(input)
}

fn on_off(input: &str) -> IResult<&str, bool> {
    alt((value(true, tag_no_case("on")), value(false, tag_no_case("off"))))(input)
}
