/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]
#![allow(clippy::type_complexity)]

use anyhow::{Context, Result, bail, ensure};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;
use webgraph_ppr::sources::SourceSet;

pub mod init;
pub mod run;
pub mod top;

/// Parses the number of threads from a string.
///
/// This function is meant to be used with `#[arg(...,  value_parser =
/// num_threads_parser)]`.
pub fn num_threads_parser(arg: &str) -> Result<usize> {
    let num_threads = arg.parse::<usize>()?;
    ensure!(num_threads > 0, "Number of threads must be greater than 0");
    Ok(num_threads)
}

/// Shared CLI arguments for commands that specify a number of threads.
#[derive(Args, Debug)]
pub struct NumThreadsArg {
    #[arg(short = 'j', long, default_value_t = rayon::current_num_threads().max(1), value_parser = num_threads_parser)]
    /// The number of threads to use.
    pub num_threads: usize,
}

/// Shared CLI arguments locating the snapshots of a computation.
#[derive(Args, Debug)]
pub struct StoreArgs {
    #[arg(short, long)]
    /// The directory containing the snapshots.
    pub base: PathBuf,

    #[arg(short, long)]
    /// The comma-separated list of source vertices; the order of the list
    /// fixes the columns of the rank vectors.
    pub sources: SourceSet,
}

/// Creates a [`ThreadPool`](rayon::ThreadPool) with the given number of threads.
pub fn get_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to create thread pool")?;
    log::info!("Using {} threads", thread_pool.current_num_threads());
    Ok(thread_pool)
}

/// Parses a logging interval.
///
/// Every amount may be followed by a unit: `s` (seconds), `m` (minutes),
/// `h` (hours) or `d` (days). A trailing amount without unit is in
/// milliseconds, so `1m30s250` is 90.25 seconds and `500` is half a second.
fn parse_duration(value: &str) -> Result<Duration> {
    ensure!(
        !value.trim().is_empty(),
        "Empty duration; use 0 to log at every update"
    );
    let mut duration = Duration::ZERO;
    let mut digits = String::new();
    for c in value.chars().filter(|c| !c.is_whitespace()) {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit_secs: u64 = match c {
            's' => 1,
            'm' => 60,
            'h' => 60 * 60,
            'd' => 24 * 60 * 60,
            _ => bail!("Invalid duration unit {:?} in {:?}", c, value),
        };
        let amount: u64 = digits
            .parse()
            .with_context(|| format!("Missing amount before {:?} in {:?}", c, value))?;
        duration += Duration::from_secs(amount * unit_secs);
        digits.clear();
    }
    if !digits.is_empty() {
        duration += Duration::from_millis(digits.parse()?);
    }
    Ok(duration)
}

/// Initializes the `env_logger` logger with a custom format including
/// timestamps with elapsed time since initialization.
pub fn init_env_logger() -> Result<()> {
    use jiff::SpanRound;
    use jiff::fmt::friendly::{Designator, Spacing, SpanPrinter};

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let start = std::time::Instant::now();
    let printer = SpanPrinter::new()
        .spacing(Spacing::None)
        .designator(Designator::Compact);
    let span_round = SpanRound::new()
        .largest(jiff::Unit::Day)
        .smallest(jiff::Unit::Millisecond)
        .days_are_24_hours();

    builder.format(move |buf, record| {
        let Ok(ts) = jiff::Timestamp::try_from(SystemTime::now()) else {
            return Err(std::io::Error::other("Failed to get timestamp"));
        };
        let style = buf.default_level_style(record.level());
        let elapsed = start.elapsed();
        let span = jiff::Span::new()
            .seconds(elapsed.as_secs() as i64)
            .milliseconds(elapsed.subsec_millis() as i64);
        let span = span.round(span_round).map_err(std::io::Error::other)?;
        writeln!(
            buf,
            "{} {} {style}{}{style:#} [{:?}] {} - {}",
            ts.strftime("%F %T%.3f"),
            printer.span_to_string(&span),
            record.level(),
            std::thread::current().id(),
            record.target(),
            record.args()
        )
    });
    builder.try_init()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_duration, global=true, display_order = 1000)]
    /// How often to log progress (default: 10s). Amounts take the units
    /// "s", "m", "h" or "d"; a trailing amount without unit is in
    /// milliseconds (e.g., "1m30s250").
    pub log_interval: Option<Duration>,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    Init(init::CliArgs),
    Run(run::CliArgs),
    Top(top::CliArgs),
}

#[derive(Parser, Debug)]
#[command(name = "webgraph-ppr", version)]
/// Tools computing multi-source personalized PageRank on graphs stored as
/// partitioned snapshots.
///
/// Noteworthy environment variables:
///
/// - RUST_MIN_STACK: minimum thread stack size (in bytes)
///
/// - RUST_LOG: configuration for env_logger
///   <https://docs.rs/env_logger/latest/env_logger/>
pub struct Cli {
    #[command(subcommand)]
    pub command: SubCommands,
    #[clap(flatten)]
    pub args: GlobalArgs,
}

/// The entry point of the command-line interface.
pub fn cli_main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let start = std::time::Instant::now();
    let cli = Cli::parse_from(args);
    match cli.command {
        SubCommands::Init(args) => {
            init::main(cli.args, args)?;
        }
        SubCommands::Run(args) => {
            run::main(cli.args, args)?;
        }
        SubCommands::Top(args) => {
            top::main(cli.args, args)?;
        }
    }

    log::info!(
        "The command took {}",
        pretty_print_elapsed(start.elapsed().as_secs_f64())
    );

    Ok(())
}

/// Formats an elapsed time, given in seconds, splitting whole weeks, days,
/// hours and minutes.
fn pretty_print_elapsed(elapsed: f64) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("week", 7 * 24 * 60 * 60),
        ("day", 24 * 60 * 60),
        ("hour", 60 * 60),
        ("minute", 60),
    ];
    let mut remaining = elapsed as u64;
    let mut result = String::new();
    for (name, unit_secs) in UNITS {
        let amount = remaining / unit_secs;
        remaining %= unit_secs;
        match amount {
            0 => {}
            1 => result.push_str(&format!("1 {name} ")),
            _ => result.push_str(&format!("{amount} {name}s ")),
        }
    }
    result.push_str(&format!("{:.3} seconds ({elapsed}s)", elapsed % 60.0));
    result
}
