/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{GlobalArgs, NumThreadsArg, StoreArgs, get_thread_pool};
use anyhow::{Result, ensure};
use clap::Parser;
use dsi_progress_logger::{ProgressLog, concurrent_progress_logger, progress_logger};
use predicates::prelude::*;
use webgraph_ppr::prelude::*;

#[derive(Parser, Debug)]
#[command(
    about = "Computes multi-source personalized PageRank iterating from the snapshot of a starting iteration.",
    long_about = None
)]
pub struct CliArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    #[arg(long, default_value_t = 0)]
    /// The iteration of the input snapshot.
    pub start: usize,

    #[arg(short, long)]
    /// The iteration of the last snapshot to compute.
    pub end: usize,

    #[arg(short, long)]
    /// The number of vertices of the graph; if specified, every snapshot is
    /// checked against it.
    pub num_nodes: Option<usize>,

    #[arg(short = 'c', long)]
    /// Whether to combine mass messages before the shuffle.
    pub use_combiner: bool,

    #[arg(short, long, default_value_t = PersonalizedPageRank::<DirGraphStore>::DEFAULT_ALPHA)]
    /// The probability α of jumping back to the source (must be in the
    /// interval (0 . . 1)).
    pub alpha: f64,

    #[arg(short, long)]
    /// Stop when the ℓ₁ distance between consecutive snapshots falls below
    /// this threshold.
    pub threshold: Option<f64>,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(
        args.start < args.end,
        "The end iteration must be greater than the start iteration, got {} and {}",
        args.start,
        args.end
    );
    ensure!(
        args.alpha > 0.0 && args.alpha < 1.0,
        "The jump probability must be in (0 . . 1), got {}",
        args.alpha
    );

    let mut pl = progress_logger![];
    pl.display_memory(true);
    if let Some(log_interval) = global_args.log_interval {
        pl.log_interval(log_interval);
    }

    let mut cpl = concurrent_progress_logger![];
    cpl.display_memory(true);
    if let Some(log_interval) = global_args.log_interval {
        cpl.log_interval(log_interval);
    }

    let thread_pool = get_thread_pool(args.num_threads.num_threads)?;

    let store = DirGraphStore::new(&args.store.base)?;

    // Build stopping predicate
    let mut predicate = MaxIter::from(args.end - args.start).boxed();
    if let Some(threshold) = args.threshold {
        predicate = predicate.or(L1Norm::try_from(threshold)?).boxed();
    }

    let mut ppr = PersonalizedPageRank::new(&store, &args.store.sources);
    ppr.alpha(args.alpha)
        .combiner(args.use_combiner)
        .num_nodes(args.num_nodes)
        .track_norm_delta(args.threshold.is_some());

    ppr.run_with_logging(
        args.start..args.end,
        predicate,
        &thread_pool,
        &mut pl,
        &mut cpl,
    )?;

    if let Some(last) = ppr.reports().last() {
        log::info!(
            "Completed {} iteration(s), last snapshot: {}",
            ppr.reports().len(),
            webgraph_ppr::store::snapshot_name(last.iteration + 1)
        );
        log::info!(
            "Total mass per source: {:?}",
            last.total_mass.iter().map(|m| m.exp()).collect::<Vec<_>>()
        );
    }

    Ok(())
}
