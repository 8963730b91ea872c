/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{GlobalArgs, StoreArgs};
use anyhow::{Context, Result, bail, ensure};
use clap::Parser;
use dsi_progress_logger::{ProgressLog, progress_logger};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use webgraph_ppr::prelude::*;
use webgraph_ppr::shuffle::HashPartitioner;
use webgraph_ppr::store::snapshot_name;

#[derive(Parser, Debug)]
#[command(
    about = "Builds the initial snapshot of a computation from an adjacency-list file. Each line contains a vertex id followed by the ids of its successors, separated by a TAB (but the separator is customizable). Vertex ids must be positive.",
    long_about = None
)]
pub struct CliArgs {
    /// The adjacency-list file.
    pub graph: PathBuf,

    #[clap(flatten)]
    pub store: StoreArgs,

    #[arg(short = 'p', long, default_value_t = 1)]
    /// The number of partitions of the snapshot.
    pub num_partitions: usize,

    #[arg(long, default_value_t = '#')]
    /// Lines starting with this symbol are ignored.
    pub line_comment_symbol: char,

    #[arg(long, default_value_t = '\t')]
    /// The separator between ids on a line.
    pub separator: char,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(
        args.num_partitions > 0,
        "The number of partitions must be positive"
    );
    let file = File::open(&args.graph)
        .with_context(|| format!("Could not open {}", args.graph.display()))?;
    log::info!("Reading adjacency lists from {}", args.graph.display());
    let adjacency = read_adjacency(
        BufReader::new(file),
        args.line_comment_symbol,
        args.separator,
    )?;

    let store = DirGraphStore::new(&args.store.base)?;
    init(global_args, &store, &args.store.sources, adjacency, args.num_partitions)
}

/// Reads adjacency lists, one vertex per line.
///
/// Blank lines and lines starting with `comment` are skipped; a vertex may
/// appear only once.
pub fn read_adjacency(
    reader: impl BufRead,
    comment: char,
    separator: char,
) -> Result<Vec<(u64, Vec<u64>)>> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(comment) {
            continue;
        }
        let mut ids = trimmed
            .split(separator)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<u64>()
                    .with_context(|| format!("Line {}: invalid vertex id {:?}", line_num + 1, t))
            });
        let Some(id) = ids.next().transpose()? else {
            continue;
        };
        let successors = ids.collect::<Result<Vec<_>>>()?;
        ensure!(
            id > 0 && successors.iter().all(|&s| s > 0),
            "Line {}: vertex ids must be positive",
            line_num + 1
        );
        if !seen.insert(id) {
            bail!("Line {}: vertex {} appears more than once", line_num + 1, id);
        }
        result.push((id, successors));
    }
    Ok(result)
}

/// Writes the initial snapshot of the given graph to the store, and records
/// the source set so that later runs cannot reorder its columns.
pub fn init(
    global_args: GlobalArgs,
    store: &impl GraphStore,
    sources: &SourceSet,
    adjacency: Vec<(u64, Vec<u64>)>,
    num_partitions: usize,
) -> Result<()> {
    let ids = adjacency.iter().map(|(id, _)| *id).collect::<HashSet<_>>();
    for &source in sources.ids() {
        ensure!(
            ids.contains(&source),
            "Source {} is not a vertex of the graph",
            source
        );
    }
    let undefined = adjacency
        .iter()
        .flat_map(|(_, successors)| successors)
        .filter(|s| !ids.contains(*s))
        .count();
    if undefined > 0 {
        log::warn!(
            "{} arcs point to vertices without an adjacency line; their mass will be lost",
            undefined
        );
    }

    let mut pl = progress_logger![];
    pl.display_memory(true)
        .item_name("node")
        .expected_updates(Some(adjacency.len()));
    if let Some(duration) = global_args.log_interval {
        pl.log_interval(duration);
    }
    pl.start("Building the initial snapshot...");

    let partitioner = HashPartitioner::new(num_partitions);
    let mut partitions = vec![Vec::new(); num_partitions];
    for (id, successors) in adjacency {
        partitions[partitioner.partition(id)].push(Node::new(
            id,
            successors,
            sources.initial_rank(id),
        ));
        pl.light_update();
    }
    for partition in &mut partitions {
        partition.sort_unstable_by_key(|node: &Node| node.id);
    }
    pl.done();

    let snapshot = snapshot_name(0);
    store.write(&snapshot, partitions)?;
    store.put_sources(sources)?;
    log::info!(
        "Wrote snapshot {} with {} partitions",
        snapshot,
        num_partitions
    );
    Ok(())
}
