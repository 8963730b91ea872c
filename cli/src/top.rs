/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{GlobalArgs, StoreArgs};
use anyhow::{Result, ensure};
use clap::Parser;
use itertools::Itertools;
use std::io::Write;
use webgraph_ppr::prelude::*;
use webgraph_ppr::store::{check_sources, snapshot_name};

#[derive(Parser, Debug)]
#[command(
    about = "Prints, for each source, the vertices of a snapshot with the largest personalized PageRank.",
    long_about = None
)]
pub struct CliArgs {
    #[clap(flatten)]
    pub store: StoreArgs,

    #[arg(short, long)]
    /// The iteration of the snapshot.
    pub iteration: usize,

    #[arg(short, long = "top", default_value_t = 10)]
    /// The number of vertices to print per source.
    pub k: usize,
}

pub fn main(_global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    let store = DirGraphStore::new(&args.store.base)?;
    check_sources(&store, &args.store.sources)?;
    let snapshot = snapshot_name(args.iteration);
    ensure!(
        store.contains(&snapshot),
        "No snapshot {} in {}",
        snapshot,
        store.base().display()
    );
    let nodes = store.read_snapshot(&snapshot)?;
    let sources = &args.store.sources;
    for node in &nodes {
        ensure!(
            node.rank.len() == sources.len(),
            "Vertex {} has {} rank entries but there are {} sources",
            node.id,
            node.rank.len(),
            sources.len()
        );
    }

    let mut stdout = std::io::stdout().lock();
    for (column, source) in sources.ids().iter().enumerate() {
        writeln!(stdout, "# source {source}")?;
        for (id, prob) in top_k(&nodes, column, args.k) {
            writeln!(stdout, "{id}\t{prob}")?;
        }
    }
    Ok(())
}

/// Returns the `k` vertices with the largest rank in the given column, as
/// pairs (id, probability) in decreasing order of probability.
///
/// Ties are broken in favor of smaller ids.
pub fn top_k(nodes: &[Node], column: usize, k: usize) -> Vec<(u64, f64)> {
    nodes
        .iter()
        .map(|node| (node.id, node.rank[column]))
        .k_largest_by(k, |(a_id, a), (b_id, b)| {
            a.total_cmp(b).then_with(|| b_id.cmp(a_id))
        })
        .map(|(id, rank)| (id, rank.exp()))
        .collect()
}
