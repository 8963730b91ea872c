/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The jump-redistribution phase.
//!
//! With probability α the random walk of source *c* jumps back to the
//! source; moreover, the mass *m*_*c* lost at dangling vertices during mass
//! distribution is given back to the source. Thus, in linear space, the new
//! rank of vertex *v* for source *c* is
//!
//! > α + (1 − α)(*r* + *m*_*c*)
//!
//! if *v* is the source of column *c*, and (1 − α) *r* otherwise. The phase
//! is a map-only rewrite: adjacency lists are copied unchanged.

use crate::counters::Counters;
use crate::logprob::{add_assign_log_probs, add_log_probs, neg_inf_vec};
use crate::record::Node;
use crate::sources::SourceSet;
use crate::store::GraphStore;
use anyhow::{Context, Result};
use dsi_progress_logger::ConcurrentProgressLog;
use rayon::ThreadPool;
use rayon::prelude::*;

/// The jump-redistribution phase.
#[derive(Debug, Clone)]
pub struct JumpRedistribution<'a> {
    sources: &'a SourceSet,
    log_alpha: f64,
    log_one_minus_alpha: f64,
    log_missing: Vec<f64>,
}

impl<'a> JumpRedistribution<'a> {
    /// Creates a new phase with jump probability `alpha` and the given
    /// missing mass, in linear space, for each source.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is not in the interval (0 . . 1) or if the length
    /// of `missing` is not the number of sources.
    pub fn new(sources: &'a SourceSet, alpha: f64, missing: &[f64]) -> Self {
        assert!(
            alpha > 0.0 && alpha < 1.0,
            "The jump probability must be in (0 . . 1), got {alpha}"
        );
        assert_eq!(missing.len(), sources.len());
        Self {
            sources,
            log_alpha: alpha.ln(),
            log_one_minus_alpha: (-alpha).ln_1p(),
            log_missing: missing.iter().map(|m| m.ln()).collect(),
        }
    }

    /// Rewrites the rank vector of a node.
    #[inline]
    pub fn apply(&self, node: &mut Node) {
        let source_column = self.sources.column(node.id);
        for (column, r) in node.rank.iter_mut().enumerate() {
            if source_column == Some(column) {
                *r = add_log_probs(
                    self.log_alpha,
                    self.log_one_minus_alpha + add_log_probs(*r, self.log_missing[column]),
                );
            } else {
                *r += self.log_one_minus_alpha;
            }
        }
    }

    /// Runs the phase, reading snapshot `input` and writing snapshot `output`.
    ///
    /// Returns the counters and the total mass of the output, as
    /// log-probabilities.
    pub fn run(
        &self,
        store: &impl GraphStore,
        input: &str,
        output: &str,
        thread_pool: &ThreadPool,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(Counters, Vec<f64>)> {
        let num_sources = self.sources.len();
        let num_partitions = store
            .num_partitions(input)
            .with_context(|| format!("Could not open snapshot {input}"))?;

        cpl.item_name("node");
        cpl.expected_updates(None);
        cpl.start(format!("Redistributing jump mass of {input}..."));

        let results = thread_pool.install(|| {
            (0..num_partitions)
                .into_par_iter()
                .map_with(
                    cpl.clone(),
                    |cpl, partition| -> Result<(Vec<Node>, Counters, Vec<f64>)> {
                        let mut nodes = store.read_partition(input, partition)?;
                        let mut counters = Counters::default();
                        let mut total = neg_inf_vec(num_sources);
                        for node in nodes.iter_mut() {
                            self.apply(node);
                            add_assign_log_probs(&mut total, &node.rank);
                            counters.nodes += 1;
                            counters.edges += node.outdegree() as u64;
                            cpl.light_update();
                        }
                        Ok((nodes, counters, total))
                    },
                )
                .collect::<Result<Vec<_>>>()
        })?;

        cpl.done();

        let mut counters = Counters::default();
        let mut total = neg_inf_vec(num_sources);
        let mut partitions = Vec::with_capacity(results.len());
        for (nodes, partition_counters, partition_total) in results {
            counters += partition_counters;
            add_assign_log_probs(&mut total, &partition_total);
            partitions.push(nodes);
        }

        store.write(output, partitions)?;

        log::info!("Jump redistribution {input} -> {output}: {counters}");
        Ok((counters, total))
    }
}
