/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The mass-distribution phase.
//!
//! Every node splits its mass evenly among its successors: a node with
//! outdegree *d* > 0 and rank vector **r** sends to each successor the vector
//! **r** − ln *d*; dangling nodes send nothing. Each node also sends its
//! adjacency list to itself, so that the reduce side can rebuild a complete
//! record.
//!
//! On the reduce side, all mass received by a vertex is folded with
//! [`add_log_probs`](crate::logprob::add_log_probs) starting from −∞, and the
//! result becomes the new rank vector of the vertex. Each vertex must receive
//! exactly one structure message:
//!
//! - if it receives none, its mass is dropped, a warning is logged, and the
//!   [`missing_structure`](Counters::missing_structure) counter is
//!   incremented;
//! - if it receives more than one, the phase fails with
//!   [`PprError::DuplicateStructure`].
//!
//! Every reduce task also folds the rank vectors it emits into a ledger,
//! which it stores in a [`LedgerStore`] when done: the sum of all ledgers is
//! the mass retained by the graph.

use crate::combine::combine_bucket;
use crate::counters::Counters;
use crate::error::PprError;
use crate::logprob::{add_assign_log_probs, neg_inf_vec};
use crate::record::{Message, Node};
use crate::shuffle::{HashPartitioner, MapOutput, shuffle};
use crate::sources::SourceSet;
use crate::store::{GraphStore, LedgerStore};
use anyhow::{Context, Result};
use dsi_progress_logger::ConcurrentProgressLog;
use rayon::ThreadPool;
use rayon::prelude::*;

/// Splits a node into its structure message and its mass messages.
pub fn map_node(node: Node, output: &mut MapOutput, counters: &mut Counters) {
    counters.nodes += 1;
    let Node {
        id,
        adjacency,
        rank,
    } = node;

    let outdegree = adjacency.len();
    if outdegree > 0 {
        let log_outdegree = (outdegree as f64).ln();
        let share: Vec<f64> = rank.iter().map(|r| r - log_outdegree).collect();
        for &succ in &adjacency {
            output.emit(succ, Message::Mass(share.clone()));
        }
        counters.edges += outdegree as u64;
        counters.mass_messages += outdegree as u64;
    }

    output.emit(id, Message::Structure(adjacency));
}

/// The reduce side of a partition.
#[derive(Debug)]
pub struct Reducer {
    num_sources: usize,
    ledger: Vec<f64>,
    counters: Counters,
}

impl Reducer {
    pub fn new(num_sources: usize) -> Self {
        Self {
            num_sources,
            ledger: neg_inf_vec(num_sources),
            counters: Counters::default(),
        }
    }

    /// Rebuilds a vertex from the messages addressed to it.
    ///
    /// Returns `None` if no structure was received.
    pub fn reduce(&mut self, id: u64, messages: Vec<Message>) -> Result<Option<Node>, PprError> {
        let mut rank = neg_inf_vec(self.num_sources);
        let mut adjacency = None;
        let mut structures = 0;
        let mut mass_messages = 0;

        for message in messages {
            match message {
                Message::Structure(succ) => {
                    structures += 1;
                    adjacency = Some(succ);
                }
                Message::Mass(mass) => {
                    mass_messages += 1;
                    add_assign_log_probs(&mut rank, &mass);
                }
            }
        }
        self.counters.mass_messages_received += mass_messages as u64;

        match (structures, adjacency) {
            (1, Some(adjacency)) => {
                add_assign_log_probs(&mut self.ledger, &rank);
                Ok(Some(Node::new(id, adjacency, rank)))
            }
            (0, _) => {
                log::warn!(
                    "No structure received for node {id} ({mass_messages} mass messages): dropping its mass"
                );
                self.counters.missing_structure += 1;
                Ok(None)
            }
            _ => Err(PprError::DuplicateStructure {
                node: id,
                structures,
                mass_messages,
            }),
        }
    }

    /// Returns the ledger of the partition and the counters.
    pub fn finish(self) -> (Vec<f64>, Counters) {
        (self.ledger, self.counters)
    }
}

/// Checks that the rank vector of a node matches the number of sources.
fn check_rank(node: &Node, num_sources: usize) -> Result<(), PprError> {
    if node.rank.len() != num_sources {
        return Err(PprError::ConfigurationMismatch(format!(
            "Node {} has a rank vector of length {}, but there are {num_sources} sources",
            node.id,
            node.rank.len()
        )));
    }
    Ok(())
}

/// The mass-distribution phase.
///
/// There is one map task per partition of the input snapshot, and the same
/// number of reduce tasks; reduce task *p* writes partition *p* of the output
/// snapshot and the ledger of slot *p*.
#[derive(Debug, Clone)]
pub struct MassDistribution<'a> {
    sources: &'a SourceSet,
    combiner: bool,
    num_nodes: Option<usize>,
}

impl<'a> MassDistribution<'a> {
    pub fn new(sources: &'a SourceSet) -> Self {
        Self {
            sources,
            combiner: false,
            num_nodes: None,
        }
    }

    /// Enables or disables the map-side combiner.
    pub fn combiner(&mut self, combiner: bool) -> &mut Self {
        self.combiner = combiner;
        self
    }

    /// Sets the expected number of nodes of the input snapshot.
    pub fn num_nodes(&mut self, num_nodes: Option<usize>) -> &mut Self {
        self.num_nodes = num_nodes;
        self
    }

    /// Runs the phase, reading snapshot `input` and writing snapshot `output`.
    ///
    /// Rank-vector lengths and the number of nodes are checked after all map
    /// tasks are done, before anything is written.
    pub fn run(
        &self,
        store: &impl GraphStore,
        input: &str,
        output: &str,
        ledgers: &impl LedgerStore,
        thread_pool: &ThreadPool,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<Counters> {
        let num_sources = self.sources.len();
        let num_partitions = store
            .num_partitions(input)
            .with_context(|| format!("Could not open snapshot {input}"))?;
        if num_partitions == 0 {
            return Err(PprError::ConfigurationMismatch(format!(
                "Snapshot {input} has no partitions"
            ))
            .into());
        }
        let partitioner = HashPartitioner::new(num_partitions);

        cpl.item_name("node");
        cpl.expected_updates(self.num_nodes);
        cpl.start(format!("Distributing mass of {input}..."));

        let map_outputs = thread_pool.install(|| {
            (0..num_partitions)
                .into_par_iter()
                .map_with(cpl.clone(), |cpl, partition| -> Result<(MapOutput, Counters)> {
                    let nodes = store.read_partition(input, partition)?;
                    let mut counters = Counters::default();
                    let mut map_output = MapOutput::new(partitioner);
                    for node in nodes {
                        check_rank(&node, num_sources)?;
                        map_node(node, &mut map_output, &mut counters);
                        cpl.light_update();
                    }
                    if self.combiner {
                        map_output
                            .map_buckets(|bucket| combine_bucket(bucket, num_sources, &mut counters));
                    }
                    Ok((map_output, counters))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        cpl.done();

        let mut counters = Counters::default();
        let map_outputs = map_outputs
            .into_iter()
            .map(|(map_output, map_counters)| {
                counters += map_counters;
                map_output
            })
            .collect::<Vec<_>>();

        if let Some(num_nodes) = self.num_nodes {
            if counters.nodes != num_nodes as u64 {
                return Err(PprError::ConfigurationMismatch(format!(
                    "Snapshot {input} contains {} nodes, but {num_nodes} were declared",
                    counters.nodes
                ))
                .into());
            }
        }

        let groups = shuffle(map_outputs, num_partitions, thread_pool);

        let reduced = thread_pool.install(|| {
            groups
                .into_par_iter()
                .enumerate()
                .map(|(partition, groups)| -> Result<(Vec<Node>, Counters)> {
                    let mut reducer = Reducer::new(num_sources);
                    let mut nodes = Vec::with_capacity(groups.len());
                    for (id, messages) in groups {
                        if let Some(node) = reducer.reduce(id, messages)? {
                            nodes.push(node);
                        }
                    }
                    let (ledger, counters) = reducer.finish();
                    ledgers.put_ledger(partition, &ledger)?;
                    Ok((nodes, counters))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let partitions = reduced
            .into_iter()
            .map(|(nodes, reduce_counters)| {
                counters += reduce_counters;
                nodes
            })
            .collect();

        store.write(output, partitions)?;

        log::info!("Mass distribution {input} -> {output}: {counters}");
        Ok(counters)
    }
}
