/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A single-process partition-by-key and group-by-key substrate.
//!
//! Map tasks write their [`Message`]s into a [`MapOutput`], which buckets
//! them by reduce partition using a [`HashPartitioner`]. Once all map tasks
//! are done, [`shuffle`] hands every reduce partition the buckets addressed
//! to it by all map tasks, grouped by key in increasing key order.
//!
//! Within a key, messages appear in the order of the map tasks that emitted
//! them; consumers must not depend on this order.

use crate::record::Message;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Assigns vertex ids to reduce partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPartitioner {
    num_partitions: usize,
}

impl HashPartitioner {
    /// Creates a partitioner.
    ///
    /// # Panics
    ///
    /// Panics if `num_partitions` is zero.
    pub fn new(num_partitions: usize) -> Self {
        assert!(num_partitions > 0, "The number of partitions must be positive");
        Self { num_partitions }
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Returns the partition of a key.
    #[inline(always)]
    pub fn partition(&self, key: u64) -> usize {
        (key % self.num_partitions as u64) as usize
    }
}

/// The output of a map task, bucketed by reduce partition.
#[derive(Debug)]
pub struct MapOutput {
    partitioner: HashPartitioner,
    buckets: Vec<Vec<(u64, Message)>>,
}

impl MapOutput {
    pub fn new(partitioner: HashPartitioner) -> Self {
        Self {
            partitioner,
            buckets: (0..partitioner.num_partitions())
                .map(|_| Vec::new())
                .collect(),
        }
    }

    /// Emits a message addressed to `key`.
    #[inline]
    pub fn emit(&mut self, key: u64, message: Message) {
        let partition = self.partitioner.partition(key);
        self.buckets[partition].push((key, message));
    }

    /// Replaces every bucket with the result of `f`, which must keep each
    /// message in the bucket of its key.
    pub fn map_buckets(
        &mut self,
        mut f: impl FnMut(Vec<(u64, Message)>) -> Vec<(u64, Message)>,
    ) {
        for bucket in self.buckets.iter_mut() {
            *bucket = f(std::mem::take(bucket));
        }
    }

    /// Returns the bucket addressed to a reduce partition.
    pub fn bucket(&self, partition: usize) -> &[(u64, Message)] {
        &self.buckets[partition]
    }

    /// Returns the overall number of messages.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    pub fn into_buckets(self) -> Vec<Vec<(u64, Message)>> {
        self.buckets
    }
}

/// The input of a reduce task: messages grouped by key, in increasing key
/// order.
pub type Groups = BTreeMap<u64, Vec<Message>>;

/// Routes the outputs of all map tasks to their reduce partitions and groups
/// them by key.
///
/// # Panics
///
/// Panics if some output was not built with a partitioner for
/// `num_partitions` partitions.
pub fn shuffle(
    outputs: Vec<MapOutput>,
    num_partitions: usize,
    thread_pool: &ThreadPool,
) -> Vec<Groups> {
    let mut per_partition: Vec<Vec<Vec<(u64, Message)>>> = (0..num_partitions)
        .map(|_| Vec::with_capacity(outputs.len()))
        .collect();

    for output in outputs {
        assert_eq!(output.partitioner.num_partitions(), num_partitions);
        for (partition, bucket) in output.into_buckets().into_iter().enumerate() {
            per_partition[partition].push(bucket);
        }
    }

    thread_pool.install(|| {
        per_partition
            .into_par_iter()
            .map(|buckets| {
                let mut groups = Groups::new();
                for (key, message) in buckets.into_iter().flatten() {
                    groups.entry(key).or_default().push(message);
                }
                groups
            })
            .collect()
    })
}
