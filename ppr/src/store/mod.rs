/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Storage of graph snapshots and mass ledgers.
//!
//! The computation reads and writes data only through the [`GraphStore`] and
//! [`LedgerStore`] traits, so it does not know whether snapshots live in
//! memory ([`MemoryGraphStore`]) or in a directory ([`DirGraphStore`]).
//!
//! A snapshot is a named, partitioned sequence of [`Node`]s. The snapshot
//! after *i* iterations is named by [`snapshot_name`], and the intermediate
//! snapshot between the two phases of the iteration producing it by
//! [`intermediate_name`].
//!
//! A store may also record the [`SourceSet`] its snapshots were built for:
//! rank vectors are meaningful only with the same source order, and
//! [`check_sources`] rejects any other.

use crate::error::PprError;
use crate::record::Node;
use crate::sources::SourceSet;
use anyhow::Result;

mod graph;
pub use graph::*;

mod ledger;
pub use ledger::*;

/// Returns the name of the snapshot after `iteration` iterations.
///
/// ```
/// assert_eq!(webgraph_ppr::store::snapshot_name(7), "iter0007");
/// ```
pub fn snapshot_name(iteration: usize) -> String {
    format!("iter{iteration:04}")
}

/// Returns the name of the intermediate snapshot produced by the
/// mass-distribution phase before `output`.
pub fn intermediate_name(output: &str) -> String {
    format!("{output}t")
}

/// Returns the name of the mass ledger of the intermediate snapshot
/// `intermediate`.
pub fn ledger_name(intermediate: &str) -> String {
    format!("{intermediate}-mass")
}

/// Per-partition mass ledgers of a reduce stage.
///
/// Every reduce task puts exactly one ledger, under its partition index; the
/// driver then sums all of them. Putting a ledger twice in the same slot is an
/// error.
pub trait LedgerStore: Sync {
    /// Stores the ledger of a reduce partition.
    fn put_ledger(&self, partition: usize, ledger: &[f64]) -> Result<()>;

    /// Sums column-wise, in log space, all stored ledgers.
    ///
    /// The result has `num_sources` entries, all −∞ if no ledger has been
    /// stored. Ledgers are folded in increasing partition order. A ledger
    /// whose length is not `num_sources` causes a
    /// [`ConfigurationMismatch`](crate::error::PprError::ConfigurationMismatch).
    fn sum_all_ledgers(&self, num_sources: usize) -> Result<Vec<f64>>;

    /// Discards all stored ledgers.
    fn clear(&self) -> Result<()>;
}

/// Partitioned graph snapshots.
pub trait GraphStore: Sync {
    /// The ledger store used for the mass ledgers of this store.
    type Ledger: LedgerStore;

    /// Returns the number of partitions of a snapshot.
    fn num_partitions(&self, snapshot: &str) -> Result<usize>;

    /// Reads a partition of a snapshot.
    fn read_partition(&self, snapshot: &str, partition: usize) -> Result<Vec<Node>>;

    /// Writes a snapshot, replacing any previous snapshot with the same name.
    ///
    /// The snapshot becomes visible only when all partitions have been
    /// written.
    fn write(&self, snapshot: &str, partitions: Vec<Vec<Node>>) -> Result<()>;

    /// Removes a snapshot, if present.
    fn remove(&self, snapshot: &str) -> Result<()>;

    /// Returns true if the snapshot exists.
    fn contains(&self, snapshot: &str) -> bool;

    /// Returns an empty ledger store with the given name, discarding any
    /// previous content.
    fn ledger_store(&self, name: &str) -> Result<Self::Ledger>;

    /// Records the source set whose columns the rank vectors of this store
    /// follow, replacing any previous one.
    fn put_sources(&self, sources: &SourceSet) -> Result<()>;

    /// Returns the recorded source set, if any.
    fn sources(&self) -> Result<Option<SourceSet>>;

    /// Reads all partitions of a snapshot, in partition order.
    fn read_snapshot(&self, snapshot: &str) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        for partition in 0..self.num_partitions(snapshot)? {
            nodes.extend(self.read_partition(snapshot, partition)?);
        }
        Ok(nodes)
    }
}

/// Checks that `sources` is the source set recorded in the store, if any.
///
/// A different set, even with the same sources in a different order, causes
/// a [`ConfigurationMismatch`](PprError::ConfigurationMismatch).
pub fn check_sources(store: &impl GraphStore, sources: &SourceSet) -> Result<()> {
    match store.sources()? {
        Some(recorded) if recorded != *sources => Err(PprError::ConfigurationMismatch(format!(
            "The snapshots were built for sources {recorded}, got {sources}"
        ))
        .into()),
        _ => Ok(()),
    }
}
