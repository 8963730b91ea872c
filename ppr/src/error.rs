/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Fatal error conditions.
//!
//! Recoverable conditions (a vertex receiving mass but no structure, a
//! slightly negative missing-mass estimate) are not errors: they are counted
//! or clamped and logged, and the computation goes on.

use thiserror::Error;

/// Fatal conditions detected by the computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PprError {
    /// More than one structure record reached the same vertex in a single
    /// shuffle: either the input graph defines a vertex twice or the shuffle
    /// is broken.
    #[error(
        "Multiple structure received for node {node}: {structures} structures, {mass_messages} mass messages"
    )]
    DuplicateStructure {
        node: u64,
        structures: usize,
        mass_messages: usize,
    },

    /// The configuration (sources, damping, vertex count, rank-vector
    /// lengths) is inconsistent.
    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),
}

/// The failure of an iteration, carrying the index of the failed iteration.
#[derive(Error, Debug)]
#[error("Iteration {iteration} failed")]
pub struct IterationError {
    pub iteration: usize,
    #[source]
    pub source: anyhow::Error,
}

impl IterationError {
    /// Returns the underlying [`PprError`], if the failure was caused by one.
    pub fn ppr_error(&self) -> Option<&PprError> {
        self.source.downcast_ref::<PprError>()
    }
}
