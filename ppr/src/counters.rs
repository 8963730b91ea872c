/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use std::fmt::Display;
use std::ops::{Add, AddAssign};

/// Diagnostic counters of a phase.
///
/// Every task of a phase accumulates its own counters, and the phase merges
/// them with `+=` when all tasks are done, so no counter is ever shared
/// between threads or between iterations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Nodes processed by map tasks.
    pub nodes: u64,
    /// Edges along which mass was sent.
    pub edges: u64,
    /// Mass messages emitted by map tasks.
    pub mass_messages: u64,
    /// Mass messages folded away by the combiner.
    pub mass_messages_saved: u64,
    /// Mass messages received by reduce tasks.
    pub mass_messages_received: u64,
    /// Vertices that received mass but no structure.
    pub missing_structure: u64,
}

impl AddAssign for Counters {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes += rhs.nodes;
        self.edges += rhs.edges;
        self.mass_messages += rhs.mass_messages;
        self.mass_messages_saved += rhs.mass_messages_saved;
        self.mass_messages_received += rhs.mass_messages_received;
        self.missing_structure += rhs.missing_structure;
    }
}

impl Add for Counters {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl std::iter::Sum for Counters {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Display for Counters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nodes: {}, edges: {}, mass messages: {} (saved: {}, received: {}), missing structure: {}",
            self.nodes,
            self.edges,
            self.mass_messages,
            self.mass_messages_saved,
            self.mass_messages_received,
            self.missing_structure
        )
    }
}
