/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Vertex records.
//!
//! A graph snapshot is a sequence of [`Node`]s, that is, _complete_ records
//! carrying both the adjacency list of a vertex and its rank vector. During
//! the mass-distribution phase each node is split into [`Message`]s: one
//! carrying its structure, addressed to the node itself, and one carrying a
//! share of its mass for each outgoing edge, addressed to the destination.
//! Messages for the same vertex are then reunited into a new node.

use serde::{Deserialize, Serialize};

/// The kind of a vertex record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Adjacency only.
    Structure,
    /// A contribution to the rank vector only.
    Mass,
    /// Adjacency and reconciled rank vector.
    Complete,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Structure => f.write_str("structure"),
            RecordKind::Mass => f.write_str("mass"),
            RecordKind::Complete => f.write_str("complete"),
        }
    }
}

/// A complete vertex record.
///
/// The rank vector contains one log-probability per source, in the order of
/// the [`SourceSet`](crate::sources::SourceSet) of the computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: u64,
    pub adjacency: Vec<u64>,
    #[serde(with = "log_probs")]
    pub rank: Vec<f64>,
}

impl Node {
    pub fn new(id: u64, adjacency: Vec<u64>, rank: Vec<f64>) -> Self {
        Self {
            id,
            adjacency,
            rank,
        }
    }

    pub fn kind(&self) -> RecordKind {
        RecordKind::Complete
    }

    pub fn outdegree(&self) -> usize {
        self.adjacency.len()
    }

    /// Returns true if the node has no outgoing edges.
    pub fn is_dangling(&self) -> bool {
        self.adjacency.is_empty()
    }
}

/// A message routed through the shuffle, keyed by the id of the vertex it is
/// addressed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// The adjacency list of the addressee.
    Structure(Vec<u64>),
    /// A share of mass for the addressee, one log-probability per source.
    Mass(Vec<f64>),
}

impl Message {
    pub fn kind(&self) -> RecordKind {
        match self {
            Message::Structure(_) => RecordKind::Structure,
            Message::Mass(_) => RecordKind::Mass,
        }
    }
}

/// Serde adapter for rank vectors.
///
/// JSON has no representation for infinities, so probability zero (−∞) is
/// written as `null`.
mod log_probs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(rank: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        rank.iter()
            .map(|&r| (r != f64::NEG_INFINITY).then_some(r))
            .collect::<Vec<_>>()
            .serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<f64>, D::Error> {
        Ok(Vec::<Option<f64>>::deserialize(deserializer)?
            .into_iter()
            .map(|r| r.unwrap_or(f64::NEG_INFINITY))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let node = Node::new(3, vec![1, 2], vec![0.0]);
        assert_eq!(node.kind(), RecordKind::Complete);
        assert_eq!(node.outdegree(), 2);
        assert!(!node.is_dangling());
        assert!(Node::new(4, vec![], vec![0.0]).is_dangling());
        assert_eq!(Message::Structure(vec![]).kind(), RecordKind::Structure);
        assert_eq!(Message::Mass(vec![0.0]).kind(), RecordKind::Mass);
    }

    #[test]
    fn test_json_negative_infinity() -> anyhow::Result<()> {
        let node = Node::new(7, vec![1, 8], vec![f64::NEG_INFINITY, -0.25]);
        let json = serde_json::to_string(&node)?;
        assert_eq!(
            json,
            r#"{"id":7,"adjacency":[1,8],"rank":[null,-0.25]}"#
        );
        let back: Node = serde_json::from_str(&json)?;
        assert_eq!(back.rank[0], f64::NEG_INFINITY);
        assert_eq!(back.rank[1].to_bits(), node.rank[1].to_bits());
        Ok(())
    }
}
