/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::error::PprError;
use crate::logprob::neg_inf_vec;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

/// The personalization sources of a computation.
///
/// The list fixes the length of every rank vector and the mapping from
/// columns to sources: column *c* of a rank vector holds the mass of the
/// random walk restarting at the *c*-th source. It is immutable for the whole
/// run.
///
/// # Examples
///
/// ```
/// use webgraph_ppr::sources::SourceSet;
///
/// let sources: SourceSet = "3,1,12".parse()?;
/// assert_eq!(sources.len(), 3);
/// assert_eq!(sources.column(12), Some(2));
/// assert_eq!(sources.column(2), None);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    ids: Box<[u64]>,
    columns: HashMap<u64, usize>,
}

impl SourceSet {
    /// Creates a source set from a list of distinct, positive vertex ids.
    pub fn new(ids: impl IntoIterator<Item = u64>) -> Result<Self, PprError> {
        let ids: Box<[u64]> = ids.into_iter().collect();
        if ids.is_empty() {
            return Err(PprError::ConfigurationMismatch(
                "The source list is empty".to_owned(),
            ));
        }
        let mut columns = HashMap::with_capacity(ids.len());
        for (column, &id) in ids.iter().enumerate() {
            if id == 0 {
                return Err(PprError::ConfigurationMismatch(
                    "Source ids must be positive".to_owned(),
                ));
            }
            if columns.insert(id, column).is_some() {
                return Err(PprError::ConfigurationMismatch(format!(
                    "Source {id} appears more than once"
                )));
            }
        }
        Ok(Self { ids, columns })
    }

    /// Returns the number of sources, that is, the length of rank vectors.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false: a source set contains at least one source.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Returns the column of the given vertex, if it is a source.
    #[inline]
    pub fn column(&self, id: u64) -> Option<usize> {
        self.columns.get(&id).copied()
    }

    /// Returns the rank vector of a vertex before the first iteration: all the
    /// mass of a source's walk is on the source itself.
    pub fn initial_rank(&self, id: u64) -> Vec<f64> {
        let mut rank = neg_inf_vec(self.len());
        if let Some(column) = self.column(id) {
            rank[column] = 0.0;
        }
        rank
    }
}

impl FromStr for SourceSet {
    type Err = anyhow::Error;

    /// Parses a comma-separated list of vertex ids.
    fn from_str(s: &str) -> anyhow::Result<Self> {
        let ids = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<u64>()
                    .map_err(|e| anyhow::anyhow!("Invalid source id {t:?}: {e}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(ids)?)
    }
}

impl Display for SourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, id) in self.ids.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}
