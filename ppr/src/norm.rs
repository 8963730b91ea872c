/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Distance between consecutive approximations.

use crate::store::GraphStore;
use anyhow::Result;
use kahan::KahanSum;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::HashMap;

fn ranks(store: &impl GraphStore, snapshot: &str) -> Result<HashMap<u64, Vec<f64>>> {
    Ok(store
        .read_snapshot(snapshot)?
        .into_iter()
        .map(|node| (node.id, node.rank))
        .collect())
}

fn new_sums(num_sources: usize) -> Vec<KahanSum<f64>> {
    (0..num_sources).map(|_| KahanSum::new()).collect()
}

/// Returns, for each source, the ℓ₁ distance between the probability
/// vectors of two snapshots.
///
/// Vertices missing from a snapshot have probability zero in it.
pub fn l1_norm_deltas(
    store: &impl GraphStore,
    before: &str,
    after: &str,
    num_sources: usize,
    thread_pool: &ThreadPool,
) -> Result<Vec<f64>> {
    let old = ranks(store, before)?;
    let new = ranks(store, after)?;

    let mut ids: Vec<u64> = old.keys().chain(new.keys()).copied().collect();
    ids.sort_unstable();
    ids.dedup();

    let sums = thread_pool.install(|| {
        ids.par_iter()
            .fold(
                || new_sums(num_sources),
                |mut sums, id| {
                    for (column, sum) in sums.iter_mut().enumerate() {
                        let p = |ranks: &HashMap<u64, Vec<f64>>| {
                            ranks.get(id).map_or(0.0, |rank| rank[column].exp())
                        };
                        *sum += (p(&new) - p(&old)).abs();
                    }
                    sums
                },
            )
            .reduce(
                || new_sums(num_sources),
                |a, b| a.into_iter().zip(b).map(|(x, y)| x + y).collect(),
            )
    });

    Ok(sums.into_iter().map(|sum| sum.sum()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logprob::LOG_ZERO;
    use crate::record::Node;
    use crate::store::MemoryGraphStore;

    #[test]
    fn test_l1_norm_deltas() -> Result<()> {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .unwrap();
        let store = MemoryGraphStore::new();
        store.write(
            "a",
            vec![
                vec![Node::new(1, vec![2], vec![0.5_f64.ln(), 0.0])],
                vec![Node::new(2, vec![], vec![0.5_f64.ln(), LOG_ZERO])],
            ],
        )?;
        store.write(
            "b",
            vec![vec![
                Node::new(1, vec![2], vec![0.25_f64.ln(), 0.0]),
                Node::new(3, vec![], vec![0.25_f64.ln(), LOG_ZERO]),
            ]],
        )?;
        // Column 0: |0.25 - 0.5| + |0 - 0.5| + |0.25 - 0| = 1
        let deltas = l1_norm_deltas(&store, "a", "b", 2, &thread_pool)?;
        assert!((deltas[0] - 1.0).abs() < 1E-12);
        assert_eq!(deltas[1], 0.0);
        assert_eq!(
            l1_norm_deltas(&store, "a", "a", 2, &thread_pool)?,
            vec![0.0, 0.0]
        );
        Ok(())
    }
}
