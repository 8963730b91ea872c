/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Estimation of the mass lost at dangling vertices.
//!
//! After mass distribution, the mass of source *c* retained by the graph is
//! the column-wise log-sum of all partition ledgers. Whatever is missing from
//! 1 was sitting on dangling vertices (or reached vertices with no
//! structure) and must be given back to the source by the jump step.

use crate::store::LedgerStore;
use anyhow::Result;

/// Returns the mass missing from each source's walk, given the retained mass
/// as log-probabilities.
///
/// Each entry is 1 − exp(`total`), clamped to zero when rounding makes the
/// retained mass slightly larger than 1.
pub fn missing_mass(total: &[f64]) -> Vec<f64> {
    total
        .iter()
        .enumerate()
        .map(|(column, &log_mass)| {
            let missing = 1.0 - log_mass.exp();
            if missing < 0.0 {
                log::debug!(
                    "Clamping negative missing mass {missing:e} for source column {column} to zero"
                );
                0.0
            } else {
                missing
            }
        })
        .collect()
}

/// Sums the ledgers of a mass-distribution phase and estimates the missing
/// mass.
///
/// Returns the retained mass (as log-probabilities) and the missing mass.
pub fn estimate(ledgers: &impl LedgerStore, num_sources: usize) -> Result<(Vec<f64>, Vec<f64>)> {
    let total = ledgers.sum_all_ledgers(num_sources)?;
    let missing = missing_mass(&total);
    Ok((total, missing))
}
