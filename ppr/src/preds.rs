/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Stopping conditions for the [driver](crate::driver::PersonalizedPageRank).
//!
//! After each iteration the driver builds a [`PredParams`] from the
//! [`IterationReport`] and stops if the predicate holds. Predicates combine
//! with the `and`/`or` methods of [`PredicateBooleanExt`](predicates::prelude::PredicateBooleanExt).
//!
//! Since each source has its own random walk, convergence is measured per
//! source: [`L1Norm`] holds only when every source has converged, possibly
//! with a different threshold for each source.
//!
//! # Examples
//!
//! ```
//! use predicates::prelude::*;
//! use webgraph_ppr::preds::{L1Norm, MaxIter, PredParams};
//!
//! // A tight threshold for the first source, a loose one for the second,
//! // and at most 50 iterations anyway
//! let predicate = L1Norm::per_source([1E-8, 1E-4])?.or(MaxIter::from(50));
//! assert!(predicate.eval(&PredParams {
//!     iteration: 10,
//!     norm_deltas: vec![1E-9, 1E-5],
//! }));
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::driver::IterationReport;
use anyhow::ensure;
use predicates::{Predicate, reflection::PredicateReflection};
use std::fmt::Display;

/// What stopping predicates can look at.
#[derive(Debug, Clone, PartialEq)]
pub struct PredParams {
    /// The number of iterations completed so far by the current run.
    pub iteration: usize,
    /// The ℓ₁ distance between the last two snapshots, one entry per source;
    /// all ∞ if not tracked.
    pub norm_deltas: Vec<f64>,
}

impl PredParams {
    /// Builds the parameters after `iteration` completed iterations, the
    /// last of which is described by `report`.
    pub fn new(iteration: usize, report: &IterationReport) -> Self {
        Self {
            iteration,
            norm_deltas: report.norm_deltas.clone(),
        }
    }
}

/// Holds once the run has completed the given number of iterations.
///
/// The default never holds, leaving the iteration range as the only limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxIter(usize);

impl From<usize> for MaxIter {
    fn from(max_iter: usize) -> Self {
        MaxIter(max_iter)
    }
}

impl Default for MaxIter {
    fn default() -> Self {
        MaxIter(usize::MAX)
    }
}

impl Display for MaxIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == usize::MAX {
            f.write_str("(whole range)")
        } else {
            write!(f, "(after {} iterations)", self.0)
        }
    }
}

impl PredicateReflection for MaxIter {}

impl Predicate<PredParams> for MaxIter {
    fn eval(&self, params: &PredParams) -> bool {
        params.iteration >= self.0
    }
}

/// Holds when, for every source, the ℓ₁ distance between the last two
/// snapshots is at most the threshold of the source.
///
/// The predicate never holds if the driver does not
/// [track](crate::driver::PersonalizedPageRank::track_norm_delta) the norm
/// delta, nor if the number of per-source thresholds differs from the number
/// of sources.
#[derive(Debug, Clone, PartialEq)]
pub struct L1Norm {
    thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq)]
enum Thresholds {
    Uniform(f64),
    PerSource(Box<[f64]>),
}

fn check_threshold(threshold: f64) -> anyhow::Result<()> {
    ensure!(
        threshold > 0.0,
        "The threshold must be positive, got {threshold}"
    );
    Ok(())
}

impl L1Norm {
    pub const DEFAULT_THRESHOLD: f64 = 1E-6;

    /// Uses a separate threshold for each source, in source order.
    pub fn per_source(thresholds: impl IntoIterator<Item = f64>) -> anyhow::Result<Self> {
        let thresholds: Box<[f64]> = thresholds.into_iter().collect();
        ensure!(!thresholds.is_empty(), "No thresholds given");
        for &threshold in thresholds.iter() {
            check_threshold(threshold)?;
        }
        Ok(Self {
            thresholds: Thresholds::PerSource(thresholds),
        })
    }
}

impl TryFrom<f64> for L1Norm {
    type Error = anyhow::Error;

    /// Uses the same threshold for all sources.
    fn try_from(threshold: f64) -> anyhow::Result<Self> {
        check_threshold(threshold)?;
        Ok(Self {
            thresholds: Thresholds::Uniform(threshold),
        })
    }
}

impl Default for L1Norm {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::Uniform(Self::DEFAULT_THRESHOLD),
        }
    }
}

impl Display for L1Norm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.thresholds {
            Thresholds::Uniform(threshold) => write!(f, "(ℓ₁ delta ≤ {threshold})"),
            Thresholds::PerSource(thresholds) => {
                write!(f, "(ℓ₁ delta ≤ {thresholds:?} per source)")
            }
        }
    }
}

impl PredicateReflection for L1Norm {}

impl Predicate<PredParams> for L1Norm {
    fn eval(&self, params: &PredParams) -> bool {
        match &self.thresholds {
            Thresholds::Uniform(threshold) => params
                .norm_deltas
                .iter()
                .all(|delta| delta <= threshold),
            Thresholds::PerSource(thresholds) => {
                thresholds.len() == params.norm_deltas.len()
                    && params
                        .norm_deltas
                        .iter()
                        .zip(thresholds.iter())
                        .all(|(delta, threshold)| delta <= threshold)
            }
        }
    }
}
