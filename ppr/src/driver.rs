/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The iteration driver.
//!
//! Each iteration turns the snapshot after *i* iterations into the snapshot
//! after *i* + 1 iterations in two phases:
//!
//! 1. [mass distribution](crate::distribute), which writes an intermediate
//!    snapshot and a mass ledger per partition;
//! 2. [jump redistribution](crate::jump), which reads the intermediate
//!    snapshot and gives back to each source, besides the jump mass, the mass
//!    [missing](crate::missing) from the ledgers.
//!
//! The output snapshot is written only after both phases succeed, and the
//! intermediate snapshot and the ledgers are discarded at the end of the
//! iteration, so a failed iteration leaves behind no consumable output.

use crate::counters::Counters;
use crate::distribute::MassDistribution;
use crate::error::{IterationError, PprError};
use crate::jump::JumpRedistribution;
use crate::missing;
use crate::norm::l1_norm_deltas;
use crate::preds::PredParams;
use crate::sources::SourceSet;
use crate::store::{
    GraphStore, LedgerStore, check_sources, intermediate_name, ledger_name, snapshot_name,
};
use anyhow::Result;
use dsi_progress_logger::{ConcurrentProgressLog, ProgressLog, no_logging};
use predicates::Predicate;
use rayon::ThreadPool;
use std::ops::Range;

/// The state of a [`PersonalizedPageRank`] driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Idle,
    RunningPhase1,
    RunningPhase2,
    /// All requested iterations have been completed, or the stopping
    /// predicate held.
    Done,
    /// An iteration failed; no further iteration has been run.
    Failed,
}

/// What happened during an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// The number of iterations of the input snapshot.
    pub iteration: usize,
    /// Counters of the mass-distribution phase.
    pub phase1: Counters,
    /// Counters of the jump-redistribution phase.
    pub phase2: Counters,
    /// Mass retained by the graph after mass distribution, per source, as
    /// log-probabilities.
    pub retained_mass: Vec<f64>,
    /// Mass missing after mass distribution, per source.
    pub missing_mass: Vec<f64>,
    /// Mass of the output snapshot, per source, as log-probabilities.
    pub total_mass: Vec<f64>,
    /// The ℓ₁ distance between the input and the output snapshot, per
    /// source; all ∞ if not tracked.
    pub norm_deltas: Vec<f64>,
}

impl IterationReport {
    /// Returns the largest ℓ₁ distance over all sources.
    pub fn norm_delta(&self) -> f64 {
        self.norm_deltas.iter().copied().fold(0.0, f64::max)
    }
}

/// Computes multi-source personalized PageRank by iterating mass
/// distribution and jump redistribution.
///
/// The struct is configured via setters and then executed via
/// [`run`](Self::run), which reads the snapshots stored in a [`GraphStore`]
/// and writes new ones.
///
/// # Examples
///
/// ```
/// use webgraph_ppr::prelude::*;
/// use webgraph_ppr::store::snapshot_name;
///
/// let sources = SourceSet::new([1])?;
/// let store = MemoryGraphStore::new();
/// store.write(
///     &snapshot_name(0),
///     vec![vec![
///         Node::new(1, vec![2], sources.initial_rank(1)),
///         Node::new(2, vec![1], sources.initial_rank(2)),
///     ]],
/// )?;
///
/// let thread_pool = rayon::ThreadPoolBuilder::new().build()?;
/// let mut ppr = PersonalizedPageRank::new(&store, &sources);
/// ppr.alpha(0.2).combiner(true);
/// ppr.run(0..10, MaxIter::default(), &thread_pool)?;
///
/// let total = ppr.reports().last().unwrap().total_mass[0];
/// assert!((total.exp() - 1.0).abs() < 1E-9);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct PersonalizedPageRank<'a, G: GraphStore> {
    store: &'a G,
    sources: &'a SourceSet,
    alpha: f64,
    combiner: bool,
    num_nodes: Option<usize>,
    track_norm_delta: bool,

    state: State,
    reports: Vec<IterationReport>,
}

impl<G: GraphStore> std::fmt::Debug for PersonalizedPageRank<'_, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonalizedPageRank")
            .field("sources", &self.sources.ids())
            .field("alpha", &self.alpha)
            .field("combiner", &self.combiner)
            .field("num_nodes", &self.num_nodes)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<'a, G: GraphStore> PersonalizedPageRank<'a, G> {
    pub const DEFAULT_ALPHA: f64 = 0.15;

    pub fn new(store: &'a G, sources: &'a SourceSet) -> Self {
        Self {
            store,
            sources,
            alpha: Self::DEFAULT_ALPHA,
            combiner: false,
            num_nodes: None,
            track_norm_delta: false,
            state: State::Idle,
            reports: Vec::new(),
        }
    }

    /// Sets the jump probability α.
    ///
    /// A value outside the interval (0 . . 1) makes every iteration fail
    /// with a [`ConfigurationMismatch`](PprError::ConfigurationMismatch).
    pub fn alpha(&mut self, alpha: f64) -> &mut Self {
        self.alpha = alpha;
        self
    }

    /// Enables or disables the map-side combiner.
    pub fn combiner(&mut self, combiner: bool) -> &mut Self {
        self.combiner = combiner;
        self
    }

    /// Sets the number of nodes every snapshot is expected to contain.
    pub fn num_nodes(&mut self, num_nodes: Option<usize>) -> &mut Self {
        self.num_nodes = num_nodes;
        self
    }

    /// Enables or disables the computation of the ℓ₁ distance between
    /// consecutive snapshots, which requires reading both snapshots once more
    /// per iteration. Without it, [`L1Norm`](crate::preds::L1Norm) never
    /// stops the computation.
    pub fn track_norm_delta(&mut self, track_norm_delta: bool) -> &mut Self {
        self.track_norm_delta = track_norm_delta;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the reports of the iterations completed by the last call to
    /// [`run`](Self::run).
    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    fn check_config(&self) -> Result<(), PprError> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(PprError::ConfigurationMismatch(format!(
                "The jump probability must be in (0 . . 1), got {}",
                self.alpha
            )));
        }
        Ok(())
    }

    /// Runs one iteration from snapshot `input` to snapshot `output`.
    ///
    /// `iteration` is used only for reporting. If the store has recorded a
    /// source set different from ours, the iteration fails with a
    /// [`ConfigurationMismatch`](PprError::ConfigurationMismatch) before
    /// anything is written.
    pub fn step(
        &mut self,
        iteration: usize,
        input: &str,
        output: &str,
        thread_pool: &ThreadPool,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<IterationReport> {
        let intermediate = intermediate_name(output);
        let ledgers = match self.store.ledger_store(&ledger_name(&intermediate)) {
            Ok(ledgers) => ledgers,
            Err(err) => {
                self.state = State::Failed;
                return Err(err);
            }
        };

        let result = self.phases(iteration, input, output, &intermediate, &ledgers, thread_pool, cpl);

        if let Err(err) = ledgers.clear() {
            log::warn!("Could not discard the ledgers of {intermediate}: {err:#}");
        }
        if let Err(err) = self.store.remove(&intermediate) {
            log::warn!("Could not remove {intermediate}: {err:#}");
        }

        self.state = if result.is_ok() {
            State::Idle
        } else {
            State::Failed
        };
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn phases(
        &mut self,
        iteration: usize,
        input: &str,
        output: &str,
        intermediate: &str,
        ledgers: &G::Ledger,
        thread_pool: &ThreadPool,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<IterationReport> {
        self.check_config()?;
        check_sources(self.store, self.sources)?;
        let num_sources = self.sources.len();

        self.state = State::RunningPhase1;
        let phase1 = MassDistribution::new(self.sources)
            .combiner(self.combiner)
            .num_nodes(self.num_nodes)
            .run(self.store, input, intermediate, ledgers, thread_pool, cpl)?;

        let (retained_mass, missing_mass) = missing::estimate(ledgers, num_sources)?;
        log::info!("Missing mass: {missing_mass:?}");

        self.state = State::RunningPhase2;
        let (phase2, total_mass) = JumpRedistribution::new(self.sources, self.alpha, &missing_mass)
            .run(self.store, intermediate, output, thread_pool, cpl)?;

        let norm_deltas = if self.track_norm_delta {
            l1_norm_deltas(self.store, input, output, num_sources, thread_pool)?
        } else {
            vec![f64::INFINITY; num_sources]
        };

        Ok(IterationReport {
            iteration,
            phase1,
            phase2,
            retained_mass,
            missing_mass,
            total_mass,
            norm_deltas,
        })
    }

    /// Runs iteration `iteration`, reading the snapshot after `iteration`
    /// iterations and writing the next one.
    pub fn run_iteration(
        &mut self,
        iteration: usize,
        thread_pool: &ThreadPool,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<IterationReport, IterationError> {
        self.step(
            iteration,
            &snapshot_name(iteration),
            &snapshot_name(iteration + 1),
            thread_pool,
            cpl,
        )
        .map_err(|source| IterationError { iteration, source })
    }

    /// Runs the given range of iterations, stopping early if the predicate
    /// holds.
    pub fn run(
        &mut self,
        iterations: Range<usize>,
        predicate: impl Predicate<PredParams>,
        thread_pool: &ThreadPool,
    ) -> Result<(), IterationError> {
        self.run_with_logging(
            iterations,
            predicate,
            thread_pool,
            no_logging![],
            no_logging![],
        )
    }

    /// Runs the given range of iterations, stopping early if the predicate
    /// holds, logging progress.
    ///
    /// `pl` is a sequential [`ProgressLog`] used for iteration counting. `cpl`
    /// is a [`ConcurrentProgressLog`] used for node-level progress inside each
    /// phase. Their options will be preserved, making thus possible to
    /// customize the logs.
    ///
    /// It is possible to specify either `pl` or `cpl` as
    /// [`no_logging![]`](dsi_progress_logger::no_logging) if you don't want to
    /// log the corresponding part of the computation.
    pub fn run_with_logging(
        &mut self,
        iterations: Range<usize>,
        predicate: impl Predicate<PredParams>,
        thread_pool: &ThreadPool,
        pl: &mut impl ProgressLog,
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), IterationError> {
        log::info!("Sources: {}", self.sources);
        log::info!("Alpha: {}", self.alpha);
        log::info!("Combiner: {}", self.combiner);
        log::info!("Stopping criterion: {}", predicate);

        self.reports.clear();
        self.state = State::Idle;

        pl.item_name("iteration");
        pl.expected_updates(Some(iterations.len()));
        pl.start(format!(
            "Computing personalized PageRank for {} sources...",
            self.sources.len()
        ));

        for iteration in iterations {
            let report = self.run_iteration(iteration, thread_pool, cpl)?;
            log::info!(
                "Iteration {}: norm deltas = {:?}",
                iteration + 1,
                report.norm_deltas
            );
            let params = PredParams::new(self.reports.len() + 1, &report);
            self.reports.push(report);

            pl.update_and_display();

            if predicate.eval(&params) {
                break;
            }
        }

        pl.done();
        self.state = State::Done;
        Ok(())
    }
}
