/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::no_logging;
use predicates::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap};
use webgraph_ppr::distribute::MassDistribution;
use webgraph_ppr::logprob::LOG_ZERO;
use webgraph_ppr::prelude::*;
use webgraph_ppr::shuffle::HashPartitioner;
use webgraph_ppr::store::snapshot_name;

/// 1 → 2, 1 → 3, 2 → 3, 3 → 1, and an isolated vertex 4.
const FOUR: &[(u64, &[u64])] = &[(1, &[2, 3]), (2, &[3]), (3, &[1]), (4, &[])];

/// 1 → 2, with 2 dangling.
const TWO: &[(u64, &[u64])] = &[(1, &[2]), (2, &[])];

fn thread_pool() -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap()
}

/// Writes the initial snapshot of a graph given as adjacency lists.
fn write_graph(
    store: &impl GraphStore,
    sources: &SourceSet,
    graph: &[(u64, &[u64])],
    num_partitions: usize,
) -> Result<()> {
    let partitioner = HashPartitioner::new(num_partitions);
    let mut partitions = vec![Vec::new(); num_partitions];
    for &(id, succ) in graph {
        partitions[partitioner.partition(id)].push(Node::new(
            id,
            succ.to_vec(),
            sources.initial_rank(id),
        ));
    }
    store.write(&snapshot_name(0), partitions)
}

/// Returns the probabilities of a column of a snapshot, keyed by vertex.
fn probs(store: &impl GraphStore, snapshot: &str, column: usize) -> Result<HashMap<u64, f64>> {
    Ok(store
        .read_snapshot(snapshot)?
        .into_iter()
        .map(|node| (node.id, node.rank[column].exp()))
        .collect())
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1E-5,
        "{actual} differs from {expected}"
    );
}

#[test]
fn test_four_vertices_phase1() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([1])?;
    let store = MemoryGraphStore::new();
    write_graph(&store, &sources, FOUR, 2)?;

    let ledgers = MemoryLedgerStore::new();
    let counters = MassDistribution::new(&sources).num_nodes(Some(4)).run(
        &store,
        "iter0000",
        "half",
        &ledgers,
        &thread_pool,
        no_logging![],
    )?;
    assert_eq!(counters.nodes, 4);
    assert_eq!(counters.edges, 4);
    assert_eq!(counters.mass_messages, 4);
    assert_eq!(counters.mass_messages_received, 4);
    assert_eq!(counters.missing_structure, 0);
    assert_eq!(ledgers.len(), 2);

    let nodes: BTreeMap<u64, Node> = store
        .read_snapshot("half")?
        .into_iter()
        .map(|node| (node.id, node))
        .collect();
    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes[&1].rank[0], LOG_ZERO);
    assert_close(nodes[&2].rank[0], 0.5_f64.ln());
    assert_close(nodes[&3].rank[0], 0.5_f64.ln());
    // The isolated vertex gets its structure back, but no mass
    assert_eq!(nodes[&4].rank[0], LOG_ZERO);
    assert!(nodes[&4].adjacency.is_empty());
    assert_eq!(nodes[&1].adjacency, vec![2, 3]);

    let total = ledgers.sum_all_ledgers(1)?;
    assert_close(total[0], 0.0);
    Ok(())
}

#[test]
fn test_four_vertices() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([1])?;
    let store = MemoryGraphStore::new();
    write_graph(&store, &sources, FOUR, 2)?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.num_nodes(Some(4));
    ppr.run(0..2, MaxIter::default(), &thread_pool)?;
    assert_eq!(ppr.state(), State::Done);

    let reports = ppr.reports();
    assert_eq!(reports.len(), 2);
    for report in reports {
        assert_close(report.retained_mass[0].exp(), 1.0);
        assert_close(report.missing_mass[0], 0.0);
        assert_close(report.total_mass[0].exp(), 1.0);
        assert_eq!(report.phase1.nodes, 4);
        assert_eq!(report.phase1.edges, 4);
        assert_eq!(report.phase1.missing_structure, 0);
        assert_eq!(report.phase2.nodes, 4);
        assert_eq!(report.norm_delta(), f64::INFINITY);
    }
    assert_eq!(reports[1].iteration, 1);

    let p = probs(&store, "iter0001", 0)?;
    assert_close(p[&1], 0.15);
    assert_close(p[&2], 0.425);
    assert_close(p[&3], 0.425);
    assert_eq!(p[&4], 0.0);

    let p = probs(&store, "iter0002", 0)?;
    assert_close(p[&1], 0.51125);
    assert_close(p[&2], 0.06375);
    assert_close(p[&3], 0.425);
    assert_eq!(p[&4], 0.0);

    // Intermediate snapshots are discarded
    assert!(store.contains("iter0000"));
    assert!(!store.contains("iter0001t"));
    assert!(!store.contains("iter0002t"));
    assert!(!store.contains("iter0003"));
    Ok(())
}

#[test]
fn test_dangling_mass_goes_back_to_source() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([1])?;
    let store = MemoryGraphStore::new();
    write_graph(&store, &sources, TWO, 1)?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.run(0..2, MaxIter::default(), &thread_pool)?;

    let p = probs(&store, "iter0001", 0)?;
    assert_close(p[&1], 0.15);
    assert_close(p[&2], 0.85);

    let report = &ppr.reports()[1];
    assert_close(report.retained_mass[0].exp(), 0.15);
    assert_close(report.missing_mass[0], 0.85);
    // Conservation before the jump step
    assert_close(report.retained_mass[0].exp() + report.missing_mass[0], 1.0);

    let p = probs(&store, "iter0002", 0)?;
    assert_close(p[&1], 0.8725);
    assert_close(p[&2], 0.1275);
    assert_close(report.total_mass[0].exp(), 1.0);
    Ok(())
}

#[test]
fn test_multiple_sources() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([4, 1])?;
    let store = MemoryGraphStore::new();
    write_graph(&store, &sources, FOUR, 3)?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.run(0..2, MaxIter::default(), &thread_pool)?;

    // Column 1 is the same as with a single source
    let p = probs(&store, "iter0002", 1)?;
    assert_close(p[&1], 0.51125);
    assert_close(p[&2], 0.06375);
    assert_close(p[&3], 0.425);
    assert_eq!(p[&4], 0.0);

    // The walk from the isolated vertex never leaves it
    let p = probs(&store, "iter0002", 0)?;
    assert_close(p[&4], 1.0);
    assert_eq!(p[&1], 0.0);
    for report in ppr.reports() {
        assert_close(report.missing_mass[0], 1.0);
        assert_close(report.total_mass[0].exp(), 1.0);
    }
    Ok(())
}

#[test]
fn test_missing_structure() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([1])?;
    let store = MemoryGraphStore::new();
    // Vertex 5 is not defined
    write_graph(&store, &sources, &[(1, &[2, 5]), (2, &[1])], 2)?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.run(0..1, MaxIter::default(), &thread_pool)?;

    let report = &ppr.reports()[0];
    assert_eq!(report.phase1.missing_structure, 1);
    assert_eq!(report.phase1.edges, 3);
    assert_eq!(report.phase1.mass_messages_received, 3);
    // The mass sent to vertex 5 is lost and then given back to the source
    assert_close(report.retained_mass[0].exp(), 0.5);
    assert_close(report.missing_mass[0], 0.5);

    let p = probs(&store, "iter0001", 0)?;
    assert_eq!(p.len(), 2);
    assert_close(p[&1], 0.15 + 0.85 * 0.5);
    assert_close(p[&2], 0.85 * 0.5);
    Ok(())
}

#[test]
fn test_duplicate_structure() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([1])?;
    let store = MemoryGraphStore::new();
    store.write(
        &snapshot_name(0),
        vec![
            vec![
                Node::new(1, vec![2], sources.initial_rank(1)),
                Node::new(2, vec![1], sources.initial_rank(2)),
            ],
            vec![Node::new(2, vec![], sources.initial_rank(2))],
        ],
    )?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    let err = ppr
        .run(0..3, MaxIter::default(), &thread_pool)
        .unwrap_err();
    assert_eq!(err.iteration, 0);
    assert_eq!(
        err.ppr_error(),
        Some(&PprError::DuplicateStructure {
            node: 2,
            structures: 2,
            mass_messages: 1,
        })
    );
    assert_eq!(ppr.state(), State::Failed);
    assert!(ppr.reports().is_empty());
    assert!(!store.contains("iter0001t"));
    assert!(!store.contains("iter0001"));
    Ok(())
}

#[test]
fn test_configuration_mismatch() -> Result<()> {
    let thread_pool = thread_pool();
    let store = MemoryGraphStore::new();
    write_graph(&store, &SourceSet::new([1])?, FOUR, 2)?;

    // Rank vectors of the wrong length
    let sources = SourceSet::new([1, 2])?;
    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    let err = ppr.run(0..1, MaxIter::default(), &thread_pool).unwrap_err();
    assert!(matches!(
        err.ppr_error(),
        Some(PprError::ConfigurationMismatch(_))
    ));
    assert!(!store.contains("iter0001t"));
    assert!(!store.contains("iter0001"));

    let sources = SourceSet::new([1])?;

    // Wrong number of nodes
    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.num_nodes(Some(5));
    let err = ppr.run(0..1, MaxIter::default(), &thread_pool).unwrap_err();
    assert!(matches!(
        err.ppr_error(),
        Some(PprError::ConfigurationMismatch(_))
    ));
    assert!(!store.contains("iter0001"));

    // Invalid jump probability
    for alpha in [0.0, 1.0, -0.5, f64::NAN] {
        let mut ppr = PersonalizedPageRank::new(&store, &sources);
        ppr.alpha(alpha);
        let err = ppr.run(0..1, MaxIter::default(), &thread_pool).unwrap_err();
        assert!(matches!(
            err.ppr_error(),
            Some(PprError::ConfigurationMismatch(_))
        ));
        assert_eq!(ppr.state(), State::Failed);
    }
    assert!(!store.contains("iter0001"));

    // Missing input is an I/O error, not a configuration error
    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    let err = ppr.run(3..4, MaxIter::default(), &thread_pool).unwrap_err();
    assert_eq!(err.iteration, 3);
    assert!(err.ppr_error().is_none());
    Ok(())
}

#[test]
fn test_reordered_sources() -> Result<()> {
    let thread_pool = thread_pool();
    let store = MemoryGraphStore::new();
    let sources = SourceSet::new([1, 2])?;
    write_graph(&store, &sources, TWO, 2)?;
    store.put_sources(&sources)?;

    // Same length, different columns
    let reordered = SourceSet::new([2, 1])?;
    let mut ppr = PersonalizedPageRank::new(&store, &reordered);
    let err = ppr.run(0..1, MaxIter::default(), &thread_pool).unwrap_err();
    assert_eq!(err.iteration, 0);
    assert!(matches!(
        err.ppr_error(),
        Some(PprError::ConfigurationMismatch(_))
    ));
    assert_eq!(ppr.state(), State::Failed);
    assert!(!store.contains("iter0001"));

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.run(0..1, MaxIter::default(), &thread_pool)?;
    let p = probs(&store, "iter0001", 0)?;
    assert_close(p[&1], 0.15);
    assert_close(p[&2], 0.85);
    Ok(())
}

#[test]
fn test_rerun_is_bit_identical() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([1, 3])?;
    let store = MemoryGraphStore::new();
    write_graph(&store, &sources, FOUR, 3)?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.combiner(true);
    ppr.run(0..3, MaxIter::default(), &thread_pool)?;
    let first = store.read_snapshot("iter0003")?;

    ppr.run(2..3, MaxIter::default(), &thread_pool)?;
    let second = store.read_snapshot("iter0003")?;

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.adjacency, b.adjacency);
        assert_eq!(
            a.rank.iter().map(|r| r.to_bits()).collect::<Vec<_>>(),
            b.rank.iter().map(|r| r.to_bits()).collect::<Vec<_>>()
        );
    }
    Ok(())
}

/// Generates a random graph on vertices 1..=n in which every source has a
/// self-loop.
fn random_graph(rng: &mut SmallRng, n: u64, sources: &[u64]) -> BTreeMap<u64, Vec<u64>> {
    let mut graph = BTreeMap::new();
    for id in 1..=n {
        let outdegree = rng.random_range(0..5);
        let mut succ: Vec<u64> = (0..outdegree).map(|_| rng.random_range(1..=n)).collect();
        if sources.contains(&id) && !succ.contains(&id) {
            succ.push(id);
        }
        graph.insert(id, succ);
    }
    graph
}

/// Computes personalized PageRank in linear space, one source at a time.
fn reference(
    graph: &BTreeMap<u64, Vec<u64>>,
    source: u64,
    alpha: f64,
    iterations: usize,
) -> BTreeMap<u64, f64> {
    let mut rank: BTreeMap<u64, f64> = graph.keys().map(|&id| (id, 0.0)).collect();
    rank.insert(source, 1.0);
    for _ in 0..iterations {
        let mut next: BTreeMap<u64, f64> = graph.keys().map(|&id| (id, 0.0)).collect();
        for (id, succ) in graph {
            for s in succ {
                *next.get_mut(s).unwrap() += rank[id] / succ.len() as f64;
            }
        }
        let missing = (1.0 - next.values().sum::<f64>()).max(0.0);
        for value in next.values_mut() {
            *value *= 1.0 - alpha;
        }
        *next.get_mut(&source).unwrap() += alpha + (1.0 - alpha) * missing;
        rank = next;
    }
    rank
}

fn run_random(
    graph: &BTreeMap<u64, Vec<u64>>,
    sources: &SourceSet,
    alpha: f64,
    combiner: bool,
    num_partitions: usize,
    iterations: usize,
) -> Result<(MemoryGraphStore, Vec<IterationReport>)> {
    let thread_pool = thread_pool();
    let store = MemoryGraphStore::new();
    let adjacency: Vec<(u64, &[u64])> = graph.iter().map(|(&id, s)| (id, s.as_slice())).collect();
    write_graph(&store, sources, &adjacency, num_partitions)?;

    let mut ppr = PersonalizedPageRank::new(&store, sources);
    ppr.alpha(alpha)
        .combiner(combiner)
        .num_nodes(Some(graph.len()));
    ppr.run(0..iterations, MaxIter::default(), &thread_pool)?;
    let reports = ppr.reports().to_vec();
    Ok((store, reports))
}

#[test]
fn test_random_graphs_with_source_self_loops() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(0);
    for _ in 0..10 {
        let n = rng.random_range(10..80);
        let mut ids = Vec::new();
        while ids.len() < 3 {
            let id = rng.random_range(1..=n);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        let graph = random_graph(&mut rng, n, &ids);
        let sources = SourceSet::new(ids.iter().copied())?;
        let alpha = rng.random_range(0.05..0.5);
        let num_partitions = rng.random_range(1..6);
        let combiner = rng.random_bool(0.5);
        let iterations = 8;

        let (store, reports) =
            run_random(&graph, &sources, alpha, combiner, num_partitions, iterations)?;

        for report in &reports {
            assert_eq!(report.phase1.missing_structure, 0);
            for column in 0..sources.len() {
                assert!(report.missing_mass[column] >= 0.0);
                assert!(
                    (report.retained_mass[column].exp() + report.missing_mass[column] - 1.0).abs()
                        < 1E-9
                );
                assert!((report.total_mass[column].exp() - 1.0).abs() < 1E-9);
            }
        }

        for (column, &source) in ids.iter().enumerate() {
            let expected = reference(&graph, source, alpha, iterations);
            let actual = probs(&store, &snapshot_name(iterations), column)?;
            assert_eq!(actual.len(), expected.len());
            for (id, value) in expected {
                assert!(
                    (actual[&id] - value).abs() < 1E-9,
                    "source {source}, vertex {id}: {} != {value}",
                    actual[&id]
                );
            }
            // The source keeps at least the jump probability
            assert!(actual[&source] >= alpha - 1E-12);
        }
    }
    Ok(())
}

#[test]
fn test_combiner_equivalence() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(1);
    let n = 200;
    let graph = random_graph(&mut rng, n, &[]);
    let sources = SourceSet::new([1, 17, 100, 199])?;

    let (plain, plain_reports) = run_random(&graph, &sources, 0.15, false, 4, 5)?;
    let (combined, combined_reports) = run_random(&graph, &sources, 0.15, true, 4, 5)?;

    assert!(
        combined_reports
            .iter()
            .all(|report| report.phase1.mass_messages_saved > 0)
    );
    assert!(
        plain_reports
            .iter()
            .all(|report| report.phase1.mass_messages_saved == 0)
    );
    for (a, b) in plain_reports.iter().zip(&combined_reports) {
        assert_eq!(
            a.phase1.mass_messages_received,
            b.phase1.mass_messages_received + b.phase1.mass_messages_saved
        );
    }

    let plain = plain.read_snapshot(&snapshot_name(5))?;
    let combined = combined.read_snapshot(&snapshot_name(5))?;
    let combined: HashMap<u64, &Node> = combined.iter().map(|node| (node.id, node)).collect();
    for node in &plain {
        let other = combined[&node.id];
        assert_eq!(node.adjacency, other.adjacency);
        for (a, b) in node.rank.iter().zip(&other.rank) {
            assert_eq!(*a == LOG_ZERO, *b == LOG_ZERO);
            assert!((a.exp() - b.exp()).abs() < 1E-12);
        }
    }
    Ok(())
}

#[test]
fn test_dir_store() -> Result<()> {
    let thread_pool = thread_pool();
    let tmp = tempfile::tempdir()?;
    let store = DirGraphStore::new(tmp.path())?;
    let sources = SourceSet::new([1])?;
    write_graph(&store, &sources, TWO, 3)?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.combiner(true).track_norm_delta(true);
    ppr.run(0..2, MaxIter::default(), &thread_pool)?;

    let p = probs(&store, "iter0002", 0)?;
    assert_close(p[&1], 0.8725);
    assert_close(p[&2], 0.1275);
    assert_eq!(store.num_partitions("iter0002")?, 3);
    // |0.8725 − 0.15| + |0.1275 − 0.85|
    assert_close(ppr.reports()[1].norm_delta(), 1.445);

    assert!(tmp.path().join("iter0002").join("part-00000").exists());
    assert!(!tmp.path().join("iter0002t").exists());
    assert!(!tmp.path().join("iter0002t-mass").exists());

    // Re-running an iteration replaces its output with the same content
    let before = std::fs::read_to_string(tmp.path().join("iter0002").join("part-00001"))?;
    ppr.run(1..2, MaxIter::default(), &thread_pool)?;
    let after = std::fs::read_to_string(tmp.path().join("iter0002").join("part-00001"))?;
    assert_eq!(before, after);
    Ok(())
}

#[test]
fn test_early_stop() -> Result<()> {
    let thread_pool = thread_pool();
    let sources = SourceSet::new([1])?;
    let store = MemoryGraphStore::new();
    write_graph(&store, &sources, FOUR, 2)?;

    let mut ppr = PersonalizedPageRank::new(&store, &sources);
    ppr.run(0..100, MaxIter::from(3), &thread_pool)?;
    assert_eq!(ppr.reports().len(), 3);
    assert_eq!(ppr.state(), State::Done);
    assert!(store.contains("iter0003"));
    assert!(!store.contains("iter0004"));

    // Without tracking, the norm predicate never holds
    ppr.run(0..5, L1Norm::try_from(1E-3)?, &thread_pool)?;
    assert_eq!(ppr.reports().len(), 5);

    ppr.track_norm_delta(true);
    ppr.run(
        0..100,
        L1Norm::try_from(1E-3)?.or(MaxIter::from(80)),
        &thread_pool,
    )?;
    let reports = ppr.reports();
    assert!(reports.len() < 80);
    let last = reports.last().unwrap();
    assert!(last.norm_delta() <= 1E-3);
    assert!(reports[reports.len() - 2].norm_delta() > 1E-3);
    for window in reports.windows(2) {
        assert!(window[1].norm_delta() <= window[0].norm_delta() + 1E-12);
    }
    Ok(())
}

#[cfg_attr(feature = "slow_tests", test)]
#[cfg_attr(not(feature = "slow_tests"), allow(dead_code))]
fn test_large_random_graph() -> Result<()> {
    let mut rng = SmallRng::seed_from_u64(2);
    let n = 20_000;
    let ids = [1, 5_000, 12_345, 19_999];
    let graph = random_graph(&mut rng, n, &ids);
    let sources = SourceSet::new(ids)?;
    let iterations = 20;

    let (store, reports) = run_random(&graph, &sources, 0.15, true, 16, iterations)?;
    for report in &reports {
        for column in 0..sources.len() {
            assert!((report.total_mass[column].exp() - 1.0).abs() < 1E-9);
        }
    }
    for (column, &source) in ids.iter().enumerate() {
        let expected = reference(&graph, source, 0.15, iterations);
        let actual = probs(&store, &snapshot_name(iterations), column)?;
        for (id, value) in expected {
            assert!((actual[&id] - value).abs() < 1E-9);
        }
    }
    Ok(())
}
