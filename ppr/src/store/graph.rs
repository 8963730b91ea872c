/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::{DirLedgerStore, GraphStore, LedgerStore, MemoryLedgerStore};
use crate::record::Node;
use crate::sources::SourceSet;
use anyhow::{Context, Result, anyhow, ensure};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

/// An in-memory [`GraphStore`].
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    snapshots: RwLock<HashMap<String, Vec<Vec<Node>>>>,
    sources: RwLock<Option<SourceSet>>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemoryGraphStore {
    type Ledger = MemoryLedgerStore;

    fn num_partitions(&self, snapshot: &str) -> Result<usize> {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(snapshot)
            .map(Vec::len)
            .ok_or_else(|| anyhow!("No snapshot named {snapshot}"))
    }

    fn read_partition(&self, snapshot: &str, partition: usize) -> Result<Vec<Node>> {
        let snapshots = self.snapshots.read().unwrap_or_else(PoisonError::into_inner);
        let partitions = snapshots
            .get(snapshot)
            .ok_or_else(|| anyhow!("No snapshot named {snapshot}"))?;
        partitions
            .get(partition)
            .cloned()
            .ok_or_else(|| anyhow!("Snapshot {snapshot} has no partition {partition}"))
    }

    fn write(&self, snapshot: &str, partitions: Vec<Vec<Node>>) -> Result<()> {
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(snapshot.to_owned(), partitions);
        Ok(())
    }

    fn remove(&self, snapshot: &str) -> Result<()> {
        self.snapshots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(snapshot);
        Ok(())
    }

    fn contains(&self, snapshot: &str) -> bool {
        self.snapshots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(snapshot)
    }

    fn ledger_store(&self, _name: &str) -> Result<MemoryLedgerStore> {
        Ok(MemoryLedgerStore::new())
    }

    fn put_sources(&self, sources: &SourceSet) -> Result<()> {
        *self.sources.write().unwrap_or_else(PoisonError::into_inner) = Some(sources.clone());
        Ok(())
    }

    fn sources(&self) -> Result<Option<SourceSet>> {
        Ok(self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// A [`GraphStore`] keeping each snapshot in a subdirectory of a base
/// directory.
///
/// Partition *p* of a snapshot is the file `part-ppppp`, containing one JSON
/// object per line, one per node. Mass ledgers are [`DirLedgerStore`]s in
/// subdirectories of the same base directory.
#[derive(Debug, Clone)]
pub struct DirGraphStore {
    base: PathBuf,
}

impl DirGraphStore {
    /// Opens (creating it, if necessary) a store in the given directory.
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        let base = base.as_ref().to_owned();
        std::fs::create_dir_all(&base)
            .with_context(|| format!("Could not create directory {}", base.display()))?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn snapshot_dir(&self, snapshot: &str) -> PathBuf {
        self.base.join(snapshot)
    }

    fn sources_path(&self) -> PathBuf {
        self.base.join("sources")
    }

    fn part_path(dir: &Path, partition: usize) -> PathBuf {
        dir.join(format!("part-{partition:05}"))
    }

    fn write_partition(path: &Path, nodes: &[Node]) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Could not create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for node in nodes {
            serde_json::to_writer(&mut writer, node)
                .with_context(|| format!("Could not write node {} to {}", node.id, path.display()))?;
            writer.write_all(b"\n")?;
        }
        writer
            .flush()
            .with_context(|| format!("Could not write {}", path.display()))?;
        Ok(())
    }
}

impl GraphStore for DirGraphStore {
    type Ledger = DirLedgerStore;

    fn num_partitions(&self, snapshot: &str) -> Result<usize> {
        let dir = self.snapshot_dir(snapshot);
        let mut num_partitions = 0;
        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("Could not read snapshot {}", dir.display()))?
        {
            let name = entry?.file_name();
            if name.to_str().is_some_and(|name| name.starts_with("part-")) {
                num_partitions += 1;
            }
        }
        for partition in 0..num_partitions {
            ensure!(
                Self::part_path(&dir, partition).exists(),
                "Snapshot {} has {num_partitions} partitions, but partition {partition} is missing",
                dir.display()
            );
        }
        Ok(num_partitions)
    }

    fn read_partition(&self, snapshot: &str, partition: usize) -> Result<Vec<Node>> {
        let path = Self::part_path(&self.snapshot_dir(snapshot), partition);
        let file = File::open(&path).with_context(|| format!("Could not open {}", path.display()))?;
        let mut nodes = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line =
                line.with_context(|| format!("Error reading line {} of {}", i + 1, path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            nodes.push(
                serde_json::from_str(&line).with_context(|| {
                    format!("Error parsing line {} of {}", i + 1, path.display())
                })?,
            );
        }
        Ok(nodes)
    }

    fn write(&self, snapshot: &str, partitions: Vec<Vec<Node>>) -> Result<()> {
        let dir = self.snapshot_dir(snapshot);
        let tmp = self.base.join(format!(".{snapshot}.tmp"));
        if tmp.exists() {
            std::fs::remove_dir_all(&tmp)
                .with_context(|| format!("Could not remove {}", tmp.display()))?;
        }
        std::fs::create_dir_all(&tmp)
            .with_context(|| format!("Could not create directory {}", tmp.display()))?;

        for (partition, nodes) in partitions.iter().enumerate() {
            Self::write_partition(&Self::part_path(&tmp, partition), nodes)?;
        }

        self.remove(snapshot)?;
        std::fs::rename(&tmp, &dir).with_context(|| {
            format!("Could not rename {} to {}", tmp.display(), dir.display())
        })?;
        log::debug!("Wrote {} partitions to {}", partitions.len(), dir.display());
        Ok(())
    }

    fn remove(&self, snapshot: &str) -> Result<()> {
        let dir = self.snapshot_dir(snapshot);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Could not remove {}", dir.display()))?;
        }
        Ok(())
    }

    fn contains(&self, snapshot: &str) -> bool {
        self.snapshot_dir(snapshot).is_dir()
    }

    fn ledger_store(&self, name: &str) -> Result<DirLedgerStore> {
        let ledgers = DirLedgerStore::new(self.base.join(name));
        ledgers.clear()?;
        Ok(ledgers)
    }

    fn put_sources(&self, sources: &SourceSet) -> Result<()> {
        let path = self.sources_path();
        std::fs::write(&path, format!("{sources}\n"))
            .with_context(|| format!("Could not write {}", path.display()))
    }

    fn sources(&self) -> Result<Option<SourceSet>> {
        let path = self.sources_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let sources = text
            .trim()
            .parse()
            .with_context(|| format!("Invalid source list in {}", path.display()))?;
        Ok(Some(sources))
    }
}
