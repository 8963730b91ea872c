/*
 * SPDX-FileCopyrightText: 2026 The webgraph-ppr developers
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::LedgerStore;
use crate::error::PprError;
use crate::logprob::{add_assign_log_probs, neg_inf_vec};
use anyhow::{Context, Result, bail, ensure};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

fn check_len(partition: usize, ledger: &[f64], num_sources: usize) -> Result<()> {
    if ledger.len() != num_sources {
        return Err(PprError::ConfigurationMismatch(format!(
            "The ledger of partition {partition} has {} entries, but there are {num_sources} sources",
            ledger.len()
        ))
        .into());
    }
    Ok(())
}

/// An in-memory [`LedgerStore`].
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    ledgers: Mutex<BTreeMap<usize, Vec<f64>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored ledgers.
    pub fn len(&self) -> usize {
        self.ledgers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn put_ledger(&self, partition: usize, ledger: &[f64]) -> Result<()> {
        let mut ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        ensure!(
            !ledgers.contains_key(&partition),
            "The ledger of partition {partition} has already been stored"
        );
        ledgers.insert(partition, ledger.to_vec());
        Ok(())
    }

    fn sum_all_ledgers(&self, num_sources: usize) -> Result<Vec<f64>> {
        let ledgers = self.ledgers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut total = neg_inf_vec(num_sources);
        for (&partition, ledger) in ledgers.iter() {
            check_len(partition, ledger, num_sources)?;
            add_assign_log_probs(&mut total, ledger);
        }
        Ok(total)
    }

    fn clear(&self) -> Result<()> {
        self.ledgers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// A [`LedgerStore`] keeping one file per partition in a directory.
///
/// The ledger of partition *p* is stored in the file `part-ppppp` as a
/// sequence of big-endian 64-bit floats, the layout used for Java-compatible
/// float vectors.
#[derive(Debug, Clone)]
pub struct DirLedgerStore {
    dir: PathBuf,
}

impl DirLedgerStore {
    /// Creates a ledger store in the given directory, which will be created
    /// when the first ledger is stored.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_owned(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn part_path(&self, partition: usize) -> PathBuf {
        self.dir.join(format!("part-{partition:05}"))
    }

    fn load(path: &Path) -> Result<Vec<f64>> {
        let file =
            File::open(path).with_context(|| format!("Could not open {}", path.display()))?;
        let file_len = file.metadata()?.len() as usize;
        ensure!(
            file_len % size_of::<f64>() == 0,
            "File size ({}) of {} is not a multiple of {} bytes",
            file_len,
            path.display(),
            size_of::<f64>()
        );
        let mut reader = BufReader::new(file);
        let mut ledger = Vec::with_capacity(file_len / size_of::<f64>());
        let mut buf = [0u8; size_of::<f64>()];
        for i in 0..file_len / size_of::<f64>() {
            reader.read_exact(&mut buf).with_context(|| {
                format!("Could not read value at index {i} from {}", path.display())
            })?;
            ledger.push(f64::from_be_bytes(buf));
        }
        Ok(ledger)
    }
}

impl LedgerStore for DirLedgerStore {
    fn put_ledger(&self, partition: usize, ledger: &[f64]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create directory {}", self.dir.display()))?;
        let path = self.part_path(partition);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                bail!("The ledger of partition {partition} has already been stored")
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Could not create {}", path.display()));
            }
        };
        let mut writer = BufWriter::new(file);
        for value in ledger {
            writer
                .write_all(&value.to_be_bytes())
                .with_context(|| format!("Could not write ledger to {}", path.display()))?;
        }
        writer
            .flush()
            .with_context(|| format!("Could not write ledger to {}", path.display()))?;
        Ok(())
    }

    fn sum_all_ledgers(&self, num_sources: usize) -> Result<Vec<f64>> {
        let mut total = neg_inf_vec(num_sources);
        if !self.dir.exists() {
            return Ok(total);
        }

        let mut parts = BTreeMap::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Could not read directory {}", self.dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let Some(partition) = name
                .to_str()
                .and_then(|name| name.strip_prefix("part-"))
                .and_then(|index| index.parse::<usize>().ok())
            else {
                continue;
            };
            parts.insert(partition, entry.path());
        }

        for (partition, path) in parts {
            let ledger = Self::load(&path)?;
            check_len(partition, &ledger, num_sources)?;
            add_assign_log_probs(&mut total, &ledger);
        }
        Ok(total)
    }

    fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .with_context(|| format!("Could not remove directory {}", self.dir.display()))?;
        }
        Ok(())
    }
}
