//! Results ledger
//!
//! Every output directory holds a `results.json` listing the last known
//! outcome per `(hash, path)`. Writes are read-merge-write per directory:
//! a repeated key replaces its row in place, a new key is appended.
//!
//! Rows are kept as raw JSON. Only `hash` and `path` are interpreted when
//! merging, so rows written by other tools survive untouched.
//!
//! There is no file locking. Two processes writing the same ledger at the
//! same time can lose each other's updates.

use futures::future::join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use vizreg_common::LedgerEntry;

use crate::error::{RegressionError, RegressionResult};

/// Ledger file name inside an output directory
pub const LEDGER_FILE: &str = "results.json";

/// How a ledger came to be in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// No file existed
    Missing,
    /// The file existed but was empty
    Empty,
    Loaded,
    /// The file was unreadable, not JSON, or not a list, and was treated as empty
    Recovered(String),
}

/// Effect of merging one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Appended(usize),
    Replaced(usize),
}

/// In-memory view of one directory's ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
    rows: Vec<Value>,
    state: LoadState,
}

impl Ledger {
    /// Ledger file path for an output directory
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(LEDGER_FILE)
    }

    /// Read a ledger file; unreadable or malformed content yields an empty ledger
    pub async fn load(path: &Path) -> Ledger {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ledger::with_state(path, Vec::new(), LoadState::Missing);
            }
            Err(e) => return Ledger::recover(path, format!("read failed: {}", e)),
        };

        if content.trim().is_empty() {
            return Ledger::with_state(path, Vec::new(), LoadState::Empty);
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(rows)) => Ledger::with_state(path, rows, LoadState::Loaded),
            Ok(_) => Ledger::recover(path, "content is not a list".to_string()),
            Err(e) => Ledger::recover(path, format!("invalid JSON: {}", e)),
        }
    }

    /// Corruption recovery: start over from an empty ledger
    fn recover(path: &Path, reason: String) -> Ledger {
        warn!("Resetting ledger {}: {}", path.display(), reason);
        Ledger::with_state(path, Vec::new(), LoadState::Recovered(reason))
    }

    fn with_state(path: &Path, rows: Vec<Value>, state: LoadState) -> Ledger {
        Ledger {
            path: path.to_path_buf(),
            rows,
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Rows exactly as stored
    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    /// Rows readable as [`LedgerEntry`], in file order; other rows are skipped
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.rows
            .iter()
            .filter_map(|row| serde_json::from_value(row.clone()).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Entries whose hash starts with `prefix`
    pub fn find(&self, prefix: &str) -> Vec<LedgerEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.hash.starts_with(prefix))
            .collect()
    }

    /// Replace the row with the same `(hash, path)` in place, or append
    pub fn merge(&mut self, entry: &LedgerEntry) -> RegressionResult<Merge> {
        let row = serde_json::to_value(entry)?;
        Ok(self.merge_row(row))
    }

    fn merge_row(&mut self, row: Value) -> Merge {
        let position = row_key(&row)
            .and_then(|key| self.rows.iter().position(|r| row_key(r) == Some(key)));
        match position {
            Some(index) => {
                self.rows[index] = row;
                Merge::Replaced(index)
            }
            None => {
                self.rows.push(row);
                Merge::Appended(self.rows.len() - 1)
            }
        }
    }

    /// Write the full collection back to disk
    pub async fn save(&self) -> RegressionResult<()> {
        let json = serde_json::to_string_pretty(&self.rows)?;
        fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// The `(hash, path)` key of a stored row
fn row_key(row: &Value) -> Option<(&str, &str)> {
    Some((row.get("hash")?.as_str()?, row.get("path")?.as_str()?))
}

/// Read the ledger of an output directory
pub async fn read(dir: &Path) -> Ledger {
    Ledger::load(&Ledger::file_path(dir)).await
}

/// Merge `entries` into the ledgers of their directories.
///
/// Directories are written independently; the first failure is returned
/// after every directory was attempted.
pub async fn write(entries: &[LedgerEntry]) -> RegressionResult<()> {
    for (_, result) in write_each(entries).await {
        result?;
    }
    Ok(())
}

/// Merge an untyped list of rows, each carrying a string `hash` and `path`
pub async fn write_value(value: &Value) -> RegressionResult<()> {
    let Value::Array(items) = value else {
        return Err(RegressionError::InvalidInput(
            "ledger entries must be a list".to_string(),
        ));
    };

    let rows = items
        .iter()
        .enumerate()
        .map(|(i, item)| match row_key(item) {
            Some((_, path)) => Ok((PathBuf::from(path), Ok(item.clone()))),
            None => Err(RegressionError::InvalidInput(format!(
                "entry {} needs a string hash and path",
                i
            ))),
        })
        .collect::<RegressionResult<Vec<_>>>()?;

    for (_, result) in write_rows(rows).await {
        result?;
    }
    Ok(())
}

/// Merge `entries` per directory, reporting each directory's outcome
pub async fn write_each(entries: &[LedgerEntry]) -> Vec<(PathBuf, RegressionResult<usize>)> {
    let rows = entries
        .iter()
        .map(|entry| {
            let row = serde_json::to_value(entry).map_err(RegressionError::from);
            (entry.path.clone(), row)
        })
        .collect();
    write_rows(rows).await
}

type PendingRow = RegressionResult<Value>;

async fn write_rows(rows: Vec<(PathBuf, PendingRow)>) -> Vec<(PathBuf, RegressionResult<usize>)> {
    let groups = group_by_dir(rows);
    let dirs: Vec<PathBuf> = groups.iter().map(|(dir, _)| dir.clone()).collect();
    let results = join_all(groups.into_iter().map(|(dir, rows)| write_dir(dir, rows))).await;

    dirs.into_iter().zip(results).collect()
}

fn group_by_dir(rows: Vec<(PathBuf, PendingRow)>) -> Vec<(PathBuf, Vec<PendingRow>)> {
    let mut groups: Vec<(PathBuf, Vec<PendingRow>)> = Vec::new();
    for (path, row) in rows {
        match groups.iter_mut().find(|(dir, _)| *dir == path) {
            Some((_, group)) => group.push(row),
            None => groups.push((path, vec![row])),
        }
    }
    groups
}

async fn write_dir(dir: PathBuf, rows: Vec<PendingRow>) -> RegressionResult<usize> {
    let failed = |reason: String| RegressionError::LedgerWriteFailed {
        dir: dir.clone(),
        reason,
    };

    let rows = rows
        .into_iter()
        .collect::<RegressionResult<Vec<Value>>>()
        .map_err(|e| failed(e.to_string()))?;

    fs::create_dir_all(&dir).await.map_err(|e| failed(e.to_string()))?;

    let mut ledger = read(&dir).await;
    for row in rows {
        match ledger.merge_row(row) {
            Merge::Replaced(i) => debug!("Ledger {}: replaced entry {}", dir.display(), i),
            Merge::Appended(i) => debug!("Ledger {}: appended entry {}", dir.display(), i),
        }
    }

    ledger.save().await.map_err(|e| failed(e.to_string()))?;
    info!(
        "Results written to: {} ({} entries)",
        ledger.path().display(),
        ledger.len()
    );
    Ok(ledger.len())
}
