//! The merged parcel index: the one artifact that outlives a run.
//!
//! Each invocation reads any existing index, overwrites the entries for the
//! cells it produced (last-write-wins per key), recomputes the totals from
//! the merged mapping, and writes the whole document back. This additive
//! merge is what makes re-running the pipeline against a different input
//! safe: previously ingested cells survive untouched.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::grid::GeoBounds;
use crate::tiles::WrittenTile;
use crate::{Error, Result};

/// One cell's entry in the index: where its tile lives and what it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEntry {
    pub bounds: GeoBounds,
    pub filename: String,
    pub feature_count: u64,
}

/// Aggregate counters and run timestamps.
///
/// `generated_at` is set once by the first run and never changes across
/// merges; `last_updated` moves on every merge. `total_features` always
/// equals the sum of `feature_count` over all cells, and `total_cells` the
/// size of the cell mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub total_cells: u64,
    pub total_features: u64,
    pub generated_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// The index document mapping cell key strings to tile metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelIndex {
    pub grid_size: f64,
    pub cells: BTreeMap<String, CellEntry>,
    pub metadata: IndexMetadata,
}

impl ParcelIndex {
    /// Read a prior index from disk.
    ///
    /// Returns `None` when the file is absent; an unreadable or malformed
    /// file also yields `None` with a warning, never a fatal error.
    pub fn load(path: &Path) -> Option<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!(
                    "could not read existing index {}, starting fresh: {e}",
                    path.display()
                );
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(index) => Some(index),
            Err(e) => {
                log::warn!(
                    "existing index {} is malformed, starting fresh: {e}",
                    path.display()
                );
                None
            }
        }
    }

    /// Merge this run's finalized cells over a prior index.
    ///
    /// Entries produced this run fully replace prior entries with the same
    /// key. Totals are recomputed from the merged mapping rather than
    /// delta-added, which keeps them correct under key overwrites.
    pub fn merge(
        prior: Option<Self>,
        grid_size: f64,
        tiles: &[WrittenTile],
        now: DateTime<Utc>,
    ) -> Self {
        let (mut cells, generated_at) = match prior {
            Some(prior) => (prior.cells, prior.metadata.generated_at),
            None => (BTreeMap::new(), now),
        };

        for tile in tiles {
            cells.insert(
                tile.key.to_string(),
                CellEntry {
                    bounds: tile.bounds,
                    filename: tile.filename.clone(),
                    feature_count: tile.feature_count,
                },
            );
        }

        let total_cells = cells.len() as u64;
        let total_features = cells.values().map(|entry| entry.feature_count).sum();

        Self {
            grid_size,
            cells,
            metadata: IndexMetadata {
                total_cells,
                total_features,
                generated_at,
                last_updated: now,
            },
        }
    }

    /// Persist the index, replacing any prior document in full.
    ///
    /// The document is serialized to a sibling temp file and renamed into
    /// place, so a write that fails partway never truncates a prior index:
    /// the merge history either updates completely or stays as it was.
    pub fn write(&self, path: &Path) -> Result<()> {
        let tmp_path = temp_sibling(path);
        match self.write_to(&tmp_path).and_then(|_| {
            std::fs::rename(&tmp_path, path).map_err(|e| e.to_string())
        }) {
            Ok(()) => Ok(()),
            Err(reason) => {
                let _ = std::fs::remove_file(&tmp_path);
                Err(Error::IndexWrite {
                    path: path.display().to_string(),
                    reason,
                })
            }
        }
    }

    fn write_to(&self, path: &Path) -> std::result::Result<(), String> {
        let file = File::create(path).map_err(|e| e.to_string())?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|e| e.to_string())?;
        writer.flush().map_err(|e| e.to_string())
    }
}

/// Sibling temp path the index is serialized to before the rename. Same
/// directory as the final path, so the rename cannot cross filesystems.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index".into());
    name.push(".tmp");
    path.with_file_name(name)
}
